//! Bounded concurrent fetcher
//!
//! Retrieves one resource per identifier with at most `concurrency` fetches in
//! flight. Identifiers are dispatched in waves of `chunk_size`: every identifier
//! of a wave is spawned as its own task on the runtime, each task waits for a
//! permit from the admission gate (a counting [`Semaphore`]) before calling the
//! fetch operation, and the wave's [`JoinSet`] is drained before the next wave
//! is spawned. Outcomes are written into per-index slots only after a task has
//! been joined, so the [`ResultSet`] is never observable before every
//! dispatched fetch has finished.
//!
//! Every identifier yields exactly one [`FetchOutcome`]. A failing identifier
//! never aborts its siblings; cancellation turns pending and in-flight fetches
//! into [`Error::Cancelled`] outcomes.

use crate::config::FailurePolicy;
use crate::error::{Error, Result};
use async_trait::async_trait;
use futures::FutureExt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

/// Retrieves the resource named by one identifier
///
/// Implementations own their retry policy; the fetcher calls each identifier
/// exactly once.
#[async_trait]
pub trait FetchOperation<T>: Send + Sync + 'static {
    /// Fetch the resource for `id`
    async fn fetch(&self, id: &str) -> Result<T>;
}

/// [`FetchOperation`] backed by an async closure
pub struct FnFetch<F>(F);

/// Wrap an async closure as a [`FetchOperation`]
pub fn fetch_fn<F, Fut, T>(f: F) -> FnFetch<F>
where
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T>> + Send,
    T: Send + 'static,
{
    FnFetch(f)
}

#[async_trait]
impl<F, Fut, T> FetchOperation<T> for FnFetch<F>
where
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T>> + Send,
    T: Send + 'static,
{
    async fn fetch(&self, id: &str) -> Result<T> {
        (self.0)(id.to_string()).await
    }
}

/// Concurrency budget of one batch
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FetchBudget {
    concurrency: usize,
    chunk_size: usize,
}

impl FetchBudget {
    /// Budget with `concurrency` in-flight fetches and waves of `chunk_size`
    ///
    /// Both values are clamped to at least 1.
    pub fn new(concurrency: usize, chunk_size: usize) -> Self {
        Self {
            concurrency: concurrency.max(1),
            chunk_size: chunk_size.max(1),
        }
    }

    /// Maximum simultaneous in-flight fetches
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Identifiers dispatched per wave
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }
}

impl From<&crate::config::FetchConfig> for FetchBudget {
    fn from(config: &crate::config::FetchConfig) -> Self {
        Self::new(config.concurrency, config.chunk_size)
    }
}

/// Result of fetching one identifier
#[derive(Debug)]
pub struct FetchOutcome<T> {
    /// The identifier this outcome belongs to
    pub id: String,
    /// The fetched value or the failure cause
    pub result: Result<T>,
}

impl<T> FetchOutcome<T> {
    fn failed(id: impl Into<String>, error: Error) -> Self {
        Self {
            id: id.into(),
            result: Err(error),
        }
    }

    /// Whether the fetch succeeded
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// All outcomes of one batch, in input order
#[derive(Debug)]
pub struct ResultSet<T> {
    outcomes: Vec<FetchOutcome<T>>,
}

impl<T> ResultSet<T> {
    /// Number of outcomes (equals the number of input identifiers)
    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    /// True for an empty batch
    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    /// All outcomes
    pub fn outcomes(&self) -> &[FetchOutcome<T>] {
        &self.outcomes
    }

    /// Number of successful fetches
    pub fn success_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_ok()).count()
    }

    /// Number of failed fetches
    pub fn failure_count(&self) -> usize {
        self.len() - self.success_count()
    }

    /// Successful `(id, value)` pairs
    pub fn successes(&self) -> impl Iterator<Item = (&str, &T)> {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().ok().map(|v| (o.id.as_str(), v)))
    }

    /// Failed `(id, error)` pairs
    pub fn failures(&self) -> impl Iterator<Item = (&str, &Error)> {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().err().map(|e| (o.id.as_str(), e)))
    }

    /// First failure in input order
    pub fn first_failure(&self) -> Option<(&str, &Error)> {
        self.failures().next()
    }

    /// Split into successful values and failures
    pub fn into_parts(self) -> (Vec<(String, T)>, Vec<(String, Error)>) {
        let mut values = Vec::with_capacity(self.outcomes.len());
        let mut failures = Vec::new();
        for outcome in self.outcomes {
            match outcome.result {
                Ok(value) => values.push((outcome.id, value)),
                Err(e) => failures.push((outcome.id, e)),
            }
        }
        (values, failures)
    }

    /// Apply a batch failure policy
    ///
    /// [`FailurePolicy::Partial`] returns the set unchanged.
    /// [`FailurePolicy::Strict`] turns any failure into [`Error::Batch`] naming the
    /// first failing identifier.
    pub fn with_policy(self, policy: FailurePolicy) -> Result<Self> {
        if policy == FailurePolicy::Strict {
            if let Some((id, cause)) = self.first_failure() {
                return Err(Error::Batch {
                    id: id.to_string(),
                    cause: cause.to_string(),
                });
            }
        }
        Ok(self)
    }
}

/// Fans identifiers out to a [`FetchOperation`] under a [`FetchBudget`]
pub struct BoundedFetcher<T> {
    operation: Arc<dyn FetchOperation<T>>,
    budget: FetchBudget,
}

impl<T> Clone for BoundedFetcher<T> {
    fn clone(&self) -> Self {
        Self {
            operation: Arc::clone(&self.operation),
            budget: self.budget,
        }
    }
}

impl<T: Send + 'static> BoundedFetcher<T> {
    /// Create a fetcher for `operation`
    pub fn new(operation: Arc<dyn FetchOperation<T>>, budget: FetchBudget) -> Self {
        Self { operation, budget }
    }

    /// Fetch every identifier and return one outcome per identifier
    ///
    /// Returns only after every spawned task of every wave has finished.
    /// Duplicate identifiers are fetched once per occurrence.
    pub async fn fetch_all(&self, ids: &[String], cancel: &CancellationToken) -> ResultSet<T> {
        let total = ids.len();
        if total == 0 {
            return ResultSet {
                outcomes: Vec::new(),
            };
        }

        let chunk_size = self.budget.chunk_size;
        let gate = Arc::new(Semaphore::new(self.budget.concurrency));
        let mut slots: Vec<Option<FetchOutcome<T>>> = (0..total).map(|_| None).collect();
        // Spawned tasks do not inherit the caller's span; attach this one explicitly
        let batch_span = tracing::info_span!("bounded_fetch", total);

        tracing::info!(
            total,
            concurrency = self.budget.concurrency,
            chunk_size,
            "Starting bounded fetch"
        );

        for (wave, chunk) in ids.chunks(chunk_size).enumerate() {
            let offset = wave * chunk_size;

            if cancel.is_cancelled() {
                for (i, id) in chunk.iter().enumerate() {
                    slots[offset + i] = Some(FetchOutcome::failed(id.clone(), Error::Cancelled));
                }
                continue;
            }

            tracing::debug!(wave, offset, size = chunk.len(), "Dispatching wave");

            let mut tasks = JoinSet::new();
            for (i, id) in chunk.iter().enumerate() {
                let index = offset + i;
                let id = id.clone();
                let gate = Arc::clone(&gate);
                let operation = Arc::clone(&self.operation);
                let cancel = cancel.clone();

                tasks.spawn(
                    async move {
                        let result = fetch_one(operation.as_ref(), &id, &gate, &cancel).await;
                        match &result {
                            Ok(_) => tracing::debug!(id = %id, "Fetched"),
                            Err(Error::Cancelled) => tracing::debug!(id = %id, "Fetch cancelled"),
                            Err(e) => tracing::warn!(id = %id, error = %e, "Fetch failed"),
                        }
                        (index, FetchOutcome { id, result })
                    }
                    .instrument(batch_span.clone()),
                );
            }

            while let Some(joined) = tasks.join_next().await {
                match joined {
                    Ok((index, outcome)) => slots[index] = Some(outcome),
                    // Panics are caught inside the task; this is an abort, filled in below
                    Err(e) => tracing::error!(wave, error = %e, "Fetch task did not complete"),
                }
            }
        }

        let outcomes: Vec<FetchOutcome<T>> = slots
            .into_iter()
            .zip(ids)
            .map(|(slot, id)| {
                slot.unwrap_or_else(|| {
                    FetchOutcome::failed(id.clone(), Error::Other("fetch task did not complete".into()))
                })
            })
            .collect();

        let set = ResultSet { outcomes };
        tracing::info!(
            total,
            succeeded = set.success_count(),
            failed = set.failure_count(),
            "Bounded fetch complete"
        );
        set
    }
}

/// Wait for a permit, then run the operation; both waits observe `cancel`
async fn fetch_one<T: 'static>(
    operation: &dyn FetchOperation<T>,
    id: &str,
    gate: &Semaphore,
    cancel: &CancellationToken,
) -> Result<T> {
    let _permit = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Err(Error::Cancelled),
        permit = gate.acquire() => permit.map_err(|_| Error::Cancelled)?,
    };

    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(Error::Cancelled),
        result = AssertUnwindSafe(operation.fetch(id)).catch_unwind() => {
            result.unwrap_or_else(|panic| {
                Err(Error::Other(format!(
                    "fetch of '{}' panicked: {}",
                    id,
                    panic_message(panic.as_ref())
                )))
            })
        }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
