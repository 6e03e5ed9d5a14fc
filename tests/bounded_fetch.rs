//! Behavioral tests for the bounded fetcher through the public API
//!
//! Fetch operations here are closures that record how many fetches overlap,
//! so every test can assert the concurrency bound alongside the outcomes.

use catalog_fetch::fetcher::fetch_fn;
use catalog_fetch::{BoundedFetcher, Error, FailurePolicy, FetchBudget};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[derive(Default)]
struct Gauge {
    active: AtomicUsize,
    peak: AtomicUsize,
    calls: AtomicUsize,
}

impl Gauge {
    fn enter(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
    }

    fn leave(&self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
    }
}

fn ids(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

/// Fetcher that returns `"r" + id` after `delay`, failing for ids in `failing`
fn tracked_fetcher(
    gauge: Arc<Gauge>,
    budget: FetchBudget,
    delay: Duration,
    failing: &'static [&'static str],
) -> BoundedFetcher<String> {
    let op = fetch_fn(move |id: String| {
        let gauge = gauge.clone();
        async move {
            gauge.enter();
            tokio::time::sleep(delay).await;
            gauge.leave();
            if failing.iter().any(|f| *f == id) {
                Err(Error::Other(format!("boom {}", id)))
            } else {
                Ok(format!("r{}", id))
            }
        }
    });
    BoundedFetcher::new(Arc::new(op), budget)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn five_ids_with_budget_two() {
    let gauge = Arc::new(Gauge::default());
    let fetcher = tracked_fetcher(
        gauge.clone(),
        FetchBudget::new(2, 1000),
        Duration::from_millis(30),
        &[],
    );

    let results = fetcher
        .fetch_all(&ids(&["1", "2", "3", "4", "5"]), &CancellationToken::new())
        .await;

    assert_eq!(results.len(), 5);
    assert_eq!(results.failure_count(), 0);
    let values: Vec<_> = results.successes().map(|(_, v)| v.clone()).collect();
    assert_eq!(values, vec!["r1", "r2", "r3", "r4", "r5"]);
    assert!(gauge.peak.load(Ordering::SeqCst) <= 2);
    assert_eq!(gauge.active.load(Ordering::SeqCst), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn one_failure_does_not_abort_siblings() {
    let gauge = Arc::new(Gauge::default());
    let fetcher = tracked_fetcher(
        gauge.clone(),
        FetchBudget::new(3, 1000),
        Duration::from_millis(10),
        &["b"],
    );

    let results = fetcher
        .fetch_all(&ids(&["a", "b", "c"]), &CancellationToken::new())
        .await;

    assert_eq!(results.len(), 3);
    assert_eq!(results.success_count(), 2);
    let (failed_id, error) = results.first_failure().unwrap();
    assert_eq!(failed_id, "b");
    assert!(error.to_string().contains("boom b"));
    assert_eq!(gauge.calls.load(Ordering::SeqCst), 3);

    let strict = results.with_policy(FailurePolicy::Strict);
    match strict {
        Err(Error::Batch { id, .. }) => assert_eq!(id, "b"),
        other => panic!("expected batch error, got {:?}", other),
    }
}

#[tokio::test]
async fn empty_input_makes_no_calls() {
    let gauge = Arc::new(Gauge::default());
    let fetcher = tracked_fetcher(
        gauge.clone(),
        FetchBudget::new(4, 10),
        Duration::from_millis(1),
        &[],
    );

    let results = fetcher.fetch_all(&[], &CancellationToken::new()).await;

    assert!(results.is_empty());
    assert_eq!(gauge.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn small_waves_keep_order_and_bound() {
    let gauge = Arc::new(Gauge::default());
    let fetcher = tracked_fetcher(
        gauge.clone(),
        FetchBudget::new(3, 4),
        Duration::from_millis(5),
        &["7"],
    );
    let input: Vec<String> = (0..10).map(|i| i.to_string()).collect();

    let results = fetcher.fetch_all(&input, &CancellationToken::new()).await;

    let order: Vec<_> = results.outcomes().iter().map(|o| o.id.clone()).collect();
    assert_eq!(order, input);
    assert_eq!(results.failure_count(), 1);
    assert!(gauge.peak.load(Ordering::SeqCst) <= 3);
    assert_eq!(gauge.calls.load(Ordering::SeqCst), 10);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn cancellation_reports_every_identifier() {
    let gauge = Arc::new(Gauge::default());
    let fetcher = tracked_fetcher(
        gauge.clone(),
        FetchBudget::new(1, 2),
        Duration::from_secs(30),
        &[],
    );
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let results = tokio::time::timeout(
        Duration::from_secs(5),
        fetcher.fetch_all(&ids(&["1", "2", "3", "4", "5"]), &cancel),
    )
    .await
    .unwrap();

    assert_eq!(results.len(), 5);
    assert!(
        results
            .outcomes()
            .iter()
            .all(|o| matches!(o.result, Err(Error::Cancelled)))
    );
}
