//! # catalog-fetch
//!
//! Fetches a product catalog from an HTTP catalog API with a bounded number of
//! concurrent requests, exports the result to a spreadsheet and proxies
//! product image uploads to a file service.
//!
//! The core is [`fetcher::BoundedFetcher`]: it fans one task out per
//! identifier, admits at most `concurrency` of them into their fetch at any
//! instant, and returns exactly one outcome per identifier once every task of
//! every wave has finished.
//!
//! ## Quick Start
//!
//! ```no_run
//! use catalog_fetch::fetcher::{BoundedFetcher, FetchBudget, fetch_fn};
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() {
//!     let op = fetch_fn(|id: String| async move { Ok(id.len()) });
//!     let fetcher = BoundedFetcher::new(Arc::new(op), FetchBudget::new(2, 1000));
//!
//!     let ids: Vec<String> = vec!["a".into(), "bb".into(), "ccc".into()];
//!     let results = fetcher.fetch_all(&ids, &CancellationToken::new()).await;
//!
//!     for (id, len) in results.successes() {
//!         println!("{} -> {}", id, len);
//!     }
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// REST API module
pub mod api;
/// Catalog API client, wire types and service
pub mod catalog;
/// Configuration types
pub mod config;
/// Error types
pub mod error;
/// Spreadsheet export
pub mod export;
/// Bounded concurrent fetcher
pub mod fetcher;
/// JSON and multipart HTTP client
pub mod http;
/// Fixed-delay retry
pub mod retry;
/// Upload proxy
pub mod upload;

pub use catalog::{CatalogService, FetchReport, Product};
pub use config::{Config, FailurePolicy};
pub use error::{Error, Result};
pub use fetcher::{BoundedFetcher, FetchBudget, FetchOperation, FetchOutcome, ResultSet};

use std::sync::Arc;

/// Serve the API until SIGTERM or SIGINT, then shut down gracefully
///
/// In-flight batches are cancelled when the signal arrives.
pub async fn run_with_shutdown(service: Arc<CatalogService>) -> Result<()> {
    api::start_api_server(service, shutdown_signal()).await
}

/// Resolves when the process receives SIGTERM or SIGINT (Ctrl+C elsewhere)
pub async fn shutdown_signal() {
    wait_for_signal().await
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Signal registration may fail in restricted environments (containers, tests)
    let sigterm_result = signal(SignalKind::terminate());
    let sigint_result = signal(SignalKind::interrupt());

    match (sigterm_result, sigint_result) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM signal");
                }
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT signal (Ctrl+C)");
                }
            }
        }
        (Err(e), _) | (_, Err(e)) => {
            tracing::warn!(error = %e, "Could not register signal handlers, using ctrl_c fallback");
            tokio::signal::ctrl_c().await.ok();
            tracing::info!("Received Ctrl+C");
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received Ctrl+C signal");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
        }
    }
}
