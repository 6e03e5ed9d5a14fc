//! REST API server module
//!
//! Exposes catalog loading, the bounded and sequential fetch reports, product
//! creation and the upload proxy over HTTP.

use crate::catalog::CatalogService;
use crate::Result;
use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::HeaderValue,
    middleware,
    routing::{get, post},
};
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

pub mod error_response;
pub mod request_id;
pub mod routes;
pub mod state;

pub use request_id::{REQUEST_ID_HEADER, RequestId, TRANSACTION_ID_HEADER};
pub use state::AppState;

/// Multipart framing allowance on top of the configured upload limit
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Create the API router with all route definitions
///
/// # Routes
///
/// ## Catalog
/// - `POST /catalog/load` - Refresh the cached product identifiers
/// - `GET /catalog/ids` - List cached product identifiers
///
/// ## Products
/// - `GET /product` - Fetch every product concurrently (bounded) and export
/// - `GET /products` - Fetch every product one at a time and export
/// - `POST /product` - Create a product from a multipart form with an image
///
/// ## Uploads
/// - `POST /upload` - Forward a multipart file to the file service
///
/// ## System
/// - `GET /health` - Health check
pub fn create_router(service: Arc<CatalogService>) -> Router {
    let config = Arc::new(service.config().clone());
    let state = AppState::new(service, config.clone());

    let router = Router::new()
        // Catalog
        .route("/catalog/load", post(routes::load_catalog))
        .route("/catalog/ids", get(routes::list_ids))
        // Products
        .route("/product", get(routes::fetch_products))
        .route("/product", post(routes::create_product))
        .route("/products", get(routes::fetch_products_sequential))
        // Uploads
        .route("/upload", post(routes::upload_file))
        // System
        .route("/health", get(routes::health_check))
        .layer(DefaultBodyLimit::max(
            config.upload.max_upload_bytes + MULTIPART_OVERHEAD,
        ))
        .with_state(state);

    // Outermost layer runs first, so every response (including CORS
    // preflights) carries the request id
    let router = if config.api.cors_enabled {
        router.layer(build_cors_layer(&config.api.cors_origins))
    } else {
        router
    };

    router.layer(middleware::from_fn(request_id::propagate_request_id))
}

/// Build a CORS layer based on configured origins
///
/// `"*"` (or an empty list) allows any origin.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    let allow_any = origins.iter().any(|o| o == "*");

    if allow_any || origins.is_empty() {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let allowed: Vec<HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();

        CorsLayer::new()
            .allow_origin(AllowOrigin::list(allowed))
            .allow_methods(Any)
            .allow_headers(Any)
    }
}

/// Start the API server on the configured bind address
///
/// Serves until `shutdown` resolves, then cancels in-flight batches and waits
/// for open connections to finish.
///
/// # Example
///
/// ```no_run
/// use catalog_fetch::{CatalogService, Config};
/// use std::sync::Arc;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let service = Arc::new(CatalogService::new(Config::default())?);
/// catalog_fetch::api::start_api_server(service, catalog_fetch::shutdown_signal()).await?;
/// # Ok(())
/// # }
/// ```
pub async fn start_api_server<F>(service: Arc<CatalogService>, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let bind_address = service.config().api.bind_address;
    tracing::info!(address = %bind_address, "Starting API server");

    let listener = TcpListener::bind(bind_address)
        .await
        .map_err(crate::error::Error::Io)?;

    serve(listener, service, shutdown).await
}

/// Serve the API on an already bound listener
///
/// Open connections get `api.shutdown_grace` to finish after `shutdown`
/// resolves; the server is dropped once the grace period runs out.
pub async fn serve<F>(listener: TcpListener, service: Arc<CatalogService>, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let address = listener.local_addr().map_err(crate::error::Error::Io)?;
    let grace = service.config().api.shutdown_grace;
    let batches = service.shutdown_token();
    let stopping = CancellationToken::new();
    let app = create_router(service);

    tracing::info!(address = %address, "API server listening");

    let trigger = stopping.clone();
    tokio::spawn(async move {
        shutdown.await;
        tracing::info!("Shutdown requested, cancelling in-flight batches");
        batches.cancel();
        trigger.cancel();
    });

    let server = axum::serve(listener, app).with_graceful_shutdown(stopping.clone().cancelled_owned());

    tokio::select! {
        result = server => {
            result.map_err(|e| crate::error::Error::ApiServerError(e.to_string()))?;
        }
        _ = async {
            stopping.cancelled().await;
            tokio::time::sleep(grace).await;
        } => {
            tracing::warn!(grace_secs = grace.as_secs(), "Grace period elapsed, closing remaining connections");
        }
    }

    tracing::info!("API server stopped");
    Ok(())
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;
