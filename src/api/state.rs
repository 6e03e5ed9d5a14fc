//! Application state for the API server

use crate::Config;
use crate::catalog::CatalogService;
use std::sync::Arc;

/// Shared application state accessible to all route handlers
///
/// Cloned for each request (cheap Arc clone).
#[derive(Clone)]
pub struct AppState {
    /// Catalog service backing every route
    pub service: Arc<CatalogService>,

    /// Configuration snapshot taken when the router was built
    pub config: Arc<Config>,
}

impl AppState {
    /// Create a new AppState
    pub fn new(service: Arc<CatalogService>, config: Arc<Config>) -> Self {
        Self { service, config }
    }
}
