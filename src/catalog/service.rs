//! Catalog service: id cache, batch fetch reports, spreadsheet export, product creation

use crate::catalog::client::{CatalogClient, ProductFetcher};
use crate::catalog::types::{CreatedProduct, NewProduct, Product, ProductId};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::export::SheetWriter;
use crate::fetcher::{BoundedFetcher, FetchBudget, FetchOperation};
use crate::http::HttpClient;
use crate::upload::{UploadProxy, UploadRequest};
use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

/// Sub-folder the file service stores product images under
pub const PRODUCT_IMAGE_FOLDER: &str = "products";

/// Overall outcome of a fetch report
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportStatus {
    /// Every identifier was fetched
    Success,
    /// Some identifiers failed; `failures` lists them
    Partial,
}

/// One identifier that could not be fetched
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FailedFetch {
    /// Product identifier
    pub id: ProductId,
    /// Human-readable failure cause
    pub message: String,
}

/// Aggregate answer of one catalog fetch
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FetchReport {
    /// Overall outcome
    pub status: ReportStatus,
    /// Number of fetched products
    pub total: usize,
    /// Number of identifiers that failed
    pub failed: usize,
    /// Elapsed wall time, e.g. `"12.34 ms"`
    pub durations: String,
    /// Fetched products, in catalog order
    pub products: Vec<Product>,
    /// Failed identifiers, in catalog order
    pub failures: Vec<FailedFetch>,
    /// When the report was produced, in the configured UTC offset
    pub generated_at: DateTime<FixedOffset>,
    /// Spreadsheet written for this report, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spreadsheet: Option<PathBuf>,
}

/// Multipart input of the create-product operation
#[derive(Clone, Debug, Default)]
pub struct ProductDraft {
    /// Display name; also the stored image name
    pub name: String,
    /// Unit price
    pub price: f64,
    /// Free-text description
    pub description: String,
    /// Units in stock
    pub stock: i64,
    /// Image file name
    pub file_name: String,
    /// Image MIME type
    pub content_type: Option<String>,
    /// Image content
    pub image: Vec<u8>,
}

/// Glue between the catalog API, the bounded fetcher, export and uploads
pub struct CatalogService {
    config: Arc<Config>,
    client: CatalogClient,
    fetcher: BoundedFetcher<Product>,
    single: ProductFetcher,
    uploads: UploadProxy,
    writer: SheetWriter,
    ids: RwLock<Vec<ProductId>>,
    shutdown: CancellationToken,
}

impl CatalogService {
    /// Build the service and its HTTP clients from configuration
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let http = HttpClient::new()?;
        let client = CatalogClient::new(
            http.clone(),
            config.catalog.clone(),
            config.fetch.request_timeout,
        );
        let single = ProductFetcher::new(client.clone(), config.retry.clone());
        let fetcher = BoundedFetcher::new(
            Arc::new(single.clone()),
            FetchBudget::from(&config.fetch),
        );
        let uploads = UploadProxy::new(http, config.upload.clone());
        let writer = SheetWriter::new(config.export.clone());

        Ok(Self {
            config: Arc::new(config),
            client,
            fetcher,
            single,
            uploads,
            writer,
            ids: RwLock::new(Vec::new()),
            shutdown: CancellationToken::new(),
        })
    }

    /// Active configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Upload proxy sharing this service's HTTP client
    pub fn uploads(&self) -> &UploadProxy {
        &self.uploads
    }

    /// Token cancelled on shutdown; batches started by the API observe it
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Refresh the cached identifier list from the catalog
    ///
    /// Returns the number of identifiers now cached.
    pub async fn load_catalog(&self) -> Result<usize> {
        let ids = self.client.list_product_ids().await?;
        let count = ids.len();
        *self.ids.write().await = ids;
        tracing::info!(count, "Catalog loaded");
        Ok(count)
    }

    /// Cached identifiers in catalog order
    pub async fn cached_ids(&self) -> Vec<ProductId> {
        self.ids.read().await.clone()
    }

    /// Cached identifiers, loading the catalog first if nothing is cached
    async fn ids_or_load(&self) -> Result<Vec<ProductId>> {
        let ids = self.cached_ids().await;
        if !ids.is_empty() {
            return Ok(ids);
        }
        self.load_catalog().await?;
        Ok(self.cached_ids().await)
    }

    /// Fetch every cached identifier with the bounded fetcher
    ///
    /// Applies the configured failure policy and exports the fetched products.
    pub async fn fetch_all(&self, cancel: &CancellationToken) -> Result<FetchReport> {
        let started = Instant::now();
        let ids = self.ids_or_load().await?;

        let results = self.fetcher.fetch_all(&ids, cancel).await;
        // A cancelled batch is incomplete; keep the previous spreadsheet
        if cancel.is_cancelled() {
            tracing::warn!(
                total = results.len(),
                fetched = results.success_count(),
                "Fetch cancelled, skipping report and export"
            );
            return Err(Error::Cancelled);
        }
        let results = results.with_policy(self.config.fetch.failure_policy)?;

        let (fetched, failed) = results.into_parts();
        let products = fetched.into_iter().map(|(_, product)| product).collect();
        let failures = failed
            .into_iter()
            .map(|(id, error)| FailedFetch {
                id,
                message: error.to_string(),
            })
            .collect();

        Ok(self.report(products, failures, started).await)
    }

    /// Fetch cached identifiers one at a time, stopping at the first failure
    pub async fn fetch_sequential(&self, cancel: &CancellationToken) -> Result<FetchReport> {
        let started = Instant::now();
        let ids = self.ids_or_load().await?;

        let mut products = Vec::with_capacity(ids.len());
        for id in &ids {
            let product = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(Error::Cancelled),
                result = self.single.fetch(id) => result,
            };
            match product {
                Ok(product) => {
                    tracing::debug!(id = %id, "Fetched");
                    products.push(product);
                }
                Err(e) => {
                    tracing::error!(id = %id, error = %e, "Sequential fetch stopped");
                    return Err(Error::Batch {
                        id: id.clone(),
                        cause: e.to_string(),
                    });
                }
            }
        }

        Ok(self.report(products, Vec::new(), started).await)
    }

    async fn report(
        &self,
        products: Vec<Product>,
        failures: Vec<FailedFetch>,
        started: Instant,
    ) -> FetchReport {
        let spreadsheet = self.export(&products).await;
        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;

        FetchReport {
            status: if failures.is_empty() {
                ReportStatus::Success
            } else {
                ReportStatus::Partial
            },
            total: products.len(),
            failed: failures.len(),
            durations: format!("{:.2} ms", elapsed_ms),
            products,
            failures,
            generated_at: Utc::now().with_timezone(&self.config.utc_offset()),
            spreadsheet,
        }
    }

    /// Export products; failures are logged and do not fail the report
    async fn export(&self, products: &[Product]) -> Option<PathBuf> {
        if !self.config.export.enabled {
            return None;
        }
        let path = self.writer.default_path().to_path_buf();
        match self.writer.write(products, &path).await {
            Ok(true) => Some(path),
            Ok(false) => None,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Failed to write spreadsheet");
                None
            }
        }
    }

    /// Upload the product image, then create the product in the catalog
    pub async fn create_product(&self, draft: ProductDraft) -> Result<CreatedProduct> {
        if draft.name.trim().is_empty() {
            return Err(Error::InvalidUpload("product name is required".into()));
        }

        let uploaded = self
            .uploads
            .forward(UploadRequest {
                file_name: draft.file_name,
                content_type: draft.content_type,
                bytes: draft.image,
                replace_file_name: Some(draft.name.clone()),
                file_path: Some(PRODUCT_IMAGE_FOLDER.to_string()),
            })
            .await?;

        let product = NewProduct {
            image: self.uploads.public_href(&uploaded.data.href),
            name: draft.name,
            price: draft.price,
            description: draft.description,
            stock: draft.stock,
        };

        let created = self.client.create_product(&product).await?;
        tracing::info!(id = %created.data.id, name = %created.data.name, "Product created");
        Ok(created.data)
    }
}
