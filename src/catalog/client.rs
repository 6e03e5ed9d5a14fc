//! Typed client for the catalog API

use crate::catalog::types::{
    CreateProductResponse, NewProduct, Product, ProductEnvelope, ProductId, ProductList,
};
use crate::config::{CatalogConfig, RetryConfig};
use crate::error::{Error, Result};
use crate::fetcher::FetchOperation;
use crate::http::{HttpClient, RequestOptions};
use crate::retry::with_retry;
use async_trait::async_trait;
use std::time::Duration;

/// Client for the catalog list, detail and create endpoints
#[derive(Clone, Debug)]
pub struct CatalogClient {
    http: HttpClient,
    config: CatalogConfig,
    detail_timeout: Duration,
}

impl CatalogClient {
    /// Create a client over a shared [`HttpClient`]
    ///
    /// `detail_timeout` bounds each single-product request.
    pub fn new(http: HttpClient, config: CatalogConfig, detail_timeout: Duration) -> Self {
        Self {
            http,
            config,
            detail_timeout,
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/api/{}", self.config.base_url.trim_end_matches('/'), path)
    }

    /// Detail URL with `id` as a single percent-encoded path segment
    fn product_url(&self, id: &str) -> Result<String> {
        let endpoint = self.endpoint("product");
        let mut url = url::Url::parse(&endpoint)
            .map_err(|e| Error::InvalidRequest(format!("Invalid URL '{}': {}", endpoint, e)))?;
        url.path_segments_mut()
            .map_err(|_| Error::InvalidRequest(format!("'{}' cannot be a base URL", endpoint)))?
            .push(id);
        Ok(url.into())
    }

    /// List one page of products
    pub async fn list_products(&self, limit: u32, offset: u32) -> Result<ProductList> {
        let options = RequestOptions::new(self.endpoint("product"))
            .param("limit", limit)
            .param("offset", offset)
            .timeout(self.config.list_timeout);
        self.http.get_json(&options).await
    }

    /// Identifiers of the configured catalog page, in listing order
    pub async fn list_product_ids(&self) -> Result<Vec<ProductId>> {
        let list = self
            .list_products(self.config.list_limit, self.config.list_offset)
            .await?;
        Ok(list.ids())
    }

    /// Fetch one product by identifier
    pub async fn get_product(&self, id: &str) -> Result<Product> {
        if id.is_empty() {
            return Err(Error::InvalidRequest("empty product identifier".into()));
        }
        let options = RequestOptions::new(self.product_url(id)?).timeout(self.detail_timeout);
        let envelope: ProductEnvelope = self.http.get_json(&options).await?;
        Ok(envelope.data)
    }

    /// Create a product
    pub async fn create_product(&self, product: &NewProduct) -> Result<CreateProductResponse> {
        let options =
            RequestOptions::new(self.endpoint("product")).timeout(self.config.create_timeout);
        self.http.post_json(&options, product).await
    }
}

/// Detail fetch step used by the bounded fetcher
///
/// Each identifier is fetched with the configured retry policy.
#[derive(Clone, Debug)]
pub struct ProductFetcher {
    client: CatalogClient,
    retry: RetryConfig,
}

impl ProductFetcher {
    /// Wrap a catalog client with a retry policy
    pub fn new(client: CatalogClient, retry: RetryConfig) -> Self {
        Self { client, retry }
    }
}

#[async_trait]
impl FetchOperation<Product> for ProductFetcher {
    async fn fetch(&self, id: &str) -> Result<Product> {
        with_retry(&self.retry, || self.client.get_product(id)).await
    }
}
