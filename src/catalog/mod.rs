//! Product catalog: wire types, API client and the service tying fetch, export and uploads together

pub mod client;
pub mod service;
pub mod types;

pub use client::{CatalogClient, ProductFetcher};
pub use service::{CatalogService, FailedFetch, FetchReport, ProductDraft, ReportStatus};
pub use types::{
    CreateProductResponse, CreatedProduct, NewProduct, Product, ProductEnvelope, ProductId,
    ProductList, UploadResponse, UploadedFile,
};
