//! Wire types of the catalog and upload services

use serde::{Deserialize, Serialize};

/// Identifier of one catalog product
pub type ProductId = String;

/// One product as returned by the catalog detail endpoint
///
/// Serialized with the catalog's capitalized field names, which are also the
/// spreadsheet column headers. Lowercase names are accepted on input.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Product {
    /// Product identifier
    #[serde(rename = "ID", alias = "id")]
    pub id: ProductId,

    /// Self link
    pub href: String,

    /// Display name
    #[serde(rename = "Name", alias = "name")]
    pub name: String,

    /// Free-text description
    #[serde(rename = "Description", alias = "description")]
    pub description: String,

    /// Unit price
    #[serde(rename = "Price", alias = "price")]
    pub price: f64,

    /// Image URL
    #[serde(rename = "Image", alias = "image")]
    pub image: String,

    /// Units in stock
    #[serde(rename = "Stock", alias = "stock")]
    pub stock: i64,
}

/// Response of the catalog list endpoint
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ProductList {
    /// Upstream success flag
    pub success: bool,
    /// Upstream message
    pub message: String,
    /// Upstream status code echoed in the body
    pub status_code: u16,
    /// One page of products
    pub data: Vec<Product>,
    /// Total number of products in the catalog
    pub total: u64,
}

impl ProductList {
    /// Identifiers of the listed products, in listing order
    pub fn ids(&self) -> Vec<ProductId> {
        self.data.iter().map(|p| p.id.clone()).collect()
    }
}

/// Response of the catalog detail endpoint
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProductEnvelope {
    /// The product
    pub data: Product,
}

/// Body sent to the catalog to create a product
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct NewProduct {
    /// Display name
    pub name: String,
    /// Unit price
    pub price: f64,
    /// Free-text description
    pub description: String,
    /// Public image URL
    pub image: String,
    /// Units in stock
    pub stock: i64,
}

/// Product as echoed back by the catalog after creation
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CreatedProduct {
    /// Assigned identifier
    pub id: ProductId,
    /// Display name
    pub name: String,
    /// Unit price
    pub price: f64,
    /// Units in stock
    pub stock: i64,
    /// Free-text description
    pub description: String,
    /// Public image URL
    pub image: String,
}

/// Response of the catalog create endpoint
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CreateProductResponse {
    /// Upstream success flag
    pub success: bool,
    /// Upstream message
    pub message: String,
    /// Created product
    pub data: CreatedProduct,
    /// Upstream status code echoed in the body
    pub status_code: u16,
}

/// File record returned by the upload service
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct UploadedFile {
    /// Stored file identifier
    pub id: String,
    /// Download link; may contain a `{BASE_URL}` placeholder
    pub href: String,
    /// Stored file name
    pub file_name: String,
    /// Directory the file was stored under
    pub file_path: String,
    /// MIME type reported by the upload service
    pub mimetype: String,
    /// Size in bytes
    pub size: u64,
}

/// Response of the upload service
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct UploadResponse {
    /// Upstream success flag
    pub success: bool,
    /// Upstream message
    pub message: String,
    /// Upstream status code echoed in the body
    pub status_code: u16,
    /// Stored file
    pub data: UploadedFile,
}
