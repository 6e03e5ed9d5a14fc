//! Route handlers for the REST API
//!
//! Handlers are organized by domain:
//! - [`catalog`]: identifier cache and fetch reports
//! - [`products`]: product creation
//! - [`upload`]: upload proxy
//! - [`system`]: health

use crate::error::ApiError;
use axum::extract::Multipart;
use std::collections::HashMap;

mod catalog;
mod products;
mod system;
mod upload;

pub use catalog::*;
pub use products::*;
pub use system::*;
pub use upload::*;

/// The `file` part of a multipart request
#[derive(Debug, Default)]
pub(crate) struct FilePart {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

/// A multipart request split into its `file` part and text fields
#[derive(Debug, Default)]
pub(crate) struct MultipartForm {
    pub file: Option<FilePart>,
    pub fields: HashMap<String, String>,
}

impl MultipartForm {
    /// Drain a multipart body
    pub async fn read(mut multipart: Multipart) -> Result<Self, ApiError> {
        let mut form = Self::default();

        loop {
            let field = match multipart.next_field().await {
                Ok(Some(field)) => field,
                Ok(None) => break,
                Err(e) => {
                    return Err(ApiError::new(
                        "invalid_multipart",
                        format!("Failed to read multipart body: {}", e),
                    ));
                }
            };
            let name = field.name().unwrap_or("").to_string();

            if name == "file" {
                let file_name = field.file_name().unwrap_or("upload").to_string();
                let content_type = field.content_type().map(str::to_string);
                let bytes = field.bytes().await.map_err(|e| {
                    ApiError::new("invalid_file", format!("Failed to read file: {}", e))
                })?;
                form.file = Some(FilePart {
                    file_name,
                    content_type,
                    bytes: bytes.to_vec(),
                });
            } else if !name.is_empty() {
                let value = field.text().await.map_err(|e| {
                    ApiError::validation(format!("Field '{}' is not valid text: {}", name, e))
                })?;
                form.fields.insert(name, value);
            }
        }

        Ok(form)
    }

    /// The `file` part, or a `missing_file` error
    pub fn require_file(&mut self) -> Result<FilePart, ApiError> {
        self.file
            .take()
            .ok_or_else(|| ApiError::new("missing_file", "No file provided in 'file' field"))
    }

    /// A text field, trimmed; `None` when absent or blank
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }
}
