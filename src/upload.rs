//! Multipart upload proxy to the remote file service

use crate::catalog::types::UploadResponse;
use crate::config::UploadConfig;
use crate::error::{Error, Result};
use crate::http::{FormFile, FormRequest, HttpClient};
use std::collections::BTreeMap;

/// Placeholder the file service leaves in returned hrefs
pub const BASE_URL_PLACEHOLDER: &str = "{BASE_URL}";

/// One file to forward
#[derive(Clone, Debug, Default)]
pub struct UploadRequest {
    /// Original file name
    pub file_name: String,
    /// MIME type reported by the client
    pub content_type: Option<String>,
    /// File content
    pub bytes: Vec<u8>,
    /// Stored name (without extension) requested from the file service
    pub replace_file_name: Option<String>,
    /// Sub-folder requested from the file service
    pub file_path: Option<String>,
}

/// Forwards uploads to the configured file service
#[derive(Clone, Debug)]
pub struct UploadProxy {
    http: HttpClient,
    config: UploadConfig,
}

impl UploadProxy {
    /// Create a proxy over a shared [`HttpClient`]
    pub fn new(http: HttpClient, config: UploadConfig) -> Self {
        Self { http, config }
    }

    /// Send the file as multipart field `file` and return the service's answer
    pub async fn forward(&self, request: UploadRequest) -> Result<UploadResponse> {
        if request.bytes.is_empty() {
            return Err(Error::InvalidUpload("file is empty".into()));
        }
        if request.bytes.len() > self.config.max_upload_bytes {
            return Err(Error::InvalidUpload(format!(
                "file is {} bytes, limit is {}",
                request.bytes.len(),
                self.config.max_upload_bytes
            )));
        }

        let mut fields = BTreeMap::new();
        fields.insert(
            "replaceFileName".to_string(),
            request.replace_file_name.unwrap_or_default(),
        );
        fields.insert("filePath".to_string(), request.file_path.unwrap_or_default());

        let size = request.bytes.len();
        tracing::info!(file_name = %request.file_name, size, "Forwarding upload");

        self.http
            .post_form(FormRequest {
                url: self.config.url.clone(),
                timeout: Some(self.config.timeout),
                files: vec![FormFile {
                    field: "file".to_string(),
                    file_name: request.file_name,
                    content_type: request.content_type,
                    bytes: request.bytes,
                }],
                fields,
                headers: BTreeMap::new(),
            })
            .await
    }

    /// Replace the first `{BASE_URL}` placeholder with the public base URL
    pub fn public_href(&self, href: &str) -> String {
        resolve_base_url(href, &self.config.public_base_url)
    }
}

/// Replace the first `{BASE_URL}` placeholder in `href` with `base_url`
pub fn resolve_base_url(href: &str, base_url: &str) -> String {
    href.replacen(BASE_URL_PLACEHOLDER, base_url.trim_end_matches('/'), 1)
}
