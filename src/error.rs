//! Error types for catalog-fetch
//!
//! This module provides the error handling for the library, including:
//! - The per-request failure taxonomy (construction, transport, status, body, decode)
//! - Batch-level errors produced by the strict failure policy
//! - HTTP status code mapping for the API surface
//! - Structured error responses with machine-readable error codes

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for catalog-fetch operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for catalog-fetch
///
/// Per-identifier failures inside a batch are carried as values of this type in
/// [`FetchOutcome`](crate::fetcher::FetchOutcome); they never abort sibling fetches.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "catalog.base_url")
        key: Option<String>,
    },

    /// The request could not be constructed (bad URL, bad header, bad form part)
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Transport-level failure: connect, timeout, TLS, redirect loop
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The remote answered with a non-success status code
    #[error("{url} returned status {status}: {body}")]
    Status {
        /// Request URL
        url: String,
        /// HTTP status code
        status: u16,
        /// Leading part of the response body
        body: String,
    },

    /// The response body could not be read
    #[error("failed to read response body from {url}: {reason}")]
    Body {
        /// Request URL
        url: String,
        /// Underlying reason
        reason: String,
    },

    /// The response body was not the expected JSON shape
    #[error("failed to decode response from {url}: {source}")]
    Decode {
        /// Request URL
        url: String,
        /// JSON error
        #[source]
        source: serde_json::Error,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error outside of response decoding
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Spreadsheet generation failed
    #[error("spreadsheet error: {0}")]
    Spreadsheet(String),

    /// The operation was cancelled before it completed
    #[error("operation cancelled")]
    Cancelled,

    /// A batch failed under the strict failure policy
    #[error("fetch of '{id}' failed: {cause}")]
    Batch {
        /// Identifier of the first failing item (input order)
        id: String,
        /// Human-readable failure cause
        cause: String,
    },

    /// A requested resource is not available
    #[error("not found: {0}")]
    NotFound(String),

    /// The incoming upload is missing parts or malformed
    #[error("invalid upload: {0}")]
    InvalidUpload(String),

    /// API server error
    #[error("API server error: {0}")]
    ApiServerError(String),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Build a configuration error for the given key
    pub fn config(key: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.into()),
        }
    }
}

impl From<rust_xlsxwriter::XlsxError> for Error {
    fn from(e: rust_xlsxwriter::XlsxError) -> Self {
        Error::Spreadsheet(e.to_string())
    }
}

/// API error response format
///
/// # Example JSON Response
///
/// ```json
/// {
///   "error": {
///     "code": "upstream_status",
///     "message": "http://localhost:8000/api/product/7 returned status 404: not found",
///     "details": { "status": 404 }
///   }
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    /// The error details
    pub error: ErrorDetail,
}

/// Detailed error information for API responses
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorDetail {
    /// Machine-readable error code (e.g., "not_found", "invalid_upload")
    pub code: String,

    /// Human-readable error message
    pub message: String,

    /// Optional additional context about the error
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    /// Create a new API error with code and message
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ErrorDetail {
                code: code.into(),
                message: message.into(),
                details: None,
            },
        }
    }

    /// Create a "validation error" error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new("validation_error", message)
    }
}

/// Convert errors to HTTP status codes for API responses
pub trait ToHttpStatus {
    /// Get the HTTP status code for this error
    fn status_code(&self) -> u16;

    /// Get the machine-readable error code
    fn error_code(&self) -> &str;
}

impl ToHttpStatus for Error {
    fn status_code(&self) -> u16 {
        match self {
            // 400 Bad Request - Client error (invalid input)
            Error::Config { .. } => 400,
            Error::InvalidUpload(_) => 400,

            // 404 Not Found
            Error::NotFound(_) => 404,

            // 500 Internal Server Error - Server-side issues
            Error::InvalidRequest(_) => 500,
            Error::Io(_) => 500,
            Error::Serialization(_) => 500,
            Error::Spreadsheet(_) => 500,
            Error::ApiServerError(_) => 500,
            Error::Other(_) => 500,

            // 502 Bad Gateway - Upstream service errors
            Error::Status { .. } => 502,
            Error::Body { .. } => 502,
            Error::Decode { .. } => 502,
            Error::Batch { .. } => 502,
            Error::Transport(e) if e.is_timeout() => 504,
            Error::Transport(_) => 502,

            // 503 Service Unavailable
            Error::Cancelled => 503,
        }
    }

    fn error_code(&self) -> &str {
        match self {
            Error::Config { .. } => "config_error",
            Error::InvalidRequest(_) => "invalid_request",
            Error::Transport(e) if e.is_timeout() => "upstream_timeout",
            Error::Transport(_) => "transport_error",
            Error::Status { .. } => "upstream_status",
            Error::Body { .. } => "body_read_error",
            Error::Decode { .. } => "decode_error",
            Error::Io(_) => "io_error",
            Error::Serialization(_) => "serialization_error",
            Error::Spreadsheet(_) => "spreadsheet_error",
            Error::Cancelled => "cancelled",
            Error::Batch { .. } => "batch_failed",
            Error::NotFound(_) => "not_found",
            Error::InvalidUpload(_) => "invalid_upload",
            Error::ApiServerError(_) => "api_server_error",
            Error::Other(_) => "internal_error",
        }
    }
}

impl From<Error> for ApiError {
    fn from(error: Error) -> Self {
        let code = error.error_code().to_string();
        let message = error.to_string();

        let details = match &error {
            Error::Status { url, status, .. } => Some(serde_json::json!({
                "url": url,
                "status": status,
            })),
            Error::Batch { id, .. } => Some(serde_json::json!({
                "id": id,
            })),
            Error::Config { key: Some(key), .. } => Some(serde_json::json!({
                "key": key,
            })),
            _ => None,
        };

        ApiError {
            error: ErrorDetail {
                code,
                message,
                details,
            },
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn decode_error() -> serde_json::Error {
        serde_json::from_str::<serde_json::Value>("{not json").unwrap_err()
    }

    /// (Error, expected_status_code, expected_error_code) for every
    /// variant that can be built without a live transport.
    fn all_error_variants() -> Vec<(Error, u16, &'static str)> {
        vec![
            (
                Error::config("catalog.base_url", "missing scheme"),
                400,
                "config_error",
            ),
            (
                Error::InvalidUpload("no file part".into()),
                400,
                "invalid_upload",
            ),
            (Error::NotFound("product 9".into()), 404, "not_found"),
            (
                Error::InvalidRequest("relative URL without a base".into()),
                500,
                "invalid_request",
            ),
            (
                Error::Io(std::io::Error::new(std::io::ErrorKind::NotFound, "gone")),
                500,
                "io_error",
            ),
            (
                Error::Serialization(decode_error()),
                500,
                "serialization_error",
            ),
            (
                Error::Spreadsheet("sheet name too long".into()),
                500,
                "spreadsheet_error",
            ),
            (
                Error::ApiServerError("bind failed".into()),
                500,
                "api_server_error",
            ),
            (Error::Other("unknown".into()), 500, "internal_error"),
            (
                Error::Status {
                    url: "http://catalog/api/product/1".into(),
                    status: 404,
                    body: "missing".into(),
                },
                502,
                "upstream_status",
            ),
            (
                Error::Body {
                    url: "http://catalog/api/product/1".into(),
                    reason: "connection closed".into(),
                },
                502,
                "body_read_error",
            ),
            (
                Error::Decode {
                    url: "http://catalog/api/product/1".into(),
                    source: decode_error(),
                },
                502,
                "decode_error",
            ),
            (
                Error::Batch {
                    id: "p-2".into(),
                    cause: "timeout".into(),
                },
                502,
                "batch_failed",
            ),
            (Error::Cancelled, 503, "cancelled"),
        ]
    }

    #[test]
    fn every_variant_maps_to_expected_status_code() {
        for (error, expected_status, expected_code) in all_error_variants() {
            let actual_status = error.status_code();
            assert_eq!(
                actual_status, expected_status,
                "error_code={expected_code} returned status {actual_status}, expected {expected_status}"
            );
        }
    }

    #[test]
    fn every_variant_maps_to_expected_error_code() {
        for (error, _, expected_code) in all_error_variants() {
            assert_eq!(error.error_code(), expected_code);
        }
    }

    #[test]
    fn status_error_carries_url_and_status_in_details() {
        let error = Error::Status {
            url: "http://catalog/api/product/7".into(),
            status: 503,
            body: "busy".into(),
        };
        let api_error: ApiError = error.into();

        assert_eq!(api_error.error.code, "upstream_status");
        assert!(api_error.error.message.contains("503"));
        let details = api_error.error.details.unwrap();
        assert_eq!(details["status"], 503);
        assert_eq!(details["url"], "http://catalog/api/product/7");
    }

    #[test]
    fn batch_error_references_failing_identifier() {
        let error = Error::Batch {
            id: "p-42".into(),
            cause: "transport error".into(),
        };
        assert!(error.to_string().contains("p-42"));

        let api_error: ApiError = error.into();
        assert_eq!(api_error.error.details.unwrap()["id"], "p-42");
    }

    #[test]
    fn api_error_omits_empty_details_when_serialized() {
        let api_error = ApiError::validation("price must be a number");
        let json = serde_json::to_value(&api_error).unwrap();

        assert_eq!(json["error"]["code"], "validation_error");
        assert!(json["error"].get("details").is_none());
    }
}
