//! Configuration types for catalog-fetch

use crate::error::{Error, Result};
use chrono::Offset;
use serde::{Deserialize, Serialize};
use std::{net::SocketAddr, path::PathBuf, time::Duration};

/// Main configuration
///
/// Fields are organized into logical sub-configs:
/// - [`catalog`](CatalogConfig): catalog API location and list paging
/// - [`fetch`](FetchConfig): concurrency budget, wave size, failure policy
/// - [`retry`](RetryConfig): fixed retry policy of the single-item fetch
/// - [`upload`](UploadConfig): remote upload service
/// - [`export`](ExportConfig): spreadsheet output
/// - [`api`](ApiConfig): HTTP surface
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// Catalog API settings
    #[serde(default)]
    pub catalog: CatalogConfig,

    /// Bounded fetch settings
    #[serde(default)]
    pub fetch: FetchConfig,

    /// Retry policy for single-item fetches
    #[serde(default)]
    pub retry: RetryConfig,

    /// Upload proxy settings
    #[serde(default)]
    pub upload: UploadConfig,

    /// Spreadsheet export settings
    #[serde(default)]
    pub export: ExportConfig,

    /// REST API settings
    #[serde(default)]
    pub api: ApiConfig,

    /// Offset from UTC, in minutes, used for report timestamps (default: +420, UTC+07:00)
    #[serde(default = "default_utc_offset_minutes")]
    pub utc_offset_minutes: i32,
}

impl Config {
    /// Load configuration from a JSON file, filling missing fields with defaults
    pub fn from_json_file(path: &std::path::Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&raw).map_err(|e| {
            Error::config("<file>", format!("invalid config {}: {}", path.display(), e))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Check the settings that would otherwise fail late at request time
    pub fn validate(&self) -> Result<()> {
        for (key, value) in [
            ("catalog.base_url", &self.catalog.base_url),
            ("upload.url", &self.upload.url),
            ("upload.public_base_url", &self.upload.public_base_url),
        ] {
            url::Url::parse(value)
                .map_err(|e| Error::config(key, format!("'{}' is not a valid URL: {}", value, e)))?;
        }

        if self.fetch.concurrency == 0 {
            return Err(Error::config("fetch.concurrency", "must be at least 1"));
        }
        if self.fetch.chunk_size == 0 {
            return Err(Error::config("fetch.chunk_size", "must be at least 1"));
        }
        if self.export.sheet_name.is_empty() || self.export.sheet_name.chars().count() > 31 {
            return Err(Error::config(
                "export.sheet_name",
                "sheet name must be 1 to 31 characters",
            ));
        }
        if offset_from_minutes(self.utc_offset_minutes).is_none() {
            return Err(Error::config(
                "utc_offset_minutes",
                format!("{} is out of range", self.utc_offset_minutes),
            ));
        }
        Ok(())
    }

    /// The configured report time zone
    ///
    /// Out-of-range offsets (rejected by [`Config::validate`]) fall back to UTC.
    pub fn utc_offset(&self) -> chrono::FixedOffset {
        offset_from_minutes(self.utc_offset_minutes).unwrap_or_else(|| chrono::Utc.fix())
    }
}

fn offset_from_minutes(minutes: i32) -> Option<chrono::FixedOffset> {
    minutes
        .checked_mul(60)
        .and_then(chrono::FixedOffset::east_opt)
}

/// Catalog API configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// Base URL of the catalog API (default: "http://localhost:8000")
    #[serde(default = "default_catalog_base_url")]
    pub base_url: String,

    /// Page size used when listing products (default: 1000)
    #[serde(default = "default_list_limit")]
    pub list_limit: u32,

    /// Offset used when listing products (default: 0)
    #[serde(default)]
    pub list_offset: u32,

    /// Timeout for the catalog list request (default: 10 seconds)
    #[serde(default = "default_list_timeout", with = "duration_serde")]
    pub list_timeout: Duration,

    /// Timeout for create-product requests (default: 30 seconds)
    #[serde(default = "default_request_timeout", with = "duration_serde")]
    pub create_timeout: Duration,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            base_url: default_catalog_base_url(),
            list_limit: default_list_limit(),
            list_offset: 0,
            list_timeout: default_list_timeout(),
            create_timeout: default_request_timeout(),
        }
    }
}

/// What a batch reports when some identifiers failed
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Keep successes, flag failing entries (default)
    #[default]
    Partial,
    /// Any failure fails the whole batch with the first failing identifier
    Strict,
}

/// Bounded fetch configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Maximum simultaneous in-flight detail requests (default: 100)
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Identifiers dispatched per wave (default: 1000)
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Timeout for each detail request (default: 60 seconds)
    #[serde(default = "default_detail_timeout", with = "duration_serde")]
    pub request_timeout: Duration,

    /// Batch failure policy (default: partial)
    #[serde(default)]
    pub failure_policy: FailurePolicy,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            chunk_size: default_chunk_size(),
            request_timeout: default_detail_timeout(),
            failure_policy: FailurePolicy::default(),
        }
    }
}

/// Retry configuration for transient single-item failures
///
/// The delay is fixed between attempts; there is no exponential backoff.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Retries after the first attempt (default: 3)
    #[serde(default = "default_retries")]
    pub retries: u32,

    /// Delay between attempts (default: 2 seconds)
    #[serde(default = "default_retry_delay", with = "duration_serde")]
    pub delay: Duration,

    /// Add random jitter of up to one extra delay (default: false)
    #[serde(default)]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            retries: default_retries(),
            delay: default_retry_delay(),
            jitter: false,
        }
    }
}

impl RetryConfig {
    /// Build a retry policy from raw, possibly negative, inputs
    ///
    /// A negative retry count falls back to 3, a negative delay to 2 seconds.
    pub fn from_raw(retries: i64, delay_secs: i64) -> Self {
        let retries = if retries < 0 {
            default_retries()
        } else {
            u32::try_from(retries).unwrap_or(u32::MAX)
        };
        let delay = if delay_secs < 0 {
            default_retry_delay()
        } else {
            Duration::from_secs(delay_secs.unsigned_abs())
        };
        Self {
            retries,
            delay,
            jitter: false,
        }
    }

    /// Policy that never retries
    pub fn none() -> Self {
        Self {
            retries: 0,
            delay: Duration::ZERO,
            jitter: false,
        }
    }
}

/// Upload proxy configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UploadConfig {
    /// Remote upload endpoint (default: "http://localhost:8001/api/upload")
    #[serde(default = "default_upload_url")]
    pub url: String,

    /// Replacement for the `{BASE_URL}` placeholder in returned file hrefs
    /// (default: "http://localhost:8001")
    #[serde(default = "default_public_base_url")]
    pub public_base_url: String,

    /// Upload request timeout (default: 60 seconds)
    #[serde(default = "default_upload_timeout", with = "duration_serde")]
    pub timeout: Duration,

    /// Maximum accepted multipart body size in bytes (default: 16 MiB)
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            url: default_upload_url(),
            public_base_url: default_public_base_url(),
            timeout: default_upload_timeout(),
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

/// Spreadsheet export configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Whether fetch reports are written to a spreadsheet (default: true)
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Output file (default: "Book1.xlsx")
    #[serde(default = "default_export_path")]
    pub path: PathBuf,

    /// Worksheet name (default: "Sheet1")
    #[serde(default = "default_sheet_name")]
    pub sheet_name: String,

    /// Column headers; inferred from the first row when empty
    #[serde(default = "default_product_headers")]
    pub headers: Vec<String>,

    /// Column width in characters (default: 20)
    #[serde(default = "default_column_width")]
    pub column_width: f64,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: default_export_path(),
            sheet_name: default_sheet_name(),
            headers: default_product_headers(),
            column_width: default_column_width(),
        }
    }
}

/// REST API configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Address to bind to (default: 0.0.0.0:8080)
    #[serde(default = "default_bind_address")]
    pub bind_address: SocketAddr,

    /// Enable CORS for browser access (default: true)
    #[serde(default = "default_true")]
    pub cors_enabled: bool,

    /// Allowed CORS origins (default: ["*"])
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,

    /// Grace period for in-flight requests on shutdown (default: 10 seconds)
    #[serde(default = "default_shutdown_grace", with = "duration_serde")]
    pub shutdown_grace: Duration,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            cors_enabled: true,
            cors_origins: default_cors_origins(),
            shutdown_grace: default_shutdown_grace(),
        }
    }
}

fn default_catalog_base_url() -> String {
    "http://localhost:8000".into()
}

fn default_list_limit() -> u32 {
    1000
}

fn default_list_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_detail_timeout() -> Duration {
    Duration::from_secs(60)
}

fn default_concurrency() -> usize {
    100
}

fn default_chunk_size() -> usize {
    1000
}

fn default_retries() -> u32 {
    3
}

fn default_retry_delay() -> Duration {
    Duration::from_secs(2)
}

fn default_upload_url() -> String {
    "http://localhost:8001/api/upload".into()
}

fn default_public_base_url() -> String {
    "http://localhost:8001".into()
}

fn default_upload_timeout() -> Duration {
    Duration::from_secs(60)
}

fn default_max_upload_bytes() -> usize {
    16 * 1024 * 1024
}

fn default_export_path() -> PathBuf {
    PathBuf::from("Book1.xlsx")
}

fn default_sheet_name() -> String {
    "Sheet1".into()
}

fn default_product_headers() -> Vec<String> {
    ["ID", "Name", "Description", "Price", "Image", "Stock"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_column_width() -> f64 {
    20.0
}

fn default_bind_address() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8080))
}

fn default_cors_origins() -> Vec<String> {
    vec!["*".into()]
}

fn default_shutdown_grace() -> Duration {
    Duration::from_secs(10)
}

fn default_utc_offset_minutes() -> i32 {
    7 * 60
}

fn default_true() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            catalog: CatalogConfig::default(),
            fetch: FetchConfig::default(),
            retry: RetryConfig::default(),
            upload: UploadConfig::default(),
            export: ExportConfig::default(),
            api: ApiConfig::default(),
            utc_offset_minutes: default_utc_offset_minutes(),
        }
    }
}

// Duration serialization helper (whole seconds)
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
