//! JSON and multipart HTTP client used for every outbound call
//!
//! One shared [`reqwest::Client`] (connection pool) backs all requests. Each
//! call carries its own timeout; errors are classified into the crate's
//! request taxonomy (construction, transport, status, body, decode).

use crate::error::{Error, Result};
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::time::Duration;

/// Default timeout for JSON GET/POST requests
pub const DEFAULT_JSON_TIMEOUT: Duration = Duration::from_secs(30);

/// Default timeout for multipart uploads
pub const DEFAULT_FORM_TIMEOUT: Duration = Duration::from_secs(60);

/// Maximum number of response body bytes kept in a status error
const ERROR_BODY_EXCERPT: usize = 512;

const CONTENT_TYPE_JSON: &str = "application/json";

/// Options for a JSON request
#[derive(Clone, Debug, Default)]
pub struct RequestOptions {
    /// Absolute request URL
    pub url: String,
    /// Per-request timeout; `None` or zero uses [`DEFAULT_JSON_TIMEOUT`]
    pub timeout: Option<Duration>,
    /// Query parameters; multiple values for one key are joined with `,`
    pub params: BTreeMap<String, Vec<String>>,
    /// Extra headers; when empty, `Content-Type: application/json` is sent
    pub headers: BTreeMap<String, String>,
}

impl RequestOptions {
    /// Options for a plain request to `url`
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    /// Set the request timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Add a query parameter value
    pub fn param(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.params
            .entry(key.into())
            .or_default()
            .push(value.to_string());
        self
    }

    /// Add a header
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }
}

/// One file part of a multipart form
#[derive(Clone, Debug)]
pub struct FormFile {
    /// Form field name; empty means `file`
    pub field: String,
    /// File name sent with the part
    pub file_name: String,
    /// MIME type of the content, if known
    pub content_type: Option<String>,
    /// File content
    pub bytes: Vec<u8>,
}

/// A multipart POST request
#[derive(Clone, Debug, Default)]
pub struct FormRequest {
    /// Absolute request URL
    pub url: String,
    /// Per-request timeout; `None` or zero uses [`DEFAULT_FORM_TIMEOUT`]
    pub timeout: Option<Duration>,
    /// File parts
    pub files: Vec<FormFile>,
    /// Text fields
    pub fields: BTreeMap<String, String>,
    /// Extra headers (Content-Type is always set by the multipart encoder)
    pub headers: BTreeMap<String, String>,
}

/// Shared HTTP client
#[derive(Clone, Debug, Default)]
pub struct HttpClient {
    inner: reqwest::Client,
}

impl HttpClient {
    /// Create a client with its own connection pool
    pub fn new() -> Result<Self> {
        let inner = reqwest::Client::builder()
            .user_agent(concat!("catalog-fetch/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::InvalidRequest(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { inner })
    }

    /// GET `options.url` and decode the JSON body into `T`
    pub async fn get_json<T: DeserializeOwned>(&self, options: &RequestOptions) -> Result<T> {
        let url = build_url(&options.url, &options.params)?;
        let request = self
            .inner
            .get(url.clone())
            .headers(json_headers(&options.headers)?)
            .timeout(effective_timeout(options.timeout, DEFAULT_JSON_TIMEOUT));

        tracing::debug!(url = %url, "GET");
        let response = request.send().await?;
        decode_response(url.as_str(), response).await
    }

    /// POST `body` as JSON to `options.url` and decode the JSON response into `T`
    pub async fn post_json<B, T>(&self, options: &RequestOptions, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = build_url(&options.url, &options.params)?;
        let payload = serde_json::to_vec(body)?;
        let request = self
            .inner
            .post(url.clone())
            .headers(json_headers(&BTreeMap::new())?)
            .headers(parse_headers(&options.headers)?)
            .body(payload)
            .timeout(effective_timeout(options.timeout, DEFAULT_JSON_TIMEOUT));

        tracing::debug!(url = %url, "POST");
        let response = request.send().await?;
        decode_response(url.as_str(), response).await
    }

    /// POST a multipart form and decode the JSON response into `T`
    pub async fn post_form<T: DeserializeOwned>(&self, form_request: FormRequest) -> Result<T> {
        let FormRequest {
            url,
            timeout,
            files,
            fields,
            headers,
        } = form_request;
        let url = build_url(&url, &BTreeMap::new())?;

        let mut form = reqwest::multipart::Form::new();
        for file in files {
            let field = if file.field.is_empty() {
                "file".to_string()
            } else {
                file.field
            };
            let mut part = reqwest::multipart::Part::bytes(file.bytes).file_name(file.file_name);
            if let Some(mime) = file.content_type {
                part = part.mime_str(&mime).map_err(|e| {
                    Error::InvalidRequest(format!("Invalid content type '{}': {}", mime, e))
                })?;
            }
            form = form.part(field, part);
        }
        for (key, value) in fields {
            form = form.text(key, value);
        }

        let request = self
            .inner
            .post(url.clone())
            .headers(parse_headers(&headers)?)
            .multipart(form)
            .timeout(effective_timeout(timeout, DEFAULT_FORM_TIMEOUT));

        tracing::debug!(url = %url, "POST multipart");
        let response = request.send().await?;
        decode_response(url.as_str(), response).await
    }
}

/// Parse the URL and merge query parameters into it
fn build_url(raw: &str, params: &BTreeMap<String, Vec<String>>) -> Result<url::Url> {
    let mut url = url::Url::parse(raw)
        .map_err(|e| Error::InvalidRequest(format!("Invalid URL '{}': {}", raw, e)))?;

    if !params.is_empty() {
        // Replace rather than append so a param given in both places is sent once
        let mut merged: BTreeMap<String, String> = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        for (key, values) in params {
            merged.insert(key.clone(), values.join(","));
        }
        url.query_pairs_mut().clear().extend_pairs(merged.iter());
    }
    Ok(url)
}

fn effective_timeout(timeout: Option<Duration>, default: Duration) -> Duration {
    match timeout {
        Some(t) if !t.is_zero() => t,
        _ => default,
    }
}

fn parse_headers(headers: &BTreeMap<String, String>) -> Result<HeaderMap> {
    let mut map = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| Error::InvalidRequest(format!("Invalid header name '{}': {}", name, e)))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| Error::InvalidRequest(format!("Invalid header value: {}", e)))?;
        map.insert(name, value);
    }
    Ok(map)
}

fn json_headers(headers: &BTreeMap<String, String>) -> Result<HeaderMap> {
    if headers.is_empty() {
        let mut map = HeaderMap::with_capacity(1);
        map.insert(CONTENT_TYPE, HeaderValue::from_static(CONTENT_TYPE_JSON));
        Ok(map)
    } else {
        parse_headers(headers)
    }
}

/// Check status, read the body and decode it
async fn decode_response<T: DeserializeOwned>(url: &str, response: reqwest::Response) -> Result<T> {
    let status = response.status();
    let body = response.bytes().await.map_err(|e| Error::Body {
        url: url.to_string(),
        reason: e.to_string(),
    })?;

    if !status.is_success() {
        let excerpt: String = String::from_utf8_lossy(&body)
            .chars()
            .take(ERROR_BODY_EXCERPT)
            .collect();
        return Err(Error::Status {
            url: url.to_string(),
            status: status.as_u16(),
            body: excerpt,
        });
    }

    serde_json::from_slice(&body).map_err(|source| Error::Decode {
        url: url.to_string(),
        source,
    })
}
