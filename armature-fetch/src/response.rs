//! Response descriptor produced by transport adapters.

use bytes::Bytes;
use http::{HeaderMap, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::{ErrorCode, FetchError, RequestConfig, Result};

/// Decoded response body.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum ResponseData {
    /// No body.
    #[default]
    Empty,
    /// Parsed JSON.
    Json(Value),
    /// UTF-8 text.
    Text(String),
    /// Raw bytes.
    Bytes(Bytes),
}

impl ResponseData {
    /// Borrow the JSON value, if the body was decoded as JSON.
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Self::Json(value) => Some(value),
            _ => None,
        }
    }

    /// Borrow the text, if the body was decoded as text.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }
}

/// Opaque handle describing the transport request behind a response.
///
/// Kept for diagnostics only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestHandle {
    adapter: String,
    method: Method,
    url: String,
}

impl RequestHandle {
    /// Describe a request issued by `adapter`.
    pub fn new(adapter: impl Into<String>, method: Method, url: impl Into<String>) -> Self {
        Self {
            adapter: adapter.into(),
            method,
            url: url.into(),
        }
    }

    /// Name of the adapter that issued the request.
    pub fn adapter(&self) -> &str {
        &self.adapter
    }

    /// Method sent on the wire.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Final URL sent on the wire.
    pub fn url(&self) -> &str {
        &self.url
    }
}

/// HTTP response.
#[derive(Debug, Clone)]
pub struct Response {
    /// Decoded body; response interceptors may replace it.
    pub data: ResponseData,
    status: StatusCode,
    status_text: String,
    headers: HeaderMap,
    config: RequestConfig,
    request: Option<RequestHandle>,
}

impl Response {
    /// Create a response for `config`.
    pub fn new(status: StatusCode, config: RequestConfig) -> Self {
        Self {
            data: ResponseData::Empty,
            status,
            status_text: status.canonical_reason().unwrap_or_default().to_string(),
            headers: HeaderMap::new(),
            config,
            request: None,
        }
    }

    /// Set the body.
    pub fn with_data(mut self, data: ResponseData) -> Self {
        self.data = data;
        self
    }

    /// Set the status text.
    pub fn with_status_text(mut self, status_text: impl Into<String>) -> Self {
        self.status_text = status_text.into();
        self
    }

    /// Set the headers.
    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    /// Set the transport handle.
    pub fn with_request(mut self, request: RequestHandle) -> Self {
        self.request = Some(request);
        self
    }

    /// Get the status code.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Get the status text.
    pub fn status_text(&self) -> &str {
        &self.status_text
    }

    /// Check if the response was successful (2xx).
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Get the response headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Get a specific header value.
    pub fn header(&self, name: impl AsRef<str>) -> Option<&str> {
        self.headers
            .get(name.as_ref())
            .and_then(|v| v.to_str().ok())
    }

    /// Configuration that produced this response.
    pub fn config(&self) -> &RequestConfig {
        &self.config
    }

    /// Transport handle, if the adapter provided one.
    pub fn request(&self) -> Option<&RequestHandle> {
        self.request.as_ref()
    }

    /// Deserialize the body into `T`.
    ///
    /// JSON bodies are converted directly; text and byte bodies are parsed.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        let parsed = match &self.data {
            ResponseData::Json(value) => serde_json::from_value(value.clone()),
            ResponseData::Text(text) => serde_json::from_str(text),
            ResponseData::Bytes(bytes) => serde_json::from_slice(bytes),
            ResponseData::Empty => serde_json::from_value(Value::Null),
        };
        parsed.map_err(|e| {
            FetchError::new(format!("Failed to decode response body: {e}"), ErrorCode::BadResponse)
                .with_config(self.config.clone())
                .with_source(e)
        })
    }

    /// Render the body as text.
    pub fn text(&self) -> Result<String> {
        match &self.data {
            ResponseData::Empty => Ok(String::new()),
            ResponseData::Text(text) => Ok(text.clone()),
            ResponseData::Json(value) => Ok(value.to_string()),
            ResponseData::Bytes(bytes) => String::from_utf8(bytes.to_vec()).map_err(|e| {
                FetchError::new(
                    format!("Response body is not valid UTF-8: {e}"),
                    ErrorCode::BadResponse,
                )
                .with_config(self.config.clone())
                .with_source(e)
            }),
        }
    }

    /// Get the content type if available.
    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }
}
