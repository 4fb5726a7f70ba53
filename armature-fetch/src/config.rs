//! Request configuration.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http::Method;
use serde::Serialize;
use serde_json::{Map, Value, json};

use crate::adapter::{Adapter, AdapterSelector};
use crate::headers::has_header;
use crate::{CancelToken, ParamMap, ParamValue};

/// Default adapter name.
pub const DEFAULT_ADAPTER: &str = "http";

/// Header sections that hold method-specific or shared headers.
pub const HEADER_SECTIONS: [&str; 8] = [
    "delete", "get", "head", "options", "post", "put", "patch", "common",
];

/// Request body.
#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    /// JSON document.
    Json(Value),
    /// Plain text.
    Text(String),
    /// Raw bytes.
    Bytes(Bytes),
    /// URL-encoded form fields.
    Form(ParamMap),
}

impl From<Value> for Body {
    fn from(value: Value) -> Self {
        Self::Json(value)
    }
}

impl From<String> for Body {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&str> for Body {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<Bytes> for Body {
    fn from(bytes: Bytes) -> Self {
        Self::Bytes(bytes)
    }
}

impl From<ParamMap> for Body {
    fn from(fields: ParamMap) -> Self {
        Self::Form(fields)
    }
}

/// How the adapter should decode the response body.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ResponseType {
    /// Parse JSON, falling back to text when the body is not JSON.
    #[default]
    Json,
    /// Decode as UTF-8 text.
    Text,
    /// Keep the raw bytes.
    Bytes,
}

impl ResponseType {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Text => "text",
            Self::Bytes => "bytes",
        }
    }
}

/// Predicate deciding whether a status code counts as success.
#[derive(Clone)]
pub struct ValidateStatus(Arc<dyn Fn(u16) -> bool + Send + Sync>);

impl ValidateStatus {
    /// Wrap a custom predicate.
    pub fn new<F>(predicate: F) -> Self
    where
        F: Fn(u16) -> bool + Send + Sync + 'static,
    {
        Self(Arc::new(predicate))
    }

    /// Accept statuses in `[200, 300)`.
    pub fn success() -> Self {
        Self::new(|status| (200..300).contains(&status))
    }

    /// Accept every status.
    pub fn any() -> Self {
        Self::new(|_| true)
    }

    /// Evaluate the predicate.
    pub fn check(&self, status: u16) -> bool {
        (self.0)(status)
    }
}

impl fmt::Debug for ValidateStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ValidateStatus(..)")
    }
}

/// Custom query-string serializer.
#[derive(Clone)]
pub struct ParamsSerializer(Arc<dyn Fn(&ParamMap) -> String + Send + Sync>);

impl ParamsSerializer {
    /// Wrap a serializer function.
    pub fn new<F>(serializer: F) -> Self
    where
        F: Fn(&ParamMap) -> String + Send + Sync + 'static,
    {
        Self(Arc::new(serializer))
    }

    /// Serialize `params`.
    pub fn serialize(&self, params: &ParamMap) -> String {
        (self.0)(params)
    }
}

impl fmt::Debug for ParamsSerializer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ParamsSerializer(..)")
    }
}

/// User-facing request descriptor.
///
/// Every field is optional: `None` means "not provided", which is what the
/// merge engine keys on. A field set to an empty value is still provided
/// and wins over the base configuration.
#[derive(Debug, Clone, Default)]
pub struct RequestConfig {
    /// Target URL, absolute or relative to `base_url`.
    pub url: Option<String>,
    /// HTTP method.
    pub method: Option<Method>,
    /// Prefix for relative URLs.
    pub base_url: Option<String>,
    /// Query parameters.
    pub params: Option<ParamMap>,
    /// Request body.
    pub data: Option<Body>,
    /// Headers; nested maps under section keys (`common`, `get`, ...) are
    /// flattened at dispatch time.
    pub headers: Option<ParamMap>,
    /// Credentials, deep-merged across layers.
    pub auth: Option<ParamValue>,
    /// Transport timeout; zero disables it.
    pub timeout: Option<Duration>,
    /// Response decoding hint.
    pub response_type: Option<ResponseType>,
    /// Status-validation predicate.
    pub validate_status: Option<ValidateStatus>,
    /// Query serializer override.
    pub params_serializer: Option<ParamsSerializer>,
    /// Transport adapter selector.
    pub adapter: Option<AdapterSelector>,
    /// Cancellation token.
    pub cancel_token: Option<CancelToken>,
}

impl RequestConfig {
    /// Create an empty configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// The library-wide default configuration.
    pub fn defaults() -> Self {
        let mut common = ParamMap::new();
        common.insert(
            "Accept".to_string(),
            "application/json, text/plain, */*".into(),
        );
        common.insert("Content-Type".to_string(), "application/json".into());

        let mut headers = ParamMap::new();
        headers.insert("common".to_string(), ParamValue::Map(common));

        Self {
            method: Some(Method::GET),
            headers: Some(headers),
            timeout: Some(Duration::ZERO),
            validate_status: Some(ValidateStatus::success()),
            adapter: Some(AdapterSelector::Named(DEFAULT_ADAPTER.to_string())),
            ..Self::default()
        }
    }

    /// Set the URL.
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Set the method.
    pub fn method(mut self, method: Method) -> Self {
        self.method = Some(method);
        self
    }

    /// Set the base URL.
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Add a query parameter.
    pub fn param(mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.params
            .get_or_insert_with(ParamMap::new)
            .insert(key.into(), value.into());
        self
    }

    /// Replace all query parameters.
    pub fn params(mut self, params: ParamMap) -> Self {
        self.params = Some(params);
        self
    }

    /// Add a top-level header.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.headers
            .get_or_insert_with(ParamMap::new)
            .insert(name.into(), value.into());
        self
    }

    /// Add a header to the `common` section.
    pub fn common_header(self, name: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.section_header("common", name, value)
    }

    /// Add a header that only applies to `method`.
    pub fn method_header(
        self,
        method: &Method,
        name: impl Into<String>,
        value: impl Into<ParamValue>,
    ) -> Self {
        let section = method.as_str().to_ascii_lowercase();
        self.section_header(&section, name, value)
    }

    fn section_header(
        mut self,
        section: &str,
        name: impl Into<String>,
        value: impl Into<ParamValue>,
    ) -> Self {
        let headers = self.headers.get_or_insert_with(ParamMap::new);
        let entry = headers
            .entry(section.to_string())
            .or_insert_with(|| ParamValue::Map(ParamMap::new()));
        if !entry.is_map() {
            *entry = ParamValue::Map(ParamMap::new());
        }
        if let ParamValue::Map(map) = entry {
            map.insert(name.into(), value.into());
        }
        self
    }

    /// Replace all headers.
    pub fn headers(mut self, headers: ParamMap) -> Self {
        self.headers = Some(headers);
        self
    }

    /// Set the body.
    pub fn data(mut self, body: Body) -> Self {
        self.data = Some(body);
        self
    }

    /// Set a JSON body.
    pub fn json<T: Serialize>(mut self, json: &T) -> Self {
        match serde_json::to_value(json) {
            Ok(value) => {
                self.data = Some(Body::Json(value));
                self = self.content_type("application/json");
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to serialize JSON body");
            }
        }
        self
    }

    /// Set a text body.
    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.data = Some(Body::Text(text.into()));
        self.content_type("text/plain; charset=utf-8")
    }

    /// Set a raw body.
    pub fn bytes(mut self, bytes: impl Into<Bytes>) -> Self {
        self.data = Some(Body::Bytes(bytes.into()));
        self
    }

    /// Set a URL-encoded form body.
    pub fn form(mut self, fields: ParamMap) -> Self {
        self.data = Some(Body::Form(fields));
        self.content_type("application/x-www-form-urlencoded")
    }

    // Top-level content type, unless one is already set at the top level.
    fn content_type(self, content_type: &str) -> Self {
        let present = self
            .headers
            .as_ref()
            .is_some_and(|headers| has_header(headers, "Content-Type"));
        if present {
            self
        } else {
            self.header("Content-Type", content_type)
        }
    }

    /// Set the auth value.
    pub fn auth(mut self, auth: impl Into<ParamValue>) -> Self {
        self.auth = Some(auth.into());
        self
    }

    /// Set basic-auth credentials.
    pub fn basic_auth(self, username: impl Into<String>, password: impl Into<String>) -> Self {
        let mut map = ParamMap::new();
        map.insert("username".to_string(), ParamValue::String(username.into()));
        map.insert("password".to_string(), ParamValue::String(password.into()));
        self.auth(ParamValue::Map(map))
    }

    /// Set the transport timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the response decoding hint.
    pub fn response_type(mut self, response_type: ResponseType) -> Self {
        self.response_type = Some(response_type);
        self
    }

    /// Set the status-validation predicate.
    pub fn validate_status<F>(mut self, predicate: F) -> Self
    where
        F: Fn(u16) -> bool + Send + Sync + 'static,
    {
        self.validate_status = Some(ValidateStatus::new(predicate));
        self
    }

    /// Override query serialization.
    pub fn params_serializer<F>(mut self, serializer: F) -> Self
    where
        F: Fn(&ParamMap) -> String + Send + Sync + 'static,
    {
        self.params_serializer = Some(ParamsSerializer::new(serializer));
        self
    }

    /// Select an adapter by name.
    pub fn adapter(mut self, name: impl Into<String>) -> Self {
        self.adapter = Some(AdapterSelector::Named(name.into()));
        self
    }

    /// Use an adapter instance directly.
    pub fn adapter_impl(mut self, adapter: Arc<dyn Adapter>) -> Self {
        self.adapter = Some(AdapterSelector::Custom(adapter));
        self
    }

    /// Attach a cancellation token.
    pub fn cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel_token = Some(token);
        self
    }

    /// The method to send, defaulting to GET.
    pub fn effective_method(&self) -> Method {
        self.method.clone().unwrap_or(Method::GET)
    }

    /// Serializable snapshot; functions, tokens and adapter instances are
    /// reduced to descriptive markers.
    pub fn to_json(&self) -> Value {
        let mut out = Map::new();
        if let Some(url) = &self.url {
            out.insert("url".into(), json!(url));
        }
        if let Some(method) = &self.method {
            out.insert("method".into(), json!(method.as_str()));
        }
        if let Some(base_url) = &self.base_url {
            out.insert("baseURL".into(), json!(base_url));
        }
        if let Some(params) = &self.params {
            out.insert("params".into(), json!(params));
        }
        if let Some(headers) = &self.headers {
            out.insert("headers".into(), json!(headers));
        }
        if let Some(data) = &self.data {
            let data = match data {
                Body::Json(v) => v.clone(),
                Body::Text(t) => json!(t),
                Body::Bytes(b) => json!(format!("<{} bytes>", b.len())),
                Body::Form(f) => json!(f),
            };
            out.insert("data".into(), data);
        }
        if let Some(timeout) = self.timeout {
            out.insert("timeout".into(), json!(timeout.as_millis() as u64));
        }
        if let Some(response_type) = self.response_type {
            out.insert("responseType".into(), json!(response_type.as_str()));
        }
        if let Some(adapter) = &self.adapter {
            out.insert("adapter".into(), json!(adapter.describe()));
        }
        Value::Object(out)
    }
}

impl From<&str> for RequestConfig {
    fn from(url: &str) -> Self {
        Self::new().url(url)
    }
}

impl From<String> for RequestConfig {
    fn from(url: String) -> Self {
        Self::new().url(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RequestConfig::defaults();
        assert_eq!(config.method, Some(Method::GET));
        assert_eq!(config.timeout, Some(Duration::ZERO));

        let validate = config.validate_status.unwrap();
        assert!(validate.check(200));
        assert!(validate.check(299));
        assert!(!validate.check(300));
        assert!(!validate.check(404));

        let common = config.headers.as_ref().unwrap()["common"].as_map().unwrap();
        assert_eq!(common["Content-Type"].as_str(), Some("application/json"));
    }

    #[test]
    fn test_section_headers() {
        let config = RequestConfig::new()
            .common_header("Accept", "text/html")
            .method_header(&Method::POST, "X-Post", "1")
            .header("X-Top", "top");

        let headers = config.headers.unwrap();
        assert!(headers["common"].is_map());
        assert_eq!(
            headers["post"].as_map().unwrap()["X-Post"].as_str(),
            Some("1")
        );
        assert_eq!(headers["X-Top"].as_str(), Some("top"));
    }

    #[test]
    fn test_basic_auth_map() {
        let config = RequestConfig::new().basic_auth("alice", "secret");
        let auth = config.auth.unwrap();
        let map = auth.as_map().unwrap();
        assert_eq!(map["username"].as_str(), Some("alice"));
        assert_eq!(map["password"].as_str(), Some("secret"));
    }

    #[test]
    fn test_json_body() {
        let config = RequestConfig::new().json(&serde_json::json!({"item": "widget"}));
        assert_eq!(
            config.data,
            Some(Body::Json(serde_json::json!({"item": "widget"})))
        );
        let headers = config.headers.unwrap();
        assert_eq!(headers["Content-Type"].as_str(), Some("application/json"));
    }

    #[test]
    fn test_body_setters_keep_explicit_content_type() {
        let config = RequestConfig::new()
            .header("content-type", "application/x-custom")
            .text("hello");
        let headers = config.headers.unwrap();
        assert_eq!(headers.len(), 1);
        assert_eq!(headers["content-type"].as_str(), Some("application/x-custom"));
    }

    #[test]
    fn test_from_str() {
        let config = RequestConfig::from("/users");
        assert_eq!(config.url.as_deref(), Some("/users"));
        assert_eq!(config.effective_method(), Method::GET);
    }
}
