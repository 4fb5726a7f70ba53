//! reqwest-backed `http` adapter.

use async_trait::async_trait;
use bytes::Bytes;
use http::header::{AUTHORIZATION, CONTENT_TYPE};
use http::{HeaderMap, HeaderValue};
use reqwest::multipart;
use tracing::{debug, trace};

use super::{Adapter, HttpAdapterConfig};
use crate::headers::to_header_map;
use crate::{
    Body, ErrorCode, FetchError, ParamMap, ParamValue, RequestConfig, RequestHandle, Response,
    ResponseData, ResponseType, Result,
};

/// Adapter that performs requests with a pooled [`reqwest::Client`].
///
/// Timeouts come from [`RequestConfig::timeout`] (zero disables them) and a
/// cancel token aborts the exchange while it is in flight.
#[derive(Debug, Clone)]
pub struct HttpAdapter {
    inner: reqwest::Client,
    config: HttpAdapterConfig,
}

impl HttpAdapter {
    /// Create an adapter with the given transport configuration.
    pub fn new(config: HttpAdapterConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .pool_idle_timeout(config.pool_idle_timeout)
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .user_agent(&config.user_agent)
            .gzip(config.gzip)
            .brotli(config.brotli);

        if config.follow_redirects {
            builder = builder.redirect(reqwest::redirect::Policy::limited(config.max_redirects));
        } else {
            builder = builder.redirect(reqwest::redirect::Policy::none());
        }

        let inner = builder.build().map_err(|e| {
            FetchError::new(
                format!("Failed to build HTTP transport: {e}"),
                ErrorCode::NotSupported,
            )
            .with_source(e)
        })?;

        Ok(Self { inner, config })
    }

    /// Get the underlying reqwest client.
    pub fn inner(&self) -> &reqwest::Client {
        &self.inner
    }

    /// Get the transport configuration.
    pub fn config(&self) -> &HttpAdapterConfig {
        &self.config
    }

    async fn exchange(&self, config: &RequestConfig, handle: &RequestHandle) -> Result<Response> {
        let url = reqwest::Url::parse(handle.url()).map_err(|e| {
            FetchError::new(format!("Invalid URL {}", handle.url()), ErrorCode::InvalidUrl)
                .with_config(config.clone())
                .with_source(e)
        })?;

        let mut headers = match &config.headers {
            Some(flat) => to_header_map(flat).map_err(|e| e.or_config(config))?,
            None => HeaderMap::new(),
        };

        let mut request = self.inner.request(handle.method().clone(), url);

        if let Some(body) = &config.data {
            request = match body_content(body, &mut headers).map_err(|e| e.or_config(config))? {
                Content::Bytes(bytes) => request.body(bytes),
                Content::Multipart(form) => request.multipart(form),
            };
        }
        // An explicit Authorization header wins over `auth` credentials.
        let explicit_auth = headers.contains_key(AUTHORIZATION);
        request = request.headers(headers);

        if !explicit_auth
            && let Some(ParamValue::Map(auth)) = &config.auth
            && let Some(username) = auth.get("username")
        {
            let password = auth.get("password").map(ParamValue::to_plain_string);
            request = request.basic_auth(username.to_plain_string(), password);
        }

        debug!(method = %handle.method(), url = %handle.url(), "Sending HTTP request");

        let response = request
            .send()
            .await
            .map_err(|e| classify(e, config, handle))?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = response
            .bytes()
            .await
            .map_err(|e| classify(e, config, handle))?;

        debug!(status = %status, bytes = body.len(), "Received HTTP response");
        for (name, value) in &headers {
            trace!(header = %name, value = ?value, "Response header");
        }

        let data = decode(body, config.response_type.unwrap_or_default());
        Ok(Response::new(status, config.clone())
            .with_headers(headers)
            .with_data(data)
            .with_request(handle.clone()))
    }
}

#[async_trait]
impl Adapter for HttpAdapter {
    fn name(&self) -> &str {
        "http"
    }

    fn supports_abort(&self) -> bool {
        true
    }

    async fn dispatch(&self, config: RequestConfig) -> Result<Response> {
        let handle = RequestHandle::new(
            self.name(),
            config.effective_method(),
            config.url.clone().unwrap_or_default(),
        );

        let timeout = config.timeout.filter(|t| !t.is_zero());
        let exchange = async {
            match timeout {
                Some(timeout) => tokio::time::timeout(timeout, self.exchange(&config, &handle))
                    .await
                    .map_err(|_| {
                        FetchError::new(
                            format!("timeout of {}ms exceeded", timeout.as_millis()),
                            ErrorCode::TimedOut,
                        )
                        .with_config(config.clone())
                        .with_request(handle.clone())
                    })?,
                None => self.exchange(&config, &handle).await,
            }
        };

        match &config.cancel_token {
            Some(token) => {
                tokio::select! {
                    result = exchange => result,
                    cancel = token.cancelled() => {
                        debug!(url = %handle.url(), "HTTP request aborted by cancel token");
                        Err(cancel
                            .to_error()
                            .with_config(config.clone())
                            .with_request(handle.clone()))
                    }
                }
            }
            None => exchange.await,
        }
    }
}

enum Content {
    Bytes(Bytes),
    Multipart(multipart::Form),
}

// Encode the body and fill in a content type when none was configured.
fn body_content(body: &Body, headers: &mut HeaderMap) -> Result<Content> {
    let default_type = match body {
        Body::Json(_) => Some("application/json"),
        Body::Text(_) => Some("text/plain; charset=utf-8"),
        Body::Form(_) => Some("application/x-www-form-urlencoded"),
        Body::Bytes(_) => None,
    };
    if let Some(content_type) = default_type
        && !headers.contains_key(CONTENT_TYPE)
    {
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    }

    let content = match body {
        Body::Json(value) => Content::Bytes(Bytes::from(serde_json::to_vec(value).map_err(
            |e| {
                FetchError::new("Failed to serialize JSON body", ErrorCode::BadOptionValue)
                    .with_source(e)
            },
        )?)),
        Body::Text(text) => Content::Bytes(Bytes::from(text.clone())),
        Body::Bytes(bytes) => Content::Bytes(bytes.clone()),
        Body::Form(fields) if content_type_is(headers, "multipart/form-data") => {
            // reqwest writes its own boundary-carrying content type.
            headers.remove(CONTENT_TYPE);
            Content::Multipart(multipart_form(fields))
        }
        Body::Form(fields) if content_type_is(headers, "application/json") => {
            Content::Bytes(Bytes::from(serde_json::to_vec(fields).map_err(|e| {
                FetchError::new("Failed to serialize form fields", ErrorCode::BadOptionValue)
                    .with_source(e)
            })?))
        }
        Body::Form(fields) => {
            let pairs = form_pairs(fields);
            let encoded = serde_urlencoded::to_string(&pairs).map_err(|e| {
                FetchError::new("Failed to encode form data", ErrorCode::BadOptionValue)
                    .with_source(e)
            })?;
            Content::Bytes(Bytes::from(encoded))
        }
    };
    Ok(content)
}

fn content_type_is(headers: &HeaderMap, mime: &str) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with(mime))
}

fn form_pairs(fields: &ParamMap) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    for (key, value) in fields {
        match value {
            ParamValue::List(values) => {
                pairs.extend(values.iter().map(|v| (key.clone(), v.to_plain_string())));
            }
            value => pairs.push((key.clone(), value.to_plain_string())),
        }
    }
    pairs
}

fn multipart_form(fields: &ParamMap) -> multipart::Form {
    form_pairs(fields)
        .into_iter()
        .fold(multipart::Form::new(), |form, (key, value)| {
            form.text(key, value)
        })
}

fn decode(body: Bytes, response_type: ResponseType) -> ResponseData {
    if body.is_empty() {
        return ResponseData::Empty;
    }
    match response_type {
        ResponseType::Bytes => ResponseData::Bytes(body),
        ResponseType::Text => ResponseData::Text(String::from_utf8_lossy(&body).into_owned()),
        ResponseType::Json => match serde_json::from_slice(&body) {
            Ok(value) => ResponseData::Json(value),
            Err(_) => ResponseData::Text(String::from_utf8_lossy(&body).into_owned()),
        },
    }
}

fn classify(error: reqwest::Error, config: &RequestConfig, handle: &RequestHandle) -> FetchError {
    let (message, code) = if error.is_timeout() {
        (format!("Request timed out: {error}"), ErrorCode::TimedOut)
    } else if error.is_redirect() {
        (
            format!("Maximum number of redirects exceeded: {error}"),
            ErrorCode::TooManyRedirects,
        )
    } else if error.is_builder() {
        (format!("Invalid request: {error}"), ErrorCode::InvalidUrl)
    } else {
        ("Network Error".to_string(), ErrorCode::Network)
    };

    FetchError::new(message, code)
        .with_config(config.clone())
        .with_request(handle.clone())
        .with_source(error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::param_map;

    #[test]
    fn test_decode_json_falls_back_to_text() {
        let data = decode(Bytes::from_static(b"{\"ok\":true}"), ResponseType::Json);
        assert_eq!(data, ResponseData::Json(serde_json::json!({"ok": true})));

        let data = decode(Bytes::from_static(b"plain"), ResponseType::Json);
        assert_eq!(data, ResponseData::Text("plain".into()));

        let data = decode(Bytes::new(), ResponseType::Json);
        assert_eq!(data, ResponseData::Empty);
    }

    #[test]
    fn test_body_sets_missing_content_type() {
        let mut headers = HeaderMap::new();
        let body = Body::Form(param_map([("a", 1)]));
        let Content::Bytes(bytes) = body_content(&body, &mut headers).unwrap() else {
            panic!("expected url-encoded bytes");
        };
        assert_eq!(&bytes[..], b"a=1");
        assert_eq!(
            headers.get(CONTENT_TYPE).unwrap(),
            "application/x-www-form-urlencoded"
        );
    }

    #[test]
    fn test_body_keeps_configured_content_type() {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/vnd.api+json"));
        body_content(&Body::Json(serde_json::json!({})), &mut headers).unwrap();
        assert_eq!(headers.get(CONTENT_TYPE).unwrap(), "application/vnd.api+json");
    }

    #[test]
    fn test_multipart_form_drops_static_content_type() {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("multipart/form-data"));
        let content = body_content(&Body::Form(param_map([("a", "b")])), &mut headers).unwrap();
        assert!(matches!(content, Content::Multipart(_)));
        assert!(!headers.contains_key(CONTENT_TYPE));
    }

    #[test]
    fn test_form_under_json_content_type_is_json() {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let Content::Bytes(bytes) =
            body_content(&Body::Form(param_map([("a", 1)])), &mut headers).unwrap()
        else {
            panic!("expected JSON bytes");
        };
        assert_eq!(&bytes[..], b"{\"a\":1}");
    }

    #[test]
    fn test_form_lists_repeat_keys() {
        let fields = param_map([("tag", ParamValue::from(vec!["a", "b"]))]);
        assert_eq!(
            form_pairs(&fields),
            vec![
                ("tag".to_string(), "a".to_string()),
                ("tag".to_string(), "b".to_string())
            ]
        );
    }
}
