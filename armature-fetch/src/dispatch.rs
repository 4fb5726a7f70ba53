//! The dispatch stage and the status gate.

use tracing::{debug, warn};

use crate::adapter::{AdapterSelector, Adapters};
use crate::config::DEFAULT_ADAPTER;
use crate::headers::flatten_headers;
use crate::url::{build_url, combine_urls, is_absolute_url};
use crate::{FetchError, RequestConfig, Response, Result};

/// Resolve the full request URL: base URL for relative paths, then params.
pub fn transform_url(config: &RequestConfig) -> String {
    let url = config.url.as_deref().unwrap_or_default();
    let full = match &config.base_url {
        Some(base) if !is_absolute_url(url) => combine_urls(base, url),
        _ => url.to_string(),
    };
    build_url(
        &full,
        config.params.as_ref(),
        config.params_serializer.as_ref(),
    )
}

/// The selector a configuration resolves with.
pub(crate) fn selector(config: &RequestConfig) -> AdapterSelector {
    config
        .adapter
        .clone()
        .unwrap_or_else(|| AdapterSelector::Named(DEFAULT_ADAPTER.to_string()))
}

/// Normalize the config and hand it to a transport adapter.
///
/// A pre-cancelled token fails before the adapter is resolved, so no I/O is
/// ever started for it. Params are folded into the URL and headers are
/// flattened, so the adapter sees `params: None`.
pub(crate) async fn dispatch_request(
    mut config: RequestConfig,
    adapters: &Adapters,
) -> Result<Response> {
    if let Some(token) = &config.cancel_token {
        token
            .throw_if_requested()
            .map_err(|e| e.with_config(config.clone()))?;
    }

    config.url = Some(transform_url(&config));
    config.params = None;
    config.headers = flatten_headers(config.headers.as_ref(), &config.effective_method());

    let adapter = adapters
        .resolve(&selector(&config))
        .map_err(|e| e.with_config(config.clone()))?;

    debug!(
        adapter = adapter.name(),
        method = %config.effective_method(),
        url = config.url.as_deref().unwrap_or_default(),
        "Dispatching request"
    );

    let response = adapter
        .dispatch(config.clone())
        .await
        .map_err(|e| e.or_config(&config))?;

    settle(response)
}

/// Apply the status-validation predicate.
///
/// Without a predicate every status passes. A rejected status becomes an
/// `ERR_BAD_REQUEST` (4xx) or `ERR_BAD_RESPONSE` (anything else) error with
/// the response attached.
pub fn settle(response: Response) -> Result<Response> {
    let status = response.status().as_u16();
    let accepted = response
        .config()
        .validate_status
        .as_ref()
        .is_none_or(|validate| validate.check(status));

    if accepted {
        Ok(response)
    } else {
        warn!(status, "Response rejected by status validation");
        Err(FetchError::bad_status(response))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ErrorCode, param_map};
    use http::StatusCode;

    #[test]
    fn test_transform_url_with_base() {
        let config = RequestConfig::new()
            .base_url("http://h")
            .url("/x")
            .param("id", 1);
        assert_eq!(transform_url(&config), "http://h/x?id=1");
    }

    #[test]
    fn test_transform_url_absolute_ignores_base() {
        let config = RequestConfig::new()
            .base_url("http://h")
            .url("https://other/y");
        assert_eq!(transform_url(&config), "https://other/y");
    }

    #[test]
    fn test_transform_url_without_url() {
        let config = RequestConfig::new()
            .base_url("http://h/api")
            .params(param_map([("q", "a")]));
        assert_eq!(transform_url(&config), "http://h/api?q=a");
    }

    #[test]
    fn test_settle_default_predicate() {
        let ok = Response::new(StatusCode::OK, RequestConfig::defaults());
        assert!(settle(ok).is_ok());

        let missing = Response::new(StatusCode::NOT_FOUND, RequestConfig::defaults());
        let err = settle(missing).unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::BadRequest));
        assert_eq!(err.status(), Some(404));
        assert_eq!(err.message(), "Request failed with status code 404");
    }

    #[test]
    fn test_settle_server_error_and_unmapped_class() {
        let server = Response::new(StatusCode::BAD_GATEWAY, RequestConfig::defaults());
        assert_eq!(
            settle(server).unwrap_err().code(),
            Some(ErrorCode::BadResponse)
        );

        let redirect = Response::new(StatusCode::FOUND, RequestConfig::defaults());
        assert_eq!(
            settle(redirect).unwrap_err().code(),
            Some(ErrorCode::BadResponse)
        );
    }

    #[test]
    fn test_settle_without_predicate_accepts_everything() {
        let response = Response::new(StatusCode::INTERNAL_SERVER_ERROR, RequestConfig::new());
        assert!(settle(response).is_ok());
    }

    #[test]
    fn test_settle_custom_predicate() {
        let config = RequestConfig::new().validate_status(|status| status < 500);
        let response = Response::new(StatusCode::NOT_FOUND, config);
        assert!(settle(response).is_ok());
    }
}
