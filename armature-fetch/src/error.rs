//! Classified error types.
//!
//! Every failure that leaves the pipeline is a [`FetchError`]. Transport
//! failures, status-gate rejections, cancellations and configuration problems
//! are all tagged with an [`ErrorCode`] so callers can branch on a stable
//! token instead of parsing messages.

use std::fmt;
use std::str::FromStr;

use serde_json::{Value, json};
use thiserror::Error;

use crate::{RequestConfig, RequestHandle, Response};

/// Result type for pipeline operations.
pub type Result<T> = std::result::Result<T, FetchError>;

/// Boxed transport cause kept behind a classified error.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Closed set of error codes surfaced across the client boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// An option carried a value that cannot be used.
    BadOptionValue,
    /// An option is not recognised.
    BadOption,
    /// The connection was aborted (also used by some adapters for timeouts).
    ConnectionAborted,
    /// The request exceeded its timeout.
    TimedOut,
    /// The network layer failed before a response arrived.
    Network,
    /// The redirect limit was exceeded.
    TooManyRedirects,
    /// A deprecated feature was used.
    Deprecated,
    /// The server answered with a status outside the accepted range (5xx and unmapped classes).
    BadResponse,
    /// The server answered with a 4xx status.
    BadRequest,
    /// The caller cancelled the request.
    Canceled,
    /// The requested feature is not supported in this environment.
    NotSupported,
    /// The request URL could not be parsed.
    InvalidUrl,
}

impl ErrorCode {
    /// Every code, in declaration order.
    pub const ALL: [ErrorCode; 12] = [
        Self::BadOptionValue,
        Self::BadOption,
        Self::ConnectionAborted,
        Self::TimedOut,
        Self::Network,
        Self::TooManyRedirects,
        Self::Deprecated,
        Self::BadResponse,
        Self::BadRequest,
        Self::Canceled,
        Self::NotSupported,
        Self::InvalidUrl,
    ];

    /// The stable string token for this code.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BadOptionValue => "ERR_BAD_OPTION_VALUE",
            Self::BadOption => "ERR_BAD_OPTION",
            Self::ConnectionAborted => "ECONNABORTED",
            Self::TimedOut => "ETIMEDOUT",
            Self::Network => "ERR_NETWORK",
            Self::TooManyRedirects => "ERR_FR_TOO_MANY_REDIRECTS",
            Self::Deprecated => "ERR_DEPRECATED",
            Self::BadResponse => "ERR_BAD_RESPONSE",
            Self::BadRequest => "ERR_BAD_REQUEST",
            Self::Canceled => "ERR_CANCELED",
            Self::NotSupported => "ERR_NOT_SUPPORT",
            Self::InvalidUrl => "ERR_INVALID_URL",
        }
    }

    /// Map a status class to its rejection code.
    ///
    /// 4xx maps to [`ErrorCode::BadRequest`]; every other class fails closed
    /// as [`ErrorCode::BadResponse`].
    pub fn for_status(status: u16) -> Self {
        match status / 100 {
            4 => Self::BadRequest,
            _ => Self::BadResponse,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ErrorCode {
    type Err = FetchError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|code| code.as_str() == s)
            .ok_or_else(|| {
                FetchError::new(format!("Unknown error code {s}"), ErrorCode::BadOptionValue)
            })
    }
}

/// Classified pipeline error.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct FetchError {
    message: String,
    code: Option<ErrorCode>,
    config: Option<Box<RequestConfig>>,
    request: Option<RequestHandle>,
    response: Option<Box<Response>>,
    #[source]
    source: Option<BoxError>,
}

impl FetchError {
    /// Create an error tagged with `code`.
    pub fn new(message: impl Into<String>, code: ErrorCode) -> Self {
        Self {
            message: message.into(),
            code: Some(code),
            config: None,
            request: None,
            response: None,
            source: None,
        }
    }

    /// Create an uncoded error, for interceptors that reject with their own reason.
    pub fn custom(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: None,
            config: None,
            request: None,
            response: None,
            source: None,
        }
    }

    /// Cancellation error. An absent reason yields the generic `canceled` message.
    pub fn cancelled(reason: Option<&str>) -> Self {
        Self::new(reason.unwrap_or("canceled"), ErrorCode::Canceled)
    }

    /// Status-gate rejection carrying the offending response.
    pub fn bad_status(response: Response) -> Self {
        let status = response.status().as_u16();
        let config = response.config().clone();
        let request = response.request().cloned();
        Self::new(
            format!("Request failed with status code {status}"),
            ErrorCode::for_status(status),
        )
        .with_config(config)
        .with_request_opt(request)
        .with_response(response)
    }

    /// Attach the configuration in effect when the failure happened.
    pub fn with_config(mut self, config: RequestConfig) -> Self {
        self.config = Some(Box::new(config));
        self
    }

    /// Attach the transport request handle.
    pub fn with_request(mut self, request: RequestHandle) -> Self {
        self.request = Some(request);
        self
    }

    fn with_request_opt(mut self, request: Option<RequestHandle>) -> Self {
        self.request = request;
        self
    }

    /// Attach the response that triggered the failure.
    pub fn with_response(mut self, response: Response) -> Self {
        self.response = Some(Box::new(response));
        self
    }

    /// Attach the underlying cause.
    pub fn with_source(mut self, source: impl Into<BoxError>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Attach `config` unless a configuration is already recorded.
    pub(crate) fn or_config(self, config: &RequestConfig) -> Self {
        if self.config.is_some() {
            self
        } else {
            self.with_config(config.clone())
        }
    }

    /// Human-readable message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Machine-readable code, if any.
    pub fn code(&self) -> Option<ErrorCode> {
        self.code
    }

    /// Configuration in effect when the failure occurred.
    pub fn config(&self) -> Option<&RequestConfig> {
        self.config.as_deref()
    }

    /// Transport request handle, if a request was issued.
    pub fn request(&self) -> Option<&RequestHandle> {
        self.request.as_ref()
    }

    /// Response received before the failure, if any.
    pub fn response(&self) -> Option<&Response> {
        self.response.as_deref()
    }

    /// Take the attached response.
    pub fn into_response(self) -> Option<Response> {
        self.response.map(|r| *r)
    }

    /// Check if the caller cancelled the request.
    pub fn is_cancelled(&self) -> bool {
        self.code == Some(ErrorCode::Canceled)
    }

    /// Check if this is a timeout error.
    pub fn is_timeout(&self) -> bool {
        matches!(
            self.code,
            Some(ErrorCode::TimedOut) | Some(ErrorCode::ConnectionAborted)
        )
    }

    /// Check if this is a network error.
    pub fn is_network_error(&self) -> bool {
        self.code == Some(ErrorCode::Network)
    }

    /// Get the HTTP status code if a response is attached.
    pub fn status(&self) -> Option<u16> {
        self.response.as_ref().map(|r| r.status().as_u16())
    }

    /// Serializable snapshot of the error.
    pub fn to_json(&self) -> Value {
        json!({
            "message": self.message,
            "name": "FetchError",
            "code": self.code.map(|c| c.as_str()),
            "status": self.status(),
            "config": self.config.as_ref().map(|c| c.to_json()),
        })
    }
}

/// Check whether an error is a cancellation.
pub fn is_cancel(error: &FetchError) -> bool {
    error.is_cancelled()
}
