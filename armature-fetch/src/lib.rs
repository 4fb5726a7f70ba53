//! # Armature Fetch
//!
//! A promise-style HTTP request pipeline: layered configuration, ordered
//! request/response interceptors, cooperative cancellation, and pluggable
//! transport adapters.
//!
//! ## Features
//!
//! - **Layered config**: per-call settings merged over client defaults
//! - **Interceptors**: async success/failure handlers around dispatch, with recovery
//! - **Cancellation**: tokens checked before dispatch and raced against in-flight I/O
//! - **Adapters**: a reqwest-backed `http` transport, or bring your own
//! - **Classified errors**: every failure carries a stable `ERR_*` code
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use armature_fetch::Client;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = Client::default();
//!
//!     let response = client.get("https://api.example.com/users", None).await?;
//!
//!     println!("Status: {}", response.status());
//!     Ok(())
//! }
//! ```
//!
//! ## Interceptors and Cancellation
//!
//! ```rust,no_run
//! use armature_fetch::{CancelToken, Client, RequestConfig};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = Client::builder()
//!         .base_url("https://api.example.com")
//!         .timeout(Duration::from_secs(30))
//!         .build();
//!
//!     // Runs before every request
//!     client.interceptors().request.use_fn(|config: RequestConfig| async move {
//!         Ok(config.header("Authorization", "Bearer token"))
//!     });
//!
//!     let source = CancelToken::source();
//!     let pending = client.post(
//!         "/orders",
//!         serde_json::json!({"item": "widget", "quantity": 5}),
//!         Some(RequestConfig::new().cancel_token(source.token.clone())),
//!     );
//!
//!     source.cancel(Some("user navigated away"));
//!     if let Err(e) = pending.await {
//!         assert!(armature_fetch::is_cancel(&e));
//!     }
//!
//!     Ok(())
//! }
//! ```

mod adapter;
mod cancel;
mod client;
mod config;
mod dispatch;
mod error;
mod headers;
mod interceptor;
mod merge;
mod response;
mod url;
mod value;

pub use adapter::{
    Adapter, AdapterSelector, Adapters, HttpAdapter, HttpAdapterConfig, HttpAdapterConfigBuilder,
    KNOWN_ADAPTERS,
};
pub use cancel::{Cancel, CancelToken, CancelTokenSource, Canceler};
pub use client::{Client, ClientBuilder};
pub use config::{
    Body, DEFAULT_ADAPTER, HEADER_SECTIONS, ParamsSerializer, RequestConfig, ResponseType,
    ValidateStatus,
};
pub use dispatch::{settle, transform_url};
pub use error::{BoxError, ErrorCode, FetchError, Result, is_cancel};
pub use headers::{flatten_headers, to_header_map};
pub use interceptor::{
    AuthInterceptor, FnInterceptor, Interceptor, InterceptorId, InterceptorManager, Interceptors,
    LoggingInterceptor, RateLimitInterceptor, RequestInterceptor, ResponseInterceptor,
};
pub use merge::{deep_merge, deep_merge_value, merge_config};
pub use response::{RequestHandle, Response, ResponseData};
pub use crate::url::{build_url, combine_urls, is_absolute_url};
pub use value::{ParamMap, ParamValue, param_map};

// Re-export common types
pub use ::url::Url;
pub use bytes::Bytes;
pub use http::{HeaderMap, HeaderValue, Method, StatusCode, header};

/// Prelude for common imports.
///
/// ```
/// use armature_fetch::prelude::*;
/// ```
pub mod prelude {
    pub use crate::adapter::{Adapter, AdapterSelector, HttpAdapterConfig};
    pub use crate::cancel::{CancelToken, CancelTokenSource};
    pub use crate::client::{Client, ClientBuilder};
    pub use crate::config::{Body, RequestConfig, ResponseType, ValidateStatus};
    pub use crate::error::{ErrorCode, FetchError, Result, is_cancel};
    pub use crate::interceptor::{FnInterceptor, Interceptor, InterceptorId};
    pub use crate::response::{Response, ResponseData};
    pub use crate::value::{ParamMap, ParamValue, param_map};
    pub use http::{HeaderMap, Method, StatusCode};
}
