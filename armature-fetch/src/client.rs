//! The request pipeline.

use std::sync::Arc;
use std::time::Duration;

use http::Method;
use tracing::debug;

use crate::adapter::{Adapters, HttpAdapterConfig};
use crate::dispatch::{dispatch_request, selector, transform_url};
use crate::interceptor::{Interceptor, Interceptors};
use crate::{Body, ParamMap, ParamValue, RequestConfig, Response, Result, merge_config};

/// HTTP client with layered defaults, interceptors, and pluggable transports.
///
/// Cloning is cheap; clones share defaults, interceptor registries, and the
/// pooled transport.
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    defaults: RequestConfig,
    interceptors: Interceptors,
    adapters: Adapters,
}

impl Client {
    /// Create a client that uses `defaults` verbatim as its default layer.
    pub fn new(defaults: RequestConfig) -> Self {
        Self::with_adapters(defaults, Adapters::default())
    }

    /// Create a client whose defaults are the library defaults with
    /// `config` merged on top.
    pub fn with_defaults(config: RequestConfig) -> Self {
        Self::new(merge_config(&RequestConfig::defaults(), &config))
    }

    fn with_adapters(defaults: RequestConfig, adapters: Adapters) -> Self {
        Self {
            inner: Arc::new(ClientInner {
                defaults,
                interceptors: Interceptors::default(),
                adapters,
            }),
        }
    }

    /// Create a client builder.
    pub fn builder() -> ClientBuilder {
        ClientBuilder::default()
    }

    /// The default configuration layer.
    pub fn defaults(&self) -> &RequestConfig {
        &self.inner.defaults
    }

    /// The request and response interceptor registries.
    pub fn interceptors(&self) -> &Interceptors {
        &self.inner.interceptors
    }

    /// The adapter table.
    pub fn adapters(&self) -> &Adapters {
        &self.inner.adapters
    }

    /// Send a request.
    ///
    /// The call configuration is merged over the client defaults, the
    /// adapter selection is validated, and then the chain runs: request
    /// interceptors (most recently registered first), dispatch, response
    /// interceptors (in registration order).
    ///
    /// An unknown or unsupported adapter fails before any interceptor runs.
    pub async fn request(&self, config: impl Into<RequestConfig>) -> Result<Response> {
        let config = merge_config(&self.inner.defaults, &config.into());

        self.inner
            .adapters
            .resolve(&selector(&config))
            .map_err(|e| e.with_config(config.clone()))?;

        let request_chain = self.inner.interceptors.request.snapshot();
        let response_chain = self.inner.interceptors.response.snapshot();

        debug!(
            method = %config.effective_method(),
            url = config.url.as_deref().unwrap_or_default(),
            request_interceptors = request_chain.len(),
            response_interceptors = response_chain.len(),
            "Starting request chain"
        );

        let effective = config.clone();
        let config = run_stages(request_chain.iter().rev(), Ok(config)).await;
        let response = match config {
            Ok(config) => dispatch_request(config, &self.inner.adapters).await,
            Err(e) => Err(e),
        };
        run_stages(response_chain.iter(), response)
            .await
            .map_err(|e| e.or_config(&effective))
    }

    /// Send a request to `url`, with optional extra configuration.
    pub async fn request_url(
        &self,
        url: impl Into<String>,
        config: Option<RequestConfig>,
    ) -> Result<Response> {
        self.request(config.unwrap_or_default().url(url)).await
    }

    /// Resolve the URL a request would be sent to, without sending it.
    pub fn get_uri(&self, config: impl Into<RequestConfig>) -> String {
        transform_url(&merge_config(&self.inner.defaults, &config.into()))
    }

    /// Send a GET request.
    pub async fn get(
        &self,
        url: impl Into<String>,
        config: Option<RequestConfig>,
    ) -> Result<Response> {
        self.request(call(config, Method::GET, url)).await
    }

    /// Send a DELETE request.
    pub async fn delete(
        &self,
        url: impl Into<String>,
        config: Option<RequestConfig>,
    ) -> Result<Response> {
        self.request(call(config, Method::DELETE, url)).await
    }

    /// Send a HEAD request.
    pub async fn head(
        &self,
        url: impl Into<String>,
        config: Option<RequestConfig>,
    ) -> Result<Response> {
        self.request(call(config, Method::HEAD, url)).await
    }

    /// Send an OPTIONS request.
    pub async fn options(
        &self,
        url: impl Into<String>,
        config: Option<RequestConfig>,
    ) -> Result<Response> {
        self.request(call(config, Method::OPTIONS, url)).await
    }

    /// Send a POST request with a body.
    pub async fn post(
        &self,
        url: impl Into<String>,
        data: impl Into<Body>,
        config: Option<RequestConfig>,
    ) -> Result<Response> {
        self.request(call(config, Method::POST, url).data(data.into()))
            .await
    }

    /// Send a PUT request with a body.
    pub async fn put(
        &self,
        url: impl Into<String>,
        data: impl Into<Body>,
        config: Option<RequestConfig>,
    ) -> Result<Response> {
        self.request(call(config, Method::PUT, url).data(data.into()))
            .await
    }

    /// Send a PATCH request with a body.
    pub async fn patch(
        &self,
        url: impl Into<String>,
        data: impl Into<Body>,
        config: Option<RequestConfig>,
    ) -> Result<Response> {
        self.request(call(config, Method::PATCH, url).data(data.into()))
            .await
    }

    /// Send a POST request with a `multipart/form-data` body.
    pub async fn post_form(
        &self,
        url: impl Into<String>,
        fields: ParamMap,
        config: Option<RequestConfig>,
    ) -> Result<Response> {
        self.request(multipart(call(config, Method::POST, url), fields))
            .await
    }

    /// Send a PUT request with a `multipart/form-data` body.
    pub async fn put_form(
        &self,
        url: impl Into<String>,
        fields: ParamMap,
        config: Option<RequestConfig>,
    ) -> Result<Response> {
        self.request(multipart(call(config, Method::PUT, url), fields))
            .await
    }

    /// Send a PATCH request with a `multipart/form-data` body.
    pub async fn patch_form(
        &self,
        url: impl Into<String>,
        fields: ParamMap,
        config: Option<RequestConfig>,
    ) -> Result<Response> {
        self.request(multipart(call(config, Method::PATCH, url), fields))
            .await
    }
}

impl Default for Client {
    fn default() -> Self {
        Self::new(RequestConfig::defaults())
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("defaults", &self.inner.defaults)
            .field("request_interceptors", &self.inner.interceptors.request.len())
            .field("response_interceptors", &self.inner.interceptors.response.len())
            .finish()
    }
}

// Fold a value through interceptor stages. A stage's failure handler that
// returns Ok resumes the success path at the next stage.
async fn run_stages<'a, T, I>(stages: I, mut state: Result<T>) -> Result<T>
where
    T: Send + 'static,
    I: Iterator<Item = &'a Arc<dyn Interceptor<T>>>,
{
    for stage in stages {
        state = match state {
            Ok(value) => stage.on_fulfilled(value).await,
            Err(error) => stage.on_rejected(error).await,
        };
    }
    state
}

fn call(config: Option<RequestConfig>, method: Method, url: impl Into<String>) -> RequestConfig {
    config.unwrap_or_default().method(method).url(url)
}

// The multipart content type goes on top of the caller's headers.
fn multipart(mut config: RequestConfig, fields: ParamMap) -> RequestConfig {
    if let Some(headers) = &mut config.headers {
        headers.retain(|name, _| !name.eq_ignore_ascii_case("content-type"));
    }
    config
        .data(Body::Form(fields))
        .header("Content-Type", "multipart/form-data")
}

/// Builder for [`Client`].
///
/// Starts from [`RequestConfig::defaults`]; every setter layers on top of it.
pub struct ClientBuilder {
    config: RequestConfig,
    http_config: HttpAdapterConfig,
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self {
            config: RequestConfig::defaults(),
            http_config: HttpAdapterConfig::default(),
        }
    }
}

impl ClientBuilder {
    /// Merge a configuration layer over the defaults collected so far.
    pub fn defaults(mut self, config: RequestConfig) -> Self {
        self.config = merge_config(&self.config, &config);
        self
    }

    /// Set the base URL for relative request URLs.
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.config = self.config.base_url(base_url);
        self
    }

    /// Set the default transport timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config = self.config.timeout(timeout);
        self
    }

    /// Add a header to the default `common` section.
    ///
    /// Headers are replaced wholesale on merge, so a request that sets its
    /// own header map does not send this header.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.config = self.config.common_header(name, value);
        self
    }

    /// Set the default adapter name.
    pub fn adapter(mut self, name: impl Into<String>) -> Self {
        self.config = self.config.adapter(name);
        self
    }

    /// Set the transport configuration of the `http` adapter.
    pub fn http_config(mut self, http_config: HttpAdapterConfig) -> Self {
        self.http_config = http_config;
        self
    }

    /// Build the client.
    pub fn build(self) -> Client {
        Client::with_adapters(self.config, Adapters::new(self.http_config))
    }
}
