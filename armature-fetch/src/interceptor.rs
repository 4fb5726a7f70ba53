//! Request and response interceptors.
//!
//! An interceptor is a pair of handlers attached to one stage of the request
//! chain: a success handler that receives the value flowing through the
//! chain, and a failure handler that receives the error. A failure handler
//! that returns `Ok` puts the chain back on the success path at the next
//! stage.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use parking_lot::RwLock;

use crate::{FetchError, ParamValue, RequestConfig, Response, Result};

/// A (success, failure) handler pair for values of type `T`.
#[async_trait]
pub trait Interceptor<T: Send + 'static>: Send + Sync {
    /// Handle a value on the success path.
    async fn on_fulfilled(&self, value: T) -> Result<T>;

    /// Handle an error on the failure path. The default rethrows.
    async fn on_rejected(&self, error: FetchError) -> Result<T> {
        Err(error)
    }
}

/// Interceptor operating on outbound request configurations.
pub trait RequestInterceptor: Interceptor<RequestConfig> {}
impl<I: Interceptor<RequestConfig> + ?Sized> RequestInterceptor for I {}

/// Interceptor operating on inbound responses.
pub trait ResponseInterceptor: Interceptor<Response> {}
impl<I: Interceptor<Response> + ?Sized> ResponseInterceptor for I {}

type Fulfilled<T> = Box<dyn Fn(T) -> BoxFuture<'static, Result<T>> + Send + Sync>;
type Rejected<T> = Box<dyn Fn(FetchError) -> BoxFuture<'static, Result<T>> + Send + Sync>;

/// Interceptor built from async closures.
///
/// ```
/// use armature_fetch::{FnInterceptor, RequestConfig};
///
/// let stamp = FnInterceptor::new(|config: RequestConfig| async move {
///     Ok(config.header("X-Stamp", "1"))
/// });
/// ```
pub struct FnInterceptor<T: Send + 'static> {
    fulfilled: Fulfilled<T>,
    rejected: Option<Rejected<T>>,
}

impl<T: Send + 'static> FnInterceptor<T> {
    /// Wrap a success handler.
    pub fn new<F, Fut>(fulfilled: F) -> Self
    where
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        Self {
            fulfilled: Box::new(move |value| -> BoxFuture<'static, Result<T>> {
                Box::pin(fulfilled(value))
            }),
            rejected: None,
        }
    }

    /// Add a failure handler.
    pub fn on_error<R, Fut>(mut self, rejected: R) -> Self
    where
        R: Fn(FetchError) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        self.rejected = Some(Box::new(move |error| -> BoxFuture<'static, Result<T>> {
            Box::pin(rejected(error))
        }));
        self
    }
}

#[async_trait]
impl<T: Send + 'static> Interceptor<T> for FnInterceptor<T> {
    async fn on_fulfilled(&self, value: T) -> Result<T> {
        (self.fulfilled)(value).await
    }

    async fn on_rejected(&self, error: FetchError) -> Result<T> {
        match &self.rejected {
            Some(rejected) => rejected(error).await,
            None => Err(error),
        }
    }
}

/// Handle returned by [`InterceptorManager::use_interceptor`].
///
/// Handles are never reused, even after ejection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InterceptorId(usize);

impl InterceptorId {
    /// Raw slot index.
    pub fn index(&self) -> usize {
        self.0
    }
}

/// Ordered registry of interceptors for one domain.
///
/// Ejecting leaves a vacant slot behind, so previously issued handles keep
/// pointing at their own slot.
pub struct InterceptorManager<T: Send + 'static> {
    slots: RwLock<Vec<Option<Arc<dyn Interceptor<T>>>>>,
}

impl<T: Send + 'static> InterceptorManager<T> {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            slots: RwLock::new(Vec::new()),
        }
    }

    /// Append an interceptor and return its handle.
    pub fn use_interceptor<I>(&self, interceptor: I) -> InterceptorId
    where
        I: Interceptor<T> + 'static,
    {
        self.use_arc(Arc::new(interceptor))
    }

    /// Append a shared interceptor and return its handle.
    pub fn use_arc(&self, interceptor: Arc<dyn Interceptor<T>>) -> InterceptorId {
        let mut slots = self.slots.write();
        slots.push(Some(interceptor));
        InterceptorId(slots.len() - 1)
    }

    /// Append a success handler.
    pub fn use_fn<F, Fut>(&self, fulfilled: F) -> InterceptorId
    where
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        self.use_interceptor(FnInterceptor::new(fulfilled))
    }

    /// Append a success and failure handler pair.
    pub fn use_fns<F, FutF, R, FutR>(&self, fulfilled: F, rejected: R) -> InterceptorId
    where
        F: Fn(T) -> FutF + Send + Sync + 'static,
        FutF: Future<Output = Result<T>> + Send + 'static,
        R: Fn(FetchError) -> FutR + Send + Sync + 'static,
        FutR: Future<Output = Result<T>> + Send + 'static,
    {
        self.use_interceptor(FnInterceptor::new(fulfilled).on_error(rejected))
    }

    /// Vacate the slot behind `id`. Unknown or already vacant handles are ignored.
    pub fn eject(&self, id: InterceptorId) {
        if let Some(slot) = self.slots.write().get_mut(id.0) {
            *slot = None;
        }
    }

    /// Vacate every slot; handle numbering continues where it left off.
    pub fn clear(&self) {
        self.slots.write().iter_mut().for_each(|slot| *slot = None);
    }

    /// Visit occupied slots in registration order.
    ///
    /// The visitor sees the slots as they were when the call started and may
    /// register or eject interceptors on this registry.
    pub fn for_each<F>(&self, mut visit: F)
    where
        F: FnMut(InterceptorId, &Arc<dyn Interceptor<T>>),
    {
        for (id, interceptor) in self.entries() {
            visit(id, &interceptor);
        }
    }

    fn entries(&self) -> Vec<(InterceptorId, Arc<dyn Interceptor<T>>)> {
        self.slots
            .read()
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| {
                slot.as_ref()
                    .map(|interceptor| (InterceptorId(index), interceptor.clone()))
            })
            .collect()
    }

    /// Number of occupied slots.
    pub fn len(&self) -> usize {
        self.slots.read().iter().filter(|slot| slot.is_some()).count()
    }

    /// Check whether no slot is occupied.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Occupied slots in registration order, detached from later changes.
    pub(crate) fn snapshot(&self) -> Vec<Arc<dyn Interceptor<T>>> {
        self.entries()
            .into_iter()
            .map(|(_, interceptor)| interceptor)
            .collect()
    }
}

impl<T: Send + 'static> Default for InterceptorManager<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// The request and response registries of one client.
#[derive(Default)]
pub struct Interceptors {
    /// Runs before dispatch, most recently registered first.
    pub request: InterceptorManager<RequestConfig>,
    /// Runs after dispatch, in registration order.
    pub response: InterceptorManager<Response>,
}

/// Logging interceptor that logs requests and responses.
pub struct LoggingInterceptor {
    log_headers: bool,
}

impl LoggingInterceptor {
    /// Create a new logging interceptor.
    pub fn new() -> Self {
        Self { log_headers: false }
    }

    /// Enable logging of headers.
    pub fn with_headers(mut self) -> Self {
        self.log_headers = true;
        self
    }
}

impl Default for LoggingInterceptor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Interceptor<RequestConfig> for LoggingInterceptor {
    async fn on_fulfilled(&self, config: RequestConfig) -> Result<RequestConfig> {
        tracing::debug!(
            method = %config.effective_method(),
            url = config.url.as_deref().unwrap_or_default(),
            "Dispatching request"
        );

        if self.log_headers
            && let Some(headers) = &config.headers
        {
            for (name, value) in headers {
                tracing::trace!(header = %name, value = %value, "Request header");
            }
        }

        Ok(config)
    }

    async fn on_rejected(&self, error: FetchError) -> Result<RequestConfig> {
        tracing::debug!(error = %error, code = ?error.code(), "Request rejected");
        Err(error)
    }
}

#[async_trait]
impl Interceptor<Response> for LoggingInterceptor {
    async fn on_fulfilled(&self, response: Response) -> Result<Response> {
        tracing::debug!(status = %response.status(), "Received response");

        if self.log_headers {
            for (name, value) in response.headers() {
                tracing::trace!(header = %name, value = ?value, "Response header");
            }
        }

        Ok(response)
    }

    async fn on_rejected(&self, error: FetchError) -> Result<Response> {
        tracing::debug!(
            error = %error,
            code = ?error.code(),
            status = ?error.status(),
            "Response rejected"
        );
        Err(error)
    }
}

/// Authentication interceptor that adds auth headers.
pub struct AuthInterceptor {
    auth_type: AuthType,
}

enum AuthType {
    Bearer(String),
    Basic { username: String, password: String },
    ApiKey { header: String, key: String },
}

impl AuthInterceptor {
    /// Create a bearer token interceptor.
    pub fn bearer(token: impl Into<String>) -> Self {
        Self {
            auth_type: AuthType::Bearer(token.into()),
        }
    }

    /// Create a basic auth interceptor.
    pub fn basic(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            auth_type: AuthType::Basic {
                username: username.into(),
                password: password.into(),
            },
        }
    }

    /// Create an API key interceptor.
    pub fn api_key(header: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            auth_type: AuthType::ApiKey {
                header: header.into(),
                key: key.into(),
            },
        }
    }
}

#[async_trait]
impl Interceptor<RequestConfig> for AuthInterceptor {
    async fn on_fulfilled(&self, config: RequestConfig) -> Result<RequestConfig> {
        let config = match &self.auth_type {
            AuthType::Bearer(token) => config.header("Authorization", format!("Bearer {token}")),
            AuthType::Basic { username, password } => {
                use base64::Engine;
                let credentials = base64::engine::general_purpose::STANDARD
                    .encode(format!("{username}:{password}"));
                config.header("Authorization", format!("Basic {credentials}"))
            }
            AuthType::ApiKey { header, key } => {
                config.header(header.clone(), ParamValue::String(key.clone()))
            }
        };
        Ok(config)
    }
}

/// Retry-After header interceptor that warns when rate limited.
pub struct RateLimitInterceptor;

#[async_trait]
impl Interceptor<Response> for RateLimitInterceptor {
    async fn on_fulfilled(&self, response: Response) -> Result<Response> {
        warn_if_limited(&response);
        Ok(response)
    }

    async fn on_rejected(&self, error: FetchError) -> Result<Response> {
        if let Some(response) = error.response() {
            warn_if_limited(response);
        }
        Err(error)
    }
}

fn warn_if_limited(response: &Response) {
    if response.status() == http::StatusCode::TOO_MANY_REQUESTS
        && let Some(seconds) = response
            .header(http::header::RETRY_AFTER.as_str())
            .and_then(|v| v.parse::<u64>().ok())
    {
        tracing::warn!(
            retry_after_seconds = seconds,
            "Rate limited, should retry after {} seconds",
            seconds
        );
    }
}
