//! Transport adapters and adapter selection.
//!
//! An adapter receives a fully normalized [`RequestConfig`] (absolute URL,
//! flat headers) and produces a [`Response`] or a classified error. Adapters
//! are looked up by name in a closed table:
//!
//! | name    | status                                   |
//! |---------|------------------------------------------|
//! | `http`  | reqwest-backed, supports mid-flight abort |
//! | `xhr`   | browser transport, unsupported here       |
//! | `fetch` | browser transport, unsupported here       |

mod config;
mod http_adapter;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use once_cell::sync::OnceCell;

pub use self::config::{HttpAdapterConfig, HttpAdapterConfigBuilder};
pub use self::http_adapter::HttpAdapter;

use crate::{ErrorCode, FetchError, RequestConfig, Response, Result};

/// Names registered in the adapter table.
pub const KNOWN_ADAPTERS: [&str; 3] = ["http", "xhr", "fetch"];

/// A transport that executes normalized requests.
#[async_trait]
pub trait Adapter: Send + Sync {
    /// Adapter name used in diagnostics.
    fn name(&self) -> &str;

    /// Whether a cancel token can abort a request already in flight.
    fn supports_abort(&self) -> bool {
        false
    }

    /// Execute the request.
    async fn dispatch(&self, config: RequestConfig) -> Result<Response>;
}

/// How a request picks its adapter.
#[derive(Clone)]
pub enum AdapterSelector {
    /// Look up a registered adapter, case-insensitively.
    Named(String),
    /// Use this adapter directly.
    Custom(Arc<dyn Adapter>),
    /// Use the first entry that resolves.
    Chain(Vec<AdapterSelector>),
}

impl AdapterSelector {
    /// Short description for logs and error snapshots.
    pub fn describe(&self) -> String {
        match self {
            Self::Named(name) => name.clone(),
            Self::Custom(adapter) => adapter.name().to_string(),
            Self::Chain(selectors) => selectors
                .iter()
                .map(Self::describe)
                .collect::<Vec<_>>()
                .join(", "),
        }
    }

    fn flatten<'a>(&'a self, out: &mut Vec<&'a AdapterSelector>) {
        match self {
            Self::Chain(selectors) => selectors.iter().for_each(|s| s.flatten(out)),
            selector => out.push(selector),
        }
    }
}

impl fmt::Debug for AdapterSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Named(name) => f.debug_tuple("Named").field(name).finish(),
            Self::Custom(adapter) => f.debug_tuple("Custom").field(&adapter.name()).finish(),
            Self::Chain(selectors) => f.debug_tuple("Chain").field(selectors).finish(),
        }
    }
}

impl From<&str> for AdapterSelector {
    fn from(name: &str) -> Self {
        Self::Named(name.to_string())
    }
}

impl From<Arc<dyn Adapter>> for AdapterSelector {
    fn from(adapter: Arc<dyn Adapter>) -> Self {
        Self::Custom(adapter)
    }
}

enum Lookup {
    Unknown(String),
    Unsupported(String),
}

/// The closed adapter table of one client.
pub struct Adapters {
    http_config: HttpAdapterConfig,
    http: OnceCell<Arc<HttpAdapter>>,
}

impl Adapters {
    /// Create a table whose `http` adapter uses `http_config`.
    pub fn new(http_config: HttpAdapterConfig) -> Self {
        Self {
            http_config,
            http: OnceCell::new(),
        }
    }

    /// Resolve `selector` to an adapter.
    ///
    /// An unregistered name fails with `ERR_BAD_OPTION_VALUE`; a registered
    /// adapter that cannot run in this environment fails with
    /// `ERR_NOT_SUPPORT`. For chains, the last failing entry decides.
    pub fn resolve(&self, selector: &AdapterSelector) -> Result<Arc<dyn Adapter>> {
        let mut candidates = Vec::new();
        selector.flatten(&mut candidates);

        let mut last_failure = None;
        for candidate in candidates {
            match candidate {
                AdapterSelector::Custom(adapter) => return Ok(adapter.clone()),
                AdapterSelector::Named(name) => match self.lookup(name)? {
                    Ok(adapter) => return Ok(adapter),
                    Err(failure) => last_failure = Some(failure),
                },
                AdapterSelector::Chain(_) => {}
            }
        }

        Err(match last_failure {
            Some(Lookup::Unsupported(name)) => FetchError::new(
                format!("Adapter {name} is not supported in this environment"),
                ErrorCode::NotSupported,
            ),
            Some(Lookup::Unknown(name)) => FetchError::new(
                format!(
                    "Unknown adapter {name} is specified; known adapters: {}",
                    KNOWN_ADAPTERS.join(", ")
                ),
                ErrorCode::BadOptionValue,
            ),
            None => FetchError::new("No adapter specified", ErrorCode::BadOptionValue),
        })
    }

    fn lookup(&self, name: &str) -> Result<std::result::Result<Arc<dyn Adapter>, Lookup>> {
        let adapter: Arc<dyn Adapter> = match name.to_ascii_lowercase().as_str() {
            "http" => self.http()?,
            "xhr" | "fetch" => return Ok(Err(Lookup::Unsupported(name.to_string()))),
            _ => return Ok(Err(Lookup::Unknown(name.to_string()))),
        };
        Ok(Ok(adapter))
    }

    /// The shared `http` adapter, built on first use.
    pub fn http(&self) -> Result<Arc<HttpAdapter>> {
        self.http
            .get_or_try_init(|| HttpAdapter::new(self.http_config.clone()).map(Arc::new))
            .cloned()
    }
}

impl Default for Adapters {
    fn default() -> Self {
        Self::new(HttpAdapterConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Noop;

    #[async_trait]
    impl Adapter for Noop {
        fn name(&self) -> &str {
            "noop"
        }

        async fn dispatch(&self, config: RequestConfig) -> Result<Response> {
            Ok(Response::new(http::StatusCode::OK, config))
        }
    }

    #[test]
    fn test_resolve_http_case_insensitive() {
        let adapters = Adapters::default();
        let adapter = adapters.resolve(&"HTTP".into()).unwrap();
        assert_eq!(adapter.name(), "http");
        assert!(adapter.supports_abort());
    }

    #[test]
    fn test_unknown_adapter() {
        let err = Adapters::default().resolve(&"bogus".into()).err().unwrap();
        assert_eq!(err.code(), Some(ErrorCode::BadOptionValue));
        assert!(err.message().contains("bogus"));
    }

    #[test]
    fn test_unsupported_adapter() {
        let err = Adapters::default().resolve(&"xhr".into()).err().unwrap();
        assert_eq!(err.code(), Some(ErrorCode::NotSupported));
    }

    #[test]
    fn test_chain_picks_first_resolvable() {
        let adapters = Adapters::default();
        let chain = AdapterSelector::Chain(vec!["fetch".into(), "xhr".into(), "http".into()]);
        assert_eq!(adapters.resolve(&chain).unwrap().name(), "http");

        let custom: Arc<dyn Adapter> = Arc::new(Noop);
        let chain = AdapterSelector::Chain(vec!["bogus".into(), custom.into()]);
        assert_eq!(adapters.resolve(&chain).unwrap().name(), "noop");
    }

    #[test]
    fn test_chain_last_failure_decides() {
        let adapters = Adapters::default();
        let chain = AdapterSelector::Chain(vec!["bogus".into(), "fetch".into()]);
        let err = adapters.resolve(&chain).err().unwrap();
        assert_eq!(err.code(), Some(ErrorCode::NotSupported));

        let err = adapters.resolve(&AdapterSelector::Chain(Vec::new())).err().unwrap();
        assert_eq!(err.code(), Some(ErrorCode::BadOptionValue));
    }
}
