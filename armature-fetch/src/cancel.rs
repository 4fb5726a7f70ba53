//! One-shot cancellation tokens.
//!
//! A token is shared between the caller and the in-flight request. The first
//! cancellation request is recorded; later requests are ignored.
//!
//! ```
//! use armature_fetch::CancelToken;
//!
//! let source = CancelToken::source();
//! source.cancel(Some("navigated away"));
//! source.cancel(Some("ignored"));
//!
//! assert_eq!(source.token.reason().unwrap().message(), Some("navigated away"));
//! assert!(source.token.throw_if_requested().is_err());
//! ```

use std::fmt;
use std::sync::Arc;

use tokio::sync::watch;

use crate::{FetchError, Result};

/// A recorded cancellation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cancel {
    message: Option<String>,
}

impl Cancel {
    /// The human-readable reason, if one was given.
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// Convert into a classified cancellation error.
    pub fn to_error(&self) -> FetchError {
        FetchError::cancelled(self.message())
    }
}

impl fmt::Display for Cancel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message().unwrap_or("canceled"))
    }
}

type State = Arc<watch::Sender<Option<Cancel>>>;

/// Cancellation signal passed into a request configuration.
#[derive(Clone)]
pub struct CancelToken {
    state: State,
}

/// Callback that requests cancellation of its token.
#[derive(Clone)]
pub struct Canceler {
    state: State,
}

/// A token paired with its cancel callback.
#[derive(Clone)]
pub struct CancelTokenSource {
    /// Token to place in the request configuration.
    pub token: CancelToken,
    /// Callback that cancels `token`.
    pub cancel: Canceler,
}

impl Canceler {
    /// Request cancellation.
    ///
    /// Returns `true` if this call recorded the reason, `false` if the token
    /// was already cancelled.
    pub fn cancel(&self, reason: Option<&str>) -> bool {
        let recorded = self.state.send_if_modified(|state| {
            if state.is_some() {
                return false;
            }
            *state = Some(Cancel {
                message: reason.map(str::to_string),
            });
            true
        });
        if recorded {
            tracing::debug!(reason = ?reason, "Cancellation requested");
        }
        recorded
    }
}

impl CancelToken {
    /// Create a token; `executor` runs immediately and may keep the
    /// [`Canceler`] for later use.
    pub fn new<F>(executor: F) -> Self
    where
        F: FnOnce(Canceler),
    {
        let (sender, _) = watch::channel(None);
        let state = Arc::new(sender);
        executor(Canceler {
            state: state.clone(),
        });
        Self { state }
    }

    /// Create a token together with its cancel callback.
    pub fn source() -> CancelTokenSource {
        let mut cancel = None;
        let token = Self::new(|c| cancel = Some(c));
        let cancel = cancel.unwrap_or_else(|| Canceler {
            state: token.state.clone(),
        });
        CancelTokenSource { token, cancel }
    }

    /// The recorded cancellation, if any.
    pub fn reason(&self) -> Option<Cancel> {
        self.state.borrow().clone()
    }

    /// Check whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.state.borrow().is_some()
    }

    /// Fail with an `ERR_CANCELED` error if cancellation was requested.
    pub fn throw_if_requested(&self) -> Result<()> {
        match self.reason() {
            Some(cancel) => Err(cancel.to_error()),
            None => Ok(()),
        }
    }

    /// Resolve once cancellation is requested.
    pub async fn cancelled(&self) -> Cancel {
        let mut receiver = self.state.subscribe();
        let cancel = match receiver.wait_for(Option::is_some).await {
            Ok(state) => state.clone(),
            Err(_) => None,
        };
        match cancel {
            Some(cancel) => cancel,
            // The sender lives as long as `self`, so the channel never closes here.
            None => futures::future::pending().await,
        }
    }
}

impl fmt::Debug for CancelToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancelToken")
            .field("reason", &self.reason())
            .finish()
    }
}

impl CancelTokenSource {
    /// Request cancellation of the paired token.
    pub fn cancel(&self, reason: Option<&str>) -> bool {
        self.cancel.cancel(reason)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorCode;
    use std::time::Duration;

    #[test]
    fn test_first_reason_wins() {
        let source = CancelToken::source();
        assert!(source.cancel(Some("first")));
        assert!(!source.cancel(Some("second")));
        assert_eq!(source.token.reason().unwrap().message(), Some("first"));
    }

    #[test]
    fn test_cancel_without_reason_is_recorded() {
        let source = CancelToken::source();
        assert!(source.cancel(None));
        assert!(source.token.is_cancelled());
        assert!(!source.cancel(Some("late")));
        assert_eq!(source.token.reason().unwrap().message(), None);

        let err = source.token.throw_if_requested().unwrap_err();
        assert_eq!(err.message(), "canceled");
    }

    #[test]
    fn test_throw_if_requested() {
        let source = CancelToken::source();
        assert!(source.token.throw_if_requested().is_ok());

        source.cancel(Some("stop"));
        for _ in 0..2 {
            let err = source.token.throw_if_requested().unwrap_err();
            assert_eq!(err.code(), Some(ErrorCode::Canceled));
            assert_eq!(err.message(), "stop");
        }
    }

    #[test]
    fn test_executor_runs_synchronously() {
        let mut ran = false;
        let token = CancelToken::new(|cancel| {
            ran = true;
            cancel.cancel(Some("immediately"));
        });
        assert!(ran);
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn test_cancelled_resolves_later() {
        let source = CancelToken::source();
        let token = source.token.clone();

        let waiter = tokio::spawn(async move { token.cancelled().await });
        tokio::time::sleep(Duration::from_millis(10)).await;
        source.cancel(Some("later"));

        let cancel = waiter.await.unwrap();
        assert_eq!(cancel.message(), Some("later"));
    }

    #[test]
    fn test_cancelled_wakes_waiter() {
        let source = CancelToken::source();
        let mut waiter = tokio_test::task::spawn(source.token.cancelled());
        tokio_test::assert_pending!(waiter.poll());

        source.cancel(Some("now"));
        assert!(waiter.is_woken());
        let cancel = tokio_test::assert_ready!(waiter.poll());
        assert_eq!(cancel.message(), Some("now"));
    }

    #[tokio::test]
    async fn test_cancelled_after_the_fact() {
        let source = CancelToken::source();
        source.cancel(Some("already"));
        assert_eq!(source.token.cancelled().await.message(), Some("already"));
    }
}
