pub mod http_client;
pub mod interceptor;

pub use http_client::ReqwestFetch;
pub use interceptor::{CallInterceptor, RestoreHandle, ServiceStats};

use async_trait::async_trait;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub method: String,
    pub url: String,
    pub timeout: Option<Duration>,
}

impl FetchRequest {
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            url: url.into(),
            timeout: None,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new("GET", url)
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchResponse {
    pub status: Option<u16>,
    pub body: Vec<u8>,
}

impl FetchResponse {
    pub fn with_status(status: u16) -> Self {
        Self {
            status: Some(status),
            body: Vec::new(),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("Request timeout: {0}")]
    Timeout(String),

    #[error("Request failed: {0}")]
    Failed(String),

    #[error("No fetch primitive has been provided")]
    Unavailable,
}

impl FetchError {
    /// Whether the failure reason indicates a timeout.
    pub fn is_timeout(&self) -> bool {
        match self {
            FetchError::Timeout(_) => true,
            FetchError::Failed(reason) => {
                let reason = reason.to_ascii_lowercase();
                reason.contains("timeout") || reason.contains("timed out")
            }
            FetchError::Unavailable => false,
        }
    }
}

/// The outbound-call primitive.
#[async_trait]
pub trait Fetch: Send + Sync {
    async fn fetch(&self, request: FetchRequest) -> Result<FetchResponse, FetchError>;
}

pub type DynFetch = Arc<dyn Fetch>;

struct SlotState {
    fetch: DynFetch,
    instrumented: bool,
}

/// Holder for a shared fetch primitive.
///
/// Call sites go through the slot, so wrapping the primitive here observes
/// every outbound call. [`CallInterceptor::install`] and
/// [`RestoreHandle::restore`] are the only operations that swap it after it
/// has been provided.
#[derive(Default)]
pub struct FetchSlot {
    state: RwLock<Option<SlotState>>,
}

/// Process-wide fetch slot.
pub static GLOBAL_FETCH: FetchSlot = FetchSlot::new();

impl FetchSlot {
    pub const fn new() -> Self {
        Self {
            state: RwLock::new(None),
        }
    }

    /// Makes a primitive available, replacing any previous one.
    ///
    /// An instrumented slot keeps its wrapper; the new primitive is ignored.
    pub fn provide(&self, fetch: DynFetch) {
        let mut guard = self.state.write().unwrap_or_else(|e| e.into_inner());
        if guard.as_ref().is_some_and(|state| state.instrumented) {
            warn!("Fetch is instrumented; ignoring new primitive");
            return;
        }

        debug!("Providing fetch primitive");
        *guard = Some(SlotState {
            fetch,
            instrumented: false,
        });
    }

    pub fn current(&self) -> Option<DynFetch> {
        self.state
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .map(|state| state.fetch.clone())
    }

    pub fn is_instrumented(&self) -> bool {
        self.state
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .map(|state| state.instrumented)
            .unwrap_or(false)
    }

    pub async fn fetch(&self, request: FetchRequest) -> Result<FetchResponse, FetchError> {
        let fetch = self.current().ok_or(FetchError::Unavailable)?;
        fetch.fetch(request).await
    }

    /// Wraps the current primitive and marks it instrumented.
    ///
    /// Returns the unwrapped primitive and the installed wrapper, `Ok(None)`
    /// when the slot is already instrumented, or `Err(())` when nothing has
    /// been provided.
    pub(crate) fn wrap<F>(&self, wrap: F) -> Result<Option<(DynFetch, DynFetch)>, ()>
    where
        F: FnOnce(DynFetch) -> DynFetch,
    {
        let mut guard = self.state.write().unwrap_or_else(|e| e.into_inner());
        let state = guard.as_mut().ok_or(())?;

        if state.instrumented {
            return Ok(None);
        }

        let original = state.fetch.clone();
        let wrapper = wrap(original.clone());
        state.fetch = wrapper.clone();
        state.instrumented = true;
        Ok(Some((original, wrapper)))
    }

    /// Puts `original` back, but only while `wrapper` is still the installed
    /// primitive. Returns whether the slot changed.
    pub(crate) fn restore(&self, wrapper: &DynFetch, original: DynFetch) -> bool {
        let mut guard = self.state.write().unwrap_or_else(|e| e.into_inner());
        let installed = guard
            .as_ref()
            .is_some_and(|state| state.instrumented && same_fetch(&state.fetch, wrapper));

        if !installed {
            warn!("Fetch slot no longer holds this wrapper; not restoring");
            return false;
        }

        *guard = Some(SlotState {
            fetch: original,
            instrumented: false,
        });
        true
    }
}

fn same_fetch(a: &DynFetch, b: &DynFetch) -> bool {
    std::ptr::eq(Arc::as_ptr(a) as *const (), Arc::as_ptr(b) as *const ())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(u16);

    #[async_trait]
    impl Fetch for Fixed {
        async fn fetch(&self, _request: FetchRequest) -> Result<FetchResponse, FetchError> {
            Ok(FetchResponse::with_status(self.0))
        }
    }

    #[test]
    fn test_timeout_detection() {
        assert!(FetchError::Timeout("30s".into()).is_timeout());
        assert!(FetchError::Failed("network timeout at: http://x".into()).is_timeout());
        assert!(FetchError::Failed("operation timed out".into()).is_timeout());
        assert!(!FetchError::Failed("connection refused".into()).is_timeout());
        assert!(!FetchError::Unavailable.is_timeout());
    }

    #[tokio::test]
    async fn test_empty_slot_is_unavailable() {
        let slot = FetchSlot::new();
        assert!(slot.current().is_none());
        assert_eq!(
            slot.fetch(FetchRequest::get("http://x")).await,
            Err(FetchError::Unavailable)
        );
    }

    #[tokio::test]
    async fn test_slot_calls_through() {
        let slot = FetchSlot::new();
        slot.provide(Arc::new(Fixed(204)));

        let response = slot.fetch(FetchRequest::get("http://x")).await.unwrap();
        assert_eq!(response.status, Some(204));
        assert!(!slot.is_instrumented());
    }

    #[test]
    fn test_wrap_is_guarded() {
        let slot = FetchSlot::new();
        assert!(slot.wrap(|f| f).is_err());

        slot.provide(Arc::new(Fixed(200)));
        assert!(matches!(slot.wrap(|f| f), Ok(Some(_))));
        assert!(matches!(slot.wrap(|f| f), Ok(None)));
        assert!(slot.is_instrumented());
    }

    #[tokio::test]
    async fn test_provide_keeps_instrumented_wrapper() {
        let slot = FetchSlot::new();
        slot.provide(Arc::new(Fixed(200)));
        let (original, wrapper) = slot
            .wrap(|_| Arc::new(Fixed(201)) as DynFetch)
            .unwrap()
            .unwrap();

        slot.provide(Arc::new(Fixed(500)));
        assert!(slot.is_instrumented());
        let response = slot.fetch(FetchRequest::get("http://x")).await.unwrap();
        assert_eq!(response.status, Some(201));

        assert!(slot.restore(&wrapper, original));
        assert!(!slot.is_instrumented());
        let response = slot.fetch(FetchRequest::get("http://x")).await.unwrap();
        assert_eq!(response.status, Some(200));
    }

    #[test]
    fn test_restore_ignores_stale_wrapper() {
        let slot = FetchSlot::new();
        slot.provide(Arc::new(Fixed(200)));
        let (original, wrapper) = slot.wrap(|f| f).unwrap().unwrap();
        let stale: DynFetch = Arc::new(Fixed(201));

        assert!(!slot.restore(&stale, original.clone()));
        assert!(slot.is_instrumented());
        assert!(slot.restore(&wrapper, original.clone()));
        assert!(!slot.restore(&wrapper, original));
    }
}
