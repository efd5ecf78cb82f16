use super::{DynFetch, Fetch, FetchError, FetchRequest, FetchResponse, FetchSlot};
use crate::{classifier::ServiceClassifier, status::StatusClass};
use async_trait::async_trait;
use pulse_core::{Aggregator, AggregatorRegistry, Counter, Histogram, PulseError, Result, Snapshot};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

const NAMESPACE: &str = "fetch";

pub type UninstrumentedHook = Arc<dyn Fn(&FetchRequest) + Send + Sync>;

/// Accumulators for one classified service.
#[derive(Debug, Default)]
pub struct ServiceStats {
    pub requests: Counter,
    statuses: [Counter; 4],
    response_times: [Histogram; 2],
    pub failed: Counter,
    pub timeouts: Counter,
}

impl ServiceStats {
    pub fn status(&self, class: StatusClass) -> &Counter {
        &self.statuses[class.index()]
    }

    /// Response-time histogram, only kept for 2xx and 3xx.
    pub fn response_time(&self, class: StatusClass) -> Option<&Histogram> {
        class
            .is_timed()
            .then(|| &self.response_times[class.index()])
    }

    fn report(&self, service: &str, snapshot: &mut Snapshot) {
        let prefix = format!("{}.{}", NAMESPACE, service);

        snapshot.insert(
            format!("{}.count", prefix),
            self.requests.read_and_reset() as f64,
        );

        for class in StatusClass::ALL {
            let status_prefix = format!("{}.response.status_{}", prefix, class);

            if let Some(histogram) = self.response_time(class) {
                let stats = histogram.read_and_reset();
                snapshot.insert(format!("{}.response_time.mean", status_prefix), stats.mean);
                snapshot.insert(format!("{}.response_time.min", status_prefix), stats.min);
                snapshot.insert(format!("{}.response_time.max", status_prefix), stats.max);
            }

            snapshot.insert(
                format!("{}.count", status_prefix),
                self.status(class).read_and_reset() as f64,
            );
        }

        snapshot.insert(
            format!("{}.response.status_failed.count", prefix),
            self.failed.read_and_reset() as f64,
        );
        snapshot.insert(
            format!("{}.response.status_timeout.count", prefix),
            self.timeouts.read_and_reset() as f64,
        );
    }
}

/// Per-service accounting for calls made through an instrumented [`FetchSlot`].
pub struct CallInterceptor {
    classifier: ServiceClassifier,
    services: HashMap<String, ServiceStats>,
    on_uninstrumented: Option<UninstrumentedHook>,
}

impl CallInterceptor {
    /// Creates the accumulators for every known service up front.
    pub fn new(classifier: ServiceClassifier) -> Self {
        let services = classifier
            .service_names()
            .map(|name| (name.to_string(), ServiceStats::default()))
            .collect();

        Self {
            classifier,
            services,
            on_uninstrumented: None,
        }
    }

    /// Callback for calls whose target matches no known service.
    pub fn on_uninstrumented<F>(mut self, hook: F) -> Self
    where
        F: Fn(&FetchRequest) + Send + Sync + 'static,
    {
        self.on_uninstrumented = Some(Arc::new(hook));
        self
    }

    pub fn stats(&self, service: &str) -> Option<&ServiceStats> {
        self.services.get(service)
    }

    /// Wraps the primitive held by `slot` and registers the reporter.
    ///
    /// Fails when the slot holds no primitive. When the slot is already
    /// instrumented this logs a warning and returns `Ok(None)` without
    /// registering anything.
    pub fn install<'a>(
        self,
        slot: &'a FetchSlot,
        registry: &AggregatorRegistry,
    ) -> Result<Option<RestoreHandle<'a>>> {
        let interceptor = Arc::new(self);
        let accounting = interceptor.clone();

        let original = slot
            .wrap(move |inner| {
                let wrapped: DynFetch = Arc::new(InstrumentedFetch {
                    inner,
                    interceptor: accounting,
                });
                wrapped
            })
            .map_err(|_| {
                PulseError::Environment(
                    "No fetch primitive available. Provide one before instrumenting it".to_string(),
                )
            })?;

        let Some((original, wrapper)) = original else {
            warn!("Fetch can only be instrumented once; ignoring repeated install");
            return Ok(None);
        };

        registry.register(interceptor.clone());
        info!(
            "Instrumented fetch for {} services",
            interceptor.classifier.len()
        );

        Ok(Some(RestoreHandle {
            slot,
            original,
            wrapper,
        }))
    }

    /// Runs one call through `inner`, accounting for it if its target is known.
    ///
    /// The call's outcome is returned unchanged.
    pub async fn intercept(
        &self,
        inner: &dyn Fetch,
        request: FetchRequest,
    ) -> std::result::Result<FetchResponse, FetchError> {
        let Some(stats) = self
            .classifier
            .classify(&request.url)
            .and_then(|service| self.services.get(service))
        else {
            if let Some(hook) = &self.on_uninstrumented {
                hook(&request);
            }
            return inner.fetch(request).await;
        };

        let started = Instant::now();
        stats.requests.inc();

        match inner.fetch(request).await {
            Ok(response) => {
                match StatusClass::from_status(response.status) {
                    Some(class) => {
                        if let Some(histogram) = stats.response_time(class) {
                            histogram.update_duration(started.elapsed());
                        }
                        stats.status(class).inc();
                    }
                    None => debug!("No status bucket for {:?}", response.status),
                }
                Ok(response)
            }
            Err(error) => {
                if error.is_timeout() {
                    stats.timeouts.inc();
                } else {
                    stats.failed.inc();
                }
                Err(error)
            }
        }
    }
}

impl Aggregator for CallInterceptor {
    fn collect(&self) -> Snapshot {
        let mut snapshot = Snapshot::new();

        for service in self.classifier.service_names() {
            if let Some(stats) = self.services.get(service) {
                stats.report(service, &mut snapshot);
            }
        }

        snapshot
    }

    fn name(&self) -> &str {
        NAMESPACE
    }
}

struct InstrumentedFetch {
    inner: DynFetch,
    interceptor: Arc<CallInterceptor>,
}

#[async_trait]
impl Fetch for InstrumentedFetch {
    async fn fetch(
        &self,
        request: FetchRequest,
    ) -> std::result::Result<FetchResponse, FetchError> {
        self.interceptor.intercept(self.inner.as_ref(), request).await
    }
}

/// Returns an instrumented slot to its original primitive.
#[must_use = "dropping the handle leaves fetch instrumented with no way to restore it"]
pub struct RestoreHandle<'a> {
    slot: &'a FetchSlot,
    original: DynFetch,
    wrapper: DynFetch,
}

impl RestoreHandle<'_> {
    /// Returns whether the original primitive was put back.
    pub fn restore(self) -> bool {
        let restored = self.slot.restore(&self.wrapper, self.original);
        if restored {
            info!("Restored uninstrumented fetch");
        }
        restored
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Scripted(std::result::Result<FetchResponse, FetchError>);

    #[async_trait]
    impl Fetch for Scripted {
        async fn fetch(
            &self,
            _request: FetchRequest,
        ) -> std::result::Result<FetchResponse, FetchError> {
            self.0.clone()
        }
    }

    fn interceptor() -> CallInterceptor {
        CallInterceptor::new(
            ServiceClassifier::from_patterns([("capi", "capi\\.example"), ("search", "search")])
                .unwrap(),
        )
    }

    #[test]
    fn test_stats_created_eagerly() {
        let interceptor = interceptor();
        assert!(interceptor.stats("capi").is_some());
        assert!(interceptor.stats("search").is_some());
        assert!(interceptor.stats("other").is_none());
    }

    #[tokio::test]
    async fn test_success_is_timed() {
        let interceptor = interceptor();
        let inner = Scripted(Ok(FetchResponse::with_status(200)));

        interceptor
            .intercept(&inner, FetchRequest::get("https://capi.example/a"))
            .await
            .unwrap();

        let stats = interceptor.stats("capi").unwrap();
        assert_eq!(stats.requests.get(), 1);
        assert_eq!(stats.status(StatusClass::Success).get(), 1);
        assert_eq!(stats.response_time(StatusClass::Success).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn test_missing_status_counts_as_2xx() {
        let interceptor = interceptor();
        let inner = Scripted(Ok(FetchResponse::default()));

        interceptor
            .intercept(&inner, FetchRequest::get("https://search/q"))
            .await
            .unwrap();

        let stats = interceptor.stats("search").unwrap();
        assert_eq!(stats.status(StatusClass::Success).get(), 1);
    }

    #[tokio::test]
    async fn test_generic_failure() {
        let interceptor = interceptor();
        let inner = Scripted(Err(FetchError::Failed("connection reset".into())));

        let err = interceptor
            .intercept(&inner, FetchRequest::get("https://capi.example/a"))
            .await
            .unwrap_err();

        let stats = interceptor.stats("capi").unwrap();
        assert_eq!(err, FetchError::Failed("connection reset".into()));
        assert_eq!(stats.failed.get(), 1);
        assert_eq!(stats.timeouts.get(), 0);
    }

    #[tokio::test]
    async fn test_reporter_emits_and_clears() {
        let interceptor = interceptor();
        let ok = Scripted(Ok(FetchResponse::with_status(301)));
        let unavailable = Scripted(Ok(FetchResponse::with_status(503)));

        interceptor
            .intercept(&ok, FetchRequest::get("https://capi.example/a"))
            .await
            .unwrap();
        interceptor
            .intercept(&unavailable, FetchRequest::get("https://capi.example/b"))
            .await
            .unwrap();

        let snapshot = interceptor.collect();
        assert_eq!(snapshot["fetch.capi.count"], 2.0);
        assert_eq!(snapshot["fetch.capi.response.status_3xx.count"], 1.0);
        assert_eq!(snapshot["fetch.capi.response.status_5xx.count"], 1.0);
        assert_eq!(snapshot["fetch.capi.response.status_2xx.count"], 0.0);
        assert!(snapshot.contains_key("fetch.capi.response.status_3xx.response_time.max"));
        assert!(!snapshot.contains_key("fetch.capi.response.status_5xx.response_time.max"));
        assert_eq!(snapshot["fetch.search.count"], 0.0);

        let snapshot = interceptor.collect();
        assert_eq!(snapshot["fetch.capi.count"], 0.0);
        assert_eq!(snapshot["fetch.capi.response.status_3xx.count"], 0.0);
    }
}
