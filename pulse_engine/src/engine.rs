use crate::{
    config::{EngineConfig, EngineSettings},
    env::{Environment, MetricNamespace, API_KEY_VAR},
    scheduler::{flush_cycle, FlushScheduler},
};
use pulse_core::{
    AggregatorRegistry, CounterSet, DynAggregator, DynTransport, HistogramSet,
    PulseError, Result, Snapshot,
};
use pulse_plugins::{
    CallInterceptor, FetchSlot, HttpRequestMetrics, HttpResponseMetrics, RestoreHandle,
    SystemSampler,
};
use std::str::FromStr;
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// What `instrument` should attach to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstrumentAs {
    HttpRequest,
    HttpResponse,
}

impl FromStr for InstrumentAs {
    type Err = PulseError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "http.request" => Ok(InstrumentAs::HttpRequest),
            "http.response" => Ok(InstrumentAs::HttpResponse),
            other => Err(PulseError::InvalidConfig(format!(
                "No valid instrumentation kind '{}'. Use \"http.request\" or \"http.response\"",
                other
            ))),
        }
    }
}

#[derive(Clone)]
pub enum HttpInstrument {
    Request(Arc<HttpRequestMetrics>),
    Response(Arc<HttpResponseMetrics>),
}

struct EngineRuntime {
    settings: EngineSettings,
    namespace: MetricNamespace,
    transport: DynTransport,
    scheduler: FlushScheduler,
}

/// Owns the ad hoc accumulators, the aggregator registry and the flush timer.
pub struct MetricsEngine {
    registry: Arc<AggregatorRegistry>,
    counters: Arc<CounterSet>,
    histograms: Arc<HistogramSet>,
    http_request: Arc<HttpRequestMetrics>,
    http_response: Arc<HttpResponseMetrics>,
    runtime: Mutex<Option<EngineRuntime>>,
}

static GLOBAL: OnceLock<MetricsEngine> = OnceLock::new();

/// Process-wide engine shared by all call sites.
pub fn global() -> &'static MetricsEngine {
    GLOBAL.get_or_init(MetricsEngine::new)
}

impl MetricsEngine {
    pub fn new() -> Self {
        Self {
            registry: Arc::new(AggregatorRegistry::new()),
            counters: Arc::new(CounterSet::new()),
            histograms: Arc::new(HistogramSet::new()),
            http_request: Arc::new(HttpRequestMetrics::new()),
            http_response: Arc::new(HttpResponseMetrics::new()),
            runtime: Mutex::new(None),
        }
    }

    /// Validates the configuration, installs the default aggregators and
    /// starts the flush timer.
    ///
    /// `make_transport` receives the resolved metric namespace. Calling
    /// `init` again after a successful initialisation logs a warning and
    /// changes nothing. Must be called from within a tokio runtime.
    pub fn init<F>(&self, config: EngineConfig, env: &Environment, make_transport: F) -> Result<()>
    where
        F: FnOnce(&MetricNamespace) -> DynTransport,
    {
        let mut runtime = self.runtime.lock().unwrap_or_else(|e| e.into_inner());

        if runtime.is_some() {
            warn!("Metrics already configured, not re-initialising");
            return Ok(());
        }

        debug!("Options passed to metrics engine: {:?}", config);
        let settings = config.validate()?;

        if env.delivery_required() && env.api_key.is_none() && !settings.suppress_delivery {
            return Err(PulseError::InvalidConfig(format!(
                "No {} is set. Set suppressDelivery if metrics should not be delivered",
                API_KEY_VAR
            )));
        }

        let namespace = env.namespace(&settings);
        let transport = make_transport(&namespace);

        self.setup_default_aggregators(&settings);

        let scheduler =
            FlushScheduler::start(settings.flush_every, self.registry.clone(), transport.clone());

        info!(
            "Metrics initialised for '{}' (transport: {}, delivery required: {})",
            namespace,
            transport.name(),
            env.delivery_required()
        );

        *runtime = Some(EngineRuntime {
            settings,
            namespace,
            transport,
            scheduler,
        });

        Ok(())
    }

    fn setup_default_aggregators(&self, settings: &EngineSettings) {
        if settings.plugins.custom_counters() {
            self.registry.register(self.counters.clone());
            self.registry.register(self.histograms.clone());
        }

        if settings.plugins.full_defaults() {
            self.registry.register(Arc::new(SystemSampler::new()));

            let rate = settings.flush_every.as_secs_f64();
            self.registry.register_fn("flush_rate", move || {
                Snapshot::from([("flush.rate".to_string(), rate)])
            });

            self.registry.register(self.http_request.clone());
            self.registry.register(self.http_response.clone());
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.runtime
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .is_some()
    }

    pub fn settings(&self) -> Option<EngineSettings> {
        self.runtime
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .map(|runtime| runtime.settings.clone())
    }

    pub fn namespace(&self) -> Option<MetricNamespace> {
        self.runtime
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .map(|runtime| runtime.namespace.clone())
    }

    pub fn count(&self, name: &str) {
        self.count_by(name, 1);
    }

    pub fn count_by(&self, name: &str, amount: u64) {
        self.counters.increment(name, amount);
    }

    pub fn histogram(&self, name: &str, value: f64) {
        self.histograms.update(name, value);
    }

    pub fn histogram_duration(&self, name: &str, elapsed: Duration) {
        self.histograms.histogram(name).update_duration(elapsed);
    }

    pub fn register_aggregator(&self, aggregator: DynAggregator) {
        self.registry.register(aggregator);
    }

    pub fn register_fn<F>(&self, name: impl Into<String>, func: F)
    where
        F: Fn() -> Snapshot + Send + Sync + 'static,
    {
        self.registry.register_fn(name, func);
    }

    pub fn registry(&self) -> &AggregatorRegistry {
        &self.registry
    }

    pub fn instrument(&self, kind: InstrumentAs) -> HttpInstrument {
        match kind {
            InstrumentAs::HttpRequest => HttpInstrument::Request(self.http_request.clone()),
            InstrumentAs::HttpResponse => HttpInstrument::Response(self.http_response.clone()),
        }
    }

    pub fn http_requests(&self) -> Arc<HttpRequestMetrics> {
        self.http_request.clone()
    }

    pub fn http_responses(&self) -> Arc<HttpResponseMetrics> {
        self.http_response.clone()
    }

    /// Installs `interceptor` on `slot` and registers its reporter with this engine.
    pub fn instrument_fetch<'a>(
        &self,
        slot: &'a FetchSlot,
        interceptor: CallInterceptor,
    ) -> Result<Option<RestoreHandle<'a>>> {
        interceptor.install(slot, &self.registry)
    }

    /// Runs every aggregator once and returns the merged snapshot without
    /// forwarding it.
    pub fn collect(&self) -> Snapshot {
        self.registry.collect_all()
    }

    /// Runs one flush cycle outside the timer.
    ///
    /// Returns the delivery task, or `None` when the engine has not been
    /// initialised.
    pub fn flush(&self) -> Option<JoinHandle<()>> {
        let transport = self
            .runtime
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .map(|runtime| runtime.transport.clone());

        match transport {
            Some(transport) => Some(flush_cycle(&self.registry, transport)),
            None => {
                debug!("Skipping flush, metrics engine is not initialised");
                None
            }
        }
    }

    /// Stops the flush timer. The engine stays initialised.
    pub fn shutdown(&self) {
        if let Some(runtime) = self.runtime.lock().unwrap_or_else(|e| e.into_inner()).as_ref() {
            info!("Stopping metrics flush timer");
            runtime.scheduler.stop();
        }
    }

    pub fn is_flushing(&self) -> bool {
        self.runtime
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .map(|runtime| runtime.scheduler.is_running())
            .unwrap_or(false)
    }
}

impl Default for MetricsEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CUSTOM_COUNTERS;
    use crate::transport::LogTransport;
    use std::collections::HashMap;

    fn local() -> Environment {
        Environment::from_lookup(|_| None)
    }

    fn production(api_key: Option<&str>) -> Environment {
        let mut vars = HashMap::from([("ENVIRONMENT", "production".to_string())]);
        if let Some(key) = api_key {
            vars.insert(API_KEY_VAR, key.to_string());
        }
        Environment::from_lookup(|key| vars.get(key).cloned())
    }

    fn log_transport(namespace: &MetricNamespace) -> DynTransport {
        Arc::new(LogTransport::new(namespace.clone()))
    }

    fn config() -> EngineConfig {
        EngineConfig::builder().app("api").flush_every(60_000).build()
    }

    #[tokio::test]
    async fn test_default_aggregators() {
        let engine = MetricsEngine::new();
        engine.init(config(), &local(), log_transport).unwrap();

        assert_eq!(
            engine.registry().list(),
            vec![
                "custom_counters",
                "custom_histograms",
                "system",
                "flush_rate",
                "http_request",
                "http_response"
            ]
        );
        assert_eq!(engine.collect()["flush.rate"], 60.0);
        assert!(engine.is_flushing());
    }

    #[tokio::test]
    async fn test_custom_counters_only() {
        let engine = MetricsEngine::new();
        let config = EngineConfig::builder()
            .app("api")
            .flush_every(1000)
            .plugin(CUSTOM_COUNTERS)
            .build();
        engine.init(config, &local(), log_transport).unwrap();

        assert_eq!(
            engine.registry().list(),
            vec!["custom_counters", "custom_histograms"]
        );
    }

    #[tokio::test]
    async fn test_reinit_is_noop() {
        let engine = MetricsEngine::new();
        engine.init(config(), &local(), log_transport).unwrap();
        let registered = engine.registry().len();

        let other = EngineConfig::builder().app("other").flush_every(5).build();
        engine.init(other, &local(), log_transport).unwrap();

        assert_eq!(engine.registry().len(), registered);
        assert_eq!(engine.settings().unwrap().app, "api");
    }

    #[tokio::test]
    async fn test_missing_app_is_fatal() {
        let engine = MetricsEngine::new();
        let config = EngineConfig::builder().flush_every(1000).build();

        assert!(engine.init(config, &local(), log_transport).unwrap_err().is_config());
        assert!(!engine.is_initialized());
    }

    #[tokio::test]
    async fn test_non_numeric_flush_every_is_fatal() {
        let engine = MetricsEngine::new();
        let config = EngineConfig::builder().app("api").flush_every("often").build();

        let err = engine.init(config, &local(), log_transport).unwrap_err();
        assert!(err.is_config());
        assert!(!engine.is_flushing());
        assert!(engine.registry().is_empty());
    }

    #[tokio::test]
    async fn test_credential_required_in_production() {
        let engine = MetricsEngine::new();
        let err = engine
            .init(config(), &production(None), log_transport)
            .unwrap_err();
        assert!(err.to_string().contains(API_KEY_VAR));

        let suppressed = EngineConfig::builder()
            .app("api")
            .flush_every(1000)
            .suppress_delivery(true)
            .build();
        engine
            .init(suppressed, &production(None), log_transport)
            .unwrap();
        assert!(engine.is_initialized());
    }

    #[tokio::test]
    async fn test_credential_present_in_production() {
        let engine = MetricsEngine::new();
        engine
            .init(config(), &production(Some("key")), log_transport)
            .unwrap();

        assert_eq!(engine.namespace().unwrap().environment, "production");
    }

    #[test]
    fn test_recording_before_init() {
        let engine = MetricsEngine::new();
        engine.count("hits");
        engine.count_by("hits", 2);
        engine.histogram("latency", 12.0);

        assert!(engine.flush().is_none());
        engine.register_aggregator(engine.counters.clone());
        assert_eq!(engine.collect()["hits"], 3.0);
    }

    #[test]
    fn test_instrument_kinds() {
        let engine = MetricsEngine::new();

        assert_eq!(
            "http.request".parse::<InstrumentAs>().unwrap(),
            InstrumentAs::HttpRequest
        );
        assert!("http.client".parse::<InstrumentAs>().unwrap_err().is_config());

        match engine.instrument(InstrumentAs::HttpResponse) {
            HttpInstrument::Response(responses) => {
                responses.record(200, Duration::from_millis(3));
                assert!(Arc::ptr_eq(&responses, &engine.http_responses()));
            }
            HttpInstrument::Request(_) => panic!("expected response instrument"),
        }
    }

    #[tokio::test]
    async fn test_shutdown_stops_timer() {
        let engine = MetricsEngine::new();
        engine.init(config(), &local(), log_transport).unwrap();

        engine.shutdown();
        tokio::task::yield_now().await;
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert!(!engine.is_flushing());
        assert!(engine.is_initialized());
    }
}
