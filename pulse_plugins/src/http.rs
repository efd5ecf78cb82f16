//! Recorders for inbound HTTP traffic.
//!
//! Server code calls these from its request/response path; the engine
//! registers both as aggregators.

use crate::status::StatusClass;
use pulse_core::{Aggregator, Counter, CounterSet, Histogram, Snapshot};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

#[derive(Default)]
pub struct HttpRequestMetrics {
    total: Counter,
    methods: CounterSet,
}

impl HttpRequestMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, method: &str) {
        self.total.inc();
        self.methods.increment(&method.to_ascii_lowercase(), 1);
    }
}

impl Aggregator for HttpRequestMetrics {
    fn collect(&self) -> Snapshot {
        let mut snapshot: Snapshot = self
            .methods
            .collect()
            .into_iter()
            .map(|(method, count)| (format!("http.request.method_{}.count", method), count))
            .collect();

        snapshot.insert("http.request.count".to_string(), self.total.read_and_reset() as f64);
        snapshot
    }

    fn name(&self) -> &str {
        "http_request"
    }
}

#[derive(Default)]
pub struct HttpResponseMetrics {
    statuses: [Counter; 4],
    response_times: [Histogram; 4],
}

impl HttpResponseMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, status: u16, elapsed: Duration) {
        let Some(class) = StatusClass::from_status(Some(status)) else {
            debug!("No status bucket for response status {}", status);
            return;
        };

        self.statuses[class.index()].inc();
        self.response_times[class.index()].update_duration(elapsed);
    }

    /// Starts timing a response; call [`ResponseTimer::finish`] once the status is known.
    pub fn start(self: &Arc<Self>) -> ResponseTimer {
        ResponseTimer {
            metrics: self.clone(),
            started: Instant::now(),
        }
    }
}

impl Aggregator for HttpResponseMetrics {
    fn collect(&self) -> Snapshot {
        let mut snapshot = Snapshot::new();

        for class in StatusClass::ALL {
            let prefix = format!("http.response.status_{}", class);
            let stats = self.response_times[class.index()].read_and_reset();

            snapshot.insert(
                format!("{}.count", prefix),
                self.statuses[class.index()].read_and_reset() as f64,
            );
            snapshot.insert(format!("{}.response_time.min", prefix), stats.min);
            snapshot.insert(format!("{}.response_time.max", prefix), stats.max);
            snapshot.insert(format!("{}.response_time.mean", prefix), stats.mean);
        }

        snapshot
    }

    fn name(&self) -> &str {
        "http_response"
    }
}

pub struct ResponseTimer {
    metrics: Arc<HttpResponseMetrics>,
    started: Instant,
}

impl ResponseTimer {
    pub fn finish(self, status: u16) {
        self.metrics.record(status, self.started.elapsed());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_methods() {
        let requests = HttpRequestMetrics::new();
        requests.record("GET");
        requests.record("get");
        requests.record("POST");

        let snapshot = requests.collect();
        assert_eq!(snapshot["http.request.count"], 3.0);
        assert_eq!(snapshot["http.request.method_get.count"], 2.0);
        assert_eq!(snapshot["http.request.method_post.count"], 1.0);

        let snapshot = requests.collect();
        assert_eq!(snapshot["http.request.count"], 0.0);
        assert_eq!(snapshot["http.request.method_get.count"], 0.0);
    }

    #[test]
    fn test_response_buckets() {
        let responses = HttpResponseMetrics::new();
        responses.record(200, Duration::from_millis(10));
        responses.record(204, Duration::from_millis(30));
        responses.record(404, Duration::from_millis(5));
        responses.record(101, Duration::from_millis(1));

        let snapshot = responses.collect();
        assert_eq!(snapshot["http.response.status_2xx.count"], 2.0);
        assert_eq!(snapshot["http.response.status_2xx.response_time.max"], 30.0);
        assert_eq!(snapshot["http.response.status_4xx.count"], 1.0);
        assert_eq!(snapshot["http.response.status_5xx.count"], 0.0);
    }

    #[test]
    fn test_response_timer() {
        let responses = Arc::new(HttpResponseMetrics::new());
        responses.start().finish(500);

        assert_eq!(responses.collect()["http.response.status_5xx.count"], 1.0);
    }
}
