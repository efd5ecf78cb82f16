use crate::env::MetricNamespace;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pulse_core::{PulseError, Result, Snapshot, Transport};
use reqwest::Client;
use serde::Serialize;
use tracing::debug;

pub const DEFAULT_ENDPOINT: &str = "https://api.datadoghq.com/api/v1/series";

#[derive(Debug, Clone, Serialize)]
pub struct SeriesPayload {
    pub series: Vec<Series>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Series {
    pub metric: String,
    pub points: Vec<(i64, f64)>,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub tags: Vec<String>,
}

/// Ships snapshots to the Datadog series API.
pub struct DatadogTransport {
    client: Client,
    api_key: String,
    endpoint: String,
    namespace: MetricNamespace,
}

impl DatadogTransport {
    pub fn new(api_key: impl Into<String>, namespace: MetricNamespace) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            namespace,
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn payload(&self, snapshot: &Snapshot, timestamp: DateTime<Utc>) -> SeriesPayload {
        let prefix = self.namespace.series_prefix();
        let tags = vec![
            format!("platform:{}", self.namespace.platform),
            format!("hostname:{}", self.namespace.hostname),
        ];

        SeriesPayload {
            series: snapshot
                .iter()
                .filter(|(_, value)| value.is_finite())
                .map(|(name, value)| Series {
                    metric: format!("{}.{}", prefix, name),
                    points: vec![(timestamp.timestamp(), *value)],
                    kind: "gauge",
                    tags: tags.clone(),
                })
                .collect(),
        }
    }
}

#[async_trait]
impl Transport for DatadogTransport {
    async fn log(&self, snapshot: Snapshot) -> Result<()> {
        let payload = self.payload(&snapshot, Utc::now());
        debug!("Sending {} series to Datadog", payload.series.len());

        self.client
            .post(&self.endpoint)
            .header("DD-API-KEY", &self.api_key)
            .json(&payload)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|e| PulseError::Transport(e.to_string()))?;

        Ok(())
    }

    fn name(&self) -> &str {
        "datadog"
    }
}
