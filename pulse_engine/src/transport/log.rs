use crate::env::MetricNamespace;
use async_trait::async_trait;
use pulse_core::{Result, Snapshot, Transport};
use tracing::{debug, info};

/// Writes each snapshot to the tracing output instead of a backend.
pub struct LogTransport {
    namespace: MetricNamespace,
}

impl LogTransport {
    pub fn new(namespace: MetricNamespace) -> Self {
        Self { namespace }
    }
}

#[async_trait]
impl Transport for LogTransport {
    async fn log(&self, snapshot: Snapshot) -> Result<()> {
        for (name, value) in &snapshot {
            debug!("{}.{} = {}", self.namespace, name, value);
        }

        info!(
            namespace = %self.namespace,
            "Metrics snapshot: {}",
            serde_json::to_string(&snapshot)?
        );
        Ok(())
    }

    fn name(&self) -> &str {
        "log"
    }
}
