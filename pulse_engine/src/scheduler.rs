use pulse_core::{AggregatorRegistry, DynTransport};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Collects every aggregator once and hands the merged snapshot to the transport.
///
/// Collection happens before this returns; delivery runs on its own task so
/// a slow transport never holds up the caller.
pub fn flush_cycle(registry: &AggregatorRegistry, transport: DynTransport) -> JoinHandle<()> {
    let snapshot = registry.collect_all();
    debug!(
        "Flushing {} metrics via '{}'",
        snapshot.len(),
        transport.name()
    );

    tokio::spawn(async move {
        if let Err(e) = transport.log(snapshot).await {
            warn!("Failed to deliver metrics via '{}': {}", transport.name(), e);
        }
    })
}

/// Runs [`flush_cycle`] on a fixed period until stopped.
///
/// Ticks are never skipped or coalesced while earlier deliveries are still
/// in flight.
pub struct FlushScheduler {
    shutdown: CancellationToken,
    task: JoinHandle<()>,
}

impl FlushScheduler {
    /// Must be called from within a tokio runtime.
    pub fn start(
        period: Duration,
        registry: Arc<AggregatorRegistry>,
        transport: DynTransport,
    ) -> Self {
        let shutdown = CancellationToken::new();
        let token = shutdown.clone();

        info!("Flushing metrics every {:?}", period);

        let task = tokio::spawn(async move {
            let Some(first) = Instant::now().checked_add(period) else {
                warn!("Flush period {:?} is out of range; not flushing", period);
                token.cancelled().await;
                return;
            };
            let mut ticker = interval_at(first, period);

            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        flush_cycle(&registry, transport.clone());
                    }
                }
            }

            debug!("Flush scheduler stopped");
        });

        Self { shutdown, task }
    }

    pub fn stop(&self) {
        self.shutdown.cancel();
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }
}

impl Drop for FlushScheduler {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
