use std::collections::BTreeMap;
use std::sync::Arc;

/// Flat mapping from dotted metric name to value, produced by one flush cycle.
pub type Snapshot = BTreeMap<String, f64>;

/// A source of metrics that contributes to the periodic snapshot.
///
/// Collecting is coupled with clearing: after `collect` returns, the
/// accumulators it reported from start a fresh window.
pub trait Aggregator: Send + Sync {
    /// Report the current window and reset it
    fn collect(&self) -> Snapshot;

    /// Name used in logs
    fn name(&self) -> &str;
}

pub type DynAggregator = Arc<dyn Aggregator>;

/// Adapts a closure into an [`Aggregator`].
pub struct FnAggregator<F> {
    name: String,
    func: F,
}

impl<F> FnAggregator<F>
where
    F: Fn() -> Snapshot + Send + Sync,
{
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            func,
        }
    }
}

impl<F> Aggregator for FnAggregator<F>
where
    F: Fn() -> Snapshot + Send + Sync,
{
    fn collect(&self) -> Snapshot {
        (self.func)()
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Merges snapshots in order; a name present in several keeps the last value.
pub fn merge_snapshots<I>(snapshots: I) -> Snapshot
where
    I: IntoIterator<Item = Snapshot>,
{
    snapshots
        .into_iter()
        .fold(Snapshot::new(), |mut merged, snapshot| {
            merged.extend(snapshot);
            merged
        })
}
