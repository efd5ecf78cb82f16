use crate::aggregator::{merge_snapshots, DynAggregator, FnAggregator, Snapshot};
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, RwLock};
use tracing::{debug, error};

/// Ordered list of aggregators invoked on every flush.
///
/// Registration order is significant: when two aggregators report the same
/// metric name, the one registered later wins the merge.
#[derive(Default)]
pub struct AggregatorRegistry {
    aggregators: RwLock<Vec<DynAggregator>>,
}

impl AggregatorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an aggregator. Registering the same one twice runs it twice.
    pub fn register(&self, aggregator: DynAggregator) {
        debug!("Registering aggregator '{}'", aggregator.name());
        self.aggregators
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(aggregator);
    }

    pub fn register_fn<F>(&self, name: impl Into<String>, func: F)
    where
        F: Fn() -> Snapshot + Send + Sync + 'static,
    {
        self.register(Arc::new(FnAggregator::new(name, func)));
    }

    pub fn len(&self) -> usize {
        self.aggregators
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn list(&self) -> Vec<String> {
        self.aggregators
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .map(|aggregator| aggregator.name().to_string())
            .collect()
    }

    /// Invokes every aggregator in registration order and merges the results.
    ///
    /// A panicking aggregator is logged and contributes nothing; the others
    /// still report.
    pub fn collect_all(&self) -> Snapshot {
        let aggregators: Vec<DynAggregator> = self
            .aggregators
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone();

        merge_snapshots(aggregators.iter().filter_map(|aggregator| {
            match panic::catch_unwind(AssertUnwindSafe(|| aggregator.collect())) {
                Ok(snapshot) => Some(snapshot),
                Err(_) => {
                    error!("Aggregator '{}' panicked during collection", aggregator.name());
                    None
                }
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::counter::Counter;

    #[test]
    fn test_collect_merges_in_registration_order() {
        let registry = AggregatorRegistry::new();
        registry.register_fn("first", || Snapshot::from([("a".to_string(), 1.0)]));
        registry.register_fn("second", || {
            Snapshot::from([("a".to_string(), 2.0), ("b".to_string(), 3.0)])
        });

        let snapshot = registry.collect_all();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot["a"], 2.0);
        assert_eq!(snapshot["b"], 3.0);
    }

    #[test]
    fn test_duplicate_registration_runs_twice() {
        let registry = AggregatorRegistry::new();
        let calls = Arc::new(Counter::new());

        for _ in 0..2 {
            let calls = calls.clone();
            registry.register_fn("dup", move || {
                calls.inc();
                Snapshot::new()
            });
        }

        registry.collect_all();
        assert_eq!(calls.get(), 2);
        assert_eq!(registry.list(), vec!["dup", "dup"]);
    }

    #[test]
    fn test_panicking_aggregator_is_isolated() {
        let registry = AggregatorRegistry::new();
        registry.register_fn("broken", || panic!("boom"));
        registry.register_fn("healthy", || Snapshot::from([("ok".to_string(), 1.0)]));

        let snapshot = registry.collect_all();
        assert_eq!(snapshot.get("ok"), Some(&1.0));
    }

    #[test]
    fn test_empty_registry() {
        let registry = AggregatorRegistry::new();
        assert!(registry.is_empty());
        assert!(registry.collect_all().is_empty());
    }
}
