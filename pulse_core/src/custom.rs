use crate::aggregator::{Aggregator, Snapshot};
use crate::counter::Counter;
use crate::histogram::Histogram;
use dashmap::DashMap;
use std::sync::Arc;
use tracing::debug;

/// Counters keyed by arbitrary names, created on first use.
#[derive(Default)]
pub struct CounterSet {
    counters: DashMap<String, Arc<Counter>>,
}

impl CounterSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the counter for `name`, creating it on first reference.
    pub fn counter(&self, name: &str) -> Arc<Counter> {
        if let Some(counter) = self.counters.get(name) {
            return counter.clone();
        }

        self.counters
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(Counter::new()))
            .clone()
    }

    pub fn increment(&self, name: &str, amount: u64) {
        debug!("Count - {}", name);
        self.counter(name).increment(amount);
    }

    pub fn len(&self) -> usize {
        self.counters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counters.is_empty()
    }
}

impl Aggregator for CounterSet {
    fn collect(&self) -> Snapshot {
        self.counters
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().read_and_reset() as f64))
            .collect()
    }

    fn name(&self) -> &str {
        "custom_counters"
    }
}

/// Histograms keyed by arbitrary names, created on first use.
#[derive(Default)]
pub struct HistogramSet {
    histograms: DashMap<String, Arc<Histogram>>,
}

impl HistogramSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn histogram(&self, name: &str) -> Arc<Histogram> {
        if let Some(histogram) = self.histograms.get(name) {
            return histogram.clone();
        }

        self.histograms
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(Histogram::new()))
            .clone()
    }

    pub fn update(&self, name: &str, value: f64) {
        self.histogram(name).update(value);
    }

    pub fn len(&self) -> usize {
        self.histograms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.histograms.is_empty()
    }
}

impl Aggregator for HistogramSet {
    fn collect(&self) -> Snapshot {
        let mut snapshot = Snapshot::new();

        for entry in self.histograms.iter() {
            let name = entry.key();
            let stats = entry.value().read_and_reset();
            snapshot.insert(format!("{}.min", name), stats.min);
            snapshot.insert(format!("{}.max", name), stats.max);
            snapshot.insert(format!("{}.mean", name), stats.mean);
            snapshot.insert(format!("{}.count", name), stats.count as f64);
        }

        snapshot
    }

    fn name(&self) -> &str {
        "custom_histograms"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counter_reused_by_name() {
        let counters = CounterSet::new();
        let first = counters.counter("hits");
        counters.increment("hits", 2);

        assert!(Arc::ptr_eq(&first, &counters.counter("hits")));
        assert_eq!(counters.len(), 1);
        assert_eq!(first.get(), 2);
    }

    #[test]
    fn test_counters_reset_on_collect() {
        let counters = CounterSet::new();
        counters.increment("hits", 1);
        counters.increment("misses", 4);

        let snapshot = counters.collect();
        assert_eq!(snapshot["hits"], 1.0);
        assert_eq!(snapshot["misses"], 4.0);

        let snapshot = counters.collect();
        assert_eq!(snapshot["hits"], 0.0);
        assert_eq!(snapshot["misses"], 0.0);
    }

    #[test]
    fn test_histograms_flatten_and_reset() {
        let histograms = HistogramSet::new();
        histograms.update("latency", 5.0);
        histograms.update("latency", 15.0);

        let snapshot = histograms.collect();
        assert_eq!(snapshot["latency.min"], 5.0);
        assert_eq!(snapshot["latency.max"], 15.0);
        assert_eq!(snapshot["latency.mean"], 10.0);
        assert_eq!(snapshot["latency.count"], 2.0);

        let snapshot = histograms.collect();
        assert_eq!(snapshot["latency.count"], 0.0);
        assert_eq!(snapshot["latency.max"], 0.0);
    }
}
