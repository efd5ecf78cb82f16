pub mod aggregator;
pub mod counter;
pub mod custom;
pub mod error;
pub mod histogram;
pub mod registry;
pub mod transport;

pub use aggregator::{merge_snapshots, Aggregator, DynAggregator, FnAggregator, Snapshot};
pub use counter::Counter;
pub use custom::{CounterSet, HistogramSet};
pub use error::{PulseError, Result};
pub use histogram::{Histogram, HistogramSnapshot};
pub use registry::AggregatorRegistry;
pub use transport::{DynTransport, Transport};

// Re-export commonly used types
pub use async_trait::async_trait;
