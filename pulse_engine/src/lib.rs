pub mod config;
pub mod engine;
pub mod env;
pub mod parser;
pub mod scheduler;
pub mod transport;

pub use config::{EngineConfig, EngineSettings, FlushEvery, PluginSelection, ServiceSpec};
pub use engine::{global, HttpInstrument, InstrumentAs, MetricsEngine};
pub use env::{Environment, MetricNamespace, Platform};
pub use parser::{parse_config_from_file, parse_config_from_str};
pub use scheduler::{flush_cycle, FlushScheduler};
pub use transport::{DatadogTransport, LogTransport};
