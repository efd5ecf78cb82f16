pub mod datadog;
pub mod log;

pub use datadog::DatadogTransport;
pub use log::LogTransport;
