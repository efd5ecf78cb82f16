use pulse_core::{PulseError, Result};
use pulse_plugins::ServiceClassifier;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::time::Duration;
use tracing::warn;

/// Plugin identifier that restricts the defaults to ad hoc counters and histograms.
pub const CUSTOM_COUNTERS: &str = "customCounters";

pub const DEFAULT_PRODUCT: &str = "unknown-product";

const KNOWN_PLUGINS: &[&str] = &[CUSTOM_COUNTERS];

/// Longest accepted flush period: one year.
pub const MAX_FLUSH_EVERY_MS: i64 = 365 * 24 * 60 * 60 * 1000;

/// Flush period in milliseconds, as written in configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FlushEvery {
    Millis(i64),
    Fractional(f64),
    Text(String),
}

impl FlushEvery {
    pub fn to_duration(&self) -> Result<Duration> {
        let millis = match self {
            FlushEvery::Millis(millis) => *millis,
            FlushEvery::Fractional(value) => {
                return Err(PulseError::InvalidConfig(format!(
                    "flushEvery must be an integer, got {}",
                    value
                )))
            }
            FlushEvery::Text(text) => text.trim().parse::<i64>().map_err(|_| {
                PulseError::InvalidConfig(format!("flushEvery must be an integer, got '{}'", text))
            })?,
        };

        if millis <= 0 {
            return Err(PulseError::InvalidConfig(format!(
                "flushEvery must be a positive number of milliseconds, got {}",
                millis
            )));
        }

        if millis > MAX_FLUSH_EVERY_MS {
            return Err(PulseError::InvalidConfig(format!(
                "flushEvery must be at most {} milliseconds, got {}",
                MAX_FLUSH_EVERY_MS, millis
            )));
        }

        Ok(Duration::from_millis(millis as u64))
    }
}

impl From<i64> for FlushEvery {
    fn from(millis: i64) -> Self {
        FlushEvery::Millis(millis)
    }
}

impl From<&str> for FlushEvery {
    fn from(text: &str) -> Self {
        FlushEvery::Text(text.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceSpec {
    pub name: String,
    pub pattern: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineConfig {
    #[serde(default)]
    pub app: Option<String>,
    #[serde(default)]
    pub product: Option<String>,
    #[serde(default)]
    pub flush_every: Option<FlushEvery>,
    #[serde(default)]
    pub plugins: Option<BTreeSet<String>>,
    #[serde(default)]
    pub suppress_delivery: bool,
    #[serde(default)]
    pub services: Vec<ServiceSpec>,
}

/// Which default aggregators the engine installs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PluginSelection {
    All,
    Only(BTreeSet<String>),
}

impl PluginSelection {
    pub fn custom_counters(&self) -> bool {
        match self {
            PluginSelection::All => true,
            PluginSelection::Only(plugins) => plugins.contains(CUSTOM_COUNTERS),
        }
    }

    /// System, flush-rate and HTTP aggregators are only installed without a restriction.
    pub fn full_defaults(&self) -> bool {
        matches!(self, PluginSelection::All)
    }
}

/// Validated, immutable engine configuration.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub app: String,
    pub product: Option<String>,
    pub flush_every: Duration,
    pub plugins: PluginSelection,
    pub suppress_delivery: bool,
    pub services: Vec<ServiceSpec>,
}

impl EngineSettings {
    pub fn classifier(&self) -> Result<ServiceClassifier> {
        ServiceClassifier::from_patterns(
            self.services
                .iter()
                .map(|service| (service.name.clone(), service.pattern.as_str())),
        )
    }
}

impl EngineConfig {
    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder::default()
    }

    pub fn validate(&self) -> Result<EngineSettings> {
        let app = match self.app.as_deref().map(str::trim) {
            Some(app) if !app.is_empty() => app.to_string(),
            _ => {
                return Err(PulseError::invalid_config(
                    "You need to specify an application name in the configuration options",
                ))
            }
        };

        let flush_every = self
            .flush_every
            .as_ref()
            .ok_or_else(|| PulseError::invalid_config("flushEvery is required"))?
            .to_duration()?;

        let plugins = match &self.plugins {
            None => PluginSelection::All,
            Some(plugins) => {
                for plugin in plugins {
                    if !KNOWN_PLUGINS.contains(&plugin.as_str()) {
                        warn!("Ignoring unknown plugin '{}'", plugin);
                    }
                }
                PluginSelection::Only(plugins.clone())
            }
        };

        for (i, service) in self.services.iter().enumerate() {
            if service.name.is_empty() {
                return Err(PulseError::InvalidConfig(format!(
                    "Service {} name cannot be empty",
                    i
                )));
            }
        }

        let settings = EngineSettings {
            app,
            product: self.product.clone().filter(|p| !p.trim().is_empty()),
            flush_every,
            plugins,
            suppress_delivery: self.suppress_delivery,
            services: self.services.clone(),
        };

        settings.classifier()?;
        Ok(settings)
    }
}

#[derive(Default)]
pub struct EngineConfigBuilder {
    app: Option<String>,
    product: Option<String>,
    flush_every: Option<FlushEvery>,
    plugins: Option<BTreeSet<String>>,
    suppress_delivery: bool,
    services: Vec<ServiceSpec>,
}

impl EngineConfigBuilder {
    pub fn app(mut self, app: impl Into<String>) -> Self {
        self.app = Some(app.into());
        self
    }

    pub fn product(mut self, product: impl Into<String>) -> Self {
        self.product = Some(product.into());
        self
    }

    pub fn flush_every(mut self, flush_every: impl Into<FlushEvery>) -> Self {
        self.flush_every = Some(flush_every.into());
        self
    }

    pub fn plugin(mut self, plugin: impl Into<String>) -> Self {
        self.plugins
            .get_or_insert_with(BTreeSet::new)
            .insert(plugin.into());
        self
    }

    pub fn suppress_delivery(mut self, suppress: bool) -> Self {
        self.suppress_delivery = suppress;
        self
    }

    pub fn service(mut self, name: impl Into<String>, pattern: impl Into<String>) -> Self {
        self.services.push(ServiceSpec {
            name: name.into(),
            pattern: pattern.into(),
        });
        self
    }

    pub fn build(self) -> EngineConfig {
        EngineConfig {
            app: self.app,
            product: self.product,
            flush_every: self.flush_every,
            plugins: self.plugins,
            suppress_delivery: self.suppress_delivery,
            services: self.services,
        }
    }
}
