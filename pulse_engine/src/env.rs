//! Naming inputs resolved once from the process environment.

use crate::config::{EngineSettings, DEFAULT_PRODUCT};
use serde::Serialize;
use std::fmt;

pub const API_KEY_VAR: &str = "DATADOG_API_KEY";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Kubernetes,
    Local,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Kubernetes => "kubernetes",
            Platform::Local => "local",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Environment {
    pub platform: Platform,
    pub hostname: String,
    pub environment: String,
    pub product: Option<String>,
    pub api_key: Option<String>,
    pub debug_metrics: bool,
}

impl Environment {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let platform = if lookup("KUBERNETES_PORT").is_some() {
            Platform::Kubernetes
        } else {
            Platform::Local
        };

        let hostname = match platform {
            Platform::Kubernetes => non_empty("HOSTNAME")
                .map(|h| h.to_lowercase())
                .unwrap_or_else(|| "unknown-kubernetes".to_string()),
            Platform::Local => "localhost".to_string(),
        };

        Self {
            platform,
            hostname,
            environment: non_empty("ENVIRONMENT")
                .unwrap_or_else(|| "unknown-environment".to_string()),
            product: non_empty("PRODUCT"),
            api_key: non_empty(API_KEY_VAR),
            debug_metrics: lookup("DEBUGMETRICS").as_deref() == Some("1"),
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self.environment.as_str(), "production" | "prod")
    }

    /// Metrics must reach the backend in production or when forced with `DEBUGMETRICS=1`.
    pub fn delivery_required(&self) -> bool {
        self.debug_metrics || self.is_production()
    }

    pub fn namespace(&self, settings: &EngineSettings) -> MetricNamespace {
        let product = settings
            .product
            .clone()
            .or_else(|| self.product.clone())
            .unwrap_or_else(|| DEFAULT_PRODUCT.to_string());

        MetricNamespace {
            platform: self.platform.as_str().to_string(),
            hostname: self.hostname.clone(),
            product,
            environment: self.environment.clone(),
            app: settings.app.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetricNamespace {
    pub platform: String,
    pub hostname: String,
    pub product: String,
    pub environment: String,
    pub app: String,
}

impl MetricNamespace {
    /// `<product>.<environment>.<app>`, with platform and host carried as tags.
    pub fn series_prefix(&self) -> String {
        format!("{}.{}.{}", self.product, self.environment, self.app)
    }
}

impl fmt::Display for MetricNamespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}.{}.{}.{}",
            self.platform, self.hostname, self.product, self.environment, self.app
        )
    }
}
