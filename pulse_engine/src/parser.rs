use crate::config::EngineConfig;
use pulse_core::{PulseError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// TOML files keep the settings under a `[metrics]` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct MetricsFile {
    metrics: EngineConfig,
}

pub async fn parse_config_from_file(path: impl AsRef<Path>) -> Result<EngineConfig> {
    let path = path.as_ref();
    let contents = tokio::fs::read_to_string(path).await?;

    let extension = path.extension().and_then(|s| s.to_str());

    match extension {
        Some("yaml") | Some("yml") => parse_yaml(&contents),
        Some("toml") => parse_toml(&contents),
        Some("json") => parse_json(&contents),
        _ => Err(PulseError::invalid_config(
            "Unsupported file format. Use .yaml, .yml, .toml, or .json",
        )),
    }
}

pub fn parse_config_from_str(content: &str, format: &str) -> Result<EngineConfig> {
    match format.to_lowercase().as_str() {
        "yaml" | "yml" => parse_yaml(content),
        "toml" => parse_toml(content),
        "json" => parse_json(content),
        _ => Err(PulseError::InvalidConfig(format!(
            "Unsupported format: {}",
            format
        ))),
    }
}

fn parse_yaml(content: &str) -> Result<EngineConfig> {
    let config: EngineConfig = serde_yaml::from_str(content)
        .map_err(|e| PulseError::InvalidConfig(format!("Invalid YAML: {}", e)))?;
    config.validate()?;
    Ok(config)
}

fn parse_toml(content: &str) -> Result<EngineConfig> {
    let file: MetricsFile = toml::from_str(content)
        .map_err(|e| PulseError::InvalidConfig(format!("Invalid TOML: {}", e)))?;
    file.metrics.validate()?;
    Ok(file.metrics)
}

fn parse_json(content: &str) -> Result<EngineConfig> {
    let config: EngineConfig = serde_json::from_str(content)
        .map_err(|e| PulseError::InvalidConfig(format!("Invalid JSON: {}", e)))?;
    config.validate()?;
    Ok(config)
}
