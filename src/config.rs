use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::metrics::StatusMatching;

/// One remote sheet and the class it holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceConfig {
    pub url: String,
    pub class_label: String,
}

impl SourceConfig {
    pub fn new(url: impl Into<String>, class_label: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            class_label: class_label.into(),
        }
    }
}

pub const DEFAULT_REFRESH_INTERVAL_SECS: u64 = 10;

/// Pipeline configuration, stored as a JSON object on disk:
/// ```json
/// {
///   "sources": [
///     { "url": "https://docs.google.com/.../gviz/tq?tqx=out:csv", "class_label": "CSD-A" }
///   ],
///   "refresh_interval_secs": 10,
///   "status_matching": "legacy"
/// }
/// ```
/// Omitted keys take their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub sources: Vec<SourceConfig>,
    pub refresh_interval_secs: u64,
    pub status_matching: StatusMatching,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            sources: vec![
                SourceConfig::new(
                    "https://docs.google.com/spreadsheets/d/1omNXBjDrGLcgXaYOsAmNzx66afgKieqyeDks2h5XV3A/gviz/tq?tqx=out:csv",
                    "CSD-A",
                ),
                SourceConfig::new(
                    "https://docs.google.com/spreadsheets/d/1PNLmx98YVI4oJ9gBM_oagJatA4on8f4T_4bAJSxzy8E/gviz/tq?tqx=out:csv",
                    "CSD-B",
                ),
            ],
            refresh_interval_secs: DEFAULT_REFRESH_INTERVAL_SECS,
            status_matching: StatusMatching::default(),
        }
    }
}

impl PipelineConfig {
    /// Loads the config from a JSON file at `path`.
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file '{path}'"))?;
        Self::from_json(&content).with_context(|| format!("invalid config file '{path}'"))
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let config: PipelineConfig = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.refresh_interval_secs == 0 {
            bail!("refresh_interval_secs must be greater than zero");
        }
        if self.sources.is_empty() {
            bail!("at least one source must be configured");
        }
        Ok(())
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }
}
