//! Engine configuration.
//!
//! Every field has a default, so an empty JSON object (or no file at all) is a
//! valid configuration. The CLI layers `--url`/`--base-path` on top.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::model::StatFields;
use crate::sampler::Category;

/// Default device address.
pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8043";

/// Where a chart takes its samples from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChartSource {
    /// Stat fields of the running effect, sampled on every applied snapshot.
    Snapshot,
    /// Device resource counters, sampled on every statistics poll.
    Statistics,
}

/// One rolling chart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChartSpec {
    pub name: String,
    pub category: Category,
    pub source: ChartSource,
    /// Fields to chart; empty means every field the source reports.
    pub fields: Vec<String>,
    /// Fields never charted, applied after `fields`.
    pub ignored: Vec<String>,
    /// Field drawn last with its own color.
    pub idle_field: Option<String>,
    pub max_samples: usize,
}

impl Default for ChartSpec {
    fn default() -> Self {
        Self {
            name: "chart".to_string(),
            category: Category::Other,
            source: ChartSource::Statistics,
            fields: Vec::new(),
            ignored: Vec::new(),
            idle_field: None,
            max_samples: 60,
        }
    }
}

impl ChartSpec {
    /// Restrict `fields` to this chart's allow-list.
    pub fn select(&self, fields: &StatFields) -> StatFields {
        fields.only(&self.fields)
    }
}

fn default_charts() -> Vec<ChartSpec> {
    vec![
        ChartSpec {
            name: "CPU".to_string(),
            category: Category::Cpu,
            fields: vec!["CPU_USED_CORE0".to_string(), "CPU_USED_CORE1".to_string()],
            ..ChartSpec::default()
        },
        ChartSpec {
            name: "Memory".to_string(),
            category: Category::Memory,
            fields: vec![
                "HEAP_MIN".to_string(),
                "DMA_FREE".to_string(),
                "HEAP_FREE".to_string(),
            ],
            idle_field: Some("HEAP_FREE".to_string()),
            ..ChartSpec::default()
        },
        ChartSpec {
            name: "Effect".to_string(),
            category: Category::Other,
            source: ChartSource::Snapshot,
            ..ChartSpec::default()
        },
    ]
}

/// Tunables for the polling coordinator, countdown and samplers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Scheme, host and port of the device.
    pub base_url: String,
    /// Prefix prepended to every request path.
    pub base_path: String,
    pub request_timeout_ms: u64,
    /// Liveness backstop for a fetch that never settles.
    pub safety_timeout_ms: u64,
    /// Window in which refresh intents collapse into one fetch.
    pub refresh_debounce_ms: u64,
    pub countdown_tick_ms: u64,
    /// Remaining time at which the countdown asks for a refresh.
    pub countdown_threshold_ms: u64,
    /// 0 disables statistics polling.
    pub statistics_interval_ms: u64,
    pub charts: Vec<ChartSpec>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            base_path: String::new(),
            request_timeout_ms: 5_000,
            safety_timeout_ms: 3_000,
            refresh_debounce_ms: 50,
            countdown_tick_ms: 50,
            countdown_threshold_ms: 100,
            statistics_interval_ms: 2_000,
            charts: default_charts(),
        }
    }
}

impl EngineConfig {
    /// Read and validate a JSON config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.countdown_tick_ms == 0 {
            return Err(ConfigError::Invalid(
                "countdown_tick_ms must be positive".into(),
            ));
        }
        if self.safety_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "safety_timeout_ms must be positive".into(),
            ));
        }
        for (i, chart) in self.charts.iter().enumerate() {
            if chart.max_samples == 0 {
                return Err(ConfigError::Invalid(format!(
                    "chart '{}' must keep at least one sample",
                    chart.name
                )));
            }
            if self.charts[..i].iter().any(|c| c.name == chart.name) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate chart name '{}'",
                    chart.name
                )));
            }
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn safety_timeout(&self) -> Duration {
        Duration::from_millis(self.safety_timeout_ms)
    }

    pub fn refresh_debounce(&self) -> Duration {
        Duration::from_millis(self.refresh_debounce_ms)
    }

    pub fn countdown_tick(&self) -> Duration {
        Duration::from_millis(self.countdown_tick_ms)
    }

    pub fn statistics_interval(&self) -> Option<Duration> {
        (self.statistics_interval_ms > 0).then(|| Duration::from_millis(self.statistics_interval_ms))
    }

    pub fn polls_statistics(&self) -> bool {
        self.statistics_interval().is_some()
            && self
                .charts
                .iter()
                .any(|c| c.source == ChartSource::Statistics)
    }
}
