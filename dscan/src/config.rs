//! Recognized configuration options for a scan run.

use std::fs;
use std::path::Path;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use dscore::algorithm::filter::TraceParams;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Options recognized by the scan pipeline.
///
/// Field names follow the configuration file convention: `eventWidth`,
/// `riseSamples`, `gapSamples`, `filterWindow`, `maxCorrelationTime`,
/// `minImplantSpacing`, `gridExtent`. Time-valued options share the
/// hardware timestamp unit. Unknown keys in the file are rejected.
///
/// # Example
///
/// ```rust
/// use dscan::config::ScanConfig;
///
/// let config: ScanConfig = serde_json::from_str(
///     r#"{
///         "eventWidth": 6,
///         "riseSamples": 4,
///         "gapSamples": 2,
///         "filterWindow": 6,
///         "maxCorrelationTime": 200,
///         "minImplantSpacing": 50,
///         "gridExtent": [40, 40]
///     }"#,
/// )
/// .unwrap();
/// assert_eq!(config.event_width, 6);
/// config.validate().unwrap();
/// ```
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ScanConfig {
    pub event_width: u64,
    pub rise_samples: usize,
    pub gap_samples: usize,
    pub filter_window: usize,
    pub max_correlation_time: u64,
    pub min_implant_spacing: u64,
    pub grid_extent: (usize, usize),
    #[serde(default)]
    pub trace_analysis: TraceParams,
}

impl Default for ScanConfig {
    fn default() -> Self {
        ScanConfig {
            event_width: 100,
            rise_samples: 4,
            gap_samples: 2,
            filter_window: 6,
            max_correlation_time: 2_000_000,
            min_implant_spacing: 100_000,
            grid_extent: (40, 40),
            trace_analysis: TraceParams::default(),
        }
    }
}

impl ScanConfig {
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)?;
        let config: ScanConfig = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.rise_samples == 0 || self.gap_samples == 0 {
            return Err(ConfigError::Invalid(format!(
                "filter geometry must be positive: riseSamples {}, gapSamples {}",
                self.rise_samples, self.gap_samples
            )));
        }
        if self.filter_window != self.rise_samples + self.gap_samples {
            return Err(ConfigError::Invalid(format!(
                "filterWindow {} must equal riseSamples + gapSamples = {}",
                self.filter_window,
                self.rise_samples + self.gap_samples
            )));
        }
        if self.grid_extent.0 == 0 || self.grid_extent.1 == 0 {
            return Err(ConfigError::Invalid(format!(
                "gridExtent ({}, {}) must be positive on both axes",
                self.grid_extent.0, self.grid_extent.1
            )));
        }
        Ok(())
    }
}
