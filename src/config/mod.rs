//! Configuration types for the wrangling pipeline.

use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::grid::{Axis, Window};

/// Errors raised while reading or writing a configuration file.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to access config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid YAML config: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Diagnostic output handed to each component when it is built.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Log a preview of every partition and loaded section at debug level
    #[serde(default)]
    pub debug_previews: bool,

    /// Number of rows shown in each preview
    #[serde(default = "default_preview_rows")]
    pub preview_rows: usize,
}

fn default_preview_rows() -> usize {
    10
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            debug_previews: false,
            preview_rows: default_preview_rows(),
        }
    }
}

/// Configuration for combination extraction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractConfig {
    /// Separator used when joining combination values into labels
    #[serde(default = "default_separator")]
    pub separator: String,
}

fn default_separator() -> String {
    "_".to_string()
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            separator: default_separator(),
        }
    }
}

/// Configuration for TFC window averaging.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EegConfig {
    /// Names given to the sections of a TFC file, in file order
    #[serde(default = "default_sources")]
    pub sources: Vec<String>,

    /// Coordinate axis of grid rows (frequency)
    #[serde(default = "default_row_axis")]
    pub row_axis: Axis,

    /// Coordinate axis of grid columns (time)
    #[serde(default = "default_col_axis")]
    pub col_axis: Axis,

    /// Averaging window in axis coordinates
    #[serde(default = "default_window")]
    pub window: Window,

    /// Condition names matched case-insensitively against file names
    #[serde(default = "default_conditions")]
    pub conditions: Vec<String>,
}

fn default_sources() -> Vec<String> {
    vec!["e0".to_string(), "e1".to_string(), "e2".to_string()]
}

fn default_row_axis() -> Axis {
    Axis::new(50.0, 4.0, -2.0)
}

fn default_col_axis() -> Axis {
    Axis::new(-400.0, 200.0, 25.0)
}

fn default_window() -> Window {
    Window::new(18.0, 12.0, -100.0, 0.0)
}

fn default_conditions() -> Vec<String> {
    ["Anode", "Cathode", "Sham", "Visual"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl Default for EegConfig {
    fn default() -> Self {
        Self {
            sources: default_sources(),
            row_axis: default_row_axis(),
            col_axis: default_col_axis(),
            window: default_window(),
            conditions: default_conditions(),
        }
    }
}

/// Configuration for reaction-time aggregation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregateConfig {
    /// Candidate names of the value column, tried in order
    #[serde(default = "default_value_aliases")]
    pub value_aliases: Vec<String>,

    /// Threshold for the percent-at-or-below statistic
    #[serde(default)]
    pub fast_threshold: Option<f64>,

    /// Number of contiguous blocks to average per partition
    #[serde(default)]
    pub block_count: Option<usize>,

    /// Required length of every block, if any
    #[serde(default)]
    pub expected_block_len: Option<usize>,
}

fn default_value_aliases() -> Vec<String> {
    vec!["LOG_RT".to_string(), "Normalized_Log_RT".to_string()]
}

impl Default for AggregateConfig {
    fn default() -> Self {
        Self {
            value_aliases: default_value_aliases(),
            fast_threshold: None,
            block_count: None,
            expected_block_len: None,
        }
    }
}

/// Configuration for long-to-short-fat conversion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PivotConfig {
    /// Column identifying one output row
    #[serde(default = "default_index_column")]
    pub index_column: String,

    /// Columns whose values form the output column labels, in label order
    #[serde(default = "default_label_columns")]
    pub label_columns: Vec<String>,

    /// Order in which output columns are nested, outermost first. Must name
    /// the same columns as `label_columns`; empty means label order.
    #[serde(default = "default_nest_columns")]
    pub nest_columns: Vec<String>,

    /// Column holding the values to spread
    #[serde(default = "default_value_column")]
    pub value_column: String,

    /// Per-entity column copied next to the index (e.g. `Group`)
    #[serde(default)]
    pub carry_column: Option<String>,

    /// Explicit value order for label columns; others use first occurrence
    #[serde(default = "default_value_orders")]
    pub value_orders: IndexMap<String, Vec<String>>,

    /// Names substituted for coded values, by first-occurrence position
    #[serde(default = "default_recodes")]
    pub recodes: IndexMap<String, Vec<String>>,
}

fn default_index_column() -> String {
    "Subject".to_string()
}

fn default_label_columns() -> Vec<String> {
    vec!["Condition".to_string(), "Connection".to_string()]
}

fn default_nest_columns() -> Vec<String> {
    vec!["Connection".to_string(), "Condition".to_string()]
}

fn default_value_column() -> String {
    "Coherence".to_string()
}

fn condition_names() -> Vec<String> {
    ["Sham", "Anode", "Cathode", "Visual", "Sham Baseline"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_value_orders() -> IndexMap<String, Vec<String>> {
    let mut orders = IndexMap::new();
    orders.insert("Condition".to_string(), condition_names());
    orders
}

fn default_recodes() -> IndexMap<String, Vec<String>> {
    let mut recodes = IndexMap::new();
    recodes.insert(
        "Connection".to_string(),
        ["SMA-Motor", "SMA-Visual", "Motor-Visual"]
            .iter()
            .map(|s| s.to_string())
            .collect(),
    );
    recodes.insert("Condition".to_string(), condition_names());
    recodes
}

impl Default for PivotConfig {
    fn default() -> Self {
        Self {
            index_column: default_index_column(),
            label_columns: default_label_columns(),
            nest_columns: default_nest_columns(),
            value_column: default_value_column(),
            carry_column: None,
            value_orders: default_value_orders(),
            recodes: default_recodes(),
        }
    }
}

/// Main configuration combining all sub-configs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WranglerConfig {
    #[serde(default)]
    pub extract: ExtractConfig,

    #[serde(default)]
    pub eeg: EegConfig,

    #[serde(default)]
    pub aggregate: AggregateConfig,

    #[serde(default)]
    pub pivot: PivotConfig,

    #[serde(default)]
    pub log: LogConfig,
}

impl WranglerConfig {
    /// Load configuration from a YAML file.
    pub fn from_yaml<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: WranglerConfig = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a YAML file.
    pub fn to_yaml<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
