use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::propagation::PropagationOptions;

pub const DEFAULT_MAX_ITERATIONS: u32 = 1000;

pub(crate) const DEFAULT_EDGE_WEIGHT: u64 = 1;

pub(crate) const READ_BUFFER_SIZE: usize = 8 * 1024 * 1024;

pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Run configuration, usually read from a YAML file.
///
/// ```yaml
/// propagation:
///   max_iterations: 50
///   tie_break: lowest_label
///   convergence: label_changed
///   update_mode: asynchronous
/// log_level: debug
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LpaConfig {
    pub propagation: PropagationOptions,
    pub log_level: String,
    pub log_file: Option<PathBuf>,
}

impl Default for LpaConfig {
    fn default() -> Self {
        LpaConfig {
            propagation: PropagationOptions::default(),
            log_level: DEFAULT_LOG_LEVEL.to_owned(),
            log_file: None,
        }
    }
}

impl LpaConfig {
    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(text)?)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&text)
    }
}
