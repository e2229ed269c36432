use crate::patches::{MergeMethod, PatchConfig};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Settings for a denoising run, usually read from a TOML file:
///
/// ```toml
/// threads = 8
/// merge = "median"
///
/// [patches]
/// height = 8
/// width = 8
/// color = false
/// shift = 1
/// ```
///
/// Every key is optional.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DenoiseConfig {
    /// Worker count for the reconstruction pass. `None` runs on rayon's global pool.
    pub threads: Option<usize>,
    pub patches: PatchConfig,
    pub merge: MergeMethod,
}

impl Default for DenoiseConfig {
    fn default() -> Self {
        Self {
            threads: None,
            patches: PatchConfig::default(),
            merge: MergeMethod::Median,
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read configuration file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse TOML configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

impl DenoiseConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.threads == Some(0) {
            return Err(ConfigError::Invalid(
                "threads must be at least 1 when given".to_string(),
            ));
        }
        if self.patches.height == 0 || self.patches.width == 0 {
            return Err(ConfigError::Invalid(format!(
                "patch shape must be non-empty, got {}x{}",
                self.patches.height, self.patches.width
            )));
        }
        if self.patches.shift == 0 {
            return Err(ConfigError::Invalid(
                "patch shift must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
