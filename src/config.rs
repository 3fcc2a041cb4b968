use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid config file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("max_write_attempts must be at least 1")]
    NoWriteAttempts,
}

/// Tunables for the scheduling and enrollment engines.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// How many times a compare-and-swap write is retried before giving up.
    pub max_write_attempts: u32,
    /// Give the voucher credit back when a voucher-paid enrollment is cancelled.
    pub refund_voucher_on_unenroll: bool,
    /// Remove a deleted class from its teacher's class list.
    pub detach_deleted_class_from_teacher: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_write_attempts: 8,
            refund_voucher_on_unenroll: false,
            detach_deleted_class_from_teacher: true,
        }
    }
}

impl EngineConfig {
    pub fn from_toml(source: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let source = std::fs::read_to_string(path)?;
        Self::from_toml(&source)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_write_attempts == 0 {
            return Err(ConfigError::NoWriteAttempts);
        }
        Ok(())
    }
}
