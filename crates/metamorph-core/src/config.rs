//! Engine configuration
use serde::{Deserialize, Serialize};
use std::env::VarError;
use std::path::Path;
use thiserror::Error;

pub const MAX_STEPS_ENV: &str = "METAMORPH_MAX_STEPS";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("CONFIG/PARSE: {0}")]
    Parse(String),

    #[error("CONFIG/IO: {path}: {message}")]
    Io { path: String, message: String },

    #[error("CONFIG/ENV: {name}={value} is not a step count")]
    Env { name: String, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Extra guard on run length; graphs are acyclic, so `None` still terminates
    pub max_steps: Option<usize>,
    /// Emit one tracing event per step when a run finishes
    pub trace_steps: bool,
    /// Record blake3 digests of each step's input and output snapshots
    pub hash_snapshots: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_steps: None,
            trace_steps: true,
            hash_snapshots: true,
        }
    }
}

impl EngineConfig {
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(yaml).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Self::from_yaml(&yaml)
    }

    pub fn with_max_steps(mut self, limit: usize) -> Self {
        self.max_steps = Some(limit);
        self
    }

    /// Apply `METAMORPH_MAX_STEPS` if set
    pub fn with_env_overrides(self) -> Result<Self, ConfigError> {
        self.with_max_steps_var(std::env::var(MAX_STEPS_ENV))
    }

    fn with_max_steps_var(self, var: Result<String, VarError>) -> Result<Self, ConfigError> {
        match var {
            Ok(value) => self.with_max_steps_override(&value),
            Err(VarError::NotPresent) => Ok(self),
            Err(VarError::NotUnicode(raw)) => Err(ConfigError::Env {
                name: MAX_STEPS_ENV.to_string(),
                value: raw.to_string_lossy().into_owned(),
            }),
        }
    }

    fn with_max_steps_override(mut self, value: &str) -> Result<Self, ConfigError> {
        let value = value.trim();
        if value.is_empty() || value.eq_ignore_ascii_case("unbounded") {
            self.max_steps = None;
            return Ok(self);
        }
        let limit = value.parse::<usize>().map_err(|_| ConfigError::Env {
            name: MAX_STEPS_ENV.to_string(),
            value: value.to_string(),
        })?;
        self.max_steps = Some(limit);
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.max_steps, None);
        assert!(config.trace_steps);
        assert!(config.hash_snapshots);
    }

    #[test]
    fn test_from_yaml_partial() {
        let config = EngineConfig::from_yaml("max_steps: 8\nhash_snapshots: false\n").unwrap();
        assert_eq!(config.max_steps, Some(8));
        assert!(config.trace_steps);
        assert!(!config.hash_snapshots);
    }

    #[test]
    fn test_from_yaml_invalid() {
        let err = EngineConfig::from_yaml("max_steps: many").unwrap_err();
        assert!(err.to_string().starts_with("CONFIG/PARSE:"));
    }

    #[test]
    fn test_max_steps_override() {
        let config = EngineConfig::default().with_max_steps_override("12").unwrap();
        assert_eq!(config.max_steps, Some(12));

        let config = config.with_max_steps_override("unbounded").unwrap();
        assert_eq!(config.max_steps, None);

        assert!(matches!(
            EngineConfig::default().with_max_steps_override("-1"),
            Err(ConfigError::Env { .. })
        ));
    }

    #[test]
    fn test_max_steps_var() {
        let config = EngineConfig::default().with_max_steps(3);
        assert_eq!(config.clone().with_max_steps_var(Err(VarError::NotPresent)).unwrap(), config);
        assert_eq!(
            config.clone().with_max_steps_var(Ok("5".into())).unwrap().max_steps,
            Some(5)
        );

        let err = config
            .with_max_steps_var(Err(VarError::NotUnicode(std::ffi::OsString::from("4"))))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Env { ref value, .. } if value == "4"));
        assert!(err.to_string().starts_with("CONFIG/ENV: METAMORPH_MAX_STEPS="));
    }

    #[test]
    fn test_load_missing_file() {
        let err = EngineConfig::load("/nonexistent/metamorph.yaml").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
