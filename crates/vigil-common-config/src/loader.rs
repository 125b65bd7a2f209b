//! Configuration file loading and parsing.

use crate::env::{vars, Environment};
use crate::types::AuditConfig;
use regex::Regex;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;

const CONFIG_DIR: &str = ".vigil";
const CONFIG_FILE: &str = "audit.yaml";

/// Config loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    NotFound { path: PathBuf },

    #[error("failed to read config: {source}")]
    ReadError {
        #[from]
        source: std::io::Error,
    },

    #[error("invalid YAML at line {}: {message}", line.map(|l| l.to_string()).unwrap_or_else(|| "unknown".to_string()))]
    ParseError { line: Option<usize>, message: String },

    #[error("validation error: {message}")]
    ValidationError { message: String },

    #[error("environment variable not found: {var}")]
    EnvVarNotFound { var: String },
}

/// Configuration loader.
pub struct ConfigLoader {
    base_path: PathBuf,
}

impl ConfigLoader {
    /// Create a loader for the given project directory.
    pub fn new(project_dir: impl AsRef<Path>) -> Self {
        Self {
            base_path: project_dir.as_ref().to_path_buf(),
        }
    }

    /// Create a loader for `$VIGIL_CONFIG_DIR`, or the current directory.
    pub fn from_env() -> Self {
        match Environment::get(vars::VIGIL_CONFIG_DIR) {
            Some(dir) => Self::new(dir),
            None => Self::default(),
        }
    }

    /// Path of the configuration file.
    pub fn config_path(&self) -> PathBuf {
        self.base_path.join(CONFIG_DIR).join(CONFIG_FILE)
    }

    /// Load configuration from `.vigil/audit.yaml`.
    ///
    /// Returns defaults when the file does not exist. `VIGIL_AUDIT_ENABLED`
    /// overrides the `enabled` switch from the file.
    pub fn load(&self) -> Result<AuditConfig, ConfigError> {
        let config_path = self.config_path();

        let mut config = if config_path.exists() {
            let contents = std::fs::read_to_string(&config_path)?;
            self.parse(&contents)?
        } else {
            AuditConfig::default()
        };

        let enabled = Environment::get_bool(vars::VIGIL_AUDIT_ENABLED).map_err(|e| {
            ConfigError::ValidationError {
                message: e.to_string(),
            }
        })?;
        if let Some(enabled) = enabled {
            config.enabled = enabled;
        }

        Ok(config)
    }

    /// Load configuration, failing if the file does not exist.
    pub fn load_required(&self) -> Result<AuditConfig, ConfigError> {
        let config_path = self.config_path();
        if !config_path.exists() {
            return Err(ConfigError::NotFound { path: config_path });
        }
        self.load()
    }

    /// Parse and validate configuration text.
    pub fn parse(&self, contents: &str) -> Result<AuditConfig, ConfigError> {
        let expanded = self.expand_env_vars(contents)?;

        let config: AuditConfig =
            serde_yaml::from_str(&expanded).map_err(|e| ConfigError::ParseError {
                line: e.location().map(|l| l.line()),
                message: e.to_string(),
            })?;

        self.validate(&config)?;
        Ok(config)
    }

    /// Expand environment variables in the form `${VAR}` or `${VAR:-default}`.
    fn expand_env_vars(&self, content: &str) -> Result<String, ConfigError> {
        let re = Regex::new(r"\$\{([^}:]+)(?::-([^}]*))?\}").map_err(|e| {
            ConfigError::ParseError {
                line: None,
                message: e.to_string(),
            }
        })?;

        let mut result = content.to_string();
        for cap in re.captures_iter(content) {
            let var_name = &cap[1];
            let default = cap.get(2).map(|m| m.as_str());

            let value = match (std::env::var(var_name), default) {
                (Ok(v), _) => v,
                (Err(_), Some(d)) => d.to_string(),
                (Err(_), None) => {
                    return Err(ConfigError::EnvVarNotFound {
                        var: var_name.to_string(),
                    })
                }
            };

            result = result.replace(&cap[0], &value);
        }

        Ok(result)
    }

    /// Validate configuration values.
    fn validate(&self, config: &AuditConfig) -> Result<(), ConfigError> {
        let mut seen = HashSet::new();

        for registration in &config.methods {
            if registration.declaration.strategy.trim().is_empty() {
                return Err(ConfigError::ValidationError {
                    message: format!("method {} has an empty strategy", registration.method),
                });
            }
            if !seen.insert(&registration.method) {
                return Err(ConfigError::ValidationError {
                    message: format!("method {} is registered twice", registration.method),
                });
            }
        }

        if config.strategies.keys().any(|name| name.trim().is_empty()) {
            return Err(ConfigError::ValidationError {
                message: "strategies contains an empty strategy name".to_string(),
            });
        }

        Ok(())
    }

    /// Save configuration to file.
    pub fn save(&self, config: &AuditConfig) -> Result<(), ConfigError> {
        let config_dir = self.base_path.join(CONFIG_DIR);
        std::fs::create_dir_all(&config_dir)?;

        let yaml = serde_yaml::to_string(config).map_err(|e| ConfigError::ParseError {
            line: None,
            message: e.to_string(),
        })?;

        std::fs::write(config_dir.join(CONFIG_FILE), yaml)?;
        Ok(())
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new(std::env::current_dir().unwrap_or_default())
    }
}
