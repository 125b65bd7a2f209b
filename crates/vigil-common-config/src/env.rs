//! Environment variable handling.

use std::env;
use thiserror::Error;

/// Environment variable errors.
#[derive(Debug, Error)]
pub enum EnvError {
    #[error("required environment variable not set: {var}")]
    NotSet { var: String },

    #[error("invalid value for {var}: {message}")]
    InvalidValue { var: String, message: String },
}

/// Environment variable names.
pub mod vars {
    pub const VIGIL_CONFIG_DIR: &str = "VIGIL_CONFIG_DIR";
    pub const VIGIL_AUDIT_ENABLED: &str = "VIGIL_AUDIT_ENABLED";
    pub const VIGIL_ENV: &str = "VIGIL_ENV";
}

/// Process environment, optionally seeded from `.env` files.
pub struct Environment {
    _guard: (),
}

impl Environment {
    /// Initialize environment from `.env`, `.env.local` and `.env.$VIGIL_ENV`.
    ///
    /// Missing files are fine; later files override earlier ones.
    pub fn init() -> Self {
        let _ = dotenvy::from_filename(".env");
        let _ = dotenvy::from_filename(".env.local");

        if let Ok(mode) = env::var(vars::VIGIL_ENV) {
            let _ = dotenvy::from_filename(format!(".env.{}", mode));
        }

        Self { _guard: () }
    }

    /// Get a required string variable.
    pub fn require(var: &str) -> Result<String, EnvError> {
        env::var(var).map_err(|_| EnvError::NotSet { var: var.to_string() })
    }

    /// Get an optional string variable.
    pub fn get(var: &str) -> Option<String> {
        env::var(var).ok()
    }

    /// Get a boolean variable (`true`/`1`/`yes` or `false`/`0`/`no`).
    pub fn get_bool(var: &str) -> Result<Option<bool>, EnvError> {
        match env::var(var) {
            Err(_) => Ok(None),
            Ok(v) => match v.to_lowercase().as_str() {
                "true" | "1" | "yes" => Ok(Some(true)),
                "false" | "0" | "no" => Ok(Some(false)),
                _ => Err(EnvError::InvalidValue {
                    var: var.to_string(),
                    message: format!("expected a boolean, got `{}`", v),
                }),
            },
        }
    }
}
