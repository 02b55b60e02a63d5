//! Configuration loading from the process environment.

use std::collections::HashMap;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::RuntimeConfig;
use crate::config::validation::{validate_env, FieldError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read env file: {0}")]
    EnvFile(#[from] dotenvy::Error),

    #[error("invalid environment variables: {}", join(.0))]
    Invalid(Vec<FieldError>),
}

fn join(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

impl ConfigError {
    /// Offending fields, empty for I/O failures.
    pub fn fields(&self) -> &[FieldError] {
        match self {
            ConfigError::Invalid(errors) => errors,
            ConfigError::EnvFile(_) => &[],
        }
    }
}

/// Populate the process environment from an env file, then snapshot it.
///
/// An explicit `env_file` must exist; the implicit `.env` is optional.
/// Variables already set in the process take precedence over the file.
pub fn read_env(env_file: Option<&Path>) -> Result<HashMap<String, String>, ConfigError> {
    match env_file {
        Some(path) => {
            dotenvy::from_path(path)?;
        }
        None => match dotenvy::dotenv() {
            Ok(path) => tracing::debug!(path = %path.display(), "Loaded .env"),
            Err(e) if e.not_found() => {}
            Err(e) => return Err(e.into()),
        },
    }
    Ok(std::env::vars().collect())
}

/// Load and validate configuration from the environment.
pub fn load_config(env_file: Option<&Path>) -> Result<RuntimeConfig, ConfigError> {
    let vars = read_env(env_file)?;
    RuntimeConfig::from_env(&vars)
}

impl RuntimeConfig {
    /// Validate an explicit key/value map.
    pub fn from_env(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        validate_env(vars).map_err(ConfigError::Invalid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_error_lists_fields() {
        let err = RuntimeConfig::from_env(&HashMap::new()).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("APP_ENV: is required"));
        assert!(message.contains("SESSION_SECRET: is required"));
        assert_eq!(err.fields().len(), 2);
    }

    #[test]
    fn explicit_env_file_must_exist() {
        let err = read_env(Some(Path::new("/nonexistent/document-server.env"))).unwrap_err();
        assert!(matches!(err, ConfigError::EnvFile(_)));
    }
}
