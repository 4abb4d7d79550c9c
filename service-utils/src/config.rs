//! Configuration loading from JSON files and the environment.

use std::any::Any;
use std::env;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::str::FromStr;

use serde::Deserialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::error;

use crate::validation::{ValidationErrors, Validator};

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// File could not be opened
    #[error("Err while opening config file {path}: {source}")]
    Io {
        /// Path that was opened
        path: String,
        /// Underlying IO error
        #[source]
        source: std::io::Error,
    },

    /// File is not valid JSON for the target type
    #[error("Err while decoding config file: {0}")]
    Parse(#[from] serde_json::Error),

    /// Decoded value failed validation
    #[error("Err while validating config file: {0}")]
    Validation(#[from] ValidationErrors),

    /// Environment variable parse error
    #[error("Failed to parse environment variable {name}: {reason}")]
    ParseEnv {
        /// Variable name
        name: String,
        /// Parse failure
        reason: String,
    },
}

/// Load a JSON configuration file into `T` and validate it.
///
/// # Errors
///
/// Returns [`ConfigError`] when the file cannot be opened, decoded or fails
/// the rule registered in `validator` for `T`.
pub fn load_config<T>(path: impl AsRef<Path>, validator: &Validator) -> Result<T, ConfigError>
where
    T: DeserializeOwned + Any,
{
    let path = path.as_ref();
    let file = File::open(path).map_err(|source| {
        error!(path = %path.display(), error = %source, "Err while opening config file");
        ConfigError::Io {
            path: path.display().to_string(),
            source,
        }
    })?;

    let config: T = serde_json::from_reader(BufReader::new(file)).inspect_err(|err| {
        error!(path = %path.display(), error = %err, "Err while decoding config file");
    })?;

    validator.validate(&config).inspect_err(|err| {
        error!(path = %path.display(), error = %err, "Err while validating config file");
    })?;
    Ok(config)
}

/// Load a `.env` file from the working directory if there is one.
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

/// Parse an environment variable with a default value.
///
/// # Errors
///
/// Returns [`ConfigError::ParseEnv`] when the variable is set but does not
/// parse.
pub fn parse_env<T: FromStr>(name: &str, default: T) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(val) => val.parse().map_err(|e: T::Err| ConfigError::ParseEnv {
            name: name.to_string(),
            reason: e.to_string(),
        }),
        Err(_) => Ok(default),
    }
}

/// Read an environment variable, falling back to `default`.
#[must_use]
pub fn env_or(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

/// Read a comma-separated environment variable.
#[must_use]
pub fn parse_list_env(name: &str) -> Vec<String> {
    env::var(name)
        .map(|v| {
            v.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Connection pool sizing for relational databases.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DbConnectionPoolConfig {
    /// Maximum open connections, 0 for no limit
    pub max_open_connections: u32,
    /// Maximum idle connections, 0 for the driver default
    pub max_idle_connections: u32,
    /// Maximum connection lifetime in minutes, 0 for no limit
    pub max_connection_lifetime_in_minutes: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::require_non_empty;
    use std::io::Write;

    #[derive(Debug, Deserialize)]
    struct ServiceConfig {
        name: String,
        port: u16,
    }

    fn validator() -> Validator {
        Validator::new().with_rule::<ServiceConfig, _>(|config| {
            let mut errors = ValidationErrors::new();
            require_non_empty(&mut errors, "name", &config.name);
            errors.into_result()
        })
    }

    fn write_temp(name: &str, content: &str) -> std::path::PathBuf {
        let path = env::temp_dir().join(format!("service-utils-{}-{name}", std::process::id()));
        let mut file = File::create(&path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_load_valid_config() {
        let path = write_temp("valid.json", r#"{"name":"svc","port":8080}"#);
        let config: ServiceConfig = load_config(&path, &validator()).unwrap();
        assert_eq!(config.name, "svc");
        assert_eq!(config.port, 8080);
    }

    #[test]
    fn test_load_errors() {
        let missing = load_config::<ServiceConfig>("/no/such/config.json", &validator());
        assert!(matches!(missing, Err(ConfigError::Io { .. })));

        let path = write_temp("broken.json", "{");
        assert!(matches!(
            load_config::<ServiceConfig>(&path, &validator()),
            Err(ConfigError::Parse(_))
        ));

        let path = write_temp("invalid.json", r#"{"name":"","port":1}"#);
        assert!(matches!(
            load_config::<ServiceConfig>(&path, &validator()),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn test_parse_env_default_when_unset() {
        let port: u16 = parse_env("SERVICE_UTILS_TEST_UNSET_PORT", 9000).unwrap();
        assert_eq!(port, 9000);
        assert_eq!(env_or("SERVICE_UTILS_TEST_UNSET_HOST", "localhost"), "localhost");
        assert!(parse_list_env("SERVICE_UTILS_TEST_UNSET_LIST").is_empty());
    }

    #[test]
    fn test_pool_config_field_names() {
        let config: DbConnectionPoolConfig =
            serde_json::from_str(r#"{"maxOpenConnections":10,"maxConnectionLifetimeInMinutes":5}"#)
                .unwrap();
        assert_eq!(config.max_open_connections, 10);
        assert_eq!(config.max_idle_connections, 0);
        assert_eq!(config.max_connection_lifetime_in_minutes, 5);
    }
}
