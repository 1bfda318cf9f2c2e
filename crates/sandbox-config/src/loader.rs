use std::env;
use std::path::Path;

use sandbox_error::RuntimeError;

use crate::model::{Config, Environment, ExecutionMode};

impl Config {
    /// Parse a TOML document from a string. Does not apply env overrides —
    /// callers that want those should use [`Config::load`].
    pub fn from_str(content: &str) -> Result<Self, RuntimeError> {
        toml::from_str(content).map_err(|e| RuntimeError::validation(format!("invalid config: {e}")))
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, RuntimeError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| RuntimeError::internal(format!("could not read config {}: {e}", path.display())))?;
        Self::from_str(&content)
    }

    /// Load from `SANDBOX_CONFIG` (path to a TOML file) if set, falling
    /// back to `./sandbox.toml`, then to built-in defaults. After parsing,
    /// applies the env-var override pass and validates production
    /// constraints.
    pub fn load() -> Result<Self, RuntimeError> {
        let mut config = if let Ok(path) = env::var("SANDBOX_CONFIG") {
            Self::from_file(path)?
        } else if Path::new("./sandbox.toml").exists() {
            Self::from_file("./sandbox.toml")?
        } else {
            Config::default()
        };
        apply_env_overrides(&mut config);
        config.validate()?;
        Ok(config)
    }

    /// Refuses configurations that would be unsafe in production: a
    /// `Permissive` execution mode or auth provider in `Environment::Production`.
    pub fn validate(&self) -> Result<(), RuntimeError> {
        if self.environment == Environment::Production {
            if self.execution_mode == ExecutionMode::Permissive {
                return Err(RuntimeError::validation(
                    "execution_mode = permissive is not allowed in production",
                ));
            }
            if matches!(self.authentication, crate::model::AuthenticationConfig::Permissive) {
                return Err(RuntimeError::validation(
                    "authentication provider = permissive is not allowed in production",
                ));
            }
        }
        if self.resource_limits.max_rows == 0 {
            return Err(RuntimeError::validation("resource_limits.max_rows must be > 0"));
        }
        Ok(())
    }
}

/// Environment-variable overrides, applied after TOML parsing. Mirrors the
/// teacher's hand-rolled loader rather than pulling in a config-merging
/// crate: only a small, explicit set of high-value overrides is supported
/// (deployment environment and server bind host/port), since the rest of
/// the document is naturally expressed in the TOML file itself.
fn apply_env_overrides(config: &mut Config) {
    if let Ok(val) = env::var("SANDBOX_ENVIRONMENT") {
        config.environment = match val.to_lowercase().as_str() {
            "production" => Environment::Production,
            "staging" => Environment::Staging,
            _ => Environment::Development,
        };
    }
    if let Ok(val) = env::var("SANDBOX_BIND_HOST") {
        config.server.bind_host = val;
    }
    if let Ok(val) = env::var("SANDBOX_HTTP_PORT") {
        if let Ok(port) = val.parse() {
            config.server.http_port = port;
        } else {
            tracing::warn!(value = %val, "ignoring malformed SANDBOX_HTTP_PORT");
        }
    }
    if let Ok(val) = env::var("SANDBOX_PLATFORM_TOKEN") {
        config.platform.token = Some(val);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_parse_and_validate() {
        let config = Config::default();
        config.validate().unwrap();
    }

    #[test]
    fn production_rejects_permissive_execution_mode() {
        let mut config = Config::default();
        config.environment = Environment::Production;
        config.execution_mode = ExecutionMode::Permissive;
        assert!(config.validate().is_err());
    }

    #[test]
    fn minimal_toml_parses_with_defaults() {
        let config = Config::from_str("environment = \"staging\"\n").unwrap();
        assert_eq!(config.environment, Environment::Staging);
        assert_eq!(config.resource_limits.max_rows, 10_000);
    }

    #[test]
    fn malformed_toml_is_a_validation_error() {
        let err = Config::from_str("not valid toml {{{").unwrap_err();
        assert_eq!(err.error_code(), "validation");
    }
}
