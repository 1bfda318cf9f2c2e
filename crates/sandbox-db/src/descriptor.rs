use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

pub use sandbox_config::{SslMode, VendorTag};

/// Wraps a secret value so it can never accidentally be logged or
/// serialized back to a caller. `Debug` and `Serialize` both render a
/// fixed placeholder; the real value is reachable only through
/// [`Secret::expose`].
#[derive(Clone)]
pub struct Secret(String);

impl Secret {
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(\"***redacted***\")")
    }
}

impl Serialize for Secret {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str("***redacted***")
    }
}

/// The secret bag on a connection descriptor: password and, for vendors
/// that use key-based auth, a private key. Never logged, never
/// serialized back (§3).
#[derive(Debug, Clone, Default, Serialize)]
pub struct SecretBag {
    pub password: Option<Secret>,
    pub private_key: Option<Secret>,
}

/// Full connection descriptor (§3). The `id` is stable across reloads;
/// the secret bag is mutated only through configuration reload.
#[derive(Debug, Clone, Serialize)]
pub struct ConnectionDescriptor {
    pub id: String,
    pub display_name: String,
    pub vendor: VendorTag,
    pub host: String,
    pub port: u16,
    pub database: String,
    pub schema: Option<String>,
    pub role: Option<String>,
    pub warehouse: Option<String>,
    pub catalog: Option<String>,
    pub username: String,
    pub secrets: SecretBag,
    pub ssl_mode: SslMode,
    pub ssl_ca_path: Option<String>,
    pub connect_timeout: std::time::Duration,
    pub statement_timeout: std::time::Duration,
    pub pool_min: usize,
    pub pool_max: usize,
    pub idle_eviction: std::time::Duration,
}

impl ConnectionDescriptor {
    #[must_use]
    pub fn from_config(config: &sandbox_config::ConnectionDescriptorConfig) -> Self {
        Self {
            id: config.id.clone(),
            display_name: config.display_name.clone(),
            vendor: config.vendor,
            host: config.host.clone(),
            port: config.port,
            database: config.database.clone(),
            schema: config.schema.clone(),
            role: config.role.clone(),
            warehouse: config.warehouse.clone(),
            catalog: config.catalog.clone(),
            username: config.username.clone(),
            secrets: SecretBag { password: config.password.clone().map(Secret::new), private_key: None },
            ssl_mode: config.ssl_mode,
            ssl_ca_path: config.ssl_ca_path.clone(),
            connect_timeout: std::time::Duration::from_millis(config.connect_timeout_ms),
            statement_timeout: std::time::Duration::from_millis(config.statement_timeout_ms),
            pool_min: config.pool_min,
            pool_max: config.pool_max,
            idle_eviction: std::time::Duration::from_secs(config.idle_eviction_seconds),
        }
    }

    /// Builds a descriptor from a caller-supplied `ConnectionDescriptorInput`
    /// for `test-connection` (§6, §8): the descriptor under test is never
    /// registered or pooled, so its `id` is a fixed placeholder and the
    /// pool/timeout tuning takes the same defaults `ConnectionRegistry::create`
    /// assigns.
    #[must_use]
    pub fn from_input(input: ConnectionDescriptorInput) -> Self {
        Self {
            id: "test-connection".to_string(),
            display_name: input.display_name,
            vendor: input.vendor,
            host: input.host,
            port: input.port,
            database: input.database,
            schema: input.schema,
            role: input.role,
            warehouse: input.warehouse,
            catalog: input.catalog,
            username: input.username,
            secrets: SecretBag { password: input.password.map(Secret::new), private_key: None },
            ssl_mode: input.ssl_mode,
            ssl_ca_path: input.ssl_ca_path,
            connect_timeout: std::time::Duration::from_secs(5),
            statement_timeout: std::time::Duration::from_secs(30),
            pool_min: 1,
            pool_max: 10,
            idle_eviction: std::time::Duration::from_secs(300),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConnectionDescriptorInput {
    pub display_name: String,
    pub vendor: VendorTag,
    pub host: String,
    pub port: u16,
    pub database: String,
    pub schema: Option<String>,
    pub role: Option<String>,
    pub warehouse: Option<String>,
    pub catalog: Option<String>,
    pub username: String,
    pub password: Option<String>,
    #[serde(default)]
    pub ssl_mode: SslMode,
    pub ssl_ca_path: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secret_debug_never_prints_the_real_value() {
        let secret = Secret::new("super-secret-password");
        let rendered = format!("{secret:?}");
        assert!(!rendered.contains("super-secret-password"));
    }

    #[test]
    fn secret_serializes_to_a_fixed_placeholder() {
        let secret = Secret::new("super-secret-password");
        let json = serde_json::to_string(&secret).unwrap();
        assert_eq!(json, "\"***redacted***\"");
    }
}
