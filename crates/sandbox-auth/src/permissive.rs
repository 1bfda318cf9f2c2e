use async_trait::async_trait;
use sandbox_error::RuntimeError;
use std::sync::Once;

use crate::{principal::Principal, verifier::AuthVerifier};

static WARN_ONCE: Once = Once::new();

/// Unconditionally returns a development principal. Logs a prominent
/// warning the first time it is constructed (§4.1: "logs a prominent
/// warning each startup"); [`sandbox_config::Config::validate`] refuses
/// this provider outright in `Environment::Production`.
#[derive(Debug, Default)]
pub struct PermissiveVerifier;

impl PermissiveVerifier {
    #[must_use]
    pub fn new() -> Self {
        WARN_ONCE.call_once(|| {
            tracing::warn!(
                target: "security",
                "AUTHENTICATION IS PERMISSIVE: every credential is accepted as a development principal. \
                 This must never run against a production deployment."
            );
        });
        Self
    }
}

#[async_trait]
impl AuthVerifier for PermissiveVerifier {
    async fn verify(&self, _credential: &str) -> Result<Principal, RuntimeError> {
        Ok(Principal::development())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn any_credential_resolves_to_development_principal() {
        let verifier = PermissiveVerifier::new();
        let principal = verifier.verify("literally anything").await.unwrap();
        assert!(principal.authenticated);
        assert_eq!(principal.credential_label, "permissive-dev-mode");
    }
}
