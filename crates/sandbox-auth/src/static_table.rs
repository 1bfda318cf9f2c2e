use std::collections::HashMap;

use async_trait::async_trait;
use sandbox_error::RuntimeError;
use subtle::ConstantTimeEq;

use crate::{principal::Principal, redact::credential_prefix, verifier::AuthVerifier};

/// Constant-time lookup in a configured map of credential strings to
/// principals. The comparison itself is constant-time per credential
/// (`subtle::ConstantTimeEq`); the lookup still walks the whole table so
/// total lookup time does not leak which entry (if any) matched by early
/// exit.
#[derive(Debug)]
pub struct StaticTableVerifier {
    table: HashMap<String, Principal>,
}

impl StaticTableVerifier {
    #[must_use]
    pub fn new(table: HashMap<String, Principal>) -> Self {
        Self { table }
    }
}

#[async_trait]
impl AuthVerifier for StaticTableVerifier {
    async fn verify(&self, credential: &str) -> Result<Principal, RuntimeError> {
        let mut matched: Option<&Principal> = None;
        for (candidate, principal) in &self.table {
            if candidate.as_bytes().ct_eq(credential.as_bytes()).into() {
                matched = Some(principal);
            }
        }
        match matched {
            Some(principal) => Ok(principal.clone()),
            None => {
                tracing::warn!(
                    target: "security",
                    credential_prefix = %credential_prefix(credential),
                    "static table auth rejected unknown credential"
                );
                Err(RuntimeError::AuthFailed { reason: "unknown credential".to_string() })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> HashMap<String, Principal> {
        let mut table = HashMap::new();
        table.insert("good-credential".to_string(), Principal::development());
        table
    }

    #[tokio::test]
    async fn known_credential_resolves_to_principal() {
        let verifier = StaticTableVerifier::new(table());
        let principal = verifier.verify("good-credential").await.unwrap();
        assert!(principal.authenticated);
    }

    #[tokio::test]
    async fn unknown_credential_is_auth_failed_not_panic() {
        let verifier = StaticTableVerifier::new(table());
        let err = verifier.verify("bad-credential").await.unwrap_err();
        assert_eq!(err.error_code(), "auth_failed");
    }
}
