use std::time::Duration;

use async_trait::async_trait;
use sandbox_error::RuntimeError;
use serde::Deserialize;

use crate::{principal::Principal, redact::credential_prefix, verifier::AuthVerifier};

/// POSTs the credential to a configured endpoint. Any transport error,
/// timeout, non-2xx status, or malformed body is treated uniformly as
/// "invalid" — per §4.1, the propagation policy recovers exactly this
/// boundary ("remote-auth transport errors become 'invalid credential'").
#[derive(Debug)]
pub struct RemoteVerifier {
    client: reqwest::Client,
    endpoint: String,
}

#[derive(Debug, Deserialize)]
struct RemoteVerifyResponse {
    valid: bool,
    #[serde(default)]
    workspace_id: Option<String>,
    #[serde(default)]
    workspace_name: Option<String>,
    #[serde(default)]
    user_id: Option<String>,
    #[serde(default)]
    permissions: Vec<crate::principal::Permission>,
}

impl RemoteVerifier {
    #[must_use]
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { client, endpoint: endpoint.into() }
    }
}

#[async_trait]
impl AuthVerifier for RemoteVerifier {
    async fn verify(&self, credential: &str) -> Result<Principal, RuntimeError> {
        let prefix = credential_prefix(credential);
        let response = self
            .client
            .post(&self.endpoint)
            .json(&serde_json::json!({ "credential": credential }))
            .send()
            .await
            .map_err(|e| {
                tracing::warn!(target: "security", credential_prefix = %prefix, error = %e, "remote auth transport error");
                RuntimeError::AuthFailed { reason: "remote verifier unreachable".to_string() }
            })?;

        if !response.status().is_success() {
            tracing::warn!(
                target: "security",
                credential_prefix = %prefix,
                status = response.status().as_u16(),
                "remote auth verifier returned non-2xx"
            );
            return Err(RuntimeError::AuthFailed { reason: "remote verifier rejected credential".to_string() });
        }

        let body: RemoteVerifyResponse = response.json().await.map_err(|e| {
            tracing::warn!(target: "security", credential_prefix = %prefix, error = %e, "remote auth response malformed");
            RuntimeError::AuthFailed { reason: "remote verifier returned a malformed response".to_string() }
        })?;

        if !body.valid {
            return Err(RuntimeError::AuthFailed { reason: "credential rejected by remote verifier".to_string() });
        }

        Ok(Principal {
            authenticated: true,
            workspace_id: body.workspace_id.unwrap_or_default(),
            workspace_name: body.workspace_name.unwrap_or_default(),
            user_id: body.user_id,
            credential_label: "remote-verified".to_string(),
            permissions: body.permissions,
            metadata: Default::default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unreachable_endpoint_is_auth_failed_not_panic() {
        let verifier = RemoteVerifier::new("http://127.0.0.1:1/verify", Duration::from_millis(200));
        let err = verifier.verify("some-credential").await.unwrap_err();
        assert_eq!(err.error_code(), "auth_failed");
    }
}
