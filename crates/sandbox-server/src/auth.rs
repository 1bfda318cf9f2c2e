//! `X-API-Key` authentication middleware.
//!
//! Modeled on the teacher's bearer-token middleware: extract the credential,
//! verify it, and stash the resolved [`Principal`] as a request extension so
//! handlers never parse headers themselves. Unlike a bearer-token equality
//! check, verification here is delegated to the configured [`AuthVerifier`]
//! (static table, remote, or permissive) — the credential itself is never
//! trusted as an identity, only what the verifier resolves it to.

use axum::extract::{Request, State};
use axum::http::{HeaderMap, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use sandbox_auth::{credential_prefix, Principal};

use crate::state::AppState;

const API_KEY_HEADER: &str = "x-api-key";

pub async fn api_key_auth_middleware(State(state): State<AppState>, mut request: Request, next: Next) -> Response {
    let credential = match extract_credential(request.headers()) {
        Some(c) => c,
        None => {
            return (StatusCode::UNAUTHORIZED, "missing X-API-Key header").into_response();
        }
    };

    match state.auth_verifier.verify(&credential).await {
        Ok(principal) => {
            request.extensions_mut().insert(principal);
            next.run(request).await
        }
        Err(err) => {
            tracing::warn!(
                target: "security",
                credential_prefix = %credential_prefix(&credential),
                error_code = err.error_code(),
                "request rejected by api key auth middleware"
            );
            err.into_response()
        }
    }
}

fn extract_credential(headers: &HeaderMap) -> Option<String> {
    headers.get(API_KEY_HEADER).and_then(|value| value.to_str().ok()).map(str::to_string)
}

/// Checks that a [`Principal`] already resolved by
/// [`api_key_auth_middleware`] (and extracted via `Extension<Principal>`)
/// carries `permission`.
pub fn require_permission(principal: &Principal, permission: sandbox_auth::Permission) -> Result<(), sandbox_error::RuntimeError> {
    if principal.has_permission(permission) {
        Ok(())
    } else {
        Err(sandbox_error::RuntimeError::AuthDenied { required_permission: format!("{permission:?}") })
    }
}
