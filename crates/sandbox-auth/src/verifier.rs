use async_trait::async_trait;
use sandbox_error::RuntimeError;

use crate::principal::Principal;

/// `verify(credential) -> Principal | ∅` (§4.1). No implementation may
/// fail open: any error here — network, timeout, malformed response — is
/// the caller's signal to reject the request as `auth_failed`.
#[async_trait]
pub trait AuthVerifier: Send + Sync + std::fmt::Debug {
    async fn verify(&self, credential: &str) -> Result<Principal, RuntimeError>;
}
