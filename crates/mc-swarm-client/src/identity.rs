//! Join confirmation with the session service.
//!
//! The HTTP client lives outside this crate; bots only see the blocking
//! [`IdentityProvider::join`] call, which always runs off the tick worker.

use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("{0}")]
    Rejected(String),

    #[error("identity service unavailable: {0}")]
    Unavailable(String),
}

pub trait IdentityProvider: Send + Sync {
    /// Tell the session service this profile is joining the server whose
    /// hash is `server_hash`.
    fn join(&self, profile_id: Uuid, access_token: &str, server_hash: &str) -> Result<(), AuthError>;
}

/// Used when no session service is wired in. Every online join fails.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoIdentityService;

impl IdentityProvider for NoIdentityService {
    fn join(&self, _profile_id: Uuid, _access_token: &str, _server_hash: &str) -> Result<(), AuthError> {
        Err(AuthError::Unavailable("no identity service configured".into()))
    }
}
