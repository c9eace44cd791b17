use async_trait::async_trait;

use crate::error::Result;
use crate::protocol::Credentials;

/// Capability trait for the credential store: owned by its own collaborator,
/// never cached by the engines in this crate. Concrete storage (OS keychain,
/// JSON file, INI static-key file) lives in `openpackage_cli`.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn get(&self, profile: &str) -> Result<Credentials>;
    async fn set(&self, profile: &str, credentials: Credentials) -> Result<()>;
    async fn clear(&self, profile: &str) -> Result<()>;
}

/// A store with no persisted state, useful where a caller has already
/// resolved credentials some other way (e.g. `--api-key`) and the trait is
/// only needed to satisfy a function signature.
pub struct NoCredentials;

#[async_trait]
impl CredentialStore for NoCredentials {
    async fn get(&self, _profile: &str) -> Result<Credentials> {
        Ok(Credentials::None)
    }

    async fn set(&self, _profile: &str, _credentials: Credentials) -> Result<()> {
        Ok(())
    }

    async fn clear(&self, _profile: &str) -> Result<()> {
        Ok(())
    }
}
