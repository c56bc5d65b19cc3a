use async_trait::async_trait;
use aws_sdk_ecr::types::AuthorizationData;
use tracing::{debug, info};

use super::aws::{ecr_client, format_sdk_error};
use super::config::SyncConfig;
use super::error::{AuthTokenError, SyncError};
use super::token;

/// Short-lived registry login, minted for a single pull/tag/push run.
///
/// Deliberately not `Clone`: the credential is owned by the operation that acquired it and
/// dropped when that operation ends.
pub struct RegistryCredential {
    identity: String,
    secret: String,
}

impl RegistryCredential {
    pub fn new(identity: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            secret: secret.into(),
        }
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn secret(&self) -> &str {
        &self.secret
    }
}

impl std::fmt::Debug for RegistryCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistryCredential")
            .field("identity", &self.identity)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// Resolves a region and identity source into registry credentials
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    async fn acquire(
        &self,
        region: &str,
        config: &SyncConfig,
    ) -> Result<RegistryCredential, SyncError>;
}

/// The one authorization token in a response; zero or several entries are errors
pub fn single_authorization_token(data: &[AuthorizationData]) -> Result<&str, AuthTokenError> {
    match data {
        [] => Err(AuthTokenError::Empty),
        [entry] => entry.authorization_token().ok_or(AuthTokenError::NullToken),
        entries => Err(AuthTokenError::Multiple(entries.len())),
    }
}

/// Validate an authorization response and turn it into a credential for `username`
pub fn credential_from_authorization(
    data: &[AuthorizationData],
    username: &str,
) -> Result<RegistryCredential, SyncError> {
    let raw = single_authorization_token(data)?;
    let decoded = token::decode(raw).map_err(AuthTokenError::from)?;

    if decoded.principal != username {
        debug!(
            principal = %decoded.principal,
            username,
            "Token principal differs from configured registry username, using configured one"
        );
    }

    Ok(RegistryCredential::new(username, decoded.secret))
}

/// Fetches credentials from ECR's GetAuthorizationToken
#[derive(Debug, Default, Clone)]
pub struct EcrCredentialProvider;

#[async_trait]
impl CredentialProvider for EcrCredentialProvider {
    async fn acquire(
        &self,
        region: &str,
        config: &SyncConfig,
    ) -> Result<RegistryCredential, SyncError> {
        let client = ecr_client(region, &config.identity).await?;

        info!(region, "Requesting registry authorization token");
        let response = client
            .get_authorization_token()
            .send()
            .await
            .map_err(|e| AuthTokenError::Request(format_sdk_error(&e)))?;

        credential_from_authorization(response.authorization_data(), &config.username)
    }
}
