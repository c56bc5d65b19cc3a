use aws_config::profile::ProfileFileCredentialsProvider;
use aws_config::{BehaviorVersion, Region, SdkConfig};
use aws_credential_types::provider::ProvideCredentials;
use aws_sdk_ecr::Client as EcrClient;
use tracing::debug;

use super::config::IdentitySource;
use super::error::SyncError;

/// Pull the human-readable message out of an AWS SDK error.
///
/// SDK errors only expose a verbose `Debug` rendering; the service message sits inside it as
/// `message: Some("...")`.
pub fn format_sdk_error<E: std::fmt::Debug>(err: &E) -> String {
    let debug_str = format!("{:?}", err);

    if let Some(start) = debug_str.find("message: Some(\"") {
        let start = start + "message: Some(\"".len();
        if let Some(end) = debug_str[start..].find("\")") {
            return debug_str[start..start + end].to_string();
        }
    }

    if debug_str.len() > 200 {
        let cut = (0..=200)
            .rev()
            .find(|i| debug_str.is_char_boundary(*i))
            .unwrap_or(0);
        format!("{}...", &debug_str[..cut])
    } else {
        debug_str
    }
}

/// Load shared AWS configuration for a region and identity source.
///
/// Credentials are resolved once before returning, so a missing profile or an empty
/// credential chain is reported as a configuration error instead of failing the first call.
pub async fn load_sdk_config(
    region: &str,
    identity: &IdentitySource,
) -> Result<SdkConfig, SyncError> {
    if region.trim().is_empty() {
        return Err(SyncError::configuration("region must not be empty"));
    }

    let mut loader =
        aws_config::defaults(BehaviorVersion::latest()).region(Region::new(region.to_string()));

    let source = match identity {
        IdentitySource::Profile(profile) => {
            debug!(region, profile, "Loading AWS config from named profile");
            // Only the named profile, no fallback to environment or instance credentials
            loader = loader.profile_name(profile).credentials_provider(
                ProfileFileCredentialsProvider::builder()
                    .profile_name(profile)
                    .build(),
            );
            format!("profile '{}'", profile)
        }
        IdentitySource::DefaultChain => {
            debug!(region, "Loading AWS config from default credential chain");
            "default credential chain".to_string()
        }
    };

    let config = loader.load().await;
    let provider = config.credentials_provider().ok_or_else(|| {
        SyncError::configuration(format!(
            "no AWS credentials provider configured for region '{}'",
            region
        ))
    })?;

    provider.provide_credentials().await.map_err(|e| {
        SyncError::configuration(format!(
            "failed to resolve AWS credentials from {}: {}",
            source,
            format_sdk_error(&e)
        ))
    })?;

    Ok(config)
}

/// Registry control plane client for a region and identity source
pub async fn ecr_client(region: &str, identity: &IdentitySource) -> Result<EcrClient, SyncError> {
    let config = load_sdk_config(region, identity).await?;
    Ok(EcrClient::new(&config))
}
