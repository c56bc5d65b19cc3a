use super::config::{validate_tag, SyncConfig};
use super::error::SyncError;

/// Fully-qualified image address, `{account}.{registry host}/{repository}:{tag}`.
///
/// Only ever built from its parts; never parsed back from a string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FullyQualifiedReference {
    registry: String,
    repository: String,
    tag: String,
}

impl FullyQualifiedReference {
    pub fn new(
        config: &SyncConfig,
        account_id: &str,
        region: &str,
        repository: &str,
        tag: &str,
    ) -> Result<Self, SyncError> {
        if account_id.trim().is_empty() {
            return Err(SyncError::configuration("account id must not be empty"));
        }
        if region.trim().is_empty() {
            return Err(SyncError::configuration("region must not be empty"));
        }
        if repository.trim().is_empty() {
            return Err(SyncError::configuration("repository name must not be empty"));
        }
        validate_tag(tag, "tag")?;

        Ok(Self {
            registry: config.registry_host(account_id, region),
            repository: repository.to_string(),
            tag: tag.to_string(),
        })
    }

    /// Same registry and repository, different tag
    pub fn with_tag(&self, tag: &str) -> Self {
        Self {
            registry: self.registry.clone(),
            repository: self.repository.clone(),
            tag: tag.to_string(),
        }
    }

    pub fn registry(&self) -> &str {
        &self.registry
    }

    /// `{registry}/{repository}` without the tag
    pub fn repository_path(&self) -> String {
        format!("{}/{}", self.registry, self.repository)
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }
}

impl std::fmt::Display for FullyQualifiedReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}:{}", self.registry, self.repository, self.tag)
    }
}
