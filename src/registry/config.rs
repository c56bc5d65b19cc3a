use super::error::SyncError;

/// Where AWS credentials for a call come from
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum IdentitySource {
    /// Environment, shared config, instance/role credentials (the SDK default chain)
    #[default]
    DefaultChain,
    /// A named profile from the shared AWS config files
    Profile(String),
}

impl IdentitySource {
    pub fn from_profile(profile: Option<&str>) -> Self {
        match profile {
            Some(name) if !name.trim().is_empty() => IdentitySource::Profile(name.to_string()),
            _ => IdentitySource::DefaultChain,
        }
    }
}

/// Keeps images whose tag contains a configured substring. An empty substring keeps all.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagFilter {
    substring: String,
}

impl TagFilter {
    pub fn new(substring: impl Into<String>) -> Self {
        Self {
            substring: substring.into(),
        }
    }

    pub fn matches(&self, tag: &str) -> bool {
        tag.contains(&self.substring)
    }

    pub fn substring(&self) -> &str {
        &self.substring
    }
}

/// Per-invocation parameters for enumeration and the sync pipeline.
///
/// Built from the `registry` settings section (and CLI overrides), validated once via
/// [`SyncConfig::validate`] before it reaches the core.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Fixed identity the registry expects alongside the decoded secret
    pub username: String,
    /// Registry host below the account id, `{region}` is substituted
    pub host_template: String,
    pub tag_filter: TagFilter,
    /// Tag the pulled image is re-tagged to before pushing
    pub promote_tag: String,
    pub page_size: i32,
    pub identity: IdentitySource,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            username: "AWS".to_string(),
            host_template: "dkr.ecr.{region}.amazonaws.com".to_string(),
            tag_filter: TagFilter::default(),
            promote_tag: "latest".to_string(),
            page_size: 10,
            identity: IdentitySource::DefaultChain,
        }
    }
}

impl SyncConfig {
    pub fn validate(&self) -> Result<(), SyncError> {
        if self.username.trim().is_empty() {
            return Err(SyncError::configuration("registry username must not be empty"));
        }
        if !self.host_template.contains("{region}") {
            return Err(SyncError::configuration(format!(
                "registry host template must contain '{{region}}', got '{}'",
                self.host_template
            )));
        }
        validate_tag(&self.promote_tag, "promote tag")?;
        if !(1..=1000).contains(&self.page_size) {
            return Err(SyncError::configuration(format!(
                "page size must be between 1 and 1000, got {}",
                self.page_size
            )));
        }
        if let IdentitySource::Profile(name) = &self.identity {
            if name.trim().is_empty() {
                return Err(SyncError::configuration("profile name must not be empty"));
            }
        }
        Ok(())
    }

    pub fn registry_host(&self, account_id: &str, region: &str) -> String {
        format!(
            "{}.{}",
            account_id,
            self.host_template.replace("{region}", region)
        )
    }
}

/// Check that a value can be used as an image tag
pub fn validate_tag(tag: &str, what: &str) -> Result<(), SyncError> {
    if tag.is_empty() {
        return Err(SyncError::configuration(format!("{} must not be empty", what)));
    }
    if tag.contains(':') || tag.contains('/') || tag.chars().any(char::is_whitespace) {
        return Err(SyncError::configuration(format!(
            "{} '{}' contains characters not allowed in a tag",
            what, tag
        )));
    }
    Ok(())
}
