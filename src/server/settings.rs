use config::{Config, ConfigError};
use serde::Deserialize;
use std::env;
use std::time::Duration;

use crate::registry::{IdentitySource, SyncConfig, TagFilter};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub registry: RegistrySettings,
    #[serde(default)]
    pub transfer: TransferSettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3333
}

#[derive(Debug, Deserialize, Clone)]
pub struct RegistrySettings {
    /// Fixed identity sent with the decoded token secret (ECR expects "AWS")
    #[serde(default = "default_username")]
    pub username: String,

    /// Registry host below the account id; must contain `{region}`
    #[serde(default = "default_host_template")]
    pub host_template: String,

    /// Only images whose tag contains this substring are listed. Empty keeps all.
    #[serde(default)]
    pub tag_filter: String,

    /// Tag a promoted image is pushed under
    #[serde(default = "default_promote_tag")]
    pub promote_tag: String,

    /// Items requested per listing call
    #[serde(default = "default_page_size")]
    pub page_size: i32,

    /// Named AWS profile; the default credential chain is used when unset
    #[serde(default)]
    pub profile: Option<String>,

    /// Region used by CLI commands when `--region` is not given
    #[serde(default)]
    pub default_region: Option<String>,

    /// Account used for promotions when the request does not name one
    #[serde(default)]
    pub account_id: Option<String>,
}

impl Default for RegistrySettings {
    fn default() -> Self {
        Self {
            username: default_username(),
            host_template: default_host_template(),
            tag_filter: String::new(),
            promote_tag: default_promote_tag(),
            page_size: default_page_size(),
            profile: None,
            default_region: None,
            account_id: None,
        }
    }
}

impl RegistrySettings {
    pub fn sync_config(&self) -> SyncConfig {
        SyncConfig {
            username: self.username.clone(),
            host_template: self.host_template.clone(),
            tag_filter: TagFilter::new(self.tag_filter.clone()),
            promote_tag: self.promote_tag.clone(),
            page_size: self.page_size,
            identity: IdentitySource::from_profile(self.profile.as_deref()),
        }
    }
}

fn default_username() -> String {
    "AWS".to_string()
}

fn default_host_template() -> String {
    "dkr.ecr.{region}.amazonaws.com".to_string()
}

fn default_promote_tag() -> String {
    "latest".to_string()
}

fn default_page_size() -> i32 {
    10
}

#[derive(Debug, Deserialize, Clone)]
pub struct TransferSettings {
    /// Upper bound for one promotion run in seconds, 0 disables the deadline
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Upper bound for one listing in seconds, 0 disables the deadline
    #[serde(default = "default_list_timeout_secs")]
    pub list_timeout_secs: u64,
}

impl Default for TransferSettings {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            list_timeout_secs: default_list_timeout_secs(),
        }
    }
}

impl TransferSettings {
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs))
    }

    pub fn list_timeout(&self) -> Option<Duration> {
        (self.list_timeout_secs > 0).then(|| Duration::from_secs(self.list_timeout_secs))
    }
}

fn default_timeout_secs() -> u64 {
    1800
}

fn default_list_timeout_secs() -> u64 {
    120
}

impl Settings {
    /// Substitute environment variables in a string value
    /// Replaces ${VAR_NAME} or ${VAR_NAME:-default} with environment variable values
    fn substitute_env_vars_in_string(s: &str) -> String {
        let re = regex::Regex::new(r"\$\{([^}:]+)(?::-([^}]*))?\}").expect("valid pattern");

        re.replace_all(s, |caps: &regex::Captures| {
            let var_name = &caps[1];
            let default_value = caps.get(2).map(|m| m.as_str());

            match env::var(var_name) {
                Ok(val) => val,
                Err(_) => default_value.unwrap_or("").to_string(),
            }
        })
        .to_string()
    }

    /// Convert a config::Value to a serde_json::Value, performing environment variable substitution
    fn config_value_to_json(value: &config::Value) -> serde_json::Value {
        use config::ValueKind;

        match &value.kind {
            ValueKind::Nil => serde_json::Value::Null,
            ValueKind::Boolean(b) => serde_json::Value::Bool(*b),
            ValueKind::I64(i) => serde_json::Value::Number((*i).into()),
            ValueKind::I128(i) => serde_json::Value::Number((*i as i64).into()),
            ValueKind::U64(u) => serde_json::Value::Number((*u).into()),
            ValueKind::U128(u) => serde_json::Value::Number((*u as u64).into()),
            ValueKind::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            ValueKind::String(s) => serde_json::Value::String(Self::substitute_env_vars_in_string(s)),
            ValueKind::Table(table) => {
                let mut map = serde_json::Map::new();
                for (k, v) in table.iter() {
                    map.insert(k.clone(), Self::config_value_to_json(v));
                }
                serde_json::Value::Object(map)
            }
            ValueKind::Array(arr) => {
                serde_json::Value::Array(arr.iter().map(Self::config_value_to_json).collect())
            }
        }
    }

    /// Add `{config_dir}/{name}.{toml,yaml,yml}` if one exists. TOML wins.
    fn add_config_file(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
        config_dir: &str,
        name: &str,
    ) -> config::ConfigBuilder<config::builder::DefaultState> {
        for ext in ["toml", "yaml", "yml"] {
            let path = format!("{}/{}.{}", config_dir, name, ext);
            if std::path::Path::new(&path).exists() {
                tracing::info!("Loading config file: {}", path);
                return builder.add_source(config::File::with_name(&path));
            }
        }

        tracing::debug!(
            "Config file not found: {}/{}.{{toml,yaml,yml}}",
            config_dir,
            name
        );
        builder
    }

    /// Load settings from `ECR_PROMOTE_CONFIG_DIR` (default `config`)
    pub fn new() -> Result<Self, ConfigError> {
        let run_mode =
            env::var("ECR_PROMOTE_CONFIG_RUN_MODE").unwrap_or_else(|_| "development".into());
        let config_dir = env::var("ECR_PROMOTE_CONFIG_DIR").unwrap_or_else(|_| "config".into());
        Self::load_from(&config_dir, &run_mode)
    }

    /// Load `default`, `{run_mode}` and `local` files from `config_dir`, all optional
    pub fn load_from(config_dir: &str, run_mode: &str) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();
        for name in ["default", run_mode, "local"] {
            builder = Self::add_config_file(builder, config_dir, name);
        }
        let config = builder.build()?;

        let root_value = config
            .cache
            .into_table()
            .map_err(|e| ConfigError::Message(format!("Failed to get config table: {}", e)))?;

        let mut json_map = serde_json::Map::new();
        for (k, v) in root_value.iter() {
            json_map.insert(k.clone(), Self::config_value_to_json(v));
        }

        let mut unused_fields = Vec::new();
        let settings: Settings =
            serde_ignored::deserialize(serde_json::Value::Object(json_map), |path| {
                unused_fields.push(path.to_string());
            })
            .map_err(|e| ConfigError::Message(format!("Failed to deserialize settings: {}", e)))?;

        for field in &unused_fields {
            tracing::warn!("Unknown configuration field: {}", field);
        }

        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        // Covers the `{region}` placeholder, page size, promote tag and username
        self.registry
            .sync_config()
            .validate()
            .map_err(|e| ConfigError::Message(format!("Invalid [registry] settings: {}", e)))?;

        if let Some(account_id) = &self.registry.account_id {
            if account_id.trim().is_empty() {
                return Err(ConfigError::Message(
                    "registry.account_id is set but empty".to_string(),
                ));
            }
        }

        Ok(())
    }
}
