use convo_core::{ConvoError, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use tracing::debug;

pub mod env_substitution;

pub use env_substitution::substitute_env_vars;

/// Selects the storage mode (`true` → s3, anything else → local).
pub const USE_S3_ENV: &str = "USE_S3";
pub const S3_BUCKET_ENV: &str = "S3_BUCKET_NAME";
pub const MEMORY_DIR_ENV: &str = "MEMORY_DIR";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub storage: StorageSettings,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageSettings {
    #[serde(default)]
    pub mode: StorageMode,
    #[serde(default)]
    pub local: LocalSettings,
    #[serde(default)]
    pub s3: S3Settings,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageMode {
    #[default]
    Local,
    S3,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalSettings {
    #[serde(default = "default_root_dir")]
    pub root_dir: PathBuf,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct S3Settings {
    #[serde(default)]
    pub bucket: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile: Option<String>,
}

impl StoreConfig {
    pub fn from_yaml(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConvoError::ConfigError(format!("Failed to read config file: {}", e)))?;
        Self::from_yaml_str(&content)
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        Self::from_yaml_str_with(yaml, &|name: &str| env::var(name).ok())
    }

    /// Defaults plus the legacy environment overrides, without a config file.
    pub fn from_env() -> Result<Self> {
        Self::from_env_with(&|name: &str| env::var(name).ok())
    }

    fn from_yaml_str_with<F>(yaml: &str, lookup: &F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let raw: serde_yaml::Value = serde_yaml::from_str(yaml)
            .map_err(|e| ConvoError::ConfigError(format!("Failed to parse YAML: {}", e)))?;

        // An empty document parses as null; treat it as all defaults.
        let mut value = match serde_json::to_value(raw)? {
            serde_json::Value::Null => serde_json::Value::Object(Default::default()),
            value => value,
        };
        substitute_env_vars(&mut value, lookup)?;

        let mut config: StoreConfig = serde_json::from_value(value)
            .map_err(|e| ConvoError::ConfigError(format!("Invalid configuration: {}", e)))?;

        config.apply_env_overrides(lookup);
        config.validate()?;
        Ok(config)
    }

    fn from_env_with<F>(lookup: &F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = StoreConfig::default();
        config.apply_env_overrides(lookup);
        config.validate()?;
        Ok(config)
    }

    fn apply_env_overrides<F>(&mut self, lookup: &F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let storage = &mut self.storage;
        if let Some(use_s3) = lookup(USE_S3_ENV) {
            storage.mode = if use_s3.trim().eq_ignore_ascii_case("true") {
                StorageMode::S3
            } else {
                StorageMode::Local
            };
            debug!("{} override: mode={:?}", USE_S3_ENV, storage.mode);
        }
        if let Some(bucket) = lookup(S3_BUCKET_ENV) {
            storage.s3.bucket = bucket;
        }
        if let Some(dir) = lookup(MEMORY_DIR_ENV) {
            storage.local.root_dir = PathBuf::from(dir);
        }
    }

    pub fn validate(&self) -> Result<()> {
        match self.storage.mode {
            StorageMode::S3 if self.storage.s3.bucket.trim().is_empty() => {
                Err(ConvoError::ConfigError(format!(
                    "S3 bucket name is required when storage mode is s3 (set storage.s3.bucket or {})",
                    S3_BUCKET_ENV
                )))
            }
            StorageMode::Local if self.storage.local.root_dir.as_os_str().is_empty() => Err(
                ConvoError::ConfigError("Local storage root directory cannot be empty".into()),
            ),
            _ => Ok(()),
        }
    }
}

impl Default for LocalSettings {
    fn default() -> Self {
        Self {
            root_dir: default_root_dir(),
        }
    }
}

fn default_root_dir() -> PathBuf {
    PathBuf::from("./persistent_conversation_history")
}
