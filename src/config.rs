use serde::Deserialize;
use serde_json::Value;
use std::{
    collections::BTreeMap,
    env, fs,
    path::{Path, PathBuf},
};

use crate::{
    error::{ImagerError, Result},
    storage::BackendKind,
    variant::VariantSpec,
};

/// Environment variable holding the path of the JSON config.
pub const CONFIG_ENV: &str = "IMAGER_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "imager.json";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LocalOptions {
    pub path: PathBuf,
    #[serde(default)]
    pub public_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct S3Options {
    pub bucket: String,
    #[serde(default)]
    pub region: Option<String>,
    /// S3-compatible endpoint, e.g. Backblaze B2 or MinIO.
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub secret: Option<String>,
    #[serde(default)]
    pub acl: Option<String>,
    #[serde(default)]
    pub public_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RackspaceOptions {
    pub username: String,
    pub api_key: String,
    pub container: String,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub auth_url: Option<String>,
}

/// Credentials and options of one `storage` entry, tagged by `kind`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum BackendOptions {
    Local(LocalOptions),
    S3(S3Options),
    Rackspace(RackspaceOptions),
}

impl BackendOptions {
    pub fn kind(&self) -> BackendKind {
        match self {
            BackendOptions::Local(_) => BackendKind::Local,
            BackendOptions::S3(_) => BackendKind::S3,
            BackendOptions::Rackspace(_) => BackendKind::Rackspace,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub variants: BTreeMap<String, VariantSpec>,
    pub storage: BTreeMap<String, BackendOptions>,
    /// Prefix prepended to every stored object key.
    #[serde(default)]
    pub upload_directory: Option<String>,
    #[serde(default)]
    pub default_variant: Option<String>,
    /// Fail construction when the backend selector names an unconfigured backend.
    #[serde(default)]
    pub strict_backends: bool,
    /// Maximum number of assets processed at once.
    #[serde(default)]
    pub concurrency: Option<usize>,
}

impl Config {
    /// Validate an untyped JSON document and turn it into a `Config`.
    pub fn from_value(value: &Value) -> Result<Config> {
        let object = value.as_object().ok_or(ImagerError::ConfigMissing)?;
        match object.get("storage") {
            None | Some(Value::Null) => return Err(ImagerError::StorageSectionMissing),
            Some(_) => {}
        }

        let config = Config::deserialize(value)
            .map_err(|e| ImagerError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json(json: &str) -> Result<Config> {
        let value: Value =
            serde_json::from_str(json).map_err(|e| ImagerError::InvalidConfig(e.to_string()))?;
        Config::from_value(&value)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Config> {
        let path = path.as_ref();
        let json = fs::read_to_string(path).map_err(|e| ImagerError::io(path, e))?;
        Config::from_json(&json)
    }

    /// Load the config pointed to by `IMAGER_CONFIG`, or `./imager.json`.
    pub fn from_env() -> Result<Config> {
        let path = env::var(CONFIG_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_owned());
        Config::from_file(path)
    }

    pub fn validate(&self) -> Result<()> {
        if self.storage.is_empty() {
            return Err(ImagerError::StorageSectionMissing);
        }
        if self.variants.is_empty() {
            return Err(ImagerError::InvalidConfig(
                "at least one variant is required".to_owned(),
            ));
        }
        if self.concurrency == Some(0) {
            return Err(ImagerError::InvalidConfig(
                "concurrency must be greater than zero".to_owned(),
            ));
        }
        Ok(())
    }

    pub fn backend_options(&self, identifier: &str) -> Option<&BackendOptions> {
        self.storage.get(identifier)
    }
}
