use crate::error::{ErrorKind, Result};
use crate::metadata::Metadata;
use exn::ResultExt;
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Yaml};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Prefix of environment variables overriding configuration values.
/// Nested keys are separated by `__` (`REWIND_UPSTREAM__TIMEOUT_SECS`).
pub const ENV_PREFIX: &str = "REWIND_";
/// Placeholder replaced by the collection name in the CDX endpoint.
pub const COLL_PLACEHOLDER: &str = "{coll}";

/// Gateway configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory holding one sub-directory per dynamic collection.
    pub collections_root: PathBuf,
    /// Sub-directory of a collection that holds its containers.
    pub archive_dir: String,
    /// Per-collection metadata file name.
    pub metadata_file: String,
    /// Fixed collections: name to free-form configuration.
    pub collections: BTreeMap<String, Metadata>,
    /// Log full error trees for failed requests.
    pub debug: bool,
    pub use_js_obj_proxy: bool,
    /// Read buffer size for record loading.
    pub block_size: usize,
    pub upstream: UpstreamConfig,
    /// Recording is only available when this is set.
    pub recorder: Option<RecorderConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            collections_root: PathBuf::from("collections"),
            archive_dir: "archive".to_string(),
            metadata_file: "metadata.yaml".to_string(),
            collections: BTreeMap::new(),
            debug: false,
            use_js_obj_proxy: false,
            block_size: 8192,
            upstream: UpstreamConfig::default(),
            recorder: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// CDX index endpoint; `{coll}` is replaced by the collection name.
    pub cdx_endpoint: String,
    pub timeout_secs: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            cdx_endpoint: "http://localhost:8080/{coll}/index".to_string(),
            timeout_secs: 30,
        }
    }
}

impl UpstreamConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// The CDX endpoint of one collection.
    pub fn cdx_endpoint_for(&self, coll: &str) -> String {
        self.cdx_endpoint.replace(COLL_PLACEHOLDER, coll)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecorderConfig {
    /// Roll over to a new container past this many bytes.
    pub max_size: u64,
    /// Roll over after this many seconds without writes.
    pub max_idle_secs: u64,
    pub filename_prefix: String,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            max_size: 1_000_000_000,
            max_idle_secs: 600,
            filename_prefix: "rec".to_string(),
        }
    }
}

impl Config {
    /// Layered sources, lowest precedence first: defaults, the YAML file (if
    /// any), then `REWIND_*` environment variables.
    pub fn figment(file: Option<&Path>) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));
        if let Some(file) = file {
            figment = figment.merge(Yaml::file_exact(file));
        }
        figment.merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Load and validate configuration.
    pub fn load(file: Option<&Path>) -> Result<Self> {
        Self::from_figment(Self::figment(file))
    }

    pub fn from_figment(figment: Figment) -> Result<Self> {
        let config: Config = figment.extract().or_raise(|| ErrorKind::Load)?;
        config.validate()?;
        tracing::debug!(
            root = %config.collections_root.display(),
            fixed = config.collections.len(),
            recording = config.recorder.is_some(),
            "configuration loaded"
        );
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.block_size == 0 {
            exn::bail!(ErrorKind::Invalid("block_size must be greater than zero".to_string()));
        }
        if !self.upstream.cdx_endpoint.contains(COLL_PLACEHOLDER) {
            exn::bail!(ErrorKind::Invalid(format!(
                "upstream.cdx_endpoint must contain {COLL_PLACEHOLDER}: {}",
                self.upstream.cdx_endpoint
            )));
        }
        if let Some(name) = self.collections.keys().find(|name| name.trim().is_empty() || name.contains('/')) {
            exn::bail!(ErrorKind::Invalid(format!("invalid fixed collection name {name:?}")));
        }
        Ok(())
    }

    /// Whether `coll` is a configured (fixed) collection.
    pub fn is_fixed(&self, coll: &str) -> bool {
        self.collections.contains_key(coll)
    }
}
