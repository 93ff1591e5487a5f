//! Effective configuration
//!
//! Layered from an optional YAML file and `SCHEDASSIST__*` environment
//! variables (`SCHEDASSIST__RETRY__MAX_ATTEMPTS=5`), over built-in defaults.

use std::path::{Path, PathBuf};

use action_flow::{AutomationSettings, FlowError, RetrySettings, SurfaceCatalog};
use action_primitives::ObserverConfig;
use extensions_bridge::{BridgeError, InjectionConfig};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::simulator::PageOptions;

pub const ENV_PREFIX: &str = "SCHEDASSIST";
pub const LOCAL_CONFIG: &str = "config/schedassist.yaml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] ::config::ConfigError),
    #[error("injection: {0}")]
    Injection(#[from] BridgeError),
    #[error("catalog: {0}")]
    Catalog(#[from] FlowError),
    #[error("{0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssistConfig {
    pub injection: InjectionConfig,
    pub catalog: SurfaceCatalog,
    pub timeouts: ObserverConfig,
    pub retry: RetrySettings,
    /// Shape of the simulated page used by `demo`
    pub demo: PageOptions,
}

impl AssistConfig {
    /// Load `path` (if it exists) under environment overrides.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let settings = ::config::Config::builder()
            .add_source(
                ::config::File::from(path)
                    .format(::config::FileFormat::Yaml)
                    .required(false),
            )
            .add_source(
                ::config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;
        Ok(settings.try_deserialize()?)
    }

    pub fn automation_settings(&self) -> AutomationSettings {
        AutomationSettings {
            catalog: self.catalog.clone(),
            timeouts: self.timeouts,
            retry: self.retry,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.injection.validate()?;
        self.catalog.validate()?;
        if self.timeouts.wait_timeout_ms == 0 || self.timeouts.flow_timeout_ms == 0 {
            return Err(ConfigError::Invalid("timeouts must be non-zero".into()));
        }
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::Invalid("retry.max_attempts must be at least 1".into()));
        }
        Ok(())
    }
}

/// `--config` if given, else `config/schedassist.yaml` when present, else the
/// per-user config directory.
pub fn resolve_path(explicit: Option<&Path>) -> PathBuf {
    if let Some(path) = explicit {
        return path.to_path_buf();
    }
    let local = PathBuf::from(LOCAL_CONFIG);
    if local.exists() {
        return local;
    }
    match dirs::config_dir() {
        Some(mut path) => {
            path.push("schedassist");
            path.push("config.yaml");
            path
        }
        None => local,
    }
}
