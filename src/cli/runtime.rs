use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{resolve_path, AssistConfig};

/// Install the fmt subscriber. `RUST_LOG` wins over `level`.
pub fn init_logging(level: &str, debug: bool) -> Result<()> {
    let level = if debug {
        tracing::Level::DEBUG
    } else {
        level.parse().context("Invalid log level")?
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level.to_string())),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    Ok(())
}

pub struct LoadedConfig {
    pub config: AssistConfig,
    pub path: PathBuf,
}

pub fn load_config(config_path: Option<&Path>) -> Result<LoadedConfig> {
    let path = resolve_path(config_path);
    if path.exists() {
        info!("Loading configuration from: {}", path.display());
    } else {
        warn!(
            "Config file not found, using defaults: {}",
            path.display()
        );
    }
    let config = AssistConfig::load(&path)
        .with_context(|| format!("loading configuration from {}", path.display()))?;
    Ok(LoadedConfig { config, path })
}
