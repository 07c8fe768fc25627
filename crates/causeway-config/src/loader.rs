//! Configuration loader with multi-source merging

use crate::{CausewayConfig, ConfigFiles};
use anyhow::{Context, Result};
use std::env;
use std::path::{Path, PathBuf};

/// Configuration loader with builder pattern
pub struct ConfigLoader {
    project_dir: PathBuf,
    env_prefix: String,
}

impl ConfigLoader {
    /// Create a new config loader with default project directory (current dir)
    pub fn new() -> Self {
        Self {
            project_dir: env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            env_prefix: "CWY".to_string(),
        }
    }

    /// Set the project directory
    pub fn with_project_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.project_dir = dir.as_ref().to_path_buf();
        self
    }

    /// Set the environment variable prefix (default: "CWY")
    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    /// Load configuration from all sources with proper precedence, then
    /// validate the result.
    pub fn load(self) -> Result<CausewayConfig> {
        let mut builder = config::Config::builder();

        // 1. Start with built-in defaults
        let defaults = CausewayConfig::default();
        builder = builder.add_source(config::Config::try_from(&defaults)?);

        // 2. User config, 3. causeway.toml, 4. causeway.local.toml
        for file in ConfigFiles::for_dir(&self.project_dir).existing() {
            builder = builder.add_source(
                config::File::from(file)
                    .required(false)
                    .format(config::FileFormat::Toml),
            );
        }

        // 5. Environment variables (CWY_CLUSTER__REPLICAS, CWY_GOSSIP__PERIOD_MS, ...)
        builder = builder.add_source(
            config::Environment::with_prefix(&self.env_prefix)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build().context("Failed to build configuration")?;

        let mut causeway_config: CausewayConfig = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        causeway_config.resolve_paths(&self.project_dir);
        causeway_config
            .validate()
            .context("Configuration rejected")?;

        Ok(causeway_config)
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}
