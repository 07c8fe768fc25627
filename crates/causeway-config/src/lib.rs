//! Configuration management for Causeway
//!
//! Provides hierarchical configuration loading from multiple sources:
//! 1. Environment variables (CWY_* prefix, highest precedence)
//! 2. causeway.local.toml (gitignored, local overrides)
//! 3. causeway.toml (git-tracked, deployment config)
//! 4. ~/.config/causeway/config.toml (user defaults)
//! 5. Built-in defaults (lowest precedence)

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

mod error;
mod loader;
mod paths;

pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use paths::{ConfigFiles, LOCAL_CONFIG_FILE, PROJECT_CONFIG_FILE};

/// Main Causeway configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CausewayConfig {
    pub cluster: ClusterConfig,
    pub gossip: GossipConfig,
    pub frontend: FrontendConfig,
    pub catalog: CatalogConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    /// Number of replicas, which is also the dimension of every vector clock.
    pub replicas: usize,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self { replicas: 3 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GossipConfig {
    pub period_ms: u64,
}

impl GossipConfig {
    pub fn period(&self) -> Duration {
        Duration::from_millis(self.period_ms)
    }
}

impl Default for GossipConfig {
    fn default() -> Self {
        Self { period_ms: 10_000 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrontendConfig {
    /// Replicas every mutation is sent to.
    pub write_replicas: usize,
}

impl Default for FrontendConfig {
    fn default() -> Self {
        Self { write_replicas: 2 }
    }
}

/// Dataset used to seed every replica at startup.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// Item file (`id,title,genres`).
    pub items: Option<PathBuf>,
    /// Ratings file (`user,item,rating,...`).
    pub ratings: Option<PathBuf>,
}

impl CatalogConfig {
    /// Both files, when both are configured.
    pub fn paths(&self) -> Option<(&Path, &Path)> {
        match (&self.items, &self.ratings) {
            (Some(items), Some(ratings)) => Some((items.as_path(), ratings.as_path())),
            _ => None,
        }
    }
}

impl CausewayConfig {
    /// Load configuration from default locations
    pub fn load() -> Result<Self> {
        ConfigLoader::new().load()
    }

    /// Load configuration from specific project directory
    pub fn load_from_dir(project_dir: impl AsRef<Path>) -> Result<Self> {
        ConfigLoader::new().with_project_dir(project_dir).load()
    }

    /// Checks the values no deployment can run with.
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if self.cluster.replicas == 0 {
            return Err(ConfigError::ValidationError(
                "cluster.replicas must be at least 1".to_string(),
            ));
        }
        if self.gossip.period_ms == 0 {
            return Err(ConfigError::ValidationError(
                "gossip.period_ms must be positive".to_string(),
            ));
        }
        if self.frontend.write_replicas == 0 {
            return Err(ConfigError::ValidationError(
                "frontend.write_replicas must be at least 1".to_string(),
            ));
        }
        if self.frontend.write_replicas > self.cluster.replicas {
            return Err(ConfigError::ValidationError(format!(
                "frontend.write_replicas ({}) exceeds cluster.replicas ({})",
                self.frontend.write_replicas, self.cluster.replicas
            )));
        }
        if self.catalog.items.is_some() != self.catalog.ratings.is_some() {
            return Err(ConfigError::ValidationError(
                "catalog.items and catalog.ratings must be set together".to_string(),
            ));
        }
        Ok(())
    }

    /// Renders the configuration as a `causeway.toml` document.
    pub fn to_toml(&self) -> std::result::Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Resolve relative paths to absolute
    pub fn resolve_paths(&mut self, base_dir: impl AsRef<Path>) {
        let base = base_dir.as_ref();

        for path in [&mut self.catalog.items, &mut self.catalog.ratings]
            .into_iter()
            .flatten()
        {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn test_default_config() {
        let config = CausewayConfig::default();
        assert_eq!(config.cluster.replicas, 3);
        assert_eq!(config.gossip.period(), Duration::from_secs(10));
        assert_eq!(config.frontend.write_replicas, 2);
        assert!(config.catalog.paths().is_none());
        assert!(config.validate().is_ok());
    }

    #[test_case(|c: &mut CausewayConfig| c.cluster.replicas = 0 ; "no replicas")]
    #[test_case(|c: &mut CausewayConfig| c.gossip.period_ms = 0 ; "zero gossip period")]
    #[test_case(|c: &mut CausewayConfig| c.frontend.write_replicas = 0 ; "no write replicas")]
    #[test_case(|c: &mut CausewayConfig| c.frontend.write_replicas = 4 ; "fan-out above replica count")]
    #[test_case(|c: &mut CausewayConfig| c.catalog.items = Some("movies.csv".into()) ; "items without ratings")]
    fn test_invalid_config(edit: fn(&mut CausewayConfig)) {
        let mut config = CausewayConfig::default();
        edit(&mut config);

        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn test_single_replica_deployment_is_valid() {
        let mut config = CausewayConfig::default();
        config.cluster.replicas = 1;
        config.frontend.write_replicas = 1;

        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_path_resolution() {
        let mut config = CausewayConfig::default();
        config.catalog.items = Some(PathBuf::from("data/movies.csv"));
        config.catalog.ratings = Some(PathBuf::from("/srv/ratings.csv"));
        config.resolve_paths("/home/user/project");

        assert_eq!(
            config.catalog.paths(),
            Some((
                Path::new("/home/user/project/data/movies.csv"),
                Path::new("/srv/ratings.csv"),
            ))
        );
    }

    #[test]
    fn test_rendered_config_parses_back() {
        let mut config = CausewayConfig::default();
        config.gossip.period_ms = 250;

        let rendered = config.to_toml().unwrap();
        let parsed: CausewayConfig = toml::from_str(&rendered).unwrap();

        assert_eq!(parsed, config);
    }
}
