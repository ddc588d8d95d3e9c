//! Configuration loading and validation
//!
//! Every section is optional; a missing file section takes its defaults.
//!
//! # Example Config
//!
//! ```toml
//! kinds = ["deployments", "pods", "nodes"]
//!
//! [store]
//! url = "ws://127.0.0.1:8000"
//! namespace = "cluster"
//! database = "mirror"
//! username = "root"
//! password = "root"
//!
//! [registry]
//! poll_interval_ms = 1000
//!
//! [consistency]
//! enabled = true
//! interval_secs = 1800
//!
//! [health]
//! interval_secs = 10
//! max_failures = 3
//! ```

use std::path::Path;
use std::time::Duration;

use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::kind::ResourceKind;
use crate::result::Result;

// ═══════════════════════════════════════════════════════════════════════════
// CONFIGURATION STRUCTURES
// ═══════════════════════════════════════════════════════════════════════════

/// Top-level mirror configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct MirrorConfig {
    pub store: StoreSettings,
    pub registry: RegistrySettings,
    pub consistency: ConsistencySettings,
    pub health: HealthSettings,
    /// Kinds to mirror. Empty means every supported kind.
    pub kinds: Vec<String>,
}

/// Where the mirror tables live.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct StoreSettings {
    /// Engine URL: `mem://`, `ws://host:port` or `rocksdb://path`.
    pub url: String,
    pub namespace: String,
    pub database: String,
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RegistrySettings {
    /// How often the supervisor polls controller liveness.
    pub poll_interval_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ConsistencySettings {
    pub enabled: bool,
    pub interval_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct HealthSettings {
    pub interval_secs: u64,
    /// Consecutive failed pings before the process gives up.
    pub max_failures: u32,
}

// ═══════════════════════════════════════════════════════════════════════════
// DEFAULT IMPLEMENTATIONS
// ═══════════════════════════════════════════════════════════════════════════

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            url: "mem://".to_string(),
            namespace: "cluster".to_string(),
            database: "mirror".to_string(),
            username: None,
            password: None,
        }
    }
}

impl Default for RegistrySettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: 1000,
        }
    }
}

impl Default for ConsistencySettings {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 30 * 60,
        }
    }
}

impl Default for HealthSettings {
    fn default() -> Self {
        Self {
            interval_secs: 10,
            max_failures: 3,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// LOADING
// ═══════════════════════════════════════════════════════════════════════════

impl MirrorConfig {
    /// Load and validate configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML is malformed
    /// - Values fail validation
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::config_read_failed(path, e.to_string()))?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns error if the TOML is malformed or values fail validation.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(content).map_err(|e| Error::toml_parse_failed(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges and kind names.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidConfig` for zero intervals or thresholds,
    /// half-specified credentials, and unknown kinds.
    pub fn validate(&self) -> Result<()> {
        if self.store.url.trim().is_empty() {
            return Err(Error::invalid_config("store.url must not be empty"));
        }
        if self.store.username.is_some() != self.store.password.is_some() {
            return Err(Error::invalid_config(
                "store.username and store.password must be set together",
            ));
        }
        if self.registry.poll_interval_ms == 0 {
            return Err(Error::invalid_config("registry.poll_interval_ms must be > 0"));
        }
        if self.consistency.interval_secs == 0 {
            return Err(Error::invalid_config("consistency.interval_secs must be > 0"));
        }
        if self.health.interval_secs == 0 {
            return Err(Error::invalid_config("health.interval_secs must be > 0"));
        }
        if self.health.max_failures == 0 {
            return Err(Error::invalid_config("health.max_failures must be > 0"));
        }
        self.resolved_kinds()
            .map(|_| ())
            .map_err(|e| Error::invalid_config(e.to_string()))
    }

    /// Kinds to mirror, deduplicated, in start-up order.
    ///
    /// # Errors
    ///
    /// Returns `Error::UnknownKind` for the first name that is not a kind.
    pub fn resolved_kinds(&self) -> Result<Vec<ResourceKind>> {
        if self.kinds.is_empty() {
            return Ok(ResourceKind::ALL.to_vec());
        }
        let requested: Vec<ResourceKind> = self
            .kinds
            .iter()
            .map(|name| name.parse::<ResourceKind>())
            .collect::<Result<_>>()?;
        Ok(ResourceKind::ALL
            .into_iter()
            .filter(|kind| requested.contains(kind))
            .collect())
    }

    /// Replace the kind list with a comma-separated override.
    pub fn override_kinds(&mut self, list: &str) {
        self.kinds = list
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .unique()
            .collect();
    }

    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.registry.poll_interval_ms)
    }

    pub const fn consistency_interval(&self) -> Duration {
        Duration::from_secs(self.consistency.interval_secs)
    }

    pub const fn health_interval(&self) -> Duration {
        Duration::from_secs(self.health.interval_secs)
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_empty_config_uses_defaults() -> Result<()> {
        let config = MirrorConfig::from_toml_str("")?;
        assert_eq!(config, MirrorConfig::default());
        assert_eq!(config.store.url, "mem://");
        assert_eq!(config.poll_interval(), Duration::from_secs(1));
        assert_eq!(config.consistency_interval(), Duration::from_secs(1800));
        assert_eq!(config.health.max_failures, 3);
        assert_eq!(config.resolved_kinds()?.len(), ResourceKind::ALL.len());
        Ok(())
    }

    #[test]
    fn test_partial_section_keeps_other_defaults() -> Result<()> {
        let config = MirrorConfig::from_toml_str("[health]\nmax_failures = 5\n")?;
        assert_eq!(config.health.max_failures, 5);
        assert_eq!(config.health.interval_secs, 10);
        Ok(())
    }

    #[test]
    fn test_kinds_are_resolved_in_startup_order() -> Result<()> {
        let config = MirrorConfig::from_toml_str("kinds = [\"pods\", \"ns\", \"pods\"]")?;
        assert_eq!(
            config.resolved_kinds()?,
            vec![ResourceKind::Namespace, ResourceKind::Pod]
        );
        Ok(())
    }

    #[test]
    fn test_unknown_kind_is_invalid_config() {
        let result = MirrorConfig::from_toml_str("kinds = [\"widgets\"]");
        assert!(matches!(result, Err(Error::InvalidConfig { .. })));
    }

    #[test]
    fn test_zero_interval_is_rejected() {
        let result = MirrorConfig::from_toml_str("[registry]\npoll_interval_ms = 0\n");
        assert!(matches!(result, Err(Error::InvalidConfig { .. })));
    }

    #[test]
    fn test_half_credentials_rejected() {
        let result = MirrorConfig::from_toml_str("[store]\nusername = \"root\"\n");
        assert!(matches!(result, Err(Error::InvalidConfig { .. })));
    }

    #[test]
    fn test_malformed_toml() {
        let result = MirrorConfig::from_toml_str("kinds = [");
        assert!(matches!(result, Err(Error::TomlParseFailed { .. })));
    }

    #[test]
    fn test_override_kinds() -> Result<()> {
        let mut config = MirrorConfig::default();
        config.override_kinds("deploy, svc,,deploy");
        assert_eq!(config.kinds, vec!["deploy".to_string(), "svc".to_string()]);
        assert_eq!(
            config.resolved_kinds()?,
            vec![ResourceKind::Deployment, ResourceKind::Service]
        );
        Ok(())
    }

    #[test]
    fn test_load_from_file() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let mut file = tempfile::NamedTempFile::new()?;
        writeln!(file, "[store]\nurl = \"ws://db:8000\"\n\n[consistency]\nenabled = false")?;
        let config = MirrorConfig::load(file.path())?;
        assert_eq!(config.store.url, "ws://db:8000");
        assert!(!config.consistency.enabled);
        Ok(())
    }

    #[test]
    fn test_missing_file() {
        let result = MirrorConfig::load(Path::new("/nonexistent/mirror.toml"));
        assert!(matches!(result, Err(Error::ConfigReadFailed { .. })));
    }
}
