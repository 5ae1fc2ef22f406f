//! Configuration types for sparsecube
//!
//! Every section is optional in a config file; missing fields fall back to
//! the `Default` values below.

use serde::{Deserialize, Serialize};

/// Root configuration
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Container behaviour
    #[serde(default)]
    pub store: StoreConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Behaviour of a `DataStructure`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Link every new data object to the most recently added metadata record
    #[serde(default = "default_add_meta_auto")]
    pub add_meta_auto: bool,
    /// Number of memoised value slices kept before the cache is flushed
    #[serde(default = "default_max_cached_slices")]
    pub max_cached_slices: usize,
    /// Prefix for auto-generated axis names (`axis_0`, `axis_1`, ...)
    #[serde(default = "default_axis_name_prefix")]
    pub axis_name_prefix: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            add_meta_auto: default_add_meta_auto(),
            max_cached_slices: default_max_cached_slices(),
            axis_name_prefix: default_axis_name_prefix(),
        }
    }
}

impl StoreConfig {
    /// Name given to axis `i` before the loader sets a real one
    #[must_use]
    pub fn axis_name(&self, i: usize) -> String {
        format!("{}{i}", self.axis_name_prefix)
    }
}

/// Logging configuration
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

const fn default_add_meta_auto() -> bool {
    true
}

const fn default_max_cached_slices() -> usize {
    64
}

fn default_axis_name_prefix() -> String {
    "axis_".to_string()
}

fn default_log_level() -> String {
    "warn".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.store.add_meta_auto);
        assert_eq!(config.store.max_cached_slices, 64);
        assert_eq!(config.store.axis_name(2), "axis_2");
        assert_eq!(config.logging.level, "warn");
    }

    #[test]
    fn test_partial_toml() {
        let config: Config = toml::from_str(
            r#"
            [store]
            add_meta_auto = false
            "#,
        )
        .unwrap();
        assert!(!config.store.add_meta_auto);
        assert_eq!(config.store.max_cached_slices, 64);
        assert_eq!(config.logging, LoggingConfig::default());
    }
}
