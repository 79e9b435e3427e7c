//! Configuration loading for Cachet.
//!
//! The cache set is fixed by the configuration file. Everything except the
//! cache list has a default.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;
use crate::schema::DEFAULT_CONTAINER_NAME;
use crate::value::MEMBER_SEPARATOR;

/// Default cap on values returned by one filtered get.
pub const DEFAULT_MAX_RESULTS: usize = 100;

/// Environment variable naming the configuration file.
pub const CONFIG_ENV_VAR: &str = "CACHET_CONFIG";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CachetConfig {
    #[serde(default = "default_namespace")]
    pub namespace: String,
    #[serde(default = "default_container_name")]
    pub container_name: String,
    #[serde(default = "default_max_results")]
    pub max_results: usize,
    #[serde(default = "default_start_timeout_ms")]
    pub start_timeout_ms: u64,
    #[serde(default = "default_operation_timeout_ms")]
    pub operation_timeout_ms: u64,
    pub caches: Vec<CacheDefinition>,
}

/// One configured cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheDefinition {
    pub name: String,
    #[serde(flatten)]
    pub storage: CacheStorage,
}

/// Where a cache keeps its entries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "storage", rename_all = "lowercase")]
pub enum CacheStorage {
    /// Process memory only.
    Memory,
    /// Memory, written through to an LMDB environment at `path`.
    Lmdb { path: PathBuf, max_size_mb: usize },
}

fn default_namespace() -> String {
    "Cachet".to_string()
}

fn default_container_name() -> String {
    DEFAULT_CONTAINER_NAME.to_string()
}

fn default_max_results() -> usize {
    DEFAULT_MAX_RESULTS
}

fn default_start_timeout_ms() -> u64 {
    30_000
}

fn default_operation_timeout_ms() -> u64 {
    5_000
}

impl CachetConfig {
    /// Locate, read and validate the configuration.
    pub fn load() -> Result<Self, ConfigError> {
        let path = config_path_from_args().or_else(config_path_from_env);
        let path = path.ok_or(ConfigError::MissingConfigPath)?;
        let config = Self::from_path(&path)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        toml::from_str(contents).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// An in-memory configuration for the given cache names.
    pub fn in_memory<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            namespace: default_namespace(),
            container_name: default_container_name(),
            max_results: DEFAULT_MAX_RESULTS,
            start_timeout_ms: default_start_timeout_ms(),
            operation_timeout_ms: default_operation_timeout_ms(),
            caches: names
                .into_iter()
                .map(|name| CacheDefinition {
                    name: name.into(),
                    storage: CacheStorage::Memory,
                })
                .collect(),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.namespace.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "namespace".to_string(),
                reason: "must not be empty".to_string(),
            });
        }
        if self.max_results == 0 {
            return Err(ConfigError::InvalidValue {
                field: "max_results".to_string(),
                reason: "must be > 0".to_string(),
            });
        }
        if self.start_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "start_timeout_ms".to_string(),
                reason: "must be > 0".to_string(),
            });
        }
        if self.operation_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "operation_timeout_ms".to_string(),
                reason: "must be > 0".to_string(),
            });
        }

        let mut seen = BTreeSet::new();
        for (idx, cache) in self.caches.iter().enumerate() {
            let field = format!("caches[{}].name", idx);
            if cache.name.trim().is_empty() {
                return Err(ConfigError::InvalidValue {
                    field,
                    reason: "must not be empty".to_string(),
                });
            }
            if cache.name.contains(MEMBER_SEPARATOR) || cache.name.contains('(') {
                return Err(ConfigError::InvalidValue {
                    field,
                    reason: format!("'{}' must not contain '/' or '('", cache.name),
                });
            }
            if !seen.insert(cache.name.as_str()) {
                return Err(ConfigError::InvalidValue {
                    field,
                    reason: format!("duplicate cache name '{}'", cache.name),
                });
            }
            if let CacheStorage::Lmdb { path, max_size_mb } = &cache.storage {
                if path.as_os_str().is_empty() {
                    return Err(ConfigError::InvalidValue {
                        field: format!("caches[{}].path", idx),
                        reason: "must not be empty".to_string(),
                    });
                }
                if *max_size_mb == 0 {
                    return Err(ConfigError::InvalidValue {
                        field: format!("caches[{}].max_size_mb", idx),
                        reason: "must be > 0".to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Configured cache names, sorted.
    pub fn cache_names(&self) -> BTreeSet<String> {
        self.caches.iter().map(|c| c.name.clone()).collect()
    }
}

fn config_path_from_env() -> Option<PathBuf> {
    std::env::var(CONFIG_ENV_VAR).ok().map(PathBuf::from)
}

fn config_path_from_args() -> Option<PathBuf> {
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--config" {
            return args.next().map(PathBuf::from);
        }
    }
    None
}
