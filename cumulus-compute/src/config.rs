//! Context properties and orchestration settings.

use std::collections::BTreeMap;
use std::time::Duration;

use crate::error::{ComputeError, Result};

/// Maximum number of node attempts (and destroys) in flight at once.
pub const PROPERTY_MAX_PARALLEL: &str = "cumulus.compute.max-parallel";

/// Seconds a single node creation may take before it counts as failed.
pub const PROPERTY_NODE_TIMEOUT_SECS: &str = "cumulus.compute.node-timeout-secs";

/// Path of the YAML file backing the default node store.
pub const PROPERTY_NODE_STORE_PATH: &str = "cumulus.node-store.path";

const DEFAULT_MAX_PARALLEL: usize = 4;
const DEFAULT_NODE_TIMEOUT_SECS: u64 = 300;

/// String property bag a context is built from.
///
/// Holds provider credentials and endpoint settings next to the
/// `cumulus.*` keys above.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Properties(BTreeMap<String, String>);

impl Properties {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Get a required, non-empty value.
    pub fn require(&self, key: &str) -> Result<&str> {
        match self.get(key) {
            Some(value) if !value.trim().is_empty() => Ok(value),
            _ => Err(ComputeError::InvalidConfig(format!("Missing property: {}", key))),
        }
    }

    /// Parse a value, `None` when absent.
    pub fn parse<T>(&self, key: &str) -> Result<Option<T>>
    where
        T: std::str::FromStr,
        T::Err: std::fmt::Display,
    {
        self.get(key)
            .map(|raw| {
                raw.trim().parse::<T>().map_err(|e| {
                    ComputeError::InvalidConfig(format!("Invalid value for {}: {}", key, e))
                })
            })
            .transpose()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Properties {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// Knobs for bulk creation and reclamation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrchestratorSettings {
    /// Concurrent provider calls per bulk operation
    pub max_parallel: usize,
    /// Per-node creation timeout
    pub node_timeout: Duration,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            max_parallel: DEFAULT_MAX_PARALLEL,
            node_timeout: Duration::from_secs(DEFAULT_NODE_TIMEOUT_SECS),
        }
    }
}

impl OrchestratorSettings {
    /// Read settings from properties, keeping defaults for absent keys.
    pub fn from_properties(properties: &Properties) -> Result<Self> {
        let mut settings = Self::default();

        if let Some(max_parallel) = properties.parse::<usize>(PROPERTY_MAX_PARALLEL)? {
            if max_parallel == 0 {
                return Err(ComputeError::InvalidConfig(format!(
                    "{} must be at least 1",
                    PROPERTY_MAX_PARALLEL
                )));
            }
            settings.max_parallel = max_parallel;
        }

        if let Some(secs) = properties.parse::<u64>(PROPERTY_NODE_TIMEOUT_SECS)? {
            if secs == 0 {
                return Err(ComputeError::InvalidConfig(format!(
                    "{} must be at least 1",
                    PROPERTY_NODE_TIMEOUT_SECS
                )));
            }
            settings.node_timeout = Duration::from_secs(secs);
        }

        Ok(settings)
    }
}
