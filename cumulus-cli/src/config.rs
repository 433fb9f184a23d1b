//! Configuration management for the CLI.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

use cumulus_common::LogFormat;
use cumulus_compute::{
    Properties, PROPERTY_MAX_PARALLEL, PROPERTY_NODE_STORE_PATH, PROPERTY_NODE_TIMEOUT_SECS,
};

use crate::cli::Args;

/// Default configuration file location.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/cumulus/cumulus.yaml";

/// Main configuration structure.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Log level or filter directive
    pub log_level: String,
    /// Log output format
    pub log_format: LogFormat,
    /// Provider account
    pub provider: ProviderConfig,
    /// Bulk operation settings
    pub compute: ComputeConfig,
    /// Node store settings
    pub node_store: NodeStoreConfig,
    /// Extra context properties passed through unchanged
    pub properties: BTreeMap<String, String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            provider: ProviderConfig::default(),
            compute: ComputeConfig::default(),
            node_store: NodeStoreConfig::default(),
            properties: BTreeMap::new(),
        }
    }
}

impl Config {
    /// Load configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(anyhow::anyhow!("Config file not found: {}", path.display()));
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = serde_yaml::from_str(&content)
            .with_context(|| "Failed to parse config file")?;

        Ok(config)
    }

    /// Apply CLI argument overrides to the configuration.
    pub fn with_cli_overrides(mut self, args: &Args) -> Result<Self> {
        if let Some(ref level) = args.log_level {
            self.log_level = level.clone();
        }

        if let Some(ref format) = args.log_format {
            self.log_format = format.parse()?;
        }

        if let Some(max_parallel) = args.max_parallel {
            self.compute.max_parallel = max_parallel;
        }

        if let Some(ref path) = args.node_store {
            self.node_store.path = Some(path.clone());
        }

        Ok(self)
    }

    /// Check the configuration for values the context would reject.
    pub fn validate(&self) -> Result<()> {
        if self.provider.identity.trim().is_empty() {
            anyhow::bail!("provider.identity must not be empty");
        }
        if self.provider.credential.trim().is_empty() {
            anyhow::bail!("provider.credential must not be empty");
        }
        if self.compute.max_parallel == 0 {
            anyhow::bail!("compute.max_parallel must be at least 1");
        }
        if self.compute.node_timeout_secs == 0 {
            anyhow::bail!("compute.node_timeout_secs must be at least 1");
        }
        Ok(())
    }

    /// Context properties for this configuration.
    ///
    /// Typed settings win over keys of the same name in `properties`.
    pub fn to_properties(&self) -> Properties {
        let mut properties: Properties = self.properties.clone().into_iter().collect();

        properties.set("mock.identity", self.provider.identity.as_str());
        properties.set("mock.credential", self.provider.credential.as_str());
        if let Some(ref endpoint) = self.provider.endpoint {
            properties.set("mock.endpoint", endpoint.as_str());
        }

        properties.set(PROPERTY_MAX_PARALLEL, self.compute.max_parallel.to_string());
        properties.set(PROPERTY_NODE_TIMEOUT_SECS, self.compute.node_timeout_secs.to_string());
        if let Some(ref path) = self.node_store.path {
            properties.set(PROPERTY_NODE_STORE_PATH, path.as_str());
        }

        properties
    }
}

/// Provider account configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Account identity
    pub identity: String,
    /// Account secret
    pub credential: String,
    /// API endpoint (provider default if not set)
    pub endpoint: Option<String>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            identity: "demo".to_string(),
            credential: "demo".to_string(),
            endpoint: None,
        }
    }
}

/// Bulk operation configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ComputeConfig {
    /// Concurrent provider calls per bulk operation
    pub max_parallel: usize,
    /// Per-node creation timeout in seconds
    pub node_timeout_secs: u64,
}

impl Default for ComputeConfig {
    fn default() -> Self {
        Self {
            max_parallel: 4,
            node_timeout_secs: 300,
        }
    }
}

/// Node store configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NodeStoreConfig {
    /// YAML file to record nodes in (in-memory if not set)
    pub path: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Command;
    use std::io::Write;

    fn args() -> Args {
        Args {
            config: None,
            log_level: None,
            log_format: None,
            max_parallel: None,
            node_store: None,
            command: Command::Locations,
        }
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_load_yaml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
log_level: debug
log_format: json
provider:
  identity: admin
  credential: s3cret
  endpoint: http://localhost:8080/client/api
compute:
  max_parallel: 8
node_store:
  path: /var/lib/cumulus/nodes.yaml
properties:
  mock.region: eu
"#
        )
        .unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.compute.max_parallel, 8);
        assert_eq!(config.compute.node_timeout_secs, 300);
        assert!(config.validate().is_ok());

        let properties = config.to_properties();
        assert_eq!(properties.get("mock.identity"), Some("admin"));
        assert_eq!(properties.get("mock.region"), Some("eu"));
        assert_eq!(properties.get(PROPERTY_MAX_PARALLEL), Some("8"));
        assert_eq!(
            properties.get(PROPERTY_NODE_STORE_PATH),
            Some("/var/lib/cumulus/nodes.yaml")
        );
    }

    #[test]
    fn test_missing_file() {
        assert!(Config::load("/nonexistent/cumulus.yaml").is_err());
    }

    #[test]
    fn test_cli_overrides() {
        let mut args = args();
        args.log_format = Some("json".to_string());
        args.max_parallel = Some(0);

        let config = Config::default().with_cli_overrides(&args).unwrap();
        assert_eq!(config.log_format, LogFormat::Json);
        assert!(config.validate().is_err());

        args.log_format = Some("xml".to_string());
        assert!(Config::default().with_cli_overrides(&args).is_err());
    }
}
