//! Configuration file support for sfc-orchagent
//!
//! Loads and validates the agent configuration from TOML.
//! Default location: /etc/sfc/sfc-orchagent.toml

use crate::sfc::{ParameterMap, ParameterPolicy, ResourceKind, SfcOrchConfig, SupportedParameter};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::warn;
use uuid::Uuid;

pub const DEFAULT_CONFIG_PATH: &str = "/etc/sfc/sfc-orchagent.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {}: {message}", .path.display())]
    Parse { path: PathBuf, message: String },

    #[error("Invalid configuration for {field}: {message}")]
    Invalid { field: String, message: String },

    #[error("Unknown driver: {0}")]
    UnknownDriver(String),
}

/// Per-tenant resource quotas; a negative value means unlimited.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaConfig {
    #[serde(default = "default_port_chain_quota")]
    pub port_chain: i64,

    #[serde(default = "default_port_pair_group_quota")]
    pub port_pair_group: i64,

    #[serde(default = "default_port_pair_quota")]
    pub port_pair: i64,
}

impl QuotaConfig {
    /// Limit for `kind`, or `None` when unlimited.
    pub fn limit(&self, kind: ResourceKind) -> Option<usize> {
        let raw = match kind {
            ResourceKind::PortChain => self.port_chain,
            ResourceKind::PortPairGroup => self.port_pair_group,
            ResourceKind::PortPair => self.port_pair,
        };
        usize::try_from(raw).ok()
    }

    pub fn unlimited() -> Self {
        Self {
            port_chain: -1,
            port_pair_group: -1,
            port_pair: -1,
        }
    }
}

/// Whitelist and defaults for one parameter map.
///
/// ```toml
/// [[parameters.chain.supported]]
/// key = "correlation"
/// value = "mpls"
/// ```
///
/// An omitted `value` is the null value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterConfig {
    #[serde(default)]
    pub supported: Vec<SupportedParameter>,

    #[serde(default)]
    pub defaults: Vec<SupportedParameter>,
}

impl ParameterConfig {
    pub fn policy(&self) -> ParameterPolicy {
        let defaults: ParameterMap = self
            .defaults
            .iter()
            .map(|p| (p.key.clone(), p.value.clone()))
            .collect();
        ParameterPolicy::new(self.supported.clone(), defaults)
    }

    fn validate(&self, field: &str) -> Result<(), ConfigError> {
        let policy = self.policy();
        for default in &self.defaults {
            if !policy.is_supported(&default.key, &default.value) {
                return Err(ConfigError::Invalid {
                    field: format!("parameters.{}.defaults", field),
                    message: format!(
                        "default ({}, {}) is not in the supported set",
                        default.key,
                        default.value.as_deref().unwrap_or("None")
                    ),
                });
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParametersConfig {
    #[serde(default = "default_chain_parameters")]
    pub chain: ParameterConfig,

    #[serde(default = "default_service_function_parameters")]
    pub service_function: ParameterConfig,
}

/// Backend drivers, invoked in the listed order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriverConfig {
    #[serde(default = "default_driver_names")]
    pub names: Vec<String>,

    /// Per-call timeout in milliseconds; 0 disables it.
    #[serde(default)]
    pub call_timeout_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortEntry {
    pub id: Uuid,
    #[serde(default)]
    pub host: Option<String>,
}

/// Ports and flow classifiers known to the agent when no network service is attached.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryConfig {
    #[serde(default)]
    pub ports: Vec<PortEntry>,

    #[serde(default)]
    pub flow_classifiers: Vec<Uuid>,
}

/// Complete sfc-orchagent configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SfcConfig {
    #[serde(default)]
    pub quotas: QuotaConfig,

    #[serde(default)]
    pub parameters: ParametersConfig,

    #[serde(default)]
    pub drivers: DriverConfig,

    #[serde(default)]
    pub inventory: InventoryConfig,
}

fn default_port_chain_quota() -> i64 {
    10
}

fn default_port_pair_group_quota() -> i64 {
    10
}

fn default_port_pair_quota() -> i64 {
    100
}

fn default_chain_parameters() -> ParameterConfig {
    ParameterConfig {
        supported: vec![SupportedParameter::new("correlation", Some("mpls"))],
        defaults: vec![SupportedParameter::new("correlation", Some("mpls"))],
    }
}

fn default_service_function_parameters() -> ParameterConfig {
    ParameterConfig {
        supported: vec![SupportedParameter::new("correlation", None)],
        defaults: vec![SupportedParameter::new("correlation", None)],
    }
}

fn default_driver_names() -> Vec<String> {
    vec!["logging".to_string()]
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            port_chain: default_port_chain_quota(),
            port_pair_group: default_port_pair_group_quota(),
            port_pair: default_port_pair_quota(),
        }
    }
}

impl Default for ParametersConfig {
    fn default() -> Self {
        Self {
            chain: default_chain_parameters(),
            service_function: default_service_function_parameters(),
        }
    }
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            names: default_driver_names(),
            call_timeout_ms: 0,
        }
    }
}

impl SfcConfig {
    /// Load configuration from file, falling back to defaults if file not found
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        match fs::read_to_string(path) {
            Ok(content) => Self::from_toml_str(&content).map_err(|message| ConfigError::Parse {
                path: path.to_path_buf(),
                message,
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(path = %path.display(), "Config file not found, using defaults");
                Ok(Self::default())
            }
            Err(source) => Err(ConfigError::Io {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    pub fn from_toml_str(content: &str) -> Result<Self, String> {
        toml::from_str(content).map_err(|e| e.to_string())
    }

    /// Driver call timeout, if enabled.
    pub fn call_timeout(&self) -> Option<Duration> {
        match self.drivers.call_timeout_ms {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        }
    }

    /// Orchestrator settings derived from this configuration.
    pub fn orch_config(&self) -> SfcOrchConfig {
        SfcOrchConfig {
            quotas: self.quotas.clone(),
            chain_parameters: self.parameters.chain.policy(),
            service_function_parameters: self.parameters.service_function.policy(),
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.parameters.chain.validate("chain")?;
        self.parameters.service_function.validate("service_function")?;

        if self.drivers.names.iter().any(|n| n.trim().is_empty()) {
            return Err(ConfigError::Invalid {
                field: "drivers.names".to_string(),
                message: "driver name must not be empty".to_string(),
            });
        }

        let mut seen = HashSet::new();
        for port in &self.inventory.ports {
            if !seen.insert(port.id) {
                return Err(ConfigError::Invalid {
                    field: "inventory.ports".to_string(),
                    message: format!("duplicate port {}", port.id),
                });
            }
        }

        Ok(())
    }
}
