// SPDX-License-Identifier: AGPL-3.0-only

//! Harness configuration file.
//!
//! One YAML document holds the model contract (shareable with the training
//! side) plus host-only transport and output settings:
//!
//! ```yaml
//! contract:
//!   input_width: 10
//!   threshold: 0.5
//!   byte_order: little
//!   framing: raw
//! transport:
//!   host: 127.0.0.1
//!   port: 12345
//!   timeout_ms: 1000
//! output:
//!   prediction_file: pred.txt
//! ```

use crate::error::{HarnessError, Result};
use crate::transport::TransportConfig;
use finn_wire::{ContractError, ModelContract};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Root configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HarnessConfig {
    /// Shared model contract
    pub contract: ModelContract,

    /// Remote endpoint settings
    #[serde(default)]
    pub transport: TransportSettings,

    /// Result persistence settings
    #[serde(default)]
    pub output: OutputSettings,
}

/// Remote endpoint settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportSettings {
    /// Peer host name or address
    #[serde(default = "default_host")]
    pub host: String,
    /// Peer UDP port
    #[serde(default = "default_port")]
    pub port: u16,
    /// Reply wait bound in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Local bind address (`ip:port`), ephemeral when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bind: Option<String>,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    12345
}

fn default_timeout_ms() -> u64 {
    1000
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            timeout_ms: default_timeout_ms(),
            bind: None,
        }
    }
}

impl TransportSettings {
    /// Resolve into a validated transport configuration
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the host does not resolve, the bind
    /// address does not parse, or the result fails validation.
    pub fn resolve(&self) -> Result<TransportConfig> {
        let mut config = TransportConfig::resolve(
            &self.host,
            self.port,
            Duration::from_millis(self.timeout_ms),
        )?;
        if let Some(bind) = &self.bind {
            let addr: SocketAddr = bind.parse().map_err(|e| {
                HarnessError::configuration(format!("invalid bind address {bind:?}: {e}"))
            })?;
            config = config.with_bind(addr);
        }
        config.validate()?;
        Ok(config)
    }
}

/// Result persistence settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputSettings {
    /// File receiving the local label, overwritten each round
    #[serde(default = "default_prediction_file")]
    pub prediction_file: Option<PathBuf>,
}

#[allow(clippy::unnecessary_wraps)]
fn default_prediction_file() -> Option<PathBuf> {
    Some(PathBuf::from("pred.txt"))
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            prediction_file: default_prediction_file(),
        }
    }
}

impl HarnessConfig {
    /// Configuration with default transport and output settings
    pub fn new(contract: ModelContract) -> Self {
        Self {
            contract,
            transport: TransportSettings::default(),
            output: OutputSettings::default(),
        }
    }

    /// Load configuration from a YAML file
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read, does not parse, or the
    /// contract is invalid.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents =
            std::fs::read_to_string(path).map_err(|source| HarnessError::ConfigFile {
                path: path.to_path_buf(),
                source,
            })?;
        Self::from_yaml(&contents)
    }

    /// Load configuration from a YAML string
    ///
    /// # Errors
    ///
    /// Returns error if the document does not parse or the contract is invalid.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml).map_err(ContractError::from)?;
        config.contract.validate()?;
        Ok(config)
    }

    /// Render as YAML
    ///
    /// # Errors
    ///
    /// Returns error if serialization fails.
    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self).map_err(ContractError::from)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use finn_wire::{ByteOrder, Framing};

    #[test]
    fn contract_only_takes_reference_defaults() {
        let c = HarnessConfig::from_yaml("contract:\n  input_width: 10\n  byte_order: native\n")
            .unwrap();
        assert_eq!(c.transport.host, "127.0.0.1");
        assert_eq!(c.transport.port, 12345);
        assert_eq!(c.transport.timeout_ms, 1000);
        assert_eq!(c.output.prediction_file, Some(PathBuf::from("pred.txt")));
        let t = c.transport.resolve().unwrap();
        assert_eq!(t.timeout, Duration::from_secs(1));
    }

    #[test]
    fn full_document() {
        let yaml = "\
contract:
  input_width: 4
  threshold: 0.7
  byte_order: big
  framing: correlated
transport:
  host: 127.0.0.1
  port: 4000
  timeout_ms: 250
  bind: 127.0.0.1:0
output:
  prediction_file: null
";
        let c = HarnessConfig::from_yaml(yaml).unwrap();
        assert_eq!(c.contract.byte_order, ByteOrder::Big);
        assert_eq!(c.contract.framing, Framing::Correlated);
        assert_eq!(c.output.prediction_file, None);
        let t = c.transport.resolve().unwrap();
        assert_eq!(t.bind, "127.0.0.1:0".parse().unwrap());
        assert_eq!(t.timeout, Duration::from_millis(250));
    }

    #[test]
    fn zero_timeout_is_configuration_error() {
        let mut c = HarnessConfig::new(ModelContract::new(1, ByteOrder::Little));
        c.transport.timeout_ms = 0;
        assert!(c.transport.resolve().is_err());
    }

    #[test]
    fn bad_bind_is_configuration_error() {
        let mut c = HarnessConfig::new(ModelContract::new(1, ByteOrder::Little));
        c.transport.bind = Some("not-an-address".to_string());
        let err = c.transport.resolve().unwrap_err();
        assert!(err.to_string().contains("invalid bind address"));
    }

    #[test]
    fn yaml_survives_rendering() {
        let c = HarnessConfig::new(ModelContract::new(3, ByteOrder::Little).with_threshold(0.25));
        let back = HarnessConfig::from_yaml(&c.to_yaml().unwrap()).unwrap();
        assert_eq!(back, c);
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("harness.yaml");
        std::fs::write(&path, "contract:\n  input_width: 2\n  byte_order: little\n").unwrap();
        assert_eq!(HarnessConfig::load(&path).unwrap().contract.input_width, 2);
        assert!(HarnessConfig::load(dir.path().join("missing.yaml")).is_err());
    }

    #[test]
    fn missing_file_names_config() {
        let err = HarnessConfig::load("/nonexistent/finn.yaml").unwrap_err();
        assert!(matches!(err, HarnessError::ConfigFile { .. }), "{err}");
        assert_eq!(err.stage(), crate::error::Stage::Configuration);
        let msg = err.to_string();
        assert!(msg.starts_with("failed to read config /nonexistent/finn.yaml"), "{msg}");
        assert!(!msg.contains("contract"));
    }
}
