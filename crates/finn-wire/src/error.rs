// SPDX-License-Identifier: AGPL-3.0-only

//! Error types for contract loading and datagram decoding

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while decoding a datagram
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormatError {
    /// Datagram shorter than the minimum decodable length
    #[error("datagram too short: {len} bytes < {min}")]
    TooShort {
        /// Received length in bytes
        len: usize,
        /// Minimum decodable length in bytes
        min: usize,
    },

    /// Request payload does not carry exactly the contracted number of values
    #[error("payload width mismatch: got {got} bytes, expected {expected}")]
    WidthMismatch {
        /// Received payload length in bytes
        got: usize,
        /// Expected payload length in bytes
        expected: usize,
    },
}

/// Errors raised while loading or validating a model contract
#[derive(Debug, Error)]
pub enum ContractError {
    /// Contract file could not be read
    #[error("failed to read contract {path}: {source}")]
    Io {
        /// Path that was attempted
        path: PathBuf,
        /// Underlying I/O error
        source: std::io::Error,
    },

    /// Contract document is not valid YAML for the schema
    #[error("failed to parse contract: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Contract parsed but violates an invariant
    #[error("invalid contract: {reason}")]
    Invalid {
        /// Reason for rejection
        reason: String,
    },
}

impl ContractError {
    /// Create an invalid contract error
    pub fn invalid(reason: impl Into<String>) -> Self {
        Self::Invalid {
            reason: reason.into(),
        }
    }
}
