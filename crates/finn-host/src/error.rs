// SPDX-License-Identifier: AGPL-3.0-only

//! Error types for harness operations

use finn_wire::{ContractError, FormatError};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for harness operations
pub type Result<T> = std::result::Result<T, HarnessError>;

/// Round stage an error was raised in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Startup or pre-send validation
    Configuration,
    /// Drawing an input vector
    Sample,
    /// Local inference
    Inference,
    /// Socket bind / send / receive
    Transport,
    /// Reply decoding
    Decode,
    /// Persisting or reporting results
    Sink,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Configuration => "configuration",
            Self::Sample => "sample",
            Self::Inference => "inference",
            Self::Transport => "transport",
            Self::Decode => "decode",
            Self::Sink => "sink",
        };
        f.write_str(name)
    }
}

/// Errors that can occur during a verification round
///
/// A reply timeout is not an error: it surfaces as an absent remote label.
#[derive(Debug, Error)]
pub enum HarnessError {
    /// Width, threshold or address configuration is inconsistent
    #[error("configuration error: {reason}")]
    Configuration {
        /// Reason for failure
        reason: String,
    },

    /// Harness configuration file could not be read
    #[error("failed to read config {path}: {source}")]
    ConfigFile {
        /// Path that was attempted
        path: PathBuf,
        /// Underlying I/O error
        source: std::io::Error,
    },

    /// Model contract could not be loaded or is invalid
    #[error("contract error: {0}")]
    Contract(#[from] ContractError),

    /// Sample source could not produce an input
    #[error("sample source failed: {reason}")]
    Sample {
        /// Reason for failure
        reason: String,
    },

    /// Local inference engine failed
    #[error("inference failed: {reason}")]
    Inference {
        /// Reason for failure
        reason: String,
    },

    /// Channel-level failure (bind, send, receive)
    #[error("transport {op} failed: {source}")]
    Transport {
        /// Socket operation that failed
        op: &'static str,
        /// Underlying I/O error
        source: std::io::Error,
    },

    /// Reply could not be decoded
    #[error("malformed reply: {0}")]
    Format(#[from] FormatError),

    /// Result sink could not persist or report
    #[error("failed to write {path}: {source}")]
    Sink {
        /// Destination that failed
        path: PathBuf,
        /// Underlying I/O error
        source: std::io::Error,
    },
}

impl HarnessError {
    /// Create a configuration error
    pub fn configuration(reason: impl Into<String>) -> Self {
        Self::Configuration {
            reason: reason.into(),
        }
    }

    /// Create a sample source error
    pub fn sample(reason: impl Into<String>) -> Self {
        Self::Sample {
            reason: reason.into(),
        }
    }

    /// Create an inference error
    pub fn inference(reason: impl Into<String>) -> Self {
        Self::Inference {
            reason: reason.into(),
        }
    }

    /// Create a transport error for a socket operation
    pub fn transport(op: &'static str, source: std::io::Error) -> Self {
        Self::Transport { op, source }
    }

    /// Create a sink error
    pub fn sink(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Sink {
            path: path.into(),
            source,
        }
    }

    /// Stage this error belongs to
    pub const fn stage(&self) -> Stage {
        match self {
            Self::Configuration { .. } | Self::ConfigFile { .. } | Self::Contract(_) => {
                Stage::Configuration
            }
            Self::Sample { .. } => Stage::Sample,
            Self::Inference { .. } => Stage::Inference,
            Self::Transport { .. } => Stage::Transport,
            Self::Format(_) => Stage::Decode,
            Self::Sink { .. } => Stage::Sink,
        }
    }
}
