// SPDX-License-Identifier: AGPL-3.0-only

//! Model contract shared by the trainer, the host harness and the endpoint.
//!
//! Input width, output semantics (one scalar, thresholded) and the wire layout
//! are declared here once. The harness checks its engine and sample source
//! against the contract before any datagram leaves the host.
//!
//! ```yaml
//! input_width: 10
//! threshold: 0.5
//! byte_order: little
//! framing: raw
//! ```

use crate::codec::{ByteOrder, Framing, WireFormat, MAX_DATAGRAM_LEN};
use crate::error::ContractError;
use crate::label::Threshold;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Deployment contract between host and remote endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelContract {
    /// Number of f32 values per input vector
    pub input_width: usize,

    /// Decision threshold applied to the local confidence
    #[serde(default)]
    pub threshold: Threshold,

    /// Byte order of every numeric field on the wire (no default)
    pub byte_order: ByteOrder,

    /// Datagram framing
    #[serde(default)]
    pub framing: Framing,
}

impl ModelContract {
    /// Contract with the reference framing and threshold
    pub fn new(input_width: usize, byte_order: ByteOrder) -> Self {
        Self {
            input_width,
            threshold: Threshold::default(),
            byte_order,
            framing: Framing::Raw,
        }
    }

    /// Replace the decision threshold
    #[must_use]
    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.threshold = Threshold::new(threshold);
        self
    }

    /// Replace the framing
    #[must_use]
    pub fn with_framing(mut self, framing: Framing) -> Self {
        self.framing = framing;
        self
    }

    /// Load and validate a contract from a YAML file
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read, does not parse, or fails
    /// [`validate`](Self::validate).
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ContractError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ContractError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&contents)
    }

    /// Parse and validate a contract from a YAML string
    ///
    /// # Errors
    ///
    /// Returns error if the document does not parse or fails validation.
    pub fn from_yaml(yaml: &str) -> Result<Self, ContractError> {
        let contract: Self = serde_yaml::from_str(yaml)?;
        contract.validate()?;
        Ok(contract)
    }

    /// Check contract invariants
    ///
    /// # Errors
    ///
    /// Returns error if the width is zero or too large for one datagram, or
    /// the threshold is not finite.
    pub fn validate(&self) -> Result<(), ContractError> {
        if self.input_width == 0 {
            return Err(ContractError::invalid("input_width must be at least 1"));
        }
        match self.wire_format().checked_request_len(self.input_width) {
            Some(len) if len <= MAX_DATAGRAM_LEN => {}
            _ => {
                return Err(ContractError::invalid(format!(
                    "input_width {} does not fit one {:?} datagram ({MAX_DATAGRAM_LEN} bytes max)",
                    self.input_width, self.framing
                )));
            }
        }
        if !self.threshold.value().is_finite() {
            return Err(ContractError::invalid(format!(
                "threshold must be finite, got {}",
                self.threshold.value()
            )));
        }
        Ok(())
    }

    /// Codec view of this contract
    pub const fn wire_format(&self) -> WireFormat {
        WireFormat::new(self.byte_order, self.framing)
    }

    /// Request datagram length in bytes
    pub fn request_len(&self) -> usize {
        self.wire_format().request_len(self.input_width)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn minimal_yaml_takes_defaults() {
        let c = ModelContract::from_yaml("input_width: 10\nbyte_order: little\n").unwrap();
        assert_eq!(c.input_width, 10);
        assert_eq!(c.threshold, Threshold::new(0.5));
        assert_eq!(c.framing, Framing::Raw);
        assert_eq!(c.request_len(), 40);
    }

    #[test]
    fn byte_order_is_required() {
        let err = ModelContract::from_yaml("input_width: 10\n").unwrap_err();
        assert!(matches!(err, ContractError::Yaml(_)), "{err}");
    }

    #[test]
    fn zero_width_rejected() {
        let err = ModelContract::from_yaml("input_width: 0\nbyte_order: big\n").unwrap_err();
        assert!(matches!(err, ContractError::Invalid { .. }));
    }

    #[test]
    fn width_bounded_by_datagram_size() {
        let raw = ModelContract::new(16_376, ByteOrder::Little);
        assert!(raw.validate().is_ok());
        let err = ModelContract::new(16_377, ByteOrder::Little).validate().unwrap_err();
        assert!(matches!(err, ContractError::Invalid { .. }), "{err}");

        let correlated =
            ModelContract::new(16_374, ByteOrder::Big).with_framing(Framing::Correlated);
        assert!(correlated.validate().is_ok());
        let err = ModelContract::new(16_375, ByteOrder::Big)
            .with_framing(Framing::Correlated)
            .validate()
            .unwrap_err();
        assert!(matches!(err, ContractError::Invalid { .. }), "{err}");
    }

    #[test]
    fn overflowing_width_rejected() {
        assert!(ModelContract::new(usize::MAX, ByteOrder::Native).validate().is_err());
    }

    #[test]
    fn non_finite_threshold_rejected() {
        let c = ModelContract::new(4, ByteOrder::Little).with_threshold(f32::NAN);
        assert!(c.validate().is_err());
    }

    #[test]
    fn correlated_framing_widens_request() {
        let c = ModelContract::from_yaml(
            "input_width: 3\nbyte_order: native\nframing: correlated\nthreshold: 0.25\n",
        )
        .unwrap();
        assert_eq!(c.framing, Framing::Correlated);
        assert_eq!(c.request_len(), 8 + 12);
        assert_eq!(c.threshold.value(), 0.25);
    }

    #[test]
    fn load_from_file() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, "input_width: 784\nbyte_order: big").unwrap();
        let c = ModelContract::load(f.path()).unwrap();
        assert_eq!(c.input_width, 784);
        assert_eq!(c.byte_order, ByteOrder::Big);
    }

    #[test]
    fn missing_file_reports_path() {
        let err = ModelContract::load("/nonexistent/contract.yaml").unwrap_err();
        assert!(err.to_string().contains("/nonexistent/contract.yaml"));
    }
}
