// SPDX-License-Identifier: AGPL-3.0-only

//! Logistic-regression engine
//!
//! Evaluates `sigmoid(w·x + b)` in f32. Models travel as a compact blob:
//!
//! ```text
//! [u32 LE width][f32 LE bias][width × f32 LE weights]
//! ```

use crate::engine::{EngineType, InferenceEngine};
use crate::error::{HarnessError, Result};
use crate::rng::Xoshiro;
use std::path::Path;
use tracing::{debug, info};

const HEADER_BYTES: usize = 8;

/// Logistic-regression engine
#[derive(Debug, Clone)]
pub struct LogisticEngine {
    weights: Vec<f32>,
    bias: f32,
}

impl LogisticEngine {
    /// Create from explicit weights and bias
    pub fn new(weights: Vec<f32>, bias: f32) -> Self {
        Self { weights, bias }
    }

    /// Deterministic model with weights uniform in ±1/√width and zero bias.
    pub fn seeded(width: usize, seed: u64) -> Self {
        let mut rng = Xoshiro::new(seed);
        #[allow(clippy::cast_precision_loss)]
        let scale = 1.0 / (width.max(1) as f32).sqrt();
        let weights = (0..width).map(|_| rng.next_signed_f32() * scale).collect();
        debug!("LogisticEngine: seeded width={width} seed={seed}");
        Self::new(weights, 0.0)
    }

    /// Parse a model blob
    ///
    /// # Errors
    ///
    /// Returns error if the blob is shorter than its declared width.
    pub fn from_bytes(blob: &[u8]) -> Result<Self> {
        if blob.len() < HEADER_BYTES {
            return Err(HarnessError::inference(format!(
                "logistic model blob too short: {} < {HEADER_BYTES}",
                blob.len()
            )));
        }
        let width = u32::from_le_bytes([blob[0], blob[1], blob[2], blob[3]]) as usize;
        let bias = f32::from_le_bytes([blob[4], blob[5], blob[6], blob[7]]);
        let expected = HEADER_BYTES + width * 4;
        if blob.len() != expected {
            return Err(HarnessError::inference(format!(
                "logistic model blob size mismatch: {} != {expected} for width {width}",
                blob.len()
            )));
        }
        let weights = blob[HEADER_BYTES..]
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        Ok(Self::new(weights, bias))
    }

    /// Load a model blob from disk
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let blob = std::fs::read(path).map_err(|e| {
            HarnessError::inference(format!("cannot read model {}: {e}", path.display()))
        })?;
        let engine = Self::from_bytes(&blob)?;
        info!(
            "Loaded logistic model {} ({} inputs)",
            path.display(),
            engine.weights.len()
        );
        Ok(engine)
    }

    /// Serialize to the blob format
    pub fn to_bytes(&self) -> Vec<u8> {
        pack_logistic_model(self.bias, &self.weights)
    }

    /// Weight vector
    pub fn weights(&self) -> &[f32] {
        &self.weights
    }

    /// Bias term
    pub const fn bias(&self) -> f32 {
        self.bias
    }
}

impl InferenceEngine for LogisticEngine {
    fn input_width(&self) -> usize {
        self.weights.len()
    }

    fn infer(&mut self, input: &[f32]) -> Result<f32> {
        if input.len() != self.weights.len() {
            return Err(HarnessError::inference(format!(
                "input width {} != model width {}",
                input.len(),
                self.weights.len()
            )));
        }
        let z: f32 = self
            .weights
            .iter()
            .zip(input)
            .map(|(w, x)| w * x)
            .sum::<f32>()
            + self.bias;
        Ok(1.0 / (1.0 + (-z).exp()))
    }

    fn engine_type(&self) -> EngineType {
        EngineType::Logistic
    }
}

/// Serialize a logistic model into the blob accepted by [`LogisticEngine::from_bytes`].
#[must_use]
pub fn pack_logistic_model(bias: f32, weights: &[f32]) -> Vec<u8> {
    let mut blob = Vec::with_capacity(HEADER_BYTES + weights.len() * 4);
    #[allow(clippy::cast_possible_truncation)]
    blob.extend_from_slice(&(weights.len() as u32).to_le_bytes());
    blob.extend_from_slice(&bias.to_le_bytes());
    for &w in weights {
        blob.extend_from_slice(&w.to_le_bytes());
    }
    blob
}
