// SPDX-License-Identifier: AGPL-3.0-only

//! Fixed-confidence engine

use crate::engine::{EngineType, InferenceEngine};
use crate::error::{HarnessError, Result};

/// Engine that returns the same confidence for every input
#[derive(Debug, Clone)]
pub struct ConstantEngine {
    width: usize,
    confidence: f32,
}

impl ConstantEngine {
    /// Create an engine expecting `width` inputs
    pub const fn new(width: usize, confidence: f32) -> Self {
        Self { width, confidence }
    }
}

impl InferenceEngine for ConstantEngine {
    fn input_width(&self) -> usize {
        self.width
    }

    fn infer(&mut self, input: &[f32]) -> Result<f32> {
        if input.len() != self.width {
            return Err(HarnessError::inference(format!(
                "input width {} != engine width {}",
                input.len(),
                self.width
            )));
        }
        Ok(self.confidence)
    }

    fn engine_type(&self) -> EngineType {
        EngineType::Constant
    }
}
