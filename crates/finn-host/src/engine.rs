// SPDX-License-Identifier: AGPL-3.0-only

//! Local inference capability
//!
//! The harness never depends on a numerical runtime directly: it talks to an
//! [`InferenceEngine`] that maps an input vector to one scalar confidence.
//! Thresholding stays in the harness (`finn_wire::Threshold`).

use crate::engines::{ConstantEngine, LogisticEngine};
use crate::error::Result;
use std::fmt::{self, Debug};
use std::path::PathBuf;

/// Local inference engine - one scalar confidence per input vector
///
/// Contract:
/// - `input` has exactly `input_width()` values (the harness checks this)
/// - the returned confidence is compared against the contract threshold
pub trait InferenceEngine: Debug + Send {
    /// Number of f32 values the engine expects
    fn input_width(&self) -> usize;

    /// Run inference on one input vector
    ///
    /// # Errors
    ///
    /// Returns error if the engine cannot evaluate the input.
    fn infer(&mut self, input: &[f32]) -> Result<f32>;

    /// Engine type for logging
    fn engine_type(&self) -> EngineType;
}

/// Engine type identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineType {
    /// Logistic regression over the input (sigmoid output)
    Logistic,
    /// Fixed confidence regardless of input
    Constant,
}

impl fmt::Display for EngineType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Logistic => write!(f, "Logistic"),
            Self::Constant => write!(f, "Constant"),
        }
    }
}

/// Engine selection strategy
#[derive(Debug, Clone, PartialEq)]
pub enum EngineSelection {
    /// Load a logistic model blob from disk
    LogisticFile(PathBuf),
    /// Deterministic logistic model generated from a seed
    LogisticSeeded(u64),
    /// Fixed confidence
    Constant(f32),
}

/// Build the selected engine for an input of `width` values
///
/// # Errors
///
/// Returns error if a model file cannot be read or parsed. Width agreement
/// with the contract is checked by `Harness::new`.
pub fn select_engine(selection: &EngineSelection, width: usize) -> Result<Box<dyn InferenceEngine>> {
    let engine: Box<dyn InferenceEngine> = match selection {
        EngineSelection::LogisticFile(path) => Box::new(LogisticEngine::from_file(path)?),
        EngineSelection::LogisticSeeded(seed) => Box::new(LogisticEngine::seeded(width, *seed)),
        EngineSelection::Constant(confidence) => Box::new(ConstantEngine::new(width, *confidence)),
    };
    tracing::info!(
        "Using {} engine ({} inputs)",
        engine.engine_type(),
        engine.input_width()
    );
    Ok(engine)
}
