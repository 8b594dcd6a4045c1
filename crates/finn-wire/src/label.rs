// SPDX-License-Identifier: AGPL-3.0-only

//! Decision threshold and the binary label it produces.
//!
//! The local prediction is defined by the host, not by the inference engine:
//! the engine returns a scalar confidence and [`Threshold::classify`] turns it
//! into a [`LocalLabel`] with a strict `>` comparison.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Default cut used by the reference flow (sigmoid output, midpoint).
pub const DEFAULT_THRESHOLD: f32 = 0.5;

/// Scalar cutoff converting a confidence into a binary label
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Threshold(f32);

impl Threshold {
    /// Wrap a raw cut value (validated by `ModelContract::validate`)
    pub const fn new(cut: f32) -> Self {
        Self(cut)
    }

    /// Raw cut value
    pub const fn value(self) -> f32 {
        self.0
    }

    /// `One` iff `confidence` is strictly greater than the cut.
    ///
    /// NaN compares false and therefore classifies as `Zero`.
    pub fn classify(self, confidence: f32) -> LocalLabel {
        if confidence > self.0 {
            LocalLabel::One
        } else {
            LocalLabel::Zero
        }
    }
}

impl Default for Threshold {
    fn default() -> Self {
        Self(DEFAULT_THRESHOLD)
    }
}

/// Binary label produced by thresholding the local engine output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LocalLabel {
    /// Confidence at or below the threshold
    Zero,
    /// Confidence above the threshold
    One,
}

impl LocalLabel {
    /// Integer value compared against the remote label
    pub const fn value(self) -> i32 {
        match self {
            Self::Zero => 0,
            Self::One => 1,
        }
    }
}

impl fmt::Display for LocalLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value())
    }
}
