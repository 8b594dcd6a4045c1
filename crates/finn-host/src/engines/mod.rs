// SPDX-License-Identifier: AGPL-3.0-only

//! Local inference engine implementations
//!
//! - **Logistic**: sigmoid(w·x + b), the host-side stand-in for a trained
//!   binary classifier exported as a flat weight blob
//! - **Constant**: fixed confidence, for peer smoke tests and CI

pub mod constant;
pub mod logistic;

pub use constant::ConstantEngine;
pub use logistic::{pack_logistic_model, LogisticEngine};
