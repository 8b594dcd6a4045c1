// SPDX-License-Identifier: AGPL-3.0-only

//! Wire model for the FINN host inference harness.
//!
//! This crate has **no socket access**. It is a pure model of what the host
//! and the accelerator endpoint agree on out-of-band: input width, decision
//! threshold, byte order, and the datagram layouts built from them.
//!
//! # Crate organisation
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`contract`] | `ModelContract`: the shared schema (width, threshold, byte order, framing) |
//! | [`label`] | `Threshold` and `LocalLabel`: how a confidence becomes a binary label |
//! | [`codec`] | Request/response datagram encoding for raw and correlated framing |
//!
//! # Reference datagram layout
//!
//! ```text
//! request  : [f32; N]                   exactly 4×N bytes, no header
//! response : [i32][ignored trailing..]  at least 4 bytes
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod codec;
pub mod contract;
mod error;
pub mod label;

pub use codec::{ByteOrder, Framing, Reply, WireFormat};
pub use contract::ModelContract;
pub use error::{ContractError, FormatError};
pub use label::{LocalLabel, Threshold};
