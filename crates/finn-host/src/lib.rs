// SPDX-License-Identifier: AGPL-3.0-only

//! Host-side inference consistency harness for FINN dataflow accelerators.
//!
//! Computes a prediction locally, sends the same input to the accelerator
//! endpoint over UDP, and reports whether the two predictions agree.
//!
//! # Components
//!
//! ```text
//! SampleSource ──┬── InferenceEngine ── Threshold ───────────────┐
//!                └── WireFormat ── UdpTransport ── WireFormat ───┴── compare ── ResultSink
//! ```
//!
//! | Type | Role |
//! |------|------|
//! | [`SampleSource`] | Fixed-width input vectors (random or from a feature file) |
//! | [`InferenceEngine`] | Local confidence (logistic model, constant stub) |
//! | [`UdpTransport`] | One bounded request/reply exchange per round |
//! | [`Harness`] | Runs rounds, checks widths before sending |
//! | [`ResultSink`] | Prediction file + operator report lines |
//! | [`SoftwarePeer`] | CPU stand-in for the accelerator endpoint |
//!
//! # Quick start
//!
//! ```no_run
//! use finn_host::prelude::*;
//! use finn_wire::{ByteOrder, ModelContract};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let contract  = ModelContract::new(10, ByteOrder::Little);
//! let engine    = select_engine(&EngineSelection::LogisticSeeded(0), contract.input_width)?;
//! let transport = UdpTransport::new(TransportConfig::resolve("127.0.0.1", 12345, DEFAULT_TIMEOUT)?)?;
//!
//! let mut harness = Harness::new(contract, engine, transport)?;
//! let mut source  = RandomSource::new(10, 1);
//! let mut sink    = ReportSink::stdout(Some("pred.txt".into()));
//! let report = harness.verify(&mut source, &mut sink)?;
//! println!("{}", report.outcome);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::doc_markdown)]

mod compare;
pub mod config;
mod engine;
pub mod engines;
mod error;
mod harness;
pub mod peer;
mod rng;
mod sample;
mod sink;
mod transport;

pub use compare::{compare, ComparisonOutcome};
pub use config::{HarnessConfig, OutputSettings, TransportSettings};
pub use engine::{select_engine, EngineSelection, EngineType, InferenceEngine};
pub use engines::{pack_logistic_model, ConstantEngine, LogisticEngine};
pub use error::{HarnessError, Result, Stage};
pub use harness::{Harness, LocalPrediction, RoundReport, RoundSummary};
pub use peer::{Served, SoftwarePeer};
pub use sample::{FileSource, InputVector, RandomSource, SampleSource};
pub use sink::{ReportSink, ResultSink};
pub use transport::{Exchange, TransportConfig, UdpTransport, DEFAULT_TIMEOUT};

/// Commonly used types.
pub mod prelude {
    pub use crate::{
        select_engine, ComparisonOutcome, EngineSelection, Harness, HarnessError, InferenceEngine,
        RandomSource, ReportSink, ResultSink, RoundReport, SampleSource, TransportConfig,
        UdpTransport, DEFAULT_TIMEOUT,
    };
}
