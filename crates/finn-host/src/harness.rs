// SPDX-License-Identifier: AGPL-3.0-only

//! Verification rounds
//!
//! One round, single-threaded and blocking:
//!
//! ```text
//! sample ─┬─ engine.infer ─ threshold ─ sink.record_local ─────────┐
//!         └─ encode ─ exchange (≤ timeout) ─ decode ─ remote label ─┴─ compare ─ sink.report
//! ```
//!
//! Width agreement between engine, sample source and contract is checked
//! before anything is sent. Every failure is local to its round.

use crate::compare::{compare, ComparisonOutcome};
use crate::engine::InferenceEngine;
use crate::error::{HarnessError, Result};
use crate::sample::{InputVector, SampleSource};
use crate::sink::ResultSink;
use crate::transport::{Exchange, UdpTransport};
use finn_wire::{LocalLabel, ModelContract, WireFormat};
use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{debug, info, warn};

/// Local engine output and its thresholded label
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocalPrediction {
    /// Raw engine confidence
    pub confidence: f32,
    /// Thresholded label
    pub label: LocalLabel,
}

/// Result of one completed round
#[derive(Debug, Clone, PartialEq)]
pub struct RoundReport {
    /// Round identifier (carried on the wire under correlated framing)
    pub round_id: u64,
    /// Local engine confidence
    pub confidence: f32,
    /// Local label
    pub local: LocalLabel,
    /// Remote label, absent on timeout
    pub remote: Option<i32>,
    /// Comparison outcome
    pub outcome: ComparisonOutcome,
    /// Time from send to reply or deadline
    pub elapsed: Duration,
    /// Datagrams rejected as foreign or stale
    pub discarded: usize,
}

/// Dual-path verification harness
#[derive(Debug)]
pub struct Harness {
    contract: ModelContract,
    wire: WireFormat,
    engine: Box<dyn InferenceEngine>,
    transport: UdpTransport,
    next_round_id: u64,
}

impl Harness {
    /// Create a harness
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the contract is invalid or the engine
    /// expects a different input width than the contract declares.
    pub fn new(
        contract: ModelContract,
        engine: Box<dyn InferenceEngine>,
        transport: UdpTransport,
    ) -> Result<Self> {
        contract.validate()?;
        if engine.input_width() != contract.input_width {
            return Err(HarnessError::configuration(format!(
                "{} engine expects {} inputs, contract declares {}",
                engine.engine_type(),
                engine.input_width(),
                contract.input_width
            )));
        }
        info!(
            "Harness ready: {} inputs, threshold {}, {:?}/{:?}, peer {}",
            contract.input_width,
            contract.threshold.value(),
            contract.byte_order,
            contract.framing,
            transport.config().peer
        );
        Ok(Self {
            wire: contract.wire_format(),
            contract,
            engine,
            transport,
            next_round_id: time_seeded_round_id(),
        })
    }

    /// Start round ids at `start`
    #[must_use]
    pub fn with_round_id_start(mut self, start: u64) -> Self {
        self.next_round_id = start;
        self
    }

    /// Active contract
    pub const fn contract(&self) -> &ModelContract {
        &self.contract
    }

    /// Id the next round will use
    pub const fn next_round_id(&self) -> u64 {
        self.next_round_id
    }

    /// Check that a sample source yields contract-width vectors
    ///
    /// # Errors
    ///
    /// Returns a configuration error on width mismatch.
    pub fn check_source(&self, source: &dyn SampleSource) -> Result<()> {
        self.check_width(source.width(), "sample source")
    }

    fn check_width(&self, width: usize, what: &str) -> Result<()> {
        if width == self.contract.input_width {
            Ok(())
        } else {
            Err(HarnessError::configuration(format!(
                "{what} width {width} != contract width {}",
                self.contract.input_width
            )))
        }
    }

    /// Run the local engine and apply the contract threshold
    ///
    /// # Errors
    ///
    /// Returns error on width mismatch or engine failure.
    pub fn predict_local(&mut self, input: &InputVector) -> Result<LocalPrediction> {
        self.check_width(input.width(), "input")?;
        let confidence = self.engine.infer(input.as_slice())?;
        let label = self.contract.threshold.classify(confidence);
        debug!("Local confidence {confidence} -> label {label}");
        Ok(LocalPrediction { confidence, label })
    }

    /// Send `input` to the endpoint and decode its label
    ///
    /// Returns `None` as the label when no reply arrived in time.
    ///
    /// # Errors
    ///
    /// Returns a transport error for channel failures and a format error for
    /// undecodable replies.
    pub fn query_remote(&self, round_id: u64, input: &InputVector) -> Result<(Option<i32>, Exchange)> {
        self.check_width(input.width(), "input")?;
        let request = self.wire.encode_request(round_id, input.as_slice());
        let wire = self.wire;
        let exchange = self.transport.exchange(&request, |bytes| {
            wire.read_round_id(bytes).map_or(true, |id| id == round_id)
        })?;
        let label = match exchange.reply.as_deref() {
            Some(bytes) => Some(self.wire.decode_response(bytes)?.label),
            None => None,
        };
        Ok((label, exchange))
    }

    /// Run one round on `input`, reporting through `sink`
    ///
    /// # Errors
    ///
    /// Returns the first failing stage's error; no outcome is reported then.
    pub fn run_round(&mut self, input: &InputVector, sink: &mut dyn ResultSink) -> Result<RoundReport> {
        let round_id = self.next_round_id;
        self.next_round_id = self.next_round_id.wrapping_add(1);

        let local = self.predict_local(input)?;
        sink.record_local(local.label)?;

        let (remote, exchange) = self.query_remote(round_id, input)?;
        let outcome = compare(local.label, remote);
        info!(
            "Round {round_id}: {outcome} ({:?}, {} discarded)",
            exchange.elapsed, exchange.discarded
        );

        let report = RoundReport {
            round_id,
            confidence: local.confidence,
            local: local.label,
            remote,
            outcome,
            elapsed: exchange.elapsed,
            discarded: exchange.discarded,
        };
        sink.report(&report)?;
        Ok(report)
    }

    /// Draw a sample and run one round; failures are also reported to `sink`
    ///
    /// # Errors
    ///
    /// Returns the round's error after reporting it.
    pub fn verify(
        &mut self,
        source: &mut dyn SampleSource,
        sink: &mut dyn ResultSink,
    ) -> Result<RoundReport> {
        let round_id = self.next_round_id;
        let result = self
            .check_source(source)
            .and_then(|()| source.next_sample())
            .and_then(|input| self.run_round(&input, &mut *sink));
        if let Err(e) = &result {
            warn!("Round {round_id} failed at {} stage: {e}", e.stage());
            if let Err(report_err) = sink.report_failure(round_id, e) {
                warn!("Could not report failure: {report_err}");
            }
        }
        result
    }
}

/// Tally of outcomes across rounds
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RoundSummary {
    /// Rounds where both paths agreed
    pub matches: u64,
    /// Rounds where the labels differed
    pub mismatches: u64,
    /// Rounds with no reply in time
    pub no_response: u64,
    /// Rounds that failed before producing an outcome
    pub failures: u64,
}

impl RoundSummary {
    /// Count one round result
    pub fn record(&mut self, result: &Result<RoundReport>) {
        match result {
            Ok(r) => match r.outcome {
                ComparisonOutcome::Match => self.matches += 1,
                ComparisonOutcome::Mismatch { .. } => self.mismatches += 1,
                ComparisonOutcome::NoResponse => self.no_response += 1,
            },
            Err(_) => self.failures += 1,
        }
    }

    /// Rounds counted
    pub const fn total(&self) -> u64 {
        self.matches + self.mismatches + self.no_response + self.failures
    }

    /// At least one round and every round matched
    pub const fn all_matched(&self) -> bool {
        self.total() > 0 && self.matches == self.total()
    }
}

impl fmt::Display for RoundSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "rounds={} match={} mismatch={} no_response={} failed={}",
            self.total(),
            self.matches,
            self.mismatches,
            self.no_response,
            self.failures
        )
    }
}

fn time_seeded_round_id() -> u64 {
    // Low 64 bits of the wall clock keep ids distinct across restarts.
    #[allow(clippy::cast_possible_truncation)]
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(1, |d| d.as_nanos() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engines::ConstantEngine;
    use crate::transport::TransportConfig;
    use finn_wire::ByteOrder;

    fn transport() -> UdpTransport {
        UdpTransport::new(TransportConfig::new(
            "127.0.0.1:9".parse().unwrap(),
            Duration::from_millis(50),
        ))
        .unwrap()
    }

    #[test]
    fn engine_width_must_match_contract() {
        let contract = ModelContract::new(10, ByteOrder::Little);
        let err = Harness::new(contract, Box::new(ConstantEngine::new(8, 0.9)), transport())
            .unwrap_err();
        assert!(err.to_string().contains("expects 8 inputs"));
    }

    #[test]
    fn local_prediction_uses_contract_threshold() {
        let contract = ModelContract::new(2, ByteOrder::Little).with_threshold(0.95);
        let mut h =
            Harness::new(contract, Box::new(ConstantEngine::new(2, 0.9)), transport()).unwrap();
        let p = h.predict_local(&InputVector::new(vec![0.0, 0.0])).unwrap();
        assert_eq!(p.label, LocalLabel::Zero);
        assert!((p.confidence - 0.9).abs() < f32::EPSILON);
    }

    #[test]
    fn wrong_input_width_fails_before_send() {
        let contract = ModelContract::new(2, ByteOrder::Little);
        let h = Harness::new(contract, Box::new(ConstantEngine::new(2, 0.9)), transport()).unwrap();
        let err = h.query_remote(1, &InputVector::new(vec![0.0; 3])).unwrap_err();
        assert_eq!(err.stage(), crate::error::Stage::Configuration);
    }

    #[test]
    fn round_ids_increase() {
        let contract = ModelContract::new(1, ByteOrder::Little);
        let h = Harness::new(contract, Box::new(ConstantEngine::new(1, 0.9)), transport())
            .unwrap()
            .with_round_id_start(41);
        assert_eq!(h.next_round_id(), 41);
    }

    #[test]
    fn summary_counts() {
        let mut s = RoundSummary::default();
        assert!(!s.all_matched());
        let ok = |outcome| {
            Ok(RoundReport {
                round_id: 0,
                confidence: 0.0,
                local: LocalLabel::Zero,
                remote: None,
                outcome,
                elapsed: Duration::ZERO,
                discarded: 0,
            })
        };
        s.record(&ok(ComparisonOutcome::Match));
        assert!(s.all_matched());
        s.record(&ok(ComparisonOutcome::NoResponse));
        s.record(&Err(HarnessError::configuration("x")));
        assert_eq!(s.total(), 3);
        assert!(!s.all_matched());
        assert_eq!(
            s.to_string(),
            "rounds=3 match=1 mismatch=0 no_response=1 failed=1"
        );
    }
}
