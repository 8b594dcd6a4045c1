// SPDX-License-Identifier: AGPL-3.0-only

//! Result sink: prediction file and operator report

use crate::error::{HarnessError, Result};
use crate::harness::RoundReport;
use finn_wire::LocalLabel;
use std::io::{Stdout, Write};
use std::path::PathBuf;

/// Destination for round results
pub trait ResultSink {
    /// Persist the local prediction
    ///
    /// # Errors
    ///
    /// Returns error if the prediction cannot be stored.
    fn record_local(&mut self, label: LocalLabel) -> Result<()>;

    /// Report a completed round
    ///
    /// # Errors
    ///
    /// Returns error if the report cannot be written.
    fn report(&mut self, report: &RoundReport) -> Result<()>;

    /// Report a failed round
    ///
    /// # Errors
    ///
    /// Returns error if the report cannot be written.
    fn report_failure(&mut self, round_id: u64, error: &HarnessError) -> Result<()>;
}

/// Writes the local label to a file and one line per round to `out`
#[derive(Debug)]
pub struct ReportSink<W: Write> {
    prediction_file: Option<PathBuf>,
    out: W,
    tag_rounds: bool,
}

impl ReportSink<Stdout> {
    /// Report on standard output
    pub fn stdout(prediction_file: Option<PathBuf>) -> Self {
        Self::new(prediction_file, std::io::stdout())
    }
}

impl<W: Write> ReportSink<W> {
    /// Report on `out`; no prediction file when `prediction_file` is `None`
    pub fn new(prediction_file: Option<PathBuf>, out: W) -> Self {
        Self {
            prediction_file,
            out,
            tag_rounds: false,
        }
    }

    /// Prefix each line with `round <id>: ` (multi-round runs)
    #[must_use]
    pub fn tag_rounds(mut self, on: bool) -> Self {
        self.tag_rounds = on;
        self
    }

    /// Recover the writer
    pub fn into_inner(self) -> W {
        self.out
    }

    fn line(&mut self, round_id: u64, text: &str) -> Result<()> {
        let written = if self.tag_rounds {
            writeln!(self.out, "round {round_id}: {text}")
        } else {
            writeln!(self.out, "{text}")
        };
        written
            .and_then(|()| self.out.flush())
            .map_err(|e| HarnessError::sink("report output", e))
    }
}

impl<W: Write> ResultSink for ReportSink<W> {
    fn record_local(&mut self, label: LocalLabel) -> Result<()> {
        if let Some(path) = &self.prediction_file {
            std::fs::write(path, label.to_string()).map_err(|e| HarnessError::sink(path, e))?;
            tracing::debug!("Wrote local prediction {label} to {}", path.display());
        }
        Ok(())
    }

    fn report(&mut self, report: &RoundReport) -> Result<()> {
        self.line(report.round_id, &report.outcome.to_string())
    }

    fn report_failure(&mut self, round_id: u64, error: &HarnessError) -> Result<()> {
        self.line(round_id, &format!("error [{}]: {error}", error.stage()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compare::ComparisonOutcome;
    use finn_wire::FormatError;
    use std::time::Duration;

    fn report(outcome: ComparisonOutcome) -> RoundReport {
        RoundReport {
            round_id: 7,
            confidence: 0.9,
            local: LocalLabel::One,
            remote: None,
            outcome,
            elapsed: Duration::ZERO,
            discarded: 0,
        }
    }

    #[test]
    fn prediction_file_is_overwritten() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pred.txt");
        let mut sink = ReportSink::new(Some(path.clone()), Vec::new());
        sink.record_local(LocalLabel::One).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "1");
        sink.record_local(LocalLabel::Zero).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "0");
    }

    #[test]
    fn outcome_lines() {
        let mut sink = ReportSink::new(None, Vec::new());
        sink.report(&report(ComparisonOutcome::Match)).unwrap();
        sink.report(&report(ComparisonOutcome::Mismatch { local: 1, remote: 0 }))
            .unwrap();
        sink.report(&report(ComparisonOutcome::NoResponse)).unwrap();
        let text = String::from_utf8(sink.into_inner()).unwrap();
        assert_eq!(text, "match\nmismatch: local=1, remote=0\nno response\n");
    }

    #[test]
    fn failure_line_names_stage() {
        let mut sink = ReportSink::new(None, Vec::new()).tag_rounds(true);
        let err = HarnessError::from(FormatError::TooShort { len: 2, min: 4 });
        sink.report_failure(3, &err).unwrap();
        let text = String::from_utf8(sink.into_inner()).unwrap();
        assert_eq!(
            text,
            "round 3: error [decode]: malformed reply: datagram too short: 2 bytes < 4\n"
        );
    }

    #[test]
    fn unwritable_prediction_file_is_sink_error() {
        let mut sink = ReportSink::new(Some("/nonexistent/dir/pred.txt".into()), Vec::new());
        let err = sink.record_local(LocalLabel::One).unwrap_err();
        assert_eq!(err.stage(), crate::error::Stage::Sink);
    }
}
