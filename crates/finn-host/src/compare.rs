// SPDX-License-Identifier: AGPL-3.0-only

//! Result comparator

use finn_wire::LocalLabel;
use std::fmt;

/// Final classification of one round
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonOutcome {
    /// Remote label present and equal to the local label
    Match,
    /// Remote label present and different
    Mismatch {
        /// Local label value
        local: i32,
        /// Remote label value
        remote: i32,
    },
    /// No reply before the timeout
    NoResponse,
}

impl ComparisonOutcome {
    /// `true` only for `Match`
    pub const fn is_match(&self) -> bool {
        matches!(self, Self::Match)
    }
}

impl fmt::Display for ComparisonOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Match => write!(f, "match"),
            Self::Mismatch { local, remote } => {
                write!(f, "mismatch: local={local}, remote={remote}")
            }
            Self::NoResponse => write!(f, "no response"),
        }
    }
}

/// Compare local and remote predictions. Total: an absent remote label is
/// `NoResponse` whatever the local label.
pub fn compare(local: LocalLabel, remote: Option<i32>) -> ComparisonOutcome {
    match remote {
        None => ComparisonOutcome::NoResponse,
        Some(r) if r == local.value() => ComparisonOutcome::Match,
        Some(r) => ComparisonOutcome::Mismatch {
            local: local.value(),
            remote: r,
        },
    }
}
