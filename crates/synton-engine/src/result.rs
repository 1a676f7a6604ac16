//! Verification verdicts.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::counterexample::Counterexample;

/// The judgment for one verification unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    /// No input violates any obligation given the assumptions.
    Verified,
    /// At least one obligation has a validated counterexample.
    Violated,
    /// The assumptions alone are self-contradictory: the contract is
    /// malformed, not the checked code.
    Inconsistent,
    /// The backend could not decide the fragment.
    Unknown,
    /// The configured deadline expired before a verdict.
    TimedOut,
}

impl fmt::Display for VerificationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            VerificationStatus::Verified => "verified",
            VerificationStatus::Violated => "violated",
            VerificationStatus::Inconsistent => "inconsistent",
            VerificationStatus::Unknown => "unknown",
            VerificationStatus::TimedOut => "timed_out",
        };
        write!(f, "{s}")
    }
}

/// Result of verifying one unit. Cached by constraint-set hash; derived
/// fresh whenever the owning contract or body fingerprint changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationOutcome {
    pub status: VerificationStatus,
    pub counterexamples: Vec<Counterexample>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl VerificationOutcome {
    pub fn verified() -> Self {
        Self {
            status: VerificationStatus::Verified,
            counterexamples: Vec::new(),
            detail: None,
        }
    }

    pub fn violated(counterexamples: Vec<Counterexample>) -> Self {
        Self {
            status: VerificationStatus::Violated,
            counterexamples,
            detail: None,
        }
    }

    pub fn inconsistent(detail: impl Into<String>) -> Self {
        Self {
            status: VerificationStatus::Inconsistent,
            counterexamples: Vec::new(),
            detail: Some(detail.into()),
        }
    }

    pub fn unknown(reason: impl Into<String>) -> Self {
        Self {
            status: VerificationStatus::Unknown,
            counterexamples: Vec::new(),
            detail: Some(reason.into()),
        }
    }

    pub fn timed_out(detail: impl Into<String>) -> Self {
        Self {
            status: VerificationStatus::TimedOut,
            counterexamples: Vec::new(),
            detail: Some(detail.into()),
        }
    }

    pub fn is_verified(&self) -> bool {
        self.status == VerificationStatus::Verified
    }
}
