//! Settlement attempt bookkeeping.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Result of trying one settlement entry point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttemptOutcome {
	Success,
	Error(String),
}

/// One try of one entry point. Lives only for the duration of a `settle` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementAttempt {
	pub entry_point: String,
	pub outcome: AttemptOutcome,
}

impl SettlementAttempt {
	pub fn is_success(&self) -> bool {
		self.outcome == AttemptOutcome::Success
	}
}

impl fmt::Display for SettlementAttempt {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match &self.outcome {
			AttemptOutcome::Success => write!(f, "{}: success", self.entry_point),
			AttemptOutcome::Error(e) => write!(f, "{}: {}", self.entry_point, e),
		}
	}
}

/// Value a successful settlement resolves with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SettlementOutcome {
	Success,
}
