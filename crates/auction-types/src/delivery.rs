//! Sponsored call types.
//!
//! These describe what goes into a batch submission, what comes back from the
//! status endpoint and the lifecycle of the single in-flight operation.

use crate::account::SponsorCapability;
use alloy::primitives::{Address, Bytes, B256, U256};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single contract call inside a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Call {
	/// Contract receiving the call.
	pub target: Address,
	/// ABI-encoded calldata.
	pub data: Bytes,
	/// Native value attached to the call, in wei.
	pub value: U256,
}

impl Call {
	/// Builds a call that carries no value.
	pub fn new(target: Address, data: impl Into<Bytes>) -> Self {
		Self {
			target,
			data: data.into(),
			value: U256::ZERO,
		}
	}

	pub fn with_value(mut self, value: U256) -> Self {
		self.value = value;
		self
	}
}

/// Everything needed to submit one sponsored batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchSpec {
	/// Connected account sending the batch.
	pub from: Address,
	/// Chain the batch targets.
	pub chain_id: u64,
	/// Calls executed in order.
	pub calls: Vec<Call>,
	/// Sponsor capability negotiated for this account and chain.
	pub capability: SponsorCapability,
}

/// Opaque handle returned by the submission layer for a batch.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CorrelationId(pub String);

impl fmt::Display for CorrelationId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

/// Receipt of one transaction produced by a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallReceipt {
	pub transaction_hash: B256,
	pub block_number: Option<u64>,
	pub success: bool,
}

/// Status reported for a submitted batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallsStatus {
	/// Not yet included.
	Pending,
	/// Included on chain. Receipts may still be empty on some wallets.
	Confirmed { receipts: Vec<CallReceipt> },
	/// Rejected off chain or reverted on chain.
	Failed {
		reason: String,
		receipts: Vec<CallReceipt>,
	},
}

impl CallsStatus {
	pub fn is_pending(&self) -> bool {
		matches!(self, CallsStatus::Pending)
	}
}

/// Final outcome handed back to the caller of `execute`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionResult {
	pub hash: B256,
	pub receipt: CallReceipt,
}

/// Lifecycle of the in-flight sponsored operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationState {
	Idle,
	Submitting,
	AwaitingConfirmation,
	Confirmed,
	Failed,
	TimedOut,
}

impl OperationState {
	/// Whether an operation in this state occupies the executor.
	pub fn is_in_flight(self) -> bool {
		matches!(
			self,
			OperationState::Submitting | OperationState::AwaitingConfirmation
		)
	}

	pub fn is_terminal(self) -> bool {
		matches!(
			self,
			OperationState::Confirmed | OperationState::Failed | OperationState::TimedOut
		)
	}
}

/// Point-in-time view of the executor's operation slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingOperationView {
	pub state: OperationState,
	pub correlation_id: Option<CorrelationId>,
	pub last_terminal: Option<OperationState>,
}
