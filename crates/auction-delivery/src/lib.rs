//! Sponsored batch execution.
//!
//! [`DeliveryService::execute`] submits a batch of calls through a sponsored
//! wallet, tracks it until the wallet reports a terminal status and resolves
//! the caller exactly once. One executor runs at most one operation at a time;
//! a second `execute` while the first is in flight is refused, not queued.

use async_trait::async_trait;
use auction_types::{BatchSpec, CallsStatus, ConfigSchema, CorrelationId};
use thiserror::Error;

mod executor;
mod poller;
mod registry;

pub mod implementations {
	pub mod eip5792;
}

pub use executor::{DeliveryService, ExecutorConfig};
pub use poller::ConfirmationPoller;
pub use registry::{Completion, PendingOperation, PendingOperationRegistry, SlotGuard};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DeliveryError {
	#[error("No account connected")]
	NotConnected,
	#[error("Sponsored execution is not available for this account and chain")]
	CapabilityUnavailable,
	#[error("An operation is already in progress")]
	OperationInProgress,
	#[error("Batch submission failed: {0}")]
	Submission(String),
	#[error("No confirmation after {timeout_ms} ms; the operation may still land on chain")]
	ConfirmationTimeout { timeout_ms: u64 },
	#[error("{0}")]
	ContractRevert(String),
	#[error("Network error: {0}")]
	Network(String),
	#[error("Invalid configuration: {0}")]
	Config(String),
}

impl DeliveryError {
	/// Whether a status check that failed this way may be retried on the next tick.
	pub fn is_transient(&self) -> bool {
		matches!(self, DeliveryError::Network(_))
	}
}

/// Submission layer for sponsored batches.
#[async_trait]
pub trait DeliveryInterface: Send + Sync {
	fn config_schema(&self) -> Box<dyn ConfigSchema>;

	/// Submits `batch` and returns the handle used to poll its status.
	async fn send_calls(&self, batch: &BatchSpec) -> Result<CorrelationId, DeliveryError>;

	/// Reports the current status of a submitted batch.
	async fn get_calls_status(&self, id: &CorrelationId) -> Result<CallsStatus, DeliveryError>;
}
