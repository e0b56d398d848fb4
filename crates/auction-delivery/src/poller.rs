//! Fixed-interval status polling for a submitted batch.

use crate::registry::Completion;
use crate::{DeliveryError, DeliveryInterface};
use auction_types::{truncate_hash, truncate_id, CallsStatus, CorrelationId, ExecutionResult};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Polls one correlation id until it reaches a terminal status.
pub struct ConfirmationPoller {
	submitter: Arc<dyn DeliveryInterface>,
	id: CorrelationId,
	interval: Duration,
}

impl ConfirmationPoller {
	pub fn new(submitter: Arc<dyn DeliveryInterface>, id: CorrelationId, interval: Duration) -> Self {
		Self {
			submitter,
			id,
			interval,
		}
	}

	/// Ticks every `interval` and settles `completion` on the first terminal
	/// status. Returns as soon as the completion is settled by anyone.
	pub async fn run(self, completion: Completion<Result<ExecutionResult, DeliveryError>>) {
		let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
		ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
		let mut ticks = 0u64;

		loop {
			ticker.tick().await;
			if completion.is_resolved() {
				return;
			}
			ticks += 1;

			let status = match self.submitter.get_calls_status(&self.id).await {
				Ok(status) => status,
				Err(e) if e.is_transient() => {
					debug!(id = %truncate_id(&self.id.0), tick = ticks, "Status check failed: {}", e);
					continue;
				}
				Err(e) => {
					completion.complete(Err(e));
					return;
				}
			};

			if let Some(outcome) = self.evaluate(status, ticks) {
				completion.complete(outcome);
				return;
			}
		}
	}

	/// Maps a status to a terminal outcome, or `None` to keep polling.
	fn evaluate(
		&self,
		status: CallsStatus,
		ticks: u64,
	) -> Option<Result<ExecutionResult, DeliveryError>> {
		match status {
			CallsStatus::Pending => {
				debug!(id = %truncate_id(&self.id.0), tick = ticks, "Batch pending");
				None
			}
			CallsStatus::Confirmed { receipts } => {
				if let Some(failed) = receipts.iter().find(|r| !r.success) {
					warn!(tx_hash = %truncate_hash(&failed.transaction_hash), "Batch transaction reverted");
					return Some(Err(DeliveryError::ContractRevert(format!(
						"transaction {} reverted",
						failed.transaction_hash
					))));
				}
				match receipts.into_iter().next() {
					Some(receipt) => {
						info!(
							tx_hash = %truncate_hash(&receipt.transaction_hash),
							ticks,
							"Batch confirmed"
						);
						Some(Ok(ExecutionResult {
							hash: receipt.transaction_hash,
							receipt,
						}))
					}
					None => {
						debug!(id = %truncate_id(&self.id.0), "Batch confirmed without receipts yet");
						None
					}
				}
			}
			CallsStatus::Failed { reason, .. } => {
				warn!(id = %truncate_id(&self.id.0), "Batch failed: {}", reason);
				Some(Err(DeliveryError::ContractRevert(reason)))
			}
		}
	}
}
