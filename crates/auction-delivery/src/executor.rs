//! The sponsored executor: submitter, registry and poller composed.

use crate::poller::ConfirmationPoller;
use crate::registry::{Completion, PendingOperationRegistry};
use crate::{DeliveryError, DeliveryInterface};
use auction_types::{
	truncate_id, BatchSpec, EventBus, ExecutionResult, OperationEvent, OperationState,
	PendingOperationView, RelayEvent,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Timing of confirmation tracking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutorConfig {
	pub poll_interval: Duration,
	pub confirmation_timeout: Duration,
}

impl Default for ExecutorConfig {
	fn default() -> Self {
		Self {
			poll_interval: Duration::from_secs(1),
			confirmation_timeout: Duration::from_millis(60_000),
		}
	}
}

/// Aborts the wrapped task when dropped.
struct AbortOnDrop(JoinHandle<()>);

impl Drop for AbortOnDrop {
	fn drop(&mut self) {
		self.0.abort();
	}
}

/// Executes sponsored batches one at a time.
pub struct DeliveryService {
	submitter: Arc<dyn DeliveryInterface>,
	registry: Arc<PendingOperationRegistry>,
	config: ExecutorConfig,
	events: Option<EventBus>,
}

impl DeliveryService {
	pub fn new(submitter: Arc<dyn DeliveryInterface>, config: ExecutorConfig) -> Self {
		Self {
			submitter,
			registry: PendingOperationRegistry::new(),
			config,
			events: None,
		}
	}

	/// Publishes operation lifecycle events on `events`.
	pub fn with_events(mut self, events: EventBus) -> Self {
		self.events = Some(events);
		self
	}

	fn publish(&self, event: OperationEvent) {
		if let Some(events) = &self.events {
			let _ = events.publish(RelayEvent::Operation(event));
		}
	}

	/// Submits `batch` and waits for its single outcome.
	///
	/// Fails immediately with `CapabilityUnavailable` for an empty capability
	/// and with `OperationInProgress` while another operation is in flight.
	/// A `ConfirmationTimeout` only ends local waiting; the batch may still
	/// land on chain.
	pub async fn execute(&self, batch: BatchSpec) -> Result<ExecutionResult, DeliveryError> {
		if batch.capability.is_empty() {
			return Err(DeliveryError::CapabilityUnavailable);
		}
		if batch.calls.is_empty() {
			return Err(DeliveryError::Submission("batch contains no calls".to_string()));
		}

		let slot = self.registry.open(&batch)?;
		info!(
			from = %batch.from,
			chain_id = batch.chain_id,
			calls = batch.calls.len(),
			"Submitting sponsored batch"
		);

		let id = match self.submitter.send_calls(&batch).await {
			Ok(id) => id,
			Err(e) => {
				warn!("Batch submission rejected: {}", e);
				slot.finish(OperationState::Failed);
				let error = match e {
					DeliveryError::Submission(_) => e,
					other => DeliveryError::Submission(other.to_string()),
				};
				self.publish(OperationEvent::Failed {
					reason: error.to_string(),
				});
				return Err(error);
			}
		};

		info!(id = %truncate_id(&id.0), "Batch accepted, awaiting confirmation");
		slot.awaiting(id.clone());
		self.publish(OperationEvent::Submitted { id: id.clone() });

		let (completion, outcome) = Completion::new();
		let poller = ConfirmationPoller::new(
			self.submitter.clone(),
			id.clone(),
			self.config.poll_interval,
		);
		let _poller = AbortOnDrop(tokio::spawn(poller.run(completion.clone())));

		let result = self
			.registry
			.wait(completion, outcome, self.config.confirmation_timeout)
			.await;

		slot.finish(match &result {
			Ok(_) => OperationState::Confirmed,
			Err(DeliveryError::ConfirmationTimeout { .. }) => OperationState::TimedOut,
			Err(_) => OperationState::Failed,
		});
		self.publish(match &result {
			Ok(execution) => OperationEvent::Confirmed {
				id,
				hash: execution.hash,
			},
			Err(e) => OperationEvent::Failed {
				reason: e.to_string(),
			},
		});
		result
	}

	/// State of the in-flight operation, or `Idle`.
	pub fn state(&self) -> OperationState {
		self.registry.state()
	}

	pub fn is_busy(&self) -> bool {
		self.registry.is_busy()
	}

	/// Snapshot of the operation slot for status reporting.
	pub fn pending(&self) -> PendingOperationView {
		PendingOperationView {
			state: self.registry.state(),
			correlation_id: self.registry.pending_id(),
			last_terminal: self.registry.last_terminal(),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::DeliveryInterface;
	use alloy::primitives::{address, Address, B256};
	use async_trait::async_trait;
	use auction_types::{
		Call, CallReceipt, CallsStatus, ConfigSchema, CorrelationId, Schema, SponsorCapability,
		ValidationError,
	};
	use futures::FutureExt;
	use std::collections::VecDeque;
	use std::sync::atomic::{AtomicUsize, Ordering};
	use std::sync::Mutex;

	struct NoSchema;

	impl ConfigSchema for NoSchema {
		fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
			Schema::default().validate(config)
		}
	}

	/// Submitter that replays a scripted status sequence, then stays pending.
	struct Scripted {
		submit: Result<CorrelationId, DeliveryError>,
		statuses: Mutex<VecDeque<Result<CallsStatus, DeliveryError>>>,
		submits: AtomicUsize,
		polls: AtomicUsize,
	}

	impl Scripted {
		fn new(statuses: Vec<Result<CallsStatus, DeliveryError>>) -> Arc<Self> {
			Arc::new(Self {
				submit: Ok(CorrelationId("0xbundle".to_string())),
				statuses: Mutex::new(statuses.into()),
				submits: AtomicUsize::new(0),
				polls: AtomicUsize::new(0),
			})
		}

		fn rejecting(error: DeliveryError) -> Arc<Self> {
			Arc::new(Self {
				submit: Err(error),
				statuses: Mutex::new(VecDeque::new()),
				submits: AtomicUsize::new(0),
				polls: AtomicUsize::new(0),
			})
		}
	}

	#[async_trait]
	impl DeliveryInterface for Scripted {
		fn config_schema(&self) -> Box<dyn ConfigSchema> {
			Box::new(NoSchema)
		}

		async fn send_calls(&self, _batch: &BatchSpec) -> Result<CorrelationId, DeliveryError> {
			self.submits.fetch_add(1, Ordering::SeqCst);
			self.submit.clone()
		}

		async fn get_calls_status(&self, _id: &CorrelationId) -> Result<CallsStatus, DeliveryError> {
			self.polls.fetch_add(1, Ordering::SeqCst);
			self.statuses
				.lock()
				.unwrap()
				.pop_front()
				.unwrap_or(Ok(CallsStatus::Pending))
		}
	}

	fn receipt(success: bool) -> CallReceipt {
		CallReceipt {
			transaction_hash: B256::repeat_byte(0x11),
			block_number: Some(100),
			success,
		}
	}

	fn batch(capability: SponsorCapability) -> BatchSpec {
		BatchSpec {
			from: address!("0x00000000000000000000000000000000000000aa"),
			chain_id: 8453,
			calls: vec![Call::new(Address::ZERO, vec![0xde, 0xad, 0xbe, 0xef])],
			capability,
		}
	}

	fn sponsored() -> SponsorCapability {
		SponsorCapability::sponsored("https://pm.example.org")
	}

	#[tokio::test(start_paused = true)]
	async fn test_confirms_after_pending_ticks() {
		let submitter = Scripted::new(vec![
			Ok(CallsStatus::Pending),
			Err(DeliveryError::Network("flaky".to_string())),
			Ok(CallsStatus::Confirmed {
				receipts: vec![receipt(true)],
			}),
		]);
		let events = EventBus::new(16);
		let mut rx = events.subscribe();
		let service =
			DeliveryService::new(submitter.clone(), ExecutorConfig::default()).with_events(events);

		let result = service.execute(batch(sponsored())).await.unwrap();
		assert_eq!(result.hash, B256::repeat_byte(0x11));
		assert_eq!(submitter.polls.load(Ordering::SeqCst), 3);
		assert_eq!(service.state(), OperationState::Idle);
		assert_eq!(service.pending().last_terminal, Some(OperationState::Confirmed));

		assert!(matches!(
			rx.try_recv(),
			Ok(RelayEvent::Operation(OperationEvent::Submitted { .. }))
		));
		assert!(matches!(
			rx.try_recv(),
			Ok(RelayEvent::Operation(OperationEvent::Confirmed { hash, .. })) if hash == result.hash
		));
	}

	#[tokio::test(start_paused = true)]
	async fn test_confirmed_without_receipts_keeps_polling() {
		let submitter = Scripted::new(vec![
			Ok(CallsStatus::Confirmed { receipts: vec![] }),
			Ok(CallsStatus::Confirmed {
				receipts: vec![receipt(true)],
			}),
		]);
		let service = DeliveryService::new(submitter.clone(), ExecutorConfig::default());

		assert!(service.execute(batch(sponsored())).await.is_ok());
		assert_eq!(submitter.polls.load(Ordering::SeqCst), 2);
	}

	#[tokio::test]
	async fn test_empty_capability_fails_fast() {
		let submitter = Scripted::new(vec![]);
		let service = DeliveryService::new(submitter.clone(), ExecutorConfig::default());

		assert_eq!(
			service.execute(batch(SponsorCapability::default())).await,
			Err(DeliveryError::CapabilityUnavailable)
		);
		assert_eq!(submitter.submits.load(Ordering::SeqCst), 0);
		assert!(!service.is_busy());
	}

	#[tokio::test]
	async fn test_submission_rejected() {
		let submitter = Scripted::rejecting(DeliveryError::Network("user rejected".to_string()));
		let service = DeliveryService::new(submitter.clone(), ExecutorConfig::default());

		let err = service.execute(batch(sponsored())).await.unwrap_err();
		assert!(matches!(err, DeliveryError::Submission(ref m) if m.contains("user rejected")));
		assert!(!service.is_busy());
		assert_eq!(service.pending().last_terminal, Some(OperationState::Failed));
		assert_eq!(submitter.polls.load(Ordering::SeqCst), 0);
	}

	#[tokio::test(start_paused = true)]
	async fn test_revert_message_passes_through() {
		let submitter = Scripted::new(vec![Ok(CallsStatus::Failed {
			reason: "execution reverted: Auction expired".to_string(),
			receipts: vec![],
		})]);
		let service = DeliveryService::new(submitter, ExecutorConfig::default());

		assert_eq!(
			service.execute(batch(sponsored())).await,
			Err(DeliveryError::ContractRevert(
				"execution reverted: Auction expired".to_string()
			))
		);
	}

	#[tokio::test(start_paused = true)]
	async fn test_reverted_receipt() {
		let submitter = Scripted::new(vec![Ok(CallsStatus::Confirmed {
			receipts: vec![receipt(false)],
		})]);
		let service = DeliveryService::new(submitter, ExecutorConfig::default());

		assert!(matches!(
			service.execute(batch(sponsored())).await,
			Err(DeliveryError::ContractRevert(_))
		));
	}

	#[tokio::test(start_paused = true)]
	async fn test_timeout_rejects_and_clears_slot() {
		let submitter = Scripted::new(vec![]);
		let service = DeliveryService::new(submitter.clone(), ExecutorConfig::default());
		let started = tokio::time::Instant::now();

		let result = service.execute(batch(sponsored())).await;

		assert_eq!(
			result,
			Err(DeliveryError::ConfirmationTimeout { timeout_ms: 60_000 })
		);
		assert!(started.elapsed() >= Duration::from_millis(60_000));
		assert!(!service.is_busy());
		assert_eq!(service.state(), OperationState::Idle);
		assert_eq!(service.pending().last_terminal, Some(OperationState::TimedOut));

		// Polling stopped with the timeout.
		let polls = submitter.polls.load(Ordering::SeqCst);
		tokio::time::sleep(Duration::from_secs(10)).await;
		assert_eq!(submitter.polls.load(Ordering::SeqCst), polls);
	}

	#[tokio::test(start_paused = true)]
	async fn test_second_execute_rejected_while_first_in_flight() {
		let submitter = Scripted::new(vec![
			Ok(CallsStatus::Pending),
			Ok(CallsStatus::Pending),
			Ok(CallsStatus::Confirmed {
				receipts: vec![receipt(true)],
			}),
		]);
		let service = Arc::new(DeliveryService::new(submitter.clone(), ExecutorConfig::default()));

		let first = tokio::spawn({
			let service = service.clone();
			async move { service.execute(batch(sponsored())).await }
		});
		while service.state() != OperationState::AwaitingConfirmation {
			tokio::task::yield_now().await;
		}

		// Refused on the first poll, without suspending.
		let second = service.execute(batch(sponsored())).now_or_never();
		assert_eq!(second, Some(Err(DeliveryError::OperationInProgress)));

		let first = first.await.unwrap().unwrap();
		assert_eq!(first.hash, B256::repeat_byte(0x11));
		assert_eq!(submitter.submits.load(Ordering::SeqCst), 1);
	}
}
