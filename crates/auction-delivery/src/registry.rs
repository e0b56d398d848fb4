//! The single in-flight operation slot and its one-shot completion.

use crate::DeliveryError;
use auction_types::{BatchSpec, Call, CorrelationId, OperationState, SponsorCapability};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, info};

/// One-shot completion shared by everything that may settle an operation.
///
/// The first call to [`Completion::complete`] wins; later calls are no-ops and
/// report `false`. The guard lives in the object, so racing settlers (a late
/// poll tick and the timeout) cannot deliver twice.
pub struct Completion<T> {
	resolved: Arc<AtomicBool>,
	sender: Arc<Mutex<Option<oneshot::Sender<T>>>>,
}

impl<T> Clone for Completion<T> {
	fn clone(&self) -> Self {
		Self {
			resolved: self.resolved.clone(),
			sender: self.sender.clone(),
		}
	}
}

impl<T> Completion<T> {
	pub fn new() -> (Self, oneshot::Receiver<T>) {
		let (tx, rx) = oneshot::channel();
		let completion = Self {
			resolved: Arc::new(AtomicBool::new(false)),
			sender: Arc::new(Mutex::new(Some(tx))),
		};
		(completion, rx)
	}

	/// Settles the completion with `value`. Returns whether this call did it.
	pub fn complete(&self, value: T) -> bool {
		if self
			.resolved
			.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
			.is_err()
		{
			return false;
		}

		let sender = self
			.sender
			.lock()
			.unwrap_or_else(PoisonError::into_inner)
			.take();
		if let Some(sender) = sender {
			// The receiver may be gone if the caller stopped waiting.
			let _ = sender.send(value);
		}
		true
	}

	pub fn is_resolved(&self) -> bool {
		self.resolved.load(Ordering::Acquire)
	}
}

/// The operation currently occupying the executor.
#[derive(Debug, Clone)]
pub struct PendingOperation {
	pub correlation_id: Option<CorrelationId>,
	pub calls: Vec<Call>,
	pub capability: SponsorCapability,
	pub state: OperationState,
}

#[derive(Debug, Default)]
struct Slots {
	current: Option<PendingOperation>,
	last_terminal: Option<OperationState>,
}

/// Owns the exclusive operation slot of one executor.
///
/// Opened only by `execute`, closed only when the operation reaches a
/// terminal state (or its [`SlotGuard`] is dropped).
#[derive(Debug, Default)]
pub struct PendingOperationRegistry {
	slots: Mutex<Slots>,
}

impl PendingOperationRegistry {
	pub fn new() -> Arc<Self> {
		Arc::new(Self::default())
	}

	fn lock(&self) -> MutexGuard<'_, Slots> {
		self.slots.lock().unwrap_or_else(PoisonError::into_inner)
	}

	/// Claims the slot for `batch`, or fails if an operation is in flight.
	///
	/// Never awaits, so a concurrent caller is refused before it can suspend.
	pub fn open(self: &Arc<Self>, batch: &BatchSpec) -> Result<SlotGuard, DeliveryError> {
		let mut slots = self.lock();
		if slots.current.is_some() {
			return Err(DeliveryError::OperationInProgress);
		}
		slots.current = Some(PendingOperation {
			correlation_id: None,
			calls: batch.calls.clone(),
			capability: batch.capability.clone(),
			state: OperationState::Submitting,
		});
		Ok(SlotGuard {
			registry: self.clone(),
			closed: false,
		})
	}

	/// State of the in-flight operation, or `Idle`.
	pub fn state(&self) -> OperationState {
		self.lock()
			.current
			.as_ref()
			.map(|op| op.state)
			.unwrap_or(OperationState::Idle)
	}

	pub fn is_busy(&self) -> bool {
		self.lock().current.is_some()
	}

	/// Correlation id of the operation awaiting confirmation, if any.
	pub fn pending_id(&self) -> Option<CorrelationId> {
		self.lock()
			.current
			.as_ref()
			.and_then(|op| op.correlation_id.clone())
	}

	pub fn current(&self) -> Option<PendingOperation> {
		self.lock().current.clone()
	}

	/// Terminal state of the most recently closed operation.
	pub fn last_terminal(&self) -> Option<OperationState> {
		self.lock().last_terminal
	}

	/// Waits for `outcome`, settling it with a timeout error after `timeout`.
	///
	/// The timer settles through the same [`Completion`] as the poller, so
	/// whichever comes first is the only result the caller ever sees.
	pub async fn wait<T>(
		&self,
		completion: Completion<Result<T, DeliveryError>>,
		outcome: oneshot::Receiver<Result<T, DeliveryError>>,
		timeout: Duration,
	) -> Result<T, DeliveryError>
	where
		T: Send + 'static,
	{
		let timer = tokio::spawn(async move {
			tokio::time::sleep(timeout).await;
			if completion.complete(Err(DeliveryError::ConfirmationTimeout {
				timeout_ms: timeout.as_millis() as u64,
			})) {
				debug!("Confirmation timer fired");
			}
		});

		let result = outcome.await.unwrap_or_else(|_| {
			Err(DeliveryError::Submission(
				"confirmation tracking stopped unexpectedly".to_string(),
			))
		});
		timer.abort();
		result
	}
}

/// Exclusive hold on the registry slot. Dropping it closes the slot.
pub struct SlotGuard {
	registry: Arc<PendingOperationRegistry>,
	closed: bool,
}

impl SlotGuard {
	/// Records the correlation id and moves to `AwaitingConfirmation`.
	pub fn awaiting(&self, id: CorrelationId) {
		let mut slots = self.registry.lock();
		if let Some(op) = slots.current.as_mut() {
			op.correlation_id = Some(id);
			op.state = OperationState::AwaitingConfirmation;
		}
	}

	/// Closes the slot with a terminal `state`.
	pub fn finish(mut self, state: OperationState) {
		debug_assert!(state.is_terminal());
		self.close(state);
	}

	fn close(&mut self, state: OperationState) {
		if self.closed {
			return;
		}
		self.closed = true;

		let mut slots = self.registry.lock();
		if let Some(op) = slots.current.take() {
			info!(
				id = op.correlation_id.as_ref().map(|id| id.0.as_str()).unwrap_or("-"),
				from = ?op.state,
				to = ?state,
				"Operation closed"
			);
		}
		slots.last_terminal = Some(state);
	}
}

impl Drop for SlotGuard {
	fn drop(&mut self) {
		// Reached when the caller abandons `execute` before a terminal state.
		self.close(OperationState::Failed);
	}
}
