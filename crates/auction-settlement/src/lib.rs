//! Settlement of finished auction rounds.
//!
//! Settlement tries a fixed, ordered list of auction house entry points
//! through the sponsored executor and stops at the first one that lands.
//! The list is data: [`EntryPoint::defaults`] puts the common path
//! (settle and open the next round) first and the paused-house path second.

use alloy::primitives::Address;
use async_trait::async_trait;
use auction_delivery::DeliveryError;
use auction_order::calls;
use auction_types::{
	AttemptOutcome, Call, EventBus, ExecutionResult, RelayEvent, SettlementAttempt,
	SettlementEvent, SettlementOutcome,
};
use futures::{future, pin_mut, stream, StreamExt};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum SettlementError {
	#[error(
		"Settlement failed on every entry point ({attempts} tried). Last error: {last_error}. \
		 The auction house or its settlement functions may not be allow-listed by the sponsor, \
		 or the contract may require a different kind of connected account."
	)]
	Exhausted {
		last_error: DeliveryError,
		attempts: usize,
	},
	#[error("No settlement entry points configured")]
	NoEntryPoints,
}

/// Runs one call through the sponsored executor.
#[async_trait]
pub trait SettlementExecutor: Send + Sync {
	async fn execute_call(&self, call: Call) -> Result<ExecutionResult, DeliveryError>;
}

/// A named way to settle the current round.
#[derive(Debug, Clone, Copy)]
pub struct EntryPoint {
	pub name: &'static str,
	build: fn(Address) -> Call,
}

impl EntryPoint {
	pub const SETTLE_AND_CREATE: EntryPoint = EntryPoint {
		name: "settleCurrentAndCreateNewAuction",
		build: calls::settle_current_and_create_new_auction,
	};

	pub const SETTLE_ONLY: EntryPoint = EntryPoint {
		name: "settleAuction",
		build: calls::settle_auction,
	};

	pub fn new(name: &'static str, build: fn(Address) -> Call) -> Self {
		Self { name, build }
	}

	/// Entry points in the order they are tried.
	pub fn defaults() -> Vec<EntryPoint> {
		vec![Self::SETTLE_AND_CREATE, Self::SETTLE_ONLY]
	}

	pub fn call(&self, house: Address) -> Call {
		(self.build)(house)
	}
}

/// A successful settlement.
#[derive(Debug, Clone)]
pub struct Settled {
	pub outcome: SettlementOutcome,
	pub entry_point: &'static str,
	pub execution: ExecutionResult,
	pub attempts: Vec<SettlementAttempt>,
}

pub struct SettlementService {
	house: Address,
	entry_points: Vec<EntryPoint>,
	events: Option<EventBus>,
}

impl SettlementService {
	pub fn new(house: Address, entry_points: Vec<EntryPoint>) -> Self {
		Self {
			house,
			entry_points,
			events: None,
		}
	}

	pub fn with_events(mut self, events: EventBus) -> Self {
		self.events = Some(events);
		self
	}

	pub fn entry_points(&self) -> &[EntryPoint] {
		&self.entry_points
	}

	/// Tries each entry point in order until one succeeds.
	///
	/// Later entry points are never attempted once one lands. When all fail
	/// the error carries the last failure.
	pub async fn settle(
		&self,
		executor: &dyn SettlementExecutor,
	) -> Result<Settled, SettlementError> {
		if self.entry_points.is_empty() {
			return Err(SettlementError::NoEntryPoints);
		}

		let mut attempts = Vec::with_capacity(self.entry_points.len());
		let mut last_error = None;

		let settled = {
			let outcomes = stream::iter(self.entry_points.iter())
				.then(|entry| async move {
					info!(entry_point = entry.name, "Attempting settlement");
					(entry.name, executor.execute_call(entry.call(self.house)).await)
				})
				.inspect(|(name, result)| {
					let attempt = SettlementAttempt {
						entry_point: name.to_string(),
						outcome: match result {
							Ok(_) => AttemptOutcome::Success,
							Err(e) => AttemptOutcome::Error(e.to_string()),
						},
					};
					if let Err(e) = result {
						warn!(entry_point = name, "Settlement entry point failed: {}", e);
						last_error = Some(e.clone());
					}
					self.publish(SettlementEvent::Attempted {
						attempt: attempt.clone(),
					});
					attempts.push(attempt);
				})
				.filter_map(|(name, result)| future::ready(result.ok().map(|r| (name, r))));
			pin_mut!(outcomes);
			outcomes.next().await
		};

		match settled {
			Some((entry_point, execution)) => {
				info!(entry_point, tx_hash = %execution.hash, "Auction settled");
				self.publish(SettlementEvent::Completed {
					entry_point: entry_point.to_string(),
				});
				Ok(Settled {
					outcome: SettlementOutcome::Success,
					entry_point,
					execution,
					attempts,
				})
			}
			None => {
				let last_error = last_error.unwrap_or_else(|| {
					DeliveryError::Submission("no settlement attempt ran".to_string())
				});
				self.publish(SettlementEvent::Exhausted {
					last_error: last_error.to_string(),
				});
				Err(SettlementError::Exhausted {
					last_error,
					attempts: attempts.len(),
				})
			}
		}
	}

	fn publish(&self, event: SettlementEvent) {
		if let Some(events) = &self.events {
			let _ = events.publish(RelayEvent::Settlement(event));
		}
	}
}
