use alloy::primitives::{B256, U256};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::{AuctionSnapshot, CorrelationId, SettlementAttempt};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum RelayEvent {
	Auction(AuctionEvent),
	Operation(OperationEvent),
	Settlement(SettlementEvent),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum AuctionEvent {
	Updated { snapshot: AuctionSnapshot },
	NewRound { previous: U256, current: U256 },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum OperationEvent {
	Submitted { id: CorrelationId },
	Confirmed { id: CorrelationId, hash: B256 },
	Failed { reason: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SettlementEvent {
	Attempted { attempt: SettlementAttempt },
	Completed { entry_point: String },
	Exhausted { last_error: String },
}

pub struct EventBus {
	sender: broadcast::Sender<RelayEvent>,
}

impl EventBus {
	pub fn new(capacity: usize) -> Self {
		let (sender, _) = broadcast::channel(capacity);
		Self { sender }
	}

	pub fn subscribe(&self) -> broadcast::Receiver<RelayEvent> {
		self.sender.subscribe()
	}

	pub fn publish(&self, event: RelayEvent) -> Result<(), broadcast::error::SendError<RelayEvent>> {
		self.sender.send(event)?;
		Ok(())
	}
}

impl Clone for EventBus {
	fn clone(&self) -> Self {
		Self {
			sender: self.sender.clone(),
		}
	}
}
