use crate::EngineError;
use alloy::primitives::{Address, U256};
use async_trait::async_trait;
use auction_account::{AccountError, AccountService};
use auction_config::Config;
use auction_delivery::{DeliveryError, DeliveryService};
use auction_discovery::AuctionStateReconciler;
use auction_order::{calls, min_bid, validate_bid};
use auction_settlement::{SettlementExecutor, SettlementService, Settled};
use auction_types::{
	current_timestamp, truncate_hash, AuctionSnapshot, AuctionStatus, BatchSpec, Call, EventBus,
	ExecutionResult, PendingOperationView, RelayEvent,
};
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

/// Everything a client needs to render the current round.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuctionView {
	pub snapshot: AuctionSnapshot,
	pub status: AuctionStatus,
	pub countdown_ms: u64,
	/// Floor for the next bid. Absent when the round has no bids and no reserve.
	pub min_required_wei: Option<U256>,
}

pub struct AuctionEngine {
	pub(crate) config: Config,
	pub(crate) chain_id: u64,
	pub(crate) house: Address,
	pub(crate) settle_lag: Duration,
	pub(crate) account: Arc<AccountService>,
	pub(crate) delivery: Arc<DeliveryService>,
	pub(crate) reconciler: Arc<AuctionStateReconciler>,
	pub(crate) settlement: Arc<SettlementService>,
	pub(crate) event_bus: EventBus,
}

/// Adapts the engine's sponsored path to the settlement seam.
struct SponsoredExecutor<'a> {
	engine: &'a AuctionEngine,
}

#[async_trait]
impl SettlementExecutor for SponsoredExecutor<'_> {
	async fn execute_call(&self, call: Call) -> Result<ExecutionResult, DeliveryError> {
		self.engine.submit(vec![call]).await
	}
}

impl AuctionEngine {
	/// Runs the refresh loop and logs relay events until `shutdown` resolves.
	pub async fn run<F>(&self, shutdown: F) -> Result<(), EngineError>
	where
		F: Future<Output = ()>,
	{
		self.reconciler.start_monitoring().await?;
		let mut events = self.event_bus.subscribe();
		tokio::pin!(shutdown);

		loop {
			tokio::select! {
				event = events.recv() => match event {
					Ok(event) => log_event(&event),
					Err(RecvError::Lagged(skipped)) => {
						warn!(skipped, "Event log fell behind");
					}
					Err(RecvError::Closed) => break,
				},
				_ = &mut shutdown => {
					info!("Shutting down auction relay");
					break;
				}
			}
		}

		self.reconciler.stop_monitoring().await;
		Ok(())
	}

	/// Submits `calls` as one sponsored batch from the connected account.
	pub async fn execute(&self, calls: Vec<Call>) -> Result<ExecutionResult, EngineError> {
		Ok(self.submit(calls).await?)
	}

	async fn submit(&self, calls: Vec<Call>) -> Result<ExecutionResult, DeliveryError> {
		let capability = match self.account.sponsor_capability(self.chain_id).await {
			Ok(capability) => capability,
			Err(AccountError::NotConnected) => return Err(DeliveryError::NotConnected),
			Err(e) => return Err(DeliveryError::Submission(e.to_string())),
		};
		let from = self
			.account
			.connected_address()
			.map_err(|_| DeliveryError::NotConnected)?;

		self.delivery
			.execute(BatchSpec {
				from,
				chain_id: self.chain_id,
				calls,
				capability,
			})
			.await
	}

	/// Bids `amount` wei on the current round.
	///
	/// The bid is checked against the round's status and floor before anything
	/// is submitted. State is re-read after the bid lands.
	pub async fn place_bid(&self, amount: U256) -> Result<ExecutionResult, EngineError> {
		let auction = self.reconciler.get_auction();
		let params = self.reconciler.protocol_params().await?;
		validate_bid(auction.as_ref(), &params, amount, current_timestamp())?;

		// Validated above, so a round is known.
		let noun_id = auction.map(|a| a.noun_id).unwrap_or_default();
		info!(%noun_id, %amount, "Placing bid");
		let result = self
			.execute(vec![calls::create_bid(self.house, noun_id, amount)])
			.await?;
		info!(%noun_id, tx_hash = %truncate_hash(&result.hash), "Bid landed");

		if let Err(e) = self.reconciler.refetch().await {
			warn!("Refresh after bid failed: {}", e);
		}
		Ok(result)
	}

	/// Settles the current round, then re-reads state once the new round
	/// has had time to become visible.
	pub async fn settle(&self) -> Result<Settled, EngineError> {
		let settled = self
			.settlement
			.settle(&SponsoredExecutor { engine: self })
			.await?;

		debug!(lag_ms = self.settle_lag.as_millis() as u64, "Waiting before refresh");
		tokio::time::sleep(self.settle_lag).await;
		if let Err(e) = self.reconciler.refetch().await {
			warn!("Refresh after settlement failed: {}", e);
		}
		Ok(settled)
	}

	pub async fn refetch(&self) -> Result<(), EngineError> {
		Ok(self.reconciler.refetch().await?)
	}

	pub fn snapshot(&self) -> Option<AuctionSnapshot> {
		self.reconciler.snapshot()
	}

	pub fn status(&self, now: u64) -> Option<AuctionStatus> {
		self.reconciler.get_auction().map(|a| a.status_at(now))
	}

	pub fn countdown(&self, now: u64) -> Option<Duration> {
		self.reconciler.get_auction().map(|a| a.countdown_at(now))
	}

	/// Floor for the next bid on the current round.
	pub async fn min_required_wei(&self) -> Result<Option<U256>, EngineError> {
		let Some(auction) = self.reconciler.get_auction() else {
			return Ok(None);
		};
		let params = self.reconciler.protocol_params().await?;
		Ok(min_bid(
			&auction,
			params.reserve_price,
			params.min_bid_increment_percentage,
		))
	}

	/// The current round with its derived fields at `now`.
	pub async fn view(&self, now: u64) -> Result<Option<AuctionView>, EngineError> {
		let Some(snapshot) = self.reconciler.snapshot() else {
			return Ok(None);
		};
		let min_required_wei = self.min_required_wei().await?;

		Ok(Some(AuctionView {
			status: snapshot.auction.status_at(now),
			countdown_ms: snapshot.auction.countdown_at(now).as_millis() as u64,
			min_required_wei,
			snapshot,
		}))
	}

	pub fn pending_operation(&self) -> PendingOperationView {
		self.delivery.pending()
	}

	pub fn event_bus(&self) -> &EventBus {
		&self.event_bus
	}

	pub fn config(&self) -> &Config {
		&self.config
	}
}

fn log_event(event: &RelayEvent) {
	match event {
		RelayEvent::Auction(e) => debug!(event = ?e, "Auction event"),
		RelayEvent::Operation(e) => info!(event = ?e, "Operation event"),
		RelayEvent::Settlement(e) => info!(event = ?e, "Settlement event"),
	}
}
