//! Canonical auction snapshot maintained from the indexer and the contract.

use crate::{DiscoveryError, DiscoveryInterface};
use arc_swap::ArcSwapOption;
use auction_types::{
	current_timestamp, Auction, AuctionEvent, AuctionSnapshot, EventBus, ProtocolParams,
	RelayEvent, SnapshotSource,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, warn};

/// Keeps one canonical [`Auction`] snapshot up to date.
///
/// Readers never block: the snapshot is swapped atomically. Refreshes are
/// serialized so two overlapping refetches cannot interleave their writes.
pub struct AuctionStateReconciler {
	indexer: Option<Arc<dyn DiscoveryInterface>>,
	contract: Arc<dyn DiscoveryInterface>,
	snapshot: ArcSwapOption<AuctionSnapshot>,
	params: ArcSwapOption<ProtocolParams>,
	refresh: Mutex<()>,
	stop_signal: Mutex<Option<mpsc::Sender<()>>>,
	poll_interval: Duration,
	events: Option<EventBus>,
}

impl AuctionStateReconciler {
	pub fn new(
		indexer: Option<Arc<dyn DiscoveryInterface>>,
		contract: Arc<dyn DiscoveryInterface>,
		poll_interval: Duration,
	) -> Self {
		Self {
			indexer,
			contract,
			snapshot: ArcSwapOption::empty(),
			params: ArcSwapOption::empty(),
			refresh: Mutex::new(()),
			stop_signal: Mutex::new(None),
			poll_interval,
			events: None,
		}
	}

	/// Publishes snapshot changes on `events`.
	pub fn with_events(mut self, events: EventBus) -> Self {
		self.events = Some(events);
		self
	}

	/// The current canonical auction, if any fetch has succeeded yet.
	pub fn get_auction(&self) -> Option<Auction> {
		self.snapshot.load_full().map(|s| s.auction.clone())
	}

	pub fn snapshot(&self) -> Option<AuctionSnapshot> {
		self.snapshot.load_full().map(|s| (*s).clone())
	}

	/// Refreshes the snapshot.
	///
	/// The indexer is tried first when configured; any failure there is logged
	/// and the contract is read instead. Only a failed contract read is
	/// returned to the caller.
	pub async fn refetch(&self) -> Result<(), DiscoveryError> {
		let _guard = self.refresh.lock().await;

		if let Some(indexer) = &self.indexer {
			match indexer.fetch_auction().await {
				Ok(Some(auction)) => {
					self.apply(auction, SnapshotSource::Indexer);
					return Ok(());
				}
				Ok(None) => warn!("Indexer has no auctions, reading contract"),
				Err(e) => warn!("Indexer fetch failed, reading contract: {}", e),
			}
		}

		let auction = self
			.contract
			.fetch_auction()
			.await?
			.ok_or_else(|| DiscoveryError::ContractRead("auction house returned no auction".into()))?;
		self.apply(auction, SnapshotSource::Contract);

		if let Err(e) = self.reload_params().await {
			warn!("Protocol parameter refresh failed: {}", e);
		}
		Ok(())
	}

	/// Auction house parameters, read from the contract on first use.
	pub async fn protocol_params(&self) -> Result<ProtocolParams, DiscoveryError> {
		if let Some(params) = self.params.load_full() {
			return Ok((*params).clone());
		}
		self.reload_params().await
	}

	async fn reload_params(&self) -> Result<ProtocolParams, DiscoveryError> {
		let params = self.contract.protocol_params().await?.unwrap_or_default();
		self.params.store(Some(Arc::new(params.clone())));
		Ok(params)
	}

	/// Installs `auction` unless it describes an older round.
	///
	/// Within one round `settled` never reverts and `amount` never decreases.
	///
	/// Returns whether the snapshot changed.
	fn apply(&self, mut auction: Auction, source: SnapshotSource) -> bool {
		let previous = self.snapshot.load_full();

		if let Some(previous) = previous.as_deref() {
			let current = &previous.auction;
			if auction.noun_id < current.noun_id {
				debug!(
					fetched = %auction.noun_id,
					current = %current.noun_id,
					%source,
					"Ignoring record for an older round"
				);
				return false;
			}
			if auction.noun_id == current.noun_id {
				if current.settled {
					auction.settled = true;
				}
				if auction.amount < current.amount {
					debug!(
						noun_id = %auction.noun_id,
						fetched = %auction.amount,
						current = %current.amount,
						%source,
						"Keeping higher known bid"
					);
					auction.amount = current.amount;
					auction.bidder = current.bidder;
				}
			}
			if previous.auction == auction && previous.source == source {
				return false;
			}
		}

		let snapshot = AuctionSnapshot {
			auction,
			source,
			fetched_at: current_timestamp(),
		};
		let previous_id = previous.as_ref().map(|p| p.auction.noun_id);
		info!(
			noun_id = %snapshot.auction.noun_id,
			amount = %snapshot.auction.amount,
			settled = snapshot.auction.settled,
			%source,
			"Auction snapshot updated"
		);
		self.snapshot.store(Some(Arc::new(snapshot.clone())));

		if let Some(events) = &self.events {
			if let Some(previous) = previous_id.filter(|id| *id < snapshot.auction.noun_id) {
				let _ = events.publish(RelayEvent::Auction(AuctionEvent::NewRound {
					previous,
					current: snapshot.auction.noun_id,
				}));
			}
			let _ = events.publish(RelayEvent::Auction(AuctionEvent::Updated { snapshot }));
		}
		true
	}

	/// Starts the periodic refresh loop. The first refresh runs immediately.
	pub async fn start_monitoring(self: &Arc<Self>) -> Result<(), DiscoveryError> {
		let mut stop_signal = self.stop_signal.lock().await;
		if stop_signal.is_some() {
			return Err(DiscoveryError::AlreadyMonitoring);
		}

		let (stop_tx, stop_rx) = mpsc::channel(1);
		*stop_signal = Some(stop_tx);

		let reconciler = self.clone();
		tokio::spawn(async move {
			reconciler.monitoring_loop(stop_rx).await;
		});

		info!(interval_secs = self.poll_interval.as_secs(), "Auction monitoring started");
		Ok(())
	}

	pub async fn stop_monitoring(&self) {
		if let Some(stop_tx) = self.stop_signal.lock().await.take() {
			let _ = stop_tx.send(()).await;
			info!("Auction monitoring stopped");
		}
	}

	pub async fn is_monitoring(&self) -> bool {
		self.stop_signal.lock().await.is_some()
	}

	async fn monitoring_loop(&self, mut stop_rx: mpsc::Receiver<()>) {
		let mut interval = tokio::time::interval(self.poll_interval);

		loop {
			tokio::select! {
				_ = interval.tick() => {
					if let Err(e) = self.refetch().await {
						warn!("Auction refresh failed: {}", e);
					}
				}
				_ = stop_rx.recv() => {
					break;
				}
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use alloy::primitives::{address, Address, U256};
	use async_trait::async_trait;
	use auction_types::{ConfigSchema, Schema, ValidationError};
	use std::sync::atomic::{AtomicUsize, Ordering};
	use std::sync::Mutex as StdMutex;

	struct NoSchema;

	impl ConfigSchema for NoSchema {
		fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
			Schema::default().validate(config)
		}
	}

	struct FakeSource {
		kind: SnapshotSource,
		result: StdMutex<Result<Option<Auction>, String>>,
		params: Option<ProtocolParams>,
		calls: AtomicUsize,
	}

	impl FakeSource {
		fn new(kind: SnapshotSource, result: Result<Option<Auction>, String>) -> Arc<Self> {
			Arc::new(Self {
				kind,
				result: StdMutex::new(result),
				params: Some(ProtocolParams {
					reserve_price: Some(U256::from(100)),
					min_bid_increment_percentage: 5,
					duration: Some(300),
				}),
				calls: AtomicUsize::new(0),
			})
		}

		fn set(&self, result: Result<Option<Auction>, String>) {
			*self.result.lock().unwrap() = result;
		}
	}

	#[async_trait]
	impl DiscoveryInterface for FakeSource {
		fn config_schema(&self) -> Box<dyn ConfigSchema> {
			Box::new(NoSchema)
		}

		fn source(&self) -> SnapshotSource {
			self.kind
		}

		async fn fetch_auction(&self) -> Result<Option<Auction>, DiscoveryError> {
			self.calls.fetch_add(1, Ordering::SeqCst);
			self.result.lock().unwrap().clone().map_err(|e| match self.kind {
				SnapshotSource::Indexer => DiscoveryError::IndexerUnavailable(e),
				SnapshotSource::Contract => DiscoveryError::ContractRead(e),
			})
		}

		async fn protocol_params(&self) -> Result<Option<ProtocolParams>, DiscoveryError> {
			Ok(self.params.clone())
		}
	}

	fn auction(noun_id: u64, amount: u64) -> Auction {
		Auction {
			noun_id: U256::from(noun_id),
			amount: U256::from(amount),
			start_time: 1_700_000_000,
			end_time: 1_700_000_300,
			bidder: if amount == 0 {
				Address::ZERO
			} else {
				address!("0x00000000000000000000000000000000000000aa")
			},
			settled: false,
		}
	}

	fn reconciler(
		indexer: Option<Arc<FakeSource>>,
		contract: Arc<FakeSource>,
	) -> AuctionStateReconciler {
		AuctionStateReconciler::new(
			indexer.map(|i| i as Arc<dyn DiscoveryInterface>),
			contract,
			Duration::from_secs(15),
		)
	}

	#[tokio::test]
	async fn test_indexer_preferred_over_contract() {
		let indexer = FakeSource::new(SnapshotSource::Indexer, Ok(Some(auction(7, 10))));
		let contract = FakeSource::new(SnapshotSource::Contract, Ok(Some(auction(7, 99))));
		let reconciler = reconciler(Some(indexer), contract.clone());

		reconciler.refetch().await.unwrap();

		assert_eq!(reconciler.get_auction(), Some(auction(7, 10)));
		assert_eq!(reconciler.snapshot().unwrap().source, SnapshotSource::Indexer);
		assert_eq!(contract.calls.load(Ordering::SeqCst), 0);
	}

	#[tokio::test]
	async fn test_indexer_failure_falls_back_silently() {
		let indexer = FakeSource::new(SnapshotSource::Indexer, Err("502".to_string()));
		let contract = FakeSource::new(SnapshotSource::Contract, Ok(Some(auction(7, 99))));
		let reconciler = reconciler(Some(indexer), contract);

		reconciler.refetch().await.unwrap();

		assert_eq!(reconciler.get_auction(), Some(auction(7, 99)));
		assert_eq!(reconciler.snapshot().unwrap().source, SnapshotSource::Contract);
		// Contract cycles also refresh the cached parameters.
		assert_eq!(
			reconciler.protocol_params().await.unwrap().reserve_price,
			Some(U256::from(100))
		);
	}

	#[tokio::test]
	async fn test_empty_indexer_falls_back() {
		let indexer = FakeSource::new(SnapshotSource::Indexer, Ok(None));
		let contract = FakeSource::new(SnapshotSource::Contract, Ok(Some(auction(3, 0))));
		let reconciler = reconciler(Some(indexer), contract);

		reconciler.refetch().await.unwrap();
		assert_eq!(reconciler.get_auction(), Some(auction(3, 0)));
	}

	#[tokio::test]
	async fn test_contract_failure_surfaces() {
		let contract = FakeSource::new(SnapshotSource::Contract, Err("rpc down".to_string()));
		let reconciler = reconciler(None, contract);

		assert!(matches!(
			reconciler.refetch().await,
			Err(DiscoveryError::ContractRead(_))
		));
		assert!(reconciler.get_auction().is_none());
	}

	#[tokio::test]
	async fn test_older_round_ignored_and_settled_sticky() {
		let contract = FakeSource::new(SnapshotSource::Contract, Ok(Some(auction(8, 0))));
		let reconciler = reconciler(None, contract.clone());
		reconciler.refetch().await.unwrap();

		contract.set(Ok(Some(auction(7, 50))));
		reconciler.refetch().await.unwrap();
		assert_eq!(reconciler.get_auction().unwrap().noun_id, U256::from(8));

		let mut settled = auction(8, 0);
		settled.settled = true;
		contract.set(Ok(Some(settled)));
		reconciler.refetch().await.unwrap();

		contract.set(Ok(Some(auction(8, 0))));
		reconciler.refetch().await.unwrap();
		assert!(reconciler.get_auction().unwrap().settled);
	}

	#[tokio::test]
	async fn test_lagging_indexer_cannot_lower_amount() {
		let indexer = FakeSource::new(SnapshotSource::Indexer, Err("502".to_string()));
		let contract = FakeSource::new(SnapshotSource::Contract, Ok(Some(auction(7, 2_000))));
		let reconciler = reconciler(Some(indexer.clone()), contract);
		reconciler.refetch().await.unwrap();
		assert_eq!(reconciler.get_auction().unwrap().amount, U256::from(2_000));

		let mut behind = auction(7, 1_000);
		behind.bidder = address!("0x00000000000000000000000000000000000000cc");
		indexer.set(Ok(Some(behind)));
		reconciler.refetch().await.unwrap();

		let current = reconciler.get_auction().unwrap();
		assert_eq!(current.amount, U256::from(2_000));
		assert_eq!(current.bidder, address!("0x00000000000000000000000000000000000000aa"));

		indexer.set(Ok(Some(auction(7, 3_000))));
		reconciler.refetch().await.unwrap();
		assert_eq!(reconciler.get_auction().unwrap().amount, U256::from(3_000));

		// A new round starts from its own amount.
		indexer.set(Ok(Some(auction(8, 0))));
		reconciler.refetch().await.unwrap();
		assert_eq!(reconciler.get_auction().unwrap().amount, U256::ZERO);
	}

	#[tokio::test]
	async fn test_new_round_published() {
		let events = EventBus::new(16);
		let mut rx = events.subscribe();
		let contract = FakeSource::new(SnapshotSource::Contract, Ok(Some(auction(8, 0))));
		let reconciler = reconciler(None, contract.clone()).with_events(events);

		reconciler.refetch().await.unwrap();
		contract.set(Ok(Some(auction(9, 0))));
		reconciler.refetch().await.unwrap();

		let mut saw_new_round = false;
		while let Ok(event) = rx.try_recv() {
			if let RelayEvent::Auction(AuctionEvent::NewRound { previous, current }) = event {
				assert_eq!(previous, U256::from(8));
				assert_eq!(current, U256::from(9));
				saw_new_round = true;
			}
		}
		assert!(saw_new_round);
	}

	#[tokio::test(start_paused = true)]
	async fn test_monitoring_refreshes_on_interval() {
		let contract = FakeSource::new(SnapshotSource::Contract, Ok(Some(auction(1, 0))));
		let reconciler = Arc::new(reconciler(None, contract.clone()));

		reconciler.start_monitoring().await.unwrap();
		assert!(matches!(
			reconciler.start_monitoring().await,
			Err(DiscoveryError::AlreadyMonitoring)
		));

		tokio::time::sleep(Duration::from_secs(31)).await;
		assert_eq!(contract.calls.load(Ordering::SeqCst), 3);
		assert!(reconciler.get_auction().is_some());

		reconciler.stop_monitoring().await;
		assert!(!reconciler.is_monitoring().await);
		tokio::time::sleep(Duration::from_secs(60)).await;
		assert_eq!(contract.calls.load(Ordering::SeqCst), 3);
	}
}
