//! Auction state discovery.
//!
//! Two sources can describe the current round: a GraphQL indexer and the
//! auction house contract itself. [`AuctionStateReconciler`] prefers the
//! indexer, falls back to contract reads and keeps one canonical snapshot.

use async_trait::async_trait;
use auction_types::{Auction, ConfigSchema, ProtocolParams, SnapshotSource};
use thiserror::Error;

mod reconciler;

pub mod implementations {
	pub mod contract;
	pub mod indexer;
}

pub use reconciler::AuctionStateReconciler;

#[derive(Debug, Error)]
pub enum DiscoveryError {
	#[error("Indexer unavailable: {0}")]
	IndexerUnavailable(String),
	#[error("Contract read failed: {0}")]
	ContractRead(String),
	#[error("Monitoring already running")]
	AlreadyMonitoring,
	#[error("Invalid configuration: {0}")]
	Config(String),
}

/// A source of auction records.
#[async_trait]
pub trait DiscoveryInterface: Send + Sync {
	fn config_schema(&self) -> Box<dyn ConfigSchema>;

	/// Which kind of backend this is.
	fn source(&self) -> SnapshotSource;

	/// Fetches the most recent auction, or `None` if the source knows of none.
	async fn fetch_auction(&self) -> Result<Option<Auction>, DiscoveryError>;

	/// Reads the auction house parameters, if this source can.
	async fn protocol_params(&self) -> Result<Option<ProtocolParams>, DiscoveryError> {
		Ok(None)
	}
}
