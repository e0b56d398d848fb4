//! Wiring of the relay services into one engine.
//!
//! [`EngineBuilder`] turns a loaded [`auction_config::Config`] into an
//! [`AuctionEngine`] using registered backend factories. The engine exposes
//! the operations the HTTP API and the CLI call.

use auction_delivery::DeliveryError;
use auction_discovery::DiscoveryError;
use auction_order::BidError;
use auction_settlement::SettlementError;
use thiserror::Error;

mod builder;
mod engine;

pub use builder::EngineBuilder;
pub use engine::{AuctionEngine, AuctionView};

#[derive(Debug, Error)]
pub enum EngineError {
	#[error("Configuration error: {0}")]
	Config(String),
	#[error(transparent)]
	Delivery(#[from] DeliveryError),
	#[error(transparent)]
	Discovery(#[from] DiscoveryError),
	#[error(transparent)]
	Bid(#[from] BidError),
	#[error(transparent)]
	Settlement(#[from] SettlementError),
}
