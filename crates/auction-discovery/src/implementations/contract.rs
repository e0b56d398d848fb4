//! Direct reads from the auction house contract.

use crate::{DiscoveryError, DiscoveryInterface};
use alloy::primitives::{Address, U256};
use alloy::providers::RootProvider;
use async_trait::async_trait;
use auction_types::contracts::IAuctionHouse;
use auction_types::{
	Auction, ConfigSchema, Field, FieldType, ProtocolParams, Schema, SnapshotSource,
	ValidationError,
};
use tracing::{debug, warn};

/// The auction struct exactly as the contract reports it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawAuction {
	pub noun_id: U256,
	pub amount: U256,
	pub start_time: u64,
	pub end_time: u64,
	pub bidder: Address,
	pub settled: bool,
}

/// Turns a raw contract read into a canonical record.
///
/// The targeted house reports the round start in its `endTime` slot, so the
/// real end is that value plus `duration`. Without a duration the round reads
/// as already ended.
pub fn remap(raw: &RawAuction, duration: Option<u64>) -> Auction {
	let start_time = raw.end_time;
	let end_time = duration
		.and_then(|d| start_time.checked_add(d))
		.unwrap_or(start_time);

	Auction {
		noun_id: raw.noun_id,
		amount: raw.amount,
		start_time,
		end_time,
		bidder: raw.bidder,
		settled: raw.settled,
	}
}

fn to_u64(value: U256, field: &str) -> Result<u64, DiscoveryError> {
	u64::try_from(value)
		.map_err(|_| DiscoveryError::ContractRead(format!("{} out of range: {}", field, value)))
}

/// Reads auction state straight from the auction house over JSON-RPC.
pub struct AuctionHouseSource {
	contract: IAuctionHouse::IAuctionHouseInstance<RootProvider>,
}

impl AuctionHouseSource {
	pub fn new(rpc_url: &str, house_address: Address) -> Result<Self, DiscoveryError> {
		let url = rpc_url
			.parse()
			.map_err(|e| DiscoveryError::Config(format!("Invalid RPC URL: {}", e)))?;
		let provider = RootProvider::new_http(url);

		Ok(Self {
			contract: IAuctionHouse::new(house_address, provider),
		})
	}

	async fn read_raw(&self) -> Result<RawAuction, DiscoveryError> {
		let auction = self
			.contract
			.auction()
			.call()
			.await
			.map_err(|e| DiscoveryError::ContractRead(format!("auction(): {}", e)))?;

		Ok(RawAuction {
			noun_id: auction.nounId,
			amount: auction.amount,
			start_time: to_u64(auction.startTime, "startTime")?,
			end_time: to_u64(auction.endTime, "endTime")?,
			bidder: auction.bidder,
			settled: auction.settled,
		})
	}

	async fn read_duration(&self) -> Option<u64> {
		match self.contract.duration().call().await {
			Ok(duration) => u64::try_from(duration).ok(),
			Err(e) => {
				warn!("Could not read auction duration: {}", e);
				None
			}
		}
	}
}

/// Configuration schema for [`AuctionHouseSource`].
pub struct AuctionHouseSourceSchema;

impl ConfigSchema for AuctionHouseSourceSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		Schema::new(
			vec![
				Field::new("rpc_url", FieldType::Url),
				Field::new("house_address", FieldType::Address),
			],
			vec![],
		)
		.validate(config)
	}
}

#[async_trait]
impl DiscoveryInterface for AuctionHouseSource {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(AuctionHouseSourceSchema)
	}

	fn source(&self) -> SnapshotSource {
		SnapshotSource::Contract
	}

	async fn fetch_auction(&self) -> Result<Option<Auction>, DiscoveryError> {
		let raw = self.read_raw().await?;
		let duration = self.read_duration().await;
		debug!(noun_id = %raw.noun_id, ?duration, "Read auction from contract");

		Ok(Some(remap(&raw, duration)))
	}

	async fn protocol_params(&self) -> Result<Option<ProtocolParams>, DiscoveryError> {
		let reserve = self
			.contract
			.reservePrice()
			.call()
			.await
			.map_err(|e| DiscoveryError::ContractRead(format!("reservePrice(): {}", e)))?;
		let increment = self
			.contract
			.minBidIncrementPercentage()
			.call()
			.await
			.map_err(|e| {
				DiscoveryError::ContractRead(format!("minBidIncrementPercentage(): {}", e))
			})?;

		Ok(Some(ProtocolParams {
			reserve_price: (!reserve.is_zero()).then_some(reserve),
			min_bid_increment_percentage: increment,
			duration: self.read_duration().await,
		}))
	}
}

/// Builds the contract source.
///
/// Required: `rpc_url`, `house_address`.
pub fn create_contract_source(
	config: &toml::Value,
) -> Result<Box<dyn DiscoveryInterface>, DiscoveryError> {
	AuctionHouseSourceSchema
		.validate(config)
		.map_err(|e| DiscoveryError::Config(e.to_string()))?;

	let rpc_url = config
		.get("rpc_url")
		.and_then(|v| v.as_str())
		.ok_or_else(|| DiscoveryError::Config("rpc_url is required".to_string()))?;
	let house_address = config
		.get("house_address")
		.and_then(|v| v.as_str())
		.ok_or_else(|| DiscoveryError::Config("house_address is required".to_string()))?
		.parse::<Address>()
		.map_err(|e| DiscoveryError::Config(format!("Invalid house address: {}", e)))?;

	Ok(Box::new(AuctionHouseSource::new(rpc_url, house_address)?))
}

#[cfg(test)]
mod tests {
	use super::*;
	use alloy::primitives::address;

	fn raw(start_slot: u64, end_slot: u64) -> RawAuction {
		RawAuction {
			noun_id: U256::from(42),
			amount: U256::ZERO,
			start_time: start_slot,
			end_time: end_slot,
			bidder: Address::ZERO,
			settled: false,
		}
	}

	#[test]
	fn test_remap_end_slot_is_start() {
		let auction = remap(&raw(0, 1_700_000_000), Some(300));
		assert_eq!(auction.start_time, 1_700_000_000);
		assert_eq!(auction.end_time, 1_700_000_300);
		assert_eq!(auction.noun_id, U256::from(42));
	}

	#[test]
	fn test_remap_without_duration_reads_as_ended() {
		let auction = remap(&raw(1_699_999_000, 1_700_000_000), None);
		assert_eq!(auction.start_time, 1_700_000_000);
		assert_eq!(auction.end_time, 1_700_000_000);
		assert_eq!(
			auction.status_at(1_700_000_000),
			auction_types::AuctionStatus::Ended
		);
	}

	#[test]
	fn test_remap_keeps_bid_fields() {
		let mut read = raw(0, 10);
		read.amount = U256::from(5);
		read.bidder = address!("0x00000000000000000000000000000000000000bb");
		read.settled = true;

		let auction = remap(&read, Some(u64::MAX));
		assert_eq!(auction.amount, U256::from(5));
		assert_eq!(auction.bidder, read.bidder);
		assert!(auction.settled);
		// Overflowing end degrades to the start.
		assert_eq!(auction.end_time, 10);
	}

	#[test]
	fn test_create_contract_source_validates() {
		let bad: toml::Value = toml::from_str(
			r#"
			rpc_url = "https://rpc.example.org"
			house_address = "0x1234"
			"#,
		)
		.unwrap();
		assert!(matches!(
			create_contract_source(&bad),
			Err(DiscoveryError::Config(_))
		));
	}
}
