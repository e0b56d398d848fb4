//! Configuration sections.

use serde::{Deserialize, Serialize};

/// Top-level relay configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
	#[serde(default)]
	pub relay: RelayConfig,
	pub network: NetworkConfig,
	pub auction: AuctionConfig,
	/// Absent means contract-read-only mode.
	#[serde(default)]
	pub indexer: Option<IndexerConfig>,
	/// Absent means sponsorship is permanently unavailable.
	#[serde(default)]
	pub sponsor: Option<SponsorConfig>,
	pub account: AccountConfig,
	#[serde(default)]
	pub delivery: DeliveryConfig,
	#[serde(default)]
	pub api: Option<ApiConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RelayConfig {
	#[serde(default = "default_name")]
	pub name: String,
	#[serde(default = "default_log_level")]
	pub log_level: String,
}

impl Default for RelayConfig {
	fn default() -> Self {
		Self {
			name: default_name(),
			log_level: default_log_level(),
		}
	}
}

/// Chain used for read-only calls.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NetworkConfig {
	pub chain_id: u64,
	pub rpc_url: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuctionConfig {
	/// Auction house contract.
	pub house_address: String,
	/// DAO whose auctions the indexer is queried for.
	#[serde(default)]
	pub dao_address: Option<String>,
	/// Interval of the periodic refresh loop.
	#[serde(default = "default_poll_interval_secs")]
	pub poll_interval_secs: u64,
	/// Delay before re-reading state after a settlement lands.
	#[serde(default = "default_settle_lag_ms")]
	pub settle_lag_ms: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IndexerConfig {
	/// GraphQL endpoint.
	pub url: String,
	#[serde(default = "default_indexer_timeout_secs")]
	pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SponsorConfig {
	pub paymaster_url: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AccountConfig {
	/// EIP-5792 wallet endpoint used for capabilities and batch submission.
	pub wallet_rpc_url: String,
	/// Connected account. Absent means no account is connected.
	#[serde(default)]
	pub address: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DeliveryConfig {
	#[serde(default = "default_status_poll_ms")]
	pub poll_interval_ms: u64,
	#[serde(default = "default_confirmation_timeout_ms")]
	pub confirmation_timeout_ms: u64,
}

impl Default for DeliveryConfig {
	fn default() -> Self {
		Self {
			poll_interval_ms: default_status_poll_ms(),
			confirmation_timeout_ms: default_confirmation_timeout_ms(),
		}
	}
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiConfig {
	#[serde(default = "default_true")]
	pub enabled: bool,
	#[serde(default = "default_api_host")]
	pub host: String,
	#[serde(default = "default_api_port")]
	pub port: u16,
}

fn default_name() -> String {
	"auction-relay".to_string()
}

fn default_log_level() -> String {
	"info".to_string()
}

fn default_poll_interval_secs() -> u64 {
	15
}

fn default_settle_lag_ms() -> u64 {
	2_000
}

fn default_indexer_timeout_secs() -> u64 {
	10
}

fn default_status_poll_ms() -> u64 {
	1_000
}

fn default_confirmation_timeout_ms() -> u64 {
	60_000
}

fn default_true() -> bool {
	true
}

fn default_api_host() -> String {
	"127.0.0.1".to_string()
}

fn default_api_port() -> u16 {
	3000
}
