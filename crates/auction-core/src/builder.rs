//! Construction of an [`AuctionEngine`] from configuration.

use crate::{AuctionEngine, EngineError};
use alloy::primitives::Address;
use auction_account::{AccountError, AccountInterface, AccountService, CapabilityNegotiator};
use auction_config::Config;
use auction_delivery::{DeliveryError, DeliveryInterface, DeliveryService, ExecutorConfig};
use auction_discovery::{AuctionStateReconciler, DiscoveryError, DiscoveryInterface};
use auction_settlement::{EntryPoint, SettlementService};
use auction_types::EventBus;
use std::sync::Arc;
use std::time::Duration;
use toml::map::Map;
use tracing::info;

type AccountFactory =
	Box<dyn Fn(&toml::Value) -> Result<Box<dyn AccountInterface>, AccountError> + Send>;
type DeliveryFactory =
	Box<dyn Fn(&toml::Value) -> Result<Box<dyn DeliveryInterface>, DeliveryError> + Send>;
type DiscoveryFactory =
	Box<dyn Fn(&toml::Value) -> Result<Box<dyn DiscoveryInterface>, DiscoveryError> + Send>;

/// Builds an engine from a [`Config`] and one factory per backend.
pub struct EngineBuilder {
	config: Config,
	account_factory: Option<AccountFactory>,
	delivery_factory: Option<DeliveryFactory>,
	contract_factory: Option<DiscoveryFactory>,
	indexer_factory: Option<DiscoveryFactory>,
	entry_points: Vec<EntryPoint>,
}

impl EngineBuilder {
	pub fn new(config: Config) -> Self {
		Self {
			config,
			account_factory: None,
			delivery_factory: None,
			contract_factory: None,
			indexer_factory: None,
			entry_points: EntryPoint::defaults(),
		}
	}

	pub fn with_account_factory<F>(mut self, factory: F) -> Self
	where
		F: Fn(&toml::Value) -> Result<Box<dyn AccountInterface>, AccountError> + Send + 'static,
	{
		self.account_factory = Some(Box::new(factory));
		self
	}

	pub fn with_delivery_factory<F>(mut self, factory: F) -> Self
	where
		F: Fn(&toml::Value) -> Result<Box<dyn DeliveryInterface>, DeliveryError> + Send + 'static,
	{
		self.delivery_factory = Some(Box::new(factory));
		self
	}

	pub fn with_contract_factory<F>(mut self, factory: F) -> Self
	where
		F: Fn(&toml::Value) -> Result<Box<dyn DiscoveryInterface>, DiscoveryError> + Send + 'static,
	{
		self.contract_factory = Some(Box::new(factory));
		self
	}

	/// Only used when the configuration has an `[indexer]` section.
	pub fn with_indexer_factory<F>(mut self, factory: F) -> Self
	where
		F: Fn(&toml::Value) -> Result<Box<dyn DiscoveryInterface>, DiscoveryError> + Send + 'static,
	{
		self.indexer_factory = Some(Box::new(factory));
		self
	}

	/// Overrides the settlement entry points and their order.
	pub fn with_entry_points(mut self, entry_points: Vec<EntryPoint>) -> Self {
		self.entry_points = entry_points;
		self
	}

	pub fn build(self) -> Result<AuctionEngine, EngineError> {
		let config = self.config;
		let house: Address = config
			.auction
			.house_address
			.parse()
			.map_err(|e| EngineError::Config(format!("Invalid house address: {}", e)))?;
		let event_bus = EventBus::new(1000);

		let account_backend = self
			.account_factory
			.ok_or_else(|| EngineError::Config("Account factory not provided".into()))?(
			&account_section(&config),
		)
		.map_err(|e| EngineError::Config(e.to_string()))?;
		let negotiator =
			CapabilityNegotiator::new(config.sponsor.as_ref().map(|s| s.paymaster_url.clone()));
		let account = Arc::new(AccountService::new(account_backend, negotiator));

		let submitter = self
			.delivery_factory
			.ok_or_else(|| EngineError::Config("Delivery factory not provided".into()))?(
			&delivery_section(&config),
		)
		.map_err(|e| EngineError::Config(e.to_string()))?;
		let delivery = Arc::new(
			DeliveryService::new(
				Arc::from(submitter),
				ExecutorConfig {
					poll_interval: Duration::from_millis(config.delivery.poll_interval_ms),
					confirmation_timeout: Duration::from_millis(
						config.delivery.confirmation_timeout_ms,
					),
				},
			)
			.with_events(event_bus.clone()),
		);

		let contract = self
			.contract_factory
			.ok_or_else(|| EngineError::Config("Contract factory not provided".into()))?(
			&contract_section(&config),
		)
		.map_err(|e| EngineError::Config(e.to_string()))?;

		let indexer = match indexer_section(&config) {
			Some(section) => {
				let factory = self
					.indexer_factory
					.ok_or_else(|| EngineError::Config("Indexer factory not provided".into()))?;
				let indexer = factory(&section).map_err(|e| EngineError::Config(e.to_string()))?;
				Some(Arc::<dyn DiscoveryInterface>::from(indexer))
			}
			None => {
				info!("No indexer configured, reading auction state from the contract only");
				None
			}
		};

		let reconciler = Arc::new(
			AuctionStateReconciler::new(
				indexer,
				Arc::from(contract),
				Duration::from_secs(config.auction.poll_interval_secs),
			)
			.with_events(event_bus.clone()),
		);

		let settlement = Arc::new(
			SettlementService::new(house, self.entry_points).with_events(event_bus.clone()),
		);

		Ok(AuctionEngine {
			chain_id: config.network.chain_id,
			house,
			settle_lag: Duration::from_millis(config.auction.settle_lag_ms),
			account,
			delivery,
			reconciler,
			settlement,
			event_bus,
			config,
		})
	}
}

fn string(value: &str) -> toml::Value {
	toml::Value::String(value.to_string())
}

fn account_section(config: &Config) -> toml::Value {
	let mut section = Map::new();
	section.insert(
		"wallet_rpc_url".to_string(),
		string(&config.account.wallet_rpc_url),
	);
	if let Some(address) = &config.account.address {
		section.insert("address".to_string(), string(address));
	}
	toml::Value::Table(section)
}

fn delivery_section(config: &Config) -> toml::Value {
	let mut section = Map::new();
	section.insert(
		"wallet_rpc_url".to_string(),
		string(&config.account.wallet_rpc_url),
	);
	toml::Value::Table(section)
}

fn contract_section(config: &Config) -> toml::Value {
	let mut section = Map::new();
	section.insert("rpc_url".to_string(), string(&config.network.rpc_url));
	section.insert(
		"house_address".to_string(),
		string(&config.auction.house_address),
	);
	toml::Value::Table(section)
}

fn indexer_section(config: &Config) -> Option<toml::Value> {
	let indexer = config.indexer.as_ref()?;
	let mut section = Map::new();
	section.insert("url".to_string(), string(&indexer.url));
	if let Some(dao) = &config.auction.dao_address {
		section.insert("dao_address".to_string(), string(dao));
	}
	section.insert(
		"timeout_secs".to_string(),
		toml::Value::Integer(indexer.timeout_secs as i64),
	);
	Some(toml::Value::Table(section))
}
