//! EIP-5792 wallet backend.
//!
//! Reads the connected account from configuration and fetches capabilities
//! with `wallet_getCapabilities` over JSON-RPC.

use crate::{AccountError, AccountInterface};
use alloy::primitives::Address;
use alloy::providers::{Provider, RootProvider};
use async_trait::async_trait;
use auction_types::{
	ChainCapabilities, ConfigSchema, Field, FieldType, Schema, ValidationError, WalletCapabilities,
};
use std::collections::HashMap;

/// Wallet reached through an EIP-5792 capable JSON-RPC endpoint.
pub struct Eip5792Account {
	provider: RootProvider,
	address: Option<Address>,
}

impl Eip5792Account {
	pub fn new(wallet_rpc_url: &str, address: Option<Address>) -> Result<Self, AccountError> {
		let url = wallet_rpc_url
			.parse()
			.map_err(|e| AccountError::Config(format!("Invalid wallet RPC URL: {}", e)))?;

		Ok(Self {
			provider: RootProvider::new_http(url),
			address,
		})
	}
}

/// Configuration schema for the EIP-5792 wallet backend.
pub struct Eip5792AccountSchema;

impl ConfigSchema for Eip5792AccountSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		Schema::new(
			vec![Field::new("wallet_rpc_url", FieldType::Url)],
			vec![Field::new("address", FieldType::Address)],
		)
		.validate(config)
	}
}

#[async_trait]
impl AccountInterface for Eip5792Account {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(Eip5792AccountSchema)
	}

	fn address(&self) -> Option<Address> {
		self.address
	}

	async fn capabilities(
		&self,
		account: Address,
		chain_id: u64,
	) -> Result<WalletCapabilities, AccountError> {
		let response: serde_json::Value = self
			.provider
			.raw_request(
				"wallet_getCapabilities".into(),
				(account, vec![format!("{:#x}", chain_id)]),
			)
			.await
			.map_err(|e| AccountError::Provider(format!("wallet_getCapabilities failed: {}", e)))?;

		parse_capabilities(response)
	}
}

/// Parses a `wallet_getCapabilities` result keyed by hex chain id.
pub fn parse_capabilities(value: serde_json::Value) -> Result<WalletCapabilities, AccountError> {
	let entries = match value {
		serde_json::Value::Object(map) => map,
		serde_json::Value::Null => return Ok(WalletCapabilities::default()),
		other => {
			return Err(AccountError::MalformedResponse(format!(
				"expected object, got {}",
				other
			)))
		}
	};

	let mut chains = HashMap::with_capacity(entries.len());
	for (key, caps) in entries {
		let chain_id = parse_chain_id(&key)
			.ok_or_else(|| AccountError::MalformedResponse(format!("bad chain id '{}'", key)))?;
		let caps: ChainCapabilities = serde_json::from_value(caps)
			.map_err(|e| AccountError::MalformedResponse(format!("chain {}: {}", key, e)))?;
		chains.insert(chain_id, caps);
	}

	Ok(WalletCapabilities { chains })
}

fn parse_chain_id(key: &str) -> Option<u64> {
	match key.strip_prefix("0x") {
		Some(hex) => u64::from_str_radix(hex, 16).ok(),
		None => key.parse().ok(),
	}
}

/// Builds the EIP-5792 wallet backend from its config section.
///
/// Required: `wallet_rpc_url`. Optional: `address` (the connected account).
pub fn create_account(config: &toml::Value) -> Result<Box<dyn AccountInterface>, AccountError> {
	Eip5792AccountSchema
		.validate(config)
		.map_err(|e| AccountError::Config(e.to_string()))?;

	let rpc_url = config
		.get("wallet_rpc_url")
		.and_then(|v| v.as_str())
		.ok_or_else(|| AccountError::Config("wallet_rpc_url is required".to_string()))?;

	let address = config
		.get("address")
		.and_then(|v| v.as_str())
		.map(|s| s.parse::<Address>())
		.transpose()
		.map_err(|e| AccountError::Config(format!("Invalid account address: {}", e)))?;

	Ok(Box::new(Eip5792Account::new(rpc_url, address)?))
}
