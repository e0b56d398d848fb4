//! Connected-account access and sponsor capability negotiation.
//!
//! The account backend answers two questions: which address is connected, and
//! what the wallet advertises per chain. [`CapabilityNegotiator`] turns the
//! second answer plus the relay's own sponsor configuration into the
//! descriptor attached to every sponsored batch.

use alloy::primitives::Address;
use async_trait::async_trait;
use auction_types::{ConfigSchema, SponsorCapability, WalletCapabilities};
use thiserror::Error;
use tracing::{debug, warn};

pub mod implementations {
	pub mod eip5792;
}

#[derive(Debug, Error)]
pub enum AccountError {
	#[error("No account connected")]
	NotConnected,
	#[error("Wallet provider error: {0}")]
	Provider(String),
	#[error("Malformed wallet response: {0}")]
	MalformedResponse(String),
	#[error("Invalid configuration: {0}")]
	Config(String),
}

#[async_trait]
pub trait AccountInterface: Send + Sync {
	fn config_schema(&self) -> Box<dyn ConfigSchema>;

	/// The connected account, if any.
	fn address(&self) -> Option<Address>;

	/// Capabilities the wallet advertises for `chain_id`.
	async fn capabilities(
		&self,
		account: Address,
		chain_id: u64,
	) -> Result<WalletCapabilities, AccountError>;
}

/// Decides whether sponsored execution is available.
///
/// Pure: it works on capability data that has already been fetched.
#[derive(Debug, Clone, Default)]
pub struct CapabilityNegotiator {
	paymaster_url: Option<String>,
}

impl CapabilityNegotiator {
	pub fn new(paymaster_url: Option<String>) -> Self {
		Self { paymaster_url }
	}

	/// Returns a non-empty descriptor only when the wallet supports a paymaster
	/// on `chain_id` and a sponsor endpoint is configured.
	pub fn negotiate(&self, capabilities: &WalletCapabilities, chain_id: u64) -> SponsorCapability {
		match &self.paymaster_url {
			Some(url) if capabilities.supports_paymaster(chain_id) => {
				SponsorCapability::sponsored(url.clone())
			}
			_ => SponsorCapability::default(),
		}
	}
}

pub struct AccountService {
	provider: Box<dyn AccountInterface>,
	negotiator: CapabilityNegotiator,
}

impl AccountService {
	pub fn new(provider: Box<dyn AccountInterface>, negotiator: CapabilityNegotiator) -> Self {
		Self {
			provider,
			negotiator,
		}
	}

	/// The connected account, or [`AccountError::NotConnected`].
	pub fn connected_address(&self) -> Result<Address, AccountError> {
		self.provider.address().ok_or(AccountError::NotConnected)
	}

	/// Negotiates the sponsor descriptor for the connected account.
	///
	/// A wallet that cannot be queried is treated as advertising nothing, so
	/// callers see an empty descriptor and fail fast.
	pub async fn sponsor_capability(&self, chain_id: u64) -> Result<SponsorCapability, AccountError> {
		let account = self.connected_address()?;
		let capabilities = match self.provider.capabilities(account, chain_id).await {
			Ok(caps) => caps,
			Err(e) => {
				warn!(%account, chain_id, "Failed to fetch wallet capabilities: {}", e);
				WalletCapabilities::default()
			}
		};

		let capability = self.negotiator.negotiate(&capabilities, chain_id);
		debug!(
			%account,
			chain_id,
			sponsored = !capability.is_empty(),
			"Negotiated sponsor capability"
		);
		Ok(capability)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use alloy::primitives::address;
	use auction_types::{CapabilitySupport, ChainCapabilities, Schema};
	use std::collections::HashMap;

	const BASE: u64 = 8453;

	fn caps(chain_id: u64, supported: bool) -> WalletCapabilities {
		let mut chains = HashMap::new();
		chains.insert(
			chain_id,
			ChainCapabilities {
				paymaster_service: Some(CapabilitySupport { supported }),
			},
		);
		WalletCapabilities { chains }
	}

	struct FakeAccount {
		address: Option<Address>,
		capabilities: Option<WalletCapabilities>,
	}

	struct NoSchema;

	impl ConfigSchema for NoSchema {
		fn validate(&self, config: &toml::Value) -> Result<(), auction_types::ValidationError> {
			Schema::default().validate(config)
		}
	}

	#[async_trait]
	impl AccountInterface for FakeAccount {
		fn config_schema(&self) -> Box<dyn ConfigSchema> {
			Box::new(NoSchema)
		}

		fn address(&self) -> Option<Address> {
			self.address
		}

		async fn capabilities(
			&self,
			_account: Address,
			_chain_id: u64,
		) -> Result<WalletCapabilities, AccountError> {
			self.capabilities
				.clone()
				.ok_or_else(|| AccountError::Provider("unreachable".to_string()))
		}
	}

	#[test]
	fn test_negotiate_requires_wallet_support_and_endpoint() {
		let with_endpoint = CapabilityNegotiator::new(Some("https://pm.example.org".to_string()));
		let without_endpoint = CapabilityNegotiator::new(None);

		assert_eq!(
			with_endpoint.negotiate(&caps(BASE, true), BASE),
			SponsorCapability::sponsored("https://pm.example.org")
		);
		assert!(with_endpoint.negotiate(&caps(BASE, false), BASE).is_empty());
		assert!(with_endpoint.negotiate(&caps(1, true), BASE).is_empty());
		assert!(without_endpoint.negotiate(&caps(BASE, true), BASE).is_empty());
	}

	#[tokio::test]
	async fn test_not_connected() {
		let service = AccountService::new(
			Box::new(FakeAccount {
				address: None,
				capabilities: Some(caps(BASE, true)),
			}),
			CapabilityNegotiator::new(Some("https://pm.example.org".to_string())),
		);
		assert!(matches!(
			service.sponsor_capability(BASE).await,
			Err(AccountError::NotConnected)
		));
	}

	#[tokio::test]
	async fn test_unreachable_wallet_yields_empty_descriptor() {
		let service = AccountService::new(
			Box::new(FakeAccount {
				address: Some(address!("0x00000000000000000000000000000000000000aa")),
				capabilities: None,
			}),
			CapabilityNegotiator::new(Some("https://pm.example.org".to_string())),
		);
		assert!(service.sponsor_capability(BASE).await.unwrap().is_empty());
	}
}
