//! Account capability types.
//!
//! Wallets advertise per-chain capabilities (EIP-5792). The relay only cares
//! about sponsored execution through a paymaster service.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Paymaster endpoint that pays gas for allow-listed calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymasterService {
	pub url: String,
}

/// Capability descriptor attached to a sponsored batch.
///
/// An empty descriptor means sponsorship is unavailable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SponsorCapability {
	#[serde(skip_serializing_if = "Option::is_none")]
	pub paymaster_service: Option<PaymasterService>,
}

impl SponsorCapability {
	pub fn sponsored(url: impl Into<String>) -> Self {
		Self {
			paymaster_service: Some(PaymasterService { url: url.into() }),
		}
	}

	pub fn is_empty(&self) -> bool {
		self.paymaster_service.is_none()
	}
}

/// Support flag for a single capability.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilitySupport {
	#[serde(default)]
	pub supported: bool,
}

/// Capabilities a wallet advertises for one chain.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainCapabilities {
	#[serde(default)]
	pub paymaster_service: Option<CapabilitySupport>,
}

/// Capabilities keyed by chain id, as already fetched from the wallet.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WalletCapabilities {
	pub chains: HashMap<u64, ChainCapabilities>,
}

impl WalletCapabilities {
	pub fn supports_paymaster(&self, chain_id: u64) -> bool {
		self.chains
			.get(&chain_id)
			.and_then(|caps| caps.paymaster_service.as_ref())
			.is_some_and(|support| support.supported)
	}
}
