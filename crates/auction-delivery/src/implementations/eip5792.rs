//! Wallet backed submission over EIP-5792.
//!
//! Batches go out with `wallet_sendCalls` and are tracked with
//! `wallet_getCallsStatus`. Both numeric (v2) and string (v1) status codes
//! are understood.

use crate::{DeliveryError, DeliveryInterface};
use alloy::primitives::{B256, U64};
use alloy::providers::{Provider, RootProvider};
use async_trait::async_trait;
use auction_types::{
	BatchSpec, CallReceipt, CallsStatus, ConfigSchema, CorrelationId, Field, FieldType, Schema,
	ValidationError,
};
use serde::Deserialize;
use serde_json::{json, Value};

/// Submits batches through an EIP-5792 wallet endpoint.
pub struct WalletRpcDelivery {
	provider: RootProvider,
}

impl WalletRpcDelivery {
	pub fn new(wallet_rpc_url: &str) -> Result<Self, DeliveryError> {
		let url = wallet_rpc_url
			.parse()
			.map_err(|e| DeliveryError::Config(format!("Invalid wallet RPC URL: {}", e)))?;

		Ok(Self {
			provider: RootProvider::new_http(url),
		})
	}
}

/// Configuration schema for [`WalletRpcDelivery`].
pub struct WalletRpcDeliverySchema;

impl ConfigSchema for WalletRpcDeliverySchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		Schema::new(vec![Field::new("wallet_rpc_url", FieldType::Url)], vec![]).validate(config)
	}
}

#[async_trait]
impl DeliveryInterface for WalletRpcDelivery {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(WalletRpcDeliverySchema)
	}

	async fn send_calls(&self, batch: &BatchSpec) -> Result<CorrelationId, DeliveryError> {
		let response: Value = self
			.provider
			.raw_request("wallet_sendCalls".into(), (send_calls_params(batch),))
			.await
			.map_err(|e| DeliveryError::Submission(e.to_string()))?;

		parse_send_result(response)
	}

	async fn get_calls_status(&self, id: &CorrelationId) -> Result<CallsStatus, DeliveryError> {
		let response: Value = self
			.provider
			.raw_request("wallet_getCallsStatus".into(), (id.0.clone(),))
			.await
			.map_err(|e| DeliveryError::Network(e.to_string()))?;

		parse_calls_status(response)
	}
}

/// Builds the single `wallet_sendCalls` parameter object.
pub fn send_calls_params(batch: &BatchSpec) -> Value {
	let calls: Vec<Value> = batch
		.calls
		.iter()
		.map(|call| {
			json!({
				"to": call.target,
				"data": call.data,
				"value": format!("{:#x}", call.value),
			})
		})
		.collect();

	json!({
		"version": "2.0.0",
		"chainId": format!("{:#x}", batch.chain_id),
		"from": batch.from,
		"atomicRequired": true,
		"calls": calls,
		"capabilities": batch.capability,
	})
}

/// Extracts the batch id. Older wallets return a bare string.
pub fn parse_send_result(value: Value) -> Result<CorrelationId, DeliveryError> {
	let id = match &value {
		Value::String(id) => Some(id.clone()),
		Value::Object(map) => map.get("id").and_then(Value::as_str).map(str::to_string),
		_ => None,
	};

	match id {
		Some(id) if !id.is_empty() => Ok(CorrelationId(id)),
		_ => Err(DeliveryError::Submission(format!(
			"wallet returned no batch id: {}",
			value
		))),
	}
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawReceipt {
	transaction_hash: B256,
	#[serde(default)]
	block_number: Option<U64>,
	#[serde(default)]
	status: Option<String>,
}

impl From<RawReceipt> for CallReceipt {
	fn from(raw: RawReceipt) -> Self {
		CallReceipt {
			transaction_hash: raw.transaction_hash,
			block_number: raw.block_number.map(|n| n.to::<u64>()),
			success: raw.status.as_deref() != Some("0x0"),
		}
	}
}

#[derive(Debug, Deserialize)]
struct RawStatus {
	status: Value,
	#[serde(default)]
	receipts: Option<Vec<RawReceipt>>,
}

/// Maps a `wallet_getCallsStatus` result onto [`CallsStatus`].
///
/// A response that cannot be read is terminal; retrying would not change it.
pub fn parse_calls_status(value: Value) -> Result<CallsStatus, DeliveryError> {
	let raw: RawStatus = serde_json::from_value(value)
		.map_err(|e| DeliveryError::Submission(format!("malformed calls status: {}", e)))?;
	let receipts: Vec<CallReceipt> = raw
		.receipts
		.unwrap_or_default()
		.into_iter()
		.map(CallReceipt::from)
		.collect();

	let code = match &raw.status {
		Value::Number(n) => n.as_u64(),
		Value::String(s) => match s.as_str() {
			"PENDING" => Some(100),
			"CONFIRMED" => Some(200),
			other => other.parse().ok(),
		},
		_ => None,
	};

	match code {
		Some(100..=199) => Ok(CallsStatus::Pending),
		Some(200..=299) => Ok(CallsStatus::Confirmed { receipts }),
		Some(400..=499) => Ok(CallsStatus::Failed {
			reason: "Batch was not included on chain".to_string(),
			receipts,
		}),
		Some(500..=599) => Ok(CallsStatus::Failed {
			reason: "Batch reverted on chain".to_string(),
			receipts,
		}),
		Some(600..=699) => Ok(CallsStatus::Failed {
			reason: "Batch partially reverted on chain".to_string(),
			receipts,
		}),
		_ => Err(DeliveryError::Submission(format!(
			"unknown calls status {}",
			raw.status
		))),
	}
}

/// Builds the wallet submission backend from its config section.
///
/// Required: `wallet_rpc_url`.
pub fn create_delivery(config: &toml::Value) -> Result<Box<dyn DeliveryInterface>, DeliveryError> {
	WalletRpcDeliverySchema
		.validate(config)
		.map_err(|e| DeliveryError::Config(e.to_string()))?;

	let rpc_url = config
		.get("wallet_rpc_url")
		.and_then(|v| v.as_str())
		.ok_or_else(|| DeliveryError::Config("wallet_rpc_url is required".to_string()))?;

	Ok(Box::new(WalletRpcDelivery::new(rpc_url)?))
}

#[cfg(test)]
mod tests {
	use super::*;
	use alloy::primitives::{address, Address, U256};
	use auction_types::{Call, SponsorCapability};

	#[test]
	fn test_send_calls_params_shape() {
		let batch = BatchSpec {
			from: address!("0x00000000000000000000000000000000000000aa"),
			chain_id: 8453,
			calls: vec![Call::new(Address::ZERO, vec![0x01, 0x02]).with_value(U256::from(255))],
			capability: SponsorCapability::sponsored("https://pm.example.org"),
		};

		let params = send_calls_params(&batch);
		assert_eq!(params["chainId"], "0x2105");
		assert_eq!(params["atomicRequired"], true);
		assert_eq!(params["calls"][0]["data"], "0x0102");
		assert_eq!(params["calls"][0]["value"], "0xff");
		assert_eq!(
			params["capabilities"]["paymasterService"]["url"],
			"https://pm.example.org"
		);
	}

	#[test]
	fn test_parse_send_result() {
		assert_eq!(
			parse_send_result(json!({ "id": "0xabc" })).unwrap(),
			CorrelationId("0xabc".to_string())
		);
		assert_eq!(
			parse_send_result(json!("0xdef")).unwrap(),
			CorrelationId("0xdef".to_string())
		);
		assert!(matches!(
			parse_send_result(json!({})),
			Err(DeliveryError::Submission(_))
		));
	}

	#[test]
	fn test_parse_numeric_status() {
		let hash = B256::repeat_byte(0x22);
		let confirmed = parse_calls_status(json!({
			"version": "2.0.0",
			"id": "0xabc",
			"status": 200,
			"receipts": [{
				"transactionHash": hash,
				"blockNumber": "0x10",
				"status": "0x1",
				"logs": []
			}]
		}))
		.unwrap();

		assert_eq!(
			confirmed,
			CallsStatus::Confirmed {
				receipts: vec![CallReceipt {
					transaction_hash: hash,
					block_number: Some(16),
					success: true,
				}]
			}
		);
		assert!(parse_calls_status(json!({ "status": 100 })).unwrap().is_pending());
		assert!(matches!(
			parse_calls_status(json!({ "status": 500, "receipts": [] })).unwrap(),
			CallsStatus::Failed { .. }
		));
	}

	#[test]
	fn test_parse_legacy_status() {
		assert!(parse_calls_status(json!({ "status": "PENDING" }))
			.unwrap()
			.is_pending());

		let reverted = parse_calls_status(json!({
			"status": "CONFIRMED",
			"receipts": [{ "transactionHash": B256::ZERO, "status": "0x0" }]
		}))
		.unwrap();
		match reverted {
			CallsStatus::Confirmed { receipts } => assert!(!receipts[0].success),
			other => panic!("unexpected status {:?}", other),
		}
	}

	#[test]
	fn test_parse_malformed_status() {
		assert!(matches!(
			parse_calls_status(json!({ "status": "WHAT" })),
			Err(DeliveryError::Submission(_))
		));
		assert!(matches!(
			parse_calls_status(json!("nope")),
			Err(DeliveryError::Submission(_))
		));
	}
}
