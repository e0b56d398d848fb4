//! GraphQL indexer source.
//!
//! Asks for the newest unsettled auction of the configured DAO and, when there
//! is none, for the newest settled one. Indexer records identify auctions as
//! `"{dao}:{tokenId}"` in lowercase.

use crate::{DiscoveryError, DiscoveryInterface};
use alloy::primitives::{Address, U256};
use async_trait::async_trait;
use auction_types::{
	Auction, ConfigSchema, Field, FieldType, Schema, SnapshotSource, ValidationError,
};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::debug;

const LATEST_AUCTION_QUERY: &str = r#"
query LatestAuction($dao: String!, $settled: Boolean!) {
  auctions(
    where: { dao: $dao, settled: $settled }
    orderBy: startTime
    orderDirection: desc
    first: 1
  ) {
    id
    startTime
    endTime
    settled
    highestBid { amount bidder }
    winningBid { amount bidder }
  }
}
"#;

#[derive(Debug, Clone, Deserialize)]
pub struct IndexerBid {
	pub amount: String,
	pub bidder: String,
}

/// One auction as the indexer returns it.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexerAuction {
	pub id: String,
	pub start_time: String,
	pub end_time: String,
	pub settled: bool,
	#[serde(default)]
	pub highest_bid: Option<IndexerBid>,
	#[serde(default)]
	pub winning_bid: Option<IndexerBid>,
}

#[derive(Debug, Deserialize)]
struct AuctionsData {
	auctions: Vec<IndexerAuction>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
	message: String,
}

#[derive(Debug, Deserialize)]
struct GraphQlResponse {
	data: Option<AuctionsData>,
	#[serde(default)]
	errors: Vec<GraphQlError>,
}

fn unavailable(message: impl Into<String>) -> DiscoveryError {
	DiscoveryError::IndexerUnavailable(message.into())
}

/// Maps an indexer record onto the canonical auction.
///
/// `winningBid` wins over `highestBid`; no bid at all means amount zero and
/// the zero bidder. Anything that does not parse is an unavailable indexer.
pub fn map_auction(record: &IndexerAuction) -> Result<Auction, DiscoveryError> {
	let token_id = match record.id.rsplit_once(':') {
		Some((_, token)) => token,
		None => record.id.as_str(),
	};
	let noun_id: U256 = token_id
		.parse()
		.map_err(|_| unavailable(format!("bad auction id '{}'", record.id)))?;

	let start_time: u64 = record
		.start_time
		.parse()
		.map_err(|_| unavailable(format!("bad startTime '{}'", record.start_time)))?;
	let end_time: u64 = record
		.end_time
		.parse()
		.map_err(|_| unavailable(format!("bad endTime '{}'", record.end_time)))?;

	let (amount, bidder) = match record.winning_bid.as_ref().or(record.highest_bid.as_ref()) {
		Some(bid) => (
			bid.amount
				.parse::<U256>()
				.map_err(|_| unavailable(format!("bad bid amount '{}'", bid.amount)))?,
			bid.bidder
				.parse::<Address>()
				.map_err(|_| unavailable(format!("bad bidder '{}'", bid.bidder)))?,
		),
		None => (U256::ZERO, Address::ZERO),
	};

	let auction = Auction {
		noun_id,
		amount,
		start_time,
		end_time,
		bidder,
		settled: record.settled,
	};
	auction.check_invariants().map_err(unavailable)?;
	Ok(auction)
}

/// Subgraph-style GraphQL indexer.
pub struct GraphQlIndexer {
	client: reqwest::Client,
	url: String,
	dao: String,
}

impl GraphQlIndexer {
	pub fn new(url: &str, dao: Address, timeout: Duration) -> Result<Self, DiscoveryError> {
		let client = reqwest::Client::builder()
			.timeout(timeout)
			.build()
			.map_err(|e| DiscoveryError::Config(format!("Failed to build HTTP client: {}", e)))?;

		Ok(Self {
			client,
			url: url.to_string(),
			dao: format!("{:#x}", dao),
		})
	}

	async fn query(&self, settled: bool) -> Result<Option<IndexerAuction>, DiscoveryError> {
		let body = json!({
			"query": LATEST_AUCTION_QUERY,
			"variables": { "dao": self.dao, "settled": settled },
		});

		let response = self
			.client
			.post(&self.url)
			.json(&body)
			.send()
			.await
			.map_err(|e| unavailable(e.to_string()))?
			.error_for_status()
			.map_err(|e| unavailable(e.to_string()))?;

		let response: GraphQlResponse = response
			.json()
			.await
			.map_err(|e| unavailable(format!("malformed response: {}", e)))?;

		first_auction(response)
	}
}

fn first_auction(response: GraphQlResponse) -> Result<Option<IndexerAuction>, DiscoveryError> {
	if let Some(error) = response.errors.first() {
		return Err(unavailable(error.message.clone()));
	}
	let data = response
		.data
		.ok_or_else(|| unavailable("response carried no data"))?;
	Ok(data.auctions.into_iter().next())
}

/// Configuration schema for [`GraphQlIndexer`].
pub struct GraphQlIndexerSchema;

impl ConfigSchema for GraphQlIndexerSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		Schema::new(
			vec![
				Field::new("url", FieldType::Url),
				Field::new("dao_address", FieldType::Address),
			],
			vec![Field::new(
				"timeout_secs",
				FieldType::Integer {
					min: Some(1),
					max: Some(120),
				},
			)],
		)
		.validate(config)
	}
}

#[async_trait]
impl DiscoveryInterface for GraphQlIndexer {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(GraphQlIndexerSchema)
	}

	fn source(&self) -> SnapshotSource {
		SnapshotSource::Indexer
	}

	async fn fetch_auction(&self) -> Result<Option<Auction>, DiscoveryError> {
		let record = match self.query(false).await? {
			Some(record) => Some(record),
			None => {
				debug!(dao = %self.dao, "No unsettled auction indexed, asking for settled");
				self.query(true).await?
			}
		};

		record.as_ref().map(map_auction).transpose()
	}
}

/// Builds the indexer source.
///
/// Required: `url`, `dao_address`. Optional: `timeout_secs` (default 10).
pub fn create_indexer(config: &toml::Value) -> Result<Box<dyn DiscoveryInterface>, DiscoveryError> {
	GraphQlIndexerSchema
		.validate(config)
		.map_err(|e| DiscoveryError::Config(e.to_string()))?;

	let url = config
		.get("url")
		.and_then(|v| v.as_str())
		.ok_or_else(|| DiscoveryError::Config("url is required".to_string()))?;
	let dao = config
		.get("dao_address")
		.and_then(|v| v.as_str())
		.ok_or_else(|| DiscoveryError::Config("dao_address is required".to_string()))?
		.parse::<Address>()
		.map_err(|e| DiscoveryError::Config(format!("Invalid DAO address: {}", e)))?;
	let timeout_secs = config
		.get("timeout_secs")
		.and_then(|v| v.as_integer())
		.unwrap_or(10) as u64;

	Ok(Box::new(GraphQlIndexer::new(
		url,
		dao,
		Duration::from_secs(timeout_secs),
	)?))
}

#[cfg(test)]
mod tests {
	use super::*;
	use alloy::primitives::address;
	use wiremock::matchers::{body_partial_json, method, path};
	use wiremock::{Mock, MockServer, ResponseTemplate};

	const DAO: Address = address!("0xdead00000000000000000000000000000000beef");

	fn record(json: serde_json::Value) -> IndexerAuction {
		serde_json::from_value(json).unwrap()
	}

	fn auctions(records: Vec<serde_json::Value>) -> ResponseTemplate {
		ResponseTemplate::new(200).set_body_json(json!({ "data": { "auctions": records } }))
	}

	fn indexed(token: u64, settled: bool) -> serde_json::Value {
		json!({
			"id": format!("{:#x}:{}", DAO, token),
			"startTime": "1700000000",
			"endTime": "1700086400",
			"settled": settled,
			"highestBid": { "amount": "1000", "bidder": "0x00000000000000000000000000000000000000aa" }
		})
	}

	async fn mount(server: &MockServer, settled: bool, response: ResponseTemplate, calls: u64) {
		Mock::given(method("POST"))
			.and(path("/graphql"))
			.and(body_partial_json(json!({
				"variables": { "dao": format!("{:#x}", DAO), "settled": settled }
			})))
			.respond_with(response)
			.expect(calls)
			.mount(server)
			.await;
	}

	fn indexer(server: &MockServer) -> GraphQlIndexer {
		GraphQlIndexer::new(
			&format!("{}/graphql", server.uri()),
			DAO,
			Duration::from_secs(5),
		)
		.unwrap()
	}

	#[test]
	fn test_map_prefers_winning_bid() {
		let auction = map_auction(&record(json!({
			"id": "0xdead00000000000000000000000000000000beef:17",
			"startTime": "1700000000",
			"endTime": "1700086400",
			"settled": true,
			"highestBid": { "amount": "1", "bidder": "0x00000000000000000000000000000000000000aa" },
			"winningBid": { "amount": "2000000000000000000", "bidder": "0x00000000000000000000000000000000000000bb" }
		})))
		.unwrap();

		assert_eq!(auction.noun_id, U256::from(17));
		assert_eq!(auction.amount, U256::from(2_000_000_000_000_000_000u128));
		assert_eq!(
			auction.bidder,
			address!("0x00000000000000000000000000000000000000bb")
		);
		assert_eq!(auction.start_time, 1_700_000_000);
		assert_eq!(auction.end_time, 1_700_086_400);
		assert!(auction.settled);
	}

	#[test]
	fn test_map_without_bids() {
		let auction = map_auction(&record(json!({
			"id": "0xdead00000000000000000000000000000000beef:18",
			"startTime": "1700086400",
			"endTime": "1700172800",
			"settled": false,
			"highestBid": null
		})))
		.unwrap();

		assert_eq!(auction.amount, U256::ZERO);
		assert_eq!(auction.bidder, Address::ZERO);
		assert!(!auction.has_bids());
	}

	#[test]
	fn test_map_rejects_bad_records() {
		let bad_id = record(json!({
			"id": "0xdead:abc",
			"startTime": "1",
			"endTime": "2",
			"settled": false
		}));
		assert!(matches!(
			map_auction(&bad_id),
			Err(DiscoveryError::IndexerUnavailable(_))
		));

		let inverted = record(json!({
			"id": "0xdead:1",
			"startTime": "10",
			"endTime": "5",
			"settled": false
		}));
		assert!(matches!(
			map_auction(&inverted),
			Err(DiscoveryError::IndexerUnavailable(_))
		));
	}

	#[test]
	fn test_graphql_errors_surface_as_unavailable() {
		let response: GraphQlResponse = serde_json::from_value(json!({
			"data": null,
			"errors": [{ "message": "indexing_error" }]
		}))
		.unwrap();
		assert!(matches!(
			first_auction(response),
			Err(DiscoveryError::IndexerUnavailable(m)) if m == "indexing_error"
		));

		let empty: GraphQlResponse =
			serde_json::from_value(json!({ "data": { "auctions": [] } })).unwrap();
		assert!(first_auction(empty).unwrap().is_none());
	}

	#[tokio::test]
	async fn test_fetch_prefers_unsettled_auction() {
		let server = MockServer::start().await;
		mount(&server, false, auctions(vec![indexed(18, false)]), 1).await;
		mount(&server, true, auctions(vec![indexed(17, true)]), 0).await;

		let auction = indexer(&server).fetch_auction().await.unwrap().unwrap();
		assert_eq!(auction.noun_id, U256::from(18));
		assert!(!auction.settled);
	}

	#[tokio::test]
	async fn test_fetch_falls_back_to_latest_settled() {
		let server = MockServer::start().await;
		mount(&server, false, auctions(vec![]), 1).await;
		mount(&server, true, auctions(vec![indexed(17, true)]), 1).await;

		let auction = indexer(&server).fetch_auction().await.unwrap().unwrap();
		assert_eq!(auction.noun_id, U256::from(17));
		assert!(auction.settled);
		assert_eq!(auction.amount, U256::from(1_000));
	}

	#[tokio::test]
	async fn test_server_error_is_unavailable() {
		let server = MockServer::start().await;
		mount(&server, false, ResponseTemplate::new(503), 1).await;
		mount(&server, true, auctions(vec![indexed(17, true)]), 0).await;

		assert!(matches!(
			indexer(&server).fetch_auction().await,
			Err(DiscoveryError::IndexerUnavailable(_))
		));
	}
}
