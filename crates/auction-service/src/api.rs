//! HTTP API over the auction engine.

use alloy::primitives::{B256, U256};
use auction_core::{AuctionEngine, AuctionView, EngineError};
use auction_delivery::DeliveryError;
use auction_order::BidError;
use auction_settlement::Settled;
use auction_types::{current_timestamp, ExecutionResult, PendingOperationView, SettlementAttempt};
use axum::{
	extract::State,
	http::StatusCode,
	response::{IntoResponse, Json, Response},
	routing::{get, post},
	Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};

type AppState = Arc<AuctionEngine>;

pub fn router(engine: AppState) -> Router {
	Router::new()
		.route("/health", get(health))
		.route("/auction", get(get_auction))
		.route("/auction/refetch", post(refetch))
		.route("/operation", get(get_operation))
		.route("/bid", post(place_bid))
		.route("/settle", post(settle))
		.with_state(engine)
		.layer(
			ServiceBuilder::new()
				.layer(TraceLayer::new_for_http())
				.layer(CorsLayer::permissive()),
		)
}

pub async fn serve(engine: AppState, host: &str, port: u16) -> anyhow::Result<()> {
	let listener = tokio::net::TcpListener::bind(format!("{}:{}", host, port)).await?;
	info!("API server listening on {}:{}", host, port);

	axum::serve(listener, router(engine)).await?;
	Ok(())
}

#[derive(Debug, Deserialize)]
pub struct BidRequest {
	/// Wei, decimal or 0x-prefixed hex.
	pub amount: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SettleResponse {
	pub outcome: auction_types::SettlementOutcome,
	pub entry_point: &'static str,
	pub hash: B256,
	pub attempts: Vec<SettlementAttempt>,
}

impl From<Settled> for SettleResponse {
	fn from(settled: Settled) -> Self {
		Self {
			outcome: settled.outcome,
			entry_point: settled.entry_point,
			hash: settled.execution.hash,
			attempts: settled.attempts,
		}
	}
}

#[derive(Debug, Serialize)]
struct ErrorBody {
	error: &'static str,
	message: String,
}

/// Engine failure rendered as `{error, message}`.
#[derive(Debug)]
pub struct ApiError {
	status: StatusCode,
	code: &'static str,
	message: String,
}

impl ApiError {
	fn bad_request(message: impl Into<String>) -> Self {
		Self {
			status: StatusCode::BAD_REQUEST,
			code: "INVALID_REQUEST",
			message: message.into(),
		}
	}
}

impl From<EngineError> for ApiError {
	fn from(error: EngineError) -> Self {
		let (status, code) = match &error {
			EngineError::Bid(BidError::NoAuction) => (StatusCode::NOT_FOUND, "NO_AUCTION"),
			EngineError::Bid(_) => (StatusCode::BAD_REQUEST, "INVALID_BID"),
			EngineError::Delivery(e) => match e {
				DeliveryError::NotConnected => (StatusCode::UNAUTHORIZED, "NOT_CONNECTED"),
				DeliveryError::CapabilityUnavailable => {
					(StatusCode::FORBIDDEN, "CAPABILITY_UNAVAILABLE")
				}
				DeliveryError::OperationInProgress => {
					(StatusCode::CONFLICT, "OPERATION_IN_PROGRESS")
				}
				DeliveryError::ConfirmationTimeout { .. } => {
					(StatusCode::GATEWAY_TIMEOUT, "CONFIRMATION_TIMEOUT")
				}
				DeliveryError::ContractRevert(_) => {
					(StatusCode::UNPROCESSABLE_ENTITY, "CONTRACT_REVERT")
				}
				_ => (StatusCode::BAD_GATEWAY, "SUBMISSION_FAILED"),
			},
			EngineError::Discovery(_) => (StatusCode::BAD_GATEWAY, "STATE_UNAVAILABLE"),
			EngineError::Settlement(_) => (StatusCode::BAD_GATEWAY, "SETTLEMENT_EXHAUSTED"),
			EngineError::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL"),
		};
		Self {
			status,
			code,
			message: error.to_string(),
		}
	}
}

impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		if self.status.is_server_error() {
			warn!(code = self.code, "Request failed: {}", self.message);
		}
		let body = ErrorBody {
			error: self.code,
			message: self.message,
		};
		(self.status, Json(body)).into_response()
	}
}

async fn health() -> Json<serde_json::Value> {
	Json(serde_json::json!({ "status": "ok" }))
}

async fn get_auction(State(engine): State<AppState>) -> Result<Json<AuctionView>, ApiError> {
	engine
		.view(current_timestamp())
		.await?
		.map(Json)
		.ok_or_else(|| EngineError::Bid(BidError::NoAuction).into())
}

async fn refetch(State(engine): State<AppState>) -> Result<StatusCode, ApiError> {
	engine.refetch().await?;
	Ok(StatusCode::NO_CONTENT)
}

async fn get_operation(State(engine): State<AppState>) -> Json<PendingOperationView> {
	Json(engine.pending_operation())
}

async fn place_bid(
	State(engine): State<AppState>,
	Json(request): Json<BidRequest>,
) -> Result<Json<ExecutionResult>, ApiError> {
	let amount: U256 = request
		.amount
		.parse()
		.map_err(|_| ApiError::bad_request(format!("Invalid amount: {}", request.amount)))?;

	Ok(Json(engine.place_bid(amount).await?))
}

async fn settle(State(engine): State<AppState>) -> Result<Json<SettleResponse>, ApiError> {
	Ok(Json(engine.settle().await?.into()))
}
