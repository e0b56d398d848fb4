//! Bid rules and auction house call encoding.
//!
//! [`min_bid`] computes the floor the next bid must reach. [`validate_bid`]
//! checks an offered amount against the current round before anything is
//! submitted, and [`calls`] encodes the auction house writes.

use alloy::primitives::U256;
use auction_types::{Auction, AuctionStatus, ProtocolParams};
use thiserror::Error;

pub mod calls;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BidError {
	#[error("No auction is known yet")]
	NoAuction,
	#[error("Auction is {0}, bids are not accepted")]
	NotActive(AuctionStatus),
	#[error("Bid of {offered} wei is below the minimum of {minimum} wei")]
	BelowMinimum { minimum: U256, offered: U256 },
	#[error("Bid amount must be greater than zero")]
	ZeroAmount,
}

/// Minimum acceptable next bid, in wei.
///
/// Without bids the floor is the reserve price, or `None` when the house has
/// no reserve. Otherwise it is `amount + ceil(amount * pct / 100)`, computed
/// in integers so the floor is never under-rounded. The increment is at least
/// one wei, so the floor always exceeds the current amount.
pub fn min_bid(auction: &Auction, reserve_price: Option<U256>, increment_pct: u8) -> Option<U256> {
	if auction.amount.is_zero() {
		return reserve_price;
	}

	let scaled = auction.amount.saturating_mul(U256::from(increment_pct));
	let increment = scaled.saturating_add(U256::from(99)) / U256::from(100);
	Some(auction.amount.saturating_add(increment.max(U256::from(1))))
}

/// Checks `offered` against the round at `now` and returns the floor used.
pub fn validate_bid(
	auction: Option<&Auction>,
	params: &ProtocolParams,
	offered: U256,
	now: u64,
) -> Result<Option<U256>, BidError> {
	let auction = auction.ok_or(BidError::NoAuction)?;

	let status = auction.status_at(now);
	if status != AuctionStatus::Active {
		return Err(BidError::NotActive(status));
	}
	if offered.is_zero() {
		return Err(BidError::ZeroAmount);
	}

	let minimum = min_bid(
		auction,
		params.reserve_price,
		params.min_bid_increment_percentage,
	);
	if let Some(minimum) = minimum {
		if offered < minimum {
			return Err(BidError::BelowMinimum { minimum, offered });
		}
	}
	Ok(minimum)
}
