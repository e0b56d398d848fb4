//! The canonical auction record and the views derived from it.

use alloy::primitives::{Address, U256};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Canonical state of one auction round.
///
/// Records are only ever produced by a fetch from the indexer or the auction
/// house contract. They are never patched locally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Auction {
	/// Token being auctioned in this round.
	pub noun_id: U256,
	/// Highest bid so far, in wei.
	pub amount: U256,
	/// Round start, seconds since epoch. Zero means the round has not started.
	pub start_time: u64,
	/// Round end, seconds since epoch.
	pub end_time: u64,
	/// Highest bidder, or the zero address when nobody has bid yet.
	pub bidder: Address,
	/// Whether the round has been settled on chain.
	pub settled: bool,
}

/// Lifecycle of a round, derived from its timestamps and the local clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuctionStatus {
	Pending,
	Active,
	Ended,
}

impl fmt::Display for AuctionStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			AuctionStatus::Pending => write!(f, "pending"),
			AuctionStatus::Active => write!(f, "active"),
			AuctionStatus::Ended => write!(f, "ended"),
		}
	}
}

impl Auction {
	/// Whether anybody has bid in this round.
	pub fn has_bids(&self) -> bool {
		self.bidder != Address::ZERO
	}

	/// Status of the round at `now` (seconds since epoch).
	///
	/// An active round turns into an ended one purely because the clock moved,
	/// without any new fetch.
	pub fn status_at(&self, now: u64) -> AuctionStatus {
		if self.start_time == 0 || self.start_time > now {
			AuctionStatus::Pending
		} else if self.settled || now >= self.end_time {
			AuctionStatus::Ended
		} else {
			AuctionStatus::Active
		}
	}

	/// Time left until the next status transition at `now`.
	///
	/// Pending rounds count down to their start, active rounds to their end
	/// and ended rounds report zero.
	pub fn countdown_at(&self, now: u64) -> Duration {
		match self.status_at(now) {
			AuctionStatus::Pending if self.start_time > now => {
				Duration::from_secs(self.start_time - now)
			}
			AuctionStatus::Active => Duration::from_secs(self.end_time.saturating_sub(now)),
			_ => Duration::ZERO,
		}
	}

	/// Checks the structural invariants of a freshly mapped record.
	pub fn check_invariants(&self) -> Result<(), String> {
		if self.end_time < self.start_time {
			return Err(format!(
				"end time {} precedes start time {}",
				self.end_time, self.start_time
			));
		}
		if self.has_bids() == self.amount.is_zero() {
			return Err(format!(
				"bidder {} inconsistent with amount {}",
				self.bidder, self.amount
			));
		}
		Ok(())
	}
}

/// Which backend produced a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SnapshotSource {
	Indexer,
	Contract,
}

impl fmt::Display for SnapshotSource {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			SnapshotSource::Indexer => write!(f, "indexer"),
			SnapshotSource::Contract => write!(f, "contract"),
		}
	}
}

/// An auction record together with where and when it was observed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuctionSnapshot {
	pub auction: Auction,
	pub source: SnapshotSource,
	pub fetched_at: u64,
}

/// Auction house parameters that govern bidding.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProtocolParams {
	/// Minimum opening bid, if the house configures one.
	pub reserve_price: Option<U256>,
	/// Required increment over the current bid, in percent.
	pub min_bid_increment_percentage: u8,
	/// Round length in seconds, if it could be read.
	pub duration: Option<u64>,
}
