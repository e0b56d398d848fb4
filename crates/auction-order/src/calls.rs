//! Encoded auction house writes.

use alloy::primitives::{Address, U256};
use alloy::sol_types::SolCall;
use auction_types::contracts::IAuctionHouse;
use auction_types::Call;

/// `createBid(nounId)` carrying `amount` as value.
pub fn create_bid(house: Address, noun_id: U256, amount: U256) -> Call {
	let data = IAuctionHouse::createBidCall { nounId: noun_id }.abi_encode();
	Call::new(house, data).with_value(amount)
}

/// Settles the current round and opens the next one.
pub fn settle_current_and_create_new_auction(house: Address) -> Call {
	Call::new(
		house,
		IAuctionHouse::settleCurrentAndCreateNewAuctionCall {}.abi_encode(),
	)
}

/// Settles the current round only. Used while the house is paused.
pub fn settle_auction(house: Address) -> Call {
	Call::new(house, IAuctionHouse::settleAuctionCall {}.abi_encode())
}
