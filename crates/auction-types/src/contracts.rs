//! Auction house ABI.
//!
//! The `auction()` getter reports the round start in the field named `endTime`
//! on the deployment this relay targets. Consumers must remap it, see
//! `auction_discovery::implementations::contract`.

use alloy::sol;

sol! {
	#[allow(missing_docs)]
	#[derive(Debug)]
	#[sol(rpc)]
	interface IAuctionHouse {
		function auction() external view returns (
			uint256 nounId,
			uint256 amount,
			uint256 startTime,
			uint256 endTime,
			address bidder,
			bool settled
		);
		function reservePrice() external view returns (uint256);
		function duration() external view returns (uint256);
		function minBidIncrementPercentage() external view returns (uint8);
		function settleCurrentAndCreateNewAuction() external;
		function settleAuction() external;
		function createBid(uint256 nounId) external payable;
	}
}
