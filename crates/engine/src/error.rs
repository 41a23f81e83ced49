//! Auction engine error types.

use thiserror::Error;

/// Errors reported back to the user who issued a start or bid operation.
///
/// All variants are recoverable user-input errors: the user may retry with
/// corrected input. None of them abort the auction or the expiry loop, and
/// none are ever broadcast to the channel.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuctionError {
    #[error("invalid bid format")]
    InvalidBidFormat,

    #[error("invalid duration format, use `5m` for minutes or `2h` for hours")]
    InvalidDurationFormat,

    #[error("an auction is already running in this channel")]
    AuctionAlreadyActive,

    #[error("no active auction in this channel")]
    NoActiveAuction,

    #[error("this auction has ended")]
    AuctionEnded,

    #[error("new bid must be higher than your previous bid")]
    BidNotHigherThanOwn,

    #[error("bid must be higher than the current highest bid")]
    BidNotHighestOverall,
}
