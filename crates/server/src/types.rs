//! RPC parameter and response types.
//!
//! These mirror the engine's types in JSON-friendly form so clients do
//! not need the engine crate.

use auction_types::AuctionEvent;
use serde::{Deserialize, Serialize};

/// Parameters for `auction_start`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StartAuctionParams {
    pub channel_id: u64,
    pub item: String,
    /// Duration text such as `5m` or `2h`.
    pub duration: String,
}

/// Parameters for `auction_bid`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PlaceBidParams {
    pub channel_id: u64,
    pub bidder_id: u64,
    /// Bid text such as `1m 50p 100g 500s`.
    pub bid: String,
}

/// One running auction, as reported by `query_listAuctions`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AuctionInfoRpc {
    pub channel_id: u64,
    pub item: String,
    pub remaining_secs: u64,
    pub num_bids: usize,
}

/// One delivered notification, as reported by `query_getEvents`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EventRecordRpc {
    /// Monotonic sequence number, starting at 1.
    pub seq: u64,
    /// Rendered destination, e.g. `channel:1` or `user:42`.
    pub target: String,
    pub event: AuctionEvent,
}
