//! In-memory auction registry state.

use auction_types::{ChannelId, Coins, UserId};
use std::collections::HashMap;
use tokio::time::Instant;

/// A single active auction.
#[derive(Clone, Debug)]
pub struct Auction {
    /// Channel hosting the auction
    pub channel_id: ChannelId,

    /// Free-text label of the auctioned item
    pub item: String,

    /// Absolute deadline; only ever moves forward
    pub end_time: Instant,

    /// Each bidder's current standing bid
    pub bids: HashMap<UserId, Coins>,
}

impl Auction {
    /// Whether the deadline has passed.
    pub fn has_ended(&self, now: Instant) -> bool {
        now >= self.end_time
    }

    /// The current highest bidder and amount, if any bid exists.
    ///
    /// Acceptance requires every bid to strictly exceed the previous
    /// maximum, so two equal amounts can never coexist.
    pub fn highest_bid(&self) -> Option<(UserId, Coins)> {
        self.bids
            .iter()
            .max_by_key(|(_, amount)| **amount)
            .map(|(bidder, amount)| (*bidder, *amount))
    }
}

/// Registry of active auctions, keyed by hosting channel.
///
/// At most one auction exists per channel. Entries are inserted by the
/// start operation and removed only by the expiry scan.
#[derive(Debug, Default)]
pub struct RegistryState {
    /// Active auctions by channel
    pub auctions: HashMap<ChannelId, Auction>,
}

impl RegistryState {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the auction hosted in a channel.
    pub fn get_auction(&self, channel_id: ChannelId) -> Option<&Auction> {
        self.auctions.get(&channel_id)
    }

    /// Get mutable access to the auction hosted in a channel.
    pub fn get_auction_mut(&mut self, channel_id: ChannelId) -> Option<&mut Auction> {
        self.auctions.get_mut(&channel_id)
    }

    /// Remove a channel's auction, returning it if present.
    pub fn remove_auction(&mut self, channel_id: ChannelId) -> Option<Auction> {
        self.auctions.remove(&channel_id)
    }

    /// Channels whose auctions have reached their deadline.
    pub fn expired_channels(&self, now: Instant) -> Vec<ChannelId> {
        self.auctions
            .values()
            .filter(|auction| auction.has_ended(now))
            .map(|auction| auction.channel_id)
            .collect()
    }
}
