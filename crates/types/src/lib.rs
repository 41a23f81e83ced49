//! Core type definitions for silent channel auctions.
//!
//! This crate provides the shared data structures used across the auction
//! system: identifier newtypes, the coin denomination ladder with bid
//! parsing, duration parsing, and the notification payloads emitted by the
//! lifecycle engine.

use serde::{Deserialize, Serialize};
use std::fmt;

pub mod currency;
pub mod duration;

pub use currency::{parse_bid, Coins, ParseBidError};
pub use duration::{parse_duration, ParseDurationError};

// =========================
// IDENTIFIERS
// =========================

/// Opaque identifier of a chat channel.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct ChannelId(pub u64);

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Opaque identifier of a user.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct UserId(pub u64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

// =========================
// NOTIFICATIONS
// =========================

/// Destination of a notification.
///
/// The engine only tags the destination; the notifier implementation
/// resolves each variant to a concrete send capability. The results channel
/// is configured on the notifier side and may be absent.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum NotifyTarget {
    /// The channel hosting the auction.
    Channel(ChannelId),
    /// A private message to a user.
    User(UserId),
    /// The configured results channel, if any.
    ResultsChannel,
}

/// Notification payloads emitted by the auction engine.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuctionEvent {
    /// A new auction opened in the channel.
    AuctionStarted { item: String, duration_text: String },

    /// The deadline was pushed out; sent to the bidder whose bid triggered
    /// the extension.
    AuctionExtended { item: String },

    /// The deadline was pushed out; sent to the displaced highest bidder.
    AuctionExtendedNotice { item: String },

    /// A bid was validated and recorded. Acceptance requires a new
    /// channel-wide maximum, so `is_highest` is always true; it is kept as
    /// an explicit field for clients that render it as a status line.
    BidAccepted {
        item: String,
        display_amount: String,
        is_highest: bool,
    },

    /// Another bidder now holds the highest bid. Carries the recipient's
    /// own standing bid.
    OutbidAlert { item: String, display_amount: String },

    /// The auction closed without any bids.
    NoBidsResult { item: String },

    /// The auction closed with a winner. The amount is withheld from the
    /// hosting channel and included for the results channel.
    WinnerResult {
        item: String,
        winner: UserId,
        amount: Option<Coins>,
    },

    /// Private congratulation sent to the winner.
    WinnerCongratulation { item: String, display_amount: String },
}
