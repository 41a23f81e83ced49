//! Outbound notification boundary.
//!
//! The engine never talks to a chat transport directly; it hands tagged
//! events to a [`Notifier`] implementation supplied by the embedding
//! process.

use async_trait::async_trait;
use auction_types::{AuctionEvent, ChannelId, NotifyTarget, UserId};
use thiserror::Error;

/// Failure to deliver a notification.
///
/// These are infrastructure errors: the service logs and swallows them,
/// never retries, and never reports them as auction errors.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum NotifyError {
    #[error("recipient unreachable")]
    Unreachable,

    #[error("missing permission for destination")]
    Forbidden,

    #[error("transport error: {0}")]
    Transport(String),
}

/// Transport-agnostic delivery capability consumed by the engine.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver an event to a destination.
    async fn notify(&self, target: NotifyTarget, event: &AuctionEvent)
        -> Result<(), NotifyError>;

    /// Resolve a stored bidder to a contactable user, if they are still
    /// reachable from the hosting channel.
    async fn resolve_member(&self, channel_id: ChannelId, user_id: UserId) -> Option<UserId>;
}
