//! Silent auction lifecycle engine.
//!
//! This crate implements the core of the channel auction system:
//!
//! - In-memory registry of active auctions, one per channel
//! - Bid validation with monotonic-improvement and highest-overall rules
//! - Anti-snipe deadline extension
//! - Periodic expiry scanning with exactly-once settlement
//!
//! # Architecture
//!
//! - `state`: the in-memory auction registry
//! - `handlers`: state-transition logic for each operation
//! - `error`: user-facing error types
//! - `notifier`: the outbound notification boundary
//! - `service`: async wrapper tying registry, handlers, notifier and the
//!   expiry loop together
//!
//! Handlers are synchronous and never perform I/O; they return the
//! notifications to deliver, and the service dispatches them after the
//! registry lock is released. The chat transport behind the [`Notifier`]
//! trait is external to this crate.
//!
//! # Example
//!
//! ```ignore
//! use auction_engine::{AuctionService, ServiceConfig};
//!
//! let service = AuctionService::new(notifier, ServiceConfig::default());
//! service.clone().spawn_expiry_loop();
//!
//! service.start_auction(channel, "rare sword", "30m").await?;
//! service.place_bid(channel, bidder, "1m 50p").await?;
//! ```

pub mod error;
pub mod handlers;
pub mod notifier;
pub mod service;
pub mod state;

pub use error::AuctionError;
pub use handlers::{settle_auction, CallContext, HandlerResult, Outbound, Recipient};
pub use notifier::{Notifier, NotifyError};
pub use service::{AuctionService, ServiceConfig};
pub use state::{Auction, RegistryState};
