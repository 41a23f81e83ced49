//! Auction service: shared state, command entry points, and the expiry
//! scanner that settles finished auctions.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use auction_types::{ChannelId, NotifyTarget, UserId};

use crate::error::AuctionError;
use crate::handlers::{self, CallContext, Outbound, Recipient};
use crate::notifier::Notifier;
use crate::state::RegistryState;

/// Tunable timing knobs for the service.
#[derive(Clone, Debug)]
pub struct ServiceConfig {
    /// Minimum auction lifetime. Requested durations below this are
    /// clamped up.
    pub floor_duration: Duration,

    /// Anti-snipe window: a lead change with no more than this much
    /// time remaining pushes the deadline out to now plus this window.
    pub extension_window: Duration,

    /// How often the expiry loop scans for finished auctions.
    pub poll_interval: Duration,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            floor_duration: Duration::from_secs(10),
            extension_window: Duration::from_secs(15),
            poll_interval: Duration::from_secs(1),
        }
    }
}

/// Concurrent auction registry plus the notifier used to fan events out.
///
/// Cloning is cheap; all clones share the same registry.
#[derive(Clone)]
pub struct AuctionService {
    state: Arc<RwLock<RegistryState>>,
    notifier: Arc<dyn Notifier>,
    config: ServiceConfig,
}

impl AuctionService {
    pub fn new(notifier: Arc<dyn Notifier>, config: ServiceConfig) -> Self {
        Self {
            state: Arc::new(RwLock::new(RegistryState::new())),
            notifier,
            config,
        }
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Open a new auction in a channel.
    pub async fn start_auction(
        &self,
        channel_id: ChannelId,
        item: &str,
        duration_text: &str,
    ) -> Result<(), AuctionError> {
        let ctx = CallContext {
            now: Instant::now(),
        };
        let outbound = {
            let mut state = self.state.write();
            handlers::handle_start_auction(
                &mut state,
                &self.config,
                &ctx,
                channel_id,
                item,
                duration_text,
            )?
        };
        info!(%channel_id, item, duration_text, "auction started");
        self.dispatch(channel_id, outbound).await;
        Ok(())
    }

    /// Record a bid on the auction running in a channel.
    pub async fn place_bid(
        &self,
        channel_id: ChannelId,
        bidder: UserId,
        bid_text: &str,
    ) -> Result<(), AuctionError> {
        let ctx = CallContext {
            now: Instant::now(),
        };
        let outbound = {
            let mut state = self.state.write();
            handlers::handle_place_bid(&mut state, &self.config, &ctx, channel_id, bidder, bid_text)?
        };
        debug!(%channel_id, %bidder, "bid accepted");
        self.dispatch(channel_id, outbound).await;
        Ok(())
    }

    /// Snapshot of running auctions: channel, item, time remaining, and
    /// number of distinct bidders.
    pub fn active_auctions(&self) -> Vec<(ChannelId, String, Duration, usize)> {
        let now = Instant::now();
        let state = self.state.read();
        let mut listing: Vec<_> = state
            .auctions
            .values()
            .map(|auction| {
                (
                    auction.channel_id,
                    auction.item.clone(),
                    auction.end_time.saturating_duration_since(now),
                    auction.bids.len(),
                )
            })
            .collect();
        listing.sort_by_key(|entry| entry.0);
        listing
    }

    /// Spawn the background loop that settles expired auctions.
    pub fn spawn_expiry_loop(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.config.poll_interval);
            loop {
                ticker.tick().await;
                self.run_expiry_scan().await;
            }
        })
    }

    /// One pass over the registry: settle every auction whose deadline
    /// has passed. Each auction settles at most once even when scans
    /// run concurrently, and delivery for one settled auction never
    /// holds up removal of another.
    pub async fn run_expiry_scan(&self) {
        let due = {
            let state = self.state.read();
            state.expired_channels(Instant::now())
        };

        // Remove every still-due auction before delivering anything.
        let mut settled = Vec::new();
        for channel_id in due {
            // Re-check under the write lock: a concurrent scan may have
            // already claimed this auction, or a last-second bid may
            // have pushed the deadline out.
            let mut state = self.state.write();
            let still_due = state
                .get_auction(channel_id)
                .map_or(false, |auction| auction.has_ended(Instant::now()));
            if still_due {
                if let Some(auction) = state.remove_auction(channel_id) {
                    settled.push(auction);
                }
            }
        }

        // Deliveries run on their own tasks so a slow transport cannot
        // stall the next scan or this one's remaining settlements.
        for auction in settled {
            let channel_id = auction.channel_id;
            info!(
                %channel_id,
                item = auction.item,
                num_bids = auction.bids.len(),
                "auction settled"
            );
            let outbound = handlers::settle_auction(&auction);
            let service = self.clone();
            tokio::spawn(async move {
                service.dispatch(channel_id, outbound).await;
            });
        }
    }

    /// Deliver a batch of outbound events. Delivery failures are logged
    /// and otherwise ignored; they never fail the triggering command.
    async fn dispatch(&self, channel_id: ChannelId, outbound: Vec<Outbound>) {
        for message in outbound {
            let target = match message.recipient {
                Recipient::HostChannel => NotifyTarget::Channel(channel_id),
                Recipient::ResultsChannel => NotifyTarget::ResultsChannel,
                Recipient::Invoker(user_id) => NotifyTarget::User(user_id),
                Recipient::Member(user_id) => {
                    match self.notifier.resolve_member(channel_id, user_id).await {
                        Some(resolved) => NotifyTarget::User(resolved),
                        None => {
                            debug!(%channel_id, %user_id, "skipping unresolvable member");
                            continue;
                        }
                    }
                }
            };
            if let Err(err) = self.notifier.notify(target, &message.event).await {
                warn!(%channel_id, %err, "notification failed");
            }
        }
    }
}
