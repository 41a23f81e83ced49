//! Call handlers for auction operations.
//!
//! These functions implement the business logic for each operation. They
//! are synchronous, never perform I/O, and run under the caller's registry
//! lock; each returns the notifications the caller must dispatch after the
//! lock is released.

use crate::error::AuctionError;
use crate::service::ServiceConfig;
use crate::state::{Auction, RegistryState};
use auction_types::{parse_bid, parse_duration, AuctionEvent, ChannelId, Coins, UserId};
use std::collections::HashMap;
use tokio::time::Instant;

/// Context provided by the caller for each operation.
#[derive(Clone, Copy, Debug)]
pub struct CallContext {
    /// Time the operation was received
    pub now: Instant,
}

/// Result type for handlers.
pub type HandlerResult<T> = Result<T, AuctionError>;

/// Who should receive an outbound notification.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Recipient {
    /// The channel hosting the auction.
    HostChannel,

    /// The configured results channel.
    ResultsChannel,

    /// The user who issued the operation; always contactable.
    Invoker(UserId),

    /// A stored bidder; must be contact-resolved before a private send.
    Member(UserId),
}

/// A notification produced by a handler.
#[derive(Clone, Debug)]
pub struct Outbound {
    pub recipient: Recipient,
    pub event: AuctionEvent,
}

impl Outbound {
    fn new(recipient: Recipient, event: AuctionEvent) -> Self {
        Self { recipient, event }
    }
}

/// Handle the start-auction operation.
///
/// Fails if the channel already hosts an auction or the duration token is
/// invalid. The requested duration is clamped up to the configured floor so
/// every auction stays biddable for a minimum window.
pub fn handle_start_auction(
    state: &mut RegistryState,
    config: &ServiceConfig,
    ctx: &CallContext,
    channel_id: ChannelId,
    item: &str,
    duration_text: &str,
) -> HandlerResult<Vec<Outbound>> {
    if state.auctions.contains_key(&channel_id) {
        return Err(AuctionError::AuctionAlreadyActive);
    }

    let duration =
        parse_duration(duration_text).map_err(|_| AuctionError::InvalidDurationFormat)?;

    let end_time = ctx.now + duration.max(config.floor_duration);

    state.auctions.insert(
        channel_id,
        Auction {
            channel_id,
            item: item.to_string(),
            end_time,
            bids: HashMap::new(),
        },
    );

    Ok(vec![Outbound::new(
        Recipient::HostChannel,
        AuctionEvent::AuctionStarted {
            item: item.to_string(),
            duration_text: duration_text.to_string(),
        },
    )])
}

/// Handle the place-bid operation.
///
/// A bid is accepted only if it strictly exceeds both the bidder's own
/// standing bid and every other current bid, which makes every accepted
/// bid a new channel-wide maximum. A displacing bid landing inside the
/// extension window pushes the deadline out to `now + window`; a leader
/// re-raising against themselves never extends.
pub fn handle_place_bid(
    state: &mut RegistryState,
    config: &ServiceConfig,
    ctx: &CallContext,
    channel_id: ChannelId,
    bidder: UserId,
    bid_text: &str,
) -> HandlerResult<Vec<Outbound>> {
    let auction = state
        .get_auction_mut(channel_id)
        .ok_or(AuctionError::NoActiveAuction)?;

    // Late bids are rejected, not queued.
    if auction.has_ended(ctx.now) {
        return Err(AuctionError::AuctionEnded);
    }

    let amount = parse_bid(bid_text).map_err(|_| AuctionError::InvalidBidFormat)?;

    let own = auction.bids.get(&bidder).copied().unwrap_or(Coins::ZERO);
    if amount <= own {
        return Err(AuctionError::BidNotHigherThanOwn);
    }

    let previous_leader = auction.highest_bid();
    if let Some((_, highest)) = previous_leader {
        if amount <= highest {
            return Err(AuctionError::BidNotHighestOverall);
        }
    }

    let mut out = Vec::new();

    if let Some((leader, _)) = previous_leader {
        let remaining = auction.end_time.saturating_duration_since(ctx.now);
        if leader != bidder && remaining <= config.extension_window {
            // Never shortens the deadline.
            auction.end_time = auction.end_time.max(ctx.now + config.extension_window);

            out.push(Outbound::new(
                Recipient::Member(leader),
                AuctionEvent::AuctionExtendedNotice {
                    item: auction.item.clone(),
                },
            ));
            out.push(Outbound::new(
                Recipient::Invoker(bidder),
                AuctionEvent::AuctionExtended {
                    item: auction.item.clone(),
                },
            ));
        }
    }

    auction.bids.insert(bidder, amount);

    out.push(Outbound::new(
        Recipient::Invoker(bidder),
        AuctionEvent::BidAccepted {
            item: auction.item.clone(),
            display_amount: amount.to_string(),
            is_highest: true,
        },
    ));

    // Every other bidder still in the running learns they were outbid,
    // with their own standing amount.
    for (&other, &their_bid) in &auction.bids {
        if other != bidder {
            out.push(Outbound::new(
                Recipient::Member(other),
                AuctionEvent::OutbidAlert {
                    item: auction.item.clone(),
                    display_amount: their_bid.to_string(),
                },
            ));
        }
    }

    Ok(out)
}

/// Compute settlement notifications for an auction already removed from
/// the registry.
///
/// The winner is the bidder with the largest recorded amount; the hosting
/// channel sees the winner without the amount, the results channel sees
/// both, and the winner gets a private congratulation.
pub fn settle_auction(auction: &Auction) -> Vec<Outbound> {
    match auction.highest_bid() {
        None => vec![
            Outbound::new(
                Recipient::HostChannel,
                AuctionEvent::NoBidsResult {
                    item: auction.item.clone(),
                },
            ),
            Outbound::new(
                Recipient::ResultsChannel,
                AuctionEvent::NoBidsResult {
                    item: auction.item.clone(),
                },
            ),
        ],
        Some((winner, amount)) => vec![
            Outbound::new(
                Recipient::HostChannel,
                AuctionEvent::WinnerResult {
                    item: auction.item.clone(),
                    winner,
                    amount: None,
                },
            ),
            Outbound::new(
                Recipient::ResultsChannel,
                AuctionEvent::WinnerResult {
                    item: auction.item.clone(),
                    winner,
                    amount: Some(amount),
                },
            ),
            Outbound::new(
                Recipient::Member(winner),
                AuctionEvent::WinnerCongratulation {
                    item: auction.item.clone(),
                    display_amount: amount.to_string(),
                },
            ),
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    const CHANNEL: ChannelId = ChannelId(1);
    const ALICE: UserId = UserId(10);
    const BOB: UserId = UserId(20);
    const CAROL: UserId = UserId(30);

    fn test_config() -> ServiceConfig {
        ServiceConfig {
            floor_duration: Duration::from_secs(10),
            extension_window: Duration::from_secs(15),
            poll_interval: Duration::from_secs(1),
        }
    }

    fn ctx_at(now: Instant) -> CallContext {
        CallContext { now }
    }

    fn start(state: &mut RegistryState, now: Instant, duration: &str) {
        handle_start_auction(
            state,
            &test_config(),
            &ctx_at(now),
            CHANNEL,
            "rare sword",
            duration,
        )
        .unwrap();
    }

    #[test]
    fn test_start_emits_announcement() {
        let now = Instant::now();
        let mut state = RegistryState::new();

        let out = handle_start_auction(
            &mut state,
            &test_config(),
            &ctx_at(now),
            CHANNEL,
            "rare sword",
            "5m",
        )
        .unwrap();

        assert_eq!(out.len(), 1);
        assert_eq!(out[0].recipient, Recipient::HostChannel);
        assert!(matches!(
            &out[0].event,
            AuctionEvent::AuctionStarted { item, duration_text }
                if item == "rare sword" && duration_text == "5m"
        ));

        let auction = state.get_auction(CHANNEL).unwrap();
        assert_eq!(auction.end_time, now + Duration::from_secs(300));
        assert!(auction.bids.is_empty());
    }

    #[test]
    fn test_start_duplicate_fails() {
        let now = Instant::now();
        let mut state = RegistryState::new();
        start(&mut state, now, "5m");

        let err = handle_start_auction(
            &mut state,
            &test_config(),
            &ctx_at(now),
            CHANNEL,
            "another item",
            "2h",
        )
        .unwrap_err();
        assert_eq!(err, AuctionError::AuctionAlreadyActive);
    }

    #[test]
    fn test_start_invalid_duration() {
        let now = Instant::now();
        let mut state = RegistryState::new();

        let err = handle_start_auction(
            &mut state,
            &test_config(),
            &ctx_at(now),
            CHANNEL,
            "rare sword",
            "5x",
        )
        .unwrap_err();
        assert_eq!(err, AuctionError::InvalidDurationFormat);
        assert!(state.get_auction(CHANNEL).is_none());
    }

    #[test]
    fn test_start_clamps_to_floor() {
        let now = Instant::now();
        let mut state = RegistryState::new();
        start(&mut state, now, "0m");

        let auction = state.get_auction(CHANNEL).unwrap();
        assert_eq!(auction.end_time, now + Duration::from_secs(10));
    }

    #[test]
    fn test_bid_without_auction() {
        let now = Instant::now();
        let mut state = RegistryState::new();

        let err = handle_place_bid(
            &mut state,
            &test_config(),
            &ctx_at(now),
            CHANNEL,
            ALICE,
            "1g",
        )
        .unwrap_err();
        assert_eq!(err, AuctionError::NoActiveAuction);
    }

    #[test]
    fn test_bid_after_deadline() {
        let now = Instant::now();
        let mut state = RegistryState::new();
        start(&mut state, now, "5m");

        let late = now + Duration::from_secs(300);
        let err = handle_place_bid(
            &mut state,
            &test_config(),
            &ctx_at(late),
            CHANNEL,
            ALICE,
            "1g",
        )
        .unwrap_err();
        assert_eq!(err, AuctionError::AuctionEnded);
    }

    #[test]
    fn test_bid_invalid_format() {
        let now = Instant::now();
        let mut state = RegistryState::new();
        start(&mut state, now, "5m");

        let err = handle_place_bid(
            &mut state,
            &test_config(),
            &ctx_at(now),
            CHANNEL,
            ALICE,
            "50g 1m",
        )
        .unwrap_err();
        assert_eq!(err, AuctionError::InvalidBidFormat);
        assert!(state.get_auction(CHANNEL).unwrap().bids.is_empty());
    }

    #[test]
    fn test_bid_must_beat_own() {
        let now = Instant::now();
        let mut state = RegistryState::new();
        start(&mut state, now, "5m");
        let config = test_config();
        let ctx = ctx_at(now);

        handle_place_bid(&mut state, &config, &ctx, CHANNEL, ALICE, "5g").unwrap();

        let err = handle_place_bid(&mut state, &config, &ctx, CHANNEL, ALICE, "5g").unwrap_err();
        assert_eq!(err, AuctionError::BidNotHigherThanOwn);

        let err = handle_place_bid(&mut state, &config, &ctx, CHANNEL, ALICE, "4g").unwrap_err();
        assert_eq!(err, AuctionError::BidNotHigherThanOwn);
    }

    #[test]
    fn test_bid_must_beat_highest_overall() {
        let now = Instant::now();
        let mut state = RegistryState::new();
        start(&mut state, now, "5m");
        let config = test_config();
        let ctx = ctx_at(now);

        handle_place_bid(&mut state, &config, &ctx, CHANNEL, ALICE, "1p").unwrap();

        // 100g equals 1p; a tie is not an improvement.
        let err = handle_place_bid(&mut state, &config, &ctx, CHANNEL, BOB, "100g").unwrap_err();
        assert_eq!(err, AuctionError::BidNotHighestOverall);

        let err = handle_place_bid(&mut state, &config, &ctx, CHANNEL, BOB, "50g").unwrap_err();
        assert_eq!(err, AuctionError::BidNotHighestOverall);

        // A rejected bid leaves no trace.
        assert!(!state.get_auction(CHANNEL).unwrap().bids.contains_key(&BOB));
    }

    #[test]
    fn test_accepted_amounts_strictly_increase() {
        let now = Instant::now();
        let mut state = RegistryState::new();
        start(&mut state, now, "5m");
        let config = test_config();
        let ctx = ctx_at(now);

        let mut last = Coins::ZERO;
        for (bidder, bid) in [
            (ALICE, "1g"),
            (BOB, "2g"),
            (ALICE, "1p"),
            (CAROL, "2p"),
            (ALICE, "1m"),
        ] {
            handle_place_bid(&mut state, &config, &ctx, CHANNEL, bidder, bid).unwrap();
            let (_, highest) = state.get_auction(CHANNEL).unwrap().highest_bid().unwrap();
            assert!(highest > last);
            last = highest;
        }
    }

    #[test]
    fn test_outbid_alerts_fan_out() {
        let now = Instant::now();
        let mut state = RegistryState::new();
        start(&mut state, now, "5m");
        let config = test_config();
        let ctx = ctx_at(now);

        handle_place_bid(&mut state, &config, &ctx, CHANNEL, ALICE, "1g").unwrap();
        handle_place_bid(&mut state, &config, &ctx, CHANNEL, BOB, "2g").unwrap();
        let out = handle_place_bid(&mut state, &config, &ctx, CHANNEL, CAROL, "3g").unwrap();

        let alerts: Vec<_> = out
            .iter()
            .filter(|o| matches!(o.event, AuctionEvent::OutbidAlert { .. }))
            .collect();
        assert_eq!(alerts.len(), 2);

        // Each alert carries the recipient's own standing bid.
        for alert in alerts {
            match (&alert.recipient, &alert.event) {
                (Recipient::Member(user), AuctionEvent::OutbidAlert { display_amount, .. }) => {
                    let expected = if *user == ALICE { "1g" } else { "2g" };
                    assert_eq!(display_amount, expected);
                }
                other => panic!("unexpected outbound: {other:?}"),
            }
        }

        assert!(out.iter().any(|o| matches!(
            (&o.recipient, &o.event),
            (Recipient::Invoker(user), AuctionEvent::BidAccepted { is_highest: true, .. })
                if *user == CAROL
        )));
    }

    #[test]
    fn test_extension_on_late_displacing_bid() {
        let now = Instant::now();
        let mut state = RegistryState::new();
        start(&mut state, now, "5m");
        let config = test_config();

        handle_place_bid(&mut state, &config, &ctx_at(now), CHANNEL, ALICE, "1g").unwrap();

        // 10 seconds remain, inside the 15 second window.
        let late = now + Duration::from_secs(290);
        let out =
            handle_place_bid(&mut state, &config, &ctx_at(late), CHANNEL, BOB, "2g").unwrap();

        let auction = state.get_auction(CHANNEL).unwrap();
        assert_eq!(auction.end_time, late + config.extension_window);

        assert!(out.iter().any(|o| matches!(
            (&o.recipient, &o.event),
            (Recipient::Member(user), AuctionEvent::AuctionExtendedNotice { .. })
                if *user == ALICE
        )));
        assert!(out.iter().any(|o| matches!(
            (&o.recipient, &o.event),
            (Recipient::Invoker(user), AuctionEvent::AuctionExtended { .. })
                if *user == BOB
        )));
    }

    #[test]
    fn test_no_extension_outside_window() {
        let now = Instant::now();
        let mut state = RegistryState::new();
        start(&mut state, now, "5m");
        let config = test_config();

        handle_place_bid(&mut state, &config, &ctx_at(now), CHANNEL, ALICE, "1g").unwrap();

        let mid = now + Duration::from_secs(60);
        let out = handle_place_bid(&mut state, &config, &ctx_at(mid), CHANNEL, BOB, "2g").unwrap();

        assert_eq!(
            state.get_auction(CHANNEL).unwrap().end_time,
            now + Duration::from_secs(300)
        );
        assert!(!out
            .iter()
            .any(|o| matches!(o.event, AuctionEvent::AuctionExtended { .. })));
    }

    #[test]
    fn test_no_extension_for_leader_rebid() {
        let now = Instant::now();
        let mut state = RegistryState::new();
        start(&mut state, now, "5m");
        let config = test_config();

        handle_place_bid(&mut state, &config, &ctx_at(now), CHANNEL, ALICE, "1g").unwrap();

        // The leader raising against themselves inside the window does not
        // move the deadline.
        let late = now + Duration::from_secs(295);
        let out =
            handle_place_bid(&mut state, &config, &ctx_at(late), CHANNEL, ALICE, "2g").unwrap();

        assert_eq!(
            state.get_auction(CHANNEL).unwrap().end_time,
            now + Duration::from_secs(300)
        );
        assert!(!out
            .iter()
            .any(|o| matches!(o.event, AuctionEvent::AuctionExtended { .. })));
    }

    #[test]
    fn test_no_extension_on_first_bid() {
        let now = Instant::now();
        let mut state = RegistryState::new();
        start(&mut state, now, "0m");
        let config = test_config();

        // Remaining 10s is inside the window, but there is nobody to
        // displace.
        let out = handle_place_bid(&mut state, &config, &ctx_at(now), CHANNEL, ALICE, "1g")
            .unwrap();

        assert_eq!(
            state.get_auction(CHANNEL).unwrap().end_time,
            now + Duration::from_secs(10)
        );
        assert!(!out
            .iter()
            .any(|o| matches!(o.event, AuctionEvent::AuctionExtended { .. })));
    }

    #[test]
    fn test_extension_never_shortens() {
        let now = Instant::now();
        let mut state = RegistryState::new();
        start(&mut state, now, "5m");
        let config = test_config();

        handle_place_bid(&mut state, &config, &ctx_at(now), CHANNEL, ALICE, "1g").unwrap();

        // Exactly the window remains: the boundary triggers and the new
        // deadline equals the old one.
        let boundary = now + Duration::from_secs(285);
        let before = state.get_auction(CHANNEL).unwrap().end_time;
        handle_place_bid(&mut state, &config, &ctx_at(boundary), CHANNEL, BOB, "2g").unwrap();
        let after = state.get_auction(CHANNEL).unwrap().end_time;

        assert!(after >= before);
        assert_eq!(after, boundary + config.extension_window);
    }

    #[test]
    fn test_settle_no_bids() {
        let now = Instant::now();
        let auction = Auction {
            channel_id: CHANNEL,
            item: "rare sword".to_string(),
            end_time: now,
            bids: HashMap::new(),
        };

        let out = settle_auction(&auction);
        assert_eq!(out.len(), 2);
        assert!(out.iter().all(|o| matches!(
            o.event,
            AuctionEvent::NoBidsResult { .. }
        )));
        assert!(out.iter().any(|o| o.recipient == Recipient::HostChannel));
        assert!(out.iter().any(|o| o.recipient == Recipient::ResultsChannel));
    }

    #[test]
    fn test_settle_with_winner() {
        let now = Instant::now();
        let mut bids = HashMap::new();
        bids.insert(ALICE, Coins(100));
        bids.insert(BOB, Coins(1_510_500));
        let auction = Auction {
            channel_id: CHANNEL,
            item: "rare sword".to_string(),
            end_time: now,
            bids,
        };

        let out = settle_auction(&auction);
        assert_eq!(out.len(), 3);

        // Hosting channel sees the winner but not the amount.
        assert!(out.iter().any(|o| matches!(
            (&o.recipient, &o.event),
            (Recipient::HostChannel, AuctionEvent::WinnerResult { winner, amount: None, .. })
                if *winner == BOB
        )));
        // Results channel sees the amount.
        assert!(out.iter().any(|o| matches!(
            (&o.recipient, &o.event),
            (
                Recipient::ResultsChannel,
                AuctionEvent::WinnerResult { winner, amount: Some(amount), .. },
            ) if *winner == BOB && *amount == Coins(1_510_500)
        )));
        // Winner gets a private congratulation with the display amount.
        assert!(out.iter().any(|o| matches!(
            (&o.recipient, &o.event),
            (
                Recipient::Member(user),
                AuctionEvent::WinnerCongratulation { display_amount, .. },
            ) if *user == BOB && display_amount == "1m 51p 5g"
        )));
    }
}
