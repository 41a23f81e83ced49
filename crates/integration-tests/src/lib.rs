//! End-to-end integration tests for the silent auction engine.
//!
//! These tests exercise the full auction lifecycle:
//! 1. Opening an auction in a channel
//! 2. Sealed bidding with outbid alerts
//! 3. Anti-snipe deadline extension
//! 4. Expiry scanning and settlement
//! 5. Winner and no-bid announcements

#![cfg(test)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::time::advance;

use auction_engine::{
    AuctionError, AuctionService, Notifier, NotifyError, ServiceConfig,
};
use auction_types::{AuctionEvent, ChannelId, Coins, NotifyTarget, UserId};

const CHANNEL: ChannelId = ChannelId(1);
const ALICE: UserId = UserId(10);
const BOB: UserId = UserId(20);
const CAROL: UserId = UserId(30);

/// Notifier that records deliveries and can be told to fail or to
/// refuse resolving certain members.
#[derive(Default)]
struct RecordingNotifier {
    deliveries: Mutex<Vec<(NotifyTarget, AuctionEvent)>>,
    unresolvable: Mutex<Vec<UserId>>,
    fail_all: AtomicBool,
}

impl RecordingNotifier {
    fn deliveries(&self) -> Vec<(NotifyTarget, AuctionEvent)> {
        self.deliveries.lock().clone()
    }

    fn mark_unresolvable(&self, user_id: UserId) {
        self.unresolvable.lock().push(user_id);
    }

    fn fail_all(&self) {
        self.fail_all.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, target: NotifyTarget, event: &AuctionEvent) -> Result<(), NotifyError> {
        if self.fail_all.load(Ordering::SeqCst) {
            return Err(NotifyError::Unreachable);
        }
        self.deliveries.lock().push((target, event.clone()));
        Ok(())
    }

    async fn resolve_member(&self, _channel_id: ChannelId, user_id: UserId) -> Option<UserId> {
        if self.unresolvable.lock().contains(&user_id) {
            None
        } else {
            Some(user_id)
        }
    }
}

/// Notifier that can be armed to hang deliveries to one channel while
/// still recording everything else.
struct StallingNotifier {
    stalled_channel: ChannelId,
    armed: AtomicBool,
    deliveries: Mutex<Vec<(NotifyTarget, AuctionEvent)>>,
}

impl StallingNotifier {
    fn new(stalled_channel: ChannelId) -> Self {
        Self {
            stalled_channel,
            armed: AtomicBool::new(false),
            deliveries: Mutex::new(Vec::new()),
        }
    }

    fn arm(&self) {
        self.armed.store(true, Ordering::SeqCst);
    }

    fn deliveries(&self) -> Vec<(NotifyTarget, AuctionEvent)> {
        self.deliveries.lock().clone()
    }
}

#[async_trait]
impl Notifier for StallingNotifier {
    async fn notify(&self, target: NotifyTarget, event: &AuctionEvent) -> Result<(), NotifyError> {
        if self.armed.load(Ordering::SeqCst) && target == NotifyTarget::Channel(self.stalled_channel)
        {
            std::future::pending::<()>().await;
        }
        self.deliveries.lock().push((target, event.clone()));
        Ok(())
    }

    async fn resolve_member(&self, _channel_id: ChannelId, user_id: UserId) -> Option<UserId> {
        Some(user_id)
    }
}

/// Let spawned delivery tasks run to completion.
async fn drain_dispatch() {
    for _ in 0..8 {
        tokio::task::yield_now().await;
    }
}

fn test_config() -> ServiceConfig {
    ServiceConfig {
        floor_duration: Duration::from_secs(10),
        extension_window: Duration::from_secs(15),
        poll_interval: Duration::from_secs(1),
    }
}

fn new_service() -> (AuctionService, Arc<RecordingNotifier>) {
    let notifier = Arc::new(RecordingNotifier::default());
    (AuctionService::new(notifier.clone(), test_config()), notifier)
}

fn events_of<'a>(
    deliveries: &'a [(NotifyTarget, AuctionEvent)],
    target: NotifyTarget,
) -> Vec<&'a AuctionEvent> {
    deliveries
        .iter()
        .filter(|(dest, _)| *dest == target)
        .map(|(_, event)| event)
        .collect()
}

#[tokio::test(start_paused = true)]
async fn test_full_auction_lifecycle() {
    let (service, notifier) = new_service();

    // Phase 1: open the auction.
    service
        .start_auction(CHANNEL, "ancient blade", "5m")
        .await
        .unwrap();

    // Phase 2: three sealed bids, each raising the global maximum.
    service.place_bid(CHANNEL, ALICE, "100g").await.unwrap();
    service.place_bid(CHANNEL, BOB, "2p").await.unwrap();
    service.place_bid(CHANNEL, CAROL, "1m").await.unwrap();

    // Phase 3: run out the clock and settle.
    advance(Duration::from_secs(300)).await;
    service.run_expiry_scan().await;
    assert!(service.active_auctions().is_empty());
    drain_dispatch().await;

    let deliveries = notifier.deliveries();

    // The hosting channel sees the result with the amount withheld.
    let channel_events = events_of(&deliveries, NotifyTarget::Channel(CHANNEL));
    assert!(channel_events.contains(&&AuctionEvent::WinnerResult {
        item: "ancient blade".into(),
        winner: CAROL,
        amount: None,
    }));

    // The results channel sees the winning amount.
    let results_events = events_of(&deliveries, NotifyTarget::ResultsChannel);
    assert_eq!(
        results_events,
        vec![&AuctionEvent::WinnerResult {
            item: "ancient blade".into(),
            winner: CAROL,
            amount: Some(Coins(1_000_000)),
        }]
    );

    // The winner gets a private congratulation.
    let carol_events = events_of(&deliveries, NotifyTarget::User(CAROL));
    assert!(carol_events.contains(&&AuctionEvent::WinnerCongratulation {
        item: "ancient blade".into(),
        display_amount: "1m".into(),
    }));
}

#[tokio::test(start_paused = true)]
async fn test_outbid_alerts_reach_every_other_bidder() {
    let (service, notifier) = new_service();

    service
        .start_auction(CHANNEL, "ancient blade", "5m")
        .await
        .unwrap();
    service.place_bid(CHANNEL, ALICE, "1g").await.unwrap();
    service.place_bid(CHANNEL, BOB, "2g").await.unwrap();
    service.place_bid(CHANNEL, CAROL, "3g").await.unwrap();

    let deliveries = notifier.deliveries();

    // Alice is alerted twice (after Bob's bid and after Carol's), each
    // time reminded of her own standing bid.
    let alice_alerts: Vec<_> = events_of(&deliveries, NotifyTarget::User(ALICE))
        .into_iter()
        .filter(|event| matches!(event, AuctionEvent::OutbidAlert { .. }))
        .collect();
    assert_eq!(
        alice_alerts,
        vec![
            &AuctionEvent::OutbidAlert {
                item: "ancient blade".into(),
                display_amount: "1g".into(),
            },
            &AuctionEvent::OutbidAlert {
                item: "ancient blade".into(),
                display_amount: "1g".into(),
            },
        ]
    );

    // Bob is alerted once, after Carol's bid.
    let bob_alerts: Vec<_> = events_of(&deliveries, NotifyTarget::User(BOB))
        .into_iter()
        .filter(|event| matches!(event, AuctionEvent::OutbidAlert { .. }))
        .collect();
    assert_eq!(bob_alerts.len(), 1);

    // Carol holds the lead and has never been alerted.
    let carol_alerts: Vec<_> = events_of(&deliveries, NotifyTarget::User(CAROL))
        .into_iter()
        .filter(|event| matches!(event, AuctionEvent::OutbidAlert { .. }))
        .collect();
    assert!(carol_alerts.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_no_bids_settlement() {
    let (service, notifier) = new_service();

    service
        .start_auction(CHANNEL, "ancient blade", "1m")
        .await
        .unwrap();
    advance(Duration::from_secs(60)).await;
    service.run_expiry_scan().await;
    drain_dispatch().await;

    let deliveries = notifier.deliveries();
    let no_bids = AuctionEvent::NoBidsResult {
        item: "ancient blade".into(),
    };
    assert!(events_of(&deliveries, NotifyTarget::Channel(CHANNEL)).contains(&&no_bids));
    assert!(events_of(&deliveries, NotifyTarget::ResultsChannel).contains(&&no_bids));
}

#[tokio::test(start_paused = true)]
async fn test_anti_snipe_extension_moves_deadline() {
    let (service, notifier) = new_service();

    service
        .start_auction(CHANNEL, "ancient blade", "1m")
        .await
        .unwrap();
    service.place_bid(CHANNEL, ALICE, "1g").await.unwrap();

    // 10 seconds left: Bob takes the lead, pushing the deadline out to
    // 15 seconds from now.
    advance(Duration::from_secs(50)).await;
    service.place_bid(CHANNEL, BOB, "2g").await.unwrap();

    let deliveries = notifier.deliveries();
    assert!(events_of(&deliveries, NotifyTarget::User(BOB))
        .iter()
        .any(|event| matches!(event, AuctionEvent::AuctionExtended { .. })));
    assert!(events_of(&deliveries, NotifyTarget::User(ALICE))
        .iter()
        .any(|event| matches!(event, AuctionEvent::AuctionExtendedNotice { .. })));

    // The original deadline passes without settlement.
    advance(Duration::from_secs(14)).await;
    service.run_expiry_scan().await;
    assert_eq!(service.active_auctions().len(), 1);

    // The extended deadline settles normally.
    advance(Duration::from_secs(2)).await;
    service.run_expiry_scan().await;
    assert!(service.active_auctions().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_leader_rebid_never_extends() {
    let (service, notifier) = new_service();

    service
        .start_auction(CHANNEL, "ancient blade", "1m")
        .await
        .unwrap();
    service.place_bid(CHANNEL, ALICE, "1g").await.unwrap();

    advance(Duration::from_secs(55)).await;
    service.place_bid(CHANNEL, ALICE, "5g").await.unwrap();

    assert!(!notifier
        .deliveries()
        .iter()
        .any(|(_, event)| matches!(event, AuctionEvent::AuctionExtended { .. })));

    advance(Duration::from_secs(5)).await;
    service.run_expiry_scan().await;
    assert!(service.active_auctions().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_late_and_invalid_bids_rejected() {
    let (service, _notifier) = new_service();

    service
        .start_auction(CHANNEL, "ancient blade", "1m")
        .await
        .unwrap();

    assert_eq!(
        service.place_bid(CHANNEL, ALICE, "50g 1m").await,
        Err(AuctionError::InvalidBidFormat)
    );
    assert_eq!(
        service.place_bid(ChannelId(99), ALICE, "1g").await,
        Err(AuctionError::NoActiveAuction)
    );

    service.place_bid(CHANNEL, ALICE, "1g").await.unwrap();
    assert_eq!(
        service.place_bid(CHANNEL, ALICE, "1g").await,
        Err(AuctionError::BidNotHigherThanOwn)
    );
    assert_eq!(
        service.place_bid(CHANNEL, BOB, "100s").await,
        Err(AuctionError::BidNotHighestOverall)
    );

    // Past the deadline the auction refuses bids even before the scan
    // removes it.
    advance(Duration::from_secs(60)).await;
    assert_eq!(
        service.place_bid(CHANNEL, BOB, "1p").await,
        Err(AuctionError::AuctionEnded)
    );
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_scans_settle_exactly_once() {
    let (service, notifier) = new_service();

    service
        .start_auction(CHANNEL, "ancient blade", "1m")
        .await
        .unwrap();
    service.place_bid(CHANNEL, ALICE, "1g").await.unwrap();

    advance(Duration::from_secs(60)).await;
    tokio::join!(service.run_expiry_scan(), service.run_expiry_scan());
    drain_dispatch().await;

    let winner_results = notifier
        .deliveries()
        .into_iter()
        .filter(|(_, event)| matches!(event, AuctionEvent::WinnerResult { .. }))
        .count();
    // One to the hosting channel, one to the results channel; nothing
    // doubled.
    assert_eq!(winner_results, 2);

    service.run_expiry_scan().await;
    drain_dispatch().await;
    let after_rerun = notifier
        .deliveries()
        .into_iter()
        .filter(|(_, event)| matches!(event, AuctionEvent::WinnerResult { .. }))
        .count();
    assert_eq!(after_rerun, 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_bidders_no_lost_updates() {
    let (service, notifier) = new_service();

    service
        .start_auction(CHANNEL, "ancient blade", "5m")
        .await
        .unwrap();

    // Twenty bidders race with strictly distinct amounts.
    let mut tasks = tokio::task::JoinSet::new();
    for i in 1..=20u64 {
        let service = service.clone();
        tasks.spawn(async move {
            service
                .place_bid(CHANNEL, UserId(i), &format!("{}g", i))
                .await
        });
    }
    let mut accepted = 0;
    while let Some(result) = tasks.join_next().await {
        if result.unwrap().is_ok() {
            accepted += 1;
        }
    }

    // The 20g bidder always wins the race regardless of interleaving,
    // and at least that bid was accepted.
    assert!(accepted >= 1);
    let deliveries = notifier.deliveries();
    let top_accepted = events_of(&deliveries, NotifyTarget::User(UserId(20)))
        .into_iter()
        .any(|event| matches!(event, AuctionEvent::BidAccepted { is_highest: true, .. }));
    assert!(top_accepted);

    let listing = service.active_auctions();
    assert_eq!(listing.len(), 1);
    assert_eq!(listing[0].3, accepted);
}

#[tokio::test(start_paused = true)]
async fn test_notifier_failure_does_not_block_settlement() {
    let (service, notifier) = new_service();

    service
        .start_auction(CHANNEL, "ancient blade", "1m")
        .await
        .unwrap();
    service.place_bid(CHANNEL, ALICE, "1g").await.unwrap();

    notifier.fail_all();
    advance(Duration::from_secs(60)).await;
    service.run_expiry_scan().await;

    // Settlement removed the auction even though every delivery failed.
    assert!(service.active_auctions().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_stalled_delivery_does_not_block_other_settlements() {
    let notifier = Arc::new(StallingNotifier::new(CHANNEL));
    let service = AuctionService::new(notifier.clone(), test_config());

    service
        .start_auction(CHANNEL, "ancient blade", "1m")
        .await
        .unwrap();
    service
        .start_auction(ChannelId(2), "iron shield", "1m")
        .await
        .unwrap();
    notifier.arm();

    // Channel 1's settlement delivery hangs forever; the scan must still
    // return and channel 2 must still settle and announce.
    advance(Duration::from_secs(60)).await;
    service.run_expiry_scan().await;
    assert!(service.active_auctions().is_empty());

    drain_dispatch().await;
    assert!(events_of(&notifier.deliveries(), NotifyTarget::Channel(ChannelId(2))).contains(
        &&AuctionEvent::NoBidsResult {
            item: "iron shield".into(),
        }
    ));

    // A later scan is not held up by the hung delivery either.
    service
        .start_auction(ChannelId(3), "oak staff", "1m")
        .await
        .unwrap();
    advance(Duration::from_secs(60)).await;
    service.run_expiry_scan().await;
    assert!(service.active_auctions().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_unresolvable_winner_skips_congratulation() {
    let (service, notifier) = new_service();

    service
        .start_auction(CHANNEL, "ancient blade", "1m")
        .await
        .unwrap();
    service.place_bid(CHANNEL, ALICE, "1g").await.unwrap();
    notifier.mark_unresolvable(ALICE);

    advance(Duration::from_secs(60)).await;
    service.run_expiry_scan().await;
    drain_dispatch().await;

    let deliveries = notifier.deliveries();
    assert!(!deliveries
        .iter()
        .any(|(_, event)| matches!(event, AuctionEvent::WinnerCongratulation { .. })));

    // The public results still went out.
    assert!(events_of(&deliveries, NotifyTarget::Channel(CHANNEL))
        .iter()
        .any(|event| matches!(event, AuctionEvent::WinnerResult { .. })));
}

#[tokio::test(start_paused = true)]
async fn test_expiry_loop_settles_in_background() {
    let (service, notifier) = new_service();

    service
        .start_auction(CHANNEL, "ancient blade", "1m")
        .await
        .unwrap();
    service.place_bid(CHANNEL, ALICE, "1g").await.unwrap();

    let handle = service.clone().spawn_expiry_loop();
    tokio::time::sleep(Duration::from_secs(62)).await;

    assert!(service.active_auctions().is_empty());
    assert!(notifier
        .deliveries()
        .iter()
        .any(|(_, event)| matches!(event, AuctionEvent::WinnerResult { .. })));
    handle.abort();
}
