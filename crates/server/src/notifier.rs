//! In-process notifier backing the RPC server.
//!
//! Deliveries are logged and appended to an in-memory event log that
//! clients can poll through `query_getEvents`. This stands in for a
//! real chat transport.

use std::collections::VecDeque;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::{debug, info};

use auction_engine::{Notifier, NotifyError};
use auction_types::{AuctionEvent, ChannelId, NotifyTarget, UserId};

use crate::types::EventRecordRpc;

/// Oldest records are dropped past this size; sequence numbers stay
/// monotonic so a poller can detect the gap.
const EVENT_LOG_CAP: usize = 1024;

struct EventLog {
    next_seq: u64,
    records: VecDeque<EventRecordRpc>,
}

pub struct RecordingNotifier {
    results_channel: Option<ChannelId>,
    log: Mutex<EventLog>,
}

impl RecordingNotifier {
    pub fn new(results_channel: Option<ChannelId>) -> Self {
        Self {
            results_channel,
            log: Mutex::new(EventLog {
                next_seq: 1,
                records: VecDeque::new(),
            }),
        }
    }

    /// Events with a sequence number strictly greater than `seq`.
    pub fn events_since(&self, seq: u64) -> Vec<EventRecordRpc> {
        self.log
            .lock()
            .records
            .iter()
            .filter(|record| record.seq > seq)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, target: NotifyTarget, event: &AuctionEvent) -> Result<(), NotifyError> {
        let rendered = match target {
            NotifyTarget::Channel(channel_id) => format!("channel:{channel_id}"),
            NotifyTarget::User(user_id) => format!("user:{user_id}"),
            NotifyTarget::ResultsChannel => match self.results_channel {
                Some(channel_id) => format!("results:{channel_id}"),
                // No results channel configured; drop quietly.
                None => return Ok(()),
            },
        };

        info!(dest = rendered, ?event, "delivering notification");

        let mut log = self.log.lock();
        let seq = log.next_seq;
        log.next_seq += 1;
        log.records.push_back(EventRecordRpc {
            seq,
            target: rendered,
            event: event.clone(),
        });
        while log.records.len() > EVENT_LOG_CAP {
            log.records.pop_front();
        }
        Ok(())
    }

    async fn resolve_member(&self, channel_id: ChannelId, user_id: UserId) -> Option<UserId> {
        debug!(%channel_id, %user_id, "resolving member");
        Some(user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_events_since_filters_by_sequence() {
        let notifier = RecordingNotifier::new(None);
        let event = AuctionEvent::NoBidsResult {
            item: "ancient blade".into(),
        };

        notifier
            .notify(NotifyTarget::Channel(ChannelId(1)), &event)
            .await
            .unwrap();
        notifier
            .notify(NotifyTarget::Channel(ChannelId(2)), &event)
            .await
            .unwrap();

        assert_eq!(notifier.events_since(0).len(), 2);
        let tail = notifier.events_since(1);
        assert_eq!(tail.len(), 1);
        assert_eq!(tail[0].seq, 2);
        assert_eq!(tail[0].target, "channel:2");
    }

    #[tokio::test]
    async fn test_results_delivery_dropped_without_results_channel() {
        let notifier = RecordingNotifier::new(None);
        let event = AuctionEvent::NoBidsResult {
            item: "ancient blade".into(),
        };

        notifier
            .notify(NotifyTarget::ResultsChannel, &event)
            .await
            .unwrap();
        assert!(notifier.events_since(0).is_empty());

        let routed = RecordingNotifier::new(Some(ChannelId(99)));
        routed
            .notify(NotifyTarget::ResultsChannel, &event)
            .await
            .unwrap();
        assert_eq!(routed.events_since(0)[0].target, "results:99");
    }

    #[tokio::test]
    async fn test_log_is_capped_with_monotonic_seq() {
        let notifier = RecordingNotifier::new(None);
        let event = AuctionEvent::NoBidsResult {
            item: "ancient blade".into(),
        };

        let total = (EVENT_LOG_CAP + 10) as u64;
        for _ in 0..total {
            notifier
                .notify(NotifyTarget::Channel(ChannelId(1)), &event)
                .await
                .unwrap();
        }

        let records = notifier.events_since(0);
        assert_eq!(records.len(), EVENT_LOG_CAP);
        // Oldest entries were dropped; numbering continues unbroken.
        assert_eq!(records.first().unwrap().seq, 11);
        assert_eq!(records.last().unwrap().seq, total);
    }
}
