//! Deduplication ledger.
//!
//! Providers retry deliveries they consider unacknowledged, so the same event
//! can arrive more than once. The dispatcher records every event id here before
//! handing the event to a handler; only the first recorder wins.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::{mapref::entry::Entry, DashMap};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Storage contract for processed event ids.
///
/// `record_if_new` must be atomic per id: concurrent calls for the same id
/// return `true` for exactly one caller.
#[async_trait]
pub trait DedupLedger: Send + Sync {
    /// Record `event_id`, returning `true` if it had not been seen before.
    async fn record_if_new(&self, event_id: &str) -> bool;
}

/// In-process ledger keyed by event id.
///
/// Entries remember when they were first seen so they can be purged after a
/// retention window. State is lost on restart.
#[derive(Debug, Default)]
pub struct MemoryLedger {
    seen: DashMap<String, Instant>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    /// Drop ids first seen more than `retention` ago. Returns how many were removed.
    pub fn purge_older_than(&self, retention: Duration) -> usize {
        let before = self.seen.len();
        let now = Instant::now();
        self.seen
            .retain(|_, first_seen| now.saturating_duration_since(*first_seen) <= retention);
        before.saturating_sub(self.seen.len())
    }

    /// Purge expired ids every `interval` until `cancel` fires.
    pub async fn run_sweeper(
        &self,
        retention: Duration,
        interval: Duration,
        cancel: CancellationToken,
    ) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            retention_secs = retention.as_secs(),
            interval_secs = interval.as_secs(),
            "ledger_sweeper_started"
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    let removed = self.purge_older_than(retention);
                    if removed > 0 {
                        debug!(removed = removed, remaining = self.len(), "ledger_purged");
                    }
                }
            }
        }

        info!("ledger_sweeper_stopped");
    }
}

#[async_trait]
impl DedupLedger for MemoryLedger {
    async fn record_if_new(&self, event_id: &str) -> bool {
        match self.seen.entry(event_id.to_string()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(Instant::now());
                true
            }
        }
    }
}
