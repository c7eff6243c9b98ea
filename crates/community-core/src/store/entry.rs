// ── Cache entries ──
//
// What consumers read for one subscription key. The view is always the
// accepted snapshot with pending mutations layered on top, rebuilt by the
// cache whenever either side changes.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::error::FetchError;
use crate::fetcher::Snapshot;
use crate::model::{Payload, SubscriptionKey};
use crate::mutation::PendingMutation;

/// Outcome of recent fetch attempts for one key.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Health {
    pub last_success: Option<DateTime<Utc>>,
    pub last_failure: Option<DateTime<Utc>>,
    pub last_error: Option<FetchError>,
    /// Reset by every accepted snapshot.
    pub consecutive_failures: u32,
}

impl Health {
    /// The most recent attempt failed.
    pub fn is_stale(&self) -> bool {
        self.consecutive_failures > 0
    }

    pub(crate) fn record_success(&mut self, at: DateTime<Utc>) {
        self.last_success = Some(at);
        self.consecutive_failures = 0;
    }

    pub(crate) fn record_failure(&mut self, error: &FetchError, at: DateTime<Utc>) {
        self.last_failure = Some(at);
        self.last_error = Some(error.clone());
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub key: SubscriptionKey,
    /// Latest accepted snapshot, untouched by mutations.
    pub snapshot: Option<Arc<Snapshot>>,
    pub last_sequence: u64,
    /// In proposal order.
    pub pending: Vec<PendingMutation>,
    /// Snapshot payload overridden by `pending`. `None` until the first
    /// snapshot lands.
    pub view: Option<Arc<Payload>>,
    pub health: Health,
}

impl CacheEntry {
    pub(crate) fn empty(key: SubscriptionKey) -> Self {
        Self {
            key,
            snapshot: None,
            last_sequence: 0,
            pending: Vec::new(),
            view: None,
            health: Health::default(),
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.snapshot.is_some()
    }

    pub fn is_stale(&self) -> bool {
        self.health.is_stale()
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Time since the accepted snapshot was received.
    pub fn data_age(&self, now: DateTime<Utc>) -> Option<chrono::Duration> {
        self.snapshot.as_ref().map(|s| now - s.received_at)
    }

    pub(crate) fn rebuild_view(&mut self) {
        self.view = self.snapshot.as_ref().map(|snapshot| {
            if self.pending.is_empty() {
                return Arc::new(snapshot.payload.clone());
            }
            let mut payload = snapshot.payload.clone();
            for mutation in &self.pending {
                mutation.apply(&mut payload);
            }
            Arc::new(payload)
        });
    }
}
