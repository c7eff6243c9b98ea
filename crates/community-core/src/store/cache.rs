// ── Resource cache ──
//
// One slot per subscription key. Each slot owns a watch channel whose
// current value is the entry; every change goes through `send_if_modified`
// so subscribers wake only when something actually changed. Slots are
// reference counted by subscriber and evicted at zero.

use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::sync::{broadcast, watch};
use tracing::{debug, info};

use super::entry::CacheEntry;
use crate::engine::SyncNotice;
use crate::error::{CoreError, FetchError};
use crate::fetcher::Snapshot;
use crate::model::SubscriptionKey;
use crate::mutation::{MutationId, PendingMutation};
use crate::stream::EntryStream;

const NOTICE_CAPACITY: usize = 256;

struct Slot {
    sender: watch::Sender<CacheEntry>,
    subscribers: usize,
}

/// Result of [`ResourceCache::apply`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// The snapshot replaced the entry's data. Lists the pending
    /// mutations it confirmed.
    Accepted { confirmed: Vec<MutationId> },
    /// An equal or newer snapshot was already accepted.
    Stale,
    /// No entry for the key (never acquired, or evicted).
    Unknown,
}

impl ApplyOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted { .. })
    }
}

pub struct ResourceCache {
    slots: DashMap<SubscriptionKey, Slot>,
    notices: broadcast::Sender<SyncNotice>,
}

impl Default for ResourceCache {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceCache {
    pub fn new() -> Self {
        let (notices, _) = broadcast::channel(NOTICE_CAPACITY);
        Self {
            slots: DashMap::new(),
            notices,
        }
    }

    // ── Reference counting ───────────────────────────────────────────

    /// Register a subscriber for `key`, creating an empty entry if needed.
    /// Returns the new subscriber count.
    pub fn acquire(&self, key: SubscriptionKey) -> usize {
        let mut slot = self.slots.entry(key).or_insert_with(|| {
            debug!(%key, "cache entry created");
            Slot {
                sender: watch::channel(CacheEntry::empty(key)).0,
                subscribers: 0,
            }
        });
        slot.subscribers += 1;
        slot.subscribers
    }

    /// Drop one subscriber. Returns `true` if the entry was evicted.
    pub fn release(&self, key: SubscriptionKey) -> bool {
        match self.slots.entry(key) {
            Entry::Occupied(mut occupied) => {
                let slot = occupied.get_mut();
                slot.subscribers = slot.subscribers.saturating_sub(1);
                if slot.subscribers == 0 {
                    occupied.remove();
                    info!(%key, "cache entry evicted");
                    true
                } else {
                    false
                }
            }
            Entry::Vacant(_) => false,
        }
    }

    pub fn subscribers(&self, key: SubscriptionKey) -> usize {
        self.slots.get(&key).map_or(0, |slot| slot.subscribers)
    }

    // ── Snapshots ────────────────────────────────────────────────────

    /// Merge a snapshot. Accepted only when its sequence is newer than the
    /// entry's last accepted one; pending mutations it confirms are cleared.
    pub fn apply(&self, key: SubscriptionKey, snapshot: Snapshot) -> ApplyOutcome {
        let Some(slot) = self.slots.get(&key) else {
            debug!(%key, sequence = snapshot.sequence, "snapshot for unknown key dropped");
            return ApplyOutcome::Unknown;
        };

        let sequence = snapshot.sequence;
        let mut confirmed = Vec::new();
        let accepted = slot.sender.send_if_modified(|entry| {
            if sequence <= entry.last_sequence {
                return false;
            }
            entry.pending.retain(|pending| {
                let hit = pending.is_confirmed_by(&snapshot.payload);
                if hit {
                    confirmed.push(pending.id);
                }
                !hit
            });
            entry.health.record_success(snapshot.received_at);
            entry.last_sequence = sequence;
            entry.snapshot = Some(Arc::new(snapshot));
            entry.rebuild_view();
            true
        });
        drop(slot);

        if !accepted {
            debug!(%key, sequence, "stale snapshot dropped");
            return ApplyOutcome::Stale;
        }

        for id in &confirmed {
            debug!(%key, mutation = %id, "mutation confirmed");
            self.notify(SyncNotice::MutationConfirmed { key, id: *id });
        }
        ApplyOutcome::Accepted { confirmed }
    }

    /// Mark the latest attempt as failed. Returns `false` for unknown keys.
    pub fn record_failure(&self, key: SubscriptionKey, error: &FetchError) -> bool {
        let Some(slot) = self.slots.get(&key) else {
            return false;
        };
        slot.sender.send_modify(|entry| entry.health.record_failure(error, Utc::now()));
        true
    }

    // ── Reads ────────────────────────────────────────────────────────

    pub fn read(&self, key: SubscriptionKey) -> Option<CacheEntry> {
        self.slots.get(&key).map(|slot| slot.sender.borrow().clone())
    }

    pub fn subscribe(&self, key: SubscriptionKey) -> Option<EntryStream> {
        self.slots
            .get(&key)
            .map(|slot| EntryStream::new(slot.sender.subscribe()))
    }

    pub fn contains(&self, key: SubscriptionKey) -> bool {
        self.slots.contains_key(&key)
    }

    pub fn keys(&self) -> Vec<SubscriptionKey> {
        let mut keys: Vec<_> = self.slots.iter().map(|slot| *slot.key()).collect();
        keys.sort();
        keys
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    // ── Pending mutations ────────────────────────────────────────────

    /// Layer a mutation over the entry, superseding any pending mutation
    /// with the same target.
    pub fn push_mutation(
        &self,
        key: SubscriptionKey,
        mutation: PendingMutation,
    ) -> Result<(), CoreError> {
        let slot = self
            .slots
            .get(&key)
            .ok_or(CoreError::NotSubscribed { key })?;
        let target = mutation.target();
        slot.sender.send_modify(|entry| {
            entry.pending.retain(|pending| pending.target() != target);
            entry.pending.push(mutation);
            entry.rebuild_view();
        });
        Ok(())
    }

    /// Remove a pending mutation and restore the view without it.
    /// Returns `false` if it was already confirmed, superseded or evicted.
    pub fn retract(&self, key: SubscriptionKey, id: MutationId) -> bool {
        self.modify_pending(key, id, |entry| {
            entry.pending.retain(|pending| pending.id != id);
            entry.rebuild_view();
        })
    }

    /// Record that the server accepted the request for `id`.
    pub fn acknowledge(&self, key: SubscriptionKey, id: MutationId) -> bool {
        self.modify_pending(key, id, |entry| {
            for pending in entry.pending.iter_mut().filter(|p| p.id == id) {
                pending.acknowledged = true;
            }
        })
    }

    fn modify_pending(
        &self,
        key: SubscriptionKey,
        id: MutationId,
        change: impl FnOnce(&mut CacheEntry),
    ) -> bool {
        let Some(slot) = self.slots.get(&key) else {
            return false;
        };
        slot.sender.send_if_modified(|entry| {
            if !entry.pending.iter().any(|p| p.id == id) {
                return false;
            }
            change(entry);
            true
        })
    }

    // ── Notices ──────────────────────────────────────────────────────

    pub fn notices(&self) -> broadcast::Receiver<SyncNotice> {
        self.notices.subscribe()
    }

    pub(crate) fn notify(&self, notice: SyncNotice) {
        // No receivers is fine.
        let _ = self.notices.send(notice);
    }
}
