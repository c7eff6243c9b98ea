// ── Subscription lifecycle ──
//
// Binds pollers and cache entries to what a consumer is looking at.
// The registry is shared by every view: two views of the same key share
// one poller, and the last one to leave stops it and evicts the entry.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use strum::{Display, EnumIter, EnumString};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::SyncConfig;
use crate::error::CoreError;
use crate::model::{EntityId, ResourceKind, SubscriptionKey};
use crate::poller::{FailureCallback, PollGate, PollHandle, Poller};
use crate::source::ResourceSource;
use crate::store::{CacheEntry, ResourceCache};
use crate::stream::EntryStream;

// ── Page presets ─────────────────────────────────────────────────────

/// The resource sets each page polls together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter)]
#[strum(serialize_all = "kebab-case", ascii_case_insensitive)]
pub enum Page {
    ServiceDetail,
    Employees,
    Proposals,
    Reviews,
}

impl Page {
    pub fn kinds(self) -> &'static [ResourceKind] {
        match self {
            Self::ServiceDetail => &[ResourceKind::Service],
            Self::Employees => &[ResourceKind::Employees],
            Self::Proposals => &[ResourceKind::Service, ResourceKind::Proposals],
            Self::Reviews => &[ResourceKind::Service, ResourceKind::Reviews],
        }
    }
}

// ── Registry ─────────────────────────────────────────────────────────

struct Registration {
    handle: PollHandle,
    subscribers: usize,
}

/// Key → (poll handle, subscriber count). At most one poller per key.
pub struct Registry<S> {
    poller: Poller<S>,
    cache: Arc<ResourceCache>,
    config: Arc<SyncConfig>,
    on_failure: FailureCallback,
    shutdown: CancellationToken,
    registrations: Mutex<HashMap<SubscriptionKey, Registration>>,
}

impl<S: ResourceSource> Registry<S> {
    pub fn new(
        poller: Poller<S>,
        cache: Arc<ResourceCache>,
        config: Arc<SyncConfig>,
        on_failure: FailureCallback,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            poller,
            cache,
            config,
            on_failure,
            shutdown,
            registrations: Mutex::new(HashMap::new()),
        }
    }

    /// Add a subscriber for `key`, starting its poller if it is the first.
    pub fn acquire(&self, key: SubscriptionKey) -> Result<usize, CoreError> {
        let mut registrations = self.lock();
        // Checked under the lock: `clear()` drains after cancelling.
        if self.shutdown.is_cancelled() {
            return Err(CoreError::ShutDown);
        }
        self.cache.acquire(key);

        if let Some(registration) = registrations.get_mut(&key) {
            registration.subscribers += 1;
            return Ok(registration.subscribers);
        }

        let interval = self.config.interval_for(key.kind);
        let handle = self
            .poller
            .start(key, interval, Arc::clone(&self.on_failure));
        registrations.insert(
            key,
            Registration {
                handle,
                subscribers: 1,
            },
        );
        Ok(1)
    }

    /// Drop a subscriber. The last one stops the poller, then evicts the
    /// cache entry. Unknown keys are ignored.
    pub fn release(&self, key: SubscriptionKey) {
        let mut registrations = self.lock();
        let Some(registration) = registrations.get_mut(&key) else {
            return;
        };
        registration.subscribers -= 1;
        if registration.subscribers == 0 {
            if let Some(registration) = registrations.remove(&key) {
                registration.handle.stop();
            }
            info!(%key, "last subscriber left");
        }
        self.cache.release(key);
    }

    pub fn subscribers(&self, key: SubscriptionKey) -> usize {
        self.lock().get(&key).map_or(0, |r| r.subscribers)
    }

    /// Keys with a running poller.
    pub fn active_keys(&self) -> Vec<SubscriptionKey> {
        let mut keys: Vec<_> = self
            .lock()
            .iter()
            .filter(|(_, r)| r.handle.is_active())
            .map(|(key, _)| *key)
            .collect();
        keys.sort();
        keys
    }

    /// Gate of the running poller for `key`.
    pub(crate) fn gate(&self, key: SubscriptionKey) -> Option<PollGate> {
        self.lock().get(&key).map(|r| r.handle.gate())
    }

    /// Stop every poller and release every entry.
    pub fn clear(&self) {
        let drained: Vec<_> = self.lock().drain().collect();
        for (key, registration) in drained {
            registration.handle.stop();
            for _ in 0..registration.subscribers {
                self.cache.release(key);
            }
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<SubscriptionKey, Registration>> {
        self.registrations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

// ── PageView ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewState {
    Idle,
    Active(EntityId),
}

/// A consumer's view over a set of resource kinds for one entity at a time.
/// Dropping the view leaves it.
pub struct PageView<S: ResourceSource> {
    registry: Arc<Registry<S>>,
    cache: Arc<ResourceCache>,
    kinds: Vec<ResourceKind>,
    state: ViewState,
}

impl<S: ResourceSource> PageView<S> {
    pub(crate) fn new(
        registry: Arc<Registry<S>>,
        cache: Arc<ResourceCache>,
        kinds: Vec<ResourceKind>,
    ) -> Self {
        let mut kinds = kinds;
        kinds.sort();
        kinds.dedup();
        Self {
            registry,
            cache,
            kinds,
            state: ViewState::Idle,
        }
    }

    /// Switch to `entity`. Viewing the current entity again is a no-op;
    /// otherwise the previous keys are released before the new ones start.
    pub fn view(&mut self, entity: EntityId) -> Result<(), CoreError> {
        if self.state == ViewState::Active(entity) {
            return Ok(());
        }
        self.leave();

        for (index, kind) in self.kinds.iter().enumerate() {
            let key = SubscriptionKey::new(*kind, entity);
            if let Err(err) = self.registry.acquire(key) {
                for kind in self.kinds.iter().take(index) {
                    self.registry.release(SubscriptionKey::new(*kind, entity));
                }
                return Err(err);
            }
        }
        self.state = ViewState::Active(entity);
        info!(%entity, kinds = self.kinds.len(), "view active");
        Ok(())
    }

    /// Stop and release every key, back to idle.
    pub fn leave(&mut self) {
        let ViewState::Active(entity) = self.state else {
            return;
        };
        for kind in &self.kinds {
            self.registry.release(SubscriptionKey::new(*kind, entity));
        }
        self.state = ViewState::Idle;
        info!(%entity, "view left");
    }

    pub fn state(&self) -> ViewState {
        self.state
    }

    pub fn entity(&self) -> Option<EntityId> {
        match self.state {
            ViewState::Active(entity) => Some(entity),
            ViewState::Idle => None,
        }
    }

    pub fn kinds(&self) -> &[ResourceKind] {
        &self.kinds
    }

    pub fn keys(&self) -> Vec<SubscriptionKey> {
        self.entity()
            .map(|entity| {
                self.kinds
                    .iter()
                    .map(|kind| SubscriptionKey::new(*kind, entity))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Current entry for `kind`, if the view is active and includes it.
    pub fn entry(&self, kind: ResourceKind) -> Option<CacheEntry> {
        let key = self.key_for(kind)?;
        self.cache.read(key)
    }

    pub fn subscribe(&self, kind: ResourceKind) -> Option<EntryStream> {
        let key = self.key_for(kind)?;
        self.cache.subscribe(key)
    }

    fn key_for(&self, kind: ResourceKind) -> Option<SubscriptionKey> {
        let entity = self.entity()?;
        self.kinds
            .contains(&kind)
            .then(|| SubscriptionKey::new(kind, entity))
    }
}

impl<S: ResourceSource> Drop for PageView<S> {
    fn drop(&mut self) {
        self.leave();
    }
}
