// ── Sync engine ──
//
// Facade over the whole core: one cache, one registry of pollers, one
// mutation coordinator, all sharing a session and a shutdown token.
// Consumers open page views, read entries and propose mutations here.

use std::sync::Arc;

use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::{Session, SyncConfig};
use crate::error::{CoreError, FetchError};
use crate::fetcher::Fetcher;
use crate::lifecycle::{Page, PageView, Registry};
use crate::model::{ResourceKind, SubscriptionKey};
use crate::mutation::{Mutation, MutationCoordinator, MutationId, MutationTicket};
use crate::poller::{FailureCallback, Poller};
use crate::source::{HttpSource, ResourceSource};
use crate::store::{ApplyOutcome, CacheEntry, ResourceCache};
use crate::stream::EntryStream;

/// Things consumers may want to surface (toasts, log lines).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncNotice {
    FetchFailed {
        key: SubscriptionKey,
        error: FetchError,
    },
    MutationRejected {
        key: SubscriptionKey,
        id: MutationId,
        message: String,
    },
    MutationConfirmed {
        key: SubscriptionKey,
        id: MutationId,
    },
}

/// The main entry point for consumers.
///
/// Cheaply cloneable via `Arc<EngineInner>`. Dropping the last clone
/// cancels every poller.
pub struct SyncEngine<S: ResourceSource = HttpSource> {
    inner: Arc<EngineInner<S>>,
}

impl<S: ResourceSource> Clone for SyncEngine<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct EngineInner<S: ResourceSource> {
    config: Arc<SyncConfig>,
    session: Arc<Session>,
    fetcher: Fetcher<S>,
    cache: Arc<ResourceCache>,
    registry: Arc<Registry<S>>,
    coordinator: MutationCoordinator<S>,
    shutdown: CancellationToken,
}

impl<S: ResourceSource> Drop for EngineInner<S> {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

impl SyncEngine<HttpSource> {
    /// Build an engine talking to the configured HTTP backend.
    pub fn connect(config: SyncConfig, session: Session) -> Result<Self, CoreError> {
        let source = HttpSource::new(&config)?;
        info!(api_url = %config.api_url, "sync engine connected");
        Ok(Self::new(config, session, source))
    }
}

impl<S: ResourceSource> SyncEngine<S> {
    pub fn new(config: SyncConfig, session: Session, source: S) -> Self {
        let config = Arc::new(config);
        let session = Arc::new(session);
        let source = Arc::new(source);
        let cache = Arc::new(ResourceCache::new());
        let shutdown = CancellationToken::new();

        let fetcher = Fetcher::new(Arc::clone(&source));
        let poller = Poller::new(
            fetcher.clone(),
            Arc::clone(&cache),
            Arc::clone(&session),
            shutdown.clone(),
        );
        let registry = Arc::new(Registry::new(
            poller,
            Arc::clone(&cache),
            Arc::clone(&config),
            failure_notifier(&cache),
            shutdown.clone(),
        ));
        let coordinator =
            MutationCoordinator::new(source, Arc::clone(&cache), Arc::clone(&session));

        Self {
            inner: Arc::new(EngineInner {
                config,
                session,
                fetcher,
                cache,
                registry,
                coordinator,
                shutdown,
            }),
        }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.inner.config
    }

    pub fn session(&self) -> &Session {
        &self.inner.session
    }

    pub fn cache(&self) -> &Arc<ResourceCache> {
        &self.inner.cache
    }

    // ── Views ────────────────────────────────────────────────────────

    /// Open an idle view over a page preset.
    pub fn page(&self, page: Page) -> PageView<S> {
        self.view_of(page.kinds())
    }

    /// Open an idle view over an explicit set of kinds.
    pub fn view_of(&self, kinds: &[ResourceKind]) -> PageView<S> {
        PageView::new(
            Arc::clone(&self.inner.registry),
            Arc::clone(&self.inner.cache),
            kinds.to_vec(),
        )
    }

    /// Keys that currently have a running poller.
    pub fn active_pollers(&self) -> Vec<SubscriptionKey> {
        self.inner.registry.active_keys()
    }

    // ── Reads ────────────────────────────────────────────────────────

    pub fn read(&self, key: SubscriptionKey) -> Option<CacheEntry> {
        self.inner.cache.read(key)
    }

    pub fn subscribe(&self, key: SubscriptionKey) -> Result<EntryStream, CoreError> {
        self.inner
            .cache
            .subscribe(key)
            .ok_or(CoreError::NotSubscribed { key })
    }

    pub fn notices(&self) -> broadcast::Receiver<SyncNotice> {
        self.inner.cache.notices()
    }

    // ── Writes ───────────────────────────────────────────────────────

    pub fn propose(
        &self,
        key: SubscriptionKey,
        mutation: Mutation,
    ) -> Result<MutationTicket, CoreError> {
        self.ensure_running()?;
        self.inner.coordinator.propose(key, mutation)
    }

    /// Fetch `key` once, outside its poll schedule, through the same
    /// sequence and cache path as the poller.
    ///
    /// The result is bound to the poller running when the refresh starts.
    /// If that poller is stopped meanwhile (the view left, or switched away
    /// and back), the result is discarded and `Unknown` is returned.
    pub async fn refresh_now(&self, key: SubscriptionKey) -> Result<ApplyOutcome, CoreError> {
        self.ensure_running()?;
        let gate = self
            .inner
            .registry
            .gate(key)
            .ok_or(CoreError::NotSubscribed { key })?;

        let cache = &self.inner.cache;
        match self.inner.fetcher.fetch(key, &self.inner.session).await {
            Ok(snapshot) => Ok(gate
                .run_if_live(|| cache.apply(key, snapshot))
                .unwrap_or_else(|| {
                    debug!(%key, "manual refresh discarded after stop");
                    ApplyOutcome::Unknown
                })),
            Err(error) => {
                warn!(%key, error = %error, "manual refresh failed");
                let recorded = gate
                    .run_if_live(|| cache.record_failure(key, &error))
                    .unwrap_or(false);
                if recorded {
                    cache.notify(SyncNotice::FetchFailed {
                        key,
                        error: error.clone(),
                    });
                }
                Err(CoreError::Fetch(error))
            }
        }
    }

    // ── Shutdown ─────────────────────────────────────────────────────

    /// Stop every poller and release every entry. Views opened earlier go
    /// idle on their next `leave()`; new views fail with `ShutDown`.
    pub fn shutdown(&self) {
        if self.inner.shutdown.is_cancelled() {
            return;
        }
        self.inner.shutdown.cancel();
        self.inner.registry.clear();
        info!("sync engine shut down");
    }

    pub fn is_shut_down(&self) -> bool {
        self.inner.shutdown.is_cancelled()
    }

    fn ensure_running(&self) -> Result<(), CoreError> {
        if self.is_shut_down() {
            Err(CoreError::ShutDown)
        } else {
            Ok(())
        }
    }
}

fn failure_notifier(cache: &Arc<ResourceCache>) -> FailureCallback {
    let cache = Arc::clone(cache);
    Arc::new(move |key, error: &FetchError| {
        cache.notify(SyncNotice::FetchFailed {
            key,
            error: error.clone(),
        });
    })
}
