// ── Poller ──
//
// One background task per subscription key. The task fetches on a fixed
// period, skips ticks while a fetch is in flight, and pushes results into
// the cache. A handle owns the task's lifetime: stopping it, or dropping
// it, guarantees nothing from that task reaches the cache afterwards.

use std::future::pending;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use tokio::time::{Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::Session;
use crate::error::FetchError;
use crate::fetcher::{Fetcher, Snapshot};
use crate::model::SubscriptionKey;
use crate::source::ResourceSource;
use crate::store::ResourceCache;

/// Called for every failed fetch of a live handle.
///
/// Runs while the handle's gate is held, so it must not stop the handle
/// it reports for.
pub type FailureCallback = Arc<dyn Fn(SubscriptionKey, &FetchError) + Send + Sync>;

/// `true` while results may be applied.
type Gate = Arc<Mutex<bool>>;

/// A handle's gate, shared with anything that applies results for its key.
#[derive(Debug, Clone)]
pub(crate) struct PollGate {
    live: Gate,
    cancel: CancellationToken,
}

impl PollGate {
    /// Run `apply` with the gate held, unless the handle has been stopped.
    pub(crate) fn run_if_live<T>(&self, apply: impl FnOnce() -> T) -> Option<T> {
        let live = self.live.lock().unwrap_or_else(PoisonError::into_inner);
        if !*live || self.cancel.is_cancelled() {
            return None;
        }
        let out = apply();
        drop(live);
        Some(out)
    }
}

type InFlight = BoxFuture<'static, Result<Snapshot, FetchError>>;

// ── PollHandle ───────────────────────────────────────────────────────

/// Owner of one running poll loop. Dropping the handle stops the loop.
#[derive(Debug)]
pub struct PollHandle {
    key: SubscriptionKey,
    gate: Gate,
    cancel: CancellationToken,
}

impl PollHandle {
    pub fn key(&self) -> SubscriptionKey {
        self.key
    }

    /// Stop polling. No fetch is issued and no result is applied once this
    /// returns. Idempotent.
    pub fn stop(&self) {
        let mut live = self.gate.lock().unwrap_or_else(PoisonError::into_inner);
        if *live {
            *live = false;
            debug!(key = %self.key, "poller stopped");
        }
        drop(live);
        self.cancel.cancel();
    }

    pub fn is_active(&self) -> bool {
        let live = *self.gate.lock().unwrap_or_else(PoisonError::into_inner);
        live && !self.cancel.is_cancelled()
    }

    pub(crate) fn gate(&self) -> PollGate {
        PollGate {
            live: Arc::clone(&self.gate),
            cancel: self.cancel.clone(),
        }
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

// ── Poller ───────────────────────────────────────────────────────────

pub struct Poller<S> {
    fetcher: Fetcher<S>,
    cache: Arc<ResourceCache>,
    session: Arc<Session>,
    shutdown: CancellationToken,
}

impl<S> Clone for Poller<S> {
    fn clone(&self) -> Self {
        Self {
            fetcher: self.fetcher.clone(),
            cache: Arc::clone(&self.cache),
            session: Arc::clone(&self.session),
            shutdown: self.shutdown.clone(),
        }
    }
}

impl<S: ResourceSource> Poller<S> {
    /// Every handle's token is a child of `shutdown`.
    pub fn new(
        fetcher: Fetcher<S>,
        cache: Arc<ResourceCache>,
        session: Arc<Session>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            fetcher,
            cache,
            session,
            shutdown,
        }
    }

    /// Spawn the poll loop for `key`. The first fetch is issued
    /// immediately; a zero `interval` fetches once and then idles.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(
        &self,
        key: SubscriptionKey,
        interval: Duration,
        on_failure: FailureCallback,
    ) -> PollHandle {
        let gate: Gate = Arc::new(Mutex::new(true));
        let cancel = self.shutdown.child_token();

        let handle = PollHandle { key, gate, cancel };

        let task = PollTask {
            key,
            fetcher: self.fetcher.clone(),
            cache: Arc::clone(&self.cache),
            session: Arc::clone(&self.session),
            gate: handle.gate(),
            on_failure,
        };
        info!(%key, interval_ms = interval.as_millis(), "poller started");
        tokio::spawn(task.run(interval));

        handle
    }
}

// ── Poll loop ────────────────────────────────────────────────────────

struct PollTask<S> {
    key: SubscriptionKey,
    fetcher: Fetcher<S>,
    cache: Arc<ResourceCache>,
    session: Arc<Session>,
    gate: PollGate,
    on_failure: FailureCallback,
}

impl<S: ResourceSource> PollTask<S> {
    async fn run(self, period: Duration) {
        let mut ticker = (!period.is_zero()).then(|| ticker(period));
        let mut in_flight: Option<InFlight> = ticker.is_none().then(|| self.issue());

        loop {
            tokio::select! {
                biased;
                () = self.gate.cancel.cancelled() => break,
                result = async {
                    match in_flight.as_mut() {
                        Some(fetch) => fetch.await,
                        None => pending().await,
                    }
                }, if in_flight.is_some() => {
                    in_flight = None;
                    self.settle(result);
                }
                _ = async {
                    match ticker.as_mut() {
                        Some(ticker) => ticker.tick().await,
                        None => pending().await,
                    }
                }, if ticker.is_some() => {
                    if in_flight.is_some() {
                        debug!(key = %self.key, "tick skipped, fetch still in flight");
                    } else {
                        in_flight = Some(self.issue());
                    }
                }
            }
        }

        // Dropping the in-flight future abandons the request.
        debug!(key = %self.key, abandoned = in_flight.is_some(), "poll loop exited");
    }

    fn issue(&self) -> InFlight {
        let fetcher = self.fetcher.clone();
        let session = Arc::clone(&self.session);
        let key = self.key;
        async move { fetcher.fetch(key, &session).await }.boxed()
    }

    /// Apply one result, unless the handle was stopped meanwhile.
    fn settle(&self, result: Result<Snapshot, FetchError>) {
        let applied = self.gate.run_if_live(|| match result {
            Ok(snapshot) => {
                self.cache.apply(self.key, snapshot);
            }
            Err(error) => {
                warn!(key = %self.key, kind = %error.kind, error = %error, "poll fetch failed");
                self.cache.record_failure(self.key, &error);
                (self.on_failure)(self.key, &error);
            }
        });
        if applied.is_none() {
            debug!(key = %self.key, "result discarded after stop");
        }
    }
}

fn ticker(period: Duration) -> Interval {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    interval
}
