// ── Fetcher ──
//
// One request per call, tagged with a sequence number drawn from a
// counter shared by every fetch. The number is taken when the request is
// issued, so a slow old response can never outrank a newer one.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

use crate::config::Session;
use crate::error::FetchError;
use crate::model::{Payload, SubscriptionKey};
use crate::source::ResourceSource;

/// Immutable result of one successful fetch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    pub sequence: u64,
    pub payload: Payload,
    pub received_at: DateTime<Utc>,
}

impl Snapshot {
    pub fn new(sequence: u64, payload: Payload) -> Self {
        Self {
            sequence,
            payload,
            received_at: Utc::now(),
        }
    }
}

pub struct Fetcher<S> {
    source: Arc<S>,
    sequence: Arc<AtomicU64>,
}

impl<S> Clone for Fetcher<S> {
    fn clone(&self) -> Self {
        Self {
            source: Arc::clone(&self.source),
            sequence: Arc::clone(&self.sequence),
        }
    }
}

impl<S: ResourceSource> Fetcher<S> {
    pub fn new(source: Arc<S>) -> Self {
        Self {
            source,
            sequence: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn source(&self) -> &Arc<S> {
        &self.source
    }

    /// Claim the next sequence number. Starts at 1.
    pub fn next_sequence(&self) -> u64 {
        self.sequence.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub async fn fetch(&self, key: SubscriptionKey, session: &Session) -> Result<Snapshot, FetchError> {
        let sequence = self.next_sequence();
        debug!(%key, sequence, "fetch issued");

        let payload = self.source.fetch(key, session).await?;
        if payload.kind() != key.kind {
            return Err(FetchError::malformed(format!(
                "expected {} payload, got {}",
                key.kind,
                payload.kind()
            )));
        }

        debug!(%key, sequence, items = payload.len(), "fetch succeeded");
        Ok(Snapshot::new(sequence, payload))
    }
}
