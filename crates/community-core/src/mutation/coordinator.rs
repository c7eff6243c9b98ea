// ── Mutation coordinator ──
//
// Applies a mutation to the read view at once, then sends the request on
// its own task so it completes even if the caller stops waiting. The
// server reply only acknowledges or retracts; confirmation comes from a
// later snapshot matching the mutation.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::oneshot;
use tracing::{debug, warn};

use super::{Draft, Mutation, MutationId, PendingMutation};
use crate::config::Session;
use crate::engine::SyncNotice;
use crate::error::CoreError;
use crate::model::SubscriptionKey;
use crate::source::ResourceSource;
use crate::store::ResourceCache;

/// Handle on one proposed mutation.
#[derive(Debug)]
pub struct MutationTicket {
    id: MutationId,
    key: SubscriptionKey,
    outcome: oneshot::Receiver<Result<MutationId, CoreError>>,
}

impl MutationTicket {
    pub fn id(&self) -> MutationId {
        self.id
    }

    pub fn key(&self) -> SubscriptionKey {
        self.key
    }

    /// Wait for the server's answer. `Ok` means the request was accepted;
    /// the override stays until a snapshot confirms it.
    pub async fn outcome(self) -> Result<MutationId, CoreError> {
        self.outcome
            .await
            .map_err(|_| CoreError::Internal(format!("mutation {} was abandoned", self.id)))?
    }
}

pub struct MutationCoordinator<S> {
    source: Arc<S>,
    cache: Arc<ResourceCache>,
    session: Arc<Session>,
    next_id: AtomicU64,
}

impl<S: ResourceSource> MutationCoordinator<S> {
    pub fn new(source: Arc<S>, cache: Arc<ResourceCache>, session: Arc<Session>) -> Self {
        Self {
            source,
            cache,
            session,
            next_id: AtomicU64::new(1),
        }
    }

    /// Validate, apply locally and send. Must be called from within a
    /// tokio runtime.
    pub fn propose(
        &self,
        key: SubscriptionKey,
        mutation: Mutation,
    ) -> Result<MutationTicket, CoreError> {
        mutation.validate(key.kind)?;
        let mutation = self.with_author(mutation);

        let id = MutationId::new(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.cache
            .push_mutation(key, PendingMutation::new(id, mutation.clone()))?;
        debug!(%key, mutation = mutation.name(), %id, "mutation applied locally");

        let (tx, rx) = oneshot::channel();
        let source = Arc::clone(&self.source);
        let cache = Arc::clone(&self.cache);
        let session = Arc::clone(&self.session);

        tokio::spawn(async move {
            let outcome = match source.mutate(key, &mutation, &session).await {
                Ok(()) => {
                    cache.acknowledge(key, id);
                    debug!(%key, %id, "mutation acknowledged");
                    Ok(id)
                }
                Err(err) => {
                    let message = err.to_string();
                    warn!(%key, %id, error = %message, "mutation rejected");
                    cache.retract(key, id);
                    cache.notify(SyncNotice::MutationRejected {
                        key,
                        id,
                        message: message.clone(),
                    });
                    Err(CoreError::MutationRejected { key, message })
                }
            };
            // The caller may have stopped waiting.
            let _ = tx.send(outcome);
        });

        Ok(MutationTicket {
            id,
            key,
            outcome: rx,
        })
    }

    /// Drafts without an author show the session's display name.
    fn with_author(&self, mutation: Mutation) -> Mutation {
        let Some(name) = self.session.display_name() else {
            return mutation;
        };
        match mutation {
            Mutation::Create(Draft::Proposal(mut draft)) => {
                draft.written_by.get_or_insert_with(|| name.to_owned());
                Mutation::Create(Draft::Proposal(draft))
            }
            Mutation::Create(Draft::Review(mut draft)) => {
                draft.written_by.get_or_insert_with(|| name.to_owned());
                Mutation::Create(Draft::Review(draft))
            }
            other => other,
        }
    }
}
