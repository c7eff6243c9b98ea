// community-core: resource synchronization between community-api and consumers.
//
// Fetcher → Poller → ResourceCache ← MutationCoordinator, with the
// lifecycle registry deciding which pollers run.

pub mod config;
pub mod convert;
pub mod engine;
pub mod error;
pub mod fetcher;
pub mod lifecycle;
pub mod model;
pub mod mutation;
pub mod poller;
pub mod source;
pub mod store;
pub mod stream;

// ── Primary re-exports ──────────────────────────────────────────────
pub use config::{DEFAULT_POLL_INTERVAL, Session, SyncConfig, TlsVerification};
pub use engine::{SyncEngine, SyncNotice};
pub use error::{CoreError, FetchError, FetchErrorKind};
pub use fetcher::{Fetcher, Snapshot};
pub use lifecycle::{Page, PageView, Registry, ViewState};
pub use mutation::{
    Draft, Flag, Mutation, MutationCoordinator, MutationId, MutationTicket, PendingMutation,
    ProposalDraft, ReviewDraft, Target,
};
pub use poller::{FailureCallback, PollHandle, Poller};
pub use source::{HttpSource, ResourceSource};
pub use store::{ApplyOutcome, CacheEntry, Health, ResourceCache};
pub use stream::{EntryStream, EntryWatchStream};

pub use model::{
    Employee, EntityId, ImageBlob, Payload, Proposal, ResourceKind, Review, ServiceDetail,
    SubscriptionKey,
};
