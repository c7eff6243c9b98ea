// ── Mutations ──
//
// A mutation is a local change applied to the read view before the
// server has confirmed it. Each one names its target and knows how to
// recognise a snapshot that already reflects it.

pub mod coordinator;
pub mod requests;

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::Display;

use crate::error::CoreError;
use crate::model::{Payload, Proposal, ResourceKind, Review};

pub use coordinator::{MutationCoordinator, MutationTicket};
pub use requests::{MAX_RATING, MIN_RATING, ProposalDraft, ReviewDraft};

/// Status of an optimistic proposal until the server lists it.
pub const PENDING_STATUS: &str = "pending";

/// Boolean flags a consumer can toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Flag {
    /// `ServiceDetail::is_following`.
    Following,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Draft {
    Proposal(ProposalDraft),
    Review(ReviewDraft),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mutation {
    /// Remove an item by id.
    Delete { id: u64 },
    SetFlag { flag: Flag, value: bool },
    /// Add a new item from a draft.
    Create(Draft),
}

/// What a mutation overrides. Two pending mutations with the same target
/// cannot coexist; the newer one supersedes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Target {
    Item(u64),
    Flag(Flag),
    Draft(String),
}

impl Mutation {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Delete { .. } => "delete",
            Self::SetFlag { .. } => "set_flag",
            Self::Create(Draft::Proposal(_)) => "create_proposal",
            Self::Create(Draft::Review(_)) => "create_review",
        }
    }

    /// The only resource kind this mutation can be proposed against.
    pub fn resource_kind(&self) -> ResourceKind {
        match self {
            Self::Delete { .. } => ResourceKind::Employees,
            Self::SetFlag {
                flag: Flag::Following,
                ..
            } => ResourceKind::Service,
            Self::Create(Draft::Proposal(_)) => ResourceKind::Proposals,
            Self::Create(Draft::Review(_)) => ResourceKind::Reviews,
        }
    }

    pub fn target(&self) -> Target {
        match self {
            Self::Delete { id } => Target::Item(*id),
            Self::SetFlag { flag, .. } => Target::Flag(*flag),
            Self::Create(Draft::Proposal(draft)) => Target::Draft(draft.fingerprint()),
            Self::Create(Draft::Review(draft)) => Target::Draft(draft.fingerprint()),
        }
    }

    /// Check the mutation fits `kind` and carries a complete draft.
    pub fn validate(&self, kind: ResourceKind) -> Result<(), CoreError> {
        if self.resource_kind() != kind {
            return Err(CoreError::KindMismatch {
                mutation: self.name(),
                kind,
            });
        }
        match self {
            Self::Create(Draft::Proposal(draft)) => draft.validate(),
            Self::Create(Draft::Review(draft)) => draft.validate(),
            Self::Delete { .. } | Self::SetFlag { .. } => Ok(()),
        }
    }

    /// Override `payload` with this change. Payloads of another kind are
    /// left untouched.
    pub fn apply(&self, payload: &mut Payload, proposed_at: DateTime<Utc>) {
        match (self, payload) {
            (Self::Delete { id }, Payload::Employees(list)) => list.retain(|e| e.id != *id),
            (
                Self::SetFlag {
                    flag: Flag::Following,
                    value,
                },
                Payload::Service(detail),
            ) => detail.is_following = *value,
            (Self::Create(Draft::Proposal(draft)), Payload::Proposals(list)) => {
                list.push(Proposal {
                    id: 0,
                    create_date: proposed_at.format("%Y-%m-%d").to_string(),
                    name: draft.name.clone(),
                    written_by: draft.written_by.clone(),
                    status: PENDING_STATUS.to_owned(),
                    description: Some(draft.description.clone()),
                    close_date: Some(draft.deliberation_end_date.clone()),
                });
            }
            (Self::Create(Draft::Review(draft)), Payload::Reviews(list)) => list.push(Review {
                name: draft.name.clone(),
                description: draft.description.clone(),
                rating: f64::from(draft.rating),
                written_by: draft.written_by.clone(),
            }),
            _ => {}
        }
    }

    /// Does `payload` already reflect this change?
    pub fn is_confirmed_by(&self, payload: &Payload) -> bool {
        match (self, payload) {
            (Self::Delete { id }, Payload::Employees(list)) => list.iter().all(|e| e.id != *id),
            (
                Self::SetFlag {
                    flag: Flag::Following,
                    value,
                },
                Payload::Service(detail),
            ) => detail.is_following == *value,
            (Self::Create(Draft::Proposal(draft)), Payload::Proposals(list)) => {
                list.iter().any(|p| {
                    p.name == draft.name && p.description.as_deref() == Some(draft.description.as_str())
                })
            }
            (Self::Create(Draft::Review(draft)), Payload::Reviews(list)) => {
                list.iter().any(|r| review_matches(draft, r))
            }
            _ => false,
        }
    }
}

fn review_matches(draft: &ReviewDraft, review: &Review) -> bool {
    let author_matches = match &draft.written_by {
        Some(author) => review.written_by.as_deref() == Some(author.as_str()),
        None => true,
    };
    review.name == draft.name
        && review.description == draft.description
        && (review.rating - f64::from(draft.rating)).abs() < f64::EPSILON
        && author_matches
}

// ── Pending mutations ────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MutationId(u64);

impl MutationId {
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for MutationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A mutation overriding the cache until a snapshot confirms it.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingMutation {
    pub id: MutationId,
    pub mutation: Mutation,
    pub proposed_at: DateTime<Utc>,
    /// The server accepted the request. Still pending until a snapshot
    /// shows the change.
    pub acknowledged: bool,
}

impl PendingMutation {
    pub fn new(id: MutationId, mutation: Mutation) -> Self {
        Self {
            id,
            mutation,
            proposed_at: Utc::now(),
            acknowledged: false,
        }
    }

    pub fn target(&self) -> Target {
        self.mutation.target()
    }

    pub fn apply(&self, payload: &mut Payload) {
        self.mutation.apply(payload, self.proposed_at);
    }

    pub fn is_confirmed_by(&self, payload: &Payload) -> bool {
        self.mutation.is_confirmed_by(payload)
    }
}
