// ── Subscription identity ──
//
// A SubscriptionKey names one poll stream: which resource, for which
// service. Every page addresses its resources by the owning service id.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

use crate::error::CoreError;

// ── ResourceKind ────────────────────────────────────────────────────

/// The remote resources a page can poll.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum ResourceKind {
    /// Single service detail (`result` envelope).
    Service,
    /// Employee roster of a service.
    Employees,
    /// Proposals raised on a service.
    Proposals,
    /// Reviews written about a service.
    Reviews,
}

// ── EntityId ────────────────────────────────────────────────────────

/// Numeric id of the viewed service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(u64);

impl EntityId {
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for EntityId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// Route parameters arrive as strings.
impl FromStr for EntityId {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<u64>()
            .map(Self)
            .map_err(|_| CoreError::ValidationFailed {
                message: format!("invalid entity id '{s}'"),
            })
    }
}

// ── SubscriptionKey ─────────────────────────────────────────────────

/// Identity of one actively-polled resource stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SubscriptionKey {
    pub kind: ResourceKind,
    pub entity: EntityId,
}

impl SubscriptionKey {
    pub const fn new(kind: ResourceKind, entity: EntityId) -> Self {
        Self { kind, entity }
    }
}

impl fmt::Display for SubscriptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind, self.entity)
    }
}
