// ── Resource payloads ──
//
// Canonical domain types for what the pages display. Wire types from
// `community-api` are converted into these in `convert.rs`.

use serde::{Deserialize, Serialize};

use super::key::ResourceKind;

/// Base64 image payload embedded in JSON.
///
/// Opaque to the sync engine: decoding and display belong to the
/// rendering layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImageBlob(String);

impl ImageBlob {
    pub fn new(encoded: impl Into<String>) -> Self {
        Self(encoded.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Encoded length in bytes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceDetail {
    pub id: u64,
    pub name: String,
    pub image: Option<ImageBlob>,
    pub qualification: f64,
    pub description: Option<String>,
    pub is_following: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Employee {
    pub id: u64,
    pub name: String,
    pub age: Option<u32>,
    pub email: Option<String>,
    pub photo: Option<ImageBlob>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Proposal {
    pub id: u64,
    pub create_date: String,
    pub name: String,
    pub written_by: Option<String>,
    pub status: String,
    pub description: Option<String>,
    pub close_date: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Review {
    pub name: String,
    pub description: String,
    pub rating: f64,
    pub written_by: Option<String>,
}

// ── Payload ─────────────────────────────────────────────────────────

/// Kind-specific body of a [`Snapshot`](crate::Snapshot).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "lowercase")]
pub enum Payload {
    Service(ServiceDetail),
    Employees(Vec<Employee>),
    Proposals(Vec<Proposal>),
    Reviews(Vec<Review>),
}

impl Payload {
    pub fn kind(&self) -> ResourceKind {
        match self {
            Self::Service(_) => ResourceKind::Service,
            Self::Employees(_) => ResourceKind::Employees,
            Self::Proposals(_) => ResourceKind::Proposals,
            Self::Reviews(_) => ResourceKind::Reviews,
        }
    }

    /// Number of items for list payloads, 1 for a single resource.
    pub fn len(&self) -> usize {
        match self {
            Self::Service(_) => 1,
            Self::Employees(v) => v.len(),
            Self::Proposals(v) => v.len(),
            Self::Reviews(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_service(&self) -> Option<&ServiceDetail> {
        match self {
            Self::Service(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_employees(&self) -> Option<&[Employee]> {
        match self {
            Self::Employees(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_proposals(&self) -> Option<&[Proposal]> {
        match self {
            Self::Proposals(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_reviews(&self) -> Option<&[Review]> {
        match self {
            Self::Reviews(v) => Some(v),
            _ => None,
        }
    }
}
