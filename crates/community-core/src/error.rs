// ── Core error types ──
//
// Fetch failures are classified into three kinds and never stop a poll
// loop. `CoreError` is what consumers see from mutations and engine
// calls; the `From<community_api::Error>` impls translate transport-layer
// errors into these domain variants.

use serde::Serialize;
use strum::Display;
use thiserror::Error;

use crate::model::{ResourceKind, SubscriptionKey};

// ── Fetch errors ─────────────────────────────────────────────────────

/// Classification of a failed fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Display)]
pub enum FetchErrorKind {
    /// No response was received.
    #[strum(serialize = "network")]
    NetworkError,
    /// The server answered with a non-2xx status.
    #[strum(serialize = "server")]
    ServerError,
    /// The body did not match the expected schema.
    #[strum(serialize = "malformed response")]
    MalformedResponse,
}

/// A single failed fetch. Cheap to clone so it can be broadcast.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("{kind} error: {message}")]
pub struct FetchError {
    pub kind: FetchErrorKind,
    pub message: String,
    /// HTTP status, when the server answered.
    pub status: Option<u16>,
}

impl FetchError {
    pub fn network(message: impl Into<String>) -> Self {
        Self {
            kind: FetchErrorKind::NetworkError,
            message: message.into(),
            status: None,
        }
    }

    pub fn server(status: u16, message: impl Into<String>) -> Self {
        Self {
            kind: FetchErrorKind::ServerError,
            message: message.into(),
            status: Some(status),
        }
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self {
            kind: FetchErrorKind::MalformedResponse,
            message: message.into(),
            status: None,
        }
    }
}

impl From<community_api::Error> for FetchError {
    fn from(err: community_api::Error) -> Self {
        let message = err.to_string();
        if err.is_malformed() {
            return Self::malformed(message);
        }
        match err.status() {
            Some(status) => Self::server(status, message),
            None => Self::network(message),
        }
    }
}

// ── Core errors ──────────────────────────────────────────────────────

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Mutation errors ──────────────────────────────────────────────
    #[error("Change to {key} was rejected: {message}")]
    MutationRejected {
        key: SubscriptionKey,
        message: String,
    },

    #[error("{mutation} does not apply to {kind} resources")]
    KindMismatch {
        mutation: &'static str,
        kind: ResourceKind,
    },

    #[error("Validation failed: {message}")]
    ValidationFailed { message: String },

    // ── Subscription errors ──────────────────────────────────────────
    #[error("No active subscription for {key}")]
    NotSubscribed { key: SubscriptionKey },

    #[error("Sync engine has been shut down")]
    ShutDown,

    // ── API errors (wrapped, not exposed raw) ────────────────────────
    #[error("Fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("API error: {message}")]
    Api {
        message: String,
        /// HTTP status code (if applicable).
        status: Option<u16>,
    },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<community_api::Error> for CoreError {
    fn from(err: community_api::Error) -> Self {
        match err {
            community_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            community_api::Error::Tls(msg) => CoreError::Config {
                message: format!("TLS error: {msg}"),
            },
            other => CoreError::Api {
                status: other.status(),
                message: other.to_string(),
            },
        }
    }
}
