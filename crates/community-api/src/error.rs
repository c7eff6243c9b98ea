use thiserror::Error;

/// Top-level error type for the `community-api` crate.
///
/// Covers every failure mode of the HTTP boundary: transport, status,
/// envelope shape, and server-side rejection of a mutating request.
/// `community-core` maps these into fetch classifications and user-facing errors.
#[derive(Debug, Error)]
pub enum Error {
    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, timeout, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// TLS setup or certificate error.
    #[error("TLS error: {0}")]
    Tls(String),

    // ── Server ──────────────────────────────────────────────────────
    /// Non-2xx HTTP status.
    #[error("Server error (HTTP {status}): {message}")]
    Server { status: u16, message: String },

    /// The server processed a mutating request and reported `success: false`.
    #[error("Request rejected by server: {message}")]
    Rejected { message: String },

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },

    /// The body was valid JSON but not the envelope the endpoint promises.
    #[error("Unexpected response shape: expected {expected}")]
    UnexpectedShape { expected: &'static str, body: String },
}

impl Error {
    /// Returns `true` if no response was received at all.
    pub fn is_network(&self) -> bool {
        match self {
            Self::Transport(e) => e.status().is_none() && !e.is_decode(),
            _ => false,
        }
    }

    /// Returns `true` if this is a transient error worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::Server { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }

    /// Returns `true` if this is a "not found" error.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::Transport(e) => e.status() == Some(reqwest::StatusCode::NOT_FOUND),
            Self::Server { status: 404, .. } => true,
            _ => false,
        }
    }

    /// HTTP status code, if the server answered.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Server { status, .. } => Some(*status),
            Self::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Returns `true` if the response body did not match the expected schema.
    pub fn is_malformed(&self) -> bool {
        match self {
            Self::Deserialization { .. } | Self::UnexpectedShape { .. } => true,
            Self::Transport(e) => e.is_decode(),
            _ => false,
        }
    }
}
