//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with
//! actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use community_config::ConfigError;
use community_core::{CoreError, FetchErrorKind};

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const REJECTED: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const CONNECTION: i32 = 7;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not reach the API: {message}")]
    #[diagnostic(
        code(community::connection_failed),
        help(
            "Check that the backend is running and the URL is right.\n\
             Set it with --api-url or api_url in the config file."
        )
    )]
    ConnectionFailed { message: String },

    #[error("API error: {message}")]
    #[diagnostic(code(community::api_error))]
    Api {
        message: String,
        status: Option<u16>,
    },

    #[error("Nothing found at {key}")]
    #[diagnostic(code(community::not_found), help("Check the service id."))]
    NotFound { key: String },

    // ── Mutations ────────────────────────────────────────────────────
    #[error("The server rejected the change to {key}: {message}")]
    #[diagnostic(
        code(community::rejected),
        help("The local change was rolled back. Run `community show` to see current data.")
    )]
    Rejected { key: String, message: String },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(community::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error(transparent)]
    #[diagnostic(
        code(community::config),
        help("Inspect the effective settings with: community config show")
    )]
    Config(#[from] ConfigError),

    #[error("Timed out waiting for {what}")]
    #[diagnostic(
        code(community::timeout),
        help("Increase the timeout with --timeout or check the backend.")
    )]
    Timeout { what: String },

    #[error("Internal error: {0}")]
    #[diagnostic(code(community::internal))]
    Internal(String),

    // ── IO / Serialization ───────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } | Self::Timeout { .. } => exit_code::CONNECTION,
            Self::NotFound { .. } => exit_code::NOT_FOUND,
            Self::Rejected { .. } => exit_code::REJECTED,
            Self::Validation { .. } | Self::Config(_) => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::MutationRejected { key, message } => CliError::Rejected {
                key: key.to_string(),
                message,
            },

            CoreError::ValidationFailed { message } => CliError::Validation {
                field: "input".into(),
                reason: message,
            },

            err @ CoreError::KindMismatch { .. } => CliError::Validation {
                field: "mutation".into(),
                reason: err.to_string(),
            },

            CoreError::Fetch(fetch) => match (fetch.kind, fetch.status) {
                (FetchErrorKind::NetworkError, _) => CliError::ConnectionFailed {
                    message: fetch.message,
                },
                (_, Some(404)) => CliError::NotFound {
                    key: fetch.message,
                },
                (_, status) => CliError::Api {
                    message: fetch.message,
                    status,
                },
            },

            CoreError::Api { message, status } => CliError::Api { message, status },

            CoreError::Config { message } => CliError::Validation {
                field: "config".into(),
                reason: message,
            },

            err @ (CoreError::NotSubscribed { .. } | CoreError::ShutDown) => {
                CliError::Internal(err.to_string())
            }

            CoreError::Internal(message) => CliError::Internal(message),
        }
    }
}
