// ── Runtime sync configuration ──
//
// These types describe where the backend lives and how often each
// resource is polled. They carry the session token but never touch disk.
// The CLI constructs a `SyncConfig` and a `Session` and hands them in.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

use crate::model::ResourceKind;

/// Default poll period for every resource kind.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(5000);

/// TLS verification strategy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TlsVerification {
    /// System CA store (strict).
    #[default]
    SystemDefaults,
    /// Custom CA certificate file.
    CustomCa(PathBuf),
    /// Skip verification. Development backends only.
    DangerAcceptInvalid,
}

/// Configuration for one backend.
///
/// Built by the caller and passed to `SyncEngine`; core never reads config files.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// API base URL (e.g., `http://localhost:8069`). Parsed when the HTTP
    /// source is built.
    pub api_url: String,
    pub tls: TlsVerification,
    /// Request timeout.
    pub timeout: Duration,
    /// Poll period for kinds without an override. Zero means fetch once.
    pub poll_interval: Duration,
    /// Per-kind poll period overrides.
    pub intervals: HashMap<ResourceKind, Duration>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:8069".into(),
            tls: TlsVerification::default(),
            timeout: Duration::from_secs(30),
            poll_interval: DEFAULT_POLL_INTERVAL,
            intervals: HashMap::new(),
        }
    }
}

impl SyncConfig {
    pub fn interval_for(&self, kind: ResourceKind) -> Duration {
        self.intervals
            .get(&kind)
            .copied()
            .unwrap_or(self.poll_interval)
    }
}

/// The viewer's identity, passed explicitly to every request that needs it.
#[derive(Debug, Clone, Default)]
pub struct Session {
    pub token: Option<SecretString>,
    /// Shown as the author of optimistic proposals.
    pub display_name: Option<String>,
}

impl Session {
    pub fn new(token: Option<SecretString>, display_name: Option<String>) -> Self {
        Self {
            token,
            display_name,
        }
    }

    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn token(&self) -> Option<&SecretString> {
        self.token.as_ref()
    }

    pub fn display_name(&self) -> Option<&str> {
        self.display_name.as_deref()
    }
}
