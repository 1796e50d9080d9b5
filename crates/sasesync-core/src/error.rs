// ── Core error types ──
//
// User-facing errors from sasesync-core. Structural errors surface
// before any network call and abort planning; per-item remote failures
// are recorded on the item and never raised through this type during a
// phase. The `From<sasesync_api::Error>` impl translates transport
// errors into domain-appropriate variants.

use thiserror::Error;

use crate::model::Identity;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Structural errors (invalid request, pre-network) ─────────────
    #[error("dependency cycle detected: {}", format_cycle(members))]
    CycleDetected { members: Vec<Identity> },

    #[error("rename targets unknown item {identity}")]
    RenameUnknownIdentity { identity: Identity },

    #[error("rename of {identity} to '{new_name}' collides with {existing}")]
    RenameCollision {
        identity: Identity,
        new_name: String,
        existing: Identity,
    },

    #[error("cannot skip {identity}: it does not exist at the destination")]
    SkipRequiresExisting { identity: Identity },

    #[error("rename of {identity} requires a new name")]
    RenameRequiresName { identity: Identity },

    #[error("no conflict resolution recorded for {identity}")]
    MissingResolution { identity: Identity },

    #[error("snapshot contains duplicate item {identity}")]
    DuplicateItem { identity: Identity },

    #[error("selection names item absent from the snapshot: {identity}")]
    SelectionNotInSnapshot { identity: Identity },

    // ── Non-transferable dependencies ────────────────────────────────
    #[error("{identity} is not transferable: {reason}")]
    NonTransferable { identity: Identity, reason: String },

    // ── Execution ────────────────────────────────────────────────────
    #[error("push attempt cancelled")]
    Cancelled,

    #[error("push attempt already consumed")]
    AttemptConsumed,

    // ── API errors (wrapped, not exposed raw) ────────────────────────
    #[error("API error: {message}")]
    Api {
        message: String,
        /// API-specific error code (e.g. "api.object.duplicate").
        code: Option<String>,
        /// HTTP status code (if applicable).
        status: Option<u16>,
    },

    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Whether this error indicates an invalid request rather than a
    /// runtime fault — surfaced before any network call.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            Self::CycleDetected { .. }
                | Self::RenameUnknownIdentity { .. }
                | Self::RenameCollision { .. }
                | Self::SkipRequiresExisting { .. }
                | Self::RenameRequiresName { .. }
                | Self::MissingResolution { .. }
                | Self::DuplicateItem { .. }
                | Self::SelectionNotInSnapshot { .. }
        )
    }

    /// Whether a push attempt should stop dispatching after this error
    /// (the same failure would hit every remaining call).
    pub fn aborts_push(&self) -> bool {
        self.is_structural()
            || matches!(
                self,
                Self::AuthenticationFailed { .. } | Self::Config { .. }
            )
    }
}

fn format_cycle(members: &[Identity]) -> String {
    members
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" -> ")
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<sasesync_api::Error> for CoreError {
    fn from(err: sasesync_api::Error) -> Self {
        match err {
            sasesync_api::Error::Authentication { message } => {
                CoreError::AuthenticationFailed { message }
            }
            sasesync_api::Error::Transport(ref e) => CoreError::Api {
                message: e.to_string(),
                code: None,
                status: e.status().map(|s| s.as_u16()),
            },
            sasesync_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            sasesync_api::Error::Timeout { timeout_secs } => CoreError::Api {
                message: format!("request timed out after {timeout_secs}s"),
                code: Some("timeout".into()),
                status: None,
            },
            sasesync_api::Error::Tls(msg) => CoreError::Config {
                message: format!("TLS error: {msg}"),
            },
            sasesync_api::Error::RateLimited { retry_after_secs } => CoreError::Api {
                message: format!("Rate limited -- retry after {retry_after_secs}s"),
                code: Some("rate_limited".into()),
                status: Some(429),
            },
            sasesync_api::Error::Api {
                message,
                code,
                status,
            } => CoreError::Api {
                message,
                code,
                status: Some(status),
            },
            sasesync_api::Error::NotFound { path } => CoreError::Api {
                message: format!("object not found: {path}"),
                code: Some("not_found".into()),
                status: Some(404),
            },
            sasesync_api::Error::Deserialization { message, body: _ } => {
                CoreError::Internal(format!("Deserialization error: {message}"))
            }
        }
    }
}
