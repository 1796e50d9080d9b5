//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` variants into user-facing errors
//! with actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use sasesync_core::CoreError;

/// Exit codes per the CLI spec.
pub mod exit_code {
    pub const SUCCESS: i32 = 0;
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const CONFLICT: i32 = 6;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
    /// The push ran, but one or more items did not land.
    pub const PARTIAL: i32 = 9;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Authentication ───────────────────────────────────────────────

    #[error("Authentication failed at the destination tenant")]
    #[diagnostic(
        code(sasesync::auth_failed),
        help(
            "Verify the destination API key for the active profile.\n\
             Keys are read from api_key_env first, then api_key."
        )
    )]
    AuthFailed { message: String },

    #[error("No credentials configured for profile '{profile}'")]
    #[diagnostic(
        code(sasesync::no_credentials),
        help(
            "Add api_key or api_key_env to the profile in the config file,\n\
             or export the environment variable the profile names."
        )
    )]
    NoCredentials { profile: String },

    // ── Selection & planning ─────────────────────────────────────────

    #[error("Invalid selector '{input}'")]
    #[diagnostic(
        code(sasesync::selector),
        help("Selectors take the form kind:location:name, e.g. address:Branch-A:web-1")
    )]
    InvalidSelector { input: String },

    #[error("'{identity}' is not in the snapshot")]
    #[diagnostic(
        code(sasesync::not_in_snapshot),
        help("List snapshot contents with: sasesync plan -f <snapshot> -o plain")
    )]
    NotInSnapshot { identity: String },

    #[error("Dependency cycle in the selection")]
    #[diagnostic(
        code(sasesync::cycle),
        help(
            "Members: {members}\n\
             Skip or rename one member to break the cycle."
        )
    )]
    Cycle { members: String },

    #[error("Invalid conflict resolution: {reason}")]
    #[diagnostic(code(sasesync::resolution))]
    Resolution { reason: String },

    // ── API ──────────────────────────────────────────────────────────

    #[error("Destination API error: {message}")]
    #[diagnostic(code(sasesync::api_error))]
    ApiError {
        message: String,
        code: Option<String>,
        status: Option<u16>,
    },

    #[error("Request timed out after {seconds}s")]
    #[diagnostic(
        code(sasesync::timeout),
        help("Increase timeout with --timeout or check tenant responsiveness.")
    )]
    Timeout { seconds: u64 },

    // ── Validation ───────────────────────────────────────────────────

    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(sasesync::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────

    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(sasesync::profile_not_found),
        help("Available profiles: {available}")
    )]
    ProfileNotFound { name: String, available: String },

    #[error(transparent)]
    #[diagnostic(code(sasesync::config))]
    Config(#[from] sasesync_config::ConfigError),

    // ── Push outcome ─────────────────────────────────────────────────

    #[error("Push finished with {failed} failed and {skipped} not attempted")]
    #[diagnostic(
        code(sasesync::push_incomplete),
        help("Re-run with -v for per-item detail, or -o json for the full report.")
    )]
    PushIncomplete { failed: usize, skipped: usize },

    #[error("Push cancelled")]
    #[diagnostic(code(sasesync::cancelled))]
    Cancelled,

    // ── Interactive ──────────────────────────────────────────────────

    #[error("Destructive operation '{action}' requires confirmation")]
    #[diagnostic(
        code(sasesync::confirmation_required),
        help("Use --yes (-y) to proceed in non-interactive contexts.")
    )]
    NonInteractiveRequiresYes { action: String },

    // ── IO / Serialization ───────────────────────────────────────────

    #[error("Could not read {path}")]
    #[diagnostic(code(sasesync::snapshot_read))]
    FileRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON payload: {0}")]
    #[diagnostic(code(sasesync::json), help("Check the file contents and try again."))]
    Json(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    #[diagnostic(code(sasesync::internal))]
    Internal(String),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::AuthFailed { .. } | Self::NoCredentials { .. } => exit_code::AUTH,
            Self::NotInSnapshot { .. } => exit_code::NOT_FOUND,
            Self::Cycle { .. } | Self::Resolution { .. } => exit_code::CONFLICT,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::InvalidSelector { .. }
            | Self::Validation { .. }
            | Self::NonInteractiveRequiresYes { .. } => exit_code::USAGE,
            Self::PushIncomplete { .. } | Self::Cancelled => exit_code::PARTIAL,
            Self::ApiError { status, .. } if status.is_none() => exit_code::CONNECTION,
            Self::Config(sasesync_config::ConfigError::NoCredentials { .. }) => exit_code::AUTH,
            _ => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::CycleDetected { members } => CliError::Cycle {
                members: members
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(" -> "),
            },

            CoreError::SelectionNotInSnapshot { identity } => CliError::NotInSnapshot {
                identity: identity.to_string(),
            },

            err @ (CoreError::RenameUnknownIdentity { .. }
            | CoreError::RenameCollision { .. }
            | CoreError::SkipRequiresExisting { .. }
            | CoreError::RenameRequiresName { .. }
            | CoreError::MissingResolution { .. }
            | CoreError::NonTransferable { .. }) => CliError::Resolution {
                reason: err.to_string(),
            },

            CoreError::DuplicateItem { identity } => CliError::Validation {
                field: "snapshot".into(),
                reason: format!("duplicate item {identity}"),
            },

            CoreError::AuthenticationFailed { message } => CliError::AuthFailed { message },

            CoreError::Api {
                message,
                code,
                status,
            } => CliError::ApiError {
                message,
                code,
                status,
            },

            CoreError::Config { message } => CliError::Validation {
                field: "config".into(),
                reason: message,
            },

            CoreError::Cancelled => CliError::Cancelled,

            err @ (CoreError::AttemptConsumed | CoreError::Internal(_)) => {
                CliError::Internal(err.to_string())
            }
        }
    }
}
