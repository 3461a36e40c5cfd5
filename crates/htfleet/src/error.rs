//! CLI error types with miette diagnostics.
//!
//! Maps transport and engine errors into user-facing errors with
//! actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use htfleet_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const NOT_FOUND: i32 = 4;
    pub const CONNECTION: i32 = 7;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not reach the fleet manager at {url}")]
    #[diagnostic(
        code(htfleet::connection_failed),
        help(
            "Check that the fleet manager is running and accessible.\n\
             URL: {url}"
        )
    )]
    ConnectionFailed {
        url: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Connection to the fleet manager permanently failed")]
    #[diagnostic(
        code(htfleet::link_failed),
        help("The reconnection budget is exhausted. Check the manager and run the command again.")
    )]
    LinkFailed,

    // ── Resources ────────────────────────────────────────────────────
    #[error("{resource_type} '{identifier}' not found")]
    #[diagnostic(
        code(htfleet::not_found),
        help("Run: htfleet devices list to see known devices")
    )]
    NotFound {
        resource_type: String,
        identifier: String,
    },

    // ── API ──────────────────────────────────────────────────────────
    #[error("Fleet manager error: {message}")]
    #[diagnostic(code(htfleet::api_error))]
    Api { message: String },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(htfleet::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("No fleet manager URL configured")]
    #[diagnostic(
        code(htfleet::no_server),
        help(
            "Pass --server, set HTFLEET_SERVER, or write a config file with:\n\
             htfleet config init --server http://fleet.local:8080\n\
             Expected at: {path}"
        )
    )]
    NoServer { path: String },

    #[error(transparent)]
    #[diagnostic(code(htfleet::config))]
    Config(Box<figment::Error>),

    // ── Interactive ──────────────────────────────────────────────────
    #[error("Destructive operation '{action}' requires confirmation")]
    #[diagnostic(
        code(htfleet::confirmation_required),
        help("Use --yes (-y) to skip confirmation in non-interactive contexts.")
    )]
    NonInteractiveRequiresYes { action: String },

    // ── IO / Serialization ───────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON payload: {0}")]
    #[diagnostic(code(htfleet::json))]
    Json(#[from] serde_json::Error),
}

impl From<figment::Error> for CliError {
    fn from(err: figment::Error) -> Self {
        Self::Config(Box::new(err))
    }
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } | Self::LinkFailed => exit_code::CONNECTION,
            Self::NotFound { .. } => exit_code::NOT_FOUND,
            Self::Validation { .. }
            | Self::NonInteractiveRequiresYes { .. }
            | Self::NoServer { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }

    /// Wrap a transport error, attributing it to `url` and `identifier`
    /// where that produces a better message.
    pub fn from_api(err: htfleet_api::Error, url: &url::Url, identifier: &str) -> Self {
        match err {
            htfleet_api::Error::NotFound => Self::NotFound {
                resource_type: "device".into(),
                identifier: identifier.to_owned(),
            },
            htfleet_api::Error::Api { message } => Self::Api { message },
            e if e.is_transient() => Self::ConnectionFailed {
                url: url.to_string(),
                source: e.into(),
            },
            e => Self::Api {
                message: e.to_string(),
            },
        }
    }
}

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::LinkFailed | CoreError::Shutdown => Self::LinkFailed,
            CoreError::Api(e) => Self::Api {
                message: e.to_string(),
            },
        }
    }
}
