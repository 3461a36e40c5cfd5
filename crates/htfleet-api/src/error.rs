use thiserror::Error;

/// Top-level error type for the `htfleet-api` crate.
///
/// Covers every failure mode across both API surfaces: the one-shot REST
/// endpoints and the persistent WebSocket link. `htfleet-core` maps these
/// into user-facing diagnostics.
#[derive(Debug, Error)]
pub enum Error {
    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// The configured base URL uses a scheme we cannot derive a
    /// WebSocket endpoint from.
    #[error("Unsupported base URL scheme: {0}")]
    UnsupportedScheme(String),

    /// TLS setup or certificate error.
    #[error("TLS error: {0}")]
    Tls(String),

    // ── REST API ────────────────────────────────────────────────────
    /// The server reported a failure through the `error` field of a
    /// JSON response body. Surfaced verbatim.
    #[error("Server error: {message}")]
    Api { message: String },

    /// The requested device (or device sub-resource) does not exist.
    #[error("Not found")]
    NotFound,

    /// Non-success HTTP status without a parseable error body.
    #[error("Unexpected HTTP status {status}")]
    Http { status: u16, body: String },

    // ── WebSocket ───────────────────────────────────────────────────
    /// WebSocket connection failed.
    #[error("WebSocket connection failed: {0}")]
    WebSocketConnect(String),

    /// The background WebSocket task has shut down; no more commands
    /// can be sent through this handle.
    #[error("WebSocket link closed")]
    LinkClosed,

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },

    /// An inbound frame was structurally invalid (missing `id`,
    /// payload of the wrong shape, not JSON at all).
    #[error("Malformed frame: {0}")]
    MalformedFrame(String),
}

impl Error {
    /// Returns `true` if this is a transient error worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::WebSocketConnect(_) => true,
            _ => false,
        }
    }

    /// Returns `true` if this is a "not found" error.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::Transport(e) => e.status() == Some(reqwest::StatusCode::NOT_FOUND),
            Self::NotFound => true,
            _ => false,
        }
    }
}
