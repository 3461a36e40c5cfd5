use thiserror::Error;

/// Errors surfaced by the synchronization engine.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Error from the transport layer (REST or WebSocket).
    #[error(transparent)]
    Api(#[from] htfleet_api::Error),

    /// The WebSocket link gave up after exhausting its retry budget.
    /// The manager must be rebuilt to reconnect.
    #[error("connection permanently failed after exhausting retries")]
    LinkFailed,

    /// The manager has been shut down.
    #[error("manager is shut down")]
    Shutdown,
}
