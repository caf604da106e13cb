use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("player name exceeds 64 bytes")]
    PlayerNameTooLong,

    #[error("player name is empty")]
    EmptyPlayerName,
}

pub type Result<T> = std::result::Result<T, CoreError>;

/// The directory listing could not be obtained. The whole tick is skipped.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("server list unavailable: {0}")]
    Unavailable(String),

    #[error("server list fetch timed out")]
    TimedOut,
}

/// Errors reported by the notification sink.
#[derive(Debug, Error)]
pub enum SinkError {
    /// The message no longer exists on the remote side (deleted by someone else).
    #[error("message not found")]
    NotFound,

    #[error("sink call failed: {0}")]
    Failed(String),
}

/// Why a single Upsert/Remove was not applied this tick.
#[derive(Debug, Error)]
pub enum OperationError {
    #[error(transparent)]
    Sink(#[from] SinkError),

    #[error("{0} call timed out")]
    TimedOut(&'static str),
}
