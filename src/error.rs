use thiserror::Error;

/// Result type of fallible operations in this crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while configuring a [History](crate::history::History).
///
/// Navigation never fails with an error: impossible undo/redo/revert requests
/// return [None] or `false` instead.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid setting `{field}`: {reason}")]
    InvalidSettings {
        field: &'static str,
        reason: &'static str,
    },
    #[error("failed to start the compaction timer: {0}")]
    Timer(#[from] std::io::Error),
}
