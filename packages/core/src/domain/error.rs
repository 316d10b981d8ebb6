//! Domain layer error definitions.

use thiserror::Error;

use super::value_object::LocalSeq;

/// Errors related to Value Objects validation
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValueObjectError {
    /// RoomId validation error
    #[error("RoomId cannot be empty")]
    RoomIdEmpty,

    /// RoomId too long error
    #[error("RoomId cannot exceed {max} characters (got {actual})")]
    RoomIdTooLong { max: usize, actual: usize },

    /// Nickname validation error
    #[error("Nickname cannot be empty")]
    NicknameEmpty,

    /// Nickname too long error
    #[error("Nickname cannot exceed {max} characters (got {actual})")]
    NicknameTooLong { max: usize, actual: usize },

    /// MessageBody validation error
    #[error("MessageBody cannot be empty")]
    MessageBodyEmpty,

    /// MessageBody too long error
    #[error("MessageBody cannot exceed {max} characters (got {actual})")]
    MessageBodyTooLong { max: usize, actual: usize },

    /// AuthToken validation error
    #[error("AuthToken cannot be empty")]
    AuthTokenEmpty,

    /// LocalSeq zero error (local sequences start at 1)
    #[error("LocalSeq must be greater than zero")]
    LocalSeqZero,
}

/// Errors related to the outbound queue
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum QueueError {
    /// The queue holds its maximum number of entries
    #[error("Outbound queue is full: maximum {capacity} entries allowed")]
    QueueFull { capacity: usize },

    /// No entry with the given local sequence
    #[error("No outbound entry with local sequence {0}")]
    EntryNotFound(LocalSeq),

    /// Only failed entries can be retried
    #[error("Outbound entry {0} is not in the failed state")]
    NotFailed(LocalSeq),
}
