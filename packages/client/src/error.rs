//! Client error definitions.

use thiserror::Error;
use tsunagi_core::{domain::ValueObjectError, usecase::ConnectError};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid argument: {0}")]
    InvalidArgument(#[from] ValueObjectError),

    #[error(transparent)]
    Connect(#[from] ConnectError),

    #[error("terminal error: {0}")]
    Readline(#[from] rustyline::error::ReadlineError),
}
