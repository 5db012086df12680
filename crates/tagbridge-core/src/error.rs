use thiserror::Error;

/// Errors raised while building shared domain values.
#[derive(Error, Debug)]
pub enum Error {
    // Tag errors
    #[error("Invalid tag identifier: {0}")]
    InvalidIdentifier(String),

    #[error("Unknown tag kind: {0}")]
    UnknownTagKind(String),
}

pub type Result<T> = std::result::Result<T, Error>;
