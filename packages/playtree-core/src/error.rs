use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("invalid path format: {0}")]
    InvalidPathFormat(String),
    #[error("tree is empty, nothing to sync")]
    EmptyTree,
    #[error("unexpected value type: {0}")]
    UnexpectedValueType(String),
    #[error("unexpected key type: {0}")]
    UnexpectedKeyType(String),
    #[error("storage error: {0}")]
    Storage(String),
    #[error("unknown item: {0}")]
    UnknownItem(String),
    #[error("invalid operation: {0}")]
    InvalidOperation(String),
}

impl Error {
    /// HTTP-style status for the service boundary.
    pub fn status_code(&self) -> u16 {
        match self {
            Error::UnknownItem(_) => 404,
            Error::InvalidOperation(_) => 400,
            Error::InvalidPathFormat(_)
            | Error::EmptyTree
            | Error::UnexpectedValueType(_)
            | Error::UnexpectedKeyType(_)
            | Error::Storage(_) => 500,
        }
    }

    /// Message safe to hand to end users. Internal details stay in the logs.
    pub fn public_message(&self) -> &'static str {
        match self {
            Error::UnknownItem(_) => "item not found in playlist",
            Error::InvalidOperation(_) => "invalid playlist request",
            Error::EmptyTree => "failed to update playlist",
            Error::InvalidPathFormat(_)
            | Error::UnexpectedValueType(_)
            | Error::UnexpectedKeyType(_) => "failed to load playlist",
            Error::Storage(_) => "failed to update playlist in database",
        }
    }
}
