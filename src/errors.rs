use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("An error occurred validating a policy definition: {0}.")]
    Validation(String),

    #[error("A policy with UID {0} already exists in the storage.")]
    PolicyExists(String),

    #[error("A policy with UID {0} was not found in the storage.")]
    PolicyNotFound(String),

    #[error("Invalid argument: {0}.")]
    BadArgument(String),

    #[error("An error occurred (de)serializing: {0}.")]
    Serialization(String),

    #[error("Migration failed: {0}.")]
    Migration(String),

    #[error("Migration step cannot be reverted: {0}.")]
    Irreversible(String),

    #[error("Storage backend error: {0}.")]
    Backend(String),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}
