use crate::MessageType;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DhError {
    /// Group parameters the modular arithmetic cannot work with.
    #[error("invalid group parameters: {0}")]
    Domain(String),

    #[error("transport error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed frame: {0}")]
    Decode(String),

    #[error("expected {expected} frame, received {actual}")]
    Protocol {
        expected: MessageType,
        actual: MessageType,
    },

    /// An operation was attempted in a state that does not permit it, e.g.
    /// encrypting before a key has been agreed.
    #[error("invalid channel state: {0}")]
    State(String),

    #[error("decryption failed: {0}")]
    Decrypt(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl From<bincode::Error> for DhError {
    fn from(e: bincode::Error) -> Self {
        DhError::Decode(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, DhError>;
