use crate::net::{CodecError, MalformedFrame};

#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error("room is not connected")]
    NotConnected,
    #[error("session ids exhausted")]
    SessionIdsExhausted,
    #[error("transport error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<MalformedFrame> for RoomError {
    fn from(err: MalformedFrame) -> Self {
        RoomError::Codec(err.into())
    }
}

/// Why a connect attempt failed. Resolved at most once per client room.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConnectError {
    #[error("server error: {0}")]
    Server(String),
    #[error("rejected: {0}")]
    Rejected(String),
    #[error("connection closed before room info was received")]
    Closed,
    #[error("transport error: {0}")]
    Transport(String),
    #[error("client room dropped before the connect attempt resolved")]
    Abandoned,
}

impl ConnectError {
    /// Human-readable failure text.
    pub fn message(&self) -> String {
        match self {
            ConnectError::Server(msg) | ConnectError::Rejected(msg) => msg.clone(),
            other => other.to_string(),
        }
    }
}
