use std::io;

use thiserror::Error;

use crate::turn::Turn;

/// Everything that can go wrong between two chat peers.
#[derive(Error, Debug)]
pub enum ChatError {
    #[error("peer closed the connection")]
    PeerClosed,

    #[error("malformed frame: {0}")]
    Framing(String),

    #[error("message exceeds the {limit} byte limit ({len} bytes seen)")]
    Oversized { len: usize, limit: usize },

    #[error("transport error: {0}")]
    Transport(#[from] io::Error),

    #[error("cannot {attempted} while waiting to {expected}")]
    OutOfTurn { expected: Turn, attempted: Turn },

    #[error("channel already closed")]
    Closed,

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("session already terminated")]
    AlreadyTerminated,
}

impl ChatError {
    /// Errors that mean the other side is gone (or talking nonsense) and the
    /// session should end quietly.
    pub fn is_disconnect(&self) -> bool {
        matches!(self, ChatError::PeerClosed | ChatError::Framing(_))
    }

    // Stream sockets report a vanished peer through several error kinds.
    pub(crate) fn from_stream_io(e: io::Error) -> ChatError {
        match e.kind() {
            io::ErrorKind::UnexpectedEof
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe => ChatError::PeerClosed,
            _ => ChatError::Transport(e),
        }
    }
}
