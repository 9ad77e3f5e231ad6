use crate::error::ChatError;

/// Why an interaction loop stopped.
#[derive(Debug)]
pub enum Termination {
    /// The peer went away or sent something that could not be decoded.
    PeerClosed(ChatError),
    /// The console had nothing more to send.
    Finished,
    /// The transport failed in a way the loop could not recover from.
    Failed(ChatError),
}

impl Termination {
    pub fn from_error(e: ChatError) -> Termination {
        if e.is_disconnect() {
            Termination::PeerClosed(e)
        } else {
            Termination::Failed(e)
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Termination::Failed(_))
    }
}
