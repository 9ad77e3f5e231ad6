use std::fmt;

use crate::error::ChatError;

/// Which half of an exchange a party is allowed to perform next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Turn {
    Send,
    Receive,
}

impl Turn {
    fn other(self) -> Turn {
        match self {
            Turn::Send => Turn::Receive,
            Turn::Receive => Turn::Send,
        }
    }
}

impl fmt::Display for Turn {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Turn::Send => write!(f, "send"),
            Turn::Receive => write!(f, "receive"),
        }
    }
}

/// Keeps one party's sends and receives strictly alternating.
#[derive(Debug)]
pub struct TurnTracker {
    first: Turn,
    next: Turn,
}

impl TurnTracker {
    pub fn new(first: Turn) -> Self {
        TurnTracker { first, next: first }
    }

    pub fn next(&self) -> Turn {
        self.next
    }

    /// Fails without side effects if `attempted` is not the expected turn.
    pub fn check(&self, attempted: Turn) -> Result<(), ChatError> {
        if attempted == self.next {
            Ok(())
        } else {
            Err(ChatError::OutOfTurn {
                expected: self.next,
                attempted,
            })
        }
    }

    /// Hands the turn to the other half once an operation succeeded.
    pub fn complete(&mut self) {
        self.next = self.next.other();
    }

    /// Abandons a half-finished exchange.
    pub fn reset(&mut self) {
        self.next = self.first;
    }
}
