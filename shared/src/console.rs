//! The outside world as seen by an interaction loop: somewhere to get the
//! next line to send, and somewhere to show what arrived.

use std::collections::VecDeque;
use std::io::{self, BufRead, Write};
use std::net::SocketAddr;
use std::sync::mpsc;

use chrono::Local;
use tracing::warn;

use crate::endpoint::Mode;

/// A message received from a peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Incoming {
    pub from: SocketAddr,
    pub text: String,
}

pub trait Console {
    /// Next line to send. `None` ends the session.
    fn outgoing(&mut self) -> Option<String>;

    /// Shows a message that arrived from the peer.
    fn incoming(&mut self, message: &Incoming);
}

/// Interactive console on stdin/stdout.
pub struct StdConsole {
    mode: Mode,
    lines: io::Lines<io::StdinLock<'static>>,
}

impl StdConsole {
    pub fn new(mode: Mode) -> Self {
        StdConsole {
            mode,
            lines: io::stdin().lock().lines(),
        }
    }
}

impl Console for StdConsole {
    fn outgoing(&mut self) -> Option<String> {
        print!("{} ({}): ", self.mode, self.mode.transport.label());
        let _ = io::stdout().flush();

        match self.lines.next()? {
            Ok(line) => Some(line),
            Err(e) => {
                warn!("Failed to read line: {}", e);
                None
            }
        }
    }

    fn incoming(&mut self, message: &Incoming) {
        println!(
            "[{}] {} {}: {}",
            Local::now().format("%H:%M:%S"),
            self.mode.transport.label(),
            message.from,
            message.text
        );
    }
}

/// Plays back a fixed list of lines and records what it is shown.
#[derive(Debug, Default)]
pub struct ScriptedConsole {
    script: VecDeque<String>,
    received: Vec<Incoming>,
}

impl ScriptedConsole {
    pub fn new<I, S>(script: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ScriptedConsole {
            script: script.into_iter().map(Into::into).collect(),
            received: Vec::new(),
        }
    }

    pub fn received(&self) -> &[Incoming] {
        &self.received
    }

    pub fn received_texts(&self) -> Vec<&str> {
        self.received.iter().map(|m| m.text.as_str()).collect()
    }
}

impl Console for ScriptedConsole {
    fn outgoing(&mut self) -> Option<String> {
        self.script.pop_front()
    }

    fn incoming(&mut self, message: &Incoming) {
        self.received.push(message.clone());
    }
}

/// Console fed and observed from another thread.
pub struct ChannelConsole {
    outgoing: mpsc::Receiver<String>,
    incoming: mpsc::Sender<Incoming>,
}

/// The other thread's end of a [`ChannelConsole`]. Dropping `outgoing`
/// ends the session once the queued lines are used up.
pub struct ConsoleHandle {
    pub outgoing: mpsc::Sender<String>,
    pub incoming: mpsc::Receiver<Incoming>,
}

impl ChannelConsole {
    pub fn pair() -> (ChannelConsole, ConsoleHandle) {
        let (out_tx, out_rx) = mpsc::channel();
        let (in_tx, in_rx) = mpsc::channel();
        (
            ChannelConsole {
                outgoing: out_rx,
                incoming: in_tx,
            },
            ConsoleHandle {
                outgoing: out_tx,
                incoming: in_rx,
            },
        )
    }
}

impl Console for ChannelConsole {
    fn outgoing(&mut self) -> Option<String> {
        self.outgoing.recv().ok()
    }

    fn incoming(&mut self, message: &Incoming) {
        // Nobody listening is not the session's problem.
        let _ = self.incoming.send(message.clone());
    }
}
