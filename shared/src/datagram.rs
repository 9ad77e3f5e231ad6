//! Message exchange over UDP. Every datagram carries one raw UTF-8 message;
//! no framing is needed since the transport keeps message boundaries.
//!
//! Payloads are capped at [`MAX_DATAGRAM_LEN`] bytes. Receivers read into a
//! buffer one byte larger than the cap, so a datagram that fills it must
//! have been truncated by the kernel and is rejected as
//! [`ChatError::Oversized`] instead of being passed on cut short.
//!
//! There are no timeouts or retries: a client whose request or reply is
//! lost waits forever.

use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, UdpSocket};

use tracing::{debug, error, instrument, warn};

use crate::console::{Console, Incoming};
use crate::error::ChatError;
use crate::session::Termination;
use crate::turn::{Turn, TurnTracker};

pub const MAX_DATAGRAM_LEN: usize = 1024;

fn receive_text(socket: &UdpSocket) -> Result<Incoming, ChatError> {
    let mut buffer = [0u8; MAX_DATAGRAM_LEN + 1];
    let (len, from) = socket.recv_from(&mut buffer)?;
    if len > MAX_DATAGRAM_LEN {
        return Err(ChatError::Oversized {
            len,
            limit: MAX_DATAGRAM_LEN,
        });
    }

    let text = std::str::from_utf8(&buffer[..len])
        .map_err(|e| ChatError::Framing(format!("datagram from {} is not UTF-8: {}", from, e)))?;
    Ok(Incoming {
        from,
        text: text.to_string(),
    })
}

fn send_text(socket: &UdpSocket, to: SocketAddr, text: &str) -> Result<(), ChatError> {
    if text.len() > MAX_DATAGRAM_LEN {
        return Err(ChatError::Oversized {
            len: text.len(),
            limit: MAX_DATAGRAM_LEN,
        });
    }
    socket.send_to(text.as_bytes(), to)?;
    Ok(())
}

/// Bound socket answering whoever writes to it. Keeps no state about
/// senders between datagrams.
pub struct DatagramServer {
    socket: UdpSocket,
    turns: TurnTracker,
}

impl DatagramServer {
    pub fn bind(addr: SocketAddr) -> Result<Self, ChatError> {
        let socket = UdpSocket::bind(addr)?;
        Ok(DatagramServer {
            socket,
            turns: TurnTracker::new(Turn::Receive),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, ChatError> {
        Ok(self.socket.local_addr()?)
    }

    /// Blocks for the next datagram.
    pub fn receive(&mut self) -> Result<Incoming, ChatError> {
        self.turns.check(Turn::Receive)?;
        let message = receive_text(&self.socket)?;
        self.turns.complete();
        Ok(message)
    }

    /// Answers the sender of the datagram just received.
    pub fn reply(&mut self, to: SocketAddr, text: &str) -> Result<(), ChatError> {
        self.turns.check(Turn::Send)?;
        send_text(&self.socket, to, text)?;
        self.turns.complete();
        Ok(())
    }

    /// Runs until the console has nothing more to say. Transport errors
    /// are reported and the server goes back to waiting.
    #[instrument(skip_all)]
    pub fn serve<C: Console>(mut self, console: &mut C) -> Termination {
        loop {
            self.turns.reset();
            let message = match self.receive() {
                Ok(message) => message,
                Err(e) => {
                    error!("Error: {}", e);
                    continue;
                }
            };
            console.incoming(&message);

            loop {
                let Some(reply) = console.outgoing() else {
                    return Termination::Finished;
                };
                match self.reply(message.from, &reply) {
                    Ok(()) => break,
                    Err(e @ ChatError::Oversized { .. }) => {
                        warn!("Reply not sent: {}", e);
                    }
                    Err(e) => {
                        error!("Failed to reply to {}: {}", message.from, e);
                        break;
                    }
                }
            }
        }
    }
}

/// Socket sending to one fixed endpoint. There is no connection; the
/// OS picks an ephemeral local port.
pub struct DatagramClient {
    socket: UdpSocket,
    target: SocketAddr,
    turns: TurnTracker,
}

impl DatagramClient {
    pub fn open(target: SocketAddr) -> Result<Self, ChatError> {
        let local: SocketAddr = if target.is_ipv4() {
            (Ipv4Addr::UNSPECIFIED, 0).into()
        } else {
            (Ipv6Addr::UNSPECIFIED, 0).into()
        };
        let socket = UdpSocket::bind(local)?;
        Ok(DatagramClient {
            socket,
            target,
            turns: TurnTracker::new(Turn::Send),
        })
    }

    pub fn target(&self) -> SocketAddr {
        self.target
    }

    pub fn local_addr(&self) -> Result<SocketAddr, ChatError> {
        Ok(self.socket.local_addr()?)
    }

    pub fn send(&mut self, text: &str) -> Result<(), ChatError> {
        self.turns.check(Turn::Send)?;
        send_text(&self.socket, self.target, text)?;
        self.turns.complete();
        Ok(())
    }

    /// Blocks for exactly one reply datagram.
    pub fn receive(&mut self) -> Result<Incoming, ChatError> {
        self.turns.check(Turn::Receive)?;
        let message = receive_text(&self.socket)?;
        if message.from != self.target {
            debug!("Reply came from {} rather than {}", message.from, self.target);
        }
        self.turns.complete();
        Ok(message)
    }

    /// Send, wait, show, until the console is done or something fails.
    /// The socket is released on every way out.
    #[instrument(skip_all, fields(target = %self.target))]
    pub fn converse<C: Console>(mut self, console: &mut C) -> Termination {
        loop {
            let Some(text) = console.outgoing() else {
                return Termination::Finished;
            };
            match self.send(&text) {
                Ok(()) => {}
                Err(e @ ChatError::Oversized { .. }) => {
                    warn!("Message not sent: {}", e);
                    continue;
                }
                Err(e) => return Termination::from_error(e),
            }

            match self.receive() {
                Ok(reply) => console.incoming(&reply),
                Err(e) => return Termination::from_error(e),
            }
        }
    }
}
