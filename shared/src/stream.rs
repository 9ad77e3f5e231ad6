//! Message exchange over TCP using length-prefixed frames.

use std::io::{self, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};

use tracing::{debug, info, instrument};

use crate::codec::{self, HEADER_LEN};
use crate::console::{Console, Incoming};
use crate::error::ChatError;
use crate::session::Termination;
use crate::turn::{Turn, TurnTracker};

// Payload is pulled in pieces of at most this size, so a bogus length
// header cannot make us allocate gigabytes before any data shows up.
const READ_CHUNK: usize = 8 * 1024;

/// One end of an established stream session.
///
/// The channel owns the underlying stream; closing it (explicitly or by
/// dropping) releases the connection.
pub struct StreamChannel<S = TcpStream> {
    inner: Option<S>,
    peer: SocketAddr,
    turns: TurnTracker,
}

impl<S: Read + Write> StreamChannel<S> {
    /// A channel that waits for the peer to speak first.
    pub fn server(stream: S, peer: SocketAddr) -> Self {
        Self::new(stream, peer, Turn::Receive)
    }

    /// A channel that speaks first.
    pub fn client(stream: S, peer: SocketAddr) -> Self {
        Self::new(stream, peer, Turn::Send)
    }

    fn new(stream: S, peer: SocketAddr, first: Turn) -> Self {
        StreamChannel {
            inner: Some(stream),
            peer,
            turns: TurnTracker::new(first),
        }
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    pub fn is_closed(&self) -> bool {
        self.inner.is_none()
    }

    /// Reads exactly `n` bytes, or fails with [`ChatError::PeerClosed`] if
    /// the stream ends first. Never hands back a short buffer.
    pub fn read_exact(&mut self, n: usize) -> Result<Vec<u8>, ChatError> {
        let stream = self.inner.as_mut().ok_or(ChatError::Closed)?;

        let mut data = Vec::with_capacity(n.min(READ_CHUNK));
        let mut chunk = [0u8; READ_CHUNK];
        while data.len() < n {
            let want = (n - data.len()).min(READ_CHUNK);
            match stream.read(&mut chunk[..want]) {
                Ok(0) => return Err(ChatError::PeerClosed),
                Ok(got) => data.extend_from_slice(&chunk[..got]),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(ChatError::from_stream_io(e)),
            }
        }
        Ok(data)
    }

    /// Receives one framed message.
    pub fn receive_message(&mut self) -> Result<Vec<u8>, ChatError> {
        self.turns.check(Turn::Receive)?;

        let header = self.read_exact(HEADER_LEN)?;
        let mut len_bytes = [0u8; HEADER_LEN];
        len_bytes.copy_from_slice(&header);
        let len = codec::decode_header(len_bytes) as usize;
        debug!("Frame header from {} announces {} bytes", self.peer, len);

        let payload = self.read_exact(len)?;
        self.turns.complete();
        Ok(payload)
    }

    /// Receives one framed message and checks that it is text.
    pub fn receive_text(&mut self) -> Result<String, ChatError> {
        let payload = self.receive_message()?;
        String::from_utf8(payload)
            .map_err(|e| ChatError::Framing(format!("payload is not UTF-8: {}", e)))
    }

    /// Sends one framed message. The whole frame is written and flushed
    /// before this returns.
    pub fn send_message(&mut self, message: &[u8]) -> Result<(), ChatError> {
        self.turns.check(Turn::Send)?;
        let frame = codec::encode(message)?;

        let stream = self.inner.as_mut().ok_or(ChatError::Closed)?;
        stream.write_all(&frame).map_err(ChatError::from_stream_io)?;
        stream.flush().map_err(ChatError::from_stream_io)?;

        self.turns.complete();
        Ok(())
    }

    /// Releases the connection. Safe to call any number of times.
    pub fn close(&mut self) {
        if self.inner.take().is_some() {
            debug!("Closed stream to {}", self.peer);
        }
    }
}

/// Listens for the single client a stream server will talk to.
pub struct StreamServer {
    listener: TcpListener,
}

impl StreamServer {
    pub fn bind(addr: SocketAddr) -> Result<Self, ChatError> {
        let listener = TcpListener::bind(addr)?;
        Ok(StreamServer { listener })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, ChatError> {
        Ok(self.listener.local_addr()?)
    }

    /// Accepts one connection and stops listening.
    pub fn accept(self) -> Result<StreamChannel, ChatError> {
        let (stream, peer) = self.listener.accept()?;
        Ok(StreamChannel::server(stream, peer))
    }
}

pub fn connect(addr: SocketAddr) -> Result<StreamChannel, ChatError> {
    let stream = TcpStream::connect(addr)?;
    Ok(StreamChannel::client(stream, addr))
}

/// Server side of a stream session: receive, show, reply, repeat.
#[instrument(skip_all, fields(peer = %channel.peer()))]
pub fn serve<S: Read + Write, C: Console>(mut channel: StreamChannel<S>, console: &mut C) -> Termination {
    let termination = loop {
        let text = match channel.receive_text() {
            Ok(text) => text,
            Err(e) => break Termination::from_error(e),
        };
        console.incoming(&Incoming {
            from: channel.peer(),
            text,
        });

        let Some(reply) = console.outgoing() else {
            break Termination::Finished;
        };
        if let Err(e) = channel.send_message(reply.as_bytes()) {
            break Termination::from_error(e);
        }
    };

    channel.close();
    if let Termination::PeerClosed(e) = &termination {
        info!("Client disconnected: {}", e);
    }
    termination
}

/// Client side of a stream session: send, wait for the reply, show, repeat.
#[instrument(skip_all, fields(peer = %channel.peer()))]
pub fn converse<S: Read + Write, C: Console>(mut channel: StreamChannel<S>, console: &mut C) -> Termination {
    let termination = loop {
        let Some(text) = console.outgoing() else {
            break Termination::Finished;
        };
        if let Err(e) = channel.send_message(text.as_bytes()) {
            break Termination::from_error(e);
        }

        match channel.receive_text() {
            Ok(reply) => console.incoming(&Incoming {
                from: channel.peer(),
                text: reply,
            }),
            Err(e) => break Termination::from_error(e),
        }
    };

    channel.close();
    termination
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::console::ScriptedConsole;
    use std::collections::VecDeque;

    /// In-memory stream that hands out at most `max_read` bytes per read.
    struct Trickle {
        input: VecDeque<u8>,
        max_read: usize,
        output: Vec<u8>,
    }

    impl Trickle {
        fn new(input: &[u8], max_read: usize) -> Self {
            Trickle {
                input: input.iter().copied().collect(),
                max_read,
                output: Vec::new(),
            }
        }
    }

    impl Read for Trickle {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let n = buf.len().min(self.max_read).min(self.input.len());
            for slot in buf.iter_mut().take(n) {
                *slot = self.input.pop_front().unwrap();
            }
            Ok(n)
        }
    }

    impl Write for Trickle {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.output.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn peer() -> SocketAddr {
        "127.0.0.1:5555".parse().unwrap()
    }

    #[test]
    fn test_read_exact_collects_byte_by_byte() {
        let mut channel = StreamChannel::server(Trickle::new(b"abcdef", 1), peer());
        assert_eq!(channel.read_exact(4).unwrap(), b"abcd");
        assert_eq!(channel.read_exact(2).unwrap(), b"ef");
    }

    #[test]
    fn test_read_exact_fails_on_short_stream() {
        let mut channel = StreamChannel::server(Trickle::new(b"abc", 2), peer());
        assert!(matches!(channel.read_exact(4), Err(ChatError::PeerClosed)));
    }

    #[test]
    fn test_read_exact_zero_bytes_needs_no_data() {
        let mut channel = StreamChannel::server(Trickle::new(b"", 1), peer());
        assert!(channel.read_exact(0).unwrap().is_empty());
    }

    #[test]
    fn test_receive_message_across_fragments() {
        let frame = codec::encode(b"hello").unwrap();
        let mut channel = StreamChannel::server(Trickle::new(&frame, 3), peer());
        assert_eq!(channel.receive_text().unwrap(), "hello");
    }

    #[test]
    fn test_truncated_header_is_peer_closed() {
        let mut channel = StreamChannel::server(Trickle::new(&[0, 0], 8), peer());
        assert!(matches!(channel.receive_message(), Err(ChatError::PeerClosed)));
    }

    #[test]
    fn test_truncated_payload_is_peer_closed() {
        let mut channel = StreamChannel::server(Trickle::new(&[0, 0, 0, 9, b'h', b'i'], 8), peer());
        assert!(matches!(channel.receive_message(), Err(ChatError::PeerClosed)));
    }

    #[test]
    fn test_invalid_utf8_is_framing_error() {
        let frame = codec::encode(&[0xff, 0xfe]).unwrap();
        let mut channel = StreamChannel::server(Trickle::new(&frame, 8), peer());
        assert!(matches!(channel.receive_text(), Err(ChatError::Framing(_))));
    }

    #[test]
    fn test_send_writes_whole_frame() {
        let mut channel = StreamChannel::client(Trickle::new(b"", 8), peer());
        channel.send_message(b"hi").unwrap();
        assert_eq!(channel.inner.as_ref().unwrap().output, vec![0, 0, 0, 2, b'h', b'i']);
    }

    #[test]
    fn test_server_cannot_send_before_receiving() {
        let mut channel = StreamChannel::server(Trickle::new(b"", 8), peer());
        assert!(matches!(channel.send_message(b"hi"), Err(ChatError::OutOfTurn { .. })));
        assert!(channel.inner.as_ref().unwrap().output.is_empty());
    }

    #[test]
    fn test_client_cannot_send_twice() {
        let mut channel = StreamChannel::client(Trickle::new(b"", 8), peer());
        channel.send_message(b"one").unwrap();
        assert!(matches!(channel.send_message(b"two"), Err(ChatError::OutOfTurn { .. })));
    }

    #[test]
    fn test_close_is_idempotent() {
        let mut channel = StreamChannel::client(Trickle::new(b"", 8), peer());
        channel.close();
        channel.close();
        assert!(channel.is_closed());
        assert!(matches!(channel.send_message(b"x"), Err(ChatError::Closed)));
        assert!(matches!(channel.read_exact(1), Err(ChatError::Closed)));
    }

    #[test]
    fn test_serve_replies_then_sees_peer_leave() {
        let mut input = codec::encode(b"hello").unwrap();
        input.extend(codec::encode(b"again").unwrap());
        let channel = StreamChannel::server(Trickle::new(&input, 64), peer());
        let mut console = ScriptedConsole::new(["hi", "bye"]);

        let termination = serve(channel, &mut console);

        assert!(matches!(termination, Termination::PeerClosed(ChatError::PeerClosed)));
        assert_eq!(console.received_texts(), vec!["hello", "again"]);
    }

    #[test]
    fn test_converse_finishes_when_console_runs_dry() {
        let input = codec::encode(b"hi").unwrap();
        let channel = StreamChannel::client(Trickle::new(&input, 64), peer());
        let mut console = ScriptedConsole::new(["hello"]);

        let termination = converse(channel, &mut console);

        assert!(matches!(termination, Termination::Finished));
        assert_eq!(console.received_texts(), vec!["hi"]);
    }
}
