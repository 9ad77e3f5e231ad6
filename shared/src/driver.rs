//! Picks role and transport from the configuration and runs one session.

use std::net::SocketAddr;

use tracing::{error, info, warn};

use crate::console::Console;
use crate::datagram::{DatagramClient, DatagramServer};
use crate::endpoint::{ChatConfig, Role, Transport};
use crate::error::ChatError;
use crate::session::Termination;
use crate::stream::{self, StreamServer};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Idle,
    Listening,
    Connecting,
    Active,
    Terminated,
}

type ReadyHook = Box<dyn FnMut(SocketAddr) + Send>;

/// Drives a single session from startup to termination. A terminated
/// driver cannot be restarted; serving another client takes a new one.
pub struct Driver {
    config: ChatConfig,
    state: State,
    on_ready: Option<ReadyHook>,
}

impl Driver {
    pub fn new(config: ChatConfig) -> Self {
        Driver {
            config,
            state: State::Idle,
            on_ready: None,
        }
    }

    /// Called with the local address once a server is bound, before it
    /// blocks waiting for a peer.
    pub fn on_ready(mut self, hook: impl FnMut(SocketAddr) + Send + 'static) -> Self {
        self.on_ready = Some(Box::new(hook));
        self
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn config(&self) -> &ChatConfig {
        &self.config
    }

    /// Runs the session to completion.
    ///
    /// Setup failures (resolving, binding, connecting, accepting) come back
    /// as `Err`. Once the session is up, every way it can end is reported as
    /// a [`Termination`].
    pub fn run<C: Console>(&mut self, console: &mut C) -> Result<Termination, ChatError> {
        if self.state != State::Idle {
            return Err(ChatError::AlreadyTerminated);
        }

        let result = self.start(console);
        self.state = State::Terminated;

        match &result {
            Ok(Termination::PeerClosed(e)) => info!("Peer disconnected: {}", e),
            Ok(Termination::Finished) => info!("Session finished"),
            Ok(Termination::Failed(e)) => error!("Session failed: {}", e),
            Err(e) => warn!("Session could not start: {}", e),
        }
        result
    }

    fn start<C: Console>(&mut self, console: &mut C) -> Result<Termination, ChatError> {
        let addr = self.config.endpoint.socket_addr()?;
        let mode = self.config.mode;

        match (mode.role, mode.transport) {
            (Role::Server, Transport::Stream) => {
                self.state = State::Listening;
                let server = StreamServer::bind(addr)?;
                let local = server.local_addr()?;
                info!("TCP server running on {}", local);
                self.ready(local);

                let channel = server.accept()?;
                info!("Client connected from {}", channel.peer());
                self.state = State::Active;
                Ok(stream::serve(channel, console))
            }
            (Role::Client, Transport::Stream) => {
                self.state = State::Connecting;
                let channel = stream::connect(addr)?;
                info!("Connected to TCP server at {}", addr);
                self.state = State::Active;
                Ok(stream::converse(channel, console))
            }
            (Role::Server, Transport::Datagram) => {
                self.state = State::Listening;
                let server = DatagramServer::bind(addr)?;
                let local = server.local_addr()?;
                info!("UDP server running on {}", local);
                self.ready(local);

                self.state = State::Active;
                Ok(server.serve(console))
            }
            (Role::Client, Transport::Datagram) => {
                self.state = State::Connecting;
                let client = DatagramClient::open(addr)?;
                info!("Sending UDP datagrams to {}", client.target());
                self.state = State::Active;
                Ok(client.converse(console))
            }
        }
    }

    fn ready(&mut self, local: SocketAddr) {
        if let Some(hook) = self.on_ready.as_mut() {
            hook(local);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::console::ScriptedConsole;
    use crate::endpoint::{Mode, Role, Transport};
    use std::net::TcpListener;

    #[test]
    fn test_new_driver_is_idle() {
        let driver = Driver::new(ChatConfig::new(
            Mode::new(Role::Client, Transport::Stream),
            "127.0.0.1",
            1,
        ));
        assert_eq!(driver.state(), State::Idle);
    }

    #[test]
    fn test_refused_connect_is_setup_error() {
        // Grab a free port and release it so nothing is listening there.
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let mut driver = Driver::new(ChatConfig::new(
            Mode::new(Role::Client, Transport::Stream),
            "127.0.0.1",
            port,
        ));

        let result = driver.run(&mut ScriptedConsole::new(["hello"]));

        assert!(matches!(result, Err(ChatError::Transport(_))));
        assert_eq!(driver.state(), State::Terminated);
    }

    #[test]
    fn test_terminated_driver_does_not_restart() {
        let mut driver = Driver::new(ChatConfig::new(
            Mode::new(Role::Client, Transport::Datagram),
            "127.0.0.1",
            9,
        ));
        let first = driver.run(&mut ScriptedConsole::new(Vec::<String>::new())).unwrap();
        assert!(matches!(first, Termination::Finished));

        let second = driver.run(&mut ScriptedConsole::new(Vec::<String>::new()));
        assert!(matches!(second, Err(ChatError::AlreadyTerminated)));
    }

    #[test]
    fn test_unresolvable_address_fails_before_listening() {
        let mut driver = Driver::new(ChatConfig::new(
            Mode::new(Role::Server, Transport::Stream),
            "no such host",
            0,
        ));
        let result = driver.run(&mut ScriptedConsole::new(Vec::<String>::new()));
        assert!(matches!(result, Err(ChatError::Config(_))));
        assert_eq!(driver.state(), State::Terminated);
    }
}
