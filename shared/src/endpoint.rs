use std::fmt;
use std::net::{SocketAddr, ToSocketAddrs};
use std::str::FromStr;

use thiserror::Error;

use crate::error::ChatError;

pub const DEFAULT_ADDRESS: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 12345;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Server,
    Client,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    /// Connection-oriented, ordered delivery (TCP).
    Stream,
    /// Connectionless, best-effort delivery (UDP).
    Datagram,
}

impl Transport {
    pub fn label(self) -> &'static str {
        match self {
            Transport::Stream => "TCP",
            Transport::Datagram => "UDP",
        }
    }
}

/// Role and transport picked at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mode {
    pub role: Role,
    pub transport: Transport,
}

impl Mode {
    pub const fn new(role: Role, transport: Transport) -> Self {
        Mode { role, transport }
    }
}

#[derive(Error, Debug)]
#[error("unknown mode '{0}', expected one of tcp_server, tcp_client, udp_server, udp_client")]
pub struct ParseModeError(String);

impl FromStr for Mode {
    type Err = ParseModeError;

    fn from_str(input: &str) -> Result<Mode, Self::Err> {
        match input {
            "tcp_server" => Ok(Mode::new(Role::Server, Transport::Stream)),
            "tcp_client" => Ok(Mode::new(Role::Client, Transport::Stream)),
            "udp_server" => Ok(Mode::new(Role::Server, Transport::Datagram)),
            "udp_client" => Ok(Mode::new(Role::Client, Transport::Datagram)),
            _ => Err(ParseModeError(input.to_string())),
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let transport = match self.transport {
            Transport::Stream => "tcp",
            Transport::Datagram => "udp",
        };
        let role = match self.role {
            Role::Server => "server",
            Role::Client => "client",
        };
        write!(f, "{}_{}", transport, role)
    }
}

/// Where to bind (server) or where to send (client).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    address: String,
    port: u16,
    transport: Transport,
}

impl Endpoint {
    pub fn new(address: impl Into<String>, port: u16, transport: Transport) -> Self {
        Endpoint {
            address: address.into(),
            port,
            transport,
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn transport(&self) -> Transport {
        self.transport
    }

    /// Resolves the host identifier, taking the first address it maps to.
    pub fn socket_addr(&self) -> Result<SocketAddr, ChatError> {
        (self.address.as_str(), self.port)
            .to_socket_addrs()
            .map_err(|e| ChatError::Config(format!("cannot resolve {}: {}", self, e)))?
            .next()
            .ok_or_else(|| ChatError::Config(format!("{} resolves to no address", self)))
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{}", self.address, self.port)
    }
}

/// Everything the role driver needs to start a session.
#[derive(Debug, Clone)]
pub struct ChatConfig {
    pub mode: Mode,
    pub endpoint: Endpoint,
}

impl ChatConfig {
    pub fn new(mode: Mode, address: impl Into<String>, port: u16) -> Self {
        ChatConfig {
            mode,
            endpoint: Endpoint::new(address, port, mode.transport),
        }
    }
}
