// shared/src/lib.rs

//! Two-party text chat over TCP or UDP.
//!
//! TCP messages are framed with a 4-byte big-endian length prefix; UDP
//! messages are one datagram each. Either way the two sides take strict
//! turns: one sends, the other receives and answers.

pub mod codec;
pub mod console;
pub mod datagram;
pub mod driver;
pub mod endpoint;
pub mod error;
pub mod session;
pub mod stream;
pub mod turn;

pub use console::{ChannelConsole, Console, ConsoleHandle, Incoming, ScriptedConsole, StdConsole};
pub use datagram::{DatagramClient, DatagramServer, MAX_DATAGRAM_LEN};
pub use driver::{Driver, State};
pub use endpoint::{ChatConfig, Endpoint, Mode, ParseModeError, Role, Transport, DEFAULT_ADDRESS, DEFAULT_PORT};
pub use error::ChatError;
pub use session::Termination;
pub use stream::{StreamChannel, StreamServer};
pub use turn::{Turn, TurnTracker};
