//! The TCP engine.
//!
//! Offers a blocking, socket-like interface on top of raw IPv4 transports. All state lives in an
//! [`Engine`] value: a fixed-capacity table of control blocks, one per logical socket, and the
//! secret used for initial sequence numbers.
//!
//! [`Engine`]: struct.Engine.html
//!
//! ## Structure
//!
//! Each control block exclusively owns one raw transport. Since a raw transport sees every TCP
//! datagram arriving at the host, every wait filters the datagrams by the tuple of its block and
//! silently drops everything else. There is no demultiplexing between blocks: a segment read by
//! the wrong block is gone for that block. Because every block has its own transport this is only
//! a problem for segments that arrive while no call is waiting on the block they belong to.
//!
//! ## Progress
//!
//! Nothing happens in the background. Every operation performs the exchanges it needs before it
//! returns and each wait is bounded by one of the deadlines in [`Config`]:
//!
//! * `connect` sends a SYN and waits for the SYN+ACK, `accept` waits for a SYN, answers and waits
//!   for the ACK.
//! * `send` cuts the data into segments of at most one MSS and waits briefly for an ACK after
//!   each. A missing ACK is not an error, there is no retransmission.
//! * `recv` returns the payload of at most one segment per call.
//! * `close` sends a FIN and waits briefly for the teardown to complete. The control block is
//!   freed regardless of what the peer does.
//!
//! [`Config`]: struct.Config.html
//!
//! ## Deviations
//!
//! There is no RST handling, no retransmission, no reassembly and no simultaneous open. A segment
//! that does not carry exactly the next expected sequence number is dropped. The TIME-WAIT state is
//! entered but not held. A FIN carrying our acknowledgment received in FIN-WAIT-1 moves through
//! FIN-WAIT-2 directly to TIME-WAIT, so two sides closing at the same time both finish.
use core::fmt;

use crate::nic::Errno;

mod config;
mod connection;
mod engine;
mod io;
mod isn;


pub use self::config::Config;
pub use self::engine::{Cancel, Engine, SocketHandle};
pub use self::isn::IsnGenerator;

/// State enum of the statemachine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum State {
    /// No connection, the initial state of every control block.
    Closed,

    /// A listening socket.
    ///
    /// Stays in this state, every accepted connection gets a new control block.
    Listen,

    /// An open connection request.
    SynSent,

    /// Connection request we intend to answer, waiting on ack.
    SynReceived,

    /// An open connection.
    Established,

    /// Closed our side of the connection.
    FinWait1,

    /// Closing connection nicely, initiated by us and acknowledged.
    FinWait2,

    /// Closed both sides but we don't know the other knows.
    ///
    /// Never entered.
    Closing,

    /// Both sides recognized connection as closed.
    TimeWait,

    /// Other side closed its connection.
    CloseWait,

    /// Connection closed after other side closed its already.
    LastAck,
}

impl State {
    /// Check if data may be exchanged in this state.
    pub fn is_synchronized(self) -> bool {
        match self {
            State::Established | State::CloseWait => true,
            _ => false,
        }
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            State::Closed      => "CLOSED",
            State::Listen      => "LISTEN",
            State::SynSent     => "SYN-SENT",
            State::SynReceived => "SYN-RECEIVED",
            State::Established => "ESTABLISHED",
            State::FinWait1    => "FIN-WAIT-1",
            State::FinWait2    => "FIN-WAIT-2",
            State::Closing     => "CLOSING",
            State::TimeWait    => "TIME-WAIT",
            State::CloseWait   => "CLOSE-WAIT",
            State::LastAck     => "LAST-ACK",
        })
    }
}

/// The error type of all engine operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The handle does not refer to an open control block.
    ///
    /// Either it was never valid, or the block was closed. A handle kept past `close` stays
    /// invalid even after its slot is reused.
    InvalidHandle,

    /// All control blocks are in use.
    TooManyConnections,

    /// `accept` was called on a socket that is not listening.
    NotListening,

    /// Data can only be exchanged on an established connection.
    NotConnected,

    /// The handshake did not complete in time.
    HandshakeTimeout,

    /// The peer answered our SYN with something other than a matching SYN+ACK.
    HandshakeRejected,

    /// The raw transport failed.
    TransportFailure(Errno),

    /// No data arrived in time.
    ReceiveTimeout,

    /// Opening a raw transport requires privileges the process does not have.
    PermissionDenied,

    /// The call was aborted through a [`Cancel`] token.
    ///
    /// [`Cancel`]: struct.Cancel.html
    Cancelled,
}

/// The result type of engine operations.
pub type Result<T> = core::result::Result<T, Error>;

impl Error {
    pub(crate) fn from_open(err: Errno) -> Self {
        if err.is_permission() {
            Error::PermissionDenied
        } else {
            Error::TransportFailure(err)
        }
    }
}

impl From<Errno> for Error {
    fn from(err: Errno) -> Self {
        Error::TransportFailure(err)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::InvalidHandle => write!(f, "invalid socket handle"),
            Error::TooManyConnections => write!(f, "too many connections"),
            Error::NotListening => write!(f, "socket is not listening"),
            Error::NotConnected => write!(f, "socket is not connected"),
            Error::HandshakeTimeout => write!(f, "handshake timed out"),
            Error::HandshakeRejected => write!(f, "handshake rejected by peer"),
            Error::TransportFailure(errno) => write!(f, "transport failure: {}", errno),
            Error::ReceiveTimeout => write!(f, "receive timed out"),
            Error::PermissionDenied => write!(f, "raw sockets require root privileges"),
            Error::Cancelled => write!(f, "operation cancelled"),
        }
    }
}

impl std::error::Error for Error {}
