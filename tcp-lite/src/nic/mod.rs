//! Encapsulates the raw network-layer transport.
//!
//! The engine does not talk to a network card. It only needs something that can send a complete
//! IPv4 datagram, header included, and hand back every datagram the host receives. On Linux this
//! is a raw socket, see [`sys::RawIp`]. For tests and demonstrations without privileges there is
//! the in-process [`Loopback`] hub.
//!
//! [`sys::RawIp`]: sys/struct.RawIp.html
//! [`Loopback`]: struct.Loopback.html
pub mod loopback;
pub mod sys;

use crate::time::Duration;
use crate::wire::Ipv4Address;

pub use self::loopback::{Loopback, Port as LoopbackPort};
pub use self::sys::Errno;

/// The outcome of a bounded receive.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Received {
    /// A datagram of this length was written to the start of the buffer.
    Data(usize),
    /// Nothing arrived within the timeout.
    NoData,
}

/// One endpoint of the raw transport, exclusively owned by a single control block.
///
/// Each transport receives a copy of every datagram arriving at the host. It is closed when
/// dropped.
pub trait Transport {
    /// Send one complete IPv4 datagram, with its header, towards `dst`.
    fn send(&mut self, datagram: &[u8], dst: Ipv4Address) -> Result<usize, Errno>;

    /// Receive one datagram, waiting at most `timeout` or forever on `None`.
    ///
    /// A datagram longer than the buffer is truncated to the buffer. Interrupted waits are
    /// reported as `NoData`.
    fn recv(&mut self, buffer: &mut [u8], timeout: Option<Duration>) -> Result<Received, Errno>;

    /// The local address used as the source of datagrams towards `dst`.
    fn source_for(&mut self, dst: Ipv4Address) -> Result<Ipv4Address, Errno>;
}

/// A factory of transports.
pub trait Device {
    /// The transport opened by this device.
    type Transport: Transport;

    /// Open a new transport.
    ///
    /// Lack of privilege must be reported as `EPERM` or `EACCES`.
    fn open(&mut self) -> Result<Self::Transport, Errno>;
}
