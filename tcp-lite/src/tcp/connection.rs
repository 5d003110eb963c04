//! The connection control block and the parts of the state machine local to one block.
use std::collections::VecDeque;

use super::{Config, Result, State};
use super::engine::Cancel;
use super::io::Segment;
use crate::nic::Transport;
use crate::time::Expiration;
use crate::wire::{IpEndpoint, TcpFlags, TcpSeqNumber};

/// Size of the receive scratch buffer, large enough for any IPv4 datagram.
pub(crate) const RECV_BUFFER_LEN: usize = 1 << 16;

/// The state of one logical socket.
///
/// Listening sockets, connecting sockets and every accepted connection each have their own
/// block. The block owns its transport, which is closed when the block is dropped.
pub(crate) struct Connection<T> {
    /// The raw transport, exclusively used by this block.
    pub(crate) transport: T,

    pub(crate) state: State,

    /// The bound local endpoint.
    ///
    /// The address may stay unspecified until a connection is made.
    pub(crate) local: IpEndpoint,

    /// The peer, unset until connect or accept.
    ///
    /// A listening block latches the initiator of the last SYN here.
    pub(crate) remote: IpEndpoint,

    /// Next sequence number to send.
    pub(crate) send_next: TcpSeqNumber,

    /// Next sequence number expected from the peer.
    pub(crate) recv_next: TcpSeqNumber,

    pub(crate) listening: bool,

    /// Recorded by `listen`, never enforced.
    pub(crate) backlog: usize,

    /// Acknowledged payloads not yet returned to the caller, one entry per segment.
    ///
    /// The front entry may be the unread tail of a segment that did not fit the caller's buffer.
    pub(crate) pending: VecDeque<Vec<u8>>,

    /// Scratch space for received datagrams.
    pub(crate) buffer: Box<[u8]>,

    /// Identification of the next outgoing datagram.
    pub(crate) ident: u16,
}

impl<T> Connection<T> {
    pub(crate) fn new(transport: T, ident: u16) -> Self {
        Connection {
            transport,
            state: State::Closed,
            local: IpEndpoint::UNSPECIFIED,
            remote: IpEndpoint::UNSPECIFIED,
            send_next: TcpSeqNumber::default(),
            recv_next: TcpSeqNumber::default(),
            listening: false,
            backlog: 0,
            pending: VecDeque::new(),
            buffer: vec![0; RECV_BUFFER_LEN].into_boxed_slice(),
            ident,
        }
    }

    /// Move to another state, logging the transition.
    pub(crate) fn set_state(&mut self, state: State) {
        if self.state != state {
            net_debug!("tcp {} -> {}: {} -> {}", self.local, self.remote, self.state, state);
        }
        self.state = state;
    }

    /// Copy buffered payload into `buf`.
    ///
    /// Never mixes bytes of two segments. Returns `None` if nothing is buffered.
    pub(crate) fn read_pending(&mut self, buf: &mut [u8]) -> Option<usize> {
        let front = self.pending.front_mut()?;
        let len = front.len().min(buf.len());
        buf[..len].copy_from_slice(&front[..len]);
        if len == front.len() {
            self.pending.pop_front();
        } else {
            front.drain(..len);
        }
        Some(len)
    }

    /// Take the next identification value.
    pub(crate) fn next_ident(&mut self) -> u16 {
        let ident = self.ident;
        self.ident = self.ident.wrapping_add(1);
        ident
    }
}

impl<T: Transport> Connection<T> {
    /// Take the payload and FIN of an in-order segment and acknowledge them.
    ///
    /// Segments without payload or FIN, and segments not starting at `recv_next`, are ignored.
    /// Returns whether anything was taken.
    pub(crate) fn absorb(&mut self, segment: &Segment, config: &Config) -> Result<bool> {
        let repr = segment.repr;
        if segment.payload.is_empty() && !repr.flags.fin() {
            return Ok(false);
        }

        if repr.seq_number != self.recv_next {
            net_debug!("tcp {} -> {}: dropped segment at {}, expected {}",
                self.local, self.remote, repr.seq_number, self.recv_next);
            return Ok(false);
        }

        if !segment.payload.is_empty() {
            let payload = self.payload(segment).to_vec();
            self.recv_next += payload.len();
            self.pending.push_back(payload);
        }

        if repr.flags.fin() {
            self.recv_next += 1;
            if self.state == State::Established {
                self.set_state(State::CloseWait);
            }
        }

        self.transmit(TcpFlags::ACK, &[], config)?;
        Ok(true)
    }

    /// Perform our side of the teardown.
    ///
    /// Every wait is best effort, running out of time is not an error.
    pub(crate) fn shutdown(&mut self, config: &Config, cancel: &Cancel) -> Result<()> {
        match self.state {
            State::Established => {
                self.transmit(TcpFlags::FIN | TcpFlags::ACK, &[], config)?;
                self.send_next += 1;
                self.set_state(State::FinWait1);

                let deadline = Expiration::after(Some(config.fin_timeout));
                while self.state == State::FinWait1 {
                    let segment = match self.receive(deadline, config, cancel)? {
                        Some(segment) => segment,
                        None => {
                            net_debug!("tcp {} -> {}: FIN not acknowledged", self.local, self.remote);
                            return Ok(());
                        },
                    };

                    if !segment.repr.flags.ack() {
                        continue;
                    }

                    self.set_state(State::FinWait2);
                    if segment.repr.flags.fin() {
                        self.finish(&segment, config)?;
                    }
                }

                if self.state == State::FinWait2 {
                    let deadline = Expiration::after(Some(config.fin_timeout));
                    loop {
                        match self.receive(deadline, config, cancel)? {
                            Some(ref segment) if segment.repr.flags.fin() => {
                                self.finish(segment, config)?;
                                break;
                            },
                            Some(_) => continue,
                            None => {
                                net_debug!("tcp {} -> {}: no FIN from peer", self.local, self.remote);
                                break;
                            },
                        }
                    }
                }
            },
            State::CloseWait => {
                self.transmit(TcpFlags::FIN | TcpFlags::ACK, &[], config)?;
                self.send_next += 1;
                self.set_state(State::LastAck);

                let deadline = Expiration::after(Some(config.fin_timeout));
                loop {
                    match self.receive(deadline, config, cancel)? {
                        Some(ref segment) if segment.repr.flags.ack() => break,
                        Some(_) => continue,
                        None => {
                            net_debug!("tcp {} -> {}: FIN not acknowledged", self.local, self.remote);
                            break;
                        },
                    }
                }
            },
            _ => (),
        }

        Ok(())
    }

    /// Acknowledge the FIN of the peer after ours was acknowledged.
    fn finish(&mut self, segment: &Segment, config: &Config) -> Result<()> {
        self.recv_next = segment.repr.seq_number + segment.repr.payload_len + 1;
        self.transmit(TcpFlags::ACK, &[], config)?;
        self.set_state(State::TimeWait);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_keeps_segments_apart() {
        let mut connection = Connection::new((), 0);
        connection.pending.push_back(b"hello".to_vec());
        connection.pending.push_back(b"world".to_vec());

        let mut buf = [0; 3];
        assert_eq!(connection.read_pending(&mut buf), Some(3));
        assert_eq!(&buf, b"hel");
        // The tail of the first segment, not the start of the second.
        assert_eq!(connection.read_pending(&mut buf), Some(2));
        assert_eq!(&buf[..2], b"lo");

        let mut buf = [0; 16];
        assert_eq!(connection.read_pending(&mut buf), Some(5));
        assert_eq!(&buf[..5], b"world");
        assert_eq!(connection.read_pending(&mut buf), None);
    }

    #[test]
    fn ident_wraps() {
        let mut connection = Connection::new((), u16::max_value());
        assert_eq!(connection.next_ident(), u16::max_value());
        assert_eq!(connection.next_ident(), 0);
    }
}
