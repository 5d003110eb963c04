use core::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use super::{Config, Error, IsnGenerator, Result, State};
use super::connection::Connection;
use crate::managed::{Key, SlotMap};
use crate::nic::{Device, Transport};
use crate::time::{Expiration, Instant};
use crate::wire::{IpEndpoint, TcpFlags, TcpSeqNumber};

/// The first port handed out to connections that were not bound to one.
const EPHEMERAL_START: u16 = 49152;

/// The number of ephemeral ports.
const EPHEMERAL_COUNT: u16 = 16384;

/// A TCP engine owning a table of control blocks.
///
/// Every operation takes the engine by exclusive reference and blocks until it is done or one of
/// the timeouts of its [`Config`] expired. Use a separate engine per thread to drive several
/// connections concurrently.
///
/// [`Config`]: struct.Config.html
pub struct Engine<D: Device> {
    device: D,
    connections: SlotMap<Connection<D::Transport>>,
    config: Config,
    isn: IsnGenerator,
    cancel: Cancel,
    /// Input to derive datagram identifications and ephemeral ports.
    nonce: u64,
}

/// Refers to an open control block of an [`Engine`].
///
/// Handles are generational. Once the block was closed the handle stays invalid, even when a new
/// block occupies the same slot.
///
/// [`Engine`]: struct.Engine.html
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SocketHandle(Key);

/// Aborts a blocked call of an engine from another thread.
///
/// The blocked call notices the request within one `poll_interval` and fails with
/// `Error::Cancelled`. A request made while no call is blocked aborts the next wait.
#[derive(Clone, Debug, Default)]
pub struct Cancel(Arc<AtomicBool>);

impl Cancel {
    /// Request cancellation of the current or next wait.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Consume a pending request.
    pub(crate) fn check(&self) -> Result<()> {
        if self.0.swap(false, Ordering::SeqCst) {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }
}

impl SocketHandle {
    /// The slot of the control block.
    pub fn index(self) -> usize {
        self.0.index()
    }
}

impl fmt::Display for SocketHandle {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "#{}", self.index())
    }
}

impl<D: Device> Engine<D> {
    /// Create an engine with the default configuration.
    pub fn new(device: D) -> Self {
        Engine::with_config(device, Config::default())
    }

    /// Create an engine with a custom configuration.
    ///
    /// The secret for initial sequence numbers is drawn from the standard library's random
    /// hasher state.
    pub fn with_config(device: D, config: Config) -> Self {
        Engine::with_isn_generator(device, config, IsnGenerator::from_std_hash())
    }

    /// Create an engine with a custom configuration and sequence number secret.
    pub fn with_isn_generator(device: D, config: Config, isn: IsnGenerator) -> Self {
        Engine {
            device,
            connections: SlotMap::with_capacity(config.max_connections),
            config,
            isn,
            cancel: Cancel::default(),
            nonce: 0,
        }
    }

    /// The configuration of this engine.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// A token to abort blocking calls of this engine from another thread.
    pub fn canceller(&self) -> Cancel {
        self.cancel.clone()
    }

    /// The number of open control blocks.
    pub fn open_sockets(&self) -> usize {
        self.connections.len()
    }

    /// Open a new control block in the closed state.
    ///
    /// Fails with `TooManyConnections` when the table is full, before a transport is opened.
    pub fn socket(&mut self) -> Result<SocketHandle> {
        if self.connections.len() >= self.connections.capacity() {
            return Err(Error::TooManyConnections);
        }

        let transport = self.device.open().map_err(Error::from_open)?;
        let ident = self.next_nonce() as u16;
        let key = self.connections
            .insert(Connection::new(transport, ident))
            .ok_or(Error::TooManyConnections)?;

        net_debug!("tcp: opened socket #{}", key.index());
        Ok(SocketHandle(key))
    }

    /// Set the local endpoint.
    ///
    /// There is no check whether another block uses the same endpoint. An unspecified address is
    /// resolved when connecting, a zero port is replaced by an ephemeral one.
    pub fn bind(&mut self, handle: SocketHandle, local: IpEndpoint) -> Result<()> {
        let connection = self.connections.get_mut(handle.0)
            .ok_or(Error::InvalidHandle)?;
        connection.local = local;
        Ok(())
    }

    /// Mark the block as listening.
    ///
    /// The backlog is recorded but not enforced, connections are only ever accepted one at a time.
    pub fn listen(&mut self, handle: SocketHandle, backlog: usize) -> Result<()> {
        let connection = self.connections.get_mut(handle.0)
            .ok_or(Error::InvalidHandle)?;
        connection.listening = true;
        connection.backlog = backlog;
        connection.set_state(State::Listen);
        Ok(())
    }

    /// Wait for a connection request and complete the handshake.
    ///
    /// Returns a handle to a new, established block and the endpoint of the peer. The listening
    /// block stays in `Listen`. When the handshake does not complete, the new block is discarded
    /// and `HandshakeTimeout` is returned.
    pub fn accept(&mut self, handle: SocketHandle) -> Result<(SocketHandle, IpEndpoint)> {
        let (local, syn) = {
            let config = &self.config;
            let cancel = &self.cancel;
            let listener = self.connections.get_mut(handle.0)
                .ok_or(Error::InvalidHandle)?;
            if !listener.listening {
                return Err(Error::NotListening);
            }

            let deadline = Expiration::after(config.accept_timeout);
            let syn = loop {
                match listener.receive(deadline, config, cancel)? {
                    Some(segment) => if segment.repr.flags.syn() && !segment.repr.flags.ack() {
                        break segment;
                    },
                    None => return Err(Error::HandshakeTimeout),
                }
            };

            (listener.local, syn)
        };

        let peer = syn.sender();
        net_debug!("tcp {}: SYN from {}", local, peer);

        // Answer from the address the peer used.
        let local = if local.addr.is_unspecified() {
            IpEndpoint::new(syn.dst_addr, local.port)
        } else {
            local
        };

        let new = self.socket()?;
        let result = self.handshake(new, local, peer, syn.repr.seq_number + 1);
        if let Err(err) = result {
            net_debug!("tcp {} -> {}: accept failed: {}", local, peer, err);
            self.connections.remove(new.0);
            return Err(err);
        }

        Ok((new, peer))
    }

    /// Answer a SYN on a fresh block and wait for the final ACK.
    fn handshake(
        &mut self,
        handle: SocketHandle,
        local: IpEndpoint,
        peer: IpEndpoint,
        recv_next: TcpSeqNumber,
    ) -> Result<()> {
        let isn = self.isn.get_isn(local, peer, Instant::now());
        let config = &self.config;
        let cancel = &self.cancel;
        let connection = self.connections.get_mut(handle.0)
            .ok_or(Error::InvalidHandle)?;

        connection.local = local;
        connection.remote = peer;
        connection.recv_next = recv_next;
        connection.send_next = isn;
        connection.set_state(State::SynReceived);

        connection.transmit(TcpFlags::SYN | TcpFlags::ACK, &[], config)?;
        connection.send_next += 1;

        let deadline = Expiration::after(Some(config.handshake_timeout));
        let ack = loop {
            let segment = match connection.receive(deadline, config, cancel)? {
                Some(segment) => segment,
                None => return Err(Error::HandshakeTimeout),
            };

            if segment.repr.flags.ack() && segment.repr.ack_number == connection.send_next {
                break segment;
            }
        };

        connection.set_state(State::Established);
        // The final ACK may already carry data or a FIN.
        connection.absorb(&ack, config)?;
        Ok(())
    }

    /// Open a connection to `remote`.
    ///
    /// Sends a SYN and waits for a SYN+ACK acknowledging it. On success the block is established.
    /// Otherwise it returns to `Closed` and may be used again.
    pub fn connect(&mut self, handle: SocketHandle, remote: IpEndpoint) -> Result<()> {
        let bound = self.connections.get(handle.0)
            .ok_or(Error::InvalidHandle)?
            .local;
        let port = match bound.port {
            0 => self.ephemeral_port()?,
            port => port,
        };

        let config = &self.config;
        let cancel = &self.cancel;
        let connection = self.connections.get_mut(handle.0)
            .ok_or(Error::InvalidHandle)?;

        let addr = if bound.addr.is_unspecified() {
            connection.transport.source_for(remote.addr)?
        } else {
            bound.addr
        };

        connection.local = IpEndpoint::new(addr, port);
        connection.remote = remote;
        connection.recv_next = Default::default();
        connection.send_next = self.isn.get_isn(connection.local, remote, Instant::now());

        net_debug!("tcp {} -> {}: connecting", connection.local, remote);
        if let Err(err) = connection.transmit(TcpFlags::SYN, &[], config) {
            connection.set_state(State::Closed);
            return Err(err);
        }
        connection.send_next += 1;
        connection.set_state(State::SynSent);

        let deadline = Expiration::after(Some(config.handshake_timeout));
        let reply = match connection.receive(deadline, config, cancel) {
            Ok(reply) => reply,
            Err(err) => {
                connection.set_state(State::Closed);
                return Err(err);
            },
        };

        let segment = match reply {
            Some(segment) => segment,
            None => {
                connection.set_state(State::Closed);
                return Err(Error::HandshakeTimeout);
            },
        };

        if segment.repr.flags != TcpFlags::SYN | TcpFlags::ACK
            || segment.repr.ack_number != connection.send_next
        {
            net_debug!("tcp {} -> {}: rejected by {}", connection.local, remote, segment.repr);
            connection.set_state(State::Closed);
            return Err(Error::HandshakeRejected);
        }

        connection.recv_next = segment.repr.seq_number + 1;
        if let Err(err) = connection.transmit(TcpFlags::ACK, &[], config) {
            connection.set_state(State::Closed);
            return Err(err);
        }

        connection.set_state(State::Established);
        Ok(())
    }

    /// Send all of `data`, cut into segments of at most one MSS.
    ///
    /// After each segment waits up to `ack_timeout` for an acknowledgment. A missing
    /// acknowledgment is not an error, there is no retransmission. Data and FIN arriving in the
    /// meantime are buffered for `recv`.
    pub fn send(&mut self, handle: SocketHandle, data: &[u8]) -> Result<usize> {
        let config = &self.config;
        let cancel = &self.cancel;
        let connection = self.connections.get_mut(handle.0)
            .ok_or(Error::InvalidHandle)?;

        if !connection.state.is_synchronized() {
            return Err(Error::NotConnected);
        }

        for chunk in data.chunks(config.segment_len()) {
            connection.transmit(TcpFlags::PSH | TcpFlags::ACK, chunk, config)?;
            connection.send_next += chunk.len();

            let deadline = Expiration::after(Some(config.ack_timeout));
            loop {
                let segment = match connection.receive(deadline, config, cancel)? {
                    Some(segment) => segment,
                    None => {
                        net_debug!("tcp {} -> {}: no ACK for {} bytes",
                            connection.local, connection.remote, chunk.len());
                        break;
                    },
                };

                connection.absorb(&segment, config)?;
                if segment.repr.flags.ack() {
                    break;
                }
            }
        }

        Ok(data.len())
    }

    /// Receive the payload of at most one segment.
    ///
    /// Returns `Ok(0)` once the peer closed its side and all its data was read. When `buf` is
    /// shorter than the payload the rest is kept and returned by the next call.
    pub fn recv(&mut self, handle: SocketHandle, buf: &mut [u8]) -> Result<usize> {
        let config = &self.config;
        let cancel = &self.cancel;
        let connection = self.connections.get_mut(handle.0)
            .ok_or(Error::InvalidHandle)?;

        if buf.is_empty() {
            return Ok(0);
        }

        if let Some(len) = connection.read_pending(buf) {
            return Ok(len);
        }

        match connection.state {
            State::Established => (),
            State::CloseWait => return Ok(0),
            _ => return Err(Error::NotConnected),
        }

        let deadline = Expiration::after(Some(config.receive_timeout));
        loop {
            let segment = match connection.receive(deadline, config, cancel)? {
                Some(segment) => segment,
                None => return Err(Error::ReceiveTimeout),
            };

            connection.absorb(&segment, config)?;
            if let Some(len) = connection.read_pending(buf) {
                return Ok(len);
            }

            if connection.state == State::CloseWait {
                return Ok(0);
            }
        }
    }

    /// Tear down the connection and free the block.
    ///
    /// The teardown is best effort and its failures are only logged. The block and its
    /// transport are released in every case, afterwards the handle is invalid.
    pub fn close(&mut self, handle: SocketHandle) -> Result<()> {
        let mut connection = self.connections.remove(handle.0)
            .ok_or(Error::InvalidHandle)?;

        if let Err(err) = connection.shutdown(&self.config, &self.cancel) {
            net_warn!("tcp {} -> {}: teardown failed: {}",
                connection.local, connection.remote, err);
        }

        connection.set_state(State::Closed);
        net_debug!("tcp: closed socket {}", handle);
        Ok(())
    }

    /// The state of a block.
    pub fn state(&self, handle: SocketHandle) -> Result<State> {
        self.connections.get(handle.0)
            .map(|connection| connection.state)
            .ok_or(Error::InvalidHandle)
    }

    /// The local endpoint of a block.
    pub fn local_endpoint(&self, handle: SocketHandle) -> Result<IpEndpoint> {
        self.connections.get(handle.0)
            .map(|connection| connection.local)
            .ok_or(Error::InvalidHandle)
    }

    /// The remote endpoint of a block, unspecified before connect or accept.
    pub fn remote_endpoint(&self, handle: SocketHandle) -> Result<IpEndpoint> {
        self.connections.get(handle.0)
            .map(|connection| connection.remote)
            .ok_or(Error::InvalidHandle)
    }

    fn next_nonce(&mut self) -> u64 {
        self.nonce += 1;
        self.isn.nonce(self.nonce)
    }

    /// Choose a port from the ephemeral range that no block is bound to.
    fn ephemeral_port(&mut self) -> Result<u16> {
        let offset = (self.next_nonce() % u64::from(EPHEMERAL_COUNT)) as u16;
        (0..EPHEMERAL_COUNT)
            .map(|i| EPHEMERAL_START + (offset + i) % EPHEMERAL_COUNT)
            .find(|&port| self.connections.iter().all(|(_, connection)| connection.local.port != port))
            .ok_or(Error::TooManyConnections)
    }
}
