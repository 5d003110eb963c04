//! Sending and receiving single segments on the transport of a control block.
use core::ops::Range;

use super::{Config, Result};
use super::connection::Connection;
use super::engine::Cancel;
use crate::nic::{Errno, Received, Transport};
use crate::time::{Expiration, Instant};
use crate::wire::{
    ipv4_packet, tcp_packet,
    IpEndpoint, IpProtocol, Ipv4Address, Ipv4Repr, TcpFlags, TcpRepr, IPV4_MAX_PAYLOAD_LEN};

/// A received segment that matched the tuple of its control block.
///
/// The payload stays in the receive buffer of the block until the next receive.
#[derive(Clone, Debug)]
pub(crate) struct Segment {
    pub(crate) src_addr: Ipv4Address,
    pub(crate) dst_addr: Ipv4Address,
    pub(crate) repr: TcpRepr,
    pub(crate) payload: Range<usize>,
}

impl Segment {
    /// The endpoint that sent this segment.
    pub(crate) fn sender(&self) -> IpEndpoint {
        IpEndpoint::new(self.src_addr, self.repr.src_port)
    }
}

impl<T: Transport> Connection<T> {
    /// Send one segment to the remote endpoint.
    ///
    /// The segment starts at `send_next` and acknowledges `recv_next`. Neither is advanced. A
    /// payload too long for a single datagram fails like the kernel would, with `EMSGSIZE`.
    pub(crate) fn transmit(&mut self, flags: TcpFlags, payload: &[u8], config: &Config)
        -> Result<()>
    {
        let tcp = TcpRepr {
            src_port: self.local.port,
            dst_port: self.remote.port,
            seq_number: self.send_next,
            ack_number: self.recv_next,
            flags,
            window_len: config.window,
            urgent_at: 0,
            payload_len: payload.len(),
        };

        if tcp.buffer_len() > IPV4_MAX_PAYLOAD_LEN {
            return Err(Errno(libc::EMSGSIZE).into());
        }

        let ip = Ipv4Repr {
            src_addr: self.local.addr,
            dst_addr: self.remote.addr,
            protocol: IpProtocol::Tcp,
            payload_len: tcp.buffer_len(),
            hop_limit: config.hop_limit,
            ident: self.next_ident(),
            tos: 0,
            dont_frag: false,
        };

        let mut datagram = vec![0; ip.buffer_len() + tcp.buffer_len()];
        {
            let packet = ipv4_packet::new_unchecked_mut(&mut datagram);
            ip.emit(packet, config.checksum);
            let segment = tcp_packet::new_unchecked_mut(packet.payload_mut_slice());
            tcp.emit(segment);
            segment.payload_mut_slice().copy_from_slice(payload);
            if config.checksum.manual() {
                segment.fill_checksum(ip.src_addr, ip.dst_addr);
            }
        }

        net_trace!("tcp {} -> {}: send {}", self.local, self.remote, tcp);
        self.transport.send(&datagram, self.remote.addr)?;
        Ok(())
    }

    /// Wait for the next segment matching this block.
    ///
    /// Returns `Ok(None)` when the deadline passes. The transport is polled in slices of at most
    /// `poll_interval` and `cancel` is checked before each of them.
    pub(crate) fn receive(&mut self, deadline: Expiration, config: &Config, cancel: &Cancel)
        -> Result<Option<Segment>>
    {
        loop {
            cancel.check()?;

            let now = Instant::now();
            if deadline.is_expired(now) {
                return Ok(None);
            }

            let slice = match deadline.remaining(now) {
                Some(left) => left.min(config.poll_interval),
                None => config.poll_interval,
            };

            let len = match self.transport.recv(&mut self.buffer, Some(slice))? {
                Received::Data(len) => len,
                Received::NoData => continue,
            };

            if let Some(segment) = self.accept_datagram(len, config) {
                return Ok(Some(segment));
            }
        }
    }

    /// Parse and filter one datagram of the receive buffer.
    fn accept_datagram(&mut self, len: usize, config: &Config) -> Option<Segment> {
        let datagram = &self.buffer[..len];

        let packet = match ipv4_packet::new_checked(datagram) {
            Ok(packet) => packet,
            Err(err) => {
                net_trace!("tcp {}: dropped datagram: {}", self.local, err);
                return None;
            },
        };

        let ip = match Ipv4Repr::parse(packet, config.checksum) {
            Ok(ip) => ip,
            Err(err) => {
                net_trace!("tcp {}: dropped datagram: {}", self.local, err);
                return None;
            },
        };

        if ip.protocol != IpProtocol::Tcp {
            return None;
        }

        let segment = match tcp_packet::new_checked(packet.payload_slice()) {
            Ok(segment) => segment,
            Err(err) => {
                net_trace!("tcp {}: dropped segment: {}", self.local, err);
                return None;
            },
        };

        let repr = match TcpRepr::parse(segment, ip.src_addr, ip.dst_addr, config.checksum) {
            Ok(repr) => repr,
            Err(err) => {
                net_trace!("tcp {}: dropped segment: {}", self.local, err);
                return None;
            },
        };

        let start = usize::from(packet.header_len()) + usize::from(segment.header_len());
        let end = usize::from(packet.total_len());

        if repr.dst_port != self.local.port {
            return None;
        }

        let sender = IpEndpoint::new(ip.src_addr, repr.src_port);
        if self.listening {
            if repr.flags.syn() && !repr.flags.ack() {
                self.remote = sender;
            }
        } else if sender != self.remote {
            return None;
        }

        net_trace!("tcp {} <- {}: recv {}", self.local, sender, repr);
        Some(Segment {
            src_addr: ip.src_addr,
            dst_addr: ip.dst_addr,
            repr,
            payload: start..end,
        })
    }

    /// The payload of a received segment.
    pub(crate) fn payload(&self, segment: &Segment) -> &[u8] {
        &self.buffer[segment.payload.clone()]
    }
}
