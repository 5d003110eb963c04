//! Internet protocol numbers, endpoints and the internet checksum.
use core::fmt;
use core::convert::From;
use std::net::SocketAddrV4;

use super::Ipv4Address;

enum_with_unknown! {
    /// IP datagram encapsulated protocol.
    pub enum Protocol(u8) {
        Icmp      = 0x01,
        Igmp      = 0x02,
        Tcp       = 0x06,
        Udp       = 0x11
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Protocol::Icmp        => write!(f, "ICMP"),
            Protocol::Igmp        => write!(f, "IGMP"),
            Protocol::Tcp         => write!(f, "TCP"),
            Protocol::Udp         => write!(f, "UDP"),
            Protocol::Unknown(id) => write!(f, "0x{:02x}", id)
        }
    }
}

/// An internet endpoint address.
///
/// An endpoint can be constructed from a port, in which case the address is unspecified.
#[derive(Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Default)]
pub struct Endpoint {
    /// The IPv4 address of the endpoint.
    pub addr: Ipv4Address,
    /// The port of the endpoint, zero if not yet chosen.
    pub port: u16,
}

impl Endpoint {
    /// An endpoint with unspecified address and port.
    pub const UNSPECIFIED: Endpoint = Endpoint { addr: Ipv4Address::UNSPECIFIED, port: 0 };

    /// Create an endpoint address from given address and port.
    pub const fn new(addr: Ipv4Address, port: u16) -> Endpoint {
        Endpoint { addr, port }
    }

    /// Query whether the endpoint has a specified address and port.
    pub fn is_specified(&self) -> bool {
        !self.addr.is_unspecified() && self.port != 0
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{}", self.addr, self.port)
    }
}

impl From<u16> for Endpoint {
    fn from(port: u16) -> Endpoint {
        Endpoint { addr: Ipv4Address::UNSPECIFIED, port }
    }
}

impl<T: Into<Ipv4Address>> From<(T, u16)> for Endpoint {
    fn from((addr, port): (T, u16)) -> Endpoint {
        Endpoint { addr: addr.into(), port }
    }
}

impl From<SocketAddrV4> for Endpoint {
    fn from(addr: SocketAddrV4) -> Endpoint {
        Endpoint { addr: (*addr.ip()).into(), port: addr.port() }
    }
}

impl From<Endpoint> for SocketAddrV4 {
    fn from(endpoint: Endpoint) -> SocketAddrV4 {
        SocketAddrV4::new(endpoint.addr.into(), endpoint.port)
    }
}

/// The RFC 1071 internet checksum.
///
/// All functions except [`compute`] return the plain one's complement sum, without the final
/// complement, so that partial sums over disjoint buffers can be [`combine`]d. This is how the
/// TCP checksum is built from the pseudo header and the segment without copying either.
///
/// [`compute`]: fn.compute.html
/// [`combine`]: fn.combine.html
pub mod checksum {
    use byteorder::{ByteOrder, NetworkEndian};

    use super::*;

    fn propagate_carries(word: u32) -> u16 {
        let sum = (word >> 16) + (word & 0xffff);
        ((sum >> 16) as u16) + (sum as u16)
    }

    /// Compute an RFC 1071 compliant checksum (without the final complement).
    pub fn data(mut data: &[u8]) -> u16 {
        let mut accum = 0;

        // For each 32-byte chunk...
        const CHUNK_SIZE: usize = 32;
        while data.len() >= CHUNK_SIZE {
            let mut d = &data[..CHUNK_SIZE];
            // ... take by 2 bytes and sum them.
            while d.len() >= 2 {
                accum += NetworkEndian::read_u16(d) as u32;
                d = &d[2..];
            }

            data = &data[CHUNK_SIZE..];
        }

        // Sum the rest that does not fit the last 32-byte chunk,
        // taking by 2 bytes.
        while data.len() >= 2 {
            accum += NetworkEndian::read_u16(data) as u32;
            data = &data[2..];
        }

        // Add the last remaining odd byte, if any.
        if let Some(&value) = data.first() {
            accum += (value as u32) << 8;
        }

        propagate_carries(accum)
    }

    /// Combine several RFC 1071 compliant checksums.
    pub fn combine(checksums: &[u16]) -> u16 {
        let mut accum: u32 = 0;
        for &word in checksums {
            accum += word as u32;
        }
        propagate_carries(accum)
    }

    /// Compute the final checksum of a buffer, ready to be stored in a header.
    ///
    /// Recomputing this over a buffer that already contains its own checksum yields zero.
    pub fn compute(bytes: &[u8]) -> u16 {
        !data(bytes)
    }

    /// Compute an IPv4 pseudo header checksum.
    pub fn pseudo_header(src_addr: &Ipv4Address, dst_addr: &Ipv4Address,
                         protocol: Protocol, length: u32) -> u16 {
        let mut proto_len = [0u8; 4];
        proto_len[1] = protocol.into();
        NetworkEndian::write_u16(&mut proto_len[2..4], length as u16);

        combine(&[
            data(src_addr.as_bytes()),
            data(dst_addr.as_bytes()),
            data(&proto_len[..])
        ])
    }
}

#[cfg(test)]
mod test {
    use super::*;

    static RFC1071_BYTES: [u8; 8] = [0x00, 0x01, 0xf2, 0x03, 0xf4, 0xf5, 0xf6, 0xf7];

    #[test]
    fn test_checksum_rfc1071() {
        assert_eq!(checksum::data(&RFC1071_BYTES), 0xddf2);
        assert_eq!(checksum::compute(&RFC1071_BYTES), 0x220d);
    }

    #[test]
    fn test_checksum_odd_length() {
        // The trailing byte is the high half of a zero padded word.
        assert_eq!(checksum::compute(&RFC1071_BYTES[..7]), 0x2304);
        assert_eq!(checksum::compute(&[0xab]), !0xab00);
        assert_eq!(checksum::compute(&[]), 0xffff);
    }

    #[test]
    fn test_checksum_embedded_is_zero() {
        let mut bytes = [0x45, 0x00, 0x00, 0x73, 0x00, 0x00, 0x40, 0x00, 0x40, 0x11,
                         0x00, 0x00, 0xc0, 0xa8, 0x00, 0x01, 0xc0, 0xa8, 0x00, 0xc7];
        let sum = checksum::compute(&bytes);
        assert_eq!(sum, 0xb861);
        bytes[10] = (sum >> 8) as u8;
        bytes[11] = sum as u8;
        assert_eq!(checksum::compute(&bytes), 0);
    }

    #[test]
    fn test_checksum_combine_matches_concatenation() {
        let long: Vec<u8> = (0..77u8).collect();
        let (head, tail) = long.split_at(40);
        assert_eq!(
            checksum::combine(&[checksum::data(head), checksum::data(tail)]),
            checksum::data(&long));
    }

    #[test]
    fn test_endpoint() {
        let endpoint = Endpoint::new(Ipv4Address::new(127, 0, 0, 1), 8080);
        assert!(endpoint.is_specified());
        assert!(!Endpoint::from(8080u16).is_specified());
        assert!(!Endpoint::UNSPECIFIED.is_specified());
        assert_eq!(format!("{}", endpoint), "127.0.0.1:8080");

        let std: SocketAddrV4 = endpoint.into();
        assert_eq!(Endpoint::from(std), endpoint);
    }

    #[test]
    fn test_protocol() {
        assert_eq!(Protocol::from(6), Protocol::Tcp);
        assert_eq!(Protocol::from(99), Protocol::Unknown(99));
        assert_eq!(u8::from(Protocol::Tcp), 6);
    }
}
