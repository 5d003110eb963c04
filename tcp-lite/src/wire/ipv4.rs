use core::convert::TryFrom;
use core::fmt;
use byteorder::{ByteOrder, NetworkEndian};

use super::{Error, Checksum, Result};
use super::ip::checksum;

pub(crate) use super::IpProtocol as Protocol;

/// The length of an IPv4 header without options.
///
/// This is the only header length ever emitted. Received headers may be longer.
pub const HEADER_LEN: usize = field::DST_ADDR.end;

/// The largest payload that fits the 16 bit total length behind a header without options.
pub const MAX_PAYLOAD_LEN: usize = u16::max_value() as usize - HEADER_LEN;

/// A four-octet IPv4 address.
#[derive(Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Default)]
pub struct Address(pub [u8; 4]);

impl Address {
    /// An unspecified address.
    pub const UNSPECIFIED:           Address = Address([0x00; 4]);

    /// The conventional loopback address.
    pub const LOOPBACK:              Address = Address([127, 0, 0, 1]);

    /// Construct an IPv4 address from parts.
    pub const fn new(a0: u8, a1: u8, a2: u8, a3: u8) -> Address {
        Address([a0, a1, a2, a3])
    }

    /// Construct an IPv4 address from a sequence of octets, in big-endian.
    ///
    /// # Panics
    /// The function panics if `data` is not four octets long.
    pub fn from_bytes(data: &[u8]) -> Address {
        let mut bytes = [0; 4];
        bytes.copy_from_slice(data);
        Address(bytes)
    }

    /// Return an IPv4 address as a sequence of octets, in big-endian.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Encode the address into a `u32` in network endian byte order.
    pub fn to_network_integer(self) -> u32 {
        u32::from_be_bytes(self.0)
    }

    /// Query whether the address is the unspecified address `0.0.0.0`.
    pub fn is_unspecified(&self) -> bool {
        self.0 == [0; 4]
    }
}

impl From<::std::net::Ipv4Addr> for Address {
    fn from(x: ::std::net::Ipv4Addr) -> Address {
        Address(x.octets())
    }
}

impl From<Address> for ::std::net::Ipv4Addr {
    fn from(Address(x): Address) -> ::std::net::Ipv4Addr {
        x.into()
    }
}

impl From<[u8; 4]> for Address {
    fn from(octets: [u8; 4]) -> Address {
        Address(octets)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let bytes = self.0;
        write!(f, "{}.{}.{}.{}", bytes[0], bytes[1], bytes[2], bytes[3])
    }
}

byte_wrapper! {
    /// A byte sequence representing an IPv4 packet.
    #[derive(Debug, PartialEq, Eq)]
    pub struct ipv4([u8]);
}

mod field {
    use crate::wire::field::Field;

    pub(crate) const VER_IHL:  usize = 0;
    pub(crate) const TOS:      usize = 1;
    pub(crate) const LENGTH:   Field = 2..4;
    pub(crate) const IDENT:    Field = 4..6;
    pub(crate) const FLG_OFF:  Field = 6..8;
    pub(crate) const TTL:      usize = 8;
    pub(crate) const PROTOCOL: usize = 9;
    pub(crate) const CHECKSUM: Field = 10..12;
    pub(crate) const SRC_ADDR: Field = 12..16;
    pub(crate) const DST_ADDR: Field = 16..20;
}

impl ipv4 {
    /// Imbue a raw octet buffer with IPv4 packet structure.
    pub fn new_unchecked(buffer: &[u8]) -> &ipv4 {
        Self::__from_macro_new_unchecked(buffer)
    }

    /// Imbue a mutable octet buffer with IPv4 packet structure.
    pub fn new_unchecked_mut(buffer: &mut [u8]) -> &mut ipv4 {
        Self::__from_macro_new_unchecked_mut(buffer)
    }

    /// Shorthand for a combination of [new_unchecked] and [check_len].
    ///
    /// [new_unchecked]: #method.new_unchecked
    /// [check_len]: #method.check_len
    pub fn new_checked(data: &[u8]) -> Result<&ipv4> {
        let packet = Self::new_unchecked(data);
        packet.check_len()?;
        Ok(packet)
    }

    /// View the packet as a raw byte slice.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Ensure that no accessor method will panic if called.
    /// Returns `Err(Error::Truncated)` if the buffer is too short.
    /// Returns `Err(Error::Malformed)` if the header length is shorter than the fixed header
    /// or greater than the total length.
    ///
    /// The result of this check is invalidated by calling [set_header_len]
    /// and [set_total_len].
    ///
    /// [set_header_len]: #method.set_header_len
    /// [set_total_len]: #method.set_total_len
    pub fn check_len(&self) -> Result<()> {
        let len = self.0.len();
        if len < field::DST_ADDR.end {
            Err(Error::Truncated)
        } else if (self.header_len() as usize) < field::DST_ADDR.end {
            Err(Error::Malformed)
        } else if len < self.header_len() as usize {
            Err(Error::Truncated)
        } else if self.header_len() as u16 > self.total_len() {
            Err(Error::Malformed)
        } else if len < self.total_len() as usize {
            Err(Error::Truncated)
        } else {
            Ok(())
        }
    }

    /// Return the version field.
    #[inline]
    pub fn version(&self) -> u8 {
        self.0[field::VER_IHL] >> 4
    }

    /// Return the header length, in octets.
    #[inline]
    pub fn header_len(&self) -> u8 {
        (self.0[field::VER_IHL] & 0x0f) * 4
    }

    /// Return the type of service field.
    #[inline]
    pub fn tos(&self) -> u8 {
        self.0[field::TOS]
    }

    /// Return the total length field.
    #[inline]
    pub fn total_len(&self) -> u16 {
        NetworkEndian::read_u16(&self.0[field::LENGTH])
    }

    /// Return the fragment identification field.
    #[inline]
    pub fn ident(&self) -> u16 {
        NetworkEndian::read_u16(&self.0[field::IDENT])
    }

    /// Return the "don't fragment" flag.
    #[inline]
    pub fn dont_frag(&self) -> bool {
        NetworkEndian::read_u16(&self.0[field::FLG_OFF]) & 0x4000 != 0
    }

    /// Whether this is part of a fragmented datagram.
    ///
    /// That is the case when more fragments follow or the fragment offset is not zero.
    #[inline]
    pub fn is_fragment(&self) -> bool {
        NetworkEndian::read_u16(&self.0[field::FLG_OFF]) & 0x3fff != 0
    }

    /// Return the time to live field.
    #[inline]
    pub fn hop_limit(&self) -> u8 {
        self.0[field::TTL]
    }

    /// Return the protocol field.
    #[inline]
    pub fn protocol(&self) -> Protocol {
        Protocol::from(self.0[field::PROTOCOL])
    }

    /// Return the header checksum field.
    #[inline]
    pub fn checksum(&self) -> u16 {
        NetworkEndian::read_u16(&self.0[field::CHECKSUM])
    }

    /// Return the source address field.
    #[inline]
    pub fn src_addr(&self) -> Address {
        Address::from_bytes(&self.0[field::SRC_ADDR])
    }

    /// Return the destination address field.
    #[inline]
    pub fn dst_addr(&self) -> Address {
        Address::from_bytes(&self.0[field::DST_ADDR])
    }

    /// Validate the header checksum.
    pub fn verify_checksum(&self) -> bool {
        checksum::data(&self.0[..self.header_len() as usize]) == !0
    }

    /// Return the payload, everything after the header up to the total length.
    ///
    /// Header options are skipped, not interpreted.
    #[inline]
    pub fn payload_slice(&self) -> &[u8] {
        let range = self.header_len() as usize..self.total_len() as usize;
        &self.0[range]
    }

    /// Return a mutable pointer to the payload.
    #[inline]
    pub fn payload_mut_slice(&mut self) -> &mut [u8] {
        let range = self.header_len() as usize..self.total_len() as usize;
        &mut self.0[range]
    }

    /// Set the version field.
    #[inline]
    pub fn set_version(&mut self, value: u8) {
        self.0[field::VER_IHL] = (self.0[field::VER_IHL] & !0xf0) | (value << 4);
    }

    /// Set the header length, in octets.
    #[inline]
    pub fn set_header_len(&mut self, value: u8) {
        self.0[field::VER_IHL] = (self.0[field::VER_IHL] & !0x0f) | ((value / 4) & 0x0f);
    }

    /// Set the type of service field.
    #[inline]
    pub fn set_tos(&mut self, value: u8) {
        self.0[field::TOS] = value
    }

    /// Set the total length field.
    #[inline]
    pub fn set_total_len(&mut self, value: u16) {
        NetworkEndian::write_u16(&mut self.0[field::LENGTH], value)
    }

    /// Set the fragment identification field.
    #[inline]
    pub fn set_ident(&mut self, value: u16) {
        NetworkEndian::write_u16(&mut self.0[field::IDENT], value)
    }

    /// Clear the flags and fragment offset.
    #[inline]
    pub fn clear_flags(&mut self) {
        NetworkEndian::write_u16(&mut self.0[field::FLG_OFF], 0)
    }

    /// Set the "don't fragment" flag.
    #[inline]
    pub fn set_dont_frag(&mut self, value: bool) {
        let raw = NetworkEndian::read_u16(&self.0[field::FLG_OFF]);
        let raw = if value { raw | 0x4000 } else { raw & !0x4000 };
        NetworkEndian::write_u16(&mut self.0[field::FLG_OFF], raw);
    }

    /// Set the time to live field.
    #[inline]
    pub fn set_hop_limit(&mut self, value: u8) {
        self.0[field::TTL] = value
    }

    /// Set the protocol field.
    #[inline]
    pub fn set_protocol(&mut self, value: Protocol) {
        self.0[field::PROTOCOL] = value.into()
    }

    /// Set the header checksum field.
    #[inline]
    pub fn set_checksum(&mut self, value: u16) {
        NetworkEndian::write_u16(&mut self.0[field::CHECKSUM], value)
    }

    /// Set the source address field.
    #[inline]
    pub fn set_src_addr(&mut self, value: Address) {
        self.0[field::SRC_ADDR].copy_from_slice(value.as_bytes())
    }

    /// Set the destination address field.
    #[inline]
    pub fn set_dst_addr(&mut self, value: Address) {
        self.0[field::DST_ADDR].copy_from_slice(value.as_bytes())
    }

    /// Compute and fill in the header checksum.
    pub fn fill_checksum(&mut self) {
        self.set_checksum(0);
        let checksum = {
            let data = &self.0[..self.header_len() as usize];
            checksum::compute(data)
        };
        self.set_checksum(checksum)
    }
}

impl AsRef<[u8]> for ipv4 {
    fn as_ref(&self) -> &[u8] {
        self.as_bytes()
    }
}

/// A high-level representation of an Internet Protocol version 4 packet header.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct Repr {
    /// The source address.
    pub src_addr:    Address,
    /// The destination address.
    pub dst_addr:    Address,
    /// The encapsulated protocol.
    pub protocol:    Protocol,
    /// The length of the payload, excluding the header and its options.
    pub payload_len: usize,
    /// The time to live.
    pub hop_limit:   u8,
    /// The identification field.
    pub ident:       u16,
    /// The type of service octet.
    pub tos:         u8,
    /// The "don't fragment" flag.
    pub dont_frag:   bool,
}

impl Repr {
    /// Parse an Internet Protocol version 4 packet and return a high-level representation.
    ///
    /// Header options are accepted and skipped.
    pub fn parse(packet: &ipv4, checksum: Checksum) -> Result<Repr> {
        packet.check_len()?;
        // Version 4 is expected.
        if packet.version() != 4 { return Err(Error::Unrecognized) }
        // Valid checksum is expected.
        if checksum.manual() && !packet.verify_checksum() { return Err(Error::WrongChecksum) }
        // We do not support fragmentation.
        if packet.is_fragment() { return Err(Error::Unsupported) }

        let payload_len = packet.total_len() as usize - packet.header_len() as usize;

        Ok(Repr {
            src_addr:    packet.src_addr(),
            dst_addr:    packet.dst_addr(),
            protocol:    packet.protocol(),
            payload_len: payload_len,
            hop_limit:   packet.hop_limit(),
            ident:       packet.ident(),
            tos:         packet.tos(),
            dont_frag:   packet.dont_frag(),
        })
    }

    /// Return the length of a header that will be emitted from this high-level representation.
    pub fn buffer_len(&self) -> usize {
        // We never emit any options.
        HEADER_LEN
    }

    /// Emit a high-level representation into an Internet Protocol version 4 packet.
    ///
    /// # Panics
    /// This function panics if the packet is shorter than the fixed header, or if the payload is
    /// longer than [`MAX_PAYLOAD_LEN`].
    ///
    /// [`MAX_PAYLOAD_LEN`]: constant.MAX_PAYLOAD_LEN.html
    pub fn emit(&self, packet: &mut ipv4, checksum: Checksum) {
        let total_len = match u16::try_from(HEADER_LEN + self.payload_len) {
            Ok(total_len) => total_len,
            Err(_) => panic!("IPv4 payload of {} octets does not fit a datagram", self.payload_len),
        };

        packet.set_version(4);
        packet.set_header_len(HEADER_LEN as u8);
        packet.set_tos(self.tos);
        packet.set_total_len(total_len);
        packet.set_ident(self.ident);
        packet.clear_flags();
        packet.set_dont_frag(self.dont_frag);
        packet.set_hop_limit(self.hop_limit);
        packet.set_protocol(self.protocol);
        packet.set_src_addr(self.src_addr);
        packet.set_dst_addr(self.dst_addr);

        if checksum.manual() {
            packet.fill_checksum();
        } else {
            // make sure we get a consistently zeroed checksum,
            // since implementations might rely on it
            packet.set_checksum(0);
        }
    }

    /// The pseudo header an upper layer checksum of this datagram is computed over.
    pub fn pseudo_header(&self) -> PseudoHeader {
        PseudoHeader {
            src_addr: self.src_addr,
            dst_addr: self.dst_addr,
            protocol: self.protocol,
            length:   self.payload_len as u16,
        }
    }
}

impl fmt::Display for Repr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "IPv4 src={} dst={} proto={} len={}",
               self.src_addr, self.dst_addr, self.protocol, self.payload_len)
    }
}

/// The pseudo header covered by the TCP checksum.
///
/// It is never sent, only summed. The layout is source address, destination address, a zero
/// octet, the protocol and the length of the upper layer segment.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct PseudoHeader {
    /// The source address of the datagram.
    pub src_addr: Address,
    /// The destination address of the datagram.
    pub dst_addr: Address,
    /// The protocol of the covered segment.
    pub protocol: Protocol,
    /// Length of the covered segment, header and payload.
    pub length:   u16,
}

impl PseudoHeader {
    /// The length of the pseudo header in octets.
    pub const LEN: usize = 12;

    /// Write the pseudo header in network byte order.
    pub fn emit(&self, buffer: &mut [u8; 12]) {
        buffer[0..4].copy_from_slice(self.src_addr.as_bytes());
        buffer[4..8].copy_from_slice(self.dst_addr.as_bytes());
        buffer[8] = 0;
        buffer[9] = self.protocol.into();
        NetworkEndian::write_u16(&mut buffer[10..12], self.length);
    }

    /// The partial checksum over the pseudo header, without final complement.
    pub fn checksum(&self) -> u16 {
        checksum::pseudo_header(&self.src_addr, &self.dst_addr, self.protocol,
                                self.length.into())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    static SYN_DATAGRAM: [u8; 40] =
        [0x45, 0x00, 0x00, 0x28, 0x12, 0x34, 0x00, 0x00,
         0x40, 0x06, 0x54, 0x9a, 0x0a, 0x00, 0x00, 0x01,
         0x0a, 0x00, 0x00, 0x02, 0x9c, 0x40, 0x1f, 0x90,
         0x01, 0x23, 0x45, 0x67, 0x00, 0x00, 0x00, 0x00,
         0x50, 0x02, 0xff, 0xff, 0x99, 0x85, 0x00, 0x00];

    fn syn_repr() -> Repr {
        Repr {
            src_addr:    Address::new(10, 0, 0, 1),
            dst_addr:    Address::new(10, 0, 0, 2),
            protocol:    Protocol::Tcp,
            payload_len: 20,
            hop_limit:   64,
            ident:       0x1234,
            tos:         0,
            dont_frag:   false,
        }
    }

    #[test]
    fn test_deconstruct() {
        let packet = ipv4::new_checked(&SYN_DATAGRAM[..]).unwrap();
        assert_eq!(packet.version(), 4);
        assert_eq!(packet.header_len(), 20);
        assert_eq!(packet.total_len(), 40);
        assert_eq!(packet.ident(), 0x1234);
        assert!(!packet.dont_frag());
        assert_eq!(packet.hop_limit(), 64);
        assert_eq!(packet.protocol(), Protocol::Tcp);
        assert_eq!(packet.checksum(), 0x549a);
        assert_eq!(packet.src_addr(), Address::new(10, 0, 0, 1));
        assert_eq!(packet.dst_addr(), Address::new(10, 0, 0, 2));
        assert!(packet.verify_checksum());
        assert_eq!(packet.payload_slice(), &SYN_DATAGRAM[20..]);
    }

    #[test]
    fn test_parse() {
        let packet = ipv4::new_unchecked(&SYN_DATAGRAM[..]);
        assert_eq!(Repr::parse(packet, Checksum::Manual), Ok(syn_repr()));
    }

    #[test]
    fn test_emit() {
        let repr = syn_repr();
        let mut bytes = SYN_DATAGRAM;
        for byte in &mut bytes[..HEADER_LEN] { *byte = 0xa5; }
        repr.emit(ipv4::new_unchecked_mut(&mut bytes), Checksum::Manual);
        assert_eq!(&bytes[..], &SYN_DATAGRAM[..]);
        assert_eq!(checksum::compute(&bytes[..HEADER_LEN]), 0);
    }

    #[test]
    fn test_emit_ignored_checksum() {
        let mut bytes = [0xa5; HEADER_LEN];
        syn_repr().emit(ipv4::new_unchecked_mut(&mut bytes), Checksum::Ignored);
        assert_eq!(ipv4::new_unchecked(&bytes).checksum(), 0);
    }

    #[test]
    fn test_wrong_checksum() {
        let mut bytes = SYN_DATAGRAM;
        bytes[11] ^= 0x01;
        let packet = ipv4::new_unchecked(&bytes[..]);
        assert_eq!(Repr::parse(packet, Checksum::Manual), Err(Error::WrongChecksum));
        assert!(Repr::parse(packet, Checksum::Ignored).is_ok());
    }

    #[test]
    fn test_truncated() {
        assert_eq!(ipv4::new_checked(&SYN_DATAGRAM[..19]), Err(Error::Truncated));
        // Total length claims more than was received.
        assert_eq!(ipv4::new_checked(&SYN_DATAGRAM[..39]), Err(Error::Truncated));
    }

    #[test]
    fn test_malformed_header_len() {
        let mut bytes = SYN_DATAGRAM;
        bytes[0] = 0x44;
        assert_eq!(ipv4::new_checked(&bytes[..]), Err(Error::Malformed));
        let packet = ipv4::new_unchecked(&bytes[..]);
        assert_eq!(Repr::parse(packet, Checksum::Ignored), Err(Error::Malformed));
    }

    #[test]
    fn test_wrong_version() {
        let mut bytes = SYN_DATAGRAM;
        bytes[0] = 0x65;
        let packet = ipv4::new_unchecked(&bytes[..]);
        assert_eq!(Repr::parse(packet, Checksum::Ignored), Err(Error::Unrecognized));
    }

    #[test]
    fn test_header_options_skipped() {
        // Same datagram with a four octet option (all NOP) in the header.
        let mut bytes = vec![0u8; 44];
        bytes[..20].copy_from_slice(&SYN_DATAGRAM[..20]);
        bytes[20..24].copy_from_slice(&[0x01; 4]);
        bytes[24..].copy_from_slice(&SYN_DATAGRAM[20..]);
        {
            let packet = ipv4::new_unchecked_mut(&mut bytes);
            packet.set_header_len(24);
            packet.set_total_len(44);
            packet.fill_checksum();
        }
        let packet = ipv4::new_checked(&bytes).unwrap();
        assert_eq!(Repr::parse(packet, Checksum::Manual), Ok(syn_repr()));
        assert_eq!(packet.payload_slice(), &SYN_DATAGRAM[20..]);
    }

    #[test]
    fn test_fragment_unsupported() {
        let mut bytes = SYN_DATAGRAM;
        bytes[6] = 0x20;
        let packet = ipv4::new_unchecked(&bytes[..]);
        assert_eq!(Repr::parse(packet, Checksum::Ignored), Err(Error::Unsupported));

        let mut bytes = SYN_DATAGRAM;
        bytes[7] = 0xb9;
        let packet = ipv4::new_unchecked(&bytes[..]);
        assert!(packet.is_fragment());
        assert_eq!(Repr::parse(packet, Checksum::Ignored), Err(Error::Unsupported));

        let mut bytes = SYN_DATAGRAM;
        bytes[6] = 0x40;
        let packet = ipv4::new_unchecked(&bytes[..]);
        assert!(!packet.is_fragment());
    }

    #[test]
    fn test_emit_largest_payload() {
        let repr = Repr { payload_len: MAX_PAYLOAD_LEN, ..syn_repr() };
        let mut bytes = vec![0; HEADER_LEN];
        repr.emit(ipv4::new_unchecked_mut(&mut bytes), Checksum::Manual);
        assert_eq!(ipv4::new_unchecked(&bytes).total_len(), u16::max_value());
    }

    #[test]
    #[should_panic]
    fn test_emit_oversized_payload() {
        let repr = Repr { payload_len: MAX_PAYLOAD_LEN + 1, ..syn_repr() };
        let mut bytes = vec![0; HEADER_LEN];
        repr.emit(ipv4::new_unchecked_mut(&mut bytes), Checksum::Manual);
    }

    #[test]
    fn test_pseudo_header() {
        let pseudo = syn_repr().pseudo_header();
        let mut bytes = [0; PseudoHeader::LEN];
        pseudo.emit(&mut bytes);
        assert_eq!(bytes, [0x0a, 0x00, 0x00, 0x01, 0x0a, 0x00, 0x00, 0x02,
                           0x00, 0x06, 0x00, 0x14]);
        assert_eq!(pseudo.checksum(), checksum::data(&bytes));
    }

    #[test]
    fn test_address_format() {
        assert_eq!(format!("{}", Address::new(192, 168, 0, 1)), "192.168.0.1");
        assert_eq!(Address::from(::std::net::Ipv4Addr::LOCALHOST), Address::LOOPBACK);
        assert_eq!(Address::new(10, 0, 0, 1).to_network_integer(), 0x0a00_0001);
        assert!(Address::UNSPECIFIED.is_unspecified());
        assert!(!Address::new(0, 0, 0, 1).is_unspecified());
    }
}
