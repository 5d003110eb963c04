use core::{i32, ops, cmp, fmt};
use byteorder::{ByteOrder, NetworkEndian};

use super::{Checksum, Error, IpProtocol, Ipv4Address, Result};
use super::ip::checksum;

/// The length of a TCP header without options.
///
/// This is the only header length ever emitted. Received headers may carry options, which are
/// skipped.
pub const HEADER_LEN: usize = field::URGENT.end;

/// A TCP sequence number.
///
/// A sequence number is a monotonically advancing integer modulo 2<sup>32</sup>.
/// Sequence numbers do not have a discontiguity when compared pairwise across a signed overflow.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default, Hash)]
pub struct SeqNumber(pub i32);

impl fmt::Display for SeqNumber {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0 as u32)
    }
}

impl From<u32> for SeqNumber {
    fn from(raw: u32) -> SeqNumber {
        SeqNumber(raw as i32)
    }
}

impl ops::Add<usize> for SeqNumber {
    type Output = SeqNumber;

    fn add(self, rhs: usize) -> SeqNumber {
        if rhs > i32::MAX as usize {
            panic!("attempt to add to sequence number with unsigned overflow")
        }
        SeqNumber(self.0.wrapping_add(rhs as i32))
    }
}

impl ops::Sub<usize> for SeqNumber {
    type Output = SeqNumber;

    fn sub(self, rhs: usize) -> SeqNumber {
        if rhs > i32::MAX as usize {
            panic!("attempt to subtract to sequence number with unsigned overflow")
        }
        SeqNumber(self.0.wrapping_sub(rhs as i32))
    }
}

impl ops::AddAssign<usize> for SeqNumber {
    fn add_assign(&mut self, rhs: usize) {
        *self = *self + rhs;
    }
}

impl ops::Sub for SeqNumber {
    type Output = usize;

    fn sub(self, rhs: SeqNumber) -> usize {
        let result = self.0.wrapping_sub(rhs.0);
        if result < 0 {
            panic!("attempt to subtract sequence numbers with underflow")
        }
        result as usize
    }
}

impl cmp::PartialOrd for SeqNumber {
    fn partial_cmp(&self, other: &SeqNumber) -> Option<cmp::Ordering> {
        self.0.wrapping_sub(other.0).partial_cmp(&0)
    }
}

/// A set of tcp flags.
///
/// Only the six classic flags are represented, the ECN bits are never set and ignored when
/// received.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Flags(pub u8);

byte_wrapper! {
    /// A byte sequence representing a TCP segment, header and payload.
    #[derive(Debug, PartialEq, Eq)]
    pub struct tcp([u8]);
}

mod field {
    use crate::wire::field::Field;

    pub(crate) const SRC_PORT: Field = 0..2;
    pub(crate) const DST_PORT: Field = 2..4;
    pub(crate) const SEQ_NUM:  Field = 4..8;
    pub(crate) const ACK_NUM:  Field = 8..12;
    pub(crate) const OFFSET:   usize = 12;
    pub(crate) const FLAGS:    usize = 13;
    pub(crate) const WIN_SIZE: Field = 14..16;
    pub(crate) const CHECKSUM: Field = 16..18;
    pub(crate) const URGENT:   Field = 18..20;

    pub(crate) const FLG_FIN: u8 = 0x01;
    pub(crate) const FLG_SYN: u8 = 0x02;
    pub(crate) const FLG_RST: u8 = 0x04;
    pub(crate) const FLG_PSH: u8 = 0x08;
    pub(crate) const FLG_ACK: u8 = 0x10;
    pub(crate) const FLG_URG: u8 = 0x20;
}

impl tcp {
    /// Imbue a raw octet buffer with TCP packet structure.
    pub fn new_unchecked(buffer: &[u8]) -> &tcp {
        Self::__from_macro_new_unchecked(buffer)
    }

    /// Imbue a mutable octet buffer with TCP packet structure.
    pub fn new_unchecked_mut(buffer: &mut [u8]) -> &mut tcp {
        Self::__from_macro_new_unchecked_mut(buffer)
    }

    /// Shorthand for a combination of [new_unchecked] and [check_len].
    ///
    /// [new_unchecked]: #method.new_unchecked
    /// [check_len]: #method.check_len
    pub fn new_checked(data: &[u8]) -> Result<&tcp> {
        let packet = Self::new_unchecked(data);
        packet.check_len()?;
        Ok(packet)
    }

    /// View the segment as a raw byte slice.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Ensure that no header accessor method will panic if called.
    /// Returns `Err(Error::Truncated)` if the buffer is too short.
    /// Returns `Err(Error::Malformed)` if the header length field has a value smaller
    /// than the minimal header length.
    ///
    /// The result of this check is invalidated by calling [set_header_len].
    ///
    /// [set_header_len]: #method.set_header_len
    pub fn check_len(&self) -> Result<()> {
        let len = self.0.len();
        if len < field::URGENT.end {
            Err(Error::Truncated)
        } else {
            let header_len = self.header_len() as usize;
            if len < header_len {
                Err(Error::Truncated)
            } else if header_len < field::URGENT.end {
                Err(Error::Malformed)
            } else {
                Ok(())
            }
        }
    }

    /// Return the source port field.
    #[inline]
    pub fn src_port(&self) -> u16 {
        NetworkEndian::read_u16(&self.0[field::SRC_PORT])
    }

    /// Return the destination port field.
    #[inline]
    pub fn dst_port(&self) -> u16 {
        NetworkEndian::read_u16(&self.0[field::DST_PORT])
    }

    /// Return the sequence number field.
    #[inline]
    pub fn seq_number(&self) -> SeqNumber {
        SeqNumber(NetworkEndian::read_i32(&self.0[field::SEQ_NUM]))
    }

    /// Return the acknowledgement number field.
    #[inline]
    pub fn ack_number(&self) -> SeqNumber {
        SeqNumber(NetworkEndian::read_i32(&self.0[field::ACK_NUM]))
    }

    /// Read all flags at once.
    #[inline]
    pub fn flags(&self) -> Flags {
        Flags(self.0[field::FLAGS] & 0x3f)
    }

    /// Return the header length, in octets.
    #[inline]
    pub fn header_len(&self) -> u8 {
        (self.0[field::OFFSET] >> 4) * 4
    }

    /// Return the window size field.
    #[inline]
    pub fn window_len(&self) -> u16 {
        NetworkEndian::read_u16(&self.0[field::WIN_SIZE])
    }

    /// Return the checksum field.
    #[inline]
    pub fn checksum(&self) -> u16 {
        NetworkEndian::read_u16(&self.0[field::CHECKSUM])
    }

    /// Return the urgent pointer field.
    #[inline]
    pub fn urgent_at(&self) -> u16 {
        NetworkEndian::read_u16(&self.0[field::URGENT])
    }

    /// Return a pointer to the payload.
    #[inline]
    pub fn payload_slice(&self) -> &[u8] {
        let header_len = self.header_len() as usize;
        &self.0[header_len..]
    }

    /// Validate the segment checksum.
    ///
    /// The checksum covers the pseudo header built from `src_addr` and `dst_addr` and the
    /// whole segment, so the slice must end exactly where the segment ends.
    pub fn verify_checksum(&self, src_addr: Ipv4Address, dst_addr: Ipv4Address) -> bool {
        checksum::combine(&[
            checksum::pseudo_header(&src_addr, &dst_addr, IpProtocol::Tcp,
                                    self.0.len() as u32),
            checksum::data(&self.0)
        ]) == !0
    }

    /// Set the source port field.
    #[inline]
    pub fn set_src_port(&mut self, value: u16) {
        NetworkEndian::write_u16(&mut self.0[field::SRC_PORT], value)
    }

    /// Set the destination port field.
    #[inline]
    pub fn set_dst_port(&mut self, value: u16) {
        NetworkEndian::write_u16(&mut self.0[field::DST_PORT], value)
    }

    /// Set the sequence number field.
    #[inline]
    pub fn set_seq_number(&mut self, value: SeqNumber) {
        NetworkEndian::write_i32(&mut self.0[field::SEQ_NUM], value.0)
    }

    /// Set the acknowledgement number field.
    #[inline]
    pub fn set_ack_number(&mut self, value: SeqNumber) {
        NetworkEndian::write_i32(&mut self.0[field::ACK_NUM], value.0)
    }

    /// Set a combination of flags, clearing all others.
    #[inline]
    pub fn set_flags(&mut self, Flags(flags): Flags) {
        self.0[field::FLAGS] = flags & 0x3f;
    }

    /// Set the header length, in octets.
    ///
    /// This also clears the reserved bits sharing the octet.
    #[inline]
    pub fn set_header_len(&mut self, value: u8) {
        self.0[field::OFFSET] = (value / 4) << 4;
    }

    /// Set the window size field.
    #[inline]
    pub fn set_window_len(&mut self, value: u16) {
        NetworkEndian::write_u16(&mut self.0[field::WIN_SIZE], value)
    }

    /// Set the checksum field.
    #[inline]
    pub fn set_checksum(&mut self, value: u16) {
        NetworkEndian::write_u16(&mut self.0[field::CHECKSUM], value)
    }

    /// Set the urgent pointer field.
    #[inline]
    pub fn set_urgent_at(&mut self, value: u16) {
        NetworkEndian::write_u16(&mut self.0[field::URGENT], value)
    }

    /// Compute and fill in the segment checksum.
    ///
    /// The payload must already be in place.
    pub fn fill_checksum(&mut self, src_addr: Ipv4Address, dst_addr: Ipv4Address) {
        self.set_checksum(0);
        let checksum = {
            let data = &self.0;
            !checksum::combine(&[
                checksum::pseudo_header(&src_addr, &dst_addr, IpProtocol::Tcp,
                                        data.len() as u32),
                checksum::data(data)
            ])
        };
        self.set_checksum(checksum)
    }

    /// Return a mutable pointer to the payload data.
    #[inline]
    pub fn payload_mut_slice(&mut self) -> &mut [u8] {
        let header_len = self.header_len() as usize;
        &mut self.0[header_len..]
    }
}

impl AsRef<[u8]> for tcp {
    fn as_ref(&self) -> &[u8] {
        self.as_bytes()
    }
}

impl Flags {
    /// The FIN flag alone.
    pub const FIN: Flags = Flags(field::FLG_FIN);
    /// The SYN flag alone.
    pub const SYN: Flags = Flags(field::FLG_SYN);
    /// The RST flag alone.
    pub const RST: Flags = Flags(field::FLG_RST);
    /// The PSH flag alone.
    pub const PSH: Flags = Flags(field::FLG_PSH);
    /// The ACK flag alone.
    pub const ACK: Flags = Flags(field::FLG_ACK);
    /// The URG flag alone.
    pub const URG: Flags = Flags(field::FLG_URG);

    /// Return the FIN flag.
    #[inline]
    pub fn fin(&self) -> bool {
        self.0 & field::FLG_FIN != 0
    }

    /// Return the SYN flag.
    #[inline]
    pub fn syn(&self) -> bool {
        self.0 & field::FLG_SYN != 0
    }

    /// Return the RST flag.
    #[inline]
    pub fn rst(&self) -> bool {
        self.0 & field::FLG_RST != 0
    }

    /// Return the PSH flag.
    #[inline]
    pub fn psh(&self) -> bool {
        self.0 & field::FLG_PSH != 0
    }

    /// Return the ACK flag.
    #[inline]
    pub fn ack(&self) -> bool {
        self.0 & field::FLG_ACK != 0
    }

    /// Return the URG flag.
    #[inline]
    pub fn urg(&self) -> bool {
        self.0 & field::FLG_URG != 0
    }

    /// Set the FIN flag.
    #[inline]
    pub fn set_fin(&mut self, value: bool) {
        self.set(field::FLG_FIN, value)
    }

    /// Set the SYN flag.
    #[inline]
    pub fn set_syn(&mut self, value: bool) {
        self.set(field::FLG_SYN, value)
    }

    /// Set the PSH flag.
    #[inline]
    pub fn set_psh(&mut self, value: bool) {
        self.set(field::FLG_PSH, value)
    }

    /// Set the ACK flag.
    #[inline]
    pub fn set_ack(&mut self, value: bool) {
        self.set(field::FLG_ACK, value)
    }

    fn set(&mut self, bit: u8, value: bool) {
        if value {
            self.0 |= bit;
        } else {
            self.0 &= !bit;
        }
    }

    /// Check that all flags of `other` are set.
    pub fn contains(self, other: Flags) -> bool {
        self.0 & other.0 == other.0
    }

    /// The number of sequence numbers the flags occupy on their own.
    ///
    /// Both SYN and FIN take up one sequence number.
    pub fn sequence_len(self) -> usize {
        usize::from(self.syn()) + usize::from(self.fin())
    }
}

impl ops::BitOr for Flags {
    type Output = Flags;

    fn bitor(self, rhs: Flags) -> Flags {
        Flags(self.0 | rhs.0)
    }
}

impl fmt::Display for Flags {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let names = [
            (field::FLG_SYN, "syn"),
            (field::FLG_FIN, "fin"),
            (field::FLG_RST, "rst"),
            (field::FLG_PSH, "psh"),
            (field::FLG_ACK, "ack"),
            (field::FLG_URG, "urg"),
        ];
        let mut first = true;
        for &(bit, name) in names.iter() {
            if self.0 & bit != 0 {
                if !first { f.write_str("|")? }
                f.write_str(name)?;
                first = false;
            }
        }
        if first {
            f.write_str("none")?;
        }
        Ok(())
    }
}

/// A high-level representation of a Transmission Control Protocol segment header.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct Repr {
    /// The source port.
    pub src_port:    u16,
    /// The destination port.
    pub dst_port:    u16,
    /// The sequence number of the first octet, or of the SYN.
    pub seq_number:  SeqNumber,
    /// The acknowledgment number, meaningful only with the ACK flag.
    pub ack_number:  SeqNumber,
    /// All flags of the segment.
    pub flags:       Flags,
    /// The advertised window.
    pub window_len:  u16,
    /// The urgent pointer, never interpreted.
    pub urgent_at:   u16,
    /// The number of payload octets following the header.
    pub payload_len: usize,
}

impl Repr {
    /// Parse a Transmission Control Protocol segment and return a high-level representation.
    ///
    /// The segment slice must end where the segment ends, the checksum covers all of it. The
    /// addresses are those of the enclosing IPv4 header.
    pub fn parse(
        packet: &tcp,
        src_addr: Ipv4Address,
        dst_addr: Ipv4Address,
        checksum: Checksum,
    ) -> Result<Repr> {
        packet.check_len()?;
        // Source and destination ports must be present.
        if packet.src_port() == 0 { return Err(Error::Malformed) }
        if packet.dst_port() == 0 { return Err(Error::Malformed) }

        // Valid checksum may be expected.
        if checksum.manual() && !packet.verify_checksum(src_addr, dst_addr) {
            return Err(Error::WrongChecksum)
        }

        // The URG flag and the urgent field are ignored. Options are skipped.
        Ok(Repr {
            src_port:    packet.src_port(),
            dst_port:    packet.dst_port(),
            seq_number:  packet.seq_number(),
            ack_number:  packet.ack_number(),
            flags:       packet.flags(),
            window_len:  packet.window_len(),
            urgent_at:   packet.urgent_at(),
            payload_len: packet.payload_slice().len(),
        })
    }

    /// Return the length of a header that will be emitted from this high-level representation.
    pub fn header_len(&self) -> usize {
        HEADER_LEN
    }

    /// Return the length of a segment that will be emitted from this high-level representation.
    pub fn buffer_len(&self) -> usize {
        self.header_len() + self.payload_len
    }

    /// Emit a high-level representation into a Transmission Control Protocol segment.
    ///
    /// Only the header is written. The checksum field is zeroed, it must be filled with
    /// [`tcp::fill_checksum`] once the payload is in place.
    ///
    /// [`tcp::fill_checksum`]: struct.tcp.html#method.fill_checksum
    pub fn emit(&self, packet: &mut tcp) {
        packet.set_src_port(self.src_port);
        packet.set_dst_port(self.dst_port);
        packet.set_seq_number(self.seq_number);
        packet.set_ack_number(self.ack_number);
        packet.set_header_len(HEADER_LEN as u8);
        packet.set_flags(self.flags);
        packet.set_window_len(self.window_len);
        packet.set_checksum(0);
        packet.set_urgent_at(self.urgent_at);
    }

    /// Return the length of the segment, in terms of sequence space.
    pub fn sequence_len(&self) -> usize {
        self.payload_len + self.flags.sequence_len()
    }
}

impl fmt::Display for Repr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "TCP src={} dst={} {}",
               self.src_port, self.dst_port, self.flags)?;
        write!(f, " seq={}", self.seq_number)?;
        if self.flags.ack() {
            write!(f, " ack={}", self.ack_number)?;
        }
        write!(f, " win={}", self.window_len)?;
        write!(f, " len={}", self.payload_len)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const SRC_ADDR: Ipv4Address = Ipv4Address::new(10, 0, 0, 1);
    const DST_ADDR: Ipv4Address = Ipv4Address::new(10, 0, 0, 2);

    static SYN_BYTES: [u8; 20] =
        [0x9c, 0x40, 0x1f, 0x90,
         0x01, 0x23, 0x45, 0x67,
         0x00, 0x00, 0x00, 0x00,
         0x50, 0x02, 0xff, 0xff,
         0x99, 0x85, 0x00, 0x00];

    // An answer from DST_ADDR to SRC_ADDR carrying "hello".
    static DATA_BYTES: [u8; 25] =
        [0x1f, 0x90, 0x9c, 0x40,
         0x89, 0xab, 0xcd, 0xef,
         0x01, 0x23, 0x45, 0x68,
         0x50, 0x18, 0xff, 0xff,
         0xfd, 0xfb, 0x00, 0x00,
         0x68, 0x65, 0x6c, 0x6c, 0x6f];

    fn syn_repr() -> Repr {
        Repr {
            src_port:    40000,
            dst_port:    8080,
            seq_number:  SeqNumber(0x01234567),
            ack_number:  SeqNumber(0),
            flags:       Flags::SYN,
            window_len:  0xffff,
            urgent_at:   0,
            payload_len: 0,
        }
    }

    fn data_repr() -> Repr {
        Repr {
            src_port:    8080,
            dst_port:    40000,
            seq_number:  SeqNumber::from(0x89ab_cdef_u32),
            ack_number:  SeqNumber(0x01234568),
            flags:       Flags::PSH | Flags::ACK,
            window_len:  0xffff,
            urgent_at:   0,
            payload_len: 5,
        }
    }

    #[test]
    fn test_deconstruct() {
        let packet = tcp::new_checked(&DATA_BYTES[..]).unwrap();
        assert_eq!(packet.src_port(), 8080);
        assert_eq!(packet.dst_port(), 40000);
        assert_eq!(packet.seq_number(), SeqNumber::from(0x89ab_cdef_u32));
        assert_eq!(packet.ack_number(), SeqNumber(0x01234568));
        assert_eq!(packet.header_len(), 20);
        assert!(packet.flags().psh() && packet.flags().ack());
        assert!(!packet.flags().syn() && !packet.flags().fin());
        assert_eq!(packet.window_len(), 0xffff);
        assert_eq!(packet.checksum(), 0xfdfb);
        assert_eq!(packet.payload_slice(), b"hello");
        assert!(packet.verify_checksum(DST_ADDR, SRC_ADDR));
        assert!(!packet.verify_checksum(SRC_ADDR, Ipv4Address::new(10, 0, 0, 3)));
    }

    #[test]
    fn test_parse() {
        let packet = tcp::new_unchecked(&SYN_BYTES[..]);
        assert_eq!(Repr::parse(packet, SRC_ADDR, DST_ADDR, Checksum::Manual), Ok(syn_repr()));
        let packet = tcp::new_unchecked(&DATA_BYTES[..]);
        assert_eq!(Repr::parse(packet, DST_ADDR, SRC_ADDR, Checksum::Manual), Ok(data_repr()));
    }

    #[test]
    fn test_emit() {
        let repr = data_repr();
        let mut bytes = vec![0xa5; repr.buffer_len()];
        let packet = tcp::new_unchecked_mut(&mut bytes);
        repr.emit(packet);
        packet.payload_mut_slice().copy_from_slice(b"hello");
        packet.fill_checksum(DST_ADDR, SRC_ADDR);
        assert_eq!(&bytes[..], &DATA_BYTES[..]);
    }

    #[test]
    fn test_checksum_embedded_is_zero() {
        let pseudo = checksum::pseudo_header(&SRC_ADDR, &DST_ADDR, IpProtocol::Tcp, 20);
        assert_eq!(!checksum::combine(&[pseudo, checksum::data(&SYN_BYTES)]), 0);
    }

    #[test]
    fn test_wrong_checksum() {
        let mut bytes = DATA_BYTES;
        bytes[24] = b'O';
        let packet = tcp::new_unchecked(&bytes[..]);
        assert_eq!(Repr::parse(packet, DST_ADDR, SRC_ADDR, Checksum::Manual),
                   Err(Error::WrongChecksum));
        assert!(Repr::parse(packet, DST_ADDR, SRC_ADDR, Checksum::Ignored).is_ok());
    }

    #[test]
    fn test_truncated() {
        assert_eq!(tcp::new_checked(&SYN_BYTES[..19]), Err(Error::Truncated));
        let packet = tcp::new_unchecked(&SYN_BYTES[..19]);
        assert_eq!(Repr::parse(packet, SRC_ADDR, DST_ADDR, Checksum::Ignored),
                   Err(Error::Truncated));
    }

    #[test]
    fn test_impossible_len() {
        let mut bytes = SYN_BYTES;
        tcp::new_unchecked_mut(&mut bytes).set_header_len(16);
        assert_eq!(tcp::new_checked(&bytes[..]), Err(Error::Malformed));
        // A data offset pointing beyond the segment.
        tcp::new_unchecked_mut(&mut bytes).set_header_len(24);
        assert_eq!(tcp::new_checked(&bytes[..]), Err(Error::Truncated));
    }

    #[test]
    fn test_options_skipped() {
        let mut bytes = vec![0; 29];
        bytes[..20].copy_from_slice(&DATA_BYTES[..20]);
        bytes[20..24].copy_from_slice(&[0x01, 0x01, 0x01, 0x00]);
        bytes[24..].copy_from_slice(b"hello");
        let packet = tcp::new_unchecked_mut(&mut bytes);
        packet.set_header_len(24);
        packet.fill_checksum(DST_ADDR, SRC_ADDR);
        let repr = Repr::parse(packet, DST_ADDR, SRC_ADDR, Checksum::Manual).unwrap();
        assert_eq!(repr.payload_len, 5);
        assert_eq!(packet.payload_slice(), b"hello");
    }

    #[test]
    fn test_zero_port() {
        let mut bytes = SYN_BYTES;
        tcp::new_unchecked_mut(&mut bytes).set_dst_port(0);
        let packet = tcp::new_unchecked(&bytes[..]);
        assert_eq!(Repr::parse(packet, SRC_ADDR, DST_ADDR, Checksum::Ignored),
                   Err(Error::Malformed));
    }

    #[test]
    fn test_flags() {
        let mut flags = Flags::SYN | Flags::ACK;
        assert!(flags.contains(Flags::SYN));
        assert!(!flags.contains(Flags::SYN | Flags::FIN));
        assert_eq!(flags.sequence_len(), 1);
        assert_eq!(format!("{}", flags), "syn|ack");
        flags.set_syn(false);
        flags.set_fin(true);
        assert_eq!(flags, Flags::FIN | Flags::ACK);
        assert_eq!(format!("{}", Flags::default()), "none");
        assert_eq!(data_repr().sequence_len(), 5);
    }

    #[test]
    fn test_seq_number_wraps() {
        let near_end = SeqNumber::from(0xffff_fffe_u32);
        let wrapped = near_end + 5;
        assert_eq!(wrapped, SeqNumber(3));
        assert_eq!(wrapped - near_end, 5);
        assert!(near_end < wrapped);
        assert_eq!(format!("{}", near_end), "4294967294");
    }
}
