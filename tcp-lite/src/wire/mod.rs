/*! Low-level packet access and construction.

The `wire` module deals with the packet *representation*. It provides two levels of
functionality for each of the two headers the engine speaks, IPv4 and TCP.

 * First, it provides functions to extract fields from sequences of octets, and to insert
   fields into sequences of octets. This happens through the dynamically sized byte wrappers
   `ipv4_packet` and `tcp_packet`, which are plain reinterpretations of a byte slice.
 * Second, it provides a compact, high-level representation of header data that can be
   created by parsing and emitted into a sequence of octets. This happens through the `Repr`
   family of structs: `Ipv4Repr` and `TcpRepr`.

The functions in the `wire` module are designed for use together with `-Cpanic=abort`.
Accessors of the packet views panic on a short buffer unless the view was created by
`new_checked` or `check_len` returned `Ok(())`. The `Repr::parse` functions never panic, they
return `Err(Error::Truncated)` or `Err(Error::Malformed)` for buffers that can not hold the
header they claim to hold.

```rust
use tcp_lite::wire::*;
let repr = Ipv4Repr {
    src_addr:    Ipv4Address::new(10, 0, 0, 1),
    dst_addr:    Ipv4Address::new(10, 0, 0, 2),
    protocol:    IpProtocol::Tcp,
    payload_len: 10,
    hop_limit:   64,
    ident:       0x1234,
    tos:         0,
    dont_frag:   false,
};
let mut buffer = vec![0; repr.buffer_len() + repr.payload_len];
{ // emission
    let packet = ipv4_packet::new_unchecked_mut(&mut buffer);
    repr.emit(packet, Checksum::Manual);
}
{ // parsing
    let packet = ipv4_packet::new_checked(&buffer)
        .expect("truncated packet");
    let parsed = Ipv4Repr::parse(packet, Checksum::Manual)
        .expect("malformed packet");
    assert_eq!(repr, parsed);
}
```
*/
// Copyright (C) 2016 whitequark@whitequark.org
// Copyright (C) 2019 Andreas Molzer <andreas.molzer@tum.de>
//
// in large parts from `smoltcp` originally distributed under 0-clause BSD
mod field {
    pub(crate) type Field = ::core::ops::Range<usize>;
}

mod error;
pub mod ip;
mod ipv4;
mod tcp;

/// Describes how to handle checksums.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Checksum {
    /// Checksum must be computed or checked manually.
    Manual,

    /// The checksum field is filled or checked by someone else.
    ///
    /// Outgoing headers get a zeroed checksum field and incoming checksums are not inspected.
    Ignored,
}

impl Checksum {
    /// Check if a checksum should be calculated by the library.
    ///
    /// Otherwise it is ignored due to the assumption that it was offloaded or is otherwise
    /// undesirable to check.
    pub fn manual(self) -> bool {
        match self {
            Checksum::Manual => true,
            Checksum::Ignored => false,
        }
    }
}

impl Default for Checksum {
    fn default() -> Self {
        Checksum::Manual
    }
}

pub use self::error::{Error, Result};

pub use self::ip::{
    Protocol as IpProtocol,
    Endpoint as IpEndpoint};

pub use self::ipv4::{
    ipv4 as ipv4_packet,
    Address as Ipv4Address,
    PseudoHeader as Ipv4PseudoHeader,
    Repr as Ipv4Repr,
    HEADER_LEN as IPV4_HEADER_LEN,
    MAX_PAYLOAD_LEN as IPV4_MAX_PAYLOAD_LEN};

pub use self::tcp::{
    tcp as tcp_packet,
    Flags as TcpFlags,
    Repr as TcpRepr,
    SeqNumber as TcpSeqNumber,
    HEADER_LEN as TCP_HEADER_LEN};
