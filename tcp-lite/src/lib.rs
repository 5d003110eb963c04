//! A minimal TCP in user space, built directly on raw IPv4 sockets.
//!
//! ## Table of contents
//!
//! 1. [Design](#design)
//! 2. [The wire module](wire/index.html)
//! 3. [The engine](tcp/index.html)
//! 4. [Transports](nic/index.html)
//! 5. Internals
//!    1. [The managed module](managed/index.html)
//!
//! ## Design
//!
//! Every header is constructed and parsed by hand. The operating system only provides a raw
//! network-layer socket in "header included" mode and is otherwise not involved in the
//! connection: there is no kernel socket, no kernel TCP state and no kernel retransmission.
//!
//! The library is deliberately small. Handshake, data transfer and teardown all happen
//! synchronously inside the call that requires them, bounded by fixed waits. There is no timer,
//! no retransmission queue and no reassembly. A segment that is not consumed by the call that is
//! currently waiting is dropped.
//!
//! All state lives in an explicit [`Engine`] value. It owns a fixed-capacity table of connection
//! control blocks, each of which owns one raw transport. Handles are generational so that a
//! handle kept past `close` can never alias a later connection in the same slot.
//!
//! ```no_run
//! use tcp_lite::nic::sys::RawIp;
//! use tcp_lite::tcp::Engine;
//! use tcp_lite::wire::{IpEndpoint, Ipv4Address};
//!
//! let mut engine = Engine::new(RawIp);
//! let socket = engine.socket().expect("requires CAP_NET_RAW");
//! engine.bind(socket, IpEndpoint::new(Ipv4Address::UNSPECIFIED, 12345)).unwrap();
//! engine.connect(socket, IpEndpoint::new(Ipv4Address::new(127, 0, 0, 1), 8080)).unwrap();
//! engine.send(socket, b"hello").unwrap();
//! engine.close(socket).unwrap();
//! ```
//!
//! [`Engine`]: tcp/struct.Engine.html
#![warn(missing_docs)]
#![warn(unreachable_pub)]

#[macro_use] mod macros;
pub mod managed;
pub mod nic;
pub mod tcp;
pub mod time;
pub mod wire;
