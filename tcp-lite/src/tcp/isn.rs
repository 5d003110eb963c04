//! Initial sequence number generation, as recommended by rfc6528.
//!
//! Uses a keyed cryptographic hash function (SipHash-2-4) instead of appending the secret key to
//! the four tuple for hashing. Hash function SipHash-2-4 from:
//!
//! > SipHash: a fast short-input PRF, Jean-Philippe Aumasson and Daniel J. Bernstein
use crate::time::Instant;
use crate::wire::{IpEndpoint, TcpSeqNumber};

/// An initial sequence number generator based on SipHash-2-4.
///
/// Implements most of RFC6528 but with a particular choice of keyed hash function (instead of
/// MD5). Instead of hashing the secret as the last parameter the hash function already provides a
/// setup for keyed use.
///
/// > ISN = M + SipHash-2-4(secretkey, localip, localport, remoteip, remoteport)
///
/// where `M` is a timer ticking every 4 microseconds. The same key also seeds the identification
/// field of outgoing datagrams and the choice of ephemeral ports, so that none of them can be
/// predicted from the outside.
#[derive(Clone)]
pub struct IsnGenerator {
    keys: (u64, u64),
}

// Yes, that's the initial values, as ASCII text.
const IV: [&[u8; 8]; 4] = [
    b"somepseu",
    b"dorandom",
    b"lygenera",
    b"tedbytes"];

struct State {
    v0: u64,
    v1: u64,
    v2: u64,
    v3: u64,
}

impl IsnGenerator {
    /// Create a generator by deriving a key from the standard `RandomState`.
    ///
    /// This is done by individually hashing the numbers `0u64` and `1u64` each with the same
    /// hasher created from a new instance of `RandomState`. The two output tags are then used as
    /// the internal key state.
    pub fn from_std_hash() -> Self {
        use std::hash::{Hasher, BuildHasher};
        use std::collections::hash_map::RandomState;

        let hash = RandomState::new().build_hasher();
        let x0 = {
            let mut hash = hash.clone();
            hash.write_u64(0);
            hash.finish()
        };
        let x1 = {
            let mut hash = hash.clone();
            hash.write_u64(1);
            hash.finish()
        };

        IsnGenerator {
            keys: (x0, x1),
        }
    }

    /// Create a generator with some pre-defined secret key.
    ///
    /// Really, create the key with some cryptographic random means or derive them from some other
    /// key with a key derivation function.
    pub fn from_secret_key_bytes(bytes: [u8; 16]) -> Self {
        let [a0, a1, a2, a3, a4, a5, a6, a7,
             b0, b1, b2, b3, b4, b5, b6, b7] = bytes;
        let a = u64::from_le_bytes([a0, a1, a2, a3, a4, a5, a6, a7]);
        let b = u64::from_le_bytes([b0, b1, b2, b3, b4, b5, b6, b7]);
        IsnGenerator { keys: (a, b), }
    }

    /// Get the initial sequence number for a connection.
    ///
    /// The value advances by one every 4µs, and is otherwise only changed when the secret key is
    /// updated.
    pub fn get_isn(&self, local: IpEndpoint, remote: IpEndpoint, time: Instant) -> TcpSeqNumber {
        let mut state = State::init(self.keys.0, self.keys.1);

        let m = u64::from(local.addr.to_network_integer())
            | u64::from(remote.addr.to_network_integer()) << 32;
        let p = u64::from(local.port)
            | u64::from(remote.port) << 16
            // Message length = 12
            | 12_u64 << 56;
        state.absorb(m);
        state.absorb(p);
        let num = state.finalize() as u32;

        let ticks = (time.total_millis() as u64).wrapping_mul(250) as u32;
        TcpSeqNumber::from(num.wrapping_add(ticks))
    }

    /// Derive an unpredictable value from a counter.
    ///
    /// Distinct counters give unrelated values, equal counters equal values.
    pub(crate) fn nonce(&self, counter: u64) -> u64 {
        let mut state = State::init(self.keys.0, self.keys.1);
        state.absorb(counter);
        // Message length = 8
        state.absorb(8_u64 << 56);
        state.finalize()
    }
}

impl State {
    const SIP_C: usize = 2;
    const SIP_D: usize = 4;

    fn init(k0: u64, k1: u64) -> Self {
        State {
            v0: u64::from_be_bytes(*IV[0]) ^ k0,
            v1: u64::from_be_bytes(*IV[1]) ^ k1,
            v2: u64::from_be_bytes(*IV[2]) ^ k0,
            v3: u64::from_be_bytes(*IV[3]) ^ k1,
        }
    }

    fn round(&mut self) {
        self.v0 = self.v0.wrapping_add(self.v1);
        self.v1 = self.v1.rotate_left(13);
        self.v1 ^= self.v0;
        self.v0 = self.v0.rotate_left(32);
        self.v2 = self.v2.wrapping_add(self.v3);
        self.v3 = self.v3.rotate_left(16);
        self.v3 ^= self.v2;
        self.v0 = self.v0.wrapping_add(self.v3);
        self.v3 = self.v3.rotate_left(21);
        self.v3 ^= self.v0;
        self.v2 = self.v2.wrapping_add(self.v1);
        self.v1 = self.v1.rotate_left(17);
        self.v1 ^= self.v2;
        self.v2 = self.v2.rotate_left(32);
    }

    /// Process a single portion of the message.
    ///
    /// All users need to manually absorb the length in the last block. Every input is a sequence
    /// of whole 8-byte blocks, which separates the length block completely.
    fn absorb(&mut self, m: u64) {
        self.v3 ^= m;
        (0..Self::SIP_C).for_each(|_| self.round());
        self.v0 ^= m;
    }

    /// Do the finalization rounds.
    fn finalize(mut self) -> u64 {
        self.v2 ^= 0xff;
        (0..Self::SIP_D).for_each(|_| self.round());
        self.v0 ^ self.v1 ^ self.v2 ^ self.v3
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::Ipv4Address;

    fn paper_key() -> IsnGenerator {
        let mut key = [0; 16];
        key.iter_mut().enumerate().for_each(|(i, b)| *b = i as u8);
        IsnGenerator::from_secret_key_bytes(key)
    }

    /// See the paper, Appendix A.
    #[test]
    fn manual_test_vectors() {
        let k0 = u64::from_le_bytes(0x0001020304050607_u64.to_be_bytes());
        let k1 = u64::from_le_bytes(0x08090a0b0c0d0e0f_u64.to_be_bytes());
        assert_eq!(paper_key().keys, (k0, k1));

        let mut state = State::init(k0, k1);
        let m0 = u64::from_le_bytes(0x0001020304050607_u64.to_be_bytes());
        state.absorb(m0);
        let m1 = u64::from_le_bytes(0x08090a0b0c0d0e0f_u64.to_be_bytes());
        state.absorb(m1);

        assert_eq!(state.finalize(), 0xa129ca6149be45e5);
    }

    #[test]
    fn isn_depends_on_tuple_and_time() {
        let isn = paper_key();
        let local = IpEndpoint::new(Ipv4Address::new(10, 0, 0, 1), 12345);
        let remote = IpEndpoint::new(Ipv4Address::new(10, 0, 0, 2), 8080);
        let other = IpEndpoint::new(Ipv4Address::new(10, 0, 0, 2), 8081);
        let start = Instant::from_millis(0);

        let first = isn.get_isn(local, remote, start);
        assert_eq!(first, isn.get_isn(local, remote, start));
        assert_ne!(first, isn.get_isn(local, other, start));
        // One millisecond is 250 ticks of the 4µs clock.
        assert_eq!(isn.get_isn(local, remote, Instant::from_millis(1)), first + 250);
    }

    #[test]
    fn keys_differ() {
        let local = IpEndpoint::new(Ipv4Address::new(10, 0, 0, 1), 12345);
        let remote = IpEndpoint::new(Ipv4Address::new(10, 0, 0, 2), 8080);
        let now = Instant::from_millis(0);
        let a = IsnGenerator::from_std_hash();
        let b = paper_key();
        assert_ne!(a.get_isn(local, remote, now), b.get_isn(local, remote, now));
        assert_ne!(b.nonce(0), b.nonce(1));
        assert_eq!(b.nonce(7), b.nonce(7));
    }
}
