use crate::time::Duration;
use crate::wire::{Checksum, IPV4_MAX_PAYLOAD_LEN, TCP_HEADER_LEN};

/// Limits, timeouts and header constants of an [`Engine`].
///
/// The defaults are those of a classic raw-socket TCP: 64 connections, a 5 second handshake, 2
/// second waits for acknowledgments and FINs, 10 seconds for data and an unbounded `accept`.
///
/// [`Engine`]: struct.Engine.html
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Config {
    /// Maximum number of simultaneously open control blocks.
    pub max_connections: usize,

    /// How long `connect` waits for the SYN+ACK and `accept` for the final ACK.
    pub handshake_timeout: Duration,

    /// How long `send` waits for an acknowledgment after each segment.
    pub ack_timeout: Duration,

    /// How long each teardown step in `close` waits.
    pub fin_timeout: Duration,

    /// How long `recv` waits for a segment.
    pub receive_timeout: Duration,

    /// How long `accept` waits for a SYN, forever on `None`.
    pub accept_timeout: Option<Duration>,

    /// The longest single wait on a transport.
    ///
    /// Cancellation is noticed between two waits, so this is the latency of [`Cancel`].
    ///
    /// [`Cancel`]: struct.Cancel.html
    pub poll_interval: Duration,

    /// Maximum segment size, the largest payload per segment.
    ///
    /// Values that do not fit a datagram are lowered to the largest one that does, see
    /// [`segment_len`].
    ///
    /// [`segment_len`]: #method.segment_len
    pub mss: usize,

    /// The receive window advertised in every segment.
    pub window: u16,

    /// Time to live of outgoing datagrams.
    pub hop_limit: u8,

    /// Whether checksums of outgoing segments are filled and of incoming ones verified.
    pub checksum: Checksum,
}

impl Config {
    /// The configuration with all defaults.
    pub const DEFAULT: Config = Config {
        max_connections: 64,
        handshake_timeout: Duration::from_secs(5),
        ack_timeout: Duration::from_secs(2),
        fin_timeout: Duration::from_secs(2),
        receive_timeout: Duration::from_secs(10),
        accept_timeout: None,
        poll_interval: Duration::from_millis(100),
        mss: 1460,
        window: 65535,
        hop_limit: 64,
        checksum: Checksum::Manual,
    };
}

impl Config {
    /// The payload length `send` cuts data into.
    ///
    /// This is `mss`, but at least one octet and at most what fits behind the IPv4 and TCP
    /// headers of one datagram.
    pub fn segment_len(&self) -> usize {
        self.mss.max(1).min(IPV4_MAX_PAYLOAD_LEN - TCP_HEADER_LEN)
    }
}

impl Default for Config {
    fn default() -> Self {
        Config::DEFAULT
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn segment_len_fits_datagram() {
        assert_eq!(Config::DEFAULT.segment_len(), 1460);
        assert_eq!(Config { mss: 0, ..Config::DEFAULT }.segment_len(), 1);
        assert_eq!(Config { mss: 65495, ..Config::DEFAULT }.segment_len(), 65495);
        assert_eq!(Config { mss: 65500, ..Config::DEFAULT }.segment_len(), 65495);
        assert_eq!(Config { mss: usize::max_value(), ..Config::DEFAULT }.segment_len(), 65495);
    }
}
