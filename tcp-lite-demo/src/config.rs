use std::net;
use structopt::StructOpt;

/// Echo every message of a single client.
#[derive(Clone, Debug, StructOpt)]
#[structopt(name = "tcp-lite-server")]
pub struct Server {
    /// The port to listen on.
    #[structopt(default_value = "8080")]
    pub port: u16,

    /// Log more, repeat for even more.
    #[structopt(short = "v", parse(from_occurrences))]
    pub verbose: u64,
}

/// Send a fixed script of messages and print the echoes.
#[derive(Clone, Debug, StructOpt)]
#[structopt(name = "tcp-lite-client")]
pub struct Client {
    /// The address of the server.
    #[structopt(default_value = "127.0.0.1")]
    pub server: net::Ipv4Addr,

    /// The port of the server.
    #[structopt(default_value = "8080")]
    pub port: u16,

    /// The local port to send from.
    #[structopt(long = "local-port", default_value = "12345")]
    pub local_port: u16,

    /// Milliseconds to wait between two messages.
    #[structopt(long = "pause", default_value = "500")]
    pub pause_ms: u64,

    /// Log more, repeat for even more.
    #[structopt(short = "v", parse(from_occurrences))]
    pub verbose: u64,
}

impl Server {
    pub fn from_args() -> Self {
        StructOpt::from_args()
    }
}

impl Client {
    pub fn from_args() -> Self {
        StructOpt::from_args()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_defaults() {
        let config = Server::from_iter(&["tcp-lite-server"]);
        assert_eq!(config.port, 8080);
        assert_eq!(config.verbose, 0);

        let config = Server::from_iter(&["tcp-lite-server", "-vv", "9000"]);
        assert_eq!(config.port, 9000);
        assert_eq!(config.verbose, 2);
    }

    #[test]
    fn client_defaults() {
        let config = Client::from_iter(&["tcp-lite-client"]);
        assert_eq!(config.server, net::Ipv4Addr::new(127, 0, 0, 1));
        assert_eq!(config.port, 8080);
        assert_eq!(config.local_port, 12345);
        assert_eq!(config.pause_ms, 500);

        let config = Client::from_iter(&["tcp-lite-client", "192.168.1.100", "9000"]);
        assert_eq!(config.server, net::Ipv4Addr::new(192, 168, 1, 100));
        assert_eq!(config.port, 9000);
    }
}
