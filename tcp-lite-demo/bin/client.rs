//! A scripted client for the echo server.
//!
//! Connects from local port 12345 and sends four fixed messages, the last one being `quit`,
//! printing each echo. Raw sockets require root privileges.
//!
//! * `sudo tcp-lite-client`: connect to 127.0.0.1:8080
//! * `sudo tcp-lite-client 192.168.1.100 9000`
use std::io::stdout;
use std::process;

use tcp_lite::nic::sys::RawIp;
use tcp_lite::tcp::Engine;
use tcp_lite::time::Duration;
use tcp_lite::wire::IpEndpoint;
use tcp_lite_demo::{config, logger, MESSAGES};

fn main() {
    let config = config::Client::from_args();
    logger::init(config.verbose);

    println!("=== TCP Lite Client ===");
    println!("Server: {}:{}\n", config.server, config.port);

    if !tcp_lite_demo::is_root() {
        eprintln!("Error: This program requires root privileges (raw sockets)");
        eprintln!("Usage: sudo tcp-lite-client [server_ip] [port]");
        eprintln!("Examples:");
        eprintln!("  sudo tcp-lite-client                        # Connect to 127.0.0.1:8080 (default)");
        eprintln!("  sudo tcp-lite-client 192.168.1.100          # Connect to 192.168.1.100:8080");
        eprintln!("  sudo tcp-lite-client 192.168.1.100 9000     # Connect to 192.168.1.100:9000");
        process::exit(1);
    }

    let mut engine = Engine::new(RawIp);
    let server = IpEndpoint::from((config.server, config.port));
    let pause = Duration::from_millis(config.pause_ms);

    let out = stdout();
    let mut out = out.lock();
    let result = tcp_lite_demo::converse(
        &mut engine,
        config.local_port,
        server,
        &MESSAGES,
        pause,
        &mut out);

    if let Err(err) = result {
        eprintln!("Client failed: {}", err);
        process::exit(1);
    }
}
