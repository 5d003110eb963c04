//! An echo server.
//!
//! Accepts a single client on the given port (default 8080) and answers each message with
//! `Echo: <message>` until the client sends a message starting with `quit` or closes. Raw sockets
//! require root privileges.
//!
//! * `sudo tcp-lite-server 8080 -v`
use std::io::stdout;
use std::process;

use tcp_lite::nic::sys::RawIp;
use tcp_lite::tcp::Engine;
use tcp_lite_demo::{config, logger};

fn main() {
    let config = config::Server::from_args();
    logger::init(config.verbose);

    println!("=== TCP Lite Server ===");
    println!("Port: {}\n", config.port);

    if !tcp_lite_demo::is_root() {
        eprintln!("Error: This program requires root privileges (raw sockets)");
        eprintln!("Please run with: sudo tcp-lite-server [port]");
        process::exit(1);
    }

    let mut engine = Engine::new(RawIp);
    let listener = match tcp_lite_demo::listen(&mut engine, config.port) {
        Ok(listener) => listener,
        Err(err) => {
            eprintln!("Opening the listener failed: {}", err);
            process::exit(1);
        },
    };
    println!("Socket bound to port {}", config.port);

    let out = stdout();
    let mut out = out.lock();
    if let Err(err) = tcp_lite_demo::serve(&mut engine, listener, &mut out) {
        eprintln!("Server failed: {}", err);
        process::exit(1);
    }
}
