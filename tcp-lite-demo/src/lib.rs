//! The sessions of the echo demo.
//!
//! Both sessions are generic over the transport device so they can run on raw sockets as well
//! as on the in-process loopback hub. All console output goes to the given writer.
use std::{fmt, io, thread};
use std::io::Write;

use tcp_lite::nic::Device;
use tcp_lite::tcp::{self, Engine, SocketHandle};
use tcp_lite::time::Duration;
use tcp_lite::wire::{IpEndpoint, Ipv4Address};

pub mod config;
pub mod logger;

/// The messages the client sends, in order.
pub const MESSAGES: [&str; 4] = [
    "Hello, Server!",
    "This is TCP Lite",
    "A simple TCP implementation",
    "quit",
];

/// The backlog the server listens with.
pub const BACKLOG: usize = 5;

/// Bytes read per receive.
const BUFFER_LEN: usize = 1023;

/// Failure of a session.
#[derive(Debug)]
pub enum Error {
    /// The engine reported an error.
    Tcp(tcp::Error),
    /// Writing to the console failed.
    Io(io::Error),
}

/// Check the effective user id for root.
pub fn is_root() -> bool {
    unsafe { libc::geteuid() == 0 }
}

/// Open a socket listening on all addresses at `port`.
pub fn listen<D: Device>(engine: &mut Engine<D>, port: u16) -> Result<SocketHandle, tcp::Error> {
    let listener = engine.socket()?;
    let result = engine.bind(listener, IpEndpoint::new(Ipv4Address::UNSPECIFIED, port))
        .and_then(|()| engine.listen(listener, BACKLOG));
    match result {
        Ok(()) => Ok(listener),
        Err(err) => {
            let _ = engine.close(listener);
            Err(err)
        },
    }
}

/// Accept one client and echo its messages until it quits.
///
/// Returns the messages received. Both the client connection and the listener are closed when
/// this returns, also on error.
pub fn serve<D, W>(engine: &mut Engine<D>, listener: SocketHandle, out: &mut W)
    -> Result<Vec<String>, Error>
where
    D: Device,
    W: Write,
{
    let result = accept_and_echo(engine, listener, out);
    if let Err(err) = engine.close(listener) {
        log::warn!("closing listener failed: {}", err);
    }
    let messages = result?;
    writeln!(out, "Server shutdown complete")?;
    Ok(messages)
}

fn accept_and_echo<D, W>(engine: &mut Engine<D>, listener: SocketHandle, out: &mut W)
    -> Result<Vec<String>, Error>
where
    D: Device,
    W: Write,
{
    let (client, peer) = engine.accept(listener)?;
    writeln!(out, "\n=== Connection Established ===")?;
    writeln!(out, "Client: {}\n", peer)?;

    let result = echo(engine, client, out);
    writeln!(out, "\nClosing connections...")?;
    if let Err(err) = engine.close(client) {
        log::warn!("closing connection failed: {}", err);
    }
    result
}

fn echo<D, W>(engine: &mut Engine<D>, client: SocketHandle, out: &mut W)
    -> Result<Vec<String>, Error>
where
    D: Device,
    W: Write,
{
    let mut buffer = [0; BUFFER_LEN];
    let mut messages = Vec::new();

    loop {
        writeln!(out, "Waiting for data...")?;
        let received = engine.recv(client, &mut buffer)?;
        if received == 0 {
            writeln!(out, "Client closed connection")?;
            break;
        }

        let message = String::from_utf8_lossy(&buffer[..received]).into_owned();
        writeln!(out, "Received {} bytes: {}", received, message)?;

        writeln!(out, "Sending echo response...")?;
        let sent = engine.send(client, format!("Echo: {}", message).as_bytes())?;
        writeln!(out, "Sent {} bytes\n", sent)?;

        let quit = message.starts_with("quit");
        messages.push(message);
        if quit {
            writeln!(out, "Quit command received")?;
            break;
        }
    }

    Ok(messages)
}

/// Connect to `server` from `local_port`, send `messages` and collect the echoes.
///
/// Waits `pause` after each exchange. Stops early when the server closes the connection. The
/// socket is closed when this returns, also on error.
pub fn converse<D, W>(
    engine: &mut Engine<D>,
    local_port: u16,
    server: IpEndpoint,
    messages: &[&str],
    pause: Duration,
    out: &mut W,
) -> Result<Vec<String>, Error>
where
    D: Device,
    W: Write,
{
    let socket = engine.socket()?;
    let result = exchange(engine, socket, local_port, server, messages, pause, out);
    writeln!(out, "Closing connection...")?;
    if let Err(err) = engine.close(socket) {
        log::warn!("closing connection failed: {}", err);
    }
    let echoes = result?;
    writeln!(out, "Client shutdown complete")?;
    Ok(echoes)
}

fn exchange<D, W>(
    engine: &mut Engine<D>,
    socket: SocketHandle,
    local_port: u16,
    server: IpEndpoint,
    messages: &[&str],
    pause: Duration,
    out: &mut W,
) -> Result<Vec<String>, Error>
where
    D: Device,
    W: Write,
{
    engine.bind(socket, IpEndpoint::new(Ipv4Address::UNSPECIFIED, local_port))?;
    writeln!(out, "Socket bound to port {}", local_port)?;

    engine.connect(socket, server)?;
    writeln!(out, "\n=== Connected to Server ===\n")?;

    let mut buffer = [0; BUFFER_LEN];
    let mut echoes = Vec::new();
    for message in messages {
        writeln!(out, "Sending: {}", message)?;
        let sent = engine.send(socket, message.as_bytes())?;
        writeln!(out, "Sent {} bytes", sent)?;

        writeln!(out, "Waiting for response...")?;
        let received = engine.recv(socket, &mut buffer)?;
        if received == 0 {
            writeln!(out, "Server closed connection")?;
            break;
        }

        let echo = String::from_utf8_lossy(&buffer[..received]).into_owned();
        writeln!(out, "Received: {}\n", echo)?;
        echoes.push(echo);

        thread::sleep(pause);
    }

    Ok(echoes)
}

impl From<tcp::Error> for Error {
    fn from(err: tcp::Error) -> Self {
        Error::Tcp(err)
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::Io(err)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Tcp(err) => err.fmt(f),
            Error::Io(err) => err.fmt(f),
        }
    }
}

impl std::error::Error for Error {}
