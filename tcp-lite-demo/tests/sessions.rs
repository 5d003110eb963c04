use std::thread;

use tcp_lite::nic::Loopback;
use tcp_lite::tcp::{Config, Engine};
use tcp_lite::time::Duration;
use tcp_lite::wire::{IpEndpoint, Ipv4Address};
use tcp_lite_demo::MESSAGES;

const SERVER: Ipv4Address = Ipv4Address::new(192, 168, 1, 100);
const CLIENT: Ipv4Address = Ipv4Address::new(192, 168, 1, 7);

fn config() -> Config {
    Config {
        handshake_timeout: Duration::from_secs(2),
        ack_timeout: Duration::from_millis(500),
        fin_timeout: Duration::from_millis(500),
        receive_timeout: Duration::from_secs(5),
        accept_timeout: Some(Duration::from_secs(5)),
        poll_interval: Duration::from_millis(10),
        ..Config::default()
    }
}

#[test]
fn echo_session() {
    let hub = Loopback::new();
    let mut server = Engine::with_config(hub.host(SERVER), config());
    let mut client = Engine::with_config(hub.host(CLIENT), config());

    let listener = tcp_lite_demo::listen(&mut server, 9000).unwrap();

    let (served, echoes, server_log, client_log) = thread::scope(|s| {
        let server = s.spawn(|| {
            let mut log = Vec::new();
            let served = tcp_lite_demo::serve(&mut server, listener, &mut log).unwrap();
            (served, log)
        });

        let mut log = Vec::new();
        let echoes = tcp_lite_demo::converse(
            &mut client,
            12345,
            IpEndpoint::new(SERVER, 9000),
            &MESSAGES,
            Duration::from_millis(10),
            &mut log).unwrap();

        let (served, server_log) = server.join().unwrap();
        (served, echoes, server_log, log)
    });

    assert_eq!(served, MESSAGES);
    let expected: Vec<_> = MESSAGES.iter().map(|message| format!("Echo: {}", message)).collect();
    assert_eq!(echoes, expected);

    let server_log = String::from_utf8(server_log).unwrap();
    assert!(server_log.contains("Client: 192.168.1.7:12345"));
    assert!(server_log.contains("Received 4 bytes: quit"));
    assert!(server_log.contains("Quit command received"));
    assert!(server_log.ends_with("Server shutdown complete\n"));

    let client_log = String::from_utf8(client_log).unwrap();
    assert!(client_log.contains("Received: Echo: Hello, Server!"));
    assert!(client_log.ends_with("Client shutdown complete\n"));

    assert_eq!(server.open_sockets(), 0);
    assert_eq!(client.open_sockets(), 0);
}

#[test]
fn client_stops_without_server() {
    let hub = Loopback::new();
    let mut client = Engine::with_config(hub.host(CLIENT), Config {
        handshake_timeout: Duration::from_millis(100),
        ..config()
    });

    let mut log = Vec::new();
    let result = tcp_lite_demo::converse(
        &mut client,
        12345,
        IpEndpoint::new(SERVER, 9000),
        &MESSAGES,
        Duration::from_millis(0),
        &mut log);

    match result {
        Err(tcp_lite_demo::Error::Tcp(tcp_lite::tcp::Error::HandshakeTimeout)) => (),
        other => panic!("unexpected result {:?}", other),
    }
    assert_eq!(client.open_sockets(), 0);
}
