//! Two engines exchanging an echo conversation over the loopback hub.
use std::thread;

use tcp_lite::nic::Loopback;
use tcp_lite::tcp::{Config, Engine, Error, State};
use tcp_lite::time::Duration;
use tcp_lite::wire::{IpEndpoint, Ipv4Address};

const SERVER: Ipv4Address = Ipv4Address::new(10, 0, 0, 1);
const CLIENT: Ipv4Address = Ipv4Address::new(10, 0, 0, 2);

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
fn hello_quit() {
    let hub = Loopback::new();
    let mut server = Engine::with_config(hub.host(SERVER), config());
    let mut client = Engine::with_config(hub.host(CLIENT), config());

    let listener = server.socket().unwrap();
    server.bind(listener, IpEndpoint::from(8080u16)).unwrap();
    server.listen(listener, 5).unwrap();

    let (received, echoes) = thread::scope(|s| {
        let server_side = s.spawn(|| {
            let (connection, peer) = server.accept(listener).unwrap();
            assert_eq!(peer, IpEndpoint::new(CLIENT, 12345));
            assert_eq!(server.state(connection), Ok(State::Established));

            let mut received = Vec::new();
            let mut buffer = [0; 1024];
            loop {
                let len = server.recv(connection, &mut buffer).unwrap();
                if len == 0 {
                    break;
                }

                let message = buffer[..len].to_vec();
                let mut echo = b"Echo: ".to_vec();
                echo.extend_from_slice(&message);
                assert_eq!(server.send(connection, &echo), Ok(echo.len()));

                let quit = message.starts_with(b"quit");
                received.push(message);
                if quit {
                    break;
                }
            }

            server.close(connection).unwrap();
            server.close(listener).unwrap();
            assert_eq!(server.state(connection), Err(Error::InvalidHandle));
            assert_eq!(server.state(listener), Err(Error::InvalidHandle));
            received
        });

        let socket = client.socket().unwrap();
        client.bind(socket, IpEndpoint::new(Ipv4Address::UNSPECIFIED, 12345)).unwrap();
        client.connect(socket, IpEndpoint::new(SERVER, 8080)).unwrap();
        assert_eq!(client.local_endpoint(socket), Ok(IpEndpoint::new(CLIENT, 12345)));

        let mut echoes = Vec::new();
        let mut buffer = [0; 1024];
        for message in [&b"hello"[..], &b"quit"[..]].iter() {
            assert_eq!(client.send(socket, message), Ok(message.len()));
            let len = client.recv(socket, &mut buffer).unwrap();
            echoes.push(buffer[..len].to_vec());
        }

        client.close(socket).unwrap();
        assert_eq!(client.state(socket), Err(Error::InvalidHandle));
        assert_eq!(client.close(socket), Err(Error::InvalidHandle));

        (server_side.join().unwrap(), echoes)
    });

    assert_eq!(received, vec![b"hello".to_vec(), b"quit".to_vec()]);
    assert_eq!(echoes, vec![b"Echo: hello".to_vec(), b"Echo: quit".to_vec()]);
    assert_eq!(server.open_sockets(), 0);
    assert_eq!(client.open_sockets(), 0);
}
