//! Tests for the TCP client against real loopback peers.

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use horizon_tether_net::TcpError;
use horizon_tether_net::tcp::{
    InboundEvent, PollDriver, TcpClient, TcpClientConfig, TcpConnectionState, TcpSocketConfig,
};
use parking_lot::Mutex;
use socket2::SockRef;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn listener() -> (TcpListener, u16) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    (listener, port)
}

fn unused_port() -> u16 {
    listener().1
}

fn quick_config(port: u16) -> TcpClientConfig {
    TcpClientConfig::new("127.0.0.1", port)
        .max_reconnect_attempts(20)
        .retry_interval(Duration::from_millis(50))
}

/// Call `step` until it returns true or five seconds pass.
fn wait_for(mut step: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if step() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    false
}

/// Accept one connection and echo everything back until the client goes away.
fn spawn_echo_server(listener: TcpListener) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        let mut buffer = [0u8; 256];
        loop {
            match stream.read(&mut buffer) {
                Ok(0) | Err(_) => break,
                Ok(n) => {
                    if stream.write_all(&buffer[..n]).is_err() {
                        break;
                    }
                }
            }
        }
    })
}

#[test]
fn test_client_initial_state() {
    let client = TcpClient::new(TcpClientConfig::new("127.0.0.1", 8080));

    assert_eq!(client.state(), TcpConnectionState::Disconnected);
    assert!(!client.is_connected());
    assert_eq!(client.host(), "127.0.0.1");
    assert_eq!(client.port(), 8080);
    assert_eq!(client.address(), "127.0.0.1:8080");
}

#[test]
fn test_client_config_builder() {
    let config = TcpClientConfig::new("localhost", 8080)
        .auto_reconnect(false)
        .max_reconnect_attempts(7)
        .retry_interval(Duration::from_millis(250))
        .receive_buffer_size(2048)
        .strict_receive_errors(true)
        .socket_config(
            TcpSocketConfig::new()
                .no_delay(true)
                .keep_alive(Duration::from_secs(30)),
        );

    assert_eq!(config.address(), "localhost:8080");
    assert!(!config.auto_reconnect);
    assert_eq!(config.attempt_budget(), 7);
    assert_eq!(config.receive_buffer_size, 2048);
    assert!(config.strict_receive_errors);
    assert!(config.socket.no_delay);
    assert_eq!(config.socket.keep_alive, Some(Duration::from_secs(30)));
}

#[test]
fn test_connect_rejects_second_connect() {
    init_tracing();
    let (_listener, port) = listener();
    let client = TcpClient::new(quick_config(port).no_delay(true));

    client.connect().unwrap();
    assert!(client.is_connected());
    assert_eq!(client.peer_addr().map(|addr| addr.port()), Some(port));

    let second = client.connect_to("127.0.0.1", port);
    assert!(matches!(second, Err(TcpError::AlreadyConnected { .. })));
    assert!(client.is_connected());

    let stats = client.stats();
    assert_eq!(stats.connect_calls, 1);
    assert_eq!(stats.connections_established, 1);
}

#[test]
fn test_close_twice() {
    let (_listener, port) = listener();
    let client = TcpClient::new(quick_config(port));
    client.connect().unwrap();

    client.close();
    client.close();

    assert_eq!(client.state(), TcpConnectionState::Disconnected);
    assert_eq!(client.peer_addr(), None);
    assert!(matches!(client.send(b"late"), Err(TcpError::NotConnected)));
    assert!(client.poll(64).unwrap().is_empty());
}

#[test]
fn test_reconnect_after_close() {
    let (_listener, port) = listener();
    let client = TcpClient::new(quick_config(port));

    client.connect().unwrap();
    client.close();
    client.connect().unwrap();

    assert!(client.is_connected());
    assert_eq!(client.stats().connections_established, 2);
}

#[test]
fn test_round_trip_preserves_order() {
    init_tracing();
    let (listener, port) = listener();
    let server = spawn_echo_server(listener);
    let client = TcpClient::new(quick_config(port));

    let received = Arc::new(Mutex::new(Vec::new()));
    let sink = received.clone();
    client
        .data_received
        .connect(move |data| sink.lock().extend_from_slice(data));

    client.connect().unwrap();
    client.send(b"hello").unwrap();
    client.send(b"world").unwrap();

    assert!(wait_for(|| {
        client.tick().unwrap();
        received.lock().len() >= 10
    }));
    assert_eq!(received.lock().as_slice(), b"helloworld");

    let stats = client.stats();
    assert_eq!(stats.bytes_sent, 10);
    assert_eq!(stats.bytes_received, 10);

    client.close();
    server.join().unwrap();
}

#[test]
fn test_tick_reads_at_most_buffer_size() {
    let (listener, port) = listener();
    let client = TcpClient::new(quick_config(port).receive_buffer_size(4));
    client.connect().unwrap();

    let (mut server, _) = listener.accept().unwrap();
    server.write_all(b"0123456789").unwrap();

    let chunks = Arc::new(Mutex::new(Vec::new()));
    let sink = chunks.clone();
    client
        .data_received
        .connect(move |data| sink.lock().push(data.clone()));

    assert!(wait_for(|| {
        client.tick().unwrap();
        chunks.lock().iter().map(Vec::len).sum::<usize>() >= 10
    }));

    let chunks = chunks.lock();
    assert!(chunks.len() >= 3);
    assert!(chunks.iter().all(|chunk| !chunk.is_empty() && chunk.len() <= 4));
    assert_eq!(chunks.concat(), b"0123456789");
}

#[test]
fn test_poll_zero_bytes_does_not_consume() {
    let (listener, port) = listener();
    let client = TcpClient::new(quick_config(port));
    client.connect().unwrap();

    let (mut server, _) = listener.accept().unwrap();
    server.write_all(b"abc").unwrap();
    thread::sleep(Duration::from_millis(50));

    assert!(client.poll(0).unwrap().is_empty());

    let mut data = Vec::new();
    assert!(wait_for(|| {
        data = client.poll(16).unwrap();
        !data.is_empty()
    }));
    assert_eq!(data, b"abc");
}

#[test]
fn test_remote_close_emits_single_disconnect() {
    init_tracing();
    let (listener, port) = listener();
    let client = TcpClient::new(quick_config(port).auto_reconnect(false));
    let events = client.subscribe();

    let disconnects = Arc::new(AtomicUsize::new(0));
    let counter = disconnects.clone();
    client.server_disconnected.connect(move |(host, remote_port)| {
        assert_eq!(host, "127.0.0.1");
        assert_eq!(*remote_port, port);
        counter.fetch_add(1, Ordering::SeqCst);
    });

    client.connect().unwrap();
    let (server, _) = listener.accept().unwrap();
    drop(server);

    assert!(wait_for(|| {
        client.tick().unwrap();
        client.state() == TcpConnectionState::Disconnected
    }));
    for _ in 0..5 {
        assert_eq!(client.tick().unwrap(), 0);
    }

    assert_eq!(disconnects.load(Ordering::SeqCst), 1);
    assert_eq!(
        events.drain(),
        vec![InboundEvent::RemoteDisconnected {
            host: "127.0.0.1".into(),
            port,
        }]
    );

    let stats = client.stats();
    assert_eq!(stats.remote_disconnects, 1);
    assert_eq!(stats.connect_calls, 1);
    assert!(!client.has_reconnect_hook());
}

/// Accept one connection and reset it, so the client's next read fails.
fn reset_peer(listener: &TcpListener) {
    let (server, _) = listener.accept().unwrap();
    SockRef::from(&server).set_linger(Some(Duration::ZERO)).unwrap();
    drop(server);
}

#[test]
fn test_receive_error_keeps_connection() {
    init_tracing();
    let (listener, port) = listener();
    let client = TcpClient::new(quick_config(port).auto_reconnect(false));
    let events = client.subscribe();
    client.connect().unwrap();

    reset_peer(&listener);

    let mut failure = None;
    assert!(wait_for(|| match client.poll(64) {
        Err(err) => {
            failure = Some(err);
            true
        }
        Ok(data) => {
            assert!(data.is_empty());
            false
        }
    }));

    match failure {
        Some(TcpError::Receive(err)) => {
            assert_eq!(err.kind(), std::io::ErrorKind::ConnectionReset);
        }
        other => panic!("expected a receive error, got {other:?}"),
    }
    assert!(client.is_connected());
    assert_eq!(client.stats().remote_disconnects, 0);
    assert!(events.is_empty());
}

#[test]
fn test_strict_receive_error_is_treated_as_close() {
    init_tracing();
    let (listener, port) = listener();
    let client = TcpClient::new(
        quick_config(port)
            .auto_reconnect(false)
            .strict_receive_errors(true),
    );
    let events = client.subscribe();
    client.connect().unwrap();

    reset_peer(&listener);

    assert!(wait_for(|| {
        assert!(client.poll(64).unwrap().is_empty());
        client.state() == TcpConnectionState::Disconnected
    }));

    assert_eq!(client.stats().remote_disconnects, 1);
    assert_eq!(
        events.drain(),
        vec![InboundEvent::RemoteDisconnected {
            host: "127.0.0.1".into(),
            port,
        }]
    );
}

#[test]
fn test_auto_reconnect_after_remote_close() {
    init_tracing();
    let (listener, port) = listener();
    let (kept_tx, kept_rx) = crossbeam_channel::unbounded::<TcpStream>();
    let server = thread::spawn(move || {
        let (first, _) = listener.accept().unwrap();
        drop(first);
        let (second, _) = listener.accept().unwrap();
        kept_tx.send(second).unwrap();
    });

    let client = TcpClient::new(quick_config(port));
    client.connect().unwrap();
    assert!(client.has_reconnect_hook());

    let disconnects = Arc::new(AtomicUsize::new(0));
    let counter = disconnects.clone();
    client.server_disconnected.connect(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    assert!(wait_for(|| {
        client.tick().unwrap();
        disconnects.load(Ordering::SeqCst) > 0
    }));

    assert!(client.is_connected());
    assert_eq!(disconnects.load(Ordering::SeqCst), 1);

    let stats = client.stats();
    assert_eq!(stats.connect_calls, 2);
    assert_eq!(stats.connections_established, 2);
    assert!(client.has_reconnect_hook());

    server.join().unwrap();
    let _second = kept_rx.recv_timeout(Duration::from_secs(5)).unwrap();
}

#[test]
fn test_unreachable_port_spends_budget() {
    let port = unused_port();
    let interval = Duration::from_millis(30);
    let client = TcpClient::new(
        TcpClientConfig::new("127.0.0.1", port)
            .max_reconnect_attempts(3)
            .retry_interval(interval),
    );

    let started = Instant::now();
    let result = client.connect();

    match result {
        Err(TcpError::ConnectFailed { attempts, .. }) => assert_eq!(attempts, 3),
        other => panic!("expected ConnectFailed, got {other:?}"),
    }
    assert!(started.elapsed() >= interval * 2);
    assert_eq!(client.state(), TcpConnectionState::Disconnected);
    assert_eq!(client.stats().connect_attempts, 3);
    assert_eq!(client.stats().connections_established, 0);
}

#[test]
fn test_zero_attempts_still_tries_once() {
    let port = unused_port();
    let client = TcpClient::new(
        TcpClientConfig::new("127.0.0.1", port)
            .max_reconnect_attempts(0)
            .retry_interval(Duration::from_millis(30)),
    );

    let result = client.connect();

    assert!(matches!(
        result,
        Err(TcpError::ConnectFailed { attempts: 1, .. })
    ));
    assert_eq!(client.stats().connect_attempts, 1);
}

#[test]
fn test_unresolvable_host_consumes_no_attempts() {
    let client = TcpClient::new(quick_config(7000));

    let result = client.connect_to("host.invalid", 7000);

    assert!(matches!(result, Err(TcpError::AddressResolution { .. })));
    assert!(result.unwrap_err().is_setup_failure());
    assert_eq!(client.stats().connect_attempts, 0);
    assert_eq!(client.state(), TcpConnectionState::Disconnected);
    assert_eq!(client.address(), "host.invalid:7000");
}

#[test]
fn test_rejected_target_keeps_configured_one() {
    let (_listener, port) = listener();
    let client = TcpClient::new(quick_config(port));

    let result = client.connect_to("127.0.0.1", 0);
    assert!(matches!(result, Err(TcpError::InvalidConfig(_))));
    assert_eq!(client.port(), port);

    client.connect().unwrap();
    assert!(client.is_connected());
}

#[test]
fn test_config_locked_while_connected() {
    let (_listener, port) = listener();
    let client = TcpClient::new(quick_config(port));
    client.connect().unwrap();

    let result = client.set_receive_buffer_size(4096);
    assert!(matches!(
        result,
        Err(TcpError::ConfigLocked {
            state: TcpConnectionState::Connected
        })
    ));
    assert!(client.set_config(quick_config(port)).is_err());

    client.close();
    client.set_receive_buffer_size(4096).unwrap();
    assert_eq!(client.config().receive_buffer_size, 4096);
}

#[test]
fn test_disabling_auto_reconnect_removes_hook() {
    let (_listener, port) = listener();
    let client = TcpClient::new(quick_config(port));
    client.connect().unwrap();
    assert!(client.has_reconnect_hook());
    assert_eq!(client.server_disconnected.connection_count(), 1);

    client.close();
    client.connect().unwrap();
    assert_eq!(client.server_disconnected.connection_count(), 1);

    client.close();
    client.set_auto_reconnect(false).unwrap();
    assert!(!client.has_reconnect_hook());
    assert_eq!(client.server_disconnected.connection_count(), 0);
}

#[test]
fn test_slot_can_call_back_into_client() {
    let (listener, port) = listener();
    let client = TcpClient::new(quick_config(port));
    client.connect().unwrap();

    let weak = Arc::downgrade(&client);
    client.data_received.connect(move |_| {
        if let Some(client) = weak.upgrade() {
            client.close();
        }
    });

    let (mut server, _) = listener.accept().unwrap();
    server.write_all(b"bye").unwrap();

    assert!(wait_for(|| {
        client.tick().unwrap();
        client.state() == TcpConnectionState::Disconnected
    }));
}

#[test]
fn test_spawn_connect() {
    let (_listener, port) = listener();
    let client = TcpClient::new(quick_config(port));

    let handle = client.spawn_connect().unwrap();
    handle.join().unwrap().unwrap();

    assert!(client.is_connected());
}

#[test]
fn test_poll_driver_delivers_data() {
    init_tracing();
    let (listener, port) = listener();
    let client = TcpClient::new(quick_config(port));
    let events = client.subscribe();
    client.connect().unwrap();

    let driver = PollDriver::spawn(client.clone(), Duration::from_millis(5)).unwrap();
    let (mut server, _) = listener.accept().unwrap();
    server.write_all(b"ping").unwrap();

    let event = events.next_timeout(Duration::from_secs(5));
    assert_eq!(event, Some(InboundEvent::DataReceived(b"ping".to_vec())));

    assert!(driver.stop_and_join());
}

#[test]
fn test_config_from_toml_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
host = "127.0.0.1"
port = 7100
auto_reconnect = false
max_reconnect_attempts = 4
retry_interval_ms = 75
receive_buffer_size = 512

[socket]
no_delay = true
"#
    )
    .unwrap();

    let config = TcpClientConfig::from_toml_file(file.path()).unwrap();
    assert_eq!(config.address(), "127.0.0.1:7100");
    assert!(!config.auto_reconnect);
    assert_eq!(config.max_reconnect_attempts, 4);
    assert_eq!(config.retry_interval, Duration::from_millis(75));
    assert_eq!(config.receive_buffer_size, 512);
    assert!(config.socket.no_delay);

    let client = TcpClient::new(config);
    assert_eq!(client.port(), 7100);
}

#[test]
fn test_config_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let result = TcpClientConfig::from_toml_file(dir.path().join("missing.toml"));
    assert!(matches!(result, Err(TcpError::ConfigIo { .. })));
}
