//! Connects to a TCP echo server, sends a few lines and prints the replies.
//!
//! Run an echo server first, for example `ncat -l 7000 -k -c 'cat'`, then:
//!
//! ```text
//! RUST_LOG=horizon_tether_net=debug cargo run -p horizon-tether-net --example echo_client -- 127.0.0.1 7000
//! ```
//!
//! Pass a path to a TOML file instead of host and port to load the whole
//! client configuration from it.

use std::time::Duration;

use horizon_tether_net::tcp::{InboundEvent, PollDriver, TcpClient, TcpClientConfig};
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let config = match args.as_slice() {
        [path] => TcpClientConfig::from_toml_file(path)?,
        [host, port] => TcpClientConfig::new(host.as_str(), port.parse()?)
            .max_reconnect_attempts(10)
            .retry_interval(Duration::from_millis(500)),
        _ => TcpClientConfig::new("127.0.0.1", 7000).max_reconnect_attempts(10),
    };

    let client = TcpClient::new(config);
    client.data_received.connect(|data| {
        println!("<- {}", String::from_utf8_lossy(data).trim_end());
    });
    let events = client.subscribe();

    client.connect()?;
    println!("connected to {}", client.address());

    let driver = PollDriver::spawn(client.clone(), Duration::from_millis(10))?;

    for line in ["hello", "from", "horizon tether"] {
        println!("-> {line}");
        client.send(format!("{line}\n").as_bytes())?;
        std::thread::sleep(Duration::from_millis(200));
    }

    while let Some(event) = events.next_timeout(Duration::from_millis(500)) {
        if let InboundEvent::RemoteDisconnected { host, port } = event {
            println!("server {host}:{port} closed the connection");
        }
    }

    driver.stop_and_join();
    client.close();
    println!("{:?}", client.stats());
    Ok(())
}
