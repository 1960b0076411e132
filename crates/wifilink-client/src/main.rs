//! WifiLink demo entry point.
//!
//! Wires the orchestrator to a scripted mock platform station and a loopback
//! TCP echo server, then runs one full session: associate, connect, exchange
//! a line, close on ctrl-c.
//!
//! # Architecture
//!
//! ```text
//! main()
//!  └─ MockStation           -- scripted platform: scan shows "wifilink-demo",
//!  │                           reconnect completes the association
//!  └─ loopback TcpListener  -- greets each connection, echoes every line
//!  └─ LinkOrchestrator::spawn()
//!  └─ event print loop
//!       ├─ Connected     -> write one greeting line
//!       ├─ DataReceived  -> print payload
//!       └─ Disconnected / Error -> exit
//! ```
//!
//! # Platform station
//!
//! The `MockStation` used here records all platform calls rather than
//! driving a real radio.  In a production build it is replaced by one
//! implementation of the `WifiStation` trait per target platform.

use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use wifilink_client::application::session::{ConnectRequest, LinkOrchestrator};
use wifilink_client::config;
use wifilink_client::infrastructure::platform::mock::{AssociationScript, MockStation};
use wifilink_core::LinkEvent;

const DEMO_SSID: &str = "wifilink-demo";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = config::load_config().unwrap_or_else(|e| {
        eprintln!("config load failed ({e}); using defaults");
        config::LinkConfig::default()
    });

    // Initialise structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(cfg.log_level.clone())),
        )
        .init();

    info!("WifiLink demo starting");

    // ── Loopback echo server ──────────────────────────────────────────────────
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let server_addr = listener.local_addr()?;
    tokio::spawn(async move {
        loop {
            let Ok((mut stream, peer)) = listener.accept().await else {
                break;
            };
            info!(%peer, "demo server: client connected");
            tokio::spawn(async move {
                if stream.write_all(b"hello from wifilink demo\n").await.is_err() {
                    return;
                }
                let (read_half, mut write_half) = stream.split();
                let mut lines = BufReader::new(read_half).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    let reply = format!("echo: {line}\n");
                    if write_half.write_all(reply.as_bytes()).await.is_err() {
                        break;
                    }
                }
            });
        }
    });

    // ── Scripted platform station ─────────────────────────────────────────────
    // In production: replace MockStation with a real WifiStation backend.
    let station = Arc::new(
        MockStation::new()
            .with_network(DEMO_SSID, "[WPA2-PSK-CCMP][ESS]", -45)
            .with_script(AssociationScript::ConnectTo(DEMO_SSID.to_string())),
    );

    // ── Orchestrator ──────────────────────────────────────────────────────────
    let (handle, mut events, _scan_events) = LinkOrchestrator::spawn(station, &cfg);

    let request = ConnectRequest::new(DEMO_SSID, server_addr.ip().to_string(), server_addr.port())
        .with_secret("demo-secret-123")
        .with_max_retries(cfg.connect.max_retries)
        .with_timeout(std::time::Duration::from_secs(cfg.connect.timeout_secs));
    handle.connect(request).await?;

    // ── Ctrl-C handler ────────────────────────────────────────────────────────
    let close_handle = handle.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown signal received");
            let _ = close_handle.close().await;
        }
    });

    // ── Event loop ────────────────────────────────────────────────────────────
    while let Some(event) = events.recv().await {
        match event {
            LinkEvent::WifiConnecting(ssid) => info!("associating with {ssid}"),
            LinkEvent::SocketConnecting { host, port } => {
                info!("connecting socket to {host}:{port}");
            }
            LinkEvent::Connected { ssid, host, port } => {
                info!("link up: {ssid} -> {host}:{port}");
                handle.write("ping from the demo\n").await?;
            }
            LinkEvent::DataReceived { text, .. } => {
                info!("received: {}", text.trim_end());
            }
            LinkEvent::Disconnected => {
                info!("link closed");
                break;
            }
            LinkEvent::Error(kind) => {
                error!("link failed: {kind}");
                break;
            }
        }
    }

    info!("WifiLink demo stopped");
    Ok(())
}
