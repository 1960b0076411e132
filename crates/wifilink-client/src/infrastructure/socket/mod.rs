//! SocketManager: owns a single stream-socket lifecycle.
//!
//! Architecture:
//! - `open` connects asynchronously and, on success, splits the stream: the
//!   read half is owned by a dedicated read-loop task, the write half (plus
//!   the peer address and the read-stop signal) lives in one
//!   `Arc<Mutex<Option<Channel>>>` — the single owner reference, swapped
//!   atomically on teardown so a write in progress can never observe a
//!   half-closed channel.
//! - `write` runs on its own spawned worker: the caller awaits completion,
//!   the read loop is never blocked by a write.
//! - Received bytes are delivered together with their UTF-8 decoding.
//!
//! This component never reconnects on its own; reconnection policy lives in
//! the orchestrator.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{tcp::OwnedReadHalf, tcp::OwnedWriteHalf, TcpStream};
use tokio::sync::{mpsc, watch, Mutex};
use tracing::{debug, error, info, warn};

use wifilink_core::{SocketEndpoint, SocketErrorKind, SocketEvent};

/// Default read buffer size for the receive loop.
pub const READ_BUFFER_SIZE: usize = 10 * 1024;

/// Socket lifecycle state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SocketState {
    Idle,
    Connecting,
    Connected,
    Closed,
    Failed(SocketErrorKind),
}

/// The live channel: write half, remote address, and the read-loop stop
/// signal, owned together so teardown swaps all three out at once.
struct Channel {
    writer: OwnedWriteHalf,
    peer: SocketAddr,
    stop_read: watch::Sender<bool>,
}

/// The socket connection manager.
pub struct SocketManager {
    events: mpsc::Sender<SocketEvent>,
    channel: Arc<Mutex<Option<Channel>>>,
    opening: Arc<AtomicBool>,
    /// Bumped by every teardown.  A connect task snapshots it at `open` and
    /// refuses to store its stream when the count moved, so a connect that
    /// finishes after a teardown can never leave a stale channel behind.
    generation: Arc<AtomicU64>,
    state: Arc<std::sync::Mutex<SocketState>>,
    read_idle: Duration,
    read_buffer: usize,
}

impl SocketManager {
    /// Creates the manager and returns it together with the event receiver
    /// for the orchestrator.
    pub fn new(
        event_capacity: usize,
        read_idle: Duration,
        read_buffer: usize,
    ) -> (Self, mpsc::Receiver<SocketEvent>) {
        let (tx, rx) = mpsc::channel(event_capacity);
        let mgr = Self {
            events: tx,
            channel: Arc::new(Mutex::new(None)),
            opening: Arc::new(AtomicBool::new(false)),
            generation: Arc::new(AtomicU64::new(0)),
            state: Arc::new(std::sync::Mutex::new(SocketState::Idle)),
            read_idle,
            read_buffer,
        };
        (mgr, rx)
    }

    /// Opens a connection to `endpoint`.
    ///
    /// Idempotent short-circuit: when a connected channel already exists,
    /// `Connected` is re-reported with that channel's remote address and no
    /// new connection is attempted.  Guarded against concurrent opens.
    pub async fn open(&self, endpoint: SocketEndpoint) {
        {
            let guard = self.channel.lock().await;
            if let Some(channel) = guard.as_ref() {
                let peer = channel.peer;
                drop(guard);
                info!(%peer, "socket already connected; re-reporting");
                let _ = self.events.send(SocketEvent::Connected { peer }).await;
                return;
            }
        }

        if self
            .opening
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!(%endpoint, "socket open already in progress; ignored");
            return;
        }

        *self.state.lock().unwrap() = SocketState::Connecting;
        let _ = self
            .events
            .send(SocketEvent::Connecting(endpoint.clone()))
            .await;

        let events = self.events.clone();
        let channel = Arc::clone(&self.channel);
        let state = Arc::clone(&self.state);
        let opening = Arc::clone(&self.opening);
        let generation = Arc::clone(&self.generation);
        let generation_at_open = generation.load(Ordering::Acquire);
        let read_idle = self.read_idle;
        let read_buffer = self.read_buffer;

        tokio::spawn(async move {
            match TcpStream::connect((endpoint.host.as_str(), endpoint.port)).await {
                Ok(mut stream) => match stream.peer_addr() {
                    Ok(peer) => {
                        let mut guard = channel.lock().await;
                        if generation.load(Ordering::Acquire) != generation_at_open {
                            // A teardown happened while this connect was in
                            // flight; the session it belonged to is over.
                            drop(guard);
                            debug!(%peer, "connect finished after teardown; discarding");
                            let _ = stream.shutdown().await;
                            opening.store(false, Ordering::Release);
                            return;
                        }
                        let (read_half, write_half) = stream.into_split();
                        let (stop_tx, stop_rx) = watch::channel(false);
                        *guard = Some(Channel {
                            writer: write_half,
                            peer,
                            stop_read: stop_tx,
                        });
                        drop(guard);
                        *state.lock().unwrap() = SocketState::Connected;

                        tokio::spawn(Self::read_loop(
                            read_half,
                            stop_rx,
                            Arc::clone(&channel),
                            Arc::clone(&state),
                            events.clone(),
                            read_idle,
                            read_buffer,
                        ));

                        info!(%peer, "socket connected");
                        let _ = events.send(SocketEvent::Connected { peer }).await;
                    }
                    Err(e) => {
                        error!("peer address unavailable after connect: {e}");
                        *state.lock().unwrap() =
                            SocketState::Failed(SocketErrorKind::InternalError);
                        let _ = events
                            .send(SocketEvent::Error(SocketErrorKind::InternalError))
                            .await;
                    }
                },
                Err(e) => {
                    let kind = classify_connect_error(&e);
                    warn!(%endpoint, "socket connect failed: {e}");
                    *state.lock().unwrap() = SocketState::Failed(kind);
                    let _ = events.send(SocketEvent::Error(kind)).await;
                }
            }
            opening.store(false, Ordering::Release);
        });
    }

    /// The receive loop: reads until end-of-stream, teardown, or a stop
    /// signal, delivering each non-empty read as raw bytes plus UTF-8 text.
    async fn read_loop(
        mut reader: OwnedReadHalf,
        mut stop: watch::Receiver<bool>,
        channel: Arc<Mutex<Option<Channel>>>,
        state: Arc<std::sync::Mutex<SocketState>>,
        events: mpsc::Sender<SocketEvent>,
        idle: Duration,
        buffer_size: usize,
    ) {
        let mut buf = vec![0u8; buffer_size];
        loop {
            tokio::select! {
                // Any stop-signal activity (including sender drop on
                // teardown) ends the loop.
                _ = stop.changed() => break,
                result = reader.read(&mut buf) => match result {
                    Ok(0) => {
                        // End-of-stream: the remote closed the connection.
                        debug!("socket read returned end-of-stream");
                        channel.lock().await.take();
                        *state.lock().unwrap() =
                            SocketState::Failed(SocketErrorKind::ConnectionError);
                        let _ = events
                            .send(SocketEvent::Error(SocketErrorKind::ConnectionError))
                            .await;
                        break;
                    }
                    Ok(n) => {
                        let bytes = buf[..n].to_vec();
                        let text = String::from_utf8_lossy(&bytes).into_owned();
                        debug!(len = n, "socket data received");
                        if events
                            .send(SocketEvent::DataReceived { bytes, text })
                            .await
                            .is_err()
                        {
                            break;
                        }
                    }
                    Err(e) => {
                        error!("socket read failed: {e}");
                        channel.lock().await.take();
                        *state.lock().unwrap() =
                            SocketState::Failed(SocketErrorKind::InternalError);
                        let _ = events
                            .send(SocketEvent::Error(SocketErrorKind::InternalError))
                            .await;
                        break;
                    }
                },
            }

            // Idle pause between polls; bounded cancellation latency.
            tokio::select! {
                _ = stop.changed() => break,
                _ = tokio::time::sleep(idle) => {}
            }
        }
    }

    /// Writes `bytes` to the channel, looping until everything is flushed.
    ///
    /// Runs on its own worker; the caller awaits completion but the read
    /// loop is unaffected.  Returns the number of bytes written: `0` when no
    /// channel exists (`Error(NotConnected)` is emitted, no I/O attempted)
    /// or when the write fails (channel torn down, read loop stopped,
    /// `Error(ConnectionError)` emitted).
    pub async fn write(&self, bytes: Vec<u8>) -> usize {
        let channel = Arc::clone(&self.channel);
        let state = Arc::clone(&self.state);
        let events = self.events.clone();

        let worker = tokio::spawn(async move {
            let mut guard = channel.lock().await;
            match guard.take() {
                None => {
                    drop(guard);
                    let _ = events
                        .send(SocketEvent::Error(SocketErrorKind::NotConnected))
                        .await;
                    0
                }
                Some(mut ch) => {
                    let result = async {
                        ch.writer.write_all(&bytes).await?;
                        ch.writer.flush().await
                    }
                    .await;
                    match result {
                        Ok(()) => {
                            // Put the channel back for the next user.
                            *guard = Some(ch);
                            bytes.len()
                        }
                        Err(e) => {
                            error!("socket write failed: {e}");
                            let _ = ch.stop_read.send(true);
                            drop(ch);
                            *state.lock().unwrap() =
                                SocketState::Failed(SocketErrorKind::ConnectionError);
                            drop(guard);
                            let _ = events
                                .send(SocketEvent::Error(SocketErrorKind::ConnectionError))
                                .await;
                            0
                        }
                    }
                }
            }
        });

        worker.await.unwrap_or(0)
    }

    /// Closes and discards the channel, emitting `Closed`; when no channel
    /// exists, `Error(NotConnected)` is emitted instead (closing an
    /// already-closed socket is reported, not silently ignored).
    pub async fn close(&self) {
        // Invalidates any connect still in flight.
        self.generation.fetch_add(1, Ordering::AcqRel);
        let mut guard = self.channel.lock().await;
        match guard.take() {
            Some(ch) => {
                let _ = ch.stop_read.send(true);
                let mut writer = ch.writer;
                if let Err(e) = writer.shutdown().await {
                    debug!("socket shutdown: {e}");
                }
                *self.state.lock().unwrap() = SocketState::Closed;
                drop(guard);
                info!("socket closed");
                let _ = self.events.send(SocketEvent::Closed).await;
            }
            None => {
                drop(guard);
                let _ = self
                    .events
                    .send(SocketEvent::Error(SocketErrorKind::NotConnected))
                    .await;
            }
        }
    }

    /// Silent teardown between sessions: discards any stored channel,
    /// invalidates any connect still in flight, and emits no events.
    pub async fn reset(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
        let mut guard = self.channel.lock().await;
        if let Some(ch) = guard.take() {
            let _ = ch.stop_read.send(true);
            let mut writer = ch.writer;
            if let Err(e) = writer.shutdown().await {
                debug!("socket shutdown: {e}");
            }
            debug!("socket channel discarded");
        }
        *self.state.lock().unwrap() = SocketState::Idle;
    }

    /// True while a connected channel exists.
    pub async fn is_connected(&self) -> bool {
        self.channel.lock().await.is_some()
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SocketState {
        self.state.lock().unwrap().clone()
    }
}

/// Maps a connect-time I/O error to the event taxonomy: failures of the
/// connection itself are `ConnectionError`, everything else (resolution,
/// resource limits) is `InternalError`.
fn classify_connect_error(e: &std::io::Error) -> SocketErrorKind {
    use std::io::ErrorKind;
    match e.kind() {
        ErrorKind::ConnectionRefused
        | ErrorKind::ConnectionReset
        | ErrorKind::ConnectionAborted
        | ErrorKind::NotConnected
        | ErrorKind::TimedOut => SocketErrorKind::ConnectionError,
        _ => SocketErrorKind::InternalError,
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
