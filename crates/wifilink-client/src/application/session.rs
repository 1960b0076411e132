//! LinkOrchestrator: drives a network association and a stream-socket
//! connection as one combined session.
//!
//! # Architecture
//!
//! The orchestrator is an actor: all mutable session state lives inside one
//! spawned task, commands arrive over an `mpsc` channel through the cloneable
//! [`LinkHandle`], and the two manager event streams are merged into the
//! same `select!` loop.  Commands and manager events are therefore processed
//! on a single serialized path; no session state is ever touched from two
//! tasks at once.
//!
//! The caller observes exactly two streams: [`LinkEvent`] for the session
//! and [`ScanEvent`] for scan results, which never interleave with each
//! other.
//!
//! # Session lifecycle
//!
//! `connect` creates a session (fresh `Uuid`, retry budget, deadline) and
//! starts the association workflow.  When the platform associates with the
//! requested network, retry is disabled and the socket phase begins; when it
//! associates with some other network instead, the attempt is re-issued
//! until the retry budget runs out.  The deadline timer is armed for the
//! whole pre-`Established` phase and cancelled the moment the socket
//! connects; on expiry the session fails with exactly one `TimeOut`.
//!
//! After `close` (or a terminal failure) any event still queued from either
//! manager is discarded, never reprocessed.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use wifilink_core::{
    LinkErrorKind, LinkEvent, NetworkCredentials, ScanEvent, ScanErrorKind,
    SocketEndpoint, SocketErrorKind, SocketEvent, WifiEvent,
};

use crate::config::LinkConfig;
use crate::infrastructure::platform::WifiStation;
use crate::infrastructure::socket::SocketManager;
use crate::infrastructure::wifi::WifiManager;

/// Default retry budget for wrong-network associations.
pub const DEFAULT_MAX_RETRIES: u32 = 1;

/// Default session deadline.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(2);

/// Combined session state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkState {
    Idle,
    AssociatingNetwork,
    ConnectingSocket,
    Established,
    Retrying,
    Failed,
    Closed,
}

/// Error type for handle calls.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The orchestrator task has stopped; no further commands can be
    /// delivered.
    #[error("orchestrator is no longer running")]
    OrchestratorGone,
}

/// Everything needed to start (and retry) one session.
#[derive(Debug, Clone)]
pub struct ConnectRequest {
    pub ssid: String,
    pub secret: Option<String>,
    pub host: String,
    pub port: u16,
    /// How many wrong-network associations may be retried.
    pub max_retries: u32,
    /// Deadline for reaching `Established`.
    pub timeout: Duration,
}

impl ConnectRequest {
    pub fn new(
        ssid: impl Into<String>,
        host: impl Into<String>,
        port: u16,
    ) -> Self {
        Self {
            ssid: ssid.into(),
            secret: None,
            host: host.into(),
            port,
            max_retries: DEFAULT_MAX_RETRIES,
            timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    pub fn with_secret(mut self, secret: impl Into<String>) -> Self {
        self.secret = Some(secret.into());
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Retry bookkeeping for the pre-`Established` phase of a session.
/// Created on `connect`, destroyed on terminal success, terminal failure,
/// or `close`; `attempted` is monotonic and never exceeds `max_retries`.
#[derive(Debug, Clone)]
struct RetryContext {
    session_id: Uuid,
    credentials: NetworkCredentials,
    endpoint: SocketEndpoint,
    retry_enabled: bool,
    attempted: u32,
    max_retries: u32,
    deadline: Instant,
}

/// Commands carried from the handle to the actor.
enum Command {
    Connect(ConnectRequest),
    Write(String),
    Close,
    RequestScan,
}

/// Cloneable command surface of a running orchestrator.
#[derive(Clone)]
pub struct LinkHandle {
    commands: mpsc::Sender<Command>,
}

impl LinkHandle {
    /// Starts a new session.  Ignored (with a log) while one is active.
    pub async fn connect(&self, request: ConnectRequest) -> Result<(), SessionError> {
        self.commands
            .send(Command::Connect(request))
            .await
            .map_err(|_| SessionError::OrchestratorGone)
    }

    /// Writes `text` to the established channel.  Failures surface on the
    /// event stream, not from this call.
    pub async fn write(&self, text: impl Into<String>) -> Result<(), SessionError> {
        self.commands
            .send(Command::Write(text.into()))
            .await
            .map_err(|_| SessionError::OrchestratorGone)
    }

    /// Ends the session.  Idempotent: a second close emits nothing.
    pub async fn close(&self) -> Result<(), SessionError> {
        self.commands
            .send(Command::Close)
            .await
            .map_err(|_| SessionError::OrchestratorGone)
    }

    /// Requests a network scan; results arrive on the scan stream.
    pub async fn request_scan(&self) -> Result<(), SessionError> {
        self.commands
            .send(Command::RequestScan)
            .await
            .map_err(|_| SessionError::OrchestratorGone)
    }
}

/// The orchestration actor.
pub struct LinkOrchestrator {
    wifi: WifiManager,
    socket: SocketManager,
    station: Arc<dyn WifiStation>,
    events: mpsc::Sender<LinkEvent>,
    scan_events: mpsc::Sender<ScanEvent>,
    state: LinkState,
    retry: Option<RetryContext>,
    /// Target of the current session, kept past `Established` (when the
    /// retry context is gone) until the session ends.
    active: Option<(String, SocketEndpoint)>,
}

impl LinkOrchestrator {
    /// Builds the managers, spawns the actor, and returns the command
    /// handle plus the two outbound streams.
    pub fn spawn(
        station: Arc<dyn WifiStation>,
        config: &LinkConfig,
    ) -> (
        LinkHandle,
        mpsc::Receiver<LinkEvent>,
        mpsc::Receiver<ScanEvent>,
    ) {
        let capacity = config.socket.event_capacity;
        let (wifi, wifi_rx) = WifiManager::new(Arc::clone(&station), capacity);
        let (socket, socket_rx) = SocketManager::new(
            capacity,
            Duration::from_millis(config.socket.read_idle_ms),
            config.socket.read_buffer_size,
        );
        let (command_tx, command_rx) = mpsc::channel(capacity);
        let (event_tx, event_rx) = mpsc::channel(capacity);
        let (scan_tx, scan_rx) = mpsc::channel(capacity);

        let orchestrator = Self {
            wifi,
            socket,
            station,
            events: event_tx,
            scan_events: scan_tx,
            state: LinkState::Idle,
            retry: None,
            active: None,
        };
        tokio::spawn(orchestrator.run(command_rx, wifi_rx, socket_rx));

        (LinkHandle { commands: command_tx }, event_rx, scan_rx)
    }

    /// The serialized processing loop: commands, both manager streams, and
    /// the session deadline all land here.
    async fn run(
        mut self,
        mut commands: mpsc::Receiver<Command>,
        mut wifi_rx: mpsc::Receiver<WifiEvent>,
        mut socket_rx: mpsc::Receiver<SocketEvent>,
    ) {
        loop {
            // The deadline timer lives with the retry context: armed for the
            // whole pre-Established phase, gone once the session is up.
            let deadline = self.retry.as_ref().map(|ctx| ctx.deadline);

            tokio::select! {
                command = commands.recv() => match command {
                    Some(command) => self.handle_command(command).await,
                    None => break,
                },
                Some(event) = wifi_rx.recv() => self.handle_wifi_event(event).await,
                Some(event) = socket_rx.recv() => self.handle_socket_event(event).await,
                _ = until(deadline), if deadline.is_some() => self.handle_deadline().await,
            }
        }
        debug!("orchestrator stopping; command channel closed");
        self.wifi.shutdown();
    }

    // ── Commands ──────────────────────────────────────────────────────────────

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::Connect(request) => self.handle_connect(request).await,
            Command::Write(text) => {
                let written = self.socket.write(text.into_bytes()).await;
                debug!(written, "write completed");
            }
            Command::Close => self.handle_close().await,
            Command::RequestScan => self.handle_scan().await,
        }
    }

    async fn handle_connect(&mut self, request: ConnectRequest) {
        match self.state {
            LinkState::AssociatingNetwork
            | LinkState::Retrying
            | LinkState::ConnectingSocket
            | LinkState::Established => {
                warn!(ssid = %request.ssid, "connect ignored; a session is active");
                return;
            }
            LinkState::Idle | LinkState::Failed | LinkState::Closed => {}
        }

        // A session that failed or timed out may have left a channel, or a
        // connect still in flight, behind; the new session starts clean.
        self.socket.reset().await;

        let credentials = match &request.secret {
            Some(secret) => NetworkCredentials::with_secret(&request.ssid, secret),
            None => NetworkCredentials::open(&request.ssid),
        };
        let endpoint = SocketEndpoint::new(request.host, request.port);
        let context = RetryContext {
            session_id: Uuid::new_v4(),
            credentials: credentials.clone(),
            endpoint: endpoint.clone(),
            retry_enabled: true,
            attempted: 0,
            max_retries: request.max_retries,
            deadline: Instant::now() + request.timeout,
        };
        info!(
            session = %context.session_id,
            ssid = %credentials.ssid,
            endpoint = %endpoint,
            "starting link session"
        );

        self.active = Some((credentials.ssid.clone(), endpoint));
        self.retry = Some(context);
        self.state = LinkState::AssociatingNetwork;

        if !self.wifi.connect(credentials) {
            warn!("association manager rejected connect");
            self.fail(LinkErrorKind::InternalError).await;
        }
    }

    async fn handle_close(&mut self) {
        if self.state == LinkState::Closed {
            debug!("close ignored; already closed");
            return;
        }
        if let Some(context) = self.retry.take() {
            info!(session = %context.session_id, "session closed before establishing");
        }
        if self.socket.is_connected().await {
            // The manager's own Closed event is queued behind this call and
            // will be discarded as late once the state flips below.
            self.socket.close().await;
            self.emit(LinkEvent::Disconnected).await;
        } else {
            self.emit(LinkEvent::Error(LinkErrorKind::NotConnected)).await;
        }
        self.active = None;
        self.state = LinkState::Closed;
    }

    /// Scan requests run against the station directly; results travel on
    /// the scan stream and never interleave with session events.
    async fn handle_scan(&mut self) {
        let hotspot = match self.station.is_hotspot_enabled().await {
            Ok(hotspot) => hotspot,
            Err(e) => {
                warn!("scan aborted; hotspot query failed: {e}");
                return;
            }
        };
        if hotspot {
            let _ = self
                .scan_events
                .send(ScanEvent::Error(ScanErrorKind::ApModeOn))
                .await;
            return;
        }
        match self.station.is_location_enabled().await {
            Ok(true) => {}
            Ok(false) => {
                let _ = self.scan_events.send(ScanEvent::LocationServiceOff).await;
                return;
            }
            Err(e) => {
                warn!("scan aborted; location query failed: {e}");
                return;
            }
        }
        match self.station.scan().await {
            Ok(descriptors) => {
                let _ = self.scan_events.send(ScanEvent::Results(descriptors)).await;
            }
            Err(e) => warn!("scan failed: {e}"),
        }
    }

    // ── Association events ────────────────────────────────────────────────────

    async fn handle_wifi_event(&mut self, event: WifiEvent) {
        if self.session_over() {
            debug!(?event, "late association event discarded");
            return;
        }
        match event {
            WifiEvent::Connecting(ssid) => {
                if self.state == LinkState::Retrying {
                    // A retry attempt restarting; the caller already saw the
                    // session's one WifiConnecting.
                    self.state = LinkState::AssociatingNetwork;
                } else if self.state == LinkState::AssociatingNetwork {
                    self.emit(LinkEvent::WifiConnecting(ssid)).await;
                }
            }
            WifiEvent::Connected(ssid) => self.handle_associated(ssid).await,
            WifiEvent::Disconnected(ssid) => {
                let is_target = self
                    .active
                    .as_ref()
                    .is_some_and(|(target, _)| target.eq_ignore_ascii_case(&ssid));
                if !is_target {
                    debug!(%ssid, "unrelated network dropped; ignored");
                    return;
                }
                info!(%ssid, "target network dropped; ending session");
                self.retry = None;
                if self.socket.is_connected().await {
                    self.socket.close().await;
                }
                self.emit(LinkEvent::Disconnected).await;
                self.active = None;
                self.state = LinkState::Closed;
            }
            WifiEvent::LocationServiceOff => {
                self.fail(LinkErrorKind::LocationServiceOff).await;
            }
            WifiEvent::Error(kind) => {
                self.fail(kind.into()).await;
            }
        }
    }

    /// The platform completed an association; it may be with the requested
    /// network or with some other remembered one.
    async fn handle_associated(&mut self, ssid: String) {
        let Some(context) = self.retry.as_mut() else {
            debug!(%ssid, "association report outside the pre-established phase; ignored");
            return;
        };

        if ssid.eq_ignore_ascii_case(&context.credentials.ssid) {
            // Right network: the retry budget no longer applies.
            context.retry_enabled = false;
            let endpoint = context.endpoint.clone();
            info!(session = %context.session_id, %ssid, "network associated; opening socket");
            self.state = LinkState::ConnectingSocket;
            self.socket.open(endpoint).await;
        } else if context.retry_enabled && context.attempted < context.max_retries {
            context.attempted += 1;
            info!(
                session = %context.session_id,
                joined = %ssid,
                target = %context.credentials.ssid,
                attempt = context.attempted,
                "associated with the wrong network; retrying"
            );
            let credentials = context.credentials.clone();
            self.state = LinkState::Retrying;
            if !self.wifi.connect(credentials) {
                warn!("retry rejected; an attempt is still in flight");
            }
        } else {
            warn!(
                session = %context.session_id,
                joined = %ssid,
                "retry budget exhausted"
            );
            self.fail(LinkErrorKind::MaxRetryExceeded).await;
        }
    }

    // ── Socket events ─────────────────────────────────────────────────────────

    async fn handle_socket_event(&mut self, event: SocketEvent) {
        if self.session_over() {
            debug!(?event, "late socket event discarded");
            return;
        }
        match event {
            SocketEvent::Connecting(endpoint) => {
                self.emit(LinkEvent::SocketConnecting {
                    host: endpoint.host,
                    port: endpoint.port,
                })
                .await;
            }
            SocketEvent::Connected { peer } => {
                let Some((ssid, endpoint)) = self.active.clone() else {
                    debug!(%peer, "socket connected with no active session; ignored");
                    return;
                };
                if let Some(context) = self.retry.take() {
                    info!(session = %context.session_id, %peer, "link established");
                }
                self.state = LinkState::Established;
                self.emit(LinkEvent::Connected {
                    ssid,
                    host: endpoint.host,
                    port: endpoint.port,
                })
                .await;
            }
            SocketEvent::DataReceived { bytes, text } => {
                self.emit(LinkEvent::DataReceived { bytes, text }).await;
            }
            SocketEvent::Closed => {
                self.retry = None;
                self.emit(LinkEvent::Disconnected).await;
                self.active = None;
                self.state = LinkState::Closed;
            }
            SocketEvent::Error(kind) => {
                if kind == SocketErrorKind::NotConnected {
                    // A write with no channel; reported, but it does not end
                    // a session that never reached the socket phase.
                    self.emit(LinkEvent::Error(LinkErrorKind::NotConnected)).await;
                } else {
                    self.fail(kind.into()).await;
                }
            }
        }
    }

    // ── Deadline ──────────────────────────────────────────────────────────────

    async fn handle_deadline(&mut self) {
        let Some(context) = self.retry.take() else {
            return;
        };
        warn!(
            session = %context.session_id,
            ssid = %context.credentials.ssid,
            "session deadline passed"
        );
        // Tears down an established channel and invalidates a socket connect
        // still in flight, so a late connect result cannot outlive the
        // session it belonged to.
        self.socket.reset().await;
        self.fail(LinkErrorKind::TimeOut).await;
    }

    // ── Shared transitions ────────────────────────────────────────────────────

    /// True once the session has reached a terminal state; every event still
    /// queued from a manager is then late and must be discarded.
    fn session_over(&self) -> bool {
        matches!(self.state, LinkState::Closed | LinkState::Failed)
    }

    async fn fail(&mut self, kind: LinkErrorKind) {
        self.retry = None;
        self.active = None;
        self.state = LinkState::Failed;
        self.emit(LinkEvent::Error(kind)).await;
    }

    async fn emit(&self, event: LinkEvent) {
        if self.events.send(event).await.is_err() {
            debug!("event receiver dropped");
        }
    }
}

/// Pending forever when no deadline is armed; the select arm is additionally
/// guarded so this is never polled with `None`.
async fn until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connect_request_defaults() {
        // Arrange / Act
        let request = ConnectRequest::new("Home", "192.168.0.10", 9000);

        // Assert
        assert_eq!(request.ssid, "Home");
        assert_eq!(request.secret, None);
        assert_eq!(request.max_retries, DEFAULT_MAX_RETRIES);
        assert_eq!(request.timeout, DEFAULT_CONNECT_TIMEOUT);
    }

    #[test]
    fn test_connect_request_builders() {
        // Arrange / Act
        let request = ConnectRequest::new("Home", "192.168.0.10", 9000)
            .with_secret("hunter2hunter2")
            .with_max_retries(3)
            .with_timeout(Duration::from_secs(10));

        // Assert
        assert_eq!(request.secret.as_deref(), Some("hunter2hunter2"));
        assert_eq!(request.max_retries, 3);
        assert_eq!(request.timeout, Duration::from_secs(10));
    }
}
