//! Event vocabulary shared between the managers, the orchestrator, and the
//! caller.
//!
//! Three independent streams exist:
//!
//! - [`WifiEvent`] – emitted by the association manager, consumed only by
//!   the orchestrator.
//! - [`SocketEvent`] – emitted by the socket manager, consumed only by the
//!   orchestrator.
//! - [`LinkEvent`] – the single listener-facing stream the orchestrator
//!   produces by remapping and serializing the other two.
//!
//! Scan results travel on a fourth, fully independent stream
//! ([`ScanEvent`]) so that a scan requested mid-session never interleaves
//! with connection events.
//!
//! Errors are values, not panics: every failure crosses these streams as an
//! `Error(kind)` variant.  The kind enums derive `thiserror::Error` so they
//! format cleanly in logs.

use std::net::SocketAddr;

use thiserror::Error;

use crate::domain::network::{NetworkDescriptor, SocketEndpoint};

// ── Association manager events ────────────────────────────────────────────────

/// Lifecycle events of the wireless-association workflow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WifiEvent {
    /// An association attempt for the given SSID has started.
    Connecting(String),
    /// The platform reports an association with the given SSID.  The SSID is
    /// whatever the platform is now joined to, which may differ from the
    /// requested target.
    Connected(String),
    /// The platform reports the given SSID dropped.
    Disconnected(String),
    /// The location/positioning capability is disabled; no attempt was made.
    LocationServiceOff,
    /// The attempt failed.
    Error(WifiErrorKind),
}

/// Association failure taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum WifiErrorKind {
    #[error("target network not found in scan results")]
    SsidNotFound,
    #[error("internal platform failure")]
    InternalError,
    #[error("wifi radio is disabled")]
    WifiDisabled,
    #[error("wifi is not connected")]
    WifiNotConnected,
    #[error("authentication failed")]
    AuthenticatingError,
    #[error("hotspot mode is active")]
    ApModeOn,
    #[error("secured networks require a secret of at least 8 characters")]
    MinimumPasswordLengthEight,
}

// ── Socket manager events ─────────────────────────────────────────────────────

/// Lifecycle events of the stream-socket workflow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SocketEvent {
    /// A connect attempt to the endpoint has started.
    Connecting(SocketEndpoint),
    /// The channel is established; `peer` is the remote address.
    Connected { peer: SocketAddr },
    /// Bytes arrived; `text` is the UTF-8 decoding of `bytes`.
    DataReceived { bytes: Vec<u8>, text: String },
    /// The channel was closed by an explicit `close()`.
    Closed,
    /// The channel failed.
    Error(SocketErrorKind),
}

/// Socket failure taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SocketErrorKind {
    #[error("internal socket failure")]
    InternalError,
    #[error("connection refused or lost")]
    ConnectionError,
    #[error("no connected channel")]
    NotConnected,
}

// ── Listener-facing events ────────────────────────────────────────────────────

/// The merged, ordered event stream delivered to the caller.
///
/// For a single session the delivery order is: at most one
/// [`LinkEvent::WifiConnecting`], then at most one
/// [`LinkEvent::SocketConnecting`], then at most one [`LinkEvent::Connected`],
/// then zero or more [`LinkEvent::DataReceived`], then exactly one of
/// [`LinkEvent::Disconnected`] or a terminal [`LinkEvent::Error`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    /// Both the association and the socket are up for the same target.
    Connected {
        ssid: String,
        host: String,
        port: u16,
    },
    /// Association with the target network is in progress.
    WifiConnecting(String),
    /// The socket connect attempt is in progress.
    SocketConnecting { host: String, port: u16 },
    /// Payload bytes from the server, raw and UTF-8 decoded.
    DataReceived { bytes: Vec<u8>, text: String },
    /// The session ended normally (socket closed or network dropped).
    Disconnected,
    /// The session ended with a terminal error; no implicit retry follows.
    Error(LinkErrorKind),
}

/// Full error taxonomy of the merged stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LinkErrorKind {
    #[error("internal failure")]
    InternalError,
    #[error("connection refused or lost")]
    ConnectionError,
    #[error("target network not found in scan results")]
    SsidNotFound,
    #[error("hotspot mode is active")]
    ApModeOn,
    #[error("authentication failed")]
    AuthenticatingError,
    #[error("location service is disabled")]
    LocationServiceOff,
    #[error("secured networks require a secret of at least 8 characters")]
    MinimumPasswordLengthEight,
    #[error("retry budget exhausted")]
    MaxRetryExceeded,
    #[error("no connected channel")]
    NotConnected,
    #[error("connect timed out")]
    TimeOut,
}

impl From<WifiErrorKind> for LinkErrorKind {
    fn from(kind: WifiErrorKind) -> Self {
        match kind {
            WifiErrorKind::SsidNotFound => LinkErrorKind::SsidNotFound,
            WifiErrorKind::ApModeOn => LinkErrorKind::ApModeOn,
            WifiErrorKind::AuthenticatingError => LinkErrorKind::AuthenticatingError,
            WifiErrorKind::MinimumPasswordLengthEight => {
                LinkErrorKind::MinimumPasswordLengthEight
            }
            // WifiDisabled / WifiNotConnected only occur on query paths; when
            // they do surface through a connect attempt they are internal.
            WifiErrorKind::InternalError
            | WifiErrorKind::WifiDisabled
            | WifiErrorKind::WifiNotConnected => LinkErrorKind::InternalError,
        }
    }
}

impl From<SocketErrorKind> for LinkErrorKind {
    fn from(kind: SocketErrorKind) -> Self {
        match kind {
            SocketErrorKind::InternalError => LinkErrorKind::InternalError,
            SocketErrorKind::ConnectionError => LinkErrorKind::ConnectionError,
            SocketErrorKind::NotConnected => LinkErrorKind::NotConnected,
        }
    }
}

// ── Scan events ───────────────────────────────────────────────────────────────

/// Events of the independent scan stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanEvent {
    /// Scan completed with these descriptors.
    Results(Vec<NetworkDescriptor>),
    /// The location/positioning capability is disabled; no scan was made.
    LocationServiceOff,
    /// The scan could not start.
    Error(ScanErrorKind),
}

/// Scan failure taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ScanErrorKind {
    #[error("hotspot mode is active")]
    ApModeOn,
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wifi_error_kinds_map_one_to_one_where_defined() {
        // Arrange – the kinds the orchestrator forwards unchanged
        let direct = [
            (WifiErrorKind::SsidNotFound, LinkErrorKind::SsidNotFound),
            (WifiErrorKind::ApModeOn, LinkErrorKind::ApModeOn),
            (
                WifiErrorKind::AuthenticatingError,
                LinkErrorKind::AuthenticatingError,
            ),
            (
                WifiErrorKind::MinimumPasswordLengthEight,
                LinkErrorKind::MinimumPasswordLengthEight,
            ),
        ];

        // Act / Assert
        for (wifi, link) in direct {
            assert_eq!(LinkErrorKind::from(wifi), link);
        }
    }

    #[test]
    fn test_query_only_wifi_errors_collapse_to_internal() {
        assert_eq!(
            LinkErrorKind::from(WifiErrorKind::WifiDisabled),
            LinkErrorKind::InternalError
        );
        assert_eq!(
            LinkErrorKind::from(WifiErrorKind::WifiNotConnected),
            LinkErrorKind::InternalError
        );
    }

    #[test]
    fn test_socket_error_kinds_map_one_to_one() {
        assert_eq!(
            LinkErrorKind::from(SocketErrorKind::ConnectionError),
            LinkErrorKind::ConnectionError
        );
        assert_eq!(
            LinkErrorKind::from(SocketErrorKind::InternalError),
            LinkErrorKind::InternalError
        );
        assert_eq!(
            LinkErrorKind::from(SocketErrorKind::NotConnected),
            LinkErrorKind::NotConnected
        );
    }

    #[test]
    fn test_error_kinds_format_for_logging() {
        // thiserror Display strings end up in tracing output; pin a couple.
        assert_eq!(
            LinkErrorKind::TimeOut.to_string(),
            "connect timed out"
        );
        assert_eq!(
            LinkErrorKind::MaxRetryExceeded.to_string(),
            "retry budget exhausted"
        );
    }
}
