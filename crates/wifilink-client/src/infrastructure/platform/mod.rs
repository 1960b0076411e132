//! Platform capability surface the engine consumes but does not implement.
//!
//! Radio and hotspot control, profile storage, scanning, and network-state
//! notifications are modeled as an explicit, injectable trait:
//! [`WifiStation`] for commands and queries, plus a subscribable
//! [`StationEvent`] feed for asynchronous state changes.
//!
//! The engine registers with the feed when a manager is constructed and
//! drops the subscription on shutdown.  It assumes nothing about which
//! thread delivers feed events, only that each subscriber observes them in
//! the order the platform produced them (`tokio::sync::broadcast` gives
//! exactly that).
//!
//! Only [`mock::MockStation`] ships with this repo; a real deployment
//! provides one implementation per target platform.

pub mod mock;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::broadcast;

use wifilink_core::{NetworkDescriptor, SecurityMode};

/// Error type for platform calls.
///
/// The engine never lets a `StationError` cross the listener surface as-is;
/// every unexpected platform failure is converted to an internal-error event
/// at the manager boundary.
#[derive(Debug, Clone, Error)]
pub enum StationError {
    /// The platform call failed; the message is platform-specific.
    #[error("platform call failed: {0}")]
    Platform(String),
}

/// Saved-network profile built by the association manager.
///
/// Open profiles carry no secret.  WEP profiles carry the secret through
/// even when absent; such a profile is effectively invalid and the platform
/// rejects it.  WPA/EAP profiles are only built after the ≥8-character
/// secret policy has passed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkProfile {
    pub ssid: String,
    pub security: SecurityMode,
    pub secret: Option<String>,
}

/// Asynchronous network-state changes delivered by the platform feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StationEvent {
    /// The radio was switched on (`true`) or off (`false`).
    WifiStateChanged(bool),
    /// The platform began associating with some network.
    Connecting,
    /// The platform completed an association with the given SSID.
    Connected(String),
    /// The given SSID dropped.
    Disconnected(String),
    /// The supplicant reported an authentication failure.
    AuthenticationFailed,
}

/// Radio / profile / scan / location surface of the host platform.
///
/// All command and query methods are asynchronous because real platform
/// backends block on IPC or hardware.  Implementations must be tolerant of
/// being invoked on an already-correct state: enabling an enabled radio,
/// removing an absent profile, or disconnecting while disconnected are
/// no-ops, not errors.
#[async_trait]
pub trait WifiStation: Send + Sync {
    /// True while the device hosts its own access point.  Hotspot mode is
    /// mutually exclusive with being a client of another network.
    async fn is_hotspot_enabled(&self) -> Result<bool, StationError>;

    /// True when the location/positioning capability is enabled.  Scanning
    /// requires it on the platforms this engine targets.
    async fn is_location_enabled(&self) -> Result<bool, StationError>;

    /// True when the wifi radio is on.
    async fn is_wifi_enabled(&self) -> Result<bool, StationError>;

    /// Switches the wifi radio on or off.
    async fn set_wifi_enabled(&self, enabled: bool) -> Result<(), StationError>;

    /// SSID of the current association, if any.
    async fn current_ssid(&self) -> Result<Option<String>, StationError>;

    /// Runs a scan and returns the visible networks.
    async fn scan(&self) -> Result<Vec<NetworkDescriptor>, StationError>;

    /// Removes any saved profile with the given SSID.
    async fn remove_profile(&self, ssid: &str) -> Result<(), StationError>;

    /// Installs (saves and enables) a network profile.
    async fn install_profile(&self, profile: NetworkProfile) -> Result<(), StationError>;

    /// Drops the current association, if any.
    async fn disconnect(&self) -> Result<(), StationError>;

    /// Asks the platform to (re)connect using the enabled profiles.
    /// Completion is reported later on the event feed, not by this call.
    async fn reconnect(&self) -> Result<(), StationError>;

    /// Subscribes to the network-state change feed.
    fn subscribe(&self) -> broadcast::Receiver<StationEvent>;
}
