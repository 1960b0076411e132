//! Mock platform station for unit testing and the demo binary.
//!
//! # Why a mock station?
//!
//! A real [`WifiStation`] implementation drives radio hardware: it changes
//! externally visible state (saved profiles, the current association) and
//! cannot run in CI.  The `MockStation` replaces every platform call with
//! in-memory recording plus a small script that decides what the "platform"
//! does when asked to reconnect, so tests can drive the association manager
//! and the orchestrator through every path deterministically.
//!
//! # Usage in tests
//!
//! ```ignore
//! let station = Arc::new(
//!     MockStation::new()
//!         .with_network("Home", "[WPA2-PSK-CCMP][ESS]", -42)
//!         .with_script(AssociationScript::ConnectTo("Home".into())),
//! );
//! // … hand the station to WifiManager / LinkOrchestrator …
//!
//! // Assert on what the engine asked the platform to do:
//! assert_eq!(station.installed_profiles.lock().unwrap().len(), 1);
//! ```
//!
//! # `fail_next_install` flag
//!
//! Set it to make the next `install_profile` fail, exercising the
//! internal-error path without a broken platform.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::broadcast;

use wifilink_core::NetworkDescriptor;

use super::{NetworkProfile, StationError, StationEvent, WifiStation};

/// What the mock platform does when `reconnect()` is requested.
#[derive(Debug, Clone, Default)]
pub enum AssociationScript {
    /// Complete an association with the given SSID (which may differ from
    /// the requested target, to exercise the retry path).
    ConnectTo(String),
    /// Report an authentication failure.
    AuthFail,
    /// Do nothing; the association never completes (timeout path).
    #[default]
    Silent,
}

/// A recording station: every platform call is captured, nothing real runs.
pub struct MockStation {
    /// Scripted scan results returned by `scan()`.
    pub scan_results: Mutex<Vec<NetworkDescriptor>>,
    /// What `reconnect()` does; see [`AssociationScript`].
    pub script: Mutex<AssociationScript>,
    /// Current association, also updated by a `ConnectTo` script.
    pub current: Mutex<Option<String>>,
    /// Hotspot mode flag consulted by `is_hotspot_enabled`.
    pub hotspot_enabled: AtomicBool,
    /// Location capability flag, defaults to on.
    pub location_enabled: AtomicBool,
    /// Radio flag, defaults to on.
    pub wifi_enabled: AtomicBool,
    /// When set, the next `install_profile` fails and the flag clears.
    pub fail_next_install: AtomicBool,
    /// Records every profile passed to `install_profile`.
    pub installed_profiles: Mutex<Vec<NetworkProfile>>,
    /// Records every SSID passed to `remove_profile`.
    pub removed_profiles: Mutex<Vec<String>>,
    /// Counts `reconnect()` requests.
    pub reconnect_requests: Mutex<u32>,
    feed: broadcast::Sender<StationEvent>,
}

impl Default for MockStation {
    fn default() -> Self {
        let (feed, _) = broadcast::channel(32);
        Self {
            scan_results: Mutex::new(Vec::new()),
            script: Mutex::new(AssociationScript::default()),
            current: Mutex::new(None),
            hotspot_enabled: AtomicBool::new(false),
            location_enabled: AtomicBool::new(true),
            wifi_enabled: AtomicBool::new(true),
            fail_next_install: AtomicBool::new(false),
            installed_profiles: Mutex::new(Vec::new()),
            removed_profiles: Mutex::new(Vec::new()),
            reconnect_requests: Mutex::new(0),
            feed,
        }
    }
}

impl MockStation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: adds a network to the scripted scan results.
    pub fn with_network(self, ssid: &str, capabilities: &str, signal_level: i32) -> Self {
        self.scan_results.lock().unwrap().push(NetworkDescriptor {
            ssid: ssid.to_string(),
            capabilities: capabilities.to_string(),
            signal_level,
        });
        self
    }

    /// Builder: sets the reconnect script.
    pub fn with_script(self, script: AssociationScript) -> Self {
        *self.script.lock().unwrap() = script;
        self
    }

    /// Builder: marks the station as already associated with `ssid`.
    pub fn with_current(self, ssid: &str) -> Self {
        *self.current.lock().unwrap() = Some(ssid.to_string());
        self
    }

    /// Replaces the reconnect script mid-test.
    pub fn set_script(&self, script: AssociationScript) {
        *self.script.lock().unwrap() = script;
    }

    /// Pushes an arbitrary event into the platform feed, as the platform
    /// would on a spontaneous state change (e.g. the network dropping).
    pub fn push_event(&self, event: StationEvent) {
        // Send fails only when no subscriber exists, which a test may
        // legitimately set up.
        let _ = self.feed.send(event);
    }
}

#[async_trait]
impl WifiStation for MockStation {
    async fn is_hotspot_enabled(&self) -> Result<bool, StationError> {
        Ok(self.hotspot_enabled.load(Ordering::Relaxed))
    }

    async fn is_location_enabled(&self) -> Result<bool, StationError> {
        Ok(self.location_enabled.load(Ordering::Relaxed))
    }

    async fn is_wifi_enabled(&self) -> Result<bool, StationError> {
        Ok(self.wifi_enabled.load(Ordering::Relaxed))
    }

    async fn set_wifi_enabled(&self, enabled: bool) -> Result<(), StationError> {
        self.wifi_enabled.store(enabled, Ordering::Relaxed);
        Ok(())
    }

    async fn current_ssid(&self) -> Result<Option<String>, StationError> {
        Ok(self.current.lock().unwrap().clone())
    }

    async fn scan(&self) -> Result<Vec<NetworkDescriptor>, StationError> {
        Ok(self.scan_results.lock().unwrap().clone())
    }

    async fn remove_profile(&self, ssid: &str) -> Result<(), StationError> {
        self.removed_profiles.lock().unwrap().push(ssid.to_string());
        Ok(())
    }

    async fn install_profile(&self, profile: NetworkProfile) -> Result<(), StationError> {
        if self.fail_next_install.swap(false, Ordering::Relaxed) {
            return Err(StationError::Platform("profile store rejected".into()));
        }
        self.installed_profiles.lock().unwrap().push(profile);
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), StationError> {
        *self.current.lock().unwrap() = None;
        Ok(())
    }

    async fn reconnect(&self) -> Result<(), StationError> {
        *self.reconnect_requests.lock().unwrap() += 1;
        let script = self.script.lock().unwrap().clone();
        match script {
            AssociationScript::ConnectTo(ssid) => {
                *self.current.lock().unwrap() = Some(ssid.clone());
                let _ = self.feed.send(StationEvent::Connected(ssid));
            }
            AssociationScript::AuthFail => {
                let _ = self.feed.send(StationEvent::AuthenticationFailed);
            }
            AssociationScript::Silent => {}
        }
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<StationEvent> {
        self.feed.subscribe()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_reconnect_with_connect_script_emits_connected_on_feed() {
        // Arrange
        let station = MockStation::new()
            .with_script(AssociationScript::ConnectTo("Home".to_string()));
        let mut feed = station.subscribe();

        // Act
        station.reconnect().await.unwrap();

        // Assert
        assert_eq!(
            feed.recv().await.unwrap(),
            StationEvent::Connected("Home".to_string())
        );
        assert_eq!(
            station.current_ssid().await.unwrap(),
            Some("Home".to_string())
        );
    }

    #[tokio::test]
    async fn test_reconnect_with_silent_script_emits_nothing() {
        // Arrange
        let station = MockStation::new();
        let mut feed = station.subscribe();

        // Act
        station.reconnect().await.unwrap();

        // Assert – nothing queued on the feed
        assert!(matches!(
            feed.try_recv(),
            Err(broadcast::error::TryRecvError::Empty)
        ));
    }

    #[tokio::test]
    async fn test_fail_next_install_fails_once_then_clears() {
        // Arrange
        let station = MockStation::new();
        station.fail_next_install.store(true, Ordering::Relaxed);
        let profile = NetworkProfile {
            ssid: "Home".to_string(),
            security: wifilink_core::SecurityMode::Open,
            secret: None,
        };

        // Act / Assert
        assert!(station.install_profile(profile.clone()).await.is_err());
        assert!(station.install_profile(profile).await.is_ok());
        assert_eq!(station.installed_profiles.lock().unwrap().len(), 1);
    }
}
