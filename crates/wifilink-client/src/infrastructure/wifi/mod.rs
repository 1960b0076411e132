//! WifiManager: owns the wireless-association workflow for one target
//! network.
//!
//! Architecture:
//! - `WifiManager` holds an injected [`WifiStation`] capability trait object.
//! - `connect` runs the association workflow on a spawned task: preflight
//!   checks, scan, security-mode derivation, profile install, reconnect
//!   request.  The reconnect request is asynchronous: its outcome arrives
//!   later on the platform feed, not from the call itself.
//! - A feed pump task translates [`StationEvent`]s into [`WifiEvent`]s on an
//!   `mpsc` channel consumed by the orchestrator.
//!
//! At most one association attempt is outstanding at a time; a `connect`
//! while one is in flight is rejected, not queued.  Mutating operations are
//! idempotent because the underlying side effects (radio state, saved
//! profiles) are externally visible and may already be correct.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use wifilink_core::{NetworkCredentials, WifiErrorKind, WifiEvent};

use crate::infrastructure::platform::{
    NetworkProfile, StationError, StationEvent, WifiStation,
};

/// Association workflow state.  Mutated only by the manager itself, in
/// response to its own commands and the platform feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssociationState {
    Idle,
    Scanning,
    Configuring,
    Connecting,
    Connected,
    Disconnected,
    Failed(WifiErrorKind),
}

impl From<StationError> for WifiErrorKind {
    /// Any unexpected platform failure is an internal error at this boundary.
    fn from(_: StationError) -> Self {
        WifiErrorKind::InternalError
    }
}

/// The association manager.
pub struct WifiManager {
    station: Arc<dyn WifiStation>,
    events: mpsc::Sender<WifiEvent>,
    in_flight: Arc<AtomicBool>,
    state: Arc<Mutex<AssociationState>>,
    target: Arc<Mutex<Option<String>>>,
    pump: Mutex<Option<JoinHandle<()>>>,
}

impl WifiManager {
    /// Creates the manager, subscribes to the platform feed, and returns it
    /// together with the event receiver for the orchestrator.
    pub fn new(
        station: Arc<dyn WifiStation>,
        event_capacity: usize,
    ) -> (Self, mpsc::Receiver<WifiEvent>) {
        let (tx, rx) = mpsc::channel(event_capacity);
        let feed = station.subscribe();
        let state = Arc::new(Mutex::new(AssociationState::Idle));
        let target = Arc::new(Mutex::new(None));

        let pump = tokio::spawn(Self::pump_feed(
            feed,
            tx.clone(),
            Arc::clone(&state),
            Arc::clone(&target),
        ));

        let mgr = Self {
            station,
            events: tx,
            in_flight: Arc::new(AtomicBool::new(false)),
            state,
            target,
            pump: Mutex::new(Some(pump)),
        };
        (mgr, rx)
    }

    /// Translates the platform feed into `WifiEvent`s until either side
    /// closes.
    async fn pump_feed(
        mut feed: broadcast::Receiver<StationEvent>,
        tx: mpsc::Sender<WifiEvent>,
        state: Arc<Mutex<AssociationState>>,
        target: Arc<Mutex<Option<String>>>,
    ) {
        loop {
            let event = match feed.recv().await {
                Ok(event) => event,
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    warn!("platform feed lagged, {missed} event(s) dropped");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => break,
            };

            let mapped = match event {
                StationEvent::WifiStateChanged(enabled) => {
                    debug!("wifi radio state changed: enabled={enabled}");
                    None
                }
                StationEvent::Connecting => {
                    let ssid = target.lock().unwrap().clone().unwrap_or_default();
                    Some(WifiEvent::Connecting(ssid))
                }
                StationEvent::Connected(ssid) => {
                    *state.lock().unwrap() = AssociationState::Connected;
                    Some(WifiEvent::Connected(ssid))
                }
                StationEvent::Disconnected(ssid) => {
                    *state.lock().unwrap() = AssociationState::Disconnected;
                    Some(WifiEvent::Disconnected(ssid))
                }
                StationEvent::AuthenticationFailed => {
                    *state.lock().unwrap() =
                        AssociationState::Failed(WifiErrorKind::AuthenticatingError);
                    Some(WifiEvent::Error(WifiErrorKind::AuthenticatingError))
                }
            };

            if let Some(event) = mapped {
                if tx.send(event).await.is_err() {
                    break;
                }
            }
        }
    }

    /// Starts an association attempt for `credentials`.
    ///
    /// Returns `false` when an attempt is already in flight; the call is
    /// rejected, not queued.  Otherwise the workflow runs on a spawned task
    /// and this returns `true` immediately; progress and outcome are
    /// reported on the event channel.
    pub fn connect(&self, credentials: NetworkCredentials) -> bool {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            warn!(
                ssid = %credentials.ssid,
                "association attempt already in flight; connect rejected"
            );
            return false;
        }

        *self.target.lock().unwrap() = Some(credentials.ssid.clone());

        let station = Arc::clone(&self.station);
        let events = self.events.clone();
        let state = Arc::clone(&self.state);
        let in_flight = Arc::clone(&self.in_flight);

        tokio::spawn(async move {
            let outcome =
                Self::associate(Arc::clone(&station), &credentials, &events, &state).await;
            match outcome {
                Ok(Some(event)) => {
                    in_flight.store(false, Ordering::Release);
                    let _ = events.send(event).await;
                }
                Ok(None) => {
                    *state.lock().unwrap() = AssociationState::Connecting;
                    // The join request below produces the feed event that
                    // completes this attempt, and that event may immediately
                    // prompt the next connect; the guard must be clear before
                    // the request goes out.
                    in_flight.store(false, Ordering::Release);
                    let joined = async {
                        station.disconnect().await?;
                        station.reconnect().await
                    }
                    .await;
                    if let Err(e) = joined {
                        warn!("join request failed: {e}");
                        let kind = WifiErrorKind::from(e);
                        *state.lock().unwrap() = AssociationState::Failed(kind);
                        let _ = events.send(WifiEvent::Error(kind)).await;
                    }
                }
                Err(kind) => {
                    in_flight.store(false, Ordering::Release);
                    *state.lock().unwrap() = AssociationState::Failed(kind);
                    let _ = events.send(WifiEvent::Error(kind)).await;
                }
            }
        });
        true
    }

    /// The association workflow up to (but not including) the join request.
    ///
    /// `Ok(Some(event))` is a terminal event to emit without touching the
    /// platform further (short-circuits), `Ok(None)` means the profile is
    /// installed and the caller should issue the disconnect/reconnect pair;
    /// the outcome of that join arrives on the feed.
    async fn associate(
        station: Arc<dyn WifiStation>,
        credentials: &NetworkCredentials,
        events: &mpsc::Sender<WifiEvent>,
        state: &Mutex<AssociationState>,
    ) -> Result<Option<WifiEvent>, WifiErrorKind> {
        let ssid = &credentials.ssid;

        if station.is_hotspot_enabled().await? {
            return Err(WifiErrorKind::ApModeOn);
        }
        if !station.is_location_enabled().await? {
            return Ok(Some(WifiEvent::LocationServiceOff));
        }

        let _ = events.send(WifiEvent::Connecting(ssid.clone())).await;

        if !station.is_wifi_enabled().await? {
            station.set_wifi_enabled(true).await?;
        }

        // Already associated with the target: re-report success.
        if let Some(current) = station.current_ssid().await? {
            if current.eq_ignore_ascii_case(ssid) {
                info!(%ssid, "already associated with target network");
                *state.lock().unwrap() = AssociationState::Connected;
                return Ok(Some(WifiEvent::Connected(current)));
            }
        }

        *state.lock().unwrap() = AssociationState::Scanning;
        let descriptor = station
            .scan()
            .await?
            .into_iter()
            .find(|d| d.ssid == *ssid)
            .ok_or(WifiErrorKind::SsidNotFound)?;

        let mode = descriptor.security_mode();
        debug!(%ssid, %mode, capabilities = %descriptor.capabilities, "derived security mode");

        // Secret policy is enforced before any profile mutation.  A WEP
        // profile is built with whatever secret is present, even none; the
        // platform rejects the resulting profile on its own.
        if mode.requires_min_length_secret() && !credentials.secret_meets_policy() {
            return Err(WifiErrorKind::MinimumPasswordLengthEight);
        }

        *state.lock().unwrap() = AssociationState::Configuring;
        station.remove_profile(ssid).await?;
        station
            .install_profile(NetworkProfile {
                ssid: ssid.clone(),
                security: mode,
                secret: credentials.secret.clone(),
            })
            .await?;

        Ok(None)
    }

    /// True iff currently associated (and not in hotspot mode) with a
    /// network whose SSID matches case-insensitively.
    pub async fn is_connected_to(&self, ssid: &str) -> bool {
        match self.station.is_hotspot_enabled().await {
            Ok(true) | Err(_) => return false,
            Ok(false) => {}
        }
        match self.station.current_ssid().await {
            Ok(Some(current)) => current.eq_ignore_ascii_case(ssid),
            _ => false,
        }
    }

    /// Drops the association with `ssid` if it is the current one.
    /// Idempotent: a no-op when not associated to that SSID.
    pub async fn disconnect_from(&self, ssid: &str) -> bool {
        if !self.is_connected_to(ssid).await {
            return false;
        }
        self.station.disconnect().await.is_ok()
    }

    /// Removes any saved profile for `ssid`, disconnecting first when it is
    /// the current association.  Idempotent.
    pub async fn forget_network(&self, ssid: &str) -> Result<(), StationError> {
        if self.is_connected_to(ssid).await {
            self.station.disconnect().await?;
        }
        self.station.remove_profile(ssid).await
    }

    /// Current association workflow state.
    pub fn state(&self) -> AssociationState {
        self.state.lock().unwrap().clone()
    }

    /// Stops the feed pump, releasing the platform subscription.
    pub fn shutdown(&self) {
        if let Some(pump) = self.pump.lock().unwrap().take() {
            pump.abort();
        }
    }
}

impl Drop for WifiManager {
    fn drop(&mut self) {
        self.shutdown();
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::platform::mock::{AssociationScript, MockStation};
    use wifilink_core::SecurityMode;

    fn manager_with(station: MockStation) -> (WifiManager, mpsc::Receiver<WifiEvent>) {
        WifiManager::new(Arc::new(station), 16)
    }

    // ── Preflight failures ────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_connect_with_hotspot_on_fails_with_ap_mode_on() {
        // Arrange
        let station = MockStation::new();
        station.hotspot_enabled.store(true, Ordering::Relaxed);
        let (mgr, mut rx) = manager_with(station);

        // Act
        assert!(mgr.connect(NetworkCredentials::open("Home")));

        // Assert – no Connecting event, straight to the error
        assert_eq!(
            rx.recv().await.unwrap(),
            WifiEvent::Error(WifiErrorKind::ApModeOn)
        );
        assert_eq!(
            mgr.state(),
            AssociationState::Failed(WifiErrorKind::ApModeOn)
        );
    }

    #[tokio::test]
    async fn test_connect_with_location_off_emits_location_service_off() {
        // Arrange
        let station = MockStation::new();
        station.location_enabled.store(false, Ordering::Relaxed);
        let (mgr, mut rx) = manager_with(station);

        // Act
        mgr.connect(NetworkCredentials::open("Home"));

        // Assert – no attempt was made
        assert_eq!(rx.recv().await.unwrap(), WifiEvent::LocationServiceOff);
    }

    #[tokio::test]
    async fn test_connect_unknown_ssid_fails_with_ssid_not_found() {
        // Arrange – scan results contain a different network
        let station = MockStation::new().with_network("Other", "[ESS]", -60);
        let (mgr, mut rx) = manager_with(station);

        // Act
        mgr.connect(NetworkCredentials::open("Home"));

        // Assert
        assert_eq!(
            rx.recv().await.unwrap(),
            WifiEvent::Connecting("Home".to_string())
        );
        assert_eq!(
            rx.recv().await.unwrap(),
            WifiEvent::Error(WifiErrorKind::SsidNotFound)
        );
    }

    #[tokio::test]
    async fn test_connect_wpa_with_short_secret_fails_before_profile_mutation() {
        // Arrange
        let mock =
            MockStation::new().with_network("Home", "[WPA2-PSK-CCMP][ESS]", -42);
        let station = Arc::new(mock);
        let (mgr, mut rx) =
            WifiManager::new(Arc::clone(&station) as Arc<dyn WifiStation>, 16);

        // Act
        mgr.connect(NetworkCredentials::with_secret("Home", "short"));

        // Assert
        assert_eq!(
            rx.recv().await.unwrap(),
            WifiEvent::Connecting("Home".to_string())
        );
        assert_eq!(
            rx.recv().await.unwrap(),
            WifiEvent::Error(WifiErrorKind::MinimumPasswordLengthEight)
        );
        // The policy check fired before any profile mutation.
        assert!(station.removed_profiles.lock().unwrap().is_empty());
        assert!(station.installed_profiles.lock().unwrap().is_empty());
    }

    // ── Successful workflow ───────────────────────────────────────────────────

    #[tokio::test]
    async fn test_connect_open_network_installs_profile_and_completes_via_feed() {
        // Arrange
        let mock = MockStation::new()
            .with_network("Cafe", "[ESS]", -50)
            .with_script(AssociationScript::ConnectTo("Cafe".to_string()));
        let station = Arc::new(mock);
        let (mgr, mut rx) = WifiManager::new(Arc::clone(&station) as Arc<dyn WifiStation>, 16);

        // Act
        mgr.connect(NetworkCredentials::open("Cafe"));

        // Assert – Connecting from the workflow, Connected from the feed
        assert_eq!(
            rx.recv().await.unwrap(),
            WifiEvent::Connecting("Cafe".to_string())
        );
        assert_eq!(
            rx.recv().await.unwrap(),
            WifiEvent::Connected("Cafe".to_string())
        );

        let profiles = station.installed_profiles.lock().unwrap();
        assert_eq!(profiles.len(), 1);
        assert_eq!(profiles[0].security, SecurityMode::Open);
        assert_eq!(profiles[0].secret, None);
        // The pre-existing profile was forgotten before installing.
        assert_eq!(
            *station.removed_profiles.lock().unwrap(),
            vec!["Cafe".to_string()]
        );
    }

    #[tokio::test]
    async fn test_connect_accepted_as_soon_as_completion_event_arrives() {
        // Arrange
        let mock = MockStation::new()
            .with_network("Cafe", "[ESS]", -50)
            .with_script(AssociationScript::ConnectTo("Cafe".to_string()));
        let station = Arc::new(mock);
        let (mgr, mut rx) =
            WifiManager::new(Arc::clone(&station) as Arc<dyn WifiStation>, 16);

        // Act – drive one attempt to completion
        assert!(mgr.connect(NetworkCredentials::open("Cafe")));
        assert_eq!(
            rx.recv().await.unwrap(),
            WifiEvent::Connecting("Cafe".to_string())
        );
        assert_eq!(
            rx.recv().await.unwrap(),
            WifiEvent::Connected("Cafe".to_string())
        );

        // Assert – the in-flight guard clears before the join request goes
        // out, so a follow-up prompted by the completion event is accepted
        // rather than rejected as still in flight.
        assert!(mgr.connect(NetworkCredentials::open("Cafe")));
        assert_eq!(
            rx.recv().await.unwrap(),
            WifiEvent::Connecting("Cafe".to_string())
        );
        assert_eq!(
            rx.recv().await.unwrap(),
            WifiEvent::Connected("Cafe".to_string())
        );
    }

    #[tokio::test]
    async fn test_connect_wep_network_passes_missing_secret_through() {
        // Arrange – WEP requires a secret but the workflow continues with an
        // effectively invalid profile when it is absent
        let mock = MockStation::new().with_network("Legacy", "[WEP]", -70);
        let station = Arc::new(mock);
        let (mgr, mut rx) =
            WifiManager::new(Arc::clone(&station) as Arc<dyn WifiStation>, 16);

        // Act
        mgr.connect(NetworkCredentials::open("Legacy"));

        // Assert
        assert_eq!(
            rx.recv().await.unwrap(),
            WifiEvent::Connecting("Legacy".to_string())
        );
        // Reconnect issued with the (invalid) WEP profile installed; the
        // workflow task runs concurrently, so wait for the request.
        for _ in 0..100 {
            if *station.reconnect_requests.lock().unwrap() == 1 {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
        assert_eq!(*station.reconnect_requests.lock().unwrap(), 1);
        let profiles = station.installed_profiles.lock().unwrap();
        assert_eq!(profiles.len(), 1);
        assert_eq!(profiles[0].security, SecurityMode::Wep);
        assert_eq!(profiles[0].secret, None);
    }

    #[tokio::test]
    async fn test_connect_when_already_associated_reemits_connected() {
        // Arrange
        let mock = MockStation::new().with_current("Home");
        let station = Arc::new(mock);
        let (mgr, mut rx) =
            WifiManager::new(Arc::clone(&station) as Arc<dyn WifiStation>, 16);

        // Act
        mgr.connect(NetworkCredentials::open("home")); // case-insensitive match

        // Assert – short-circuit, no reconnect request issued
        assert_eq!(
            rx.recv().await.unwrap(),
            WifiEvent::Connecting("home".to_string())
        );
        assert_eq!(
            rx.recv().await.unwrap(),
            WifiEvent::Connected("Home".to_string())
        );
        assert_eq!(*station.reconnect_requests.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_install_failure_maps_to_internal_error() {
        // Arrange
        let mock = MockStation::new().with_network("Home", "[ESS]", -40);
        mock.fail_next_install.store(true, Ordering::Relaxed);
        let (mgr, mut rx) = manager_with(mock);

        // Act
        mgr.connect(NetworkCredentials::open("Home"));

        // Assert
        assert_eq!(
            rx.recv().await.unwrap(),
            WifiEvent::Connecting("Home".to_string())
        );
        assert_eq!(
            rx.recv().await.unwrap(),
            WifiEvent::Error(WifiErrorKind::InternalError)
        );
    }

    // ── Concurrency guard ─────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_connect_rejected_while_attempt_in_flight() {
        // Arrange
        let (mgr, _rx) = manager_with(MockStation::new());
        mgr.in_flight.store(true, Ordering::Release);

        // Act / Assert – rejected, not queued
        assert!(!mgr.connect(NetworkCredentials::open("Home")));
    }

    // ── Feed pump mapping ─────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_feed_auth_failure_maps_to_authenticating_error() {
        // Arrange
        let mock = MockStation::new();
        let station = Arc::new(mock);
        let (mgr, mut rx) =
            WifiManager::new(Arc::clone(&station) as Arc<dyn WifiStation>, 16);

        // Act
        station.push_event(StationEvent::AuthenticationFailed);

        // Assert
        assert_eq!(
            rx.recv().await.unwrap(),
            WifiEvent::Error(WifiErrorKind::AuthenticatingError)
        );
        assert_eq!(
            mgr.state(),
            AssociationState::Failed(WifiErrorKind::AuthenticatingError)
        );
    }

    #[tokio::test]
    async fn test_feed_disconnect_maps_to_disconnected_event() {
        // Arrange
        let mock = MockStation::new();
        let station = Arc::new(mock);
        let (mgr, mut rx) =
            WifiManager::new(Arc::clone(&station) as Arc<dyn WifiStation>, 16);

        // Act
        station.push_event(StationEvent::Disconnected("Home".to_string()));

        // Assert
        assert_eq!(
            rx.recv().await.unwrap(),
            WifiEvent::Disconnected("Home".to_string())
        );
        assert_eq!(mgr.state(), AssociationState::Disconnected);
    }

    // ── Idempotent mutations ──────────────────────────────────────────────────

    #[tokio::test]
    async fn test_disconnect_from_is_noop_when_not_associated() {
        // Arrange
        let mock = MockStation::new().with_current("Other");
        let station = Arc::new(mock);
        let (mgr, _rx) =
            WifiManager::new(Arc::clone(&station) as Arc<dyn WifiStation>, 16);

        // Act / Assert
        assert!(!mgr.disconnect_from("Home").await);
        assert_eq!(
            station.current_ssid().await.unwrap(),
            Some("Other".to_string())
        );
    }

    #[tokio::test]
    async fn test_forget_network_removes_profile_and_disconnects_when_current() {
        // Arrange
        let mock = MockStation::new().with_current("Home");
        let station = Arc::new(mock);
        let (mgr, _rx) =
            WifiManager::new(Arc::clone(&station) as Arc<dyn WifiStation>, 16);

        // Act
        mgr.forget_network("Home").await.unwrap();

        // Assert
        assert_eq!(station.current_ssid().await.unwrap(), None);
        assert_eq!(
            *station.removed_profiles.lock().unwrap(),
            vec!["Home".to_string()]
        );
    }

    #[tokio::test]
    async fn test_is_connected_to_is_false_in_hotspot_mode() {
        // Arrange – associated, but hotspot flag wins
        let mock = MockStation::new().with_current("Home");
        mock.hotspot_enabled.store(true, Ordering::Relaxed);
        let (mgr, _rx) = manager_with(mock);

        // Act / Assert
        assert!(!mgr.is_connected_to("Home").await);
    }
}
