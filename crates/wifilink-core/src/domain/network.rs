//! Network identity, scan result, and security-mode domain types.
//!
//! # Security-mode derivation (for beginners)
//!
//! A wireless network advertises its authentication scheme as a free-form
//! *capability string*, e.g. `"[WPA2-PSK-CCMP][ESS]"`.  The security mode is
//! derived by substring matching against that string.  The precedence order
//! is **WEP, then EAP, then WPA**, falling back to `Open` when no token
//! matches.  Weaker tokens win when several are present; this mirrors the
//! observed behavior of the platform this engine was built against and is
//! deliberately left as-is.  Real capability strings can carry multiple
//! tokens, so changing the order changes which profile gets installed.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identity and optional secret for one target wireless network.
///
/// Secured modes (WPA/EAP) require a secret of at least
/// [`MIN_SECRET_LEN`] characters; the association manager enforces this
/// before touching any saved profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkCredentials {
    /// Network name (SSID), matched case-insensitively against the current
    /// association.
    pub ssid: String,
    /// Passphrase; `None` for open networks.
    pub secret: Option<String>,
}

/// Minimum secret length accepted for WPA/EAP networks.
pub const MIN_SECRET_LEN: usize = 8;

impl NetworkCredentials {
    /// Creates credentials for an open network.
    pub fn open(ssid: impl Into<String>) -> Self {
        Self {
            ssid: ssid.into(),
            secret: None,
        }
    }

    /// Creates credentials with a passphrase.
    pub fn with_secret(ssid: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            ssid: ssid.into(),
            secret: Some(secret.into()),
        }
    }

    /// True when the secret satisfies the WPA/EAP length policy.
    pub fn secret_meets_policy(&self) -> bool {
        matches!(&self.secret, Some(s) if s.len() >= MIN_SECRET_LEN)
    }
}

/// One network found by a platform scan.
///
/// Produced by the platform scan primitive and consumed to pick a
/// [`SecurityMode`] for the target network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkDescriptor {
    /// Network name.
    pub ssid: String,
    /// Raw capability string, e.g. `"[WPA2-PSK-CCMP][ESS]"`.
    pub capabilities: String,
    /// Signal strength in dBm (more negative is weaker).
    pub signal_level: i32,
}

impl NetworkDescriptor {
    /// Derives the security mode from this descriptor's capability string.
    pub fn security_mode(&self) -> SecurityMode {
        SecurityMode::from_capabilities(&self.capabilities)
    }
}

/// Authentication/encryption scheme a network advertises.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SecurityMode {
    /// No authentication.
    Open,
    /// Legacy WEP shared key.
    Wep,
    /// WPA/WPA2 pre-shared key.
    Wpa,
    /// Enterprise (802.1x/EAP).
    Eap,
}

impl SecurityMode {
    /// Derives the mode from a capability string.
    ///
    /// Tokens are checked in the fixed order WEP, EAP, WPA; the first match
    /// wins and the default is [`SecurityMode::Open`].  See the module docs
    /// for why the order is not "strongest wins".
    pub fn from_capabilities(capabilities: &str) -> Self {
        const ORDERED: [(&str, SecurityMode); 3] = [
            ("WEP", SecurityMode::Wep),
            ("EAP", SecurityMode::Eap),
            ("WPA", SecurityMode::Wpa),
        ];
        for (token, mode) in ORDERED {
            if capabilities.contains(token) {
                return mode;
            }
        }
        SecurityMode::Open
    }

    /// True for modes that require a passphrase of at least
    /// [`MIN_SECRET_LEN`] characters before a profile may be installed.
    pub fn requires_min_length_secret(self) -> bool {
        matches!(self, SecurityMode::Wpa | SecurityMode::Eap)
    }
}

impl fmt::Display for SecurityMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SecurityMode::Open => "OPEN",
            SecurityMode::Wep => "WEP",
            SecurityMode::Wpa => "WPA",
            SecurityMode::Eap => "EAP",
        };
        f.write_str(name)
    }
}

/// Host/port pair for the stream-socket target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SocketEndpoint {
    /// Server host: an IP literal or a resolvable name.
    pub host: String,
    /// Server TCP port.
    pub port: u16,
}

impl SocketEndpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for SocketEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    // ── Security-mode derivation ──────────────────────────────────────────────

    #[test]
    fn test_wpa_psk_capability_resolves_to_wpa() {
        // Arrange / Act
        let mode = SecurityMode::from_capabilities("WPA-PSK-CCMP");

        // Assert – no WEP/EAP substrings present, precedence reaches WPA
        assert_eq!(mode, SecurityMode::Wpa);
    }

    #[test]
    fn test_bare_wep_capability_resolves_to_wep() {
        assert_eq!(SecurityMode::from_capabilities("WEP"), SecurityMode::Wep);
    }

    #[test]
    fn test_empty_capability_resolves_to_open() {
        assert_eq!(SecurityMode::from_capabilities(""), SecurityMode::Open);
    }

    #[test]
    fn test_wep_token_takes_precedence_over_wpa() {
        // A multi-token capability string: WEP is checked first and wins,
        // even though WPA is the stronger scheme.
        let mode = SecurityMode::from_capabilities("[WPA2-PSK-CCMP][WEP][ESS]");
        assert_eq!(mode, SecurityMode::Wep);
    }

    #[test]
    fn test_eap_token_takes_precedence_over_wpa() {
        let mode = SecurityMode::from_capabilities("[WPA2-EAP-CCMP][ESS]");
        assert_eq!(mode, SecurityMode::Eap);
    }

    #[test]
    fn test_unrelated_capability_tokens_resolve_to_open() {
        assert_eq!(
            SecurityMode::from_capabilities("[ESS][WPS]"),
            SecurityMode::Open
        );
    }

    #[test]
    fn test_descriptor_security_mode_uses_capability_string() {
        // Arrange
        let descriptor = NetworkDescriptor {
            ssid: "Home".to_string(),
            capabilities: "[WPA2-PSK-CCMP][ESS]".to_string(),
            signal_level: -48,
        };

        // Act / Assert
        assert_eq!(descriptor.security_mode(), SecurityMode::Wpa);
    }

    // ── Secret policy ─────────────────────────────────────────────────────────

    #[test]
    fn test_secret_policy_rejects_short_secret() {
        let creds = NetworkCredentials::with_secret("Home", "short");
        assert!(!creds.secret_meets_policy());
    }

    #[test]
    fn test_secret_policy_rejects_missing_secret() {
        let creds = NetworkCredentials::open("Home");
        assert!(!creds.secret_meets_policy());
    }

    #[test]
    fn test_secret_policy_accepts_eight_characters() {
        let creds = NetworkCredentials::with_secret("Home", "pass1234");
        assert!(creds.secret_meets_policy());
    }

    #[test]
    fn test_requires_min_length_secret_only_for_wpa_and_eap() {
        assert!(SecurityMode::Wpa.requires_min_length_secret());
        assert!(SecurityMode::Eap.requires_min_length_secret());
        assert!(!SecurityMode::Wep.requires_min_length_secret());
        assert!(!SecurityMode::Open.requires_min_length_secret());
    }

    // ── Endpoint formatting ───────────────────────────────────────────────────

    #[test]
    fn test_socket_endpoint_display_is_host_colon_port() {
        let endpoint = SocketEndpoint::new("10.0.0.5", 9000);
        assert_eq!(endpoint.to_string(), "10.0.0.5:9000");
    }
}
