//! # wifilink-core
//!
//! Shared library for wifilink containing the domain entities and the event
//! vocabulary exchanged between the association manager, the socket manager,
//! the orchestrator, and the caller.
//!
//! This crate is used by the client engine and by integration tests.
//! It has zero dependencies on OS APIs, radio hardware, or network sockets.
//!
//! # Architecture overview (for beginners)
//!
//! wifilink is a connection bootstrapper: given a wireless network name, an
//! optional passphrase, and a server address, it joins the network and opens
//! a TCP stream to the server, reporting everything that happens on a single
//! ordered event stream.  Two independently-failing subsystems cooperate:
//!
//! - The **association manager** talks to the platform radio: it scans for
//!   the target network, derives its security mode, installs a profile, and
//!   asks the platform to reconnect.  Completion arrives asynchronously via
//!   the platform's own network-state feed.
//!
//! - The **socket manager** owns one TCP channel: connect, read loop, write,
//!   close.
//!
//! This crate defines:
//!
//! - **`domain`** – Pure value types: credentials, scan descriptors, the
//!   security-mode derivation, socket endpoints.
//!
//! - **`event`** – The typed events each subsystem emits and the merged
//!   listener-facing stream, together with the full error taxonomy.

pub mod domain;
pub mod event;

// Re-export the most-used types at the crate root so callers can write
// `wifilink_core::SecurityMode` instead of the full module path.
pub use domain::network::{
    NetworkCredentials, NetworkDescriptor, SecurityMode, SocketEndpoint,
};
pub use event::{
    LinkErrorKind, LinkEvent, ScanErrorKind, ScanEvent, SocketErrorKind, SocketEvent,
    WifiErrorKind, WifiEvent,
};
