//! wifilink-client library entry point.
//!
//! Re-exports all public modules so that integration tests in `tests/`
//! and the binary entry point in `main.rs` share the same module tree.
//!
//! # What does wifilink-client do? (for beginners)
//!
//! The engine takes one command – "join network X and open a socket to
//! host:port on it" – and drives two independently-failing subsystems to
//! completion:
//!
//! 1. The **association manager** asks the platform radio to join the target
//!    network (scan, derive security mode, install a profile, reconnect).
//!    The platform reports the outcome later on its own event feed.
//! 2. On a matching association, the **socket manager** opens a TCP channel
//!    and runs a read loop for the life of the session.
//! 3. The **orchestrator** sequences the two, retries wrong-network
//!    associations up to a budget, enforces a connect timeout, and merges
//!    both event streams into one ordered stream for the caller.
//!
//! Callers interact only with [`application::session::LinkOrchestrator`]
//! (spawn) and the [`application::session::LinkHandle`] it returns.

/// Application layer: the orchestration use case.
pub mod application;

/// Infrastructure layer: the platform capability surface, the association
/// manager, and the socket manager.
pub mod infrastructure;

/// TOML configuration persistence.
pub mod config;
