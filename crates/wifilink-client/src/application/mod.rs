//! Application layer: the link-session orchestration use case.

pub mod session;
