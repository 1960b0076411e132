//! Pure domain types with no OS or I/O dependencies.

pub mod network;
