//! Infrastructure layer: platform adapters and the two connection managers.

pub mod platform;
pub mod socket;
pub mod wifi;
