//! Shared service helpers: telemetry wiring and at-rest secret decryption.

pub mod secret;
pub mod telemetry;

pub use secret::*;
pub use telemetry::*;
