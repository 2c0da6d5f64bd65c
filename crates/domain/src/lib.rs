//! Domain-level building blocks shared by the storage adapters and the
//! monitor binary: configuration loading, the config/wallet models, storage
//! traits and the telemetry/secret helpers.

pub mod config;
pub mod model;
pub mod schedule;
pub mod services;
pub mod storage;

pub use model::*;
pub use schedule::{Schedule, ScheduleError};
pub use storage::*;
