//! Risk register runtime: configuration, tracing setup and the composition
//! root that wires storage, policy, notifications and scoring together.

#![deny(unsafe_code)]

pub mod config;
mod error;
mod register;
mod telemetry;

pub use config::{LoggingConfig, RegisterConfig, StorageConfig};
pub use error::{RuntimeError, RuntimeResult};
pub use register::RiskRegister;
pub use telemetry::init_tracing;
