//! SwIMU BLE tool
//!
//! Glue between the protocol drivers in `swimu-client` and the host:
//! settings in `SWIMU_HOME`, a directory sink for received files, and (with
//! the `bluetooth` feature) the btleplug transport.

#[cfg(feature = "bluetooth")]
pub mod ble;
pub mod config;
pub mod sink;

pub use config::{Config, ConfigError, swimu_home};
pub use sink::DirectorySink;
