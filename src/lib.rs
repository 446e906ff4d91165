//! # Nilan Powersave - price-aware hot-water scheduling for Nilan units
//!
//! Fetches the day's hourly electricity prices, picks the K cheapest hours
//! and pauses or resumes domestic hot-water production on a Nilan CTS700
//! controller over Modbus TCP, with a temperature safety override.
//!
//! ## Architecture
//!
//! - `config`: YAML configuration and validation
//! - `logging`: Structured logging and tracing
//! - `pricing`: Price feed retrieval, table parsing and cheapest-hour selection
//! - `scheduler`: Daily refresh gate and the supervised decision loop
//! - `controls`: Hysteresis decision for hot-water production
//! - `device`: Device-state port and the Nilan register adapter
//! - `modbus`: Modbus TCP client with reconnect and retry
//! - `mirror`: Fast device polling for the API
//! - `settings`: User thresholds shared between loops and the API
//! - `persistence`: JSON key/value state file
//! - `web`: HTTP control API
//! - `driver`: Wiring and lifecycle

pub mod config;
pub mod controls;
pub mod device;
pub mod driver;
pub mod error;
pub mod logging;
pub mod mirror;
pub mod modbus;
pub mod persistence;
pub mod pricing;
pub mod scheduler;
pub mod settings;
pub mod web;

// Re-export commonly used types
pub use config::Config;
pub use driver::PowersaveDriver;
pub use error::{PowersaveError, Result};
