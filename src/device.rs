//! Device-state port and the Nilan controller behind it.

pub mod commands;
pub mod nilan;
pub mod types;

use crate::error::Result;
use async_trait::async_trait;

pub use commands::{DeviceCommand, VentilationTarget};
pub use nilan::NilanController;
pub use types::{DeviceState, Readings, Settings, SettingsUpdate, VentilationMode};

/// Read/write access to the heating unit
#[async_trait]
pub trait DeviceStatePort: Send + Sync {
    async fn fetch_readings(&self) -> Result<Readings>;

    async fn fetch_settings(&self) -> Result<Settings>;

    /// Write every `Some` field of `update`
    async fn send_settings(&self, update: &SettingsUpdate) -> Result<()>;
}

/// Read a fresh `DeviceState`
pub async fn read_device_state(port: &dyn DeviceStatePort) -> Result<DeviceState> {
    let readings = port.fetch_readings().await?;
    let settings = port.fetch_settings().await?;
    Ok(DeviceState::from_parts(&readings, &settings))
}
