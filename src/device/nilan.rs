//! `DeviceStatePort` over Modbus TCP for the Nilan CTS700.

use super::DeviceStatePort;
use super::types::{Readings, Settings, SettingsUpdate, VentilationMode};
use crate::config::{DeviceConfig, RegistersConfig};
use crate::error::{PowersaveError, Result};
use crate::logging::{LogContext, StructuredLogger, get_logger_with_context};
use crate::modbus::{ModbusConnectionManager, decode_i16, hundredths_to_tenths, tenths_to_hundredths};
use async_trait::async_trait;
use tokio::sync::Mutex;

/// Nilan controller reached through a shared Modbus connection
pub struct NilanController {
    manager: Mutex<ModbusConnectionManager>,
    registers: RegistersConfig,
    logger: StructuredLogger,
}

impl NilanController {
    pub fn new(device: &DeviceConfig, registers: &RegistersConfig) -> Self {
        Self {
            manager: Mutex::new(ModbusConnectionManager::new(device)),
            registers: registers.clone(),
            logger: get_logger_with_context(
                LogContext::new("nilan").with_device_unit(device.slave_id),
            ),
        }
    }

    async fn input(manager: &mut ModbusConnectionManager, address: u16) -> Result<u16> {
        first_word(manager.read_input_registers(address, 1).await?, address)
    }

    async fn holding(manager: &mut ModbusConnectionManager, address: u16) -> Result<u16> {
        first_word(manager.read_holding_registers(address, 1).await?, address)
    }
}

fn first_word(words: Vec<u16>, address: u16) -> Result<u16> {
    words.first().copied().ok_or_else(|| {
        PowersaveError::device_io(format!("Empty response reading register {}", address))
    })
}

fn flag(raw: u16) -> bool {
    raw != 0
}

const fn flag_word(value: bool) -> u16 {
    if value { 1 } else { 0 }
}

#[async_trait]
impl DeviceStatePort for NilanController {
    async fn fetch_readings(&self) -> Result<Readings> {
        let regs = &self.registers;
        let mut manager = self.manager.lock().await;
        let readings = Readings {
            room_temp: hundredths_to_tenths(Self::input(&mut manager, regs.room_temp).await?),
            humidity: i32::from(decode_i16(Self::input(&mut manager, regs.humidity).await?)),
            dhw_tank_top_temp: hundredths_to_tenths(
                Self::input(&mut manager, regs.dhw_tank_top_temp).await?,
            ),
            supply_flow_temp: hundredths_to_tenths(
                Self::input(&mut manager, regs.supply_flow_temp).await?,
            ),
            outdoor_temp: hundredths_to_tenths(Self::input(&mut manager, regs.outdoor_temp).await?),
        };
        self.logger.trace(&format!("Readings: {:?}", readings));
        Ok(readings)
    }

    async fn fetch_settings(&self) -> Result<Settings> {
        let regs = &self.registers;
        let mut manager = self.manager.lock().await;

        let mode_raw = Self::holding(&mut manager, regs.ventilation_mode).await?;
        let ventilation_mode = VentilationMode::from_register(mode_raw).ok_or_else(|| {
            PowersaveError::device_io(format!("Unknown ventilation mode {}", mode_raw))
        })?;
        let fan_raw = Self::holding(&mut manager, regs.fan_speed).await?;
        let fan_speed = u8::try_from(fan_raw)
            .ok()
            .filter(|level| (1..=4).contains(level))
            .ok_or_else(|| PowersaveError::device_io(format!("Unknown fan level {}", fan_raw)))?;

        let settings = Settings {
            central_heating_on: flag(Self::holding(&mut manager, regs.central_heating_on).await?),
            central_heating_paused: flag(
                Self::holding(&mut manager, regs.central_heating_paused).await?,
            ),
            desired_room_temp: hundredths_to_tenths(
                Self::holding(&mut manager, regs.desired_room_temp).await?,
            ),
            ventilation_mode,
            ventilation_paused: flag(Self::holding(&mut manager, regs.ventilation_paused).await?),
            fan_speed,
            desired_dhw_temp: hundredths_to_tenths(
                Self::holding(&mut manager, regs.desired_dhw_temp).await?,
            ),
            dhw_production_paused: flag(Self::holding(&mut manager, regs.dhw_paused).await?),
            setpoint_supply_temp: hundredths_to_tenths(
                Self::holding(&mut manager, regs.setpoint_supply_temp).await?,
            ),
        };
        self.logger.trace(&format!("Settings: {:?}", settings));
        Ok(settings)
    }

    async fn send_settings(&self, update: &SettingsUpdate) -> Result<()> {
        let writes = register_writes(&self.registers, update)?;
        if writes.is_empty() {
            return Ok(());
        }
        let mut manager = self.manager.lock().await;
        for (address, value) in writes {
            manager.write_single_register(address, value).await?;
        }
        self.logger.info(&format!("Applied settings {:?}", update));
        Ok(())
    }
}

/// Register writes for an update, in the order they must be applied.
///
/// Pause durations go out before their pause flag so the controller picks up
/// the new duration when the pause starts.
pub fn register_writes(regs: &RegistersConfig, update: &SettingsUpdate) -> Result<Vec<(u16, u16)>> {
    let mut writes = Vec::new();

    if let Some(on) = update.central_heating_on {
        writes.push((regs.central_heating_on, flag_word(on)));
    }
    if let Some(minutes) = update.central_heating_pause_duration {
        writes.push((regs.central_heating_pause_duration, minutes));
    }
    if let Some(paused) = update.central_heating_paused {
        writes.push((regs.central_heating_paused, flag_word(paused)));
    }
    if let Some(tenths) = update.desired_room_temp {
        writes.push((regs.desired_room_temp, tenths_to_hundredths(tenths)?));
    }
    if let Some(mode) = update.ventilation_mode {
        writes.push((regs.ventilation_mode, mode.register_value()));
    }
    if let Some(minutes) = update.ventilation_pause_duration {
        writes.push((regs.ventilation_pause_duration, minutes));
    }
    if let Some(paused) = update.ventilation_paused {
        writes.push((regs.ventilation_paused, flag_word(paused)));
    }
    if let Some(level) = update.fan_speed {
        writes.push((regs.fan_speed, u16::from(level)));
    }
    if let Some(tenths) = update.desired_dhw_temp {
        writes.push((regs.desired_dhw_temp, tenths_to_hundredths(tenths)?));
    }
    if let Some(minutes) = update.dhw_pause_duration {
        writes.push((regs.dhw_pause_duration, minutes));
    }
    if let Some(paused) = update.dhw_production_paused {
        writes.push((regs.dhw_paused, flag_word(paused)));
    }
    if let Some(tenths) = update.setpoint_supply_temp {
        writes.push((regs.setpoint_supply_temp, tenths_to_hundredths(tenths)?));
    }

    Ok(writes)
}
