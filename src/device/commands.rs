use super::types::{SettingsUpdate, VentilationMode};
use crate::error::{PowersaveError, Result};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Ventilation target as offered to users; `Off` pauses ventilation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum VentilationTarget {
    Off,
    Auto,
    Cooling,
    Heating,
}

/// Direct device commands accepted by the control surface
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum DeviceCommand {
    /// Switch hot-water production on or off
    SetDhwProduction { on: bool },
    /// Switch central heating on or off
    SetCentralHeating { on: bool },
    /// Hot-water target, 10.0..=60.0 °C
    SetDhwTarget { celsius: f64 },
    /// Room target, 5.0..=40.0 °C
    SetRoomTarget { celsius: f64 },
    /// Supply-flow target, 5.0..=50.0 °C
    SetSupplyTarget { celsius: f64 },
    SetVentilation { mode: VentilationTarget },
    /// Fan speed in percent; 25/50/75/100 map to levels 1..=4
    SetFanSpeed { percent: f64 },
}

/// Convert a slider temperature to tenths and check it against `range`
fn tenths_in_range(field: &str, celsius: f64, range: std::ops::RangeInclusive<i32>) -> Result<i32> {
    if !celsius.is_finite() {
        return Err(PowersaveError::invalid_value(field, "not a number"));
    }
    let tenths = (celsius * 10.0).trunc();
    if tenths < f64::from(*range.start()) || tenths > f64::from(*range.end()) {
        return Err(PowersaveError::invalid_value(
            field,
            format!(
                "{} °C outside {:.1}..={:.1} °C",
                celsius,
                f64::from(*range.start()) / 10.0,
                f64::from(*range.end()) / 10.0
            ),
        ));
    }
    Ok(tenths as i32)
}

impl DeviceCommand {
    /// Short name used in logs and API responses
    pub const fn name(&self) -> &'static str {
        match self {
            Self::SetDhwProduction { .. } => "set_dhw_production",
            Self::SetCentralHeating { .. } => "set_central_heating",
            Self::SetDhwTarget { .. } => "set_dhw_target",
            Self::SetRoomTarget { .. } => "set_room_target",
            Self::SetSupplyTarget { .. } => "set_supply_target",
            Self::SetVentilation { .. } => "set_ventilation",
            Self::SetFanSpeed { .. } => "set_fan_speed",
        }
    }

    /// Validate the command and build the settings write it stands for.
    ///
    /// Switching something off also writes `pause_minutes` as its pause
    /// duration.
    pub fn to_update(&self, pause_minutes: u16) -> Result<SettingsUpdate> {
        let mut update = SettingsUpdate::default();
        match *self {
            Self::SetDhwProduction { on } => {
                update.dhw_production_paused = Some(!on);
                if !on {
                    update.dhw_pause_duration = Some(pause_minutes);
                }
            }
            Self::SetCentralHeating { on } => {
                update.central_heating_paused = Some(!on);
                if !on {
                    update.central_heating_pause_duration = Some(pause_minutes);
                }
            }
            Self::SetDhwTarget { celsius } => {
                update.desired_dhw_temp = Some(tenths_in_range("dhw_target", celsius, 100..=600)?);
            }
            Self::SetRoomTarget { celsius } => {
                update.desired_room_temp =
                    Some(tenths_in_range("room_target", celsius, 50..=400)?);
            }
            Self::SetSupplyTarget { celsius } => {
                update.setpoint_supply_temp =
                    Some(tenths_in_range("supply_target", celsius, 50..=500)?);
            }
            Self::SetVentilation { mode } => {
                let mode = match mode {
                    VentilationTarget::Off => None,
                    VentilationTarget::Auto => Some(VentilationMode::Auto),
                    VentilationTarget::Cooling => Some(VentilationMode::Cooling),
                    VentilationTarget::Heating => Some(VentilationMode::Heating),
                };
                update.ventilation_paused = Some(mode.is_none());
                update.ventilation_mode = mode;
            }
            Self::SetFanSpeed { percent } => {
                if !percent.is_finite() || percent < 0.0 {
                    return Err(PowersaveError::invalid_value("fan_speed", "not a percentage"));
                }
                let level = (percent / 25.0).trunc();
                if !(1.0..=4.0).contains(&level) {
                    return Err(PowersaveError::invalid_value(
                        "fan_speed",
                        format!("{}% does not map to a fan level 1..=4", percent),
                    ));
                }
                update.fan_speed = Some(level as u8);
            }
        }
        Ok(update)
    }
}
