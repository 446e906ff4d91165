use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Ventilation operating mode as stored by the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum VentilationMode {
    Auto,
    Cooling,
    Heating,
}

impl VentilationMode {
    pub const fn register_value(self) -> u16 {
        match self {
            Self::Auto => 0,
            Self::Cooling => 1,
            Self::Heating => 2,
        }
    }

    pub const fn from_register(value: u16) -> Option<Self> {
        match value {
            0 => Some(Self::Auto),
            1 => Some(Self::Cooling),
            2 => Some(Self::Heating),
            _ => None,
        }
    }
}

/// Sensor readings; temperatures in tenths of a degree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Readings {
    pub room_temp: i32,
    /// Relative humidity in percent
    pub humidity: i32,
    pub dhw_tank_top_temp: i32,
    pub supply_flow_temp: i32,
    pub outdoor_temp: i32,
}

/// Controller settings; temperatures in tenths of a degree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Settings {
    pub central_heating_on: bool,
    pub central_heating_paused: bool,
    pub desired_room_temp: i32,
    pub ventilation_mode: VentilationMode,
    pub ventilation_paused: bool,
    /// Fan level 1..=4
    pub fan_speed: u8,
    pub desired_dhw_temp: i32,
    pub dhw_production_paused: bool,
    pub setpoint_supply_temp: i32,
}

/// Partial settings write; only `Some` fields reach the controller
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettingsUpdate {
    pub central_heating_on: Option<bool>,
    pub central_heating_paused: Option<bool>,
    pub central_heating_pause_duration: Option<u16>,
    pub desired_room_temp: Option<i32>,
    pub ventilation_mode: Option<VentilationMode>,
    pub ventilation_paused: Option<bool>,
    pub ventilation_pause_duration: Option<u16>,
    pub fan_speed: Option<u8>,
    pub desired_dhw_temp: Option<i32>,
    pub dhw_production_paused: Option<bool>,
    pub dhw_pause_duration: Option<u16>,
    pub setpoint_supply_temp: Option<i32>,
}

impl SettingsUpdate {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// The slice of device state the heating decision looks at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct DeviceState {
    /// Tank-top temperature in tenths of a degree
    pub current_dhw_temp: i32,
    /// Hot-water target in tenths of a degree
    pub desired_dhw_temp: i32,
    pub dhw_paused: bool,
}

impl DeviceState {
    pub const fn from_parts(readings: &Readings, settings: &Settings) -> Self {
        Self {
            current_dhw_temp: readings.dhw_tank_top_temp,
            desired_dhw_temp: settings.desired_dhw_temp,
            dhw_paused: settings.dhw_production_paused,
        }
    }

    /// Whole degrees the tank is below target, truncated toward zero
    pub const fn deficit_degrees(&self) -> i32 {
        (self.desired_dhw_temp - self.current_dhw_temp) / 10
    }
}
