//! Configuration management for Nilan Powersave
//!
//! This module handles loading, validation, and management of the service
//! configuration from YAML files. The location can be overridden with the
//! `POWERSAVE_CONFIG` environment variable.

use crate::error::{PowersaveError, Result};
use chrono_tz::Tz;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::Path;

mod defaults;

/// Environment variable naming an explicit configuration file
pub const CONFIG_ENV_VAR: &str = "POWERSAVE_CONFIG";

const DEFAULT_PATHS: [&str; 3] = [
    "powersave_config.yaml",
    "/data/powersave_config.yaml",
    "/etc/nilan-powersave/config.yaml",
];

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct Config {
    /// Modbus TCP connection to the Nilan controller
    pub device: DeviceConfig,

    /// Modbus register address mappings
    pub registers: RegistersConfig,

    /// Upstream electricity price page
    pub price_feed: PriceFeedConfig,

    /// Timing of the decision and mirror loops
    pub scheduler: SchedulerConfig,

    /// Initial control-surface values, used until the user changes them
    pub thresholds: ThresholdDefaults,

    /// Logging configuration
    pub logging: LoggingConfig,

    /// Web server binding configuration
    pub web: WebConfig,

    /// IANA timezone that defines the local clock hour
    pub timezone: String,

    /// JSON file holding user settings across restarts
    pub state_file: String,
}

/// Modbus TCP connection parameters
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct DeviceConfig {
    /// IP address or host name of the CTS700 gateway
    pub ip: String,

    /// TCP port (typically 502)
    pub port: u16,

    /// Modbus unit id of the controller
    pub slave_id: u8,

    /// Per-request timeout in milliseconds
    pub operation_timeout_ms: u64,

    /// Attempts per request before giving up
    pub max_retries: u32,

    /// Delay between attempts in milliseconds
    pub retry_delay_ms: u64,
}

/// CTS700 register addresses.
///
/// Input registers carry readings, holding registers carry settings.
/// Temperatures are signed hundredths of a degree on the wire.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct RegistersConfig {
    pub outdoor_temp: u16,
    pub dhw_tank_top_temp: u16,
    pub supply_flow_temp: u16,
    pub room_temp: u16,
    pub humidity: u16,

    pub central_heating_on: u16,
    pub central_heating_paused: u16,
    pub central_heating_pause_duration: u16,
    pub ventilation_mode: u16,
    pub ventilation_paused: u16,
    pub ventilation_pause_duration: u16,
    pub fan_speed: u16,
    pub desired_room_temp: u16,
    pub desired_dhw_temp: u16,
    pub dhw_paused: u16,
    pub dhw_pause_duration: u16,
    pub setpoint_supply_temp: u16,
}

/// Price feed location and extraction rules
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct PriceFeedConfig {
    /// Page that embeds the hourly price chart
    pub url: String,

    /// Id of the element carrying the chart payload
    pub element_id: String,

    /// Attribute holding the JSON payload
    pub attribute: String,

    /// Client-side request timeout in seconds
    pub timeout_seconds: u64,
}

/// Loop timing
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Local hour at which the next day's prices are fetched
    pub trigger_hour: u32,

    /// Period of the heating decision loop in seconds
    pub decision_interval_seconds: u64,

    /// Period of the device mirror loop in seconds
    pub mirror_interval_seconds: u64,

    /// Pause duration in minutes written together with a pause command
    pub pause_duration_minutes: u16,
}

/// Startup values for the control surface
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct ThresholdDefaults {
    /// Whether the service may pause and resume hot-water production
    pub auto_mode: bool,

    /// Deficit in whole degrees that forces heating
    pub must_heat_delta: i32,

    /// Deficit in whole degrees below which heating may pause
    pub stop_heat_delta: i32,

    /// Number of cheapest hours to heat in (K)
    pub run_hours: usize,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    pub level: String,

    /// Log file path; its directory receives the daily rotated files
    pub file: String,

    /// Number of rotated files to keep
    pub backup_count: u32,

    /// Whether to log to console
    pub console_output: bool,

    /// Whether to use JSON format
    pub json_format: bool,
}

/// Web server configuration
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct WebConfig {
    /// Serve the control API at all
    pub enabled: bool,

    /// Bind address
    pub host: String,

    /// TCP port
    pub port: u16,
}

impl Config {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Self = serde_yaml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from `$POWERSAVE_CONFIG` or the default locations
    pub fn load() -> Result<Self> {
        if let Some(path) = std::env::var_os(CONFIG_ENV_VAR) {
            let path = Path::new(&path);
            if !path.exists() {
                return Err(PowersaveError::config(format!(
                    "{} points to missing file {}",
                    CONFIG_ENV_VAR,
                    path.display()
                )));
            }
            return Self::from_file(path);
        }

        for path in &DEFAULT_PATHS {
            if Path::new(path).exists() {
                return Self::from_file(path);
            }
        }

        Ok(Self::default())
    }

    /// Parsed timezone
    pub fn tz(&self) -> Result<Tz> {
        Ok(self.timezone.parse::<Tz>()?)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.device.ip.trim().is_empty() {
            return Err(PowersaveError::invalid_value(
                "device.ip",
                "address cannot be empty",
            ));
        }
        if self.device.port == 0 {
            return Err(PowersaveError::invalid_value(
                "device.port",
                "must be greater than 0",
            ));
        }
        if self.device.max_retries == 0 {
            return Err(PowersaveError::invalid_value(
                "device.max_retries",
                "must be at least 1",
            ));
        }

        let url = self.price_feed.url.trim();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(PowersaveError::invalid_value(
                "price_feed.url",
                "must be an http(s) URL",
            ));
        }
        if self.price_feed.element_id.is_empty() || self.price_feed.attribute.is_empty() {
            return Err(PowersaveError::invalid_value(
                "price_feed",
                "element_id and attribute are required",
            ));
        }
        if self.price_feed.timeout_seconds == 0 {
            return Err(PowersaveError::invalid_value(
                "price_feed.timeout_seconds",
                "must be greater than 0",
            ));
        }

        if self.scheduler.trigger_hour > 23 {
            return Err(PowersaveError::invalid_value(
                "scheduler.trigger_hour",
                "must be between 0 and 23",
            ));
        }
        if self.scheduler.decision_interval_seconds == 0
            || self.scheduler.mirror_interval_seconds == 0
        {
            return Err(PowersaveError::invalid_value(
                "scheduler",
                "loop intervals must be greater than 0",
            ));
        }

        if !(1..=50).contains(&self.thresholds.must_heat_delta) {
            return Err(PowersaveError::invalid_value(
                "thresholds.must_heat_delta",
                "must be between 1 and 50",
            ));
        }
        if !(1..=50).contains(&self.thresholds.stop_heat_delta) {
            return Err(PowersaveError::invalid_value(
                "thresholds.stop_heat_delta",
                "must be between 1 and 50",
            ));
        }
        if !(1..=23).contains(&self.thresholds.run_hours) {
            return Err(PowersaveError::invalid_value(
                "thresholds.run_hours",
                "must be between 1 and 23",
            ));
        }

        crate::logging::parse_log_level(&self.logging.level)?;
        self.tz()?;

        if self.web.enabled && self.web.port == 0 {
            return Err(PowersaveError::invalid_value(
                "web.port",
                "must be greater than 0",
            ));
        }

        Ok(())
    }
}
