use super::*;

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            ip: "192.168.1.50".to_string(),
            port: 502,
            slave_id: 30,
            operation_timeout_ms: 2000,
            max_retries: 3,
            retry_delay_ms: 500,
        }
    }
}

impl Default for RegistersConfig {
    fn default() -> Self {
        Self {
            outdoor_temp: 208,
            dhw_tank_top_temp: 211,
            supply_flow_temp: 218,
            room_temp: 215,
            humidity: 221,
            central_heating_on: 1001,
            central_heating_paused: 1020,
            central_heating_pause_duration: 1021,
            ventilation_mode: 1002,
            ventilation_paused: 1010,
            ventilation_pause_duration: 1011,
            fan_speed: 1003,
            desired_room_temp: 1004,
            desired_dhw_temp: 1700,
            dhw_paused: 1701,
            dhw_pause_duration: 1702,
            setpoint_supply_temp: 1800,
        }
    }
}

impl Default for PriceFeedConfig {
    fn default() -> Self {
        Self {
            url: "https://andelenergi.dk/kundeservice/aftaler-og-priser/timepris/".to_string(),
            element_id: "chart-component".to_string(),
            attribute: "data-chart".to_string(),
            timeout_seconds: 15,
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            trigger_hour: 20,
            decision_interval_seconds: 60,
            mirror_interval_seconds: 5,
            pause_duration_minutes: 180,
        }
    }
}

impl Default for ThresholdDefaults {
    fn default() -> Self {
        Self {
            auto_mode: true,
            must_heat_delta: 20,
            stop_heat_delta: 5,
            run_hours: 3,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "INFO".to_string(),
            file: "/tmp/nilan-powersave.log".to_string(),
            backup_count: 7,
            console_output: true,
            json_format: false,
        }
    }
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: "127.0.0.1".to_string(),
            port: 8089,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            device: DeviceConfig::default(),
            registers: RegistersConfig::default(),
            price_feed: PriceFeedConfig::default(),
            scheduler: SchedulerConfig::default(),
            thresholds: ThresholdDefaults::default(),
            logging: LoggingConfig::default(),
            web: WebConfig::default(),
            timezone: "Europe/Copenhagen".to_string(),
            state_file: "/data/nilan_powersave_state.json".to_string(),
        }
    }
}
