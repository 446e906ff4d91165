//! Service orchestration
//!
//! Builds the device adapter, price feed, settings store, scheduler and
//! mirror from the configuration and runs their loops next to the web
//! server until shutdown.

use crate::config::Config;
use crate::controls::HysteresisController;
use crate::device::{DeviceStatePort, NilanController};
use crate::error::{PowersaveError, Result};
use crate::logging::{LogContext, StructuredLogger, get_logger_with_context};
use crate::mirror::DeviceMirror;
use crate::persistence::PersistenceManager;
use crate::pricing::{HttpPriceFeed, PriceFeedPort};
use crate::scheduler::{DailyRefreshGate, PriceScheduler, run_supervised};
use crate::settings::{SettingsHandle, ThresholdConfig};
use crate::web::AppState;
use chrono_tz::Tz;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, broadcast, watch};

/// Running state of the service
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverState {
    Initializing,
    Running,
    ShuttingDown,
}

/// Owns every long-running part of the service
pub struct PowersaveDriver {
    config: Arc<Config>,
    tz: Tz,
    settings: SettingsHandle,
    device: Arc<dyn DeviceStatePort>,
    scheduler: PriceScheduler,
    mirror: DeviceMirror,
    status_tx: broadcast::Sender<String>,
    state: watch::Sender<DriverState>,
    logger: StructuredLogger,
}

impl PowersaveDriver {
    /// Build the driver with the Modbus device and HTTP price feed
    pub fn new(config: Config) -> Result<Self> {
        let device: Arc<dyn DeviceStatePort> =
            Arc::new(NilanController::new(&config.device, &config.registers));
        let feed: Arc<dyn PriceFeedPort> = Arc::new(HttpPriceFeed::new(Duration::from_secs(
            config.price_feed.timeout_seconds,
        ))?);

        let mut store = PersistenceManager::new(&config.state_file);
        if let Err(e) = store.load() {
            get_logger_with_context(LogContext::new("driver"))
                .warn(&format!("Ignoring unreadable state file: {}", e));
        }
        let settings =
            SettingsHandle::with_persistence(ThresholdConfig::from(&config.thresholds), store);

        Self::with_ports(config, feed, device, settings)
    }

    /// Build the driver around the given ports
    pub fn with_ports(
        config: Config,
        feed: Arc<dyn PriceFeedPort>,
        device: Arc<dyn DeviceStatePort>,
        settings: SettingsHandle,
    ) -> Result<Self> {
        let tz = config.tz()?;
        let logger = get_logger_with_context(
            LogContext::new("driver").with_device_unit(config.device.slave_id),
        );

        let scheduler = PriceScheduler::new(
            feed,
            device.clone(),
            settings.clone(),
            config.price_feed.clone(),
            DailyRefreshGate::new(config.scheduler.trigger_hour),
            HysteresisController::new(config.scheduler.pause_duration_minutes),
        );
        let (status_tx, _) = broadcast::channel::<String>(100);
        let mirror = DeviceMirror::new(device.clone(), status_tx.clone());
        let (state, _) = watch::channel(DriverState::Initializing);

        Ok(Self {
            config: Arc::new(config),
            tz,
            settings,
            device,
            scheduler,
            mirror,
            status_tx,
            state,
            logger,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn settings(&self) -> &SettingsHandle {
        &self.settings
    }

    pub fn subscribe_state(&self) -> watch::Receiver<DriverState> {
        self.state.subscribe()
    }

    /// Shared state for the web layer
    pub fn app_state(&self) -> AppState {
        AppState::new(
            self.config.clone(),
            self.settings.clone(),
            self.device.clone(),
            &self.scheduler,
            &self.mirror,
            self.status_tx.clone(),
        )
    }

    /// Run every loop until `shutdown` flips to true
    pub async fn run(self, shutdown: watch::Receiver<bool>) -> Result<()> {
        let app_state = self.app_state();
        let Self {
            config,
            tz,
            scheduler,
            mirror,
            state,
            logger,
            ..
        } = self;

        let thresholds = app_state.settings.snapshot();
        logger.info(&format!(
            "Starting: device {}:{} unit {}, refresh at {:02}:00 {}, K={}, auto mode {}",
            config.device.ip,
            config.device.port,
            config.device.slave_id,
            config.scheduler.trigger_hour,
            tz,
            thresholds.run_hours,
            if thresholds.auto_mode_enabled { "on" } else { "off" }
        ));

        let decision_period = Duration::from_secs(config.scheduler.decision_interval_seconds);
        let mirror_period = Duration::from_secs(config.scheduler.mirror_interval_seconds);

        let scheduler_task = tokio::spawn(run_supervised(
            Arc::new(Mutex::new(scheduler)),
            tz,
            decision_period,
            shutdown.clone(),
        ));
        let mirror_task = tokio::spawn(Arc::new(mirror).run(mirror_period, shutdown.clone()));
        let web_task = config.web.enabled.then(|| {
            let host = config.web.host.clone();
            let port = config.web.port;
            let web_shutdown = shutdown.clone();
            let web_logger = logger.clone();
            tokio::spawn(async move {
                if let Err(e) = crate::web::serve(app_state, &host, port, web_shutdown).await {
                    web_logger.error(&format!("Web server error: {}", e));
                }
            })
        });

        state.send_replace(DriverState::Running);

        let mut failure = None;
        if let Err(e) = scheduler_task.await {
            failure = Some(PowersaveError::generic(format!("decision loop ended: {}", e)));
        }
        if let Err(e) = mirror_task.await {
            failure = Some(PowersaveError::generic(format!("mirror loop ended: {}", e)));
        }
        if let Some(task) = web_task
            && let Err(e) = task.await
        {
            failure = Some(PowersaveError::web(format!("web task ended: {}", e)));
        }

        state.send_replace(DriverState::ShuttingDown);
        logger.info("Shutdown complete");
        failure.map_or(Ok(()), Err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{Readings, Settings, SettingsUpdate, VentilationMode};
    use async_trait::async_trait;

    struct StaticFeed;

    #[async_trait]
    impl PriceFeedPort for StaticFeed {
        async fn fetch_page(&self, url: &str) -> Result<String> {
            Err(PowersaveError::fetch(url, "not in tests"))
        }
    }

    struct Idle;

    #[async_trait]
    impl DeviceStatePort for Idle {
        async fn fetch_readings(&self) -> Result<Readings> {
            Err(PowersaveError::timeout("offline"))
        }

        async fn fetch_settings(&self) -> Result<Settings> {
            Ok(Settings {
                central_heating_on: false,
                central_heating_paused: false,
                desired_room_temp: 200,
                ventilation_mode: VentilationMode::Auto,
                ventilation_paused: false,
                fan_speed: 1,
                desired_dhw_temp: 500,
                dhw_production_paused: false,
                setpoint_supply_temp: 300,
            })
        }

        async fn send_settings(&self, _update: &SettingsUpdate) -> Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let mut config = Config::default();
        config.web.enabled = false;
        let settings = SettingsHandle::new(ThresholdConfig::from(&config.thresholds));
        let driver =
            PowersaveDriver::with_ports(config, Arc::new(StaticFeed), Arc::new(Idle), settings)
                .unwrap();
        let state_rx = driver.subscribe_state();

        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(driver.run(rx));
        tokio::time::sleep(Duration::from_millis(50)).await;
        tx.send(true).unwrap();
        handle.await.unwrap().unwrap();
        assert_eq!(*state_rx.borrow(), DriverState::ShuttingDown);
    }

    #[test]
    fn test_rejects_unknown_timezone() {
        let mut config = Config::default();
        config.timezone = "Mars/Olympus".to_string();
        let settings = SettingsHandle::new(ThresholdConfig::from(&config.thresholds));
        let result =
            PowersaveDriver::with_ports(config, Arc::new(StaticFeed), Arc::new(Idle), settings);
        assert!(result.is_err());
    }
}
