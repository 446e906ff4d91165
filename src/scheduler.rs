//! Decision loop
//!
//! Every tick the scheduler may refresh the day's prices, then reads the
//! hot-water tank and lets the hysteresis controller decide whether to
//! pause or resume production. Selected hours and per-tick status are
//! published on watch channels for the web layer.

pub mod gate;

pub use gate::DailyRefreshGate;

use crate::config::PriceFeedConfig;
use crate::controls::{Decision, HysteresisController};
use crate::device::{DeviceStatePort, read_device_state};
use crate::error::Result;
use crate::logging::{StructuredLogger, get_logger};
use crate::pricing::{
    PriceFeedPort, PriceTable, SelectedHours, extract_chart_payload, parse_price_table,
    select_lowest_hours, selected_prices,
};
use crate::settings::SettingsHandle;
use chrono::{DateTime, NaiveDateTime, Timelike, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, watch};
use utoipa::ToSchema;

/// What happened to the price table during a tick
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RefreshStatus {
    /// Gate closed and K unchanged
    NotDue,
    /// Fresh table fetched and a new selection published
    Refreshed,
    /// Cached table re-selected for a new K
    Reselected,
    /// Refresh failed; the previous selection stays in effect
    Failed { message: String },
}

/// Summary of one scheduler tick
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct TickReport {
    /// Local time the tick ran for
    #[schema(value_type = String)]
    pub local_time: NaiveDateTime,
    pub refresh: RefreshStatus,
    /// Absent when the device could not be read
    pub decision: Option<Decision>,
    /// A pause/resume write reached the device
    pub command_sent: bool,
    /// Device read or write failure
    pub device_error: Option<String>,
}

/// Scheduler status published after every tick
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SchedulerStatus {
    #[schema(value_type = Option<String>)]
    pub updated_at: Option<DateTime<Utc>>,
    pub last_tick: Option<TickReport>,
    /// Time of the last successful price refresh
    #[schema(value_type = Option<String>)]
    pub last_refresh: Option<DateTime<Utc>>,
}

/// Price-aware hot-water scheduler
pub struct PriceScheduler {
    feed: Arc<dyn PriceFeedPort>,
    device: Arc<dyn DeviceStatePort>,
    settings: SettingsHandle,
    feed_config: PriceFeedConfig,
    gate: DailyRefreshGate,
    controller: HysteresisController,
    table: Option<Arc<PriceTable>>,
    selected_tx: watch::Sender<Arc<SelectedHours>>,
    table_tx: watch::Sender<Option<Arc<PriceTable>>>,
    status_tx: watch::Sender<Arc<SchedulerStatus>>,
    last_refresh: Option<DateTime<Utc>>,
    logger: StructuredLogger,
}

impl PriceScheduler {
    pub fn new(
        feed: Arc<dyn PriceFeedPort>,
        device: Arc<dyn DeviceStatePort>,
        settings: SettingsHandle,
        feed_config: PriceFeedConfig,
        gate: DailyRefreshGate,
        controller: HysteresisController,
    ) -> Self {
        let k = settings.snapshot().run_hours;
        let (selected_tx, _) = watch::channel(Arc::new(SelectedHours::unset(k)));
        let (table_tx, _) = watch::channel(None);
        let (status_tx, _) = watch::channel(Arc::new(SchedulerStatus {
            updated_at: None,
            last_tick: None,
            last_refresh: None,
        }));
        Self {
            feed,
            device,
            settings,
            feed_config,
            gate,
            controller,
            table: None,
            selected_tx,
            table_tx,
            status_tx,
            last_refresh: None,
            logger: get_logger("scheduler"),
        }
    }

    pub fn subscribe_selection(&self) -> watch::Receiver<Arc<SelectedHours>> {
        self.selected_tx.subscribe()
    }

    pub fn subscribe_table(&self) -> watch::Receiver<Option<Arc<PriceTable>>> {
        self.table_tx.subscribe()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<Arc<SchedulerStatus>> {
        self.status_tx.subscribe()
    }

    /// Currently published selection
    pub fn selection(&self) -> Arc<SelectedHours> {
        self.selected_tx.borrow().clone()
    }

    /// Table of the last successful refresh
    pub fn latest_table(&self) -> Option<Arc<PriceTable>> {
        self.table.clone()
    }

    /// Run one tick for local time `now`
    pub async fn tick(&mut self, now: NaiveDateTime) -> TickReport {
        let hour = now.hour();
        let thresholds = self.settings.snapshot();
        let k = thresholds.run_hours;

        let refresh = if self.gate.poll(hour) {
            match self.refresh(now, k).await {
                Ok(()) => RefreshStatus::Refreshed,
                Err(e) => {
                    let message = format!(
                        "price refresh from {} at hour {} failed: {}",
                        self.feed_config.url, hour, e
                    );
                    self.logger.error(&format!(
                        "{}; keeping selection {}",
                        message,
                        self.selection()
                    ));
                    RefreshStatus::Failed { message }
                }
            }
        } else if self.selection().len() != k {
            self.reselect(k);
            RefreshStatus::Reselected
        } else {
            RefreshStatus::NotDue
        };

        let mut report = TickReport {
            local_time: now,
            refresh,
            decision: None,
            command_sent: false,
            device_error: None,
        };

        match read_device_state(self.device.as_ref()).await {
            Ok(state) => {
                let selected = self.selection();
                let decision = self.controller.decide(&state, &selected, hour, &thresholds);
                self.logger.debug(&format!(
                    "hour {} tank {}/{} paused={} selected {}: {}",
                    hour,
                    state.current_dhw_temp,
                    state.desired_dhw_temp,
                    state.dhw_paused,
                    selected,
                    decision
                ));
                if let Some(command) = decision.command {
                    match self.device.send_settings(&command.to_update()).await {
                        Ok(()) => {
                            self.logger.info(&format!("Hot water: {}", decision));
                            report.command_sent = true;
                        }
                        Err(e) => {
                            self.logger
                                .error(&format!("Failed to write hot-water command: {}", e));
                            report.device_error = Some(e.to_string());
                        }
                    }
                }
                report.decision = Some(decision);
            }
            Err(e) => {
                self.logger
                    .warn(&format!("Device state unavailable, skipping decision: {}", e));
                report.device_error = Some(e.to_string());
            }
        }

        self.status_tx.send_replace(Arc::new(SchedulerStatus {
            updated_at: Some(Utc::now()),
            last_tick: Some(report.clone()),
            last_refresh: self.last_refresh,
        }));
        report
    }

    async fn refresh(&mut self, now: NaiveDateTime, k: usize) -> Result<()> {
        let cfg = &self.feed_config;
        let page = self.feed.fetch_page(&cfg.url).await?;
        let payload = extract_chart_payload(&page, &cfg.element_id, &cfg.attribute)?;
        let table = parse_price_table(&payload, now)?;

        let missing = table.missing_hours();
        if !missing.is_empty() {
            self.logger
                .warn(&format!("Unparsable prices for hours {:?}", missing));
        }
        if table.surcharge_ignored {
            self.logger
                .warn("Distribution surcharge length differs from tariff, surcharge ignored");
        }
        self.logger.info(&format!(
            "Price table for day {} (offset {}) loaded",
            table.anchor_day, table.offset
        ));

        self.table = Some(Arc::new(table));
        self.table_tx.send_replace(self.table.clone());
        self.last_refresh = Some(Utc::now());
        self.reselect(k);
        Ok(())
    }

    /// Select K hours from the cached table, or K unset slots without one
    fn reselect(&mut self, k: usize) {
        let selected = match &self.table {
            Some(table) => {
                let selected = select_lowest_hours(table, k);
                let prices: Vec<String> = selected_prices(table, &selected)
                    .into_iter()
                    .map(|p| p.map_or_else(|| "-".to_string(), |p| format!("{:.3}", p)))
                    .collect();
                self.logger.info(&format!(
                    "Cheapest {} hours: {} at [{}]",
                    k,
                    selected,
                    prices.join(", ")
                ));
                selected
            }
            None => SelectedHours::unset(k),
        };
        self.selected_tx.send_replace(Arc::new(selected));
    }
}

/// Current wall-clock time in `tz`, without the zone
pub fn local_now(tz: Tz) -> NaiveDateTime {
    Utc::now().with_timezone(&tz).naive_local()
}

/// Run `scheduler` every `period` until `shutdown` flips to true.
///
/// Each tick runs in its own task. A panicking tick is logged and the loop
/// waits one extra period before the next attempt.
pub async fn run_supervised(
    scheduler: Arc<Mutex<PriceScheduler>>,
    tz: Tz,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let logger = get_logger("scheduler");
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    logger.info(&format!(
        "Decision loop started, period {}s",
        period.as_secs()
    ));

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
                continue;
            }
        }

        let task_scheduler = scheduler.clone();
        let now = local_now(tz);
        let handle = tokio::spawn(async move { task_scheduler.lock().await.tick(now).await });
        match handle.await {
            Ok(report) => {
                logger.trace(&format!("Tick finished: {:?}", report.refresh));
            }
            Err(e) if e.is_panic() => {
                logger.error(&format!(
                    "Decision tick panicked, restarting in {}s",
                    period.as_secs()
                ));
                tokio::select! {
                    _ = tokio::time::sleep(period) => {}
                    _ = shutdown.changed() => break,
                }
            }
            Err(e) => {
                logger.warn(&format!("Decision tick cancelled: {}", e));
            }
        }
    }
    logger.info("Decision loop stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{Readings, Settings, SettingsUpdate, VentilationMode};
    use crate::error::PowersaveError;
    use crate::settings::ThresholdConfig;
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use std::sync::Mutex as StdMutex;

    struct NoFeed;

    #[async_trait]
    impl PriceFeedPort for NoFeed {
        async fn fetch_page(&self, url: &str) -> Result<String> {
            Err(PowersaveError::fetch(url, "offline"))
        }
    }

    struct Tank {
        paused: bool,
        writes: StdMutex<Vec<SettingsUpdate>>,
    }

    #[async_trait]
    impl DeviceStatePort for Tank {
        async fn fetch_readings(&self) -> Result<Readings> {
            Ok(Readings {
                room_temp: 210,
                humidity: 400,
                dhw_tank_top_temp: 300,
                supply_flow_temp: 250,
                outdoor_temp: 50,
            })
        }

        async fn fetch_settings(&self) -> Result<Settings> {
            Ok(Settings {
                central_heating_on: true,
                central_heating_paused: false,
                desired_room_temp: 210,
                ventilation_mode: VentilationMode::Auto,
                ventilation_paused: false,
                fan_speed: 2,
                desired_dhw_temp: 500,
                dhw_production_paused: self.paused,
                setpoint_supply_temp: 300,
            })
        }

        async fn send_settings(&self, update: &SettingsUpdate) -> Result<()> {
            self.writes.lock().unwrap().push(*update);
            Ok(())
        }
    }

    fn at(hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 9)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    #[tokio::test]
    async fn test_failed_refresh_still_applies_safety_override() {
        let tank = Arc::new(Tank {
            paused: true,
            writes: StdMutex::new(Vec::new()),
        });
        let settings = SettingsHandle::new(ThresholdConfig {
            auto_mode_enabled: true,
            must_heat_delta: 20,
            stop_heat_delta: 5,
            run_hours: 3,
        });
        let mut scheduler = PriceScheduler::new(
            Arc::new(NoFeed),
            tank.clone(),
            settings,
            PriceFeedConfig::default(),
            DailyRefreshGate::new(20),
            HysteresisController::default(),
        );

        let report = scheduler.tick(at(10)).await;
        assert!(matches!(report.refresh, RefreshStatus::Failed { .. }));
        assert!(report.command_sent);
        assert!(scheduler.selection().is_unset());
        assert_eq!(tank.writes.lock().unwrap()[0].dhw_production_paused, Some(false));
    }
}
