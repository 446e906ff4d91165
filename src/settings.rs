//! User-adjustable thresholds shared by the scheduler and the control API.

use crate::config::ThresholdDefaults;
use crate::error::{PowersaveError, Result};
use crate::logging::{StructuredLogger, get_logger};
use crate::persistence::PersistenceManager;
use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use utoipa::ToSchema;

pub const KEY_AUTO_MODE: &str = "savemode.on";
pub const KEY_RUN_HOURS: &str = "setting.runhours";
pub const KEY_MUST_HEAT: &str = "setting.mustheatdf";
pub const KEY_STOP_HEAT: &str = "setting.stopheatdf";

/// Accepted delta slider values, in tenths of a degree
const DELTA_TENTHS: RangeInclusive<i64> = 10..=500;
/// Accepted run-hour slider values, in tenths
const RUN_HOURS_TENTHS: RangeInclusive<i64> = 10..=230;

/// Thresholds the heating decision runs with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ThresholdConfig {
    /// Whether pause/resume commands may be written
    pub auto_mode_enabled: bool,
    /// Deficit in whole degrees that forces heating
    pub must_heat_delta: i32,
    /// Deficit in whole degrees below which heating may pause
    pub stop_heat_delta: i32,
    /// Number of cheapest hours to heat in (K)
    pub run_hours: usize,
}

impl From<&ThresholdDefaults> for ThresholdConfig {
    fn from(defaults: &ThresholdDefaults) -> Self {
        Self {
            auto_mode_enabled: defaults.auto_mode,
            must_heat_delta: defaults.must_heat_delta,
            stop_heat_delta: defaults.stop_heat_delta,
            run_hours: defaults.run_hours,
        }
    }
}

/// Validate a slider value against a range expressed in tenths and return
/// its whole-unit part
fn slider_value(field: &str, value: f64, tenths: &RangeInclusive<i64>) -> Result<i64> {
    if !value.is_finite() {
        return Err(PowersaveError::invalid_value(field, "not a number"));
    }
    let scaled = (value * 10.0).trunc();
    if scaled < *tenths.start() as f64 || scaled > *tenths.end() as f64 {
        return Err(PowersaveError::invalid_value(
            field,
            format!(
                "{} outside {}..={}",
                value,
                *tenths.start() as f64 / 10.0,
                *tenths.end() as f64 / 10.0
            ),
        ));
    }
    Ok(value.trunc() as i64)
}

/// Cloneable handle to the process-wide thresholds
#[derive(Clone)]
pub struct SettingsHandle {
    current: Arc<RwLock<ThresholdConfig>>,
    store: Option<Arc<Mutex<PersistenceManager>>>,
    logger: StructuredLogger,
}

impl SettingsHandle {
    /// In-memory handle, nothing is persisted
    pub fn new(initial: ThresholdConfig) -> Self {
        Self {
            current: Arc::new(RwLock::new(initial)),
            store: None,
            logger: get_logger("settings"),
        }
    }

    /// Handle backed by `store`; persisted values override `defaults`
    pub fn with_persistence(defaults: ThresholdConfig, store: PersistenceManager) -> Self {
        let logger = get_logger("settings");
        let initial = restore(defaults, &store, &logger);
        Self {
            current: Arc::new(RwLock::new(initial)),
            store: Some(Arc::new(Mutex::new(store))),
            logger,
        }
    }

    /// Consistent copy of all thresholds
    pub fn snapshot(&self) -> ThresholdConfig {
        *self.current.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_auto_mode(&self, on: bool) -> Result<()> {
        self.apply(KEY_AUTO_MODE, serde_json::Value::Bool(on), |t| {
            t.auto_mode_enabled = on;
        });
        self.logger
            .info(&format!("Auto power save mode {}", if on { "on" } else { "off" }));
        Ok(())
    }

    /// Accepts 1.0..=50.0 °C; stores whole degrees
    pub fn set_must_heat_delta(&self, value: f64) -> Result<i32> {
        let degrees = self.validated("must_heat_delta", value, &DELTA_TENTHS)? as i32;
        self.apply(KEY_MUST_HEAT, degrees.into(), |t| t.must_heat_delta = degrees);
        self.logger
            .info(&format!("Must-heat delta set to {} °C", degrees));
        Ok(degrees)
    }

    /// Accepts 1.0..=50.0 °C; stores whole degrees
    pub fn set_stop_heat_delta(&self, value: f64) -> Result<i32> {
        let degrees = self.validated("stop_heat_delta", value, &DELTA_TENTHS)? as i32;
        self.apply(KEY_STOP_HEAT, degrees.into(), |t| t.stop_heat_delta = degrees);
        self.logger
            .info(&format!("Stop-heat delta set to {} °C", degrees));
        Ok(degrees)
    }

    /// Accepts 1.0..=23.0; stores a whole number of hours
    pub fn set_run_hours(&self, value: f64) -> Result<usize> {
        let hours = self.validated("run_hours", value, &RUN_HOURS_TENTHS)? as usize;
        self.apply(KEY_RUN_HOURS, hours.into(), |t| t.run_hours = hours);
        self.logger.info(&format!("Run hours set to {}", hours));
        Ok(hours)
    }

    fn validated(&self, field: &str, value: f64, range: &RangeInclusive<i64>) -> Result<i64> {
        slider_value(field, value, range).inspect_err(|e| {
            self.logger
                .warn(&format!("Ignoring change request: {}", e));
        })
    }

    /// Commit in memory, then persist.
    ///
    /// A persistence failure is logged; the new value stays in effect.
    fn apply(&self, key: &str, value: serde_json::Value, change: impl FnOnce(&mut ThresholdConfig)) {
        {
            let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);
            change(&mut *guard);
        }
        let Some(store) = &self.store else {
            return;
        };
        let mut store = store.lock().unwrap_or_else(PoisonError::into_inner);
        if let Err(e) = store.set(key, value).and_then(|()| store.save()) {
            self.logger
                .error(&format!("Failed to persist {}: {}", key, e));
        }
    }
}

fn restore(
    defaults: ThresholdConfig,
    store: &PersistenceManager,
    logger: &StructuredLogger,
) -> ThresholdConfig {
    let mut t = defaults;
    if let Some(on) = store.get::<bool>(KEY_AUTO_MODE) {
        t.auto_mode_enabled = on;
    }
    let restore_number = |key: &str, range: &RangeInclusive<i64>| -> Option<i64> {
        let raw = store.get::<f64>(key)?;
        match slider_value(key, raw, range) {
            Ok(v) => Some(v),
            Err(e) => {
                logger.warn(&format!("Ignoring persisted value: {}", e));
                None
            }
        }
    };
    if let Some(v) = restore_number(KEY_MUST_HEAT, &DELTA_TENTHS) {
        t.must_heat_delta = v as i32;
    }
    if let Some(v) = restore_number(KEY_STOP_HEAT, &DELTA_TENTHS) {
        t.stop_heat_delta = v as i32;
    }
    if let Some(v) = restore_number(KEY_RUN_HOURS, &RUN_HOURS_TENTHS) {
        t.run_hours = v as usize;
    }
    t
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handle() -> SettingsHandle {
        SettingsHandle::new(ThresholdConfig::from(&ThresholdDefaults::default()))
    }

    #[test]
    fn test_slider_truncates() {
        let h = handle();
        assert_eq!(h.set_must_heat_delta(12.9).unwrap(), 12);
        assert_eq!(h.snapshot().must_heat_delta, 12);
        assert_eq!(h.set_run_hours(4.5).unwrap(), 4);
    }

    #[test]
    fn test_rejects_out_of_range_and_keeps_previous() {
        let h = handle();
        let before = h.snapshot();
        assert!(h.set_stop_heat_delta(0.5).is_err());
        assert!(h.set_stop_heat_delta(50.2).is_err());
        assert!(h.set_run_hours(24.0).is_err());
        assert!(h.set_must_heat_delta(f64::INFINITY).is_err());
        assert_eq!(h.snapshot(), before);
    }

    #[test]
    fn test_boundaries_accepted() {
        let h = handle();
        assert_eq!(h.set_stop_heat_delta(1.0).unwrap(), 1);
        assert_eq!(h.set_stop_heat_delta(50.0).unwrap(), 50);
        assert_eq!(h.set_run_hours(23.0).unwrap(), 23);
        assert_eq!(h.set_run_hours(1.0).unwrap(), 1);
    }

    #[test]
    fn test_clones_share_state() {
        let h = handle();
        let other = h.clone();
        h.set_auto_mode(false).unwrap();
        assert!(!other.snapshot().auto_mode_enabled);
    }
}
