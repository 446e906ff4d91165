//! Hot-water heating decision.
//!
//! Given the tank state, the cheap hours of the day and the user's
//! thresholds, decide whether hot-water production should be resumed,
//! paused, or left alone. The decision is pure; the scheduler performs the
//! device write.

use crate::device::{DeviceState, SettingsUpdate};
use crate::pricing::SelectedHours;
use crate::settings::ThresholdConfig;
use serde::Serialize;
use std::fmt;
use utoipa::ToSchema;

/// Write to issue for hot-water production
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum DhwCommand {
    /// Clear the pause flag and its duration
    Resume,
    /// Set the pause flag for `minutes`
    Pause { minutes: u16 },
}

impl DhwCommand {
    pub fn to_update(self) -> SettingsUpdate {
        let (paused, minutes) = match self {
            Self::Resume => (false, 0),
            Self::Pause { minutes } => (true, minutes),
        };
        SettingsUpdate {
            dhw_production_paused: Some(paused),
            dhw_pause_duration: Some(minutes),
            ..SettingsUpdate::default()
        }
    }
}

/// What made the controller want heat (or not)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum HeatReason {
    /// The current hour is one of the selected cheap hours
    CheapHour,
    /// The tank is far enough below target to heat regardless of price
    SafetyDeficit,
    /// Outside cheap hours with an acceptable deficit
    Idle,
}

/// Outcome of one decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct Decision {
    pub should_heat: bool,
    pub reason: HeatReason,
    /// Whole degrees below target, truncated toward zero
    pub deficit: i32,
    pub command: Option<DhwCommand>,
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let action = match self.command {
            Some(DhwCommand::Resume) => "resume".to_string(),
            Some(DhwCommand::Pause { minutes }) => format!("pause {}min", minutes),
            None => "no change".to_string(),
        };
        write!(
            f,
            "heat={} reason={:?} deficit={} -> {}",
            self.should_heat, self.reason, self.deficit, action
        )
    }
}

/// Two-threshold controller for hot-water production
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HysteresisController {
    pause_minutes: u16,
}

impl HysteresisController {
    pub const fn new(pause_minutes: u16) -> Self {
        Self { pause_minutes }
    }

    pub const fn pause_minutes(&self) -> u16 {
        self.pause_minutes
    }

    /// Decide for local clock `hour`.
    ///
    /// Heat when the hour is selected or the deficit reaches the must-heat
    /// threshold; resume only if currently paused. Otherwise pause only when
    /// the deficit is below the stop-heat threshold and production is
    /// running. Nothing is written while auto mode is off.
    pub fn decide(
        &self,
        state: &DeviceState,
        selected: &SelectedHours,
        hour: u32,
        thresholds: &ThresholdConfig,
    ) -> Decision {
        let deficit = state.deficit_degrees();
        let cheap = selected.contains(hour);
        let forced = deficit >= thresholds.must_heat_delta;
        let should_heat = cheap || forced;

        let reason = if cheap {
            HeatReason::CheapHour
        } else if forced {
            HeatReason::SafetyDeficit
        } else {
            HeatReason::Idle
        };

        let command = if !thresholds.auto_mode_enabled {
            None
        } else if should_heat {
            state.dhw_paused.then_some(DhwCommand::Resume)
        } else if deficit < thresholds.stop_heat_delta && !state.dhw_paused {
            Some(DhwCommand::Pause {
                minutes: self.pause_minutes,
            })
        } else {
            None
        };

        Decision {
            should_heat,
            reason,
            deficit,
            command,
        }
    }
}

impl Default for HysteresisController {
    fn default() -> Self {
        Self::new(180)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn thresholds(must: i32, stop: i32) -> ThresholdConfig {
        ThresholdConfig {
            auto_mode_enabled: true,
            must_heat_delta: must,
            stop_heat_delta: stop,
            run_hours: 3,
        }
    }

    fn tank(current: i32, desired: i32, paused: bool) -> DeviceState {
        DeviceState {
            current_dhw_temp: current,
            desired_dhw_temp: desired,
            dhw_paused: paused,
        }
    }

    #[test]
    fn test_resume_in_cheap_hour() {
        let ctl = HysteresisController::default();
        let sel = SelectedHours::from_slots(vec![Some(2), Some(14), None]);
        let d = ctl.decide(&tank(480, 500, true), &sel, 14, &thresholds(20, 5));
        assert!(d.should_heat);
        assert_eq!(d.reason, HeatReason::CheapHour);
        assert_eq!(d.command, Some(DhwCommand::Resume));
    }

    #[test]
    fn test_pause_outside_cheap_hours() {
        let ctl = HysteresisController::new(180);
        let sel = SelectedHours::from_slots(vec![Some(2)]);
        let d = ctl.decide(&tank(480, 500, false), &sel, 10, &thresholds(20, 5));
        assert!(!d.should_heat);
        assert_eq!(d.command, Some(DhwCommand::Pause { minutes: 180 }));
    }

    #[test]
    fn test_safety_override() {
        let ctl = HysteresisController::default();
        let d = ctl.decide(&tank(300, 500, true), &SelectedHours::unset(3), 10, &thresholds(20, 5));
        assert_eq!(d.reason, HeatReason::SafetyDeficit);
        assert_eq!(d.command, Some(DhwCommand::Resume));
    }

    #[test]
    fn test_dead_band_keeps_state() {
        let ctl = HysteresisController::default();
        let sel = SelectedHours::unset(3);
        // deficit 10 sits between stop (5) and must (20)
        let d = ctl.decide(&tank(400, 500, false), &sel, 10, &thresholds(20, 5));
        assert!(!d.should_heat);
        assert_eq!(d.command, None);
    }

    #[test]
    fn test_auto_mode_off_writes_nothing() {
        let ctl = HysteresisController::default();
        let mut t = thresholds(20, 5);
        t.auto_mode_enabled = false;
        let d = ctl.decide(&tank(300, 500, true), &SelectedHours::unset(1), 3, &t);
        assert!(d.should_heat);
        assert_eq!(d.command, None);
    }

    #[test]
    fn test_command_updates() {
        let resume = DhwCommand::Resume.to_update();
        assert_eq!(resume.dhw_production_paused, Some(false));
        assert_eq!(resume.dhw_pause_duration, Some(0));
        let pause = DhwCommand::Pause { minutes: 180 }.to_update();
        assert_eq!(pause.dhw_production_paused, Some(true));
        assert_eq!(pause.dhw_pause_duration, Some(180));
    }
}
