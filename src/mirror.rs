//! Fast device mirror
//!
//! Reads the unit's sensors and settings on its own interval and publishes
//! them for the web layer. Independent of the decision loop, so a slow price
//! fetch never delays the mirrored values.

use crate::device::{DeviceStatePort, Readings, Settings};
use crate::logging::{StructuredLogger, get_logger};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use utoipa::ToSchema;

/// Last known device values
#[derive(Debug, Clone, Default, Serialize, ToSchema)]
pub struct DeviceSnapshot {
    /// Time of the last poll, successful or not
    #[schema(value_type = Option<String>)]
    pub polled_at: Option<DateTime<Utc>>,
    /// Time of the last successful poll
    #[schema(value_type = Option<String>)]
    pub updated_at: Option<DateTime<Utc>>,
    pub readings: Option<Readings>,
    pub settings: Option<Settings>,
    /// Error of the last poll; earlier values are kept but stale
    pub error: Option<String>,
    pub consecutive_failures: u32,
}

impl DeviceSnapshot {
    pub const fn is_stale(&self) -> bool {
        self.error.is_some()
    }
}

pub struct DeviceMirror {
    device: Arc<dyn DeviceStatePort>,
    snapshot_tx: watch::Sender<Arc<DeviceSnapshot>>,
    status_tx: broadcast::Sender<String>,
    logger: StructuredLogger,
}

impl DeviceMirror {
    pub fn new(device: Arc<dyn DeviceStatePort>, status_tx: broadcast::Sender<String>) -> Self {
        let (snapshot_tx, _) = watch::channel(Arc::new(DeviceSnapshot::default()));
        Self {
            device,
            snapshot_tx,
            status_tx,
            logger: get_logger("mirror"),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<DeviceSnapshot>> {
        self.snapshot_tx.subscribe()
    }

    /// Poll the device once and publish the result
    pub async fn poll_once(&self) -> Arc<DeviceSnapshot> {
        let previous = self.snapshot_tx.borrow().clone();
        let now = Utc::now();
        let result = async {
            let readings = self.device.fetch_readings().await?;
            let settings = self.device.fetch_settings().await?;
            Ok::<_, crate::error::PowersaveError>((readings, settings))
        }
        .await;

        let snapshot = match result {
            Ok((readings, settings)) => {
                if previous.consecutive_failures > 0 {
                    self.logger.info(&format!(
                        "Device reachable again after {} failed polls",
                        previous.consecutive_failures
                    ));
                }
                DeviceSnapshot {
                    polled_at: Some(now),
                    updated_at: Some(now),
                    readings: Some(readings),
                    settings: Some(settings),
                    error: None,
                    consecutive_failures: 0,
                }
            }
            Err(e) => {
                if previous.consecutive_failures == 0 {
                    self.logger.warn(&format!("Device poll failed: {}", e));
                } else {
                    self.logger.debug(&format!("Device poll failed again: {}", e));
                }
                DeviceSnapshot {
                    polled_at: Some(now),
                    error: Some(e.to_string()),
                    consecutive_failures: previous.consecutive_failures.saturating_add(1),
                    ..(*previous).clone()
                }
            }
        };

        let snapshot = Arc::new(snapshot);
        self.snapshot_tx.send_replace(snapshot.clone());
        if let Ok(json) = serde_json::to_string(snapshot.as_ref()) {
            // No receivers is fine
            let _ = self.status_tx.send(json);
        }
        snapshot
    }

    /// Poll every `period` until `shutdown` flips to true.
    ///
    /// Each poll runs in its own task; a panicking poll is logged and the
    /// loop waits one extra period before polling again.
    pub async fn run(self: Arc<Self>, period: Duration, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        self.logger.info(&format!(
            "Device mirror started, period {}s",
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

            let mirror = self.clone();
            match tokio::spawn(async move { mirror.poll_once().await }).await {
                Ok(_) => {}
                Err(e) if e.is_panic() => {
                    self.logger.error(&format!(
                        "Device poll panicked, restarting in {}s",
                        period.as_secs()
                    ));
                    tokio::select! {
                        _ = tokio::time::sleep(period) => {}
                        _ = shutdown.changed() => break,
                    }
                }
                Err(e) => self.logger.warn(&format!("Device poll cancelled: {}", e)),
            }
        }
        self.logger.info("Device mirror stopped");
    }
}
