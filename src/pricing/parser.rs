//! Turns the feed's embedded chart JSON into an hour-indexed price table.
//!
//! The feed publishes a rolling series whose "day" starts at 20:00 on the
//! previous evening. The last entry of `dates` names the newest day in the
//! series; together with the local clock it decides how far from the end of
//! `values` today's 24 entries start.

use super::types::{HOURS_PER_DAY, PriceTable};
use chrono::{Datelike, NaiveDateTime, Timelike};
use serde::Deserialize;
use thiserror::Error;

/// Offset used when the feed's newest day is the current window
pub const OFFSET_CURRENT: usize = 28;
/// Offset used when the feed already carries tomorrow before the evening switch
pub const OFFSET_AHEAD: usize = 52;
/// Local hour at which the feed's day rolls over
pub const FEED_DAY_START_HOUR: u32 = 20;

/// Why a payload could not be turned into a price table
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseFailure {
    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    #[error("anchor day label {label:?} matches neither today ({today}) nor tomorrow ({tomorrow})")]
    AnchorMismatch {
        label: String,
        today: u32,
        tomorrow: u32,
    },
}

#[derive(Debug, Deserialize)]
struct ChartPayload {
    east: RegionSeries,
}

#[derive(Debug, Deserialize)]
struct RegionSeries {
    #[serde(default)]
    values: Vec<RawValue>,
    #[serde(default, rename = "valuesDistribution")]
    values_distribution: Option<Vec<RawValue>>,
    #[serde(default)]
    dates: Vec<DateLabel>,
}

#[derive(Debug, Deserialize)]
struct DateLabel {
    #[serde(default)]
    day: String,
}

/// Feed values are decimal strings; bare numbers are tolerated too
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawValue {
    Text(String),
    Number(f64),
    Other(serde::de::IgnoredAny),
}

impl RawValue {
    fn as_price(&self) -> Option<f64> {
        let value = match self {
            Self::Text(s) => s.trim().parse::<f64>().ok()?,
            Self::Number(n) => *n,
            Self::Other(_) => return None,
        };
        value.is_finite().then_some(value)
    }
}

/// Clock hour of window position `j`
pub const fn hour_for_position(j: usize) -> u32 {
    if j < 4 { j as u32 + 20 } else { j as u32 - 4 }
}

/// Pick the anchor offset for the newest day label at local time `now`
pub fn anchor_offset(label: &str, now: NaiveDateTime) -> Result<usize, ParseFailure> {
    let today = now.day();
    let tomorrow = now.date().succ_opt().map_or(0, |d| d.day());
    let mismatch = || ParseFailure::AnchorMismatch {
        label: label.to_string(),
        today,
        tomorrow,
    };

    let day: u32 = label.trim().parse().map_err(|_| mismatch())?;
    if day == today {
        Ok(OFFSET_CURRENT)
    } else if day == tomorrow {
        if now.hour() < FEED_DAY_START_HOUR {
            Ok(OFFSET_AHEAD)
        } else {
            Ok(OFFSET_CURRENT)
        }
    } else {
        Err(mismatch())
    }
}

/// Parse the embedded chart payload into today's price table.
///
/// Entries that cannot be read as a finite decimal leave their hour empty;
/// callers report them through [`PriceTable::missing_hours`].
pub fn parse_price_table(payload: &str, now: NaiveDateTime) -> Result<PriceTable, ParseFailure> {
    let chart: ChartPayload = serde_json::from_str(payload)
        .map_err(|e| ParseFailure::MalformedPayload(e.to_string()))?;
    let series = chart.east;

    let label = series
        .dates
        .last()
        .map(|d| d.day.as_str())
        .ok_or_else(|| ParseFailure::MalformedPayload("east.dates is empty".to_string()))?;
    let offset = anchor_offset(label, now)?;

    let len = series.values.len();
    if len < offset {
        return Err(ParseFailure::MalformedPayload(format!(
            "east.values has {len} entries, anchor offset needs {offset}"
        )));
    }
    let start = len - offset;

    let surcharge = series
        .values_distribution
        .as_ref()
        .filter(|dist| dist.len() == len);

    let anchor_day = label.trim().parse().unwrap_or_default();
    let mut table = PriceTable::new(anchor_day, offset);
    table.surcharge_applied = surcharge.is_some();
    table.surcharge_ignored = series
        .values_distribution
        .as_ref()
        .is_some_and(|dist| dist.len() != len);

    for j in 0..HOURS_PER_DAY {
        let idx = start + j;
        let base = series.values.get(idx).and_then(RawValue::as_price);
        let price = match surcharge {
            Some(dist) => base.zip(dist.get(idx).and_then(RawValue::as_price)),
            None => base.map(|b| (b, 0.0)),
        };
        if let Some((tariff, extra)) = price {
            table.set(hour_for_position(j), tariff + extra);
        }
    }

    Ok(table)
}
