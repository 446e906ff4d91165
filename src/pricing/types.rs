use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::ToSchema;

/// Number of clock hours in a price table
pub const HOURS_PER_DAY: usize = 24;

/// All-in price of one clock hour (tariff plus distribution surcharge)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PricePoint {
    /// Local clock hour, 0..=23
    pub hour: u32,
    /// Price in the feed's unit (DKK/kWh)
    pub price: f64,
}

/// Hourly prices of one day, indexed by clock hour.
///
/// A slot is empty when the feed entry for that hour could not be parsed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PriceTable {
    slots: Vec<Option<PricePoint>>,
    /// Day-of-month label the table was anchored on
    pub anchor_day: u32,
    /// Distance from the end of the feed's value array to the window start
    pub offset: usize,
    /// Distribution surcharge was added to every price
    pub surcharge_applied: bool,
    /// A surcharge series was present but did not line up with the tariff
    pub surcharge_ignored: bool,
}

impl PriceTable {
    /// Empty table for the given anchor
    pub fn new(anchor_day: u32, offset: usize) -> Self {
        Self {
            slots: vec![None; HOURS_PER_DAY],
            anchor_day,
            offset,
            surcharge_applied: false,
            surcharge_ignored: false,
        }
    }

    /// Table with a price for every hour, `prices[h]` being hour `h`
    pub fn from_hourly(prices: &[f64; HOURS_PER_DAY]) -> Self {
        let mut table = Self::new(0, 0);
        for (hour, price) in (0u32..).zip(prices.iter()) {
            table.set(hour, *price);
        }
        table
    }

    /// Store the price of `hour`; out-of-range hours are ignored
    pub fn set(&mut self, hour: u32, price: f64) {
        if let Some(slot) = self.slots.get_mut(hour as usize) {
            *slot = Some(PricePoint { hour, price });
        }
    }

    pub fn get(&self, hour: u32) -> Option<&PricePoint> {
        self.slots.get(hour as usize).and_then(Option::as_ref)
    }

    pub fn price(&self, hour: u32) -> Option<f64> {
        self.get(hour).map(|p| p.price)
    }

    /// Known prices in hour order
    pub fn points(&self) -> impl Iterator<Item = &PricePoint> {
        self.slots.iter().flatten()
    }

    /// Hours whose feed entry was unusable
    pub fn missing_hours(&self) -> Vec<u32> {
        (0u32..)
            .zip(self.slots.iter())
            .filter(|(_, slot)| slot.is_none())
            .map(|(hour, _)| hour)
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.slots.iter().all(Option::is_some)
    }
}

/// The K cheapest hours of the day in pick order.
///
/// A slot stays unset when no candidate hour was left for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct SelectedHours {
    slots: Vec<Option<u32>>,
}

impl SelectedHours {
    /// K unset slots; the value before the first successful refresh
    pub fn unset(k: usize) -> Self {
        Self {
            slots: vec![None; k],
        }
    }

    pub const fn from_slots(slots: Vec<Option<u32>>) -> Self {
        Self { slots }
    }

    pub fn slots(&self) -> &[Option<u32>] {
        &self.slots
    }

    /// Selected hours in pick order, skipping unset slots
    pub fn hours(&self) -> impl Iterator<Item = u32> + '_ {
        self.slots.iter().flatten().copied()
    }

    pub fn contains(&self, hour: u32) -> bool {
        self.hours().any(|h| h == hour)
    }

    /// Number of slots (K)
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn is_unset(&self) -> bool {
        self.slots.iter().all(Option::is_none)
    }
}

impl fmt::Display for SelectedHours {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .slots
            .iter()
            .map(|slot| slot.map_or_else(|| "-".to_string(), |h| h.to_string()))
            .collect();
        write!(f, "[{}]", parts.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_hours() {
        let mut table = PriceTable::new(14, 28);
        table.set(0, 1.0);
        table.set(23, 2.0);
        table.set(24, 3.0);
        assert_eq!(table.price(23), Some(2.0));
        assert_eq!(table.missing_hours().len(), 22);
        assert!(!table.is_complete());
    }

    #[test]
    fn test_selected_hours_display_and_contains() {
        let sel = SelectedHours::from_slots(vec![Some(2), Some(14), None]);
        assert_eq!(sel.to_string(), "[2, 14, -]");
        assert!(sel.contains(14));
        assert!(!sel.contains(3));
        assert!(SelectedHours::unset(3).is_unset());
        assert_eq!(SelectedHours::unset(3).len(), 3);
    }
}
