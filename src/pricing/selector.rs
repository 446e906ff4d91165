use super::types::{HOURS_PER_DAY, PriceTable, SelectedHours};

/// Pick the `k` cheapest distinct hours of `table`, cheapest first.
///
/// Each pass scans hours 0..=23 in order and keeps a candidate only when it
/// is strictly cheaper than the best so far, so equal prices resolve to the
/// earliest hour. Hours without a price are never picked; a pass that finds
/// no candidate leaves its slot unset.
pub fn select_lowest_hours(table: &PriceTable, k: usize) -> SelectedHours {
    let mut picked: Vec<Option<u32>> = Vec::with_capacity(k);

    for _ in 0..k {
        let mut best: Option<(u32, f64)> = None;
        for hour in 0..HOURS_PER_DAY as u32 {
            if picked.contains(&Some(hour)) {
                continue;
            }
            let Some(price) = table.price(hour) else {
                continue;
            };
            if best.is_none_or(|(_, best_price)| price < best_price) {
                best = Some((hour, price));
            }
        }
        picked.push(best.map(|(hour, _)| hour));
    }

    SelectedHours::from_slots(picked)
}

/// Prices of the selected hours in pick order, for logging
pub fn selected_prices(table: &PriceTable, selected: &SelectedHours) -> Vec<Option<f64>> {
    selected
        .slots()
        .iter()
        .map(|slot| slot.and_then(|h| table.price(h)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat(price: f64) -> [f64; HOURS_PER_DAY] {
        [price; HOURS_PER_DAY]
    }

    #[test]
    fn test_picks_cheapest_in_order() {
        let mut prices = flat(5.0);
        prices[2] = 1.0;
        prices[14] = 0.5;
        prices[9] = 2.0;
        let table = PriceTable::from_hourly(&prices);
        let sel = select_lowest_hours(&table, 3);
        assert_eq!(sel.slots(), &[Some(14), Some(2), Some(9)]);
    }

    #[test]
    fn test_ties_go_to_lowest_hour() {
        let table = PriceTable::from_hourly(&flat(1.0));
        let sel = select_lowest_hours(&table, 3);
        assert_eq!(sel.slots(), &[Some(0), Some(1), Some(2)]);
    }

    #[test]
    fn test_missing_hours_are_skipped() {
        let mut table = PriceTable::new(1, 28);
        table.set(5, 3.0);
        table.set(7, 1.0);
        let sel = select_lowest_hours(&table, 3);
        assert_eq!(sel.slots(), &[Some(7), Some(5), None]);
    }

    #[test]
    fn test_negative_prices_and_zero_k() {
        let mut prices = flat(0.2);
        prices[13] = -0.4;
        let table = PriceTable::from_hourly(&prices);
        assert_eq!(select_lowest_hours(&table, 1).slots(), &[Some(13)]);
        assert!(select_lowest_hours(&table, 0).is_empty());
    }

    #[test]
    fn test_every_k_yields_k_distinct_hours() {
        let prices: [f64; HOURS_PER_DAY] =
            std::array::from_fn(|h| ((h * 7) % 5) as f64 * 0.3 + 1.0);
        let table = PriceTable::from_hourly(&prices);
        for k in 1..=HOURS_PER_DAY {
            let sel = select_lowest_hours(&table, k);
            assert_eq!(sel.len(), k);
            let mut hours: Vec<u32> = sel.hours().collect();
            assert_eq!(hours.len(), k, "unset slot for k={}", k);
            hours.sort_unstable();
            hours.dedup();
            assert_eq!(hours.len(), k, "duplicate hour for k={}", k);
        }
    }

    #[test]
    fn test_selection_is_repeatable() {
        let mut prices = flat(2.0);
        prices[4] = 1.0;
        prices[21] = 1.0;
        prices[11] = 0.8;
        let table = PriceTable::from_hourly(&prices);
        let first = select_lowest_hours(&table, 4);
        let second = select_lowest_hours(&table, 4);
        assert_eq!(first, second);
        assert_eq!(first.slots(), &[Some(11), Some(4), Some(21), Some(0)]);
    }

    #[test]
    fn test_selected_prices() {
        let mut prices = flat(4.0);
        prices[3] = 1.5;
        let table = PriceTable::from_hourly(&prices);
        let sel = SelectedHours::from_slots(vec![Some(3), None]);
        assert_eq!(selected_prices(&table, &sel), vec![Some(1.5), None]);
    }
}
