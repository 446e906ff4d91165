#![no_main]
use chrono::NaiveDate;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(payload) = std::str::from_utf8(data) else {
        return;
    };
    // Evening and morning clocks take different anchor paths
    for hour in [9, 21] {
        let Some(now) = NaiveDate::from_ymd_opt(2024, 2, 29).and_then(|d| d.and_hms_opt(hour, 0, 0))
        else {
            return;
        };
        if let Ok(table) = nilan_powersave::pricing::parse_price_table(payload, now) {
            let selected = nilan_powersave::pricing::select_lowest_hours(&table, 3);
            assert_eq!(selected.len(), 3);
            assert!(selected.hours().all(|h| table.price(h).is_some()));
        }
    }
});
