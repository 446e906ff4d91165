#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let html = String::from_utf8_lossy(data);
    let _ = nilan_powersave::pricing::extract_chart_payload(&html, "chart-component", "data-chart");
    let _ = nilan_powersave::pricing::feed::decode_entities(&html);
});
