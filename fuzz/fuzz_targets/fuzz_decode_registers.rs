#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Interpret the input as u16 register stream in big-endian pairs
    for b in data.chunks_exact(2) {
        let raw = u16::from_be_bytes([b[0], b[1]]);
        let tenths = nilan_powersave::modbus::hundredths_to_tenths(raw);
        // Every decoded temperature must encode back into a register
        assert!(nilan_powersave::modbus::tenths_to_hundredths(tenths).is_ok());
    }
});
