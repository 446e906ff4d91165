use nilan_powersave::error::PowersaveError;
use nilan_powersave::pricing::ParseFailure;

#[test]
fn error_constructors_group_1() {
    assert!(matches!(
        PowersaveError::config("x"),
        PowersaveError::Config { .. }
    ));
    assert!(matches!(
        PowersaveError::modbus("x"),
        PowersaveError::Modbus { .. }
    ));
    assert!(matches!(
        PowersaveError::device_io("x"),
        PowersaveError::DeviceIo { .. }
    ));
    assert!(matches!(PowersaveError::web("x"), PowersaveError::Web { .. }));
}

#[test]
fn error_constructors_group_2() {
    assert!(matches!(
        PowersaveError::serialization("s"),
        PowersaveError::Serialization { .. }
    ));
    assert!(matches!(PowersaveError::io("x"), PowersaveError::Io { .. }));
    assert!(matches!(
        PowersaveError::fetch("http://feed", "x"),
        PowersaveError::Fetch { .. }
    ));
    assert!(matches!(
        PowersaveError::timeout("x"),
        PowersaveError::Timeout { .. }
    ));
    assert!(matches!(
        PowersaveError::generic("x"),
        PowersaveError::Generic { .. }
    ));
}

#[test]
fn display_messages() {
    let e = PowersaveError::invalid_value("run_hours", "24 outside 1..=23");
    let s = format!("{}", e);
    assert!(s.contains("Invalid value for run_hours"));

    let e: PowersaveError = ParseFailure::AnchorMismatch {
        label: "9".into(),
        today: 14,
        tomorrow: 15,
    }
    .into();
    assert!(e.to_string().contains("neither today (14) nor tomorrow (15)"));
}

#[test]
fn conversions_from_library_errors() {
    let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
    assert!(matches!(PowersaveError::from(io), PowersaveError::Io { .. }));

    let json = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
    assert!(matches!(
        PowersaveError::from(json),
        PowersaveError::Serialization { .. }
    ));

    let tz = "Nowhere/Town".parse::<chrono_tz::Tz>().unwrap_err();
    assert!(matches!(
        PowersaveError::from(tz),
        PowersaveError::InvalidConfigValue { .. }
    ));
}
