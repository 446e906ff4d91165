use nilan_powersave::config::Config;
use std::fs;

#[test]
fn serialized_yaml_loads_back() {
    let tmp_dir = tempfile::tempdir().unwrap();
    let path = tmp_dir.path().join("config.yaml");

    let mut cfg = Config::default();
    cfg.device.ip = "10.0.0.5".to_string();
    cfg.thresholds.run_hours = 5;
    cfg.logging.file = path.with_extension("log").to_string_lossy().to_string();

    fs::write(&path, serde_yaml::to_string(&cfg).unwrap()).unwrap();
    let loaded = Config::from_file(&path).unwrap();

    assert_eq!(loaded.device.ip, "10.0.0.5");
    assert_eq!(loaded.thresholds.run_hours, 5);
    assert_eq!(loaded.logging.file, cfg.logging.file);
}

#[test]
fn partial_yaml_falls_back_to_defaults() {
    let tmp = tempfile::NamedTempFile::new().unwrap();
    fs::write(
        tmp.path(),
        "device:\n  ip: 192.168.2.20\nscheduler:\n  trigger_hour: 21\n",
    )
    .unwrap();
    let cfg = Config::from_file(tmp.path()).unwrap();
    assert_eq!(cfg.device.ip, "192.168.2.20");
    assert_eq!(cfg.device.port, 502);
    assert_eq!(cfg.scheduler.trigger_hour, 21);
    assert_eq!(cfg.scheduler.pause_duration_minutes, 180);
    assert!(cfg.validate().is_ok());
}

#[test]
fn config_validation_errors() {
    let mut cfg = Config::default();
    assert!(cfg.validate().is_ok());

    cfg.device.ip.clear();
    assert!(cfg.validate().is_err());

    cfg = Config::default();
    cfg.device.port = 0;
    assert!(cfg.validate().is_err());

    cfg = Config::default();
    cfg.price_feed.url = "ftp://example.com".to_string();
    assert!(cfg.validate().is_err());

    cfg = Config::default();
    cfg.scheduler.trigger_hour = 24;
    assert!(cfg.validate().is_err());

    cfg = Config::default();
    cfg.thresholds.run_hours = 24;
    assert!(cfg.validate().is_err());

    cfg = Config::default();
    cfg.thresholds.stop_heat_delta = 0;
    assert!(cfg.validate().is_err());

    cfg = Config::default();
    cfg.timezone = "Europe/Atlantis".to_string();
    assert!(cfg.validate().is_err());

    cfg = Config::default();
    cfg.logging.level = "LOUD".to_string();
    assert!(cfg.validate().is_err());
}

#[test]
fn from_file_with_invalid_yaml_fails() {
    let tmp = tempfile::NamedTempFile::new().unwrap();
    fs::write(tmp.path(), b"bad: [unclosed").unwrap();
    let err = Config::from_file(tmp.path()).unwrap_err();
    let msg = format!("{}", err);
    assert!(msg.contains("Serialization error"));
}
