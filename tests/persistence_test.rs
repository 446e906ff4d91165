use nilan_powersave::persistence::PersistenceManager;
use nilan_powersave::settings::{
    KEY_AUTO_MODE, KEY_MUST_HEAT, KEY_RUN_HOURS, KEY_STOP_HEAT, SettingsHandle, ThresholdConfig,
};
use serde_json::json;

fn defaults() -> ThresholdConfig {
    ThresholdConfig {
        auto_mode_enabled: true,
        must_heat_delta: 20,
        stop_heat_delta: 5,
        run_hours: 3,
    }
}

#[test]
fn load_save_roundtrip() {
    let tmp = tempfile::NamedTempFile::new().unwrap();
    let path = tmp.path().to_string_lossy().to_string();

    let mut mgr = PersistenceManager::new(&path);
    mgr.set(KEY_AUTO_MODE, false).unwrap();
    mgr.set(KEY_RUN_HOURS, 4).unwrap();
    mgr.set(KEY_MUST_HEAT, 15).unwrap();
    mgr.save().unwrap();

    let mut mgr2 = PersistenceManager::new(&path);
    mgr2.load().unwrap();
    assert_eq!(mgr2.get::<bool>(KEY_AUTO_MODE), Some(false));
    assert_eq!(mgr2.get::<u32>(KEY_RUN_HOURS), Some(4));
    assert_eq!(mgr2.get::<i32>(KEY_MUST_HEAT), Some(15));
}

#[test]
fn missing_and_empty_files_load_as_empty_state() {
    let dir = tempfile::tempdir().unwrap();
    let mut mgr = PersistenceManager::new(dir.path().join("absent.json"));
    mgr.load().unwrap();
    assert_eq!(mgr.get::<serde_json::Value>(KEY_RUN_HOURS), None);

    let tmp = tempfile::NamedTempFile::new().unwrap();
    let mut mgr = PersistenceManager::new(tmp.path());
    mgr.load().unwrap();
    assert_eq!(mgr.get::<serde_json::Value>(KEY_AUTO_MODE), None);
}

#[test]
fn non_object_state_is_rejected() {
    let tmp = tempfile::NamedTempFile::new().unwrap();
    std::fs::write(tmp.path(), "[1, 2, 3]").unwrap();
    let mut mgr = PersistenceManager::new(tmp.path());
    assert!(mgr.load().is_err());
}

#[test]
fn save_creates_parent_directories() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested/state/powersave.json");
    let mut mgr = PersistenceManager::new(&path);
    mgr.set(KEY_RUN_HOURS, 5).unwrap();
    mgr.save().unwrap();
    assert!(path.exists());
    let saved: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(saved, json!({"setting": {"runhours": 5}}));
}

#[test]
fn accepted_settings_survive_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.json");

    let handle = SettingsHandle::with_persistence(defaults(), PersistenceManager::new(&path));
    handle.set_run_hours(5.0).unwrap();
    handle.set_stop_heat_delta(7.9).unwrap();
    handle.set_auto_mode(false).unwrap();

    let mut store = PersistenceManager::new(&path);
    store.load().unwrap();
    let restored = SettingsHandle::with_persistence(defaults(), store);
    let t = restored.snapshot();
    assert_eq!(t.run_hours, 5);
    assert_eq!(t.stop_heat_delta, 7);
    assert!(!t.auto_mode_enabled);
    assert_eq!(t.must_heat_delta, 20);
}

#[test]
fn rejected_values_are_not_persisted() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.json");

    let handle = SettingsHandle::with_persistence(defaults(), PersistenceManager::new(&path));
    handle.set_must_heat_delta(25.0).unwrap();
    let before = std::fs::read_to_string(&path).unwrap();

    assert!(handle.set_must_heat_delta(60.0).is_err());
    assert!(handle.set_run_hours(0.5).is_err());
    assert_eq!(std::fs::read_to_string(&path).unwrap(), before);
    assert_eq!(handle.snapshot().must_heat_delta, 25);
}

#[test]
fn invalid_persisted_values_fall_back_to_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.json");
    std::fs::write(
        &path,
        json!({"setting": {"runhours": 40, "stopheatdf": 3}}).to_string(),
    )
    .unwrap();

    let mut store = PersistenceManager::new(&path);
    store.load().unwrap();
    let t = SettingsHandle::with_persistence(defaults(), store).snapshot();
    assert_eq!(t.run_hours, 3);
    assert_eq!(t.stop_heat_delta, 3);
    assert_eq!(KEY_STOP_HEAT, "setting.stopheatdf");
}
