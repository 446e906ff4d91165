use nilan_powersave::config::{DeviceConfig, RegistersConfig};
use nilan_powersave::device::{DeviceCommand, DeviceStatePort, NilanController, SettingsUpdate};
use nilan_powersave::device::nilan::register_writes;
use nilan_powersave::modbus::{
    ModbusClient, ModbusConnectionManager, decode_i16, encode_i16, hundredths_to_tenths, tenths_to_hundredths,
};

#[test]
fn signed_registers_roundtrip_negative_values() {
    assert_eq!(decode_i16(0xFFFF), -1);
    assert_eq!(encode_i16(-250), 0xFF06);
    assert_eq!(decode_i16(encode_i16(-250)), -250);
}

#[test]
fn hundredths_truncate_to_tenths() {
    assert_eq!(hundredths_to_tenths(4567), 456);
    assert_eq!(hundredths_to_tenths(encode_i16(-155)), -15);
}

#[test]
fn tenths_out_of_register_range_fail() {
    assert_eq!(tenths_to_hundredths(450).unwrap(), 4500);
    assert!(tenths_to_hundredths(4000).is_err());
}

#[test]
fn pause_durations_are_written_before_flags() {
    let regs = RegistersConfig::default();
    let update = DeviceCommand::SetDhwProduction { on: false }
        .to_update(180)
        .unwrap();
    let writes = register_writes(&regs, &update).unwrap();
    let duration = writes
        .iter()
        .position(|(addr, _)| *addr == regs.dhw_pause_duration)
        .unwrap();
    let flag = writes
        .iter()
        .position(|(addr, _)| *addr == regs.dhw_paused)
        .unwrap();
    assert!(duration < flag);
    assert!(writes.contains(&(regs.dhw_pause_duration, 180)));
    assert!(writes.contains(&(regs.dhw_paused, 1)));
}

fn unreachable_device() -> DeviceConfig {
    DeviceConfig {
        ip: "127.0.0.1".to_string(),
        port: 1,
        operation_timeout_ms: 200,
        max_retries: 1,
        retry_delay_ms: 10,
        ..DeviceConfig::default()
    }
}

#[tokio::test]
async fn unreachable_device_reports_error() {
    let mut manager = ModbusConnectionManager::new(&unreachable_device());
    assert!(manager.read_input_registers(211, 1).await.is_err());
    assert!(!manager.is_connected());
}

#[tokio::test]
async fn controller_surfaces_connection_failure() {
    let controller = NilanController::new(&unreachable_device(), &RegistersConfig::default());
    assert!(controller.fetch_readings().await.is_err());
    assert!(
        controller
            .send_settings(&SettingsUpdate {
                dhw_production_paused: Some(false),
                ..SettingsUpdate::default()
            })
            .await
            .is_err()
    );
}

fn assert_send<T: Send>(_: &T) {}

#[tokio::test]
async fn connect_future_can_move_across_threads() {
    let mut client = ModbusClient::new(&unreachable_device());
    let connect = client.connect();
    assert_send(&connect);
    assert!(connect.await.is_err());

    let controller = std::sync::Arc::new(NilanController::new(
        &unreachable_device(),
        &RegistersConfig::default(),
    ));
    let handle = tokio::spawn(async move { controller.fetch_settings().await });
    assert!(handle.await.unwrap().is_err());
}
