//! Modbus TCP client for the Nilan CTS700 controller
//!
//! This module provides async Modbus TCP access to the controller's input
//! (readings) and holding (settings) registers, with per-request timeouts
//! and a connection manager that reconnects after transport failures.

use crate::config::DeviceConfig;
use crate::error::{PowersaveError, Result};
use crate::logging::{LogContext, StructuredLogger, get_logger_with_context};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::time::{sleep, timeout};
use tokio_modbus::client::{Context, tcp};
use tokio_modbus::prelude::*;

/// Modbus TCP client bound to one controller unit
pub struct ModbusClient {
    /// Modbus TCP client connection
    ctx: Option<Context>,

    /// Connection parameters
    config: DeviceConfig,

    /// Connection timeout
    connection_timeout: Duration,

    /// Operation timeout
    operation_timeout: Duration,

    logger: StructuredLogger,
}

impl ModbusClient {
    /// Create a new Modbus client
    pub fn new(config: &DeviceConfig) -> Self {
        let logger =
            get_logger_with_context(LogContext::new("modbus").with_device_unit(config.slave_id));
        Self {
            ctx: None,
            config: config.clone(),
            connection_timeout: Duration::from_secs(5),
            operation_timeout: Duration::from_millis(config.operation_timeout_ms.max(1)),
            logger,
        }
    }

    async fn resolve(address: String) -> Result<SocketAddr> {
        let mut addrs = tokio::net::lookup_host(&address)
            .await
            .map_err(|e| PowersaveError::modbus(format!("Cannot resolve {}: {}", address, e)))?;
        addrs
            .next()
            .ok_or_else(|| PowersaveError::modbus(format!("No address for {}", address)))
    }

    /// Connect to the Modbus server
    pub async fn connect(&mut self) -> Result<()> {
        let socket_addr =
            Self::resolve(format!("{}:{}", self.config.ip, self.config.port)).await?;
        self.logger
            .info(&format!("Connecting to Modbus server at {}", socket_addr));

        let slave = Slave(self.config.slave_id);
        match timeout(self.connection_timeout, tcp::connect_slave(socket_addr, slave)).await {
            Ok(Ok(ctx)) => {
                self.ctx = Some(ctx);
                self.logger.info("Connected to Modbus server");
                Ok(())
            }
            Ok(Err(e)) => {
                let msg = format!("Failed to connect to Modbus server: {}", e);
                self.logger.error(&msg);
                Err(PowersaveError::modbus(msg))
            }
            Err(_) => {
                let msg = format!("Connection to {} timed out", socket_addr);
                self.logger.error(&msg);
                Err(PowersaveError::timeout(msg))
            }
        }
    }

    /// Drop the connection; the next request reconnects
    pub fn disconnect(&mut self) {
        if self.ctx.take().is_some() {
            self.logger.info("Disconnected from Modbus server");
        }
    }

    pub const fn is_connected(&self) -> bool {
        self.ctx.is_some()
    }

    /// Read input registers (function 0x04)
    pub async fn read_input_registers(&mut self, address: u16, count: u16) -> Result<Vec<u16>> {
        self.logger.trace(&format!(
            "Reading {} input registers from {}",
            count, address
        ));
        let op_timeout = self.operation_timeout;
        let ctx = self.context()?;
        flatten(
            timeout(op_timeout, ctx.read_input_registers(address, count)).await,
            "read input registers",
            address,
        )
    }

    /// Read holding registers (function 0x03)
    pub async fn read_holding_registers(&mut self, address: u16, count: u16) -> Result<Vec<u16>> {
        self.logger.trace(&format!(
            "Reading {} holding registers from {}",
            count, address
        ));
        let op_timeout = self.operation_timeout;
        let ctx = self.context()?;
        flatten(
            timeout(op_timeout, ctx.read_holding_registers(address, count)).await,
            "read holding registers",
            address,
        )
    }

    /// Write a single holding register (function 0x06)
    pub async fn write_single_register(&mut self, address: u16, value: u16) -> Result<()> {
        self.logger
            .debug(&format!("Writing {} to register {}", value, address));
        let op_timeout = self.operation_timeout;
        let ctx = self.context()?;
        flatten(
            timeout(op_timeout, ctx.write_single_register(address, value)).await,
            "write single register",
            address,
        )
    }

    fn context(&mut self) -> Result<&mut Context> {
        self.ctx
            .as_mut()
            .ok_or_else(|| PowersaveError::modbus("Not connected to Modbus server"))
    }
}

type Timed<T> = std::result::Result<tokio_modbus::Result<T>, tokio::time::error::Elapsed>;

/// Collapse timeout, transport and exception layers into one error.
///
/// Exceptions come from the controller itself and are not worth a reconnect,
/// so they map to a device error rather than a transport error.
fn flatten<T>(result: Timed<T>, what: &str, address: u16) -> Result<T> {
    match result {
        Ok(Ok(Ok(value))) => Ok(value),
        Ok(Ok(Err(exception))) => Err(PowersaveError::device_io(format!(
            "Failed to {} at {}: exception {:?}",
            what, address, exception
        ))),
        Ok(Err(e)) => Err(PowersaveError::modbus(format!(
            "Failed to {} at {}: {}",
            what, address, e
        ))),
        Err(_) => Err(PowersaveError::timeout(format!(
            "{} at {} timed out",
            what, address
        ))),
    }
}

/// Decode a signed 16-bit register value
pub const fn decode_i16(raw: u16) -> i16 {
    raw as i16
}

/// Encode a signed value for a 16-bit register
pub const fn encode_i16(value: i16) -> u16 {
    value as u16
}

/// Hundredths of a degree on the wire to tenths of a degree
pub const fn hundredths_to_tenths(raw: u16) -> i32 {
    decode_i16(raw) as i32 / 10
}

/// Tenths of a degree to the wire's hundredths, rejecting values that do not fit
pub fn tenths_to_hundredths(tenths: i32) -> Result<u16> {
    let hundredths = tenths
        .checked_mul(10)
        .and_then(|v| i16::try_from(v).ok())
        .ok_or_else(|| {
            PowersaveError::device_io(format!("Temperature {} does not fit a register", tenths))
        })?;
    Ok(encode_i16(hundredths))
}

#[derive(Debug, Clone, Copy)]
enum Request {
    ReadInput { address: u16, count: u16 },
    ReadHolding { address: u16, count: u16 },
    WriteSingle { address: u16, value: u16 },
}

/// Connection manager with automatic reconnection
pub struct ModbusConnectionManager {
    client: ModbusClient,
    max_retry_attempts: u32,
    retry_delay: Duration,
    logger: StructuredLogger,
}

impl ModbusConnectionManager {
    /// Create a new connection manager
    pub fn new(config: &DeviceConfig) -> Self {
        Self {
            client: ModbusClient::new(config),
            max_retry_attempts: config.max_retries.max(1),
            retry_delay: Duration::from_millis(config.retry_delay_ms),
            logger: get_logger_with_context(
                LogContext::new("modbus_manager").with_device_unit(config.slave_id),
            ),
        }
    }

    pub const fn is_connected(&self) -> bool {
        self.client.is_connected()
    }

    pub async fn read_input_registers(&mut self, address: u16, count: u16) -> Result<Vec<u16>> {
        self.execute(Request::ReadInput { address, count }).await
    }

    pub async fn read_holding_registers(&mut self, address: u16, count: u16) -> Result<Vec<u16>> {
        self.execute(Request::ReadHolding { address, count }).await
    }

    pub async fn write_single_register(&mut self, address: u16, value: u16) -> Result<()> {
        self.execute(Request::WriteSingle { address, value })
            .await
            .map(|_| ())
    }

    /// Run one request, reconnecting after transport failures
    async fn execute(&mut self, request: Request) -> Result<Vec<u16>> {
        let mut attempts = 0;

        loop {
            attempts += 1;

            if !self.client.is_connected()
                && let Err(e) = self.client.connect().await
            {
                if attempts >= self.max_retry_attempts {
                    return Err(e);
                }
                self.logger
                    .warn(&format!("Connection attempt {} failed: {}", attempts, e));
                sleep(self.retry_delay).await;
                continue;
            }

            let result = match request {
                Request::ReadInput { address, count } => {
                    self.client.read_input_registers(address, count).await
                }
                Request::ReadHolding { address, count } => {
                    self.client.read_holding_registers(address, count).await
                }
                Request::WriteSingle { address, value } => self
                    .client
                    .write_single_register(address, value)
                    .await
                    .map(|()| Vec::new()),
            };

            match result {
                Ok(words) => return Ok(words),
                Err(e) if e.is_connection_error() => {
                    self.logger
                        .warn(&format!("Request {:?} failed, reconnecting: {}", request, e));
                    self.client.disconnect();
                    if attempts >= self.max_retry_attempts {
                        return Err(e);
                    }
                    sleep(self.retry_delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_temperature_conversion() {
        assert_eq!(hundredths_to_tenths(4520), 452);
        assert_eq!(hundredths_to_tenths(encode_i16(-155)), -15);
        assert_eq!(tenths_to_hundredths(450).unwrap(), 4500);
        assert_eq!(decode_i16(tenths_to_hundredths(-50).unwrap()), -500);
        assert!(tenths_to_hundredths(4000).is_err());
    }

    #[test]
    fn test_client_starts_disconnected() {
        let client = ModbusClient::new(&DeviceConfig::default());
        assert!(!client.is_connected());
        let manager = ModbusConnectionManager::new(&DeviceConfig::default());
        assert!(!manager.is_connected());
    }

    #[tokio::test]
    async fn test_unreachable_device_reports_error() {
        let config = DeviceConfig {
            ip: "127.0.0.1".to_string(),
            port: 1,
            max_retries: 1,
            retry_delay_ms: 0,
            ..DeviceConfig::default()
        };
        let mut manager = ModbusConnectionManager::new(&config);
        let err = manager.read_input_registers(211, 1).await.unwrap_err();
        assert!(err.is_connection_error());
    }
}
