use std::collections::BTreeMap;
use tracing::{debug, error, info, trace, warn};

/// Context information attached to every record of a logger
#[derive(Debug, Clone)]
pub struct LogContext {
    /// Component name (e.g., "scheduler", "mirror", "web")
    pub component: String,
    /// Modbus unit the component talks to, if any
    pub device_unit: Option<u8>,
    /// Additional context fields, rendered in key order
    pub extra_fields: BTreeMap<String, String>,
}

impl LogContext {
    /// Create a new log context
    pub fn new(component: &str) -> Self {
        Self {
            component: component.to_string(),
            device_unit: None,
            extra_fields: BTreeMap::new(),
        }
    }

    /// Tag records with the Modbus unit id
    pub const fn with_device_unit(mut self, unit: u8) -> Self {
        self.device_unit = Some(unit);
        self
    }

    /// Add extra field
    pub fn with_field(mut self, key: &str, value: impl Into<String>) -> Self {
        self.extra_fields.insert(key.to_string(), value.into());
        self
    }
}

/// Structured logger with context
#[derive(Debug, Clone)]
pub struct StructuredLogger {
    pub(crate) context: LogContext,
}

impl StructuredLogger {
    pub const fn new(context: LogContext) -> Self {
        Self { context }
    }

    pub fn component(&self) -> &str {
        &self.context.component
    }

    pub fn info(&self, message: &str) {
        let fields = self.format_fields();
        info!(%fields, "{}", message);
    }

    pub fn warn(&self, message: &str) {
        let fields = self.format_fields();
        warn!(%fields, "{}", message);
    }

    pub fn error(&self, message: &str) {
        let fields = self.format_fields();
        error!(%fields, "{}", message);
    }

    pub fn debug(&self, message: &str) {
        let fields = self.format_fields();
        debug!(%fields, "{}", message);
    }

    pub fn trace(&self, message: &str) {
        let fields = self.format_fields();
        trace!(%fields, "{}", message);
    }

    fn format_fields(&self) -> String {
        let mut fields = vec![format!("component={}", self.context.component)];
        if let Some(unit) = self.context.device_unit {
            fields.push(format!("unit={}", unit));
        }
        for (key, value) in &self.context.extra_fields {
            fields.push(format!("{}={}", key, value));
        }
        fields.join(",")
    }
}

/// Create a logger for a specific component
pub fn get_logger(component: &str) -> StructuredLogger {
    StructuredLogger::new(LogContext::new(component))
}

/// Create a logger with full context
pub const fn get_logger_with_context(context: LogContext) -> StructuredLogger {
    StructuredLogger::new(context)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fields_are_rendered_in_order() {
        let logger = get_logger_with_context(
            LogContext::new("scheduler")
                .with_device_unit(30)
                .with_field("url", "http://feed")
                .with_field("k", "3"),
        );
        assert_eq!(
            logger.format_fields(),
            "component=scheduler,unit=30,k=3,url=http://feed"
        );
    }

    #[test]
    fn test_get_logger() {
        let logger = get_logger("mirror");
        assert_eq!(logger.component(), "mirror");
        logger.debug("does not panic without a subscriber");
    }
}
