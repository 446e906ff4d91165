//! Persistence layer for user settings
//!
//! State is an opaque JSON document. Keys are dotted paths
//! (`setting.runhours`) that address nested objects.

use crate::error::{PowersaveError, Result};
use crate::logging::{StructuredLogger, get_logger};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

/// Persistence manager backed by a JSON file
pub struct PersistenceManager {
    file_path: PathBuf,
    state: Map<String, Value>,
    logger: StructuredLogger,
}

impl PersistenceManager {
    /// Create a manager for `file_path`; nothing is read until [`load`](Self::load)
    pub fn new<P: AsRef<Path>>(file_path: P) -> Self {
        Self {
            file_path: file_path.as_ref().to_path_buf(),
            state: Map::new(),
            logger: get_logger("persistence"),
        }
    }

    /// Load state from disk; a missing or empty file leaves the state empty
    pub fn load(&mut self) -> Result<()> {
        if !self.file_path.exists() {
            self.logger
                .info("No persistent state file found, using defaults");
            return Ok(());
        }

        let contents = std::fs::read_to_string(&self.file_path)?;
        if contents.trim().is_empty() {
            self.state = Map::new();
            return Ok(());
        }
        match serde_json::from_str::<Value>(&contents)? {
            Value::Object(map) => self.state = map,
            other => {
                return Err(PowersaveError::serialization(format!(
                    "State file {} holds {} instead of an object",
                    self.file_path.display(),
                    type_name(&other)
                )));
            }
        }
        self.logger.info(&format!(
            "Loaded persistent state from {}",
            self.file_path.display()
        ));
        Ok(())
    }

    /// Save state to disk through a temporary file and rename
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.file_path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(&self.state)?;
        let tmp = self.file_path.with_extension("json.tmp");
        std::fs::write(&tmp, contents)?;
        std::fs::rename(&tmp, &self.file_path)?;
        self.logger.debug("Saved persistent state to disk");
        Ok(())
    }

    /// Typed value at a dotted key; `None` when absent or of another type
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.lookup(key)?;
        serde_json::from_value(value.clone()).ok()
    }

    /// Store a value at a dotted key, creating intermediate objects
    pub fn set<T: Serialize>(&mut self, key: &str, value: T) -> Result<()> {
        let value = serde_json::to_value(value)?;
        let mut parts: Vec<&str> = key.split('.').collect();
        let last = parts
            .pop()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| PowersaveError::invalid_value("key", "empty key"))?;

        let mut node = &mut self.state;
        for part in parts {
            let entry = node
                .entry(part.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !entry.is_object() {
                *entry = Value::Object(Map::new());
            }
            let Value::Object(map) = entry else {
                return Err(PowersaveError::invalid_value(key, "cannot nest under value"));
            };
            node = map;
        }
        node.insert(last.to_string(), value);
        Ok(())
    }

    fn lookup(&self, key: &str) -> Option<&Value> {
        let mut parts = key.split('.');
        let mut current = self.state.get(parts.next()?)?;
        for part in parts {
            current = current.as_object()?.get(part)?;
        }
        Some(current)
    }
}

const fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_dotted_keys_nest() {
        let mut mgr = PersistenceManager::new("/nonexistent/state.json");
        mgr.set("setting.runhours", 4).unwrap();
        mgr.set("savemode.on", true).unwrap();
        assert_eq!(mgr.get::<u32>("setting.runhours"), Some(4));
        assert_eq!(mgr.get::<bool>("savemode.on"), Some(true));
        assert_eq!(mgr.get::<serde_json::Value>("setting"), Some(json!({"runhours": 4})));
        assert_eq!(mgr.get::<String>("setting.runhours"), None);
    }

    #[test]
    fn test_set_replaces_scalar_parent() {
        let mut mgr = PersistenceManager::new("/nonexistent/state.json");
        mgr.set("setting", 1).unwrap();
        mgr.set("setting.mustheatdf", 20).unwrap();
        assert_eq!(mgr.get::<i32>("setting.mustheatdf"), Some(20));
        assert!(mgr.set("", 1).is_err());
    }
}
