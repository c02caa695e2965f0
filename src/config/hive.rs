//! Durable hierarchical key/value store
//!
//! Mirrors the shape of the Windows registry: a hive holds keys addressed by
//! backslash-separated paths, each key holds named, typed values. Every
//! single-value write is atomic on its own; there are no multi-value
//! transactions.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tracing::{debug, warn};

/// Error opening a key or writing one of its values
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("cannot open settings key {path}: {reason}")]
    Open { path: String, reason: String },
    #[error("cannot write setting {name}: {reason}")]
    Write { name: String, reason: String },
}

/// A stored value with its underlying type
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegValue {
    Dword(u32),
    String(String),
    /// Present but of a type this front-end never writes
    Unsupported(&'static str),
}

/// Opens (creating if needed) keys of a hive
pub trait SettingsHive {
    type Key: HiveKey;

    fn create_key(&self, path: &str) -> Result<Self::Key, StoreError>;
}

/// An open key
pub trait HiveKey {
    fn get_value(&self, name: &str) -> Option<RegValue>;
    fn set_value(&mut self, name: &str, value: RegValue) -> Result<(), StoreError>;
    /// Removing an absent value is not an error
    fn delete_value(&mut self, name: &str) -> Result<(), StoreError>;
}

type KeyMap = BTreeMap<String, BTreeMap<String, RegValue>>;

/// Shared in-memory hive; clones see the same data
#[derive(Debug, Clone, Default)]
pub struct MemoryHive {
    keys: Arc<Mutex<KeyMap>>,
    read_only: bool,
}

impl MemoryHive {
    pub fn new() -> Self {
        Self::default()
    }

    /// A view of the same data that rejects every write
    pub fn read_only(&self) -> Self {
        Self {
            keys: Arc::clone(&self.keys),
            read_only: true,
        }
    }

    /// Seed or overwrite a raw value, bypassing the read-only flag
    pub fn insert(&self, path: &str, name: &str, value: RegValue) {
        if let Ok(mut keys) = self.keys.lock() {
            keys.entry(path.to_string())
                .or_default()
                .insert(name.to_string(), value);
        }
    }

    pub fn get(&self, path: &str, name: &str) -> Option<RegValue> {
        self.keys
            .lock()
            .ok()
            .and_then(|keys| keys.get(path).and_then(|k| k.get(name).cloned()))
    }

    pub fn value_names(&self, path: &str) -> Vec<String> {
        self.keys
            .lock()
            .ok()
            .and_then(|keys| keys.get(path).map(|k| k.keys().cloned().collect()))
            .unwrap_or_default()
    }
}

impl SettingsHive for MemoryHive {
    type Key = MemoryKey;

    fn create_key(&self, path: &str) -> Result<MemoryKey, StoreError> {
        let mut keys = self.keys.lock().map_err(|_| StoreError::Open {
            path: path.to_string(),
            reason: "hive lock poisoned".to_string(),
        })?;
        if !self.read_only {
            keys.entry(path.to_string()).or_default();
        }
        Ok(MemoryKey {
            hive: self.clone(),
            path: path.to_string(),
        })
    }
}

pub struct MemoryKey {
    hive: MemoryHive,
    path: String,
}

impl MemoryKey {
    fn write(&mut self, name: &str, value: Option<RegValue>) -> Result<(), StoreError> {
        let denied = |reason: &str| StoreError::Write {
            name: name.to_string(),
            reason: reason.to_string(),
        };
        if self.hive.read_only {
            return Err(denied("access denied"));
        }
        let mut keys = self.hive.keys.lock().map_err(|_| denied("hive lock poisoned"))?;
        let key = keys.entry(self.path.clone()).or_default();
        match value {
            Some(value) => {
                key.insert(name.to_string(), value);
            }
            None => {
                key.remove(name);
            }
        }
        Ok(())
    }
}

impl HiveKey for MemoryKey {
    fn get_value(&self, name: &str) -> Option<RegValue> {
        self.hive.get(&self.path, name)
    }

    fn set_value(&mut self, name: &str, value: RegValue) -> Result<(), StoreError> {
        self.write(name, Some(value))
    }

    fn delete_value(&mut self, name: &str) -> Result<(), StoreError> {
        self.write(name, None)
    }
}

/// Hive persisted as a TOML document, one table per key path
#[derive(Debug, Clone)]
pub struct FileHive {
    path: PathBuf,
}

impl FileHive {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `<config_dir>/VietType/registry.toml`
    pub fn default_path() -> PathBuf {
        let mut path = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        path.push(crate::constants::paths::APP_DIR);
        path.push(crate::constants::paths::HIVE_FILE);
        path
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_document(&self) -> Result<toml::Table, String> {
        match fs::read_to_string(&self.path) {
            Ok(contents) => contents.parse::<toml::Table>().map_err(|e| e.to_string()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(toml::Table::new()),
            Err(e) => Err(e.to_string()),
        }
    }

    /// Write through a sibling temp file and rename so readers never see a torn file
    fn write_document(&self, doc: &toml::Table) -> Result<(), String> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| e.to_string())?;
        }
        let contents = toml::to_string_pretty(doc).map_err(|e| e.to_string())?;
        let tmp = self.path.with_extension("toml.tmp");
        {
            let mut file = fs::File::create(&tmp).map_err(|e| e.to_string())?;
            file.write_all(contents.as_bytes()).map_err(|e| e.to_string())?;
            file.sync_all().map_err(|e| e.to_string())?;
        }
        fs::rename(&tmp, &self.path).map_err(|e| e.to_string())
    }
}

impl SettingsHive for FileHive {
    type Key = FileKey;

    fn create_key(&self, path: &str) -> Result<FileKey, StoreError> {
        let open_err = |reason: String| StoreError::Open {
            path: format!("{}:{}", self.path.display(), path),
            reason,
        };
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| open_err(e.to_string()))?;
        }
        let values = match self.read_document() {
            Ok(doc) => match doc.get(path) {
                Some(toml::Value::Table(table)) => table.clone(),
                Some(_) => {
                    warn!(file = %self.path.display(), key = %path, "Key is not a table, treating as empty");
                    toml::Table::new()
                }
                None => toml::Table::new(),
            },
            Err(e) => {
                warn!(file = %self.path.display(), error = %e, "Hive file unreadable, treating key as empty");
                toml::Table::new()
            }
        };
        debug!(file = %self.path.display(), key = %path, values = values.len(), "Opened file hive key");
        Ok(FileKey {
            hive: self.clone(),
            key_path: path.to_string(),
            values,
        })
    }
}

pub struct FileKey {
    hive: FileHive,
    key_path: String,
    values: toml::Table,
}

impl FileKey {
    /// Re-read the document, apply one change, write it back
    fn persist(&mut self, name: &str, value: Option<toml::Value>) -> Result<(), StoreError> {
        let write_err = |reason: String| StoreError::Write {
            name: name.to_string(),
            reason,
        };
        let mut doc = self.hive.read_document().map_err(write_err)?;
        let entry = doc
            .entry(self.key_path.clone())
            .or_insert(toml::Value::Table(toml::Table::new()));
        if !entry.is_table() {
            *entry = toml::Value::Table(toml::Table::new());
        }
        let Some(table) = entry.as_table_mut() else {
            return Err(write_err("key is not a table".to_string()));
        };
        match &value {
            Some(v) => {
                table.insert(name.to_string(), v.clone());
            }
            None => {
                table.remove(name);
            }
        }
        self.values = table.clone();
        self.hive.write_document(&doc).map_err(write_err)
    }
}

impl HiveKey for FileKey {
    fn get_value(&self, name: &str) -> Option<RegValue> {
        self.values.get(name).map(|value| match value {
            toml::Value::Integer(i) => match u32::try_from(*i) {
                Ok(dword) => RegValue::Dword(dword),
                // Signed DWORDs written by other tools
                Err(_) => match i32::try_from(*i) {
                    Ok(signed) => RegValue::Dword(signed as u32),
                    Err(_) => RegValue::Unsupported("qword"),
                },
            },
            toml::Value::String(s) => RegValue::String(s.clone()),
            toml::Value::Boolean(_) => RegValue::Unsupported("boolean"),
            toml::Value::Float(_) => RegValue::Unsupported("float"),
            toml::Value::Datetime(_) => RegValue::Unsupported("datetime"),
            toml::Value::Array(_) => RegValue::Unsupported("array"),
            toml::Value::Table(_) => RegValue::Unsupported("table"),
        })
    }

    fn set_value(&mut self, name: &str, value: RegValue) -> Result<(), StoreError> {
        let value = match value {
            RegValue::Dword(d) => toml::Value::Integer(d as i64),
            RegValue::String(s) => toml::Value::String(s),
            RegValue::Unsupported(kind) => {
                return Err(StoreError::Write {
                    name: name.to_string(),
                    reason: format!("cannot store {kind} values"),
                });
            }
        };
        self.persist(name, Some(value))
    }

    fn delete_value(&mut self, name: &str) -> Result<(), StoreError> {
        if !self.values.contains_key(name) {
            return Ok(());
        }
        self.persist(name, None)
    }
}
