//! Configuration management for VietType
//!
//! - **settings**: the `Settings` entity edited by the front-end
//! - **hive**: registry-shaped durable store (in-memory and TOML file backends)
//! - **registry**: the real Windows registry backend
//! - **store**: field-by-field load/save of `Settings` under the product key

pub mod hive;
#[cfg(windows)]
pub mod registry;
pub mod settings;
pub mod store;

// Re-export commonly used types
pub use hive::{FileHive, HiveKey, MemoryHive, RegValue, SettingsHive, StoreError};
pub use settings::{Backconvert, ComposingAttr, LocaleCode, MultilangLevel, SettingError, Settings, TypingStyle, UiLanguage};
pub use store::ConfigurationStore;
