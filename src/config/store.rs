//! Load/save of [`Settings`] under the product store path
//!
//! Loading is total: every field is read on its own and any value that is
//! absent, of the wrong type, or out of range leaves that field at its
//! default. Stores written by older versions (missing fields, the boolean
//! form of `backconvert_on_backspace`) therefore load without migration.

use tracing::{debug, info, warn};

use super::hive::{HiveKey, RegValue, SettingsHive, StoreError};
use super::settings::{Backconvert, ComposingAttr, Ordinal, Settings, TypingStyle, UiLanguage};
use crate::constants::{product, values};
use crate::hotkeys::HotkeyChord;

pub struct ConfigurationStore<H> {
    hive: H,
    path: String,
}

impl<H: SettingsHive> ConfigurationStore<H> {
    pub fn new(hive: H) -> Self {
        Self::with_path(hive, product::STORE_PATH)
    }

    pub fn with_path(hive: H, path: impl Into<String>) -> Self {
        Self {
            hive,
            path: path.into(),
        }
    }

    /// Never fails; worst case returns all defaults
    pub fn load(&self) -> Settings {
        let mut settings = Settings::default();
        let key = match self.hive.create_key(&self.path) {
            Ok(key) => key,
            Err(e) => {
                warn!(error = %e, "Settings store unavailable, using defaults");
                return settings;
            }
        };

        let reader = FieldReader { key: &key };
        if let Some(v) = reader.ordinal::<TypingStyle>(values::TYPING_STYLE) {
            settings.typing_style = v;
        }
        if let Some(v) = reader.flag(values::DEFAULT_ENABLED) {
            settings.default_enabled = v;
        }
        if let Some(v) = reader.flag(values::OA_UY_TONE1) {
            settings.oa_uy_tone1 = v;
        }
        if let Some(v) = reader.flag(values::ACCEPT_DD) {
            settings.accept_dd = v;
        }
        if let Some(v) = reader.flag(values::ALLOW_ABBREVIATIONS) {
            settings.allow_abbreviations = v;
        }
        if let Some(v) = reader.flag(values::BACKSPACE_INVALID) {
            settings.backspace_invalid = v;
        }
        // 0/1 from the boolean era map onto Off/On unchanged
        if let Some(v) = reader.ordinal::<Backconvert>(values::BACKCONVERT_ON_BACKSPACE) {
            settings.backconvert_on_backspace = v;
        }
        if let Some(v) = reader.dword(values::OPTIMIZE_MULTILANG)
            && !settings.set_optimize_multilang(v as i32 as i64)
        {
            warn!(value = v as i32, "Ignoring negative optimize_multilang");
        }
        if let Some(v) = reader.flag(values::AUTOCORRECT) {
            settings.autocorrect = v;
        }
        if let Some(v) = reader.ordinal::<ComposingAttr>(values::SHOW_COMPOSING_ATTR) {
            settings.show_composing_attr = v;
        }
        if let Some(v) = reader.dword(values::PK_TOGGLE) {
            settings.toggle_hotkey = HotkeyChord::from_packed(v);
        }
        if let Some(code) = reader.string(values::UI_LANGUAGE) {
            match UiLanguage::from_code(&code) {
                Some(lang) => settings.ui_language = lang,
                None => warn!(value = %code, "Ignoring invalid ui_language"),
            }
        }

        debug!(path = %self.path, ?settings, "Loaded settings");
        settings
    }

    /// Writes every field; stops at the first rejected write
    pub fn save(&self, settings: &Settings) -> Result<(), StoreError> {
        let mut key = self.hive.create_key(&self.path)?;

        let flag = |b: bool| RegValue::Dword(b as u32);
        key.set_value(values::TYPING_STYLE, RegValue::Dword(settings.typing_style.ordinal()))?;
        key.set_value(values::DEFAULT_ENABLED, flag(settings.default_enabled))?;
        key.set_value(values::OA_UY_TONE1, flag(settings.oa_uy_tone1))?;
        key.set_value(values::ACCEPT_DD, flag(settings.accept_dd))?;
        key.set_value(values::ALLOW_ABBREVIATIONS, flag(settings.allow_abbreviations))?;
        key.set_value(values::BACKSPACE_INVALID, flag(settings.backspace_invalid))?;
        key.set_value(
            values::BACKCONVERT_ON_BACKSPACE,
            RegValue::Dword(settings.backconvert_on_backspace.ordinal()),
        )?;
        key.set_value(
            values::OPTIMIZE_MULTILANG,
            RegValue::Dword(settings.optimize_multilang().get() as u32),
        )?;
        key.set_value(values::AUTOCORRECT, flag(settings.autocorrect))?;
        key.set_value(
            values::SHOW_COMPOSING_ATTR,
            RegValue::Dword(settings.show_composing_attr.ordinal()),
        )?;
        key.set_value(values::PK_TOGGLE, RegValue::Dword(settings.toggle_hotkey.packed()))?;
        match settings.ui_language.code() {
            Some(code) => key.set_value(values::UI_LANGUAGE, RegValue::String(code.to_string()))?,
            None => key.delete_value(values::UI_LANGUAGE)?,
        }

        info!(path = %self.path, "Saved settings");
        Ok(())
    }
}

struct FieldReader<'a, K> {
    key: &'a K,
}

impl<K: HiveKey> FieldReader<'_, K> {
    fn dword(&self, name: &str) -> Option<u32> {
        match self.key.get_value(name) {
            Some(RegValue::Dword(v)) => Some(v),
            Some(other) => {
                warn!(name, value = ?other, "Stored value has wrong type, using default");
                None
            }
            None => {
                debug!(name, "No stored value, using default");
                None
            }
        }
    }

    fn flag(&self, name: &str) -> Option<bool> {
        self.dword(name).map(|v| v != 0)
    }

    fn ordinal<T: Ordinal>(&self, name: &str) -> Option<T> {
        let raw = self.dword(name)?;
        let value = T::from_ordinal(raw);
        if value.is_none() {
            warn!(name, value = raw, "Unknown stored ordinal, using default");
        }
        value
    }

    fn string(&self, name: &str) -> Option<String> {
        match self.key.get_value(name) {
            Some(RegValue::String(s)) => Some(s),
            Some(other) => {
                warn!(name, value = ?other, "Stored value has wrong type, using default");
                None
            }
            None => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::hive::{FileHive, MemoryHive};
    use crate::hotkeys::{KeyCode, Modifiers};

    fn store() -> (MemoryHive, ConfigurationStore<MemoryHive>) {
        let hive = MemoryHive::new();
        (hive.clone(), ConfigurationStore::new(hive))
    }

    fn seed(hive: &MemoryHive, name: &str, value: RegValue) {
        hive.insert(product::STORE_PATH, name, value);
    }

    fn customised() -> Settings {
        let mut s = Settings::default();
        s.typing_style = TypingStyle::TelexComplicated;
        s.default_enabled = true;
        s.oa_uy_tone1 = false;
        s.accept_dd = false;
        s.allow_abbreviations = false;
        s.backspace_invalid = false;
        s.backconvert_on_backspace = Backconvert::Experimental;
        s.set_optimize_multilang(3);
        s.autocorrect = true;
        s.show_composing_attr = ComposingAttr::Underline;
        s.toggle_hotkey = HotkeyChord::new(Modifiers::LCONTROL | Modifiers(0x8000), KeyCode::SPACE);
        s.ui_language = UiLanguage::from_code("en").unwrap();
        s
    }

    #[test]
    fn test_empty_store_loads_defaults() {
        let (_, store) = store();
        let s = store.load();
        assert_eq!(s, Settings::default());
        assert_eq!(s.optimize_multilang().get(), 1);
        assert_eq!(
            s.toggle_hotkey.packed(),
            crate::hotkeys::pack(Modifiers::ALT, KeyCode::GRAVE)
        );
    }

    #[test]
    fn test_save_then_load_reproduces_settings() {
        let (_, store) = store();
        let s = customised();
        store.save(&s).unwrap();
        assert_eq!(store.load(), s);
    }

    #[test]
    fn test_save_writes_every_field() {
        let (hive, store) = store();
        store.save(&customised()).unwrap();
        let mut names = hive.value_names(product::STORE_PATH);
        names.sort();
        let mut expected: Vec<String> = values::ALL.iter().map(|s| s.to_string()).collect();
        expected.sort();
        assert_eq!(names, expected);
        assert_eq!(
            hive.get(product::STORE_PATH, values::OA_UY_TONE1),
            Some(RegValue::Dword(0))
        );
    }

    #[test]
    fn test_system_language_removes_stored_value() {
        let (hive, store) = store();
        store.save(&customised()).unwrap();
        store.save(&Settings::default()).unwrap();
        assert_eq!(hive.get(product::STORE_PATH, values::UI_LANGUAGE), None);
        assert_eq!(store.load().ui_language, UiLanguage::SystemDefault);
    }

    #[test]
    fn test_wrong_types_fall_back_per_field() {
        let (hive, store) = store();
        seed(&hive, values::OA_UY_TONE1, RegValue::String("no".into()));
        seed(&hive, values::ACCEPT_DD, RegValue::Dword(0));
        seed(&hive, values::UI_LANGUAGE, RegValue::Dword(1));
        seed(&hive, values::PK_TOGGLE, RegValue::Unsupported("binary"));
        let s = store.load();
        assert!(s.oa_uy_tone1);
        assert!(!s.accept_dd);
        assert_eq!(s.ui_language, UiLanguage::SystemDefault);
        assert_eq!(s.toggle_hotkey, HotkeyChord::default());
    }

    #[test]
    fn test_invalid_values_fall_back_per_field() {
        let (hive, store) = store();
        seed(&hive, values::OPTIMIZE_MULTILANG, RegValue::Dword(-2i32 as u32));
        seed(&hive, values::TYPING_STYLE, RegValue::Dword(9));
        seed(&hive, values::UI_LANGUAGE, RegValue::String("english".into()));
        seed(&hive, values::AUTOCORRECT, RegValue::Dword(5));
        let s = store.load();
        assert_eq!(s.optimize_multilang().get(), 1);
        assert_eq!(s.typing_style, TypingStyle::Telex);
        assert_eq!(s.ui_language, UiLanguage::SystemDefault);
        assert!(s.autocorrect);
    }

    #[test]
    fn test_legacy_boolean_backconvert() {
        let (hive, store) = store();
        seed(&hive, values::BACKCONVERT_ON_BACKSPACE, RegValue::Dword(1));
        assert_eq!(store.load().backconvert_on_backspace, Backconvert::On);
        seed(&hive, values::BACKCONVERT_ON_BACKSPACE, RegValue::Dword(2));
        assert_eq!(store.load().backconvert_on_backspace, Backconvert::Experimental);
        seed(&hive, values::BACKCONVERT_ON_BACKSPACE, RegValue::Dword(7));
        assert_eq!(store.load().backconvert_on_backspace, Backconvert::Off);
    }

    #[test]
    fn test_save_to_read_only_store_fails() {
        let hive = MemoryHive::new();
        let store = ConfigurationStore::new(hive.read_only());
        assert!(matches!(store.save(&customised()), Err(StoreError::Write { .. })));
        assert_eq!(store.load(), Settings::default());
    }

    #[test]
    fn test_toggle_then_save_scenario() {
        let (_, store) = store();
        let mut s = store.load();
        assert!(!s.default_enabled);
        assert!(s.oa_uy_tone1);
        s.oa_uy_tone1 = false;
        store.save(&s).unwrap();

        let fresh = store.load();
        assert!(!fresh.oa_uy_tone1);
        let mut expected = Settings::default();
        expected.oa_uy_tone1 = false;
        assert_eq!(fresh, expected);
    }

    #[test]
    fn test_uppercase_language_round_trips() {
        let (hive, store) = store();
        let mut s = Settings::default();
        s.ui_language = UiLanguage::from_code("EN").unwrap();
        store.save(&s).unwrap();
        assert_eq!(
            hive.get(product::STORE_PATH, values::UI_LANGUAGE),
            Some(RegValue::String("en".into()))
        );
        assert_eq!(store.load(), s);
    }

    #[test]
    fn test_deserialized_settings_round_trip() {
        let (_, store) = store();
        let mut json = serde_json::to_value(Settings::default()).unwrap();
        json["optimize_multilang"] = serde_json::json!(200);
        json["ui_language"] = serde_json::json!({ "locale": "VI" });
        let s: Settings = serde_json::from_value(json).unwrap();
        assert_eq!(s.optimize_multilang().get(), 3);
        assert_eq!(s.ui_language.code(), Some("vi"));
        store.save(&s).unwrap();
        assert_eq!(store.load(), s);
    }

    #[test]
    fn test_file_hive_backed_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigurationStore::new(FileHive::new(dir.path().join("registry.toml")));
        assert_eq!(store.load(), Settings::default());
        let s = customised();
        store.save(&s).unwrap();
        let again = ConfigurationStore::new(FileHive::new(dir.path().join("registry.toml")));
        assert_eq!(again.load(), s);
    }
}
