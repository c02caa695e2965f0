//! Engine configuration entity
//!
//! A `Settings` value is what the configuration dialog edits and what the
//! text service reads back after a change notification. Construction always
//! starts from compiled-in defaults; the store overlays whatever it finds.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::constants::values;
use crate::hotkeys::HotkeyChord;

/// Input convention used by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypingStyle {
    #[default]
    Telex,
    Vni,
    TelexComplicated,
}

/// Whether backspace re-opens a committed word for editing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backconvert {
    #[default]
    Off,
    On,
    Experimental,
}

/// Visual feedback while a word is being composed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComposingAttr {
    #[default]
    Default,
    Underline,
    None,
}

/// Stored ordinal <-> enum variant mapping
pub trait Ordinal: Sized + Copy + 'static {
    const VARIANTS: &'static [(Self, &'static str)];

    fn ordinal(self) -> u32;

    fn from_ordinal(value: u32) -> Option<Self> {
        Self::VARIANTS.iter().map(|(v, _)| *v).find(|v| v.ordinal() == value)
    }

    fn name(self) -> &'static str {
        Self::VARIANTS
            .iter()
            .find(|(v, _)| v.ordinal() == self.ordinal())
            .map(|(_, n)| *n)
            .unwrap_or("?")
    }

    /// Accepts a variant name (case-insensitive) or its ordinal
    fn parse_name(text: &str) -> Option<Self> {
        let text = text.trim();
        if let Ok(n) = text.parse::<u32>() {
            return Self::from_ordinal(n);
        }
        Self::VARIANTS
            .iter()
            .find(|(_, n)| n.eq_ignore_ascii_case(text))
            .map(|(v, _)| *v)
    }
}

impl Ordinal for TypingStyle {
    const VARIANTS: &'static [(Self, &'static str)] = &[
        (Self::Telex, "telex"),
        (Self::Vni, "vni"),
        (Self::TelexComplicated, "telex_complicated"),
    ];

    fn ordinal(self) -> u32 {
        self as u32
    }
}

impl Ordinal for Backconvert {
    const VARIANTS: &'static [(Self, &'static str)] = &[
        (Self::Off, "off"),
        (Self::On, "on"),
        (Self::Experimental, "experimental"),
    ];

    fn ordinal(self) -> u32 {
        self as u32
    }
}

impl Ordinal for ComposingAttr {
    const VARIANTS: &'static [(Self, &'static str)] = &[
        (Self::Default, "default"),
        (Self::Underline, "underline"),
        (Self::None, "none"),
    ];

    fn ordinal(self) -> u32 {
        self as u32
    }
}

/// Multilingual optimisation level, always within `0..=MAX`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u8")]
pub struct MultilangLevel(u8);

impl MultilangLevel {
    pub const MAX: u8 = 3;

    /// Negative levels are rejected; levels above `MAX` are clamped
    pub fn new(value: i64) -> Option<Self> {
        if value < 0 {
            return None;
        }
        Some(Self(value.min(Self::MAX as i64) as u8))
    }

    pub fn get(self) -> u8 {
        self.0
    }
}

impl Default for MultilangLevel {
    fn default() -> Self {
        Self(1)
    }
}

impl TryFrom<i64> for MultilangLevel {
    type Error = String;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value).ok_or_else(|| format!("negative optimize_multilang level {value}"))
    }
}

impl From<MultilangLevel> for u8 {
    fn from(level: MultilangLevel) -> Self {
        level.0
    }
}

/// Two lowercase ASCII letters
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct LocaleCode(String);

impl LocaleCode {
    /// Case-insensitive; stored lowercase
    pub fn new(code: &str) -> Option<Self> {
        let code = code.trim();
        (code.len() == 2 && code.chars().all(|c| c.is_ascii_alphabetic()))
            .then(|| Self(code.to_ascii_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for LocaleCode {
    type Error = String;

    fn try_from(code: String) -> Result<Self, Self::Error> {
        Self::new(&code).ok_or_else(|| format!("invalid language code '{code}'"))
    }
}

impl From<LocaleCode> for String {
    fn from(code: LocaleCode) -> Self {
        code.0
    }
}

/// Language of the configuration front-end itself
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UiLanguage {
    #[default]
    SystemDefault,
    Locale(LocaleCode),
}

impl UiLanguage {
    /// Two ASCII letters (normalised to lowercase), or empty for system default
    pub fn from_code(code: &str) -> Option<Self> {
        let code = code.trim();
        if code.is_empty() {
            return Some(Self::SystemDefault);
        }
        LocaleCode::new(code).map(Self::Locale)
    }

    pub fn code(&self) -> Option<&str> {
        match self {
            Self::SystemDefault => None,
            Self::Locale(code) => Some(code.as_str()),
        }
    }
}

impl fmt::Display for UiLanguage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SystemDefault => f.write_str("system"),
            Self::Locale(code) => f.write_str(code.as_str()),
        }
    }
}

/// Error applying a textual `name=value` edit
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SettingError {
    #[error("unknown setting '{0}'")]
    UnknownName(String),
    #[error("invalid value '{value}' for {name}")]
    InvalidValue { name: String, value: String },
    #[error("expected NAME=VALUE, got '{0}'")]
    Malformed(String),
}

/// The persisted IME configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    pub typing_style: TypingStyle,
    pub default_enabled: bool,
    /// Put the tone on the second vowel of "oa"/"uy"
    pub oa_uy_tone1: bool,
    /// Accept the second 'd' of "dd" anywhere in the word
    pub accept_dd: bool,
    pub allow_abbreviations: bool,
    /// Backspacing out of an invalid word keeps it invalid
    pub backspace_invalid: bool,
    pub backconvert_on_backspace: Backconvert,
    optimize_multilang: MultilangLevel,
    pub autocorrect: bool,
    pub show_composing_attr: ComposingAttr,
    pub toggle_hotkey: HotkeyChord,
    pub ui_language: UiLanguage,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            typing_style: TypingStyle::Telex,
            default_enabled: false,
            oa_uy_tone1: true,
            accept_dd: true,
            allow_abbreviations: true,
            backspace_invalid: true,
            backconvert_on_backspace: Backconvert::Off,
            optimize_multilang: MultilangLevel::default(),
            autocorrect: false,
            show_composing_attr: ComposingAttr::Default,
            toggle_hotkey: HotkeyChord::default(),
            ui_language: UiLanguage::SystemDefault,
        }
    }
}

impl Settings {
    pub fn optimize_multilang(&self) -> MultilangLevel {
        self.optimize_multilang
    }

    /// Returns false (field unchanged) for negative values
    pub fn set_optimize_multilang(&mut self, value: i64) -> bool {
        match MultilangLevel::new(value) {
            Some(level) => {
                self.optimize_multilang = level;
                true
            }
            None => false,
        }
    }

    /// Apply one `name=value` edit keyed by stored value name.
    /// Returns the canonical value name that changed.
    pub fn apply_edit(&mut self, edit: &str) -> Result<&'static str, SettingError> {
        let (name, value) = edit
            .split_once('=')
            .ok_or_else(|| SettingError::Malformed(edit.to_string()))?;
        self.set_field(name.trim(), value.trim())
    }

    pub fn set_field(&mut self, name: &str, value: &str) -> Result<&'static str, SettingError> {
        let invalid = || SettingError::InvalidValue {
            name: name.to_string(),
            value: value.to_string(),
        };
        let field = values::ALL
            .iter()
            .copied()
            .find(|n| n.eq_ignore_ascii_case(name))
            .ok_or_else(|| SettingError::UnknownName(name.to_string()))?;

        match field {
            values::TYPING_STYLE => {
                self.typing_style = TypingStyle::parse_name(value).ok_or_else(invalid)?
            }
            values::DEFAULT_ENABLED => self.default_enabled = parse_bool(value).ok_or_else(invalid)?,
            values::OA_UY_TONE1 => self.oa_uy_tone1 = parse_bool(value).ok_or_else(invalid)?,
            values::ACCEPT_DD => self.accept_dd = parse_bool(value).ok_or_else(invalid)?,
            values::ALLOW_ABBREVIATIONS => {
                self.allow_abbreviations = parse_bool(value).ok_or_else(invalid)?
            }
            values::BACKSPACE_INVALID => {
                self.backspace_invalid = parse_bool(value).ok_or_else(invalid)?
            }
            values::BACKCONVERT_ON_BACKSPACE => {
                self.backconvert_on_backspace = parse_bool(value)
                    .map(|b| if b { Backconvert::On } else { Backconvert::Off })
                    .or_else(|| Backconvert::parse_name(value))
                    .ok_or_else(invalid)?
            }
            values::OPTIMIZE_MULTILANG => {
                let n = value.parse::<i64>().map_err(|_| invalid())?;
                if !self.set_optimize_multilang(n) {
                    return Err(invalid());
                }
            }
            values::AUTOCORRECT => self.autocorrect = parse_bool(value).ok_or_else(invalid)?,
            values::SHOW_COMPOSING_ATTR => {
                self.show_composing_attr = ComposingAttr::parse_name(value).ok_or_else(invalid)?
            }
            values::PK_TOGGLE => {
                self.toggle_hotkey = HotkeyChord::from_str(value).map_err(|_| invalid())?
            }
            values::UI_LANGUAGE => {
                self.ui_language = if value.eq_ignore_ascii_case("system") {
                    UiLanguage::SystemDefault
                } else {
                    UiLanguage::from_code(value).ok_or_else(invalid)?
                }
            }
            _ => return Err(SettingError::UnknownName(name.to_string())),
        }
        Ok(field)
    }

    /// `(value name, display text)` pairs in store order
    pub fn describe(&self) -> Vec<(&'static str, String)> {
        vec![
            (values::TYPING_STYLE, self.typing_style.name().to_string()),
            (values::DEFAULT_ENABLED, self.default_enabled.to_string()),
            (values::OA_UY_TONE1, self.oa_uy_tone1.to_string()),
            (values::ACCEPT_DD, self.accept_dd.to_string()),
            (values::ALLOW_ABBREVIATIONS, self.allow_abbreviations.to_string()),
            (values::BACKSPACE_INVALID, self.backspace_invalid.to_string()),
            (values::BACKCONVERT_ON_BACKSPACE, self.backconvert_on_backspace.name().to_string()),
            (values::OPTIMIZE_MULTILANG, self.optimize_multilang.get().to_string()),
            (values::AUTOCORRECT, self.autocorrect.to_string()),
            (values::SHOW_COMPOSING_ATTR, self.show_composing_attr.name().to_string()),
            (
                values::PK_TOGGLE,
                format!("{} (0x{:08X})", self.toggle_hotkey, self.toggle_hotkey.packed()),
            ),
            (values::UI_LANGUAGE, self.ui_language.to_string()),
        ]
    }
}

fn parse_bool(text: &str) -> Option<bool> {
    match text.to_ascii_lowercase().as_str() {
        "1" | "true" | "on" | "yes" => Some(true),
        "0" | "false" | "off" | "no" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hotkeys::{KeyCode, Modifiers};

    #[test]
    fn test_defaults() {
        let s = Settings::default();
        assert!(!s.default_enabled);
        assert!(s.oa_uy_tone1);
        assert!(s.accept_dd);
        assert!(s.backspace_invalid);
        assert_eq!(s.backconvert_on_backspace, Backconvert::Off);
        assert_eq!(s.optimize_multilang().get(), 1);
        assert!(!s.autocorrect);
        assert_eq!(s.toggle_hotkey.packed(), 0x100C0);
        assert_eq!(s.ui_language, UiLanguage::SystemDefault);
    }

    #[test]
    fn test_negative_multilang_rejected() {
        let mut s = Settings::default();
        assert!(s.set_optimize_multilang(2));
        assert!(!s.set_optimize_multilang(-1));
        assert_eq!(s.optimize_multilang().get(), 2);
    }

    #[test]
    fn test_multilang_clamped_to_max() {
        let mut s = Settings::default();
        assert!(s.set_optimize_multilang(42));
        assert_eq!(s.optimize_multilang().get(), MultilangLevel::MAX);
    }

    #[test]
    fn test_ordinals() {
        assert_eq!(TypingStyle::from_ordinal(1), Some(TypingStyle::Vni));
        assert_eq!(TypingStyle::from_ordinal(3), None);
        assert_eq!(Backconvert::Experimental.ordinal(), 2);
        assert_eq!(ComposingAttr::parse_name("Underline"), Some(ComposingAttr::Underline));
        assert_eq!(ComposingAttr::parse_name("2"), Some(ComposingAttr::None));
    }

    #[test]
    fn test_ui_language_codes() {
        assert_eq!(UiLanguage::from_code("VI"), Some(UiLanguage::Locale(LocaleCode::new("vi").unwrap())));
        assert_eq!(UiLanguage::from_code(""), Some(UiLanguage::SystemDefault));
        assert_eq!(UiLanguage::from_code("vie"), None);
        assert_eq!(UiLanguage::from_code("v1"), None);
        assert_eq!(LocaleCode::new("EN").unwrap().as_str(), "en");
        let parsed: LocaleCode = serde_json::from_str("\"Vi\"").unwrap();
        assert_eq!(parsed.as_str(), "vi");
        assert!(serde_json::from_str::<LocaleCode>("\"vie\"").is_err());
    }

    #[test]
    fn test_multilang_level_deserialize_is_bounded() {
        let level: MultilangLevel = serde_json::from_str("200").unwrap();
        assert_eq!(level.get(), MultilangLevel::MAX);
        assert!(serde_json::from_str::<MultilangLevel>("-1").is_err());
        assert_eq!(serde_json::to_string(&MultilangLevel::default()).unwrap(), "1");
    }

    #[test]
    fn test_apply_edits() {
        let mut s = Settings::default();
        assert_eq!(s.apply_edit("oa_uy_tone1=false"), Ok(values::OA_UY_TONE1));
        assert!(!s.oa_uy_tone1);
        s.apply_edit("typing_style=vni").unwrap();
        assert_eq!(s.typing_style, TypingStyle::Vni);
        s.apply_edit("backconvert_on_backspace=experimental").unwrap();
        assert_eq!(s.backconvert_on_backspace, Backconvert::Experimental);
        s.apply_edit("backconvert_on_backspace=1").unwrap();
        assert_eq!(s.backconvert_on_backspace, Backconvert::On);
        s.apply_edit("pk_toggle=Ctrl+Space").unwrap();
        assert_eq!(s.toggle_hotkey, HotkeyChord::new(Modifiers::CONTROL, KeyCode::SPACE));
        s.apply_edit("ui_language=en").unwrap();
        assert_eq!(s.ui_language.code(), Some("en"));
        s.apply_edit("UI_LANGUAGE = system").unwrap();
        assert_eq!(s.ui_language, UiLanguage::SystemDefault);
    }

    #[test]
    fn test_apply_edit_errors_leave_settings_untouched() {
        let mut s = Settings::default();
        let before = s.clone();
        assert!(matches!(s.apply_edit("nope=1"), Err(SettingError::UnknownName(_))));
        assert!(matches!(s.apply_edit("autocorrect"), Err(SettingError::Malformed(_))));
        assert!(matches!(
            s.apply_edit("optimize_multilang=-3"),
            Err(SettingError::InvalidValue { .. })
        ));
        assert!(matches!(
            s.apply_edit("typing_style=7"),
            Err(SettingError::InvalidValue { .. })
        ));
        assert_eq!(s, before);
    }

    #[test]
    fn test_describe_covers_every_value() {
        let described = Settings::default().describe();
        let names: Vec<_> = described.iter().map(|(n, _)| *n).collect();
        assert_eq!(names, values::ALL.to_vec());
    }
}
