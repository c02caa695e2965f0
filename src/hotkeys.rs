//! Toggle hotkey chord and its packed 32-bit encoding
//!
//! The text service reads the chord as a single DWORD: modifier mask in the
//! high 16 bits, virtual key code in the low 16 bits. Packing never validates
//! the modifier mask so bits unknown to this version survive a round trip.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::constants::keys;

/// Modifier mask of a toggle chord
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Modifiers(pub u16);

impl Modifiers {
    pub const NONE: Self = Self(0);
    pub const ALT: Self = Self(0x1);
    pub const CONTROL: Self = Self(0x2);
    pub const SHIFT: Self = Self(0x4);
    pub const RALT: Self = Self(0x8);
    pub const RCONTROL: Self = Self(0x10);
    pub const RSHIFT: Self = Self(0x20);
    pub const LALT: Self = Self(0x40);
    pub const LCONTROL: Self = Self(0x80);
    pub const LSHIFT: Self = Self(0x100);
    pub const ANY: Self = Self(0x400);

    const NAMED: [(Self, &'static str); 10] = [
        (Self::CONTROL, "Ctrl"),
        (Self::LCONTROL, "LCtrl"),
        (Self::RCONTROL, "RCtrl"),
        (Self::ALT, "Alt"),
        (Self::LALT, "LAlt"),
        (Self::RALT, "RAlt"),
        (Self::SHIFT, "Shift"),
        (Self::LSHIFT, "LShift"),
        (Self::RSHIFT, "RShift"),
        (Self::ANY, "Any"),
    ];

    pub const fn bits(self) -> u16 {
        self.0
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// Bits not covered by any named modifier
    pub const fn unknown_bits(self) -> u16 {
        let mut known = 0;
        let mut i = 0;
        while i < Self::NAMED.len() {
            known |= Self::NAMED[i].0.0;
            i += 1;
        }
        self.0 & !known
    }

    fn from_name(name: &str) -> Option<Self> {
        let lower = name.to_ascii_lowercase();
        let canonical = match lower.as_str() {
            "control" => "ctrl",
            "lcontrol" => "lctrl",
            "rcontrol" => "rctrl",
            other => other,
        };
        Self::NAMED
            .iter()
            .find(|(_, n)| n.eq_ignore_ascii_case(canonical))
            .map(|(m, _)| *m)
    }
}

impl std::ops::BitOr for Modifiers {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}

/// Windows virtual key code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeyCode(pub u16);

impl KeyCode {
    pub const GRAVE: Self = Self(keys::VK_OEM_3);
    pub const SPACE: Self = Self(keys::VK_SPACE);

    fn name(self) -> Option<String> {
        match self.0 {
            keys::VK_OEM_3 => Some("Grave".to_string()),
            keys::VK_SPACE => Some("Space".to_string()),
            c @ (0x30..=0x39 | 0x41..=0x5A) => Some(char::from(c as u8).to_string()),
            c @ 0x70..=0x87 => Some(format!("F{}", c - 0x6F)),
            _ => None,
        }
    }

    fn parse(text: &str) -> Option<Self> {
        let lower = text.to_ascii_lowercase();
        match lower.as_str() {
            "grave" | "tilde" | "`" | "~" => return Some(Self::GRAVE),
            "space" => return Some(Self::SPACE),
            _ => {}
        }
        if let Some(hex) = lower.strip_prefix("0x") {
            return u16::from_str_radix(hex, 16).ok().map(Self);
        }
        if let Some(n) = lower.strip_prefix('f')
            && let Ok(n) = n.parse::<u16>()
            && (1..=24).contains(&n)
        {
            return Some(Self(0x6F + n));
        }
        let mut chars = text.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) if c.is_ascii_alphanumeric() => Some(Self(c.to_ascii_uppercase() as u16)),
            _ => None,
        }
    }
}

/// Pack a modifier mask and key code into one DWORD
pub const fn pack(modifiers: Modifiers, key: KeyCode) -> u32 {
    ((modifiers.0 as u32 & 0xFFFF) << 16) | (key.0 as u32 & 0xFFFF)
}

/// Split a packed DWORD back into modifier mask and key code
pub const fn unpack(value: u32) -> (Modifiers, KeyCode) {
    (
        Modifiers(((value >> 16) & 0xFFFF) as u16),
        KeyCode((value & 0xFFFF) as u16),
    )
}

/// Toggle hotkey binding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HotkeyChord {
    pub modifiers: Modifiers,
    pub key: KeyCode,
}

impl HotkeyChord {
    pub const fn new(modifiers: Modifiers, key: KeyCode) -> Self {
        Self { modifiers, key }
    }

    pub const fn packed(self) -> u32 {
        pack(self.modifiers, self.key)
    }

    pub const fn from_packed(value: u32) -> Self {
        let (modifiers, key) = unpack(value);
        Self { modifiers, key }
    }
}

impl Default for HotkeyChord {
    /// Alt + grave
    fn default() -> Self {
        Self::new(Modifiers::ALT, KeyCode::GRAVE)
    }
}

impl fmt::Display for HotkeyChord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (modifier, name) in Modifiers::NAMED {
            if self.modifiers.contains(modifier) {
                write!(f, "{name}+")?;
            }
        }
        let unknown = self.modifiers.unknown_bits();
        if unknown != 0 {
            write!(f, "0x{unknown:X}+")?;
        }
        // A lone digit would read back as a packed value
        let bare_digit = self.modifiers == Modifiers::NONE && (0x30..=0x39).contains(&self.key.0);
        match self.key.name() {
            Some(name) if !bare_digit => write!(f, "{name}"),
            _ => write!(f, "0x{:02X}", self.key.0),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid hotkey chord '{0}' (expected e.g. Alt+Grave, Ctrl+Shift+0x20 or a packed integer)")]
pub struct ParseChordError(pub String);

impl FromStr for HotkeyChord {
    type Err = ParseChordError;

    /// Accepts `Mod+Mod+Key` text or a raw packed value (`0x100C0` / `65728`)
    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let text = text.trim();
        let err = || ParseChordError(text.to_string());

        if !text.contains('+') {
            if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X"))
                && hex.len() > 4
            {
                return u32::from_str_radix(hex, 16).map(Self::from_packed).map_err(|_| err());
            }
            if let Ok(packed) = text.parse::<u32>() {
                return Ok(Self::from_packed(packed));
            }
        }

        let mut parts: Vec<&str> = text.split('+').map(str::trim).collect();
        let key_part = parts.pop().filter(|k| !k.is_empty()).ok_or_else(err)?;
        let key = KeyCode::parse(key_part).ok_or_else(err)?;

        let mut modifiers = Modifiers::NONE;
        for part in parts {
            let modifier = Modifiers::from_name(part)
                .or_else(|| {
                    part.strip_prefix("0x")
                        .and_then(|hex| u16::from_str_radix(hex, 16).ok())
                        .map(Modifiers)
                })
                .ok_or_else(err)?;
            modifiers = modifiers | modifier;
        }

        Ok(Self::new(modifiers, key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_chord_is_alt_grave() {
        assert_eq!(HotkeyChord::default().packed(), 0x0001_00C0);
        assert_eq!(
            HotkeyChord::default().packed(),
            pack(Modifiers::ALT, KeyCode::GRAVE)
        );
    }

    #[test]
    fn test_pack_layout() {
        assert_eq!(pack(Modifiers(0xABCD), KeyCode(0x1234)), 0xABCD_1234);
        assert_eq!(unpack(0xABCD_1234), (Modifiers(0xABCD), KeyCode(0x1234)));
    }

    #[test]
    fn test_round_trip_edges() {
        let samples = [0u16, 1, 0x7F, 0x80, 0xFF, 0x400, 0x7FFF, 0x8000, 0xFFFE, 0xFFFF];
        for &m in &samples {
            for &k in &samples {
                assert_eq!(unpack(pack(Modifiers(m), KeyCode(k))), (Modifiers(m), KeyCode(k)));
            }
        }
    }

    #[test]
    fn test_round_trip_sweep() {
        // Strided sweep across both halves, including every high bit pattern
        for m in (0..=u16::MAX).step_by(257) {
            for k in (0..=u16::MAX).step_by(263) {
                let (um, uk) = unpack(pack(Modifiers(m), KeyCode(k)));
                assert_eq!((um.0, uk.0), (m, k));
            }
        }
    }

    #[test]
    fn test_unknown_modifier_bits_preserved() {
        let chord = HotkeyChord::new(Modifiers(0x8000 | 0x1), KeyCode::SPACE);
        assert_eq!(HotkeyChord::from_packed(chord.packed()), chord);
        assert_eq!(chord.modifiers.unknown_bits(), 0x8000);
    }

    #[test]
    fn test_display() {
        assert_eq!(HotkeyChord::default().to_string(), "Alt+Grave");
        let chord = HotkeyChord::new(Modifiers::CONTROL | Modifiers::SHIFT, KeyCode(0x41));
        assert_eq!(chord.to_string(), "Ctrl+Shift+A");
        let odd = HotkeyChord::new(Modifiers(0x200), KeyCode(0xE5));
        assert_eq!(odd.to_string(), "0x200+0xE5");
    }

    #[test]
    fn test_parse_text_forms() {
        assert_eq!("Alt+Grave".parse::<HotkeyChord>(), Ok(HotkeyChord::default()));
        assert_eq!("alt+`".parse::<HotkeyChord>(), Ok(HotkeyChord::default()));
        assert_eq!(
            "Control+Shift+0x20".parse::<HotkeyChord>(),
            Ok(HotkeyChord::new(Modifiers::CONTROL | Modifiers::SHIFT, KeyCode::SPACE))
        );
        assert_eq!(
            "RAlt+F2".parse::<HotkeyChord>(),
            Ok(HotkeyChord::new(Modifiers::RALT, KeyCode(0x71)))
        );
        assert_eq!(
            "Space".parse::<HotkeyChord>(),
            Ok(HotkeyChord::new(Modifiers::NONE, KeyCode::SPACE))
        );
    }

    #[test]
    fn test_parse_packed_forms() {
        assert_eq!("0x100C0".parse::<HotkeyChord>(), Ok(HotkeyChord::default()));
        assert_eq!("65728".parse::<HotkeyChord>(), Ok(HotkeyChord::default()));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!("Hyper+Grave".parse::<HotkeyChord>().is_err());
        assert!("Alt+".parse::<HotkeyChord>().is_err());
        assert!("".parse::<HotkeyChord>().is_err());
        assert!("Alt+Enterprise".parse::<HotkeyChord>().is_err());
    }

    #[test]
    fn test_display_parse_round_trip() {
        for chord in [
            HotkeyChord::default(),
            HotkeyChord::new(Modifiers::LCONTROL | Modifiers::LSHIFT, KeyCode(0x5A)),
            HotkeyChord::new(Modifiers::ANY, KeyCode(0x7B)),
            HotkeyChord::new(Modifiers::NONE, KeyCode(0x35)),
            HotkeyChord::new(Modifiers::NONE, KeyCode(0x41)),
            HotkeyChord::new(Modifiers::CONTROL, KeyCode(0x35)),
        ] {
            assert_eq!(chord.to_string().parse::<HotkeyChord>(), Ok(chord));
        }
    }

    #[test]
    fn test_bare_digit_key_displays_as_hex() {
        assert_eq!(HotkeyChord::new(Modifiers::NONE, KeyCode(0x35)).to_string(), "0x35");
        assert_eq!(HotkeyChord::new(Modifiers::CONTROL, KeyCode(0x35)).to_string(), "Ctrl+5");
        assert_eq!("5".parse::<HotkeyChord>(), Ok(HotkeyChord::from_packed(5)));
    }
}
