//! Application-wide constants
//!
//! Every magic number and string literal shared between the configuration
//! front-end and the text service lives here, so both sides agree on the
//! store layout and the notification slot.

/// Product identity and store location
pub mod product {
    /// Product name, also the last component of the store path
    pub const NAME: &str = "VietType";

    /// Store path under the current-user hive
    pub const STORE_PATH: &str = "Software\\VietType";
}

/// Stored value names under [`product::STORE_PATH`]
pub mod values {
    pub const TYPING_STYLE: &str = "typing_style";
    pub const DEFAULT_ENABLED: &str = "default_enabled";
    pub const OA_UY_TONE1: &str = "oa_uy_tone1";
    pub const ACCEPT_DD: &str = "accept_dd";
    pub const ALLOW_ABBREVIATIONS: &str = "allow_abbreviations";
    pub const BACKSPACE_INVALID: &str = "backspace_invalid";
    pub const BACKCONVERT_ON_BACKSPACE: &str = "backconvert_on_backspace";
    pub const OPTIMIZE_MULTILANG: &str = "optimize_multilang";
    pub const AUTOCORRECT: &str = "autocorrect";
    pub const SHOW_COMPOSING_ATTR: &str = "show_composing_attr";
    pub const PK_TOGGLE: &str = "pk_toggle";
    pub const UI_LANGUAGE: &str = "ui_language";

    /// All value names, in the order they are written on save
    pub const ALL: [&str; 12] = [
        TYPING_STYLE,
        DEFAULT_ENABLED,
        OA_UY_TONE1,
        ACCEPT_DD,
        ALLOW_ABBREVIATIONS,
        BACKSPACE_INVALID,
        BACKCONVERT_ON_BACKSPACE,
        OPTIMIZE_MULTILANG,
        AUTOCORRECT,
        SHOW_COMPOSING_ATTR,
        PK_TOGGLE,
        UI_LANGUAGE,
    ];
}

/// Virtual key codes used by the default toggle chord
pub mod keys {
    /// VK_OEM_3, the grave/tilde key on US layouts
    pub const VK_OEM_3: u16 = 0xC0;

    /// VK_SPACE
    pub const VK_SPACE: u16 = 0x20;
}

/// Text-services coordination identifiers
pub mod tsf {
    use crate::notify::Guid;

    /// Global compartment bumped after every successful save
    pub const SYSTEM_NOTIFY_COMPARTMENT: Guid =
        Guid::from_u128(0xB2FBD2E7_922F_4996_BE77_21085B91A8F0);

    /// CLSID of the system thread manager
    pub const CLSID_THREAD_MGR: Guid = Guid::from_u128(0x529A9E6B_6587_4F23_AB9E_9C7D683E3C50);
}

/// Engine status codes (HRESULT values)
pub mod status {
    pub const S_OK: i32 = 0;
    pub const S_FALSE: i32 = 1;
    pub const E_NOTIMPL: i32 = 0x8000_4001_u32 as i32;
    pub const E_FAIL: i32 = 0x8000_4005_u32 as i32;
    pub const E_ACCESSDENIED: i32 = 0x8007_0005_u32 as i32;
    pub const E_INVALIDARG: i32 = 0x8007_0057_u32 as i32;
    pub const REGDB_E_CLASSNOTREG: i32 = 0x8004_0154_u32 as i32;
}

/// Native engine library and its exported entry points
pub mod engine {
    #[cfg(target_arch = "x86_64")]
    pub const LIBRARY: &str = "VietTypeATL64.dll";
    #[cfg(target_arch = "x86")]
    pub const LIBRARY: &str = "VietTypeATL32.dll";
    #[cfg(target_arch = "aarch64")]
    pub const LIBRARY: &str = "VietTypeATLARM64.dll";
    #[cfg(not(any(target_arch = "x86_64", target_arch = "x86", target_arch = "aarch64")))]
    pub const LIBRARY: &str = "VietTypeATL.dll";

    pub const ACTIVATE_PROFILES: &str = "ActivateProfiles";
    pub const DEACTIVATE_PROFILES: &str = "DeactivateProfiles";
    pub const IS_PROFILE_ACTIVATED: &str = "IsProfileActivated";
    pub const REGISTER_PROFILES: &str = "RegisterProfiles";
    pub const UNREGISTER_PROFILES: &str = "UnregisterProfiles";
    pub const REGISTER_CATEGORIES: &str = "RegisterCategories";
    pub const UNREGISTER_CATEGORIES: &str = "UnregisterCategories";
}

/// Portable (non-registry) storage locations
pub mod paths {
    /// Directory under the user config dir holding the file hive
    pub const APP_DIR: &str = "VietType";

    /// File hive name
    pub const HIVE_FILE: &str = "registry.toml";

    /// Directory under the runtime dir holding compartment slots
    pub const COMPARTMENT_DIR: &str = "compartments";

    /// Overrides the file hive location
    pub const STORE_ENV: &str = "VIETTYPE_STORE";

    /// Overrides the compartment directory
    pub const COMPARTMENTS_ENV: &str = "VIETTYPE_COMPARTMENTS";
}

/// Change watcher polling
pub mod watch {
    /// Default interval between compartment polls
    pub const DEFAULT_INTERVAL_MS: u64 = 1000;
}
