//! Concrete backends for the running OS
//!
//! Windows uses the registry, text-services compartments and the engine
//! library. Elsewhere (and on Windows when a file store is requested) the
//! registry is emulated by a TOML file and compartments by files.

use std::ffi::OsString;
use std::path::PathBuf;

use tracing::debug;

use crate::activation::ActivationController;
use crate::config::{FileHive, HiveKey, RegValue, SettingsHive, StoreError};
use crate::constants::paths;
use crate::notify::file_compartment::{FileCompartmentHost, FileThreadManager};
use crate::notify::{ClientId, Compartment, Guid, NotifyError, ThreadManager, ThreadManagerSource};

#[cfg(windows)]
use crate::config::registry::{RegistryKey, WindowsRegistry};
#[cfg(windows)]
use crate::notify::tsf::{TsfHost, TsfThreadManager};

#[cfg(windows)]
pub type PlatformLocator = crate::activation::native::NativeLocator;
#[cfg(not(windows))]
pub type PlatformLocator = crate::activation::Unsupported;

/// Backend selection from the command line; environment fills the gaps
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub store: Option<PathBuf>,
    pub compartments: Option<PathBuf>,
}

impl Overrides {
    /// Flags win over `VIETTYPE_STORE` / `VIETTYPE_COMPARTMENTS`
    pub fn with_env(self) -> Self {
        Self::merge(
            self,
            std::env::var_os(paths::STORE_ENV),
            std::env::var_os(paths::COMPARTMENTS_ENV),
        )
    }

    fn merge(self, store_env: Option<OsString>, compartments_env: Option<OsString>) -> Self {
        let non_empty = |v: OsString| (!v.is_empty()).then(|| PathBuf::from(v));
        Self {
            store: self.store.or_else(|| store_env.and_then(non_empty)),
            compartments: self.compartments.or_else(|| compartments_env.and_then(non_empty)),
        }
    }

    pub fn hive(&self) -> PlatformHive {
        let hive = match &self.store {
            Some(path) => PlatformHive::File(FileHive::new(path)),
            #[cfg(windows)]
            None => PlatformHive::Registry(WindowsRegistry),
            #[cfg(not(windows))]
            None => PlatformHive::File(FileHive::new(FileHive::default_path())),
        };
        debug!(hive = %hive.describe(), "Selected settings store");
        hive
    }

    pub fn compartments(&self) -> PlatformHost {
        match &self.compartments {
            Some(dir) => PlatformHost::Files(FileCompartmentHost::new(dir)),
            #[cfg(windows)]
            None => PlatformHost::Tsf(TsfHost),
            #[cfg(not(windows))]
            None => PlatformHost::Files(FileCompartmentHost::new(default_compartment_dir())),
        }
    }

    pub fn activation(&self) -> ActivationController<PlatformLocator> {
        ActivationController::new(PlatformLocator::default())
    }
}

#[cfg(not(windows))]
fn default_compartment_dir() -> PathBuf {
    FileCompartmentHost::default_dir().unwrap_or_else(|| {
        std::env::temp_dir()
            .join(paths::APP_DIR)
            .join(paths::COMPARTMENT_DIR)
    })
}

#[derive(Debug, Clone)]
pub enum PlatformHive {
    File(FileHive),
    #[cfg(windows)]
    Registry(WindowsRegistry),
}

impl PlatformHive {
    pub fn describe(&self) -> String {
        match self {
            Self::File(hive) => hive.path().display().to_string(),
            #[cfg(windows)]
            Self::Registry(_) => format!("HKCU\\{}", crate::constants::product::STORE_PATH),
        }
    }
}

pub enum PlatformKey {
    File(crate::config::hive::FileKey),
    #[cfg(windows)]
    Registry(RegistryKey),
}

impl SettingsHive for PlatformHive {
    type Key = PlatformKey;

    fn create_key(&self, path: &str) -> Result<PlatformKey, StoreError> {
        match self {
            Self::File(hive) => hive.create_key(path).map(PlatformKey::File),
            #[cfg(windows)]
            Self::Registry(hive) => hive.create_key(path).map(PlatformKey::Registry),
        }
    }
}

impl HiveKey for PlatformKey {
    fn get_value(&self, name: &str) -> Option<RegValue> {
        match self {
            Self::File(key) => key.get_value(name),
            #[cfg(windows)]
            Self::Registry(key) => key.get_value(name),
        }
    }

    fn set_value(&mut self, name: &str, value: RegValue) -> Result<(), StoreError> {
        match self {
            Self::File(key) => key.set_value(name, value),
            #[cfg(windows)]
            Self::Registry(key) => key.set_value(name, value),
        }
    }

    fn delete_value(&mut self, name: &str) -> Result<(), StoreError> {
        match self {
            Self::File(key) => key.delete_value(name),
            #[cfg(windows)]
            Self::Registry(key) => key.delete_value(name),
        }
    }
}

#[derive(Debug, Clone)]
pub enum PlatformHost {
    Files(FileCompartmentHost),
    #[cfg(windows)]
    Tsf(TsfHost),
}

pub enum PlatformManager {
    Files(FileThreadManager),
    #[cfg(windows)]
    Tsf(TsfThreadManager),
}

impl ThreadManagerSource for PlatformHost {
    type Manager = PlatformManager;

    fn open(&self) -> Result<PlatformManager, NotifyError> {
        match self {
            Self::Files(host) => host.open().map(PlatformManager::Files),
            #[cfg(windows)]
            Self::Tsf(host) => host.open().map(PlatformManager::Tsf),
        }
    }
}

impl ThreadManager for PlatformManager {
    fn activate(&self) -> Result<ClientId, NotifyError> {
        match self {
            Self::Files(m) => m.activate(),
            #[cfg(windows)]
            Self::Tsf(m) => m.activate(),
        }
    }

    fn deactivate(&self) -> Result<(), NotifyError> {
        match self {
            Self::Files(m) => m.deactivate(),
            #[cfg(windows)]
            Self::Tsf(m) => m.deactivate(),
        }
    }

    fn global_compartment(&self, guid: &Guid) -> Result<Box<dyn Compartment + '_>, NotifyError> {
        match self {
            Self::Files(m) => m.global_compartment(guid),
            #[cfg(windows)]
            Self::Tsf(m) => m.global_compartment(guid),
        }
    }
}
