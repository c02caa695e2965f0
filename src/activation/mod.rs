//! Activation control of the text-service profile
//!
//! The profile is enabled, disabled and queried through entry points of the
//! native engine library. That library is optional: it may be missing on an
//! unsupported architecture or after a partial uninstall. It is located once,
//! on first use, and the outcome is cached as a [`Capability`] so every call
//! site deals with a typed "unavailable" instead of a loader failure.

#[cfg(windows)]
pub mod native;

use std::cell::OnceCell;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::constants::{engine, status};

/// HRESULT-style status returned by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StatusCode(pub i32);

impl StatusCode {
    pub const OK: Self = Self(status::S_OK);
    pub const FALSE: Self = Self(status::S_FALSE);

    pub fn is_ok(self) -> bool {
        self == Self::OK
    }

    pub fn is_failure(self) -> bool {
        self.0 < 0
    }

    /// Human-readable text for the status
    pub fn message(self) -> String {
        #[cfg(windows)]
        {
            let text = windows::core::HRESULT(self.0).message().to_string();
            if !text.trim().is_empty() {
                return text.trim().to_string();
            }
        }
        match self.0 {
            status::S_OK => "The operation completed successfully".to_string(),
            status::S_FALSE => "The operation completed with no effect".to_string(),
            status::E_NOTIMPL => "Not implemented".to_string(),
            status::E_FAIL => "Unspecified error".to_string(),
            status::E_ACCESSDENIED => "Access is denied".to_string(),
            status::E_INVALIDARG => "The parameter is incorrect".to_string(),
            status::REGDB_E_CLASSNOTREG => "Class not registered".to_string(),
            other => format!("Unknown status 0x{:08X}", other as u32),
        }
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08X}", self.0 as u32)
    }
}

/// Engine library entry points
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryPoint {
    ActivateProfiles,
    DeactivateProfiles,
    IsProfileActivated,
    RegisterProfiles,
    UnregisterProfiles,
    RegisterCategories,
    UnregisterCategories,
}

impl EntryPoint {
    pub fn symbol(self) -> &'static str {
        match self {
            Self::ActivateProfiles => engine::ACTIVATE_PROFILES,
            Self::DeactivateProfiles => engine::DEACTIVATE_PROFILES,
            Self::IsProfileActivated => engine::IS_PROFILE_ACTIVATED,
            Self::RegisterProfiles => engine::REGISTER_PROFILES,
            Self::UnregisterProfiles => engine::UNREGISTER_PROFILES,
            Self::RegisterCategories => engine::REGISTER_CATEGORIES,
            Self::UnregisterCategories => engine::UNREGISTER_CATEGORIES,
        }
    }
}

impl fmt::Display for EntryPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Live activation state of the profile (never persisted)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivationState {
    Active,
    Inactive,
    /// The engine component could not be reached; the toggle is disabled
    Unavailable,
}

impl ActivationState {
    pub fn is_available(self) -> bool {
        self != Self::Unavailable
    }
}

impl fmt::Display for ActivationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Active => "enabled",
            Self::Inactive => "disabled",
            Self::Unavailable => "unavailable",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ActivationError {
    #[error("VietType engine component unavailable: {reason}")]
    Unavailable { reason: String },
    #[error("Cannot configure VietType: {} ({status})", status.message())]
    Failed { entry: EntryPoint, status: StatusCode },
    #[error("VietType engine component faulted in {entry}")]
    Faulted { entry: EntryPoint },
}

/// A loaded engine library
pub trait EngineComponent {
    /// `Err` when the entry point cannot be invoked at all (e.g. missing export)
    fn invoke(&self, entry: EntryPoint) -> Result<StatusCode, String>;
}

/// Finds and loads the engine library
pub trait ComponentLocator {
    fn locate(&self) -> Result<Box<dyn EngineComponent>, String>;
}

impl<F> ComponentLocator for F
where
    F: Fn() -> Result<Box<dyn EngineComponent>, String>,
{
    fn locate(&self) -> Result<Box<dyn EngineComponent>, String> {
        self()
    }
}

/// Locator for platforms without the engine library
#[derive(Debug, Clone, Copy, Default)]
pub struct Unsupported;

impl ComponentLocator for Unsupported {
    fn locate(&self) -> Result<Box<dyn EngineComponent>, String> {
        Err(format!(
            "{} is not available on this platform",
            engine::LIBRARY
        ))
    }
}

/// Outcome of locating the engine component
pub enum Capability {
    Available(Box<dyn EngineComponent>),
    Unavailable(String),
}

pub struct ActivationController<L> {
    locator: L,
    capability: OnceCell<Capability>,
}

impl<L: ComponentLocator> ActivationController<L> {
    pub fn new(locator: L) -> Self {
        Self {
            locator,
            capability: OnceCell::new(),
        }
    }

    /// Resolved on first use, then cached
    pub fn capability(&self) -> &Capability {
        self.capability.get_or_init(|| {
            match catch_unwind(AssertUnwindSafe(|| self.locator.locate())) {
                Ok(Ok(component)) => {
                    info!(library = engine::LIBRARY, "Engine component loaded");
                    Capability::Available(component)
                }
                Ok(Err(reason)) => {
                    warn!(library = engine::LIBRARY, reason = %reason, "Engine component unavailable");
                    Capability::Unavailable(reason)
                }
                Err(_) => {
                    warn!(library = engine::LIBRARY, "Engine component locator panicked");
                    Capability::Unavailable("engine component failed to load".to_string())
                }
            }
        })
    }

    pub fn is_available(&self) -> bool {
        matches!(self.capability(), Capability::Available(_))
    }

    /// Calls one entry point and returns its raw status
    pub fn invoke(&self, entry: EntryPoint) -> Result<StatusCode, ActivationError> {
        let component = match self.capability() {
            Capability::Available(component) => component,
            Capability::Unavailable(reason) => {
                return Err(ActivationError::Unavailable {
                    reason: reason.clone(),
                });
            }
        };
        match catch_unwind(AssertUnwindSafe(|| component.invoke(entry))) {
            Ok(Ok(status)) => {
                debug!(%entry, %status, "Engine call returned");
                Ok(status)
            }
            Ok(Err(reason)) => {
                warn!(%entry, reason = %reason, "Engine entry point not callable");
                Err(ActivationError::Unavailable { reason })
            }
            Err(_) => {
                warn!(%entry, "Engine call panicked");
                Err(ActivationError::Faulted { entry })
            }
        }
    }

    pub fn query_state(&self) -> ActivationState {
        match self.invoke(EntryPoint::IsProfileActivated) {
            Ok(status) if status.is_ok() => ActivationState::Active,
            Ok(status) if !status.is_failure() => ActivationState::Inactive,
            Ok(status) => {
                warn!(%status, message = %status.message(), "Activation query failed");
                ActivationState::Unavailable
            }
            Err(_) => ActivationState::Unavailable,
        }
    }

    pub fn activate(&self) -> Result<(), ActivationError> {
        self.expect_ok(EntryPoint::ActivateProfiles)
    }

    pub fn deactivate(&self) -> Result<(), ActivationError> {
        self.expect_ok(EntryPoint::DeactivateProfiles)
    }

    pub fn set_active(&self, active: bool) -> Result<(), ActivationError> {
        if active { self.activate() } else { self.deactivate() }
    }

    fn expect_ok(&self, entry: EntryPoint) -> Result<(), ActivationError> {
        let status = self.invoke(entry)?;
        if status.is_ok() {
            info!(%entry, "Engine call succeeded");
            Ok(())
        } else {
            Err(ActivationError::Failed { entry, status })
        }
    }
}
