//! Cross-process change notification
//!
//! The front-end and the text service share no channel. After a save the
//! front-end bumps an integer held in a global compartment; text-service
//! instances compare it with the last value they saw and reload on change.
//! The counter is a generation, not a count: it wraps, and a lost increment
//! from two concurrent writers only delays a reload.

pub mod file_compartment;
#[cfg(windows)]
pub mod tsf;

use std::fmt;

use tracing::{debug, info, warn};

use crate::constants::tsf::SYSTEM_NOTIFY_COMPARTMENT;

/// 128-bit identifier in the usual registry layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Guid(u128);

impl Guid {
    pub const fn from_u128(value: u128) -> Self {
        Self(value)
    }
}

impl fmt::Display for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let v = self.0;
        write!(
            f,
            "{{{:08X}-{:04X}-{:04X}-{:04X}-{:012X}}}",
            (v >> 96) as u32,
            (v >> 80) as u16,
            (v >> 64) as u16,
            (v >> 48) as u16,
            v & 0xFFFF_FFFF_FFFF
        )
    }
}

#[cfg(windows)]
impl From<Guid> for windows::core::GUID {
    fn from(guid: Guid) -> Self {
        windows::core::GUID::from_u128(guid.0)
    }
}

/// Participation cookie handed out by a thread manager
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientId(pub u32);

/// Raw compartment contents
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum CompartmentValue {
    #[default]
    Empty,
    Int(i32),
    /// Anything that is not a 32-bit integer
    Other(String),
}

impl CompartmentValue {
    /// Counter view; unreadable content counts as zero
    pub fn as_counter(&self) -> i32 {
        match self {
            Self::Int(v) => *v,
            Self::Empty | Self::Other(_) => 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NotifyError {
    #[error("Cannot reach thread manager: {0}")]
    ThreadManager(String),
    #[error("Cannot activate thread manager: {0}")]
    Activate(String),
    #[error("Cannot open compartment {guid}: {reason}")]
    Compartment { guid: Guid, reason: String },
    #[error("Cannot update compartment {guid}: {reason}")]
    Write { guid: Guid, reason: String },
}

/// Signals "configuration changed" to running text-service instances
pub trait ChangeNotifier {
    fn notify_changed(&self) -> Result<(), NotifyError>;
}

/// Hands out a fresh thread manager per notification
pub trait ThreadManagerSource {
    type Manager: ThreadManager;

    fn open(&self) -> Result<Self::Manager, NotifyError>;
}

pub trait ThreadManager {
    fn activate(&self) -> Result<ClientId, NotifyError>;
    fn deactivate(&self) -> Result<(), NotifyError>;
    fn global_compartment(&self, guid: &Guid) -> Result<Box<dyn Compartment + '_>, NotifyError>;
}

pub trait Compartment {
    fn get_value(&self) -> Result<CompartmentValue, NotifyError>;
    fn set_value(&self, client: ClientId, value: i32) -> Result<(), NotifyError>;
}

/// Scoped activation of a thread manager; deactivates on drop
pub struct Participation<'a, M: ThreadManager> {
    manager: &'a M,
    client: ClientId,
}

impl<'a, M: ThreadManager> Participation<'a, M> {
    pub fn begin(manager: &'a M) -> Result<Self, NotifyError> {
        let client = manager.activate()?;
        debug!(client = client.0, "Joined thread manager");
        Ok(Self { manager, client })
    }

    pub fn client(&self) -> ClientId {
        self.client
    }

    pub fn manager(&self) -> &'a M {
        self.manager
    }
}

impl<M: ThreadManager> Drop for Participation<'_, M> {
    fn drop(&mut self) {
        if let Err(e) = self.manager.deactivate() {
            warn!(error = %e, client = self.client.0, "Failed to leave thread manager");
        }
    }
}

/// Bumps the counter in a global compartment
pub struct CompartmentNotifier<S> {
    source: S,
    guid: Guid,
}

impl<S: ThreadManagerSource> CompartmentNotifier<S> {
    /// Uses the system notification compartment
    pub fn new(source: S) -> Self {
        Self::with_guid(source, SYSTEM_NOTIFY_COMPARTMENT)
    }

    pub fn with_guid(source: S, guid: Guid) -> Self {
        Self { source, guid }
    }

    pub fn guid(&self) -> Guid {
        self.guid
    }
}

impl<S: ThreadManagerSource> ChangeNotifier for CompartmentNotifier<S> {
    fn notify_changed(&self) -> Result<(), NotifyError> {
        let manager = self.source.open()?;
        let participation = Participation::begin(&manager)?;
        let compartment = participation.manager().global_compartment(&self.guid)?;

        let current = match compartment.get_value() {
            Ok(value) => value.as_counter(),
            Err(e) => {
                debug!(error = %e, "Compartment unreadable, counting from zero");
                0
            }
        };
        let next = current.wrapping_add(1);
        compartment.set_value(participation.client(), next)?;

        info!(compartment = %self.guid, generation = next, "Signalled settings change");
        Ok(())
    }
}

/// Notifier that does nothing; for hosts without a compartment service
#[derive(Debug, Clone, Copy, Default)]
pub struct NullNotifier;

impl ChangeNotifier for NullNotifier {
    fn notify_changed(&self) -> Result<(), NotifyError> {
        debug!("Change notification disabled");
        Ok(())
    }
}

/// Consumer side of the counter
pub struct ChangeWatcher<S> {
    source: S,
    guid: Guid,
    last_seen: Option<i32>,
}

impl<S: ThreadManagerSource> ChangeWatcher<S> {
    pub fn new(source: S) -> Self {
        Self::with_guid(source, SYSTEM_NOTIFY_COMPARTMENT)
    }

    pub fn with_guid(source: S, guid: Guid) -> Self {
        Self {
            source,
            guid,
            last_seen: None,
        }
    }

    pub fn last_seen(&self) -> Option<i32> {
        self.last_seen
    }

    /// Reads the counter without reporting a change
    pub fn prime(&mut self) -> Result<i32, NotifyError> {
        let value = self.read()?;
        self.last_seen = Some(value);
        Ok(value)
    }

    /// True when the counter differs from the last value seen.
    ///
    /// The first poll of an unprimed watcher records the value and reports
    /// no change.
    pub fn poll(&mut self) -> Result<bool, NotifyError> {
        let value = self.read()?;
        let changed = self.last_seen.is_some_and(|last| last != value);
        if changed {
            debug!(compartment = %self.guid, generation = value, "Settings generation advanced");
        }
        self.last_seen = Some(value);
        Ok(changed)
    }

    fn read(&self) -> Result<i32, NotifyError> {
        let manager = self.source.open()?;
        let participation = Participation::begin(&manager)?;
        let compartment = participation.manager().global_compartment(&self.guid)?;
        Ok(compartment.get_value().map(|v| v.as_counter()).unwrap_or(0))
    }
}
