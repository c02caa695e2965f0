//! Text-services thread manager compartments (Windows)

use tracing::{debug, warn};
use windows::Win32::System::Com::{
    CLSCTX_INPROC_SERVER, COINIT_APARTMENTTHREADED, CoCreateInstance, CoInitializeEx, CoUninitialize,
};
use windows::Win32::UI::TextServices::{ITfCompartment, ITfThreadMgr};
use windows::core::{GUID, VARIANT};

use super::{ClientId, Compartment, CompartmentValue, Guid, NotifyError, ThreadManager, ThreadManagerSource};
use crate::constants::tsf::CLSID_THREAD_MGR;

/// COM initialised on the current thread for the guard's lifetime
pub(crate) struct ComApartment {
    owned: bool,
}

impl ComApartment {
    pub(crate) fn enter() -> Self {
        // SAFETY: paired with CoUninitialize in Drop when it succeeded
        let hr = unsafe { CoInitializeEx(None, COINIT_APARTMENTTHREADED) };
        if hr.is_err() {
            // Initialised elsewhere in another mode; usable, not ours to tear down
            debug!(hr = hr.0, "COM already initialised");
        }
        Self { owned: hr.is_ok() }
    }
}

impl Drop for ComApartment {
    fn drop(&mut self) {
        if self.owned {
            // SAFETY: balances the successful CoInitializeEx above
            unsafe { CoUninitialize() };
        }
    }
}

/// Source of system thread managers
#[derive(Debug, Clone, Copy, Default)]
pub struct TsfHost;

impl ThreadManagerSource for TsfHost {
    type Manager = TsfThreadManager;

    fn open(&self) -> Result<TsfThreadManager, NotifyError> {
        let com = ComApartment::enter();
        let clsid = GUID::from(CLSID_THREAD_MGR);
        // SAFETY: COM is initialised on this thread by `com`
        let manager: ITfThreadMgr = unsafe { CoCreateInstance(&clsid, None, CLSCTX_INPROC_SERVER) }
            .map_err(|e| NotifyError::ThreadManager(e.message().to_string()))?;
        Ok(TsfThreadManager {
            manager,
            _com: com,
        })
    }
}

pub struct TsfThreadManager {
    manager: ITfThreadMgr,
    _com: ComApartment,
}

impl ThreadManager for TsfThreadManager {
    fn activate(&self) -> Result<ClientId, NotifyError> {
        // SAFETY: plain COM call on a live interface
        unsafe { self.manager.Activate() }
            .map(ClientId)
            .map_err(|e| NotifyError::Activate(e.message().to_string()))
    }

    fn deactivate(&self) -> Result<(), NotifyError> {
        // SAFETY: plain COM call on a live interface
        unsafe { self.manager.Deactivate() }
            .map_err(|e| NotifyError::Activate(e.message().to_string()))
    }

    fn global_compartment(&self, guid: &Guid) -> Result<Box<dyn Compartment + '_>, NotifyError> {
        let open_err = |e: windows::core::Error| NotifyError::Compartment {
            guid: *guid,
            reason: e.message().to_string(),
        };
        let key = GUID::from(*guid);
        // SAFETY: `key` outlives the call
        let compartment = unsafe {
            self.manager
                .GetGlobalCompartment()
                .and_then(|mgr| mgr.GetCompartment(&key))
        }
        .map_err(open_err)?;
        Ok(Box::new(TsfCompartment {
            guid: *guid,
            compartment,
        }))
    }
}

struct TsfCompartment {
    guid: Guid,
    compartment: ITfCompartment,
}

impl Compartment for TsfCompartment {
    fn get_value(&self) -> Result<CompartmentValue, NotifyError> {
        // SAFETY: plain COM call on a live interface
        let variant = unsafe { self.compartment.GetValue() }.map_err(|e| NotifyError::Compartment {
            guid: self.guid,
            reason: e.message().to_string(),
        })?;
        if variant.is_empty() {
            return Ok(CompartmentValue::Empty);
        }
        Ok(match i32::try_from(&variant) {
            Ok(v) => CompartmentValue::Int(v),
            Err(_) => {
                warn!(compartment = %self.guid, "Compartment holds a non-integer value");
                CompartmentValue::Other(format!("{variant:?}"))
            }
        })
    }

    fn set_value(&self, client: ClientId, value: i32) -> Result<(), NotifyError> {
        let variant = VARIANT::from(value);
        // SAFETY: `variant` outlives the call
        unsafe { self.compartment.SetValue(client.0, &variant) }.map_err(|e| NotifyError::Write {
            guid: self.guid,
            reason: e.message().to_string(),
        })
    }
}
