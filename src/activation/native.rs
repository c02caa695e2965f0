//! Engine library loaded at runtime (Windows)

use std::ffi::CString;
use std::path::PathBuf;

use tracing::debug;
use windows::Win32::Foundation::{FreeLibrary, HMODULE};
use windows::Win32::System::LibraryLoader::{GetProcAddress, LoadLibraryW};
use windows::core::{HSTRING, PCSTR};

use super::{ComponentLocator, EngineComponent, EntryPoint, StatusCode};
use crate::constants::engine;
use crate::notify::tsf::ComApartment;

/// Every export: `HRESULT __cdecl Fn(void)`
type ExportFn = unsafe extern "C" fn() -> i32;

/// Looks for the library next to the executable, then on the default search path
#[derive(Debug, Clone, Default)]
pub struct NativeLocator {
    library: Option<PathBuf>,
}

impl NativeLocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads an explicit library file instead of searching
    pub fn with_library(path: impl Into<PathBuf>) -> Self {
        Self {
            library: Some(path.into()),
        }
    }

    fn candidates(&self) -> Vec<PathBuf> {
        if let Some(path) = &self.library {
            return vec![path.clone()];
        }
        let mut paths = Vec::with_capacity(2);
        if let Ok(exe) = std::env::current_exe()
            && let Some(dir) = exe.parent()
        {
            paths.push(dir.join(engine::LIBRARY));
        }
        paths.push(PathBuf::from(engine::LIBRARY));
        paths
    }
}

impl ComponentLocator for NativeLocator {
    fn locate(&self) -> Result<Box<dyn EngineComponent>, String> {
        let mut last_error = String::new();
        for path in self.candidates() {
            let name = HSTRING::from(path.as_os_str());
            // SAFETY: loading a library runs its DllMain; the engine library is ours
            match unsafe { LoadLibraryW(&name) } {
                Ok(module) => {
                    debug!(path = %path.display(), "Loaded engine library");
                    return Ok(Box::new(NativeEngine {
                        module,
                        _com: ComApartment::enter(),
                    }));
                }
                Err(e) => {
                    debug!(path = %path.display(), error = %e.message(), "Engine library not loadable");
                    last_error = format!("{}: {}", path.display(), e.message());
                }
            }
        }
        Err(last_error)
    }
}

pub struct NativeEngine {
    module: HMODULE,
    _com: ComApartment,
}

impl EngineComponent for NativeEngine {
    fn invoke(&self, entry: EntryPoint) -> Result<StatusCode, String> {
        let symbol = CString::new(entry.symbol()).map_err(|e| e.to_string())?;
        // SAFETY: `symbol` is NUL-terminated and outlives the call
        let proc = unsafe { GetProcAddress(self.module, PCSTR(symbol.as_ptr().cast())) }
            .ok_or_else(|| format!("{} does not export {entry}", engine::LIBRARY))?;

        // SAFETY: all exports share the `ExportFn` signature
        let status = unsafe { std::mem::transmute::<_, ExportFn>(proc)() };
        Ok(StatusCode(status))
    }
}

impl Drop for NativeEngine {
    fn drop(&mut self) {
        // SAFETY: module came from LoadLibraryW and no function pointers outlive self
        if let Err(e) = unsafe { FreeLibrary(self.module) } {
            debug!(error = %e.message(), "FreeLibrary failed");
        }
    }
}
