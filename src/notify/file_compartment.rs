//! Portable compartment host
//!
//! Each global compartment is a file named after its GUID holding a decimal
//! integer. Writes go through a temporary file and a rename so a reader never
//! observes a half-written counter.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::process;
use std::sync::atomic::{AtomicU32, Ordering};

use tracing::{debug, trace};

use super::{ClientId, Compartment, CompartmentValue, Guid, NotifyError, ThreadManager, ThreadManagerSource};
use crate::constants::paths;

static NEXT_CLIENT: AtomicU32 = AtomicU32::new(1);

#[derive(Debug, Clone)]
pub struct FileCompartmentHost {
    dir: PathBuf,
}

impl FileCompartmentHost {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// `<runtime or cache dir>/VietType/compartments`
    pub fn default_dir() -> Option<PathBuf> {
        let base = dirs::runtime_dir().or_else(dirs::cache_dir)?;
        Some(base.join(paths::APP_DIR).join(paths::COMPARTMENT_DIR))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn slot_path(&self, guid: &Guid) -> PathBuf {
        self.dir.join(guid.to_string())
    }
}

impl ThreadManagerSource for FileCompartmentHost {
    type Manager = FileThreadManager;

    fn open(&self) -> Result<FileThreadManager, NotifyError> {
        fs::create_dir_all(&self.dir).map_err(|e| {
            NotifyError::ThreadManager(format!("{}: {e}", self.dir.display()))
        })?;
        Ok(FileThreadManager { host: self.clone() })
    }
}

pub struct FileThreadManager {
    host: FileCompartmentHost,
}

impl ThreadManager for FileThreadManager {
    fn activate(&self) -> Result<ClientId, NotifyError> {
        Ok(ClientId(NEXT_CLIENT.fetch_add(1, Ordering::Relaxed)))
    }

    fn deactivate(&self) -> Result<(), NotifyError> {
        Ok(())
    }

    fn global_compartment(&self, guid: &Guid) -> Result<Box<dyn Compartment + '_>, NotifyError> {
        Ok(Box::new(FileCompartment {
            guid: *guid,
            path: self.host.slot_path(guid),
        }))
    }
}

struct FileCompartment {
    guid: Guid,
    path: PathBuf,
}

impl Compartment for FileCompartment {
    fn get_value(&self) -> Result<CompartmentValue, NotifyError> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(CompartmentValue::Empty),
            Err(e) => {
                return Err(NotifyError::Compartment {
                    guid: self.guid,
                    reason: e.to_string(),
                });
            }
        };
        let text = text.trim();
        if text.is_empty() {
            return Ok(CompartmentValue::Empty);
        }
        Ok(match text.parse::<i32>() {
            Ok(v) => CompartmentValue::Int(v),
            Err(_) => CompartmentValue::Other(text.to_string()),
        })
    }

    fn set_value(&self, client: ClientId, value: i32) -> Result<(), NotifyError> {
        let write_err = |e: std::io::Error| NotifyError::Write {
            guid: self.guid,
            reason: e.to_string(),
        };
        let tmp = self.path.with_extension(format!("{}.tmp", process::id()));
        let mut file = fs::File::create(&tmp).map_err(write_err)?;
        writeln!(file, "{value}").map_err(write_err)?;
        file.sync_all().map_err(write_err)?;
        drop(file);
        fs::rename(&tmp, &self.path).map_err(|e| {
            let _ = fs::remove_file(&tmp);
            write_err(e)
        })?;
        trace!(client = client.0, path = %self.path.display(), value, "Wrote compartment");
        debug!(compartment = %self.guid, value, "Compartment updated");
        Ok(())
    }
}
