//! Registrar utility: registers or unregisters text-service categories and
//! profiles through the engine library.
//!
//! The returned status is printed as `0xXXXXXXXX`; any other invocation
//! prints the usage line. Nothing here sets a non-zero exit status.

use std::ffi::OsString;
use std::io::{self, Write};

use clap::{Parser, ValueEnum};
use tracing::{info, warn};

use crate::activation::{ActivationController, ActivationError, ComponentLocator, EntryPoint};

pub const USAGE: &str = "viettype-registrar register|unregister categories|profiles";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Action {
    Register,
    Unregister,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Target {
    Categories,
    Profiles,
}

#[derive(Debug, Parser)]
#[command(name = "viettype-registrar", disable_help_flag = true, disable_version_flag = true)]
pub struct RegistrarArgs {
    pub action: Action,
    pub target: Target,
}

impl RegistrarArgs {
    pub fn entry_point(&self) -> EntryPoint {
        match (self.action, self.target) {
            (Action::Register, Target::Categories) => EntryPoint::RegisterCategories,
            (Action::Register, Target::Profiles) => EntryPoint::RegisterProfiles,
            (Action::Unregister, Target::Categories) => EntryPoint::UnregisterCategories,
            (Action::Unregister, Target::Profiles) => EntryPoint::UnregisterProfiles,
        }
    }
}

/// `args` includes the program name, as from `std::env::args_os()`
pub fn run<I, T, L>(args: I, activation: &ActivationController<L>, out: &mut impl Write) -> io::Result<()>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
    L: ComponentLocator,
{
    let args = match RegistrarArgs::try_parse_from(args) {
        Ok(args) => args,
        Err(e) => {
            warn!(kind = ?e.kind(), "Bad registrar arguments");
            return writeln!(out, "{USAGE}");
        }
    };

    let entry = args.entry_point();
    info!(%entry, "Calling engine");
    match activation.invoke(entry) {
        Ok(status) => writeln!(out, "{status}"),
        Err(ActivationError::Unavailable { reason }) => writeln!(out, "{reason}"),
        Err(e) => writeln!(out, "{e}"),
    }
}
