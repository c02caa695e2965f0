#![forbid(unsafe_code)]

use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{debug, info, warn};

use viettype_config::activation::ActivationState;
use viettype_config::config::{ConfigurationStore, Settings};
use viettype_config::constants::watch;
use viettype_config::controller::{CommitReport, ConfigurationController, SettingsEvent};
use viettype_config::logging;
use viettype_config::notify::{ChangeWatcher, CompartmentNotifier};
use viettype_config::platform::{Overrides, PlatformHive, PlatformHost, PlatformLocator};

type Controller = ConfigurationController<PlatformHive, CompartmentNotifier<PlatformHost>, PlatformLocator>;

#[derive(Debug, Parser)]
#[command(name = "viettype-config", version, about = "Configure the VietType input method")]
struct Cli {
    /// Settings file to use instead of the default store
    #[arg(long, global = true, value_name = "FILE")]
    store: Option<PathBuf>,

    /// Directory holding change-notification compartments
    #[arg(long, global = true, value_name = "DIR")]
    compartments: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print the current settings and activation state
    Show {
        #[arg(long)]
        json: bool,
    },
    /// Change settings, e.g. `set typing_style=vni pk_toggle=Ctrl+Shift`
    Set {
        #[arg(required = true, value_name = "NAME=VALUE")]
        edits: Vec<String>,
        /// Also enable the input method
        #[arg(long, conflicts_with = "disable")]
        enable: bool,
        /// Also disable the input method
        #[arg(long)]
        disable: bool,
    },
    /// Restore every setting to its default
    Reset,
    /// Print whether the input method is enabled
    Status,
    /// Enable the input method
    Enable,
    /// Disable the input method
    Disable,
    /// Flip the input method between enabled and disabled
    Toggle,
    /// Reload and print settings whenever another process saves them
    Watch {
        #[arg(long, default_value_t = watch::DEFAULT_INTERVAL_MS)]
        interval_ms: u64,
    },
}

#[derive(Serialize)]
struct Snapshot<'a> {
    settings: &'a Settings,
    activation: ActivationState,
}

fn main() -> Result<()> {
    logging::init()?;
    let cli = Cli::parse();

    let overrides = Overrides {
        store: cli.store,
        compartments: cli.compartments,
    }
    .with_env();

    match cli.command.unwrap_or(Command::Show { json: false }) {
        Command::Show { json } => show(&overrides, json),
        Command::Set {
            edits,
            enable,
            disable,
        } => {
            let activation = match (enable, disable) {
                (true, _) => Some(true),
                (_, true) => Some(false),
                _ => None,
            };
            set(&overrides, &edits, activation)
        }
        Command::Reset => commit_with(&overrides, |ctl| {
            ctl.replace(Settings::default())?;
            Ok(())
        }),
        Command::Status => {
            println!("{}", overrides.activation().query_state());
            Ok(())
        }
        Command::Enable => commit_with(&overrides, |ctl| Ok(ctl.request_activation(true)?)),
        Command::Disable => commit_with(&overrides, |ctl| Ok(ctl.request_activation(false)?)),
        Command::Toggle => toggle(&overrides),
        Command::Watch { interval_ms } => watch_changes(&overrides, Duration::from_millis(interval_ms)),
    }
}

fn controller(overrides: &Overrides) -> (Controller, Receiver<SettingsEvent>) {
    let (tx, rx) = mpsc::channel();
    let ctl = ConfigurationController::new(
        ConfigurationStore::new(overrides.hive()),
        CompartmentNotifier::new(overrides.compartments()),
        overrides.activation(),
    )
    .with_events(tx);
    (ctl, rx)
}

fn show(overrides: &Overrides, json: bool) -> Result<()> {
    let (mut ctl, rx) = controller(overrides);
    ctl.open()?;
    ctl.cancel();

    let mut settings = None;
    let mut activation = ActivationState::Unavailable;
    for event in rx.try_iter() {
        match event {
            SettingsEvent::Loaded(loaded) => settings = Some(loaded),
            SettingsEvent::ActivationChanged(state) => activation = state,
            other => debug!(event = ?other, "Settings event"),
        }
    }
    let settings = settings.context("Settings were not loaded")?;

    if json {
        let snapshot = Snapshot {
            settings: &settings,
            activation,
        };
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
    } else {
        print_settings(&settings);
        println!("{:<26} = {activation}", "activation");
    }
    Ok(())
}

fn set(overrides: &Overrides, edits: &[String], activation: Option<bool>) -> Result<()> {
    commit_with(overrides, |ctl| {
        for edit in edits {
            ctl.apply_edit(edit)?;
        }
        if let Some(active) = activation {
            ctl.request_activation(active)?;
        }
        Ok(())
    })
}

/// Opens a dialog, applies `edit`, then commits; an edit error cancels instead
fn commit_with(overrides: &Overrides, edit: impl FnOnce(&mut Controller) -> Result<()>) -> Result<()> {
    let (mut ctl, rx) = controller(overrides);
    ctl.open()?;
    if let Err(e) = edit(&mut ctl) {
        ctl.cancel();
        eprintln!("{e:#}");
        return Ok(());
    }
    let report = ctl.commit()?;

    for event in rx.try_iter() {
        if let SettingsEvent::Changed { field } = event {
            debug!(field, "Changed");
        }
    }
    print_report(&report);
    Ok(())
}

fn toggle(overrides: &Overrides) -> Result<()> {
    let (mut ctl, _rx) = controller(overrides);
    ctl.open()?;
    match ctl.toggle_activation() {
        Ok(state) => println!("{state}"),
        Err(e) => eprintln!("{e}"),
    }
    ctl.cancel();
    Ok(())
}

fn watch_changes(overrides: &Overrides, interval: Duration) -> Result<()> {
    let store = ConfigurationStore::new(overrides.hive());
    let mut watcher = ChangeWatcher::new(overrides.compartments());
    match watcher.prime() {
        Ok(generation) => info!(generation, "Watching for settings changes"),
        Err(e) => warn!(error = %e, "Change counter unreadable, will retry"),
    }
    print_settings(&store.load());

    loop {
        thread::sleep(interval);
        match watcher.poll() {
            Ok(true) => {
                info!(generation = ?watcher.last_seen(), "Settings changed, reloading");
                println!();
                print_settings(&store.load());
            }
            Ok(false) => {}
            Err(e) => debug!(error = %e, "Change counter unreadable"),
        }
    }
}

fn print_settings(settings: &Settings) {
    for (name, value) in settings.describe() {
        println!("{name:<26} = {value}");
    }
}

fn print_report(report: &CommitReport) {
    if report.saved() {
        println!("Settings saved");
    }
    if let Some(state) = report.final_state {
        println!("VietType is {state}");
    }
    for message in report.user_messages() {
        eprintln!("{message}");
    }
}
