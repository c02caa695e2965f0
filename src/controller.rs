//! Settings dialog lifecycle
//!
//! `ConfigurationController` drives one dialog session: load on open, edits
//! against the in-memory copy, then either commit (save, notify, optional
//! activation change) or cancel. Every sub-step failure on commit is
//! collected into a [`CommitReport`]; none of them keeps the dialog open.
//! The UI layer observes the session through [`SettingsEvent`] messages.

use std::sync::mpsc::Sender;

use tracing::{debug, error, info, warn};

use crate::activation::{ActivationController, ActivationError, ActivationState, Capability, ComponentLocator};
use crate::config::{ConfigurationStore, SettingError, Settings, SettingsHive, StoreError};
use crate::notify::{ChangeNotifier, NotifyError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialogState {
    Loaded,
    Editing,
    Committing,
    Closed,
}

/// Messages for the UI layer
#[derive(Debug, Clone, PartialEq)]
pub enum SettingsEvent {
    Loaded(Settings),
    Changed { field: &'static str },
    ActivationChanged(ActivationState),
    Committed { saved: bool },
    Closed,
}

#[derive(Debug, thiserror::Error)]
pub enum ControllerError {
    #[error("Operation not allowed in {0:?} state")]
    InvalidState(DialogState),
    #[error(transparent)]
    Setting(#[from] SettingError),
    #[error(transparent)]
    Activation(#[from] ActivationError),
}

/// Outcome of each commit step
#[derive(Debug, Default)]
pub struct CommitReport {
    pub store: Option<Result<(), StoreError>>,
    pub notify: Option<Result<(), NotifyError>>,
    pub activation: Option<Result<(), ActivationError>>,
    pub final_state: Option<ActivationState>,
}

impl CommitReport {
    pub fn saved(&self) -> bool {
        matches!(self.store, Some(Ok(())))
    }

    /// Store and activation failures; notification is never shown
    pub fn user_messages(&self) -> Vec<String> {
        let mut messages = Vec::new();
        if let Some(Err(e)) = &self.store {
            messages.push(format!("Cannot save settings: {e}"));
        }
        if let Some(Err(e)) = &self.activation {
            messages.push(e.to_string());
        }
        messages
    }

    pub fn is_success(&self) -> bool {
        self.saved() && !matches!(self.activation, Some(Err(_)))
    }
}

pub struct ConfigurationController<H, N, L> {
    store: ConfigurationStore<H>,
    notifier: N,
    activation: ActivationController<L>,
    events: Option<Sender<SettingsEvent>>,
    state: DialogState,
    settings: Settings,
    activation_state: ActivationState,
    pending_activation: Option<bool>,
}

impl<H, N, L> ConfigurationController<H, N, L>
where
    H: SettingsHive,
    N: ChangeNotifier,
    L: ComponentLocator,
{
    pub fn new(store: ConfigurationStore<H>, notifier: N, activation: ActivationController<L>) -> Self {
        Self {
            store,
            notifier,
            activation,
            events: None,
            state: DialogState::Loaded,
            settings: Settings::default(),
            activation_state: ActivationState::Unavailable,
            pending_activation: None,
        }
    }

    pub fn with_events(mut self, events: Sender<SettingsEvent>) -> Self {
        self.events = Some(events);
        self
    }

    /// Loads settings and the activation state, then enters `Editing`
    pub fn open(&mut self) -> Result<&Settings, ControllerError> {
        self.require(DialogState::Loaded)?;
        self.settings = self.store.load();
        self.activation_state = self.activation.query_state();
        info!(activation = %self.activation_state, "Settings dialog opened");
        self.emit(SettingsEvent::Loaded(self.settings.clone()));
        self.emit(SettingsEvent::ActivationChanged(self.activation_state));
        self.state = DialogState::Editing;
        Ok(&self.settings)
    }

    pub fn state(&self) -> DialogState {
        self.state
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn activation_state(&self) -> ActivationState {
        self.activation_state
    }

    /// Applies a `name=value` edit to the in-memory copy
    pub fn apply_edit(&mut self, edit: &str) -> Result<&'static str, ControllerError> {
        self.require(DialogState::Editing)?;
        let field = self.settings.apply_edit(edit)?;
        debug!(field, "Edited setting");
        self.emit(SettingsEvent::Changed { field });
        Ok(field)
    }

    /// Replaces every field, e.g. with defaults
    pub fn replace(&mut self, settings: Settings) -> Result<(), ControllerError> {
        self.require(DialogState::Editing)?;
        self.settings = settings;
        for field in crate::constants::values::ALL {
            self.emit(SettingsEvent::Changed { field });
        }
        Ok(())
    }

    /// Activation change applied on commit
    pub fn request_activation(&mut self, active: bool) -> Result<(), ControllerError> {
        self.require(DialogState::Editing)?;
        if !self.activation_state.is_available() {
            return Err(self.unavailable().into());
        }
        self.pending_activation = Some(active);
        Ok(())
    }

    /// Flips activation immediately and re-queries the state
    pub fn toggle_activation(&mut self) -> Result<ActivationState, ControllerError> {
        self.require(DialogState::Editing)?;
        let target = match self.activation_state {
            ActivationState::Active => false,
            ActivationState::Inactive => true,
            ActivationState::Unavailable => return Err(self.unavailable().into()),
        };
        let result = self.activation.set_active(target);
        self.refresh_activation();
        result?;
        Ok(self.activation_state)
    }

    /// Saves, notifies and applies a pending activation change, then closes
    pub fn commit(mut self) -> Result<CommitReport, ControllerError> {
        self.require(DialogState::Editing)?;
        self.state = DialogState::Committing;
        let mut report = CommitReport::default();

        let saved = self.store.save(&self.settings);
        match &saved {
            Ok(()) => {
                let notified = self.notifier.notify_changed();
                if let Err(e) = &notified {
                    warn!(error = %e, "Running text services were not notified");
                }
                report.notify = Some(notified);
            }
            Err(e) => error!(error = %e, "Failed to save settings"),
        }
        report.store = Some(saved);

        if let Some(active) = self.pending_activation.take() {
            let result = self.activation.set_active(active);
            if let Err(e) = &result {
                error!(error = %e, active, "Failed to change activation");
            }
            report.activation = Some(result);
            self.refresh_activation();
            report.final_state = Some(self.activation_state);
        }

        self.emit(SettingsEvent::Committed { saved: report.saved() });
        self.close();
        Ok(report)
    }

    /// Discards edits; touches neither the store nor the notifier
    pub fn cancel(mut self) {
        debug!(state = ?self.state, "Settings dialog cancelled");
        self.close();
    }

    fn close(&mut self) {
        self.state = DialogState::Closed;
        self.emit(SettingsEvent::Closed);
    }

    fn refresh_activation(&mut self) {
        let state = self.activation.query_state();
        if state != self.activation_state {
            info!(from = %self.activation_state, to = %state, "Activation state changed");
        }
        self.activation_state = state;
        self.emit(SettingsEvent::ActivationChanged(state));
    }

    fn unavailable(&self) -> ActivationError {
        let reason = match self.activation.capability() {
            Capability::Unavailable(reason) => reason.clone(),
            Capability::Available(_) => "activation state cannot be determined".to_string(),
        };
        ActivationError::Unavailable { reason }
    }

    fn require(&self, expected: DialogState) -> Result<(), ControllerError> {
        if self.state == expected {
            Ok(())
        } else {
            Err(ControllerError::InvalidState(self.state))
        }
    }

    fn emit(&self, event: SettingsEvent) {
        if let Some(tx) = &self.events
            && tx.send(event).is_err()
        {
            debug!("Settings event receiver dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;
    use std::sync::mpsc;

    use crate::activation::tests::{FakeEngine, controller as activation};
    use crate::activation::{EngineComponent, EntryPoint, StatusCode, Unsupported};
    use crate::config::{MemoryHive, RegValue, TypingStyle};
    use crate::constants::{product, status, values};
    use crate::notify::tests::FakeSource;
    use crate::notify::{CompartmentNotifier, CompartmentValue};

    fn controller(
        hive: &MemoryHive,
        source: &FakeSource,
        engine: &FakeEngine,
    ) -> ConfigurationController<
        MemoryHive,
        CompartmentNotifier<FakeSource>,
        impl Fn() -> Result<Box<dyn EngineComponent>, String> + use<>,
    > {
        ConfigurationController::new(
            ConfigurationStore::new(hive.clone()),
            CompartmentNotifier::new(source.clone()),
            activation(engine),
        )
    }

    #[test]
    fn test_open_loads_store_and_activation() {
        let hive = MemoryHive::new();
        hive.insert(product::STORE_PATH, values::TYPING_STYLE, RegValue::Dword(1));
        let engine = FakeEngine::default();
        engine.active.set(true);
        let mut ctl = controller(&hive, &FakeSource::default(), &engine);
        assert_eq!(ctl.state(), DialogState::Loaded);
        ctl.open().unwrap();
        assert_eq!(ctl.state(), DialogState::Editing);
        assert_eq!(ctl.settings().typing_style, TypingStyle::Vni);
        assert_eq!(ctl.activation_state(), ActivationState::Active);
    }

    #[test]
    fn test_commit_saves_then_notifies() {
        let hive = MemoryHive::new();
        let source = FakeSource::default();
        let mut ctl = controller(&hive, &source, &FakeEngine::default());
        ctl.open().unwrap();
        ctl.apply_edit("oa_uy_tone1=false").unwrap();
        let report = ctl.commit().unwrap();

        assert!(report.is_success());
        assert!(matches!(report.notify, Some(Ok(()))));
        assert!(report.user_messages().is_empty());
        assert_eq!(*source.slot.borrow(), CompartmentValue::Int(1));
        assert_eq!(
            hive.get(product::STORE_PATH, values::OA_UY_TONE1),
            Some(RegValue::Dword(0))
        );
    }

    #[test]
    fn test_notify_failure_does_not_fail_commit() {
        let hive = MemoryHive::new();
        let source = FakeSource::default();
        source.fail_write.set(true);
        let mut ctl = controller(&hive, &source, &FakeEngine::default());
        ctl.open().unwrap();
        let report = ctl.commit().unwrap();
        assert!(report.is_success());
        assert!(matches!(report.notify, Some(Err(_))));
        assert!(report.user_messages().is_empty());
        assert_eq!(source.active.get(), 0);
    }

    #[test]
    fn test_store_failure_is_reported_and_skips_notify() {
        let hive = MemoryHive::new();
        let source = FakeSource::default();
        let mut ctl = ConfigurationController::new(
            ConfigurationStore::new(hive.read_only()),
            CompartmentNotifier::new(source.clone()),
            activation(&FakeEngine::default()),
        );
        ctl.open().unwrap();
        let report = ctl.commit().unwrap();
        assert!(!report.saved());
        assert!(report.notify.is_none());
        assert_eq!(source.opens.get(), 0);
        let messages = report.user_messages();
        assert_eq!(messages.len(), 1);
        assert!(messages[0].starts_with("Cannot save settings"));
    }

    #[test]
    fn test_cancel_touches_nothing() {
        let hive = MemoryHive::new();
        let source = FakeSource::default();
        let (tx, rx) = mpsc::channel();
        let mut ctl = controller(&hive, &source, &FakeEngine::default()).with_events(tx);
        ctl.open().unwrap();
        ctl.apply_edit("autocorrect=on").unwrap();
        ctl.cancel();

        assert!(hive.value_names(product::STORE_PATH).is_empty());
        assert_eq!(source.opens.get(), 0);
        let events: Vec<_> = rx.try_iter().collect();
        assert_eq!(events.last(), Some(&SettingsEvent::Closed));
        assert!(events.contains(&SettingsEvent::Changed { field: values::AUTOCORRECT }));
        assert!(!events.iter().any(|e| matches!(e, SettingsEvent::Committed { .. })));
    }

    #[test]
    fn test_requested_activation_applied_on_commit() {
        let engine = FakeEngine::default();
        let mut ctl = controller(&MemoryHive::new(), &FakeSource::default(), &engine);
        ctl.open().unwrap();
        assert_eq!(ctl.activation_state(), ActivationState::Inactive);
        ctl.request_activation(true).unwrap();
        assert!(!engine.active.get());

        let report = ctl.commit().unwrap();
        assert!(matches!(report.activation, Some(Ok(()))));
        assert_eq!(report.final_state, Some(ActivationState::Active));
        assert!(engine.active.get());
    }

    #[test]
    fn test_activation_failure_is_reported_after_save() {
        let hive = MemoryHive::new();
        let engine = FakeEngine::default();
        engine.fail_with.set(Some(StatusCode(status::E_ACCESSDENIED)));
        let mut ctl = controller(&hive, &FakeSource::default(), &engine);
        ctl.open().unwrap();
        ctl.request_activation(true).unwrap();
        let report = ctl.commit().unwrap();

        assert!(report.saved());
        assert!(!report.is_success());
        assert_eq!(report.final_state, Some(ActivationState::Inactive));
        assert_eq!(report.user_messages().len(), 1);
        assert!(!hive.value_names(product::STORE_PATH).is_empty());
    }

    #[test]
    fn test_toggle_requeries_state() {
        let engine = FakeEngine::default();
        let (tx, rx) = mpsc::channel();
        let mut ctl = controller(&MemoryHive::new(), &FakeSource::default(), &engine).with_events(tx);
        ctl.open().unwrap();
        assert_eq!(ctl.toggle_activation().unwrap(), ActivationState::Active);
        assert_eq!(ctl.toggle_activation().unwrap(), ActivationState::Inactive);
        ctl.cancel();

        let states: Vec<_> = rx
            .try_iter()
            .filter_map(|e| match e {
                SettingsEvent::ActivationChanged(s) => Some(s),
                _ => None,
            })
            .collect();
        assert_eq!(
            states,
            vec![
                ActivationState::Inactive,
                ActivationState::Active,
                ActivationState::Inactive
            ]
        );
    }

    #[test]
    fn test_unavailable_activation_refuses_toggle() {
        let mut ctl = ConfigurationController::new(
            ConfigurationStore::new(MemoryHive::new()),
            CompartmentNotifier::new(FakeSource::default()),
            ActivationController::new(Unsupported),
        );
        ctl.open().unwrap();
        assert_eq!(ctl.activation_state(), ActivationState::Unavailable);
        assert!(matches!(
            ctl.toggle_activation(),
            Err(ControllerError::Activation(ActivationError::Unavailable { .. }))
        ));
        assert!(ctl.request_activation(true).is_err());
        let report = ctl.commit().unwrap();
        assert!(report.is_success());
        assert!(report.activation.is_none());
    }

    /// Answers every call with a failure status
    struct BrokenEngine(Rc<Cell<u32>>);

    impl EngineComponent for BrokenEngine {
        fn invoke(&self, _: EntryPoint) -> Result<StatusCode, String> {
            self.0.set(self.0.get() + 1);
            Ok(StatusCode(status::REGDB_E_CLASSNOTREG))
        }
    }

    #[test]
    fn test_refused_activation_does_not_call_engine() {
        let calls = Rc::new(Cell::new(0));
        let engine_calls = calls.clone();
        let mut ctl = ConfigurationController::new(
            ConfigurationStore::new(MemoryHive::new()),
            CompartmentNotifier::new(FakeSource::default()),
            ActivationController::new(move || -> Result<Box<dyn EngineComponent>, String> {
                Ok(Box::new(BrokenEngine(engine_calls.clone())))
            }),
        );
        ctl.open().unwrap();
        assert_eq!(ctl.activation_state(), ActivationState::Unavailable);
        assert_eq!(calls.get(), 1);

        assert!(matches!(
            ctl.toggle_activation(),
            Err(ControllerError::Activation(ActivationError::Unavailable { .. }))
        ));
        assert!(matches!(
            ctl.request_activation(false),
            Err(ControllerError::Activation(ActivationError::Unavailable { .. }))
        ));
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_edits_require_open_dialog() {
        let mut ctl = controller(&MemoryHive::new(), &FakeSource::default(), &FakeEngine::default());
        assert!(matches!(
            ctl.apply_edit("autocorrect=1"),
            Err(ControllerError::InvalidState(DialogState::Loaded))
        ));
        ctl.open().unwrap();
        assert!(matches!(ctl.open(), Err(ControllerError::InvalidState(DialogState::Editing))));
        assert!(matches!(
            ctl.apply_edit("bogus=1"),
            Err(ControllerError::Setting(SettingError::UnknownName(_)))
        ));
    }

    #[test]
    fn test_reset_writes_defaults() {
        let hive = MemoryHive::new();
        hive.insert(product::STORE_PATH, values::AUTOCORRECT, RegValue::Dword(1));
        let mut ctl = controller(&hive, &FakeSource::default(), &FakeEngine::default());
        ctl.open().unwrap();
        assert!(ctl.settings().autocorrect);
        ctl.replace(Settings::default()).unwrap();
        ctl.commit().unwrap();
        assert_eq!(
            hive.get(product::STORE_PATH, values::AUTOCORRECT),
            Some(RegValue::Dword(0))
        );
    }
}
