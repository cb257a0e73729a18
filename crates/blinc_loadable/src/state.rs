//! Shared loadable state
//!
//! Every concrete loadable embeds one [`StateCell`]: the current state, the
//! error of the last failed sync, the contents-available flag and the
//! observer hub. Only this crate can mutate it; the owning loadable decides
//! which transitions it exposes.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use blinc_hub::ObserverHub;

use crate::error::SyncError;
use crate::loadable::{LoadableObserver, LoadableState, PureLoadable};

/// Hub type shared by all loadables
pub(crate) type LoadableHub = ObserverHub<dyn LoadableObserver>;

pub(crate) struct StateCell {
    state: Cell<LoadableState>,
    error: RefCell<Option<SyncError>>,
    contents_available: Cell<bool>,
    hub: LoadableHub,
}

impl StateCell {
    pub(crate) fn new(label: &'static str) -> Self {
        Self {
            state: Cell::new(LoadableState::Idle),
            error: RefCell::new(None),
            contents_available: Cell::new(false),
            hub: ObserverHub::new(label),
        }
    }

    pub(crate) fn state(&self) -> LoadableState {
        self.state.get()
    }

    pub(crate) fn error(&self) -> Option<SyncError> {
        self.error.borrow().clone()
    }

    pub(crate) fn is_contents_available(&self) -> bool {
        self.contents_available.get()
    }

    // =========================================================================
    // TRANSITIONS
    // =========================================================================

    /// Any state to `Syncing`; contents availability is kept
    pub(crate) fn set_syncing(&self, owner: &dyn PureLoadable) {
        self.error.replace(None);
        self.transition(LoadableState::Syncing);
        self.notify(owner);
    }

    /// Any state to `Failed`; contents become unavailable
    pub(crate) fn set_failed_to_sync(&self, error: Option<SyncError>, owner: &dyn PureLoadable) {
        self.error.replace(error);
        self.contents_available.set(false);
        self.transition(LoadableState::Failed);
        self.notify(owner);
    }

    /// Any state to `Succeeded`; contents become available
    pub(crate) fn set_did_sync_successfully(&self, owner: &dyn PureLoadable) {
        self.error.replace(None);
        self.contents_available.set(true);
        self.transition(LoadableState::Succeeded);
        self.notify(owner);
    }

    fn transition(&self, to: LoadableState) {
        let from = self.state.replace(to);
        tracing::trace!(loadable = self.hub.label(), %from, %to, "loadable state changed");
    }

    // =========================================================================
    // RAW ACCESS (derived state, test doubles)
    // =========================================================================

    pub(crate) fn force_state(&self, state: LoadableState) {
        self.transition(state);
    }

    pub(crate) fn force_error(&self, error: Option<SyncError>) {
        self.error.replace(error);
    }

    pub(crate) fn force_contents_available(&self, available: bool) {
        self.contents_available.set(available);
    }

    // =========================================================================
    // OBSERVERS
    // =========================================================================

    pub(crate) fn notify(&self, owner: &dyn PureLoadable) {
        self.hub.for_each(|observer| observer.loadable_did_change(owner));
    }

    pub(crate) fn add_observer(&self, observer: &Rc<dyn LoadableObserver>) -> bool {
        self.hub.add(observer).is_ok()
    }

    pub(crate) fn remove_observer(&self, observer: &Rc<dyn LoadableObserver>) -> bool {
        self.hub.remove(observer).is_ok()
    }

    pub(crate) fn has_observers(&self) -> bool {
        !self.hub.is_empty()
    }
}
