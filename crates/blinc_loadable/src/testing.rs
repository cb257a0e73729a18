//! Test double for code that consumes loadables
//!
//! [`TestLoadable`] lets a test put a loadable into any state directly and
//! check how the code under test used it.
//!
//! ```rust
//! use std::rc::Rc;
//! use blinc_loadable::{Loadable, LoadableGroup, FailurePolicy, GroupMember, PureLoadable};
//! use blinc_loadable::testing::TestLoadable;
//!
//! let child = TestLoadable::new();
//! let group = LoadableGroup::new(vec![GroupMember::syncable(Rc::clone(&child))], FailurePolicy::Strict);
//!
//! group.sync();
//! assert_eq!(child.sync_counter(), 1);
//!
//! child.set_did_sync_successfully();
//! assert!(group.is_contents_available());
//! ```

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use crate::error::SyncError;
use crate::loadable::{Loadable, LoadableObserver, LoadableState, PureLoadable};
use crate::state::StateCell;

type SyncHook = Rc<dyn Fn(&TestLoadable)>;

/// A loadable whose state is set by the test and whose calls are counted
///
/// `sync()` only counts and runs the [`on_sync`](Self::on_sync) hook; the
/// state changes when the test says so.
pub struct TestLoadable {
    cell: StateCell,
    needs_sync: Cell<bool>,
    sync_counter: Cell<usize>,
    sync_if_needed_counter: Cell<usize>,
    is_contents_available_counter: Cell<usize>,
    add_observer_counter: Cell<usize>,
    remove_observer_counter: Cell<usize>,
    on_sync: RefCell<Option<SyncHook>>,
}

impl TestLoadable {
    pub fn new() -> Rc<Self> {
        Rc::new(Self {
            cell: StateCell::new("TestLoadable"),
            needs_sync: Cell::new(false),
            sync_counter: Cell::new(0),
            sync_if_needed_counter: Cell::new(0),
            is_contents_available_counter: Cell::new(0),
            add_observer_counter: Cell::new(0),
            remove_observer_counter: Cell::new(0),
            on_sync: RefCell::new(None),
        })
    }

    /// Run `f` on every `sync()` call, after the counter was bumped
    pub fn on_sync(&self, f: impl Fn(&TestLoadable) + 'static) {
        self.on_sync.replace(Some(Rc::new(f)));
    }

    // =========================================================================
    // DIRECT SETTERS (no notification)
    // =========================================================================

    pub fn set_needs_sync(&self, needs_sync: bool) {
        self.needs_sync.set(needs_sync);
    }

    pub fn set_contents_available(&self, available: bool) {
        self.cell.force_contents_available(available);
    }

    pub fn set_error(&self, error: Option<SyncError>) {
        self.cell.force_error(error);
    }

    // =========================================================================
    // STATE SETTERS (always notify)
    // =========================================================================

    /// Set only the state and notify, even if it did not change
    pub fn set_loadable_state(&self, state: LoadableState) {
        self.cell.force_state(state);
        self.cell.notify(self);
    }

    pub fn set_idle(&self) {
        self.set_loadable_state(LoadableState::Idle);
    }

    /// Leaves the error untouched, so a test can stage `Syncing` after a
    /// failure
    pub fn set_syncing(&self) {
        self.set_loadable_state(LoadableState::Syncing);
    }

    pub fn set_did_sync_successfully(&self) {
        self.cell.set_did_sync_successfully(self);
    }

    pub fn set_did_fail_to_sync(&self, error: impl Into<Option<SyncError>>) {
        self.cell.set_failed_to_sync(error.into(), self);
    }

    pub fn notify_did_change(&self) {
        self.cell.notify(self);
    }

    // =========================================================================
    // COUNTERS
    // =========================================================================

    pub fn sync_counter(&self) -> usize {
        self.sync_counter.get()
    }

    pub fn sync_if_needed_counter(&self) -> usize {
        self.sync_if_needed_counter.get()
    }

    pub fn is_contents_available_counter(&self) -> usize {
        self.is_contents_available_counter.get()
    }

    pub fn add_observer_counter(&self) -> usize {
        self.add_observer_counter.get()
    }

    pub fn remove_observer_counter(&self) -> usize {
        self.remove_observer_counter.get()
    }

    pub fn reset_all_call_counters(&self) {
        for counter in [
            &self.sync_counter,
            &self.sync_if_needed_counter,
            &self.is_contents_available_counter,
            &self.add_observer_counter,
            &self.remove_observer_counter,
        ] {
            counter.set(0);
        }
    }
}

fn bump(counter: &Cell<usize>) {
    counter.set(counter.get() + 1);
}

impl PureLoadable for TestLoadable {
    fn loadable_state(&self) -> LoadableState {
        self.cell.state()
    }

    fn error(&self) -> Option<SyncError> {
        self.cell.error()
    }

    fn is_contents_available(&self) -> bool {
        bump(&self.is_contents_available_counter);
        self.cell.is_contents_available()
    }

    fn add_observer(&self, observer: &Rc<dyn LoadableObserver>) -> bool {
        bump(&self.add_observer_counter);
        self.cell.add_observer(observer)
    }

    fn remove_observer(&self, observer: &Rc<dyn LoadableObserver>) -> bool {
        bump(&self.remove_observer_counter);
        self.cell.remove_observer(observer)
    }

    fn has_observers(&self) -> bool {
        self.cell.has_observers()
    }
}

impl Loadable for TestLoadable {
    fn sync(&self) {
        bump(&self.sync_counter);
        let hook = self.on_sync.borrow().clone();
        if let Some(hook) = hook {
            hook(self);
        }
    }

    fn needs_sync(&self) -> bool {
        self.needs_sync.get()
    }

    /// Counts the call, then syncs under the usual conditions
    fn sync_if_needed(&self) {
        bump(&self.sync_if_needed_counter);
        if self.needs_sync() || self.loadable_state() != LoadableState::Succeeded {
            self.sync();
        }
    }
}

impl fmt::Debug for TestLoadable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestLoadable")
            .field("state", &self.cell.state())
            .field("sync_counter", &self.sync_counter.get())
            .finish_non_exhaustive()
    }
}
