//! Ready-to-use loadables
//!
//! - [`BasicPureLoadable`] - its owner drives the state directly through the
//!   three transition methods; consumers get `Rc<dyn PureLoadable>`
//! - [`BasicLoadable`] - runs an injected sync closure whenever a sync is
//!   requested; the closure reports back through a [`SyncContext`]
//!
//! Owners keep the concrete `Rc<BasicLoadable>` (with its transition methods)
//! and hand out `Rc<dyn Loadable>` or `Rc<dyn PureLoadable>`, so consumers can
//! observe and trigger syncs but cannot fake results.
//!
//! # Example
//!
//! ```rust
//! use std::cell::RefCell;
//! use std::rc::Rc;
//! use blinc_loadable::{BasicLoadable, Loadable, LoadableState, PureLoadable, SyncContext};
//!
//! // Completions are usually stored and resumed later, e.g. from a callback
//! let pending: Rc<RefCell<Option<SyncContext>>> = Rc::new(RefCell::new(None));
//! let pending_clone = Rc::clone(&pending);
//!
//! let profile = BasicLoadable::new(move |ctx| {
//!     *pending_clone.borrow_mut() = Some(ctx);
//! });
//!
//! profile.sync();
//! assert_eq!(profile.loadable_state(), LoadableState::Syncing);
//!
//! pending.borrow_mut().take().unwrap().did_sync_successfully();
//! assert_eq!(profile.loadable_state(), LoadableState::Succeeded);
//! assert!(profile.is_contents_available());
//! ```

use std::fmt;
use std::rc::{Rc, Weak};

use crate::error::SyncError;
use crate::loadable::{Loadable, LoadableObserver, LoadableState, PureLoadable};
use crate::state::StateCell;

type SyncFn = Box<dyn Fn(SyncContext)>;
type Predicate = Box<dyn Fn(&BasicLoadable) -> bool>;
type ObserverHook = Box<dyn Fn(&BasicLoadable)>;

// =============================================================================
// PURE LOADABLE
// =============================================================================

/// A pure loadable driven entirely by its owner
pub struct BasicPureLoadable {
    cell: StateCell,
}

impl BasicPureLoadable {
    pub fn new() -> Rc<Self> {
        Rc::new(Self {
            cell: StateCell::new("BasicPureLoadable"),
        })
    }

    /// Enter `Syncing` without touching contents availability
    pub fn set_syncing(&self) {
        self.cell.set_syncing(self);
    }

    /// Enter `Failed` with an optional error; contents become unavailable
    pub fn set_failed_to_sync(&self, error: impl Into<Option<SyncError>>) {
        self.cell.set_failed_to_sync(error.into(), self);
    }

    /// Enter `Succeeded`; clears the error and makes contents available
    pub fn set_did_sync_successfully(&self) {
        self.cell.set_did_sync_successfully(self);
    }

    /// Notify observers without a state change, e.g. after the contents
    /// changed in place
    pub fn notify_did_change(&self) {
        self.cell.notify(self);
    }
}

impl PureLoadable for BasicPureLoadable {
    fn loadable_state(&self) -> LoadableState {
        self.cell.state()
    }

    fn error(&self) -> Option<SyncError> {
        self.cell.error()
    }

    fn is_contents_available(&self) -> bool {
        self.cell.is_contents_available()
    }

    fn add_observer(&self, observer: &Rc<dyn LoadableObserver>) -> bool {
        self.cell.add_observer(observer)
    }

    fn remove_observer(&self, observer: &Rc<dyn LoadableObserver>) -> bool {
        self.cell.remove_observer(observer)
    }

    fn has_observers(&self) -> bool {
        self.cell.has_observers()
    }
}

impl fmt::Debug for BasicPureLoadable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BasicPureLoadable")
            .field("state", &self.cell.state())
            .field("contents_available", &self.cell.is_contents_available())
            .finish()
    }
}

// =============================================================================
// SYNC CONTEXT
// =============================================================================

/// Completion handle passed to the sync closure of a [`BasicLoadable`]
///
/// The handle does not keep the loadable alive. Completing after the
/// loadable is gone does nothing and returns `false`.
#[derive(Clone)]
pub struct SyncContext {
    loadable: Weak<BasicLoadable>,
}

impl SyncContext {
    /// The loadable being synced, if it is still alive
    pub fn loadable(&self) -> Option<Rc<BasicLoadable>> {
        self.loadable.upgrade()
    }

    pub fn is_alive(&self) -> bool {
        self.loadable.strong_count() > 0
    }

    /// Report success
    pub fn did_sync_successfully(&self) -> bool {
        match self.loadable.upgrade() {
            Some(loadable) => {
                loadable.set_did_sync_successfully();
                true
            }
            None => false,
        }
    }

    /// Report failure
    pub fn failed_to_sync(&self, error: impl Into<Option<SyncError>>) -> bool {
        match self.loadable.upgrade() {
            Some(loadable) => {
                loadable.set_failed_to_sync(error);
                true
            }
            None => false,
        }
    }

    /// Report the outcome of a fallible operation
    pub fn finish(&self, result: std::result::Result<(), SyncError>) -> bool {
        match result {
            Ok(()) => self.did_sync_successfully(),
            Err(err) => self.failed_to_sync(err),
        }
    }
}

impl fmt::Debug for SyncContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncContext")
            .field("alive", &self.is_alive())
            .finish()
    }
}

// =============================================================================
// LOADABLE
// =============================================================================

/// A loadable that performs its sync through an injected closure
///
/// `sync()` moves the loadable to `Syncing` and calls the closure, which must
/// eventually report back through the [`SyncContext`] it receives, on the
/// same thread. While `Syncing`, further `sync()` calls are ignored.
pub struct BasicLoadable {
    cell: StateCell,
    this: Weak<BasicLoadable>,
    sync_fn: SyncFn,
    needs_sync_fn: Option<Predicate>,
    contents_available_fn: Option<Predicate>,
    on_first_observer: Option<ObserverHook>,
    on_last_observer: Option<ObserverHook>,
}

impl BasicLoadable {
    /// Create a loadable with the given sync closure and default behavior
    /// otherwise
    pub fn new(on_sync: impl Fn(SyncContext) + 'static) -> Rc<Self> {
        Self::builder(on_sync).build()
    }

    pub fn builder(on_sync: impl Fn(SyncContext) + 'static) -> BasicLoadableBuilder {
        BasicLoadableBuilder {
            label: "BasicLoadable",
            sync_fn: Box::new(on_sync),
            needs_sync_fn: None,
            contents_available_fn: None,
            on_first_observer: None,
            on_last_observer: None,
        }
    }

    /// Enter `Syncing` without touching contents availability
    pub fn set_syncing(&self) {
        self.cell.set_syncing(self);
    }

    /// Enter `Failed` with an optional error; contents become unavailable
    pub fn set_failed_to_sync(&self, error: impl Into<Option<SyncError>>) {
        self.cell.set_failed_to_sync(error.into(), self);
    }

    /// Enter `Succeeded`; clears the error and makes contents available
    pub fn set_did_sync_successfully(&self) {
        self.cell.set_did_sync_successfully(self);
    }

    /// Notify observers without a state change
    pub fn notify_did_change(&self) {
        self.cell.notify(self);
    }

    fn context(&self) -> SyncContext {
        SyncContext {
            loadable: self.this.clone(),
        }
    }
}

impl PureLoadable for BasicLoadable {
    fn loadable_state(&self) -> LoadableState {
        self.cell.state()
    }

    fn error(&self) -> Option<SyncError> {
        self.cell.error()
    }

    fn is_contents_available(&self) -> bool {
        if self.cell.state() == LoadableState::Succeeded {
            return true;
        }
        match &self.contents_available_fn {
            Some(available) => available(self),
            None => self.cell.is_contents_available(),
        }
    }

    fn add_observer(&self, observer: &Rc<dyn LoadableObserver>) -> bool {
        let first = !self.cell.has_observers();
        let added = self.cell.add_observer(observer);
        if added && first {
            if let Some(hook) = &self.on_first_observer {
                hook(self);
            }
        }
        added
    }

    fn remove_observer(&self, observer: &Rc<dyn LoadableObserver>) -> bool {
        let removed = self.cell.remove_observer(observer);
        if removed && !self.cell.has_observers() {
            if let Some(hook) = &self.on_last_observer {
                hook(self);
            }
        }
        removed
    }

    fn has_observers(&self) -> bool {
        self.cell.has_observers()
    }
}

impl Loadable for BasicLoadable {
    fn sync(&self) {
        if self.cell.state() == LoadableState::Syncing {
            tracing::trace!("sync requested while already syncing, ignored");
            return;
        }
        self.cell.set_syncing(self);
        (self.sync_fn)(self.context());
    }

    fn needs_sync(&self) -> bool {
        self.needs_sync_fn
            .as_ref()
            .is_some_and(|needs_sync| needs_sync(self))
    }
}

impl fmt::Debug for BasicLoadable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BasicLoadable")
            .field("state", &self.cell.state())
            .field("contents_available", &self.is_contents_available())
            .finish()
    }
}

/// Builder for [`BasicLoadable`]
pub struct BasicLoadableBuilder {
    label: &'static str,
    sync_fn: SyncFn,
    needs_sync_fn: Option<Predicate>,
    contents_available_fn: Option<Predicate>,
    on_first_observer: Option<ObserverHook>,
    on_last_observer: Option<ObserverHook>,
}

impl BasicLoadableBuilder {
    /// Name used in diagnostics
    pub fn label(mut self, label: &'static str) -> Self {
        self.label = label;
        self
    }

    /// Decide when `sync_if_needed` should sync a loadable that already
    /// succeeded (cache expiry, pending uploads, ...)
    pub fn needs_sync(mut self, f: impl Fn(&BasicLoadable) -> bool + 'static) -> Self {
        self.needs_sync_fn = Some(Box::new(f));
        self
    }

    /// Decide whether contents are available outside of `Succeeded`, e.g.
    /// when they were restored from a cache
    pub fn contents_available(mut self, f: impl Fn(&BasicLoadable) -> bool + 'static) -> Self {
        self.contents_available_fn = Some(Box::new(f));
        self
    }

    /// Called right after the first observer is added
    pub fn on_first_observer(mut self, f: impl Fn(&BasicLoadable) + 'static) -> Self {
        self.on_first_observer = Some(Box::new(f));
        self
    }

    /// Called right after the last observer is removed
    ///
    /// Observers dropped without unregistering do not trigger it, though they
    /// stop counting towards `has_observers()` right away.
    pub fn on_last_observer(mut self, f: impl Fn(&BasicLoadable) + 'static) -> Self {
        self.on_last_observer = Some(Box::new(f));
        self
    }

    pub fn build(self) -> Rc<BasicLoadable> {
        Rc::new_cyclic(|this| BasicLoadable {
            cell: StateCell::new(self.label),
            this: this.clone(),
            sync_fn: self.sync_fn,
            needs_sync_fn: self.needs_sync_fn,
            contents_available_fn: self.contents_available_fn,
            on_first_observer: self.on_first_observer,
            on_last_observer: self.on_last_observer,
        })
    }
}

impl fmt::Debug for BasicLoadableBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BasicLoadableBuilder")
            .field("label", &self.label)
            .finish_non_exhaustive()
    }
}
