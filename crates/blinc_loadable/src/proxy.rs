//! Loadable proxies
//!
//! Sometimes an API has to hand out a loadable before the real one exists.
//! A [`Proxy`] stands in for it: it reports `Idle` with no contents until a
//! target is assigned, then forwards every read to the target and re-notifies
//! its own observers whenever the target changes.
//!
//! A [`LoadableProxy`] also remembers a `sync()` requested while it had no
//! target and replays it, once, when a target is assigned.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use crate::error::SyncError;
use crate::loadable::{Loadable, LoadableObserver, LoadableState, PureLoadable};
use crate::state::StateCell;

mod sealed {
    pub trait Sealed {}
    impl Sealed for dyn crate::loadable::PureLoadable {}
    impl Sealed for dyn crate::loadable::Loadable {}
}

/// Loadable trait objects a [`Proxy`] can forward to
pub trait ProxyTarget: PureLoadable + sealed::Sealed {
    /// Run a sync that was requested before this target was assigned
    #[doc(hidden)]
    fn replay_sync(&self);
}

impl ProxyTarget for dyn PureLoadable {
    fn replay_sync(&self) {}
}

impl ProxyTarget for dyn Loadable {
    fn replay_sync(&self) {
        self.sync();
    }
}

/// Proxy over a read-only loadable
pub type PureLoadableProxy = Proxy<dyn PureLoadable>;

/// Proxy over a syncable loadable
pub type LoadableProxy = Proxy<dyn Loadable>;

struct ProxyRelay<L: ?Sized + ProxyTarget>(Weak<Proxy<L>>);

impl<L: ?Sized + ProxyTarget + 'static> LoadableObserver for ProxyRelay<L> {
    fn loadable_did_change(&self, _target: &dyn PureLoadable) {
        if let Some(proxy) = self.0.upgrade() {
            proxy.did_change();
        }
    }
}

/// Stands in for a loadable that is assigned later
pub struct Proxy<L: ?Sized + ProxyTarget> {
    cell: StateCell,
    target: RefCell<Option<Rc<L>>>,
    pending_sync: Cell<bool>,
    relay: Rc<dyn LoadableObserver>,
    on_proxy_change: RefCell<Option<Rc<dyn Fn(&Proxy<L>)>>>,
}

impl<L: ?Sized + ProxyTarget + 'static> Proxy<L> {
    /// A proxy without a target
    pub fn new() -> Rc<Self> {
        Rc::new_cyclic(|this: &Weak<Proxy<L>>| {
            let relay: Rc<dyn LoadableObserver> = Rc::new(ProxyRelay(this.clone()));
            Proxy {
                cell: StateCell::new("LoadableProxy"),
                target: RefCell::new(None),
                pending_sync: Cell::new(false),
                relay,
                on_proxy_change: RefCell::new(None),
            }
        })
    }

    /// A proxy forwarding to `loadable` from the start
    pub fn with_loadable(loadable: Rc<L>) -> Rc<Self> {
        let proxy = Self::new();
        proxy.set_loadable(Some(loadable));
        proxy
    }

    /// The current target
    pub fn loadable(&self) -> Option<Rc<L>> {
        self.target.borrow().clone()
    }

    /// Assign (or clear) the target
    ///
    /// Observation of the previous target stops before the new one is
    /// attached. Observers of the proxy are notified, then a sync requested
    /// while there was no target is replayed on the new one. Assigning the
    /// current target again does nothing.
    pub fn set_loadable(&self, loadable: Option<Rc<L>>) {
        let unchanged = match (self.target.borrow().as_ref(), loadable.as_ref()) {
            (Some(current), Some(new)) => addr(current) == addr(new),
            (None, None) => true,
            _ => false,
        };
        if unchanged {
            return;
        }

        let old = self.target.replace(loadable.clone());
        if let Some(old) = old {
            old.remove_observer(&self.relay);
        }
        if let Some(new) = &loadable {
            new.add_observer(&self.relay);
        }
        tracing::debug!(has_target = loadable.is_some(), "loadable proxy target changed");

        self.did_change();

        if let Some(new) = loadable {
            if self.pending_sync.replace(false) {
                tracing::trace!("replaying sync requested before the proxy had a target");
                new.replay_sync();
            }
        }
    }

    /// Called after the target (or its state) changed and before observers
    /// are notified
    pub fn on_proxy_change(&self, f: impl Fn(&Proxy<L>) + 'static) {
        self.on_proxy_change.replace(Some(Rc::new(f)));
    }

    fn did_change(&self) {
        let hook = self.on_proxy_change.borrow().clone();
        if let Some(hook) = hook {
            hook(self);
        }
        self.cell.notify(self);
    }
}

fn addr<L: ?Sized>(loadable: &Rc<L>) -> *const () {
    Rc::as_ptr(loadable) as *const ()
}

impl<L: ?Sized + ProxyTarget + 'static> PureLoadable for Proxy<L> {
    fn loadable_state(&self) -> LoadableState {
        self.loadable()
            .map_or(LoadableState::Idle, |target| target.loadable_state())
    }

    fn error(&self) -> Option<SyncError> {
        self.loadable().and_then(|target| target.error())
    }

    fn is_contents_available(&self) -> bool {
        self.loadable()
            .is_some_and(|target| target.is_contents_available())
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

impl Loadable for Proxy<dyn Loadable> {
    fn sync(&self) {
        match self.loadable() {
            Some(target) => target.sync(),
            None => {
                tracing::trace!("sync requested before the proxy has a target, deferred");
                self.pending_sync.set(true);
            }
        }
    }

    fn needs_sync(&self) -> bool {
        self.loadable().is_some_and(|target| target.needs_sync())
    }

    fn sync_if_needed(&self) {
        match self.loadable() {
            Some(target) => target.sync_if_needed(),
            // Idle without a target, so a sync is always due
            None => self.sync(),
        }
    }
}

impl<L: ?Sized + ProxyTarget> Drop for Proxy<L> {
    fn drop(&mut self) {
        if let Some(target) = self.target.get_mut().take() {
            target.remove_observer(&self.relay);
        }
    }
}

impl<L: ?Sized + ProxyTarget> fmt::Debug for Proxy<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Proxy")
            .field("has_target", &self.target.borrow().is_some())
            .field("pending_sync", &self.pending_sync.get())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::basic::{BasicLoadable, BasicPureLoadable};
    use crate::observer::observer_fn;

    fn counting_loadable() -> (Rc<BasicLoadable>, Rc<Cell<u32>>) {
        let calls = Rc::new(Cell::new(0));
        let calls_clone = Rc::clone(&calls);
        let loadable = BasicLoadable::new(move |_ctx| calls_clone.set(calls_clone.get() + 1));
        (loadable, calls)
    }

    fn counter<L: ?Sized + ProxyTarget + 'static>(
        proxy: &Rc<Proxy<L>>,
    ) -> (Rc<dyn LoadableObserver>, Rc<Cell<u32>>) {
        let count = Rc::new(Cell::new(0));
        let count_clone = Rc::clone(&count);
        let observer = observer_fn(move |_| count_clone.set(count_clone.get() + 1));
        assert!(proxy.add_observer(&observer));
        (observer, count)
    }

    #[test]
    fn test_idle_without_target() {
        let proxy = LoadableProxy::new();
        assert_eq!(proxy.loadable_state(), LoadableState::Idle);
        assert!(!proxy.is_contents_available());
        assert!(proxy.error().is_none());
        assert!(!proxy.needs_sync());
        assert!(proxy.loadable().is_none());
    }

    #[test]
    fn test_pending_sync_replayed_once() {
        let proxy = LoadableProxy::new();
        proxy.sync();
        proxy.sync();
        proxy.sync_if_needed();
        assert_eq!(proxy.loadable_state(), LoadableState::Idle);

        let (target, calls) = counting_loadable();
        proxy.set_loadable(Some(target.clone()));
        assert_eq!(calls.get(), 1);
        assert_eq!(proxy.loadable_state(), LoadableState::Syncing);

        // Nothing left to replay on the next target
        let (other, other_calls) = counting_loadable();
        proxy.set_loadable(Some(other));
        assert_eq!(other_calls.get(), 0);
    }

    #[test]
    fn test_no_replay_without_pending_sync() {
        let (target, calls) = counting_loadable();
        let proxy = LoadableProxy::with_loadable(target);
        assert_eq!(calls.get(), 0);

        proxy.sync();
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_forwards_reads_and_notifications() {
        let target = BasicPureLoadable::new();
        let proxy = PureLoadableProxy::new();
        let (_observer, count) = counter(&proxy);

        proxy.set_loadable(Some(target.clone()));
        assert_eq!(count.get(), 1);

        target.set_failed_to_sync(SyncError::new("gone"));
        assert_eq!(count.get(), 2);
        assert_eq!(proxy.loadable_state(), LoadableState::Failed);
        assert_eq!(proxy.error().unwrap().message(), "gone");

        target.set_did_sync_successfully();
        assert!(proxy.is_contents_available());
        assert_eq!(count.get(), 3);
    }

    #[test]
    fn test_new_target_detaches_old() {
        let first = BasicPureLoadable::new();
        let second = BasicPureLoadable::new();
        let proxy = PureLoadableProxy::with_loadable(first.clone());
        let (_observer, count) = counter(&proxy);
        assert!(first.has_observers());

        proxy.set_loadable(Some(second.clone()));
        assert!(!first.has_observers());
        assert!(second.has_observers());
        assert_eq!(count.get(), 1);

        first.set_syncing();
        assert_eq!(count.get(), 1);
        assert_eq!(proxy.loadable_state(), LoadableState::Idle);
    }

    #[test]
    fn test_same_target_is_noop() {
        let target = BasicPureLoadable::new();
        let proxy = PureLoadableProxy::with_loadable(target.clone());
        let (_observer, count) = counter(&proxy);

        proxy.set_loadable(Some(target.clone()));
        proxy.set_loadable(proxy.loadable());
        assert_eq!(count.get(), 0);
    }

    #[test]
    fn test_clearing_target() {
        let target = BasicPureLoadable::new();
        target.set_did_sync_successfully();
        let proxy = PureLoadableProxy::with_loadable(target.clone());
        assert_eq!(proxy.loadable_state(), LoadableState::Succeeded);

        proxy.set_loadable(None);
        assert_eq!(proxy.loadable_state(), LoadableState::Idle);
        assert!(!proxy.is_contents_available());
        assert!(!target.has_observers());
    }

    #[test]
    fn test_proxy_change_hook() {
        let target = BasicPureLoadable::new();
        let proxy = PureLoadableProxy::new();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let seen_clone = Rc::clone(&seen);
        proxy.on_proxy_change(move |p| seen_clone.borrow_mut().push(p.loadable_state()));

        proxy.set_loadable(Some(target.clone()));
        target.set_syncing();
        assert_eq!(
            *seen.borrow(),
            vec![LoadableState::Idle, LoadableState::Syncing]
        );
    }

    #[test]
    fn test_drop_detaches_from_target() {
        let target = BasicPureLoadable::new();
        let proxy = PureLoadableProxy::with_loadable(target.clone());
        assert!(target.has_observers());
        drop(proxy);
        assert!(!target.has_observers());
    }
}
