//! Reentrancy-safe observer registry
//!
//! An [`ObserverHub`] keeps an ordered list of non-owning (`Weak`) references
//! to observers. Observable objects own one hub each, forward their own
//! `add_observer`/`remove_observer` calls to it and use [`ObserverHub::for_each`]
//! to notify.
//!
//! # Reentrancy
//!
//! Observers are free to add or remove observers (including themselves) while
//! they are being notified. A notification pass works on a snapshot of
//! registration ids taken when the pass starts, and every id is re-resolved
//! right before its observer is called:
//!
//! - an observer removed before its turn is skipped,
//! - an observer added during the pass is only seen by later passes,
//! - an observer removed and added again gets a new id, so it is never
//!   visited twice in one pass.
//!
//! No internal borrow is held while an observer runs.
//!
//! # Threading
//!
//! The hub is `!Send` and does no locking. The owning object is expected to
//! confine all hub use to a single execution context.

use std::borrow::Cow;
use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use slotmap::{new_key_type, SlotMap};
use smallvec::SmallVec;

use crate::error::{HubError, Result};
use crate::token::ObserverToken;

new_key_type! {
    /// Identifies a single registration within a hub
    ///
    /// Ids are never resolved again once their registration is removed, even
    /// when the underlying slot gets reused.
    pub struct ObserverId;
}

/// How a hub reports programmer errors (double add, removal of an observer
/// that is not registered)
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MisusePolicy {
    /// Panic with the error message
    Assert,
    /// Log the error and return it to the caller
    Log,
}

impl Default for MisusePolicy {
    /// `Assert` in debug builds, `Log` otherwise
    fn default() -> Self {
        if cfg!(debug_assertions) {
            MisusePolicy::Assert
        } else {
            MisusePolicy::Log
        }
    }
}

/// Registration storage shared with [`ObserverToken`]s
pub(crate) struct HubInner<O: ?Sized> {
    observers: SlotMap<ObserverId, Weak<O>>,
    /// Registration order; `observers` iteration order is unspecified
    order: Vec<ObserverId>,
}

impl<O: ?Sized> HubInner<O> {
    fn new() -> Self {
        Self {
            observers: SlotMap::with_key(),
            order: Vec::new(),
        }
    }

    fn is_live(&self, id: ObserverId) -> bool {
        self.observers
            .get(id)
            .is_some_and(|weak| weak.strong_count() > 0)
    }

    fn live_len(&self) -> usize {
        self.order.iter().filter(|id| self.is_live(**id)).count()
    }

    /// Dead entries are skipped: a new observer may reuse the address of one
    /// that was dropped without being removed
    fn find(&self, observer: &Rc<O>) -> Option<ObserverId> {
        let target = Rc::as_ptr(observer) as *const ();
        self.order.iter().copied().find(|id| {
            self.observers.get(*id).is_some_and(|weak| {
                weak.strong_count() > 0 && weak.as_ptr() as *const () == target
            })
        })
    }

    pub(crate) fn remove_id(&mut self, id: ObserverId) -> bool {
        if self.observers.remove(id).is_some() {
            self.order.retain(|other| *other != id);
            true
        } else {
            false
        }
    }
}

/// A per-object multicast registry of observers
///
/// Registration is a non-owning relation: the hub stores `Weak<O>` and never
/// keeps an observer alive. An observer may be registered at most once.
pub struct ObserverHub<O: ?Sized> {
    /// Name of the owning observable, used in diagnostics only
    label: Cow<'static, str>,
    policy: MisusePolicy,
    inner: Rc<RefCell<HubInner<O>>>,
}

impl<O: ?Sized> fmt::Debug for ObserverHub<O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObserverHub")
            .field("label", &self.label)
            .field("policy", &self.policy)
            .field("observers", &self.len())
            .finish()
    }
}

impl<O: ?Sized> ObserverHub<O> {
    /// Create an empty hub for the observable named `label`
    pub fn new(label: impl Into<Cow<'static, str>>) -> Self {
        Self {
            label: label.into(),
            policy: MisusePolicy::default(),
            inner: Rc::new(RefCell::new(HubInner::new())),
        }
    }

    /// Set how programmer errors are reported
    pub fn with_policy(mut self, policy: MisusePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Name of the owning observable
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn policy(&self) -> MisusePolicy {
        self.policy
    }

    /// `true` when no live observers are registered
    pub fn is_empty(&self) -> bool {
        let inner = self.inner.borrow();
        !inner.order.iter().any(|id| inner.is_live(*id))
    }

    /// Number of registered observers that are still alive
    ///
    /// Observers dropped without being removed are not counted, even before
    /// the next [`for_each`](Self::for_each) prunes them.
    pub fn len(&self) -> usize {
        self.inner.borrow().live_len()
    }

    /// Check if `observer` is registered
    pub fn contains(&self, observer: &Rc<O>) -> bool {
        self.inner.borrow().find(observer).is_some()
    }

    /// Register an observer
    ///
    /// Registering the same observer twice is a programmer error, reported
    /// according to the hub's [`MisusePolicy`]. The registration set is left
    /// untouched in that case.
    pub fn add(&self, observer: &Rc<O>) -> Result<ObserverId> {
        let mut inner = self.inner.borrow_mut();
        if inner.find(observer).is_some() {
            drop(inner);
            return Err(self.report(HubError::AlreadyRegistered {
                hub: self.label.to_string(),
            }));
        }

        let id = inner.observers.insert(Rc::downgrade(observer));
        inner.order.push(id);
        tracing::trace!(hub = %self.label, observers = inner.order.len(), "observer added");
        Ok(id)
    }

    /// Unregister an observer
    ///
    /// Removing an observer that is not registered is a programmer error,
    /// reported according to the hub's [`MisusePolicy`].
    pub fn remove(&self, observer: &Rc<O>) -> Result<()> {
        let mut inner = self.inner.borrow_mut();
        match inner.find(observer) {
            Some(id) => {
                inner.remove_id(id);
                tracing::trace!(hub = %self.label, observers = inner.order.len(), "observer removed");
                Ok(())
            }
            None => {
                drop(inner);
                Err(self.report(HubError::NotRegistered {
                    hub: self.label.to_string(),
                }))
            }
        }
    }

    /// Unregister by id, returning `false` if the id is no longer registered
    ///
    /// Unlike [`remove`](Self::remove) this is not treated as misuse.
    pub fn remove_id(&self, id: ObserverId) -> bool {
        self.inner.borrow_mut().remove_id(id)
    }

    /// Register an observer and return a token that unregisters it when
    /// removed or dropped
    pub fn subscribe(&self, observer: &Rc<O>) -> Result<ObserverToken<O>> {
        let id = self.add(observer)?;
        Ok(ObserverToken::new(Rc::downgrade(&self.inner), id))
    }

    /// Call `action` for every registered observer, in registration order
    ///
    /// See the module docs for how additions and removals made by `action`
    /// affect the pass.
    pub fn for_each(&self, mut action: impl FnMut(&O)) {
        let snapshot: SmallVec<[ObserverId; 8]> =
            self.inner.borrow().order.iter().copied().collect();

        for id in snapshot {
            let entry = self.inner.borrow().observers.get(id).map(Weak::upgrade);
            match entry {
                Some(Some(observer)) => action(&*observer),
                Some(None) => {
                    tracing::warn!(hub = %self.label, "observer was dropped without being removed");
                    self.inner.borrow_mut().remove_id(id);
                }
                // Removed earlier in this pass
                None => {}
            }
        }
    }

    fn report(&self, err: HubError) -> HubError {
        match self.policy {
            MisusePolicy::Assert => panic!("{err}"),
            MisusePolicy::Log => tracing::error!(hub = %self.label, "{err}"),
        }
        err
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};

    struct Recorder {
        name: &'static str,
        log: Rc<RefCell<Vec<&'static str>>>,
    }

    fn recorder(name: &'static str, log: &Rc<RefCell<Vec<&'static str>>>) -> Rc<Recorder> {
        Rc::new(Recorder {
            name,
            log: Rc::clone(log),
        })
    }

    fn logging_hub() -> ObserverHub<Recorder> {
        ObserverHub::new("test").with_policy(MisusePolicy::Log)
    }

    #[test]
    fn test_for_each_in_registration_order() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let hub = logging_hub();
        let a = recorder("a", &log);
        let b = recorder("b", &log);
        let c = recorder("c", &log);
        hub.add(&c).unwrap();
        hub.add(&a).unwrap();
        hub.add(&b).unwrap();

        hub.for_each(|o| o.log.borrow_mut().push(o.name));
        assert_eq!(*log.borrow(), vec!["c", "a", "b"]);
        assert_eq!(hub.len(), 3);
    }

    #[test]
    fn test_reentrant_remove_and_add_during_pass() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let hub = logging_hub();
        let a = recorder("a", &log);
        let b = recorder("b", &log);
        let c = recorder("c", &log);
        let d = recorder("d", &log);
        hub.add(&a).unwrap();
        hub.add(&b).unwrap();
        hub.add(&c).unwrap();

        hub.for_each(|o| {
            o.log.borrow_mut().push(o.name);
            if o.name == "a" {
                hub.remove(&b).unwrap();
                hub.add(&d).unwrap();
            }
        });
        assert_eq!(*log.borrow(), vec!["a", "c"]);

        log.borrow_mut().clear();
        hub.for_each(|o| o.log.borrow_mut().push(o.name));
        assert_eq!(*log.borrow(), vec!["a", "c", "d"]);
    }

    #[test]
    fn test_observer_removing_itself() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let hub = logging_hub();
        let a = recorder("a", &log);
        let b = recorder("b", &log);
        hub.add(&a).unwrap();
        hub.add(&b).unwrap();

        hub.for_each(|o| {
            o.log.borrow_mut().push(o.name);
            if o.name == "a" {
                hub.remove(&a).unwrap();
            }
        });
        assert_eq!(*log.borrow(), vec!["a", "b"]);
        assert!(!hub.contains(&a));
        assert!(hub.contains(&b));
    }

    #[test]
    fn test_removing_visited_observer_is_noop_for_pass() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let hub = logging_hub();
        let a = recorder("a", &log);
        let b = recorder("b", &log);
        let c = recorder("c", &log);
        hub.add(&a).unwrap();
        hub.add(&b).unwrap();
        hub.add(&c).unwrap();

        hub.for_each(|o| {
            o.log.borrow_mut().push(o.name);
            if o.name == "b" {
                hub.remove(&a).unwrap();
            }
        });
        assert_eq!(*log.borrow(), vec!["a", "b", "c"]);
        assert_eq!(hub.len(), 2);
    }

    #[test]
    fn test_readded_observer_not_visited_twice() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let hub = logging_hub();
        let a = recorder("a", &log);
        let b = recorder("b", &log);
        hub.add(&a).unwrap();
        hub.add(&b).unwrap();

        let visits = Cell::new(0);
        hub.for_each(|o| {
            visits.set(visits.get() + 1);
            o.log.borrow_mut().push(o.name);
            if o.name == "b" {
                hub.remove(&a).unwrap();
                hub.add(&a).unwrap();
            }
        });
        assert_eq!(visits.get(), 2);
        assert_eq!(*log.borrow(), vec!["a", "b"]);

        log.borrow_mut().clear();
        hub.for_each(|o| o.log.borrow_mut().push(o.name));
        assert_eq!(*log.borrow(), vec!["b", "a"]);
    }

    #[test]
    fn test_double_add_is_reported() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let hub = logging_hub();
        let a = recorder("a", &log);
        hub.add(&a).unwrap();

        let err = hub.add(&a).unwrap_err();
        assert_eq!(
            err,
            HubError::AlreadyRegistered {
                hub: "test".to_string()
            }
        );
        assert_eq!(hub.len(), 1);
    }

    #[test]
    #[should_panic(expected = "already registered")]
    fn test_double_add_panics_under_assert_policy() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let hub = ObserverHub::new("strict").with_policy(MisusePolicy::Assert);
        let a = recorder("a", &log);
        hub.add(&a).unwrap();
        let _ = hub.add(&a);
    }

    #[test]
    fn test_remove_unregistered_is_reported() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let hub = logging_hub();
        let a = recorder("a", &log);
        let b = recorder("b", &log);
        hub.add(&a).unwrap();

        assert!(matches!(
            hub.remove(&b),
            Err(HubError::NotRegistered { .. })
        ));
        hub.remove(&a).unwrap();
        assert!(hub.remove(&a).is_err());
        assert!(hub.is_empty());
    }

    #[test]
    fn test_dropped_observer_is_skipped_and_pruned() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let hub = logging_hub();
        let a = recorder("a", &log);
        let b = recorder("b", &log);
        hub.add(&a).unwrap();
        hub.add(&b).unwrap();
        drop(a);

        hub.for_each(|o| o.log.borrow_mut().push(o.name));
        assert_eq!(*log.borrow(), vec!["b"]);
        assert_eq!(hub.len(), 1);
    }

    #[test]
    fn test_dropped_observer_not_counted_before_next_pass() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let hub = logging_hub();
        let a = recorder("a", &log);
        let b = recorder("b", &log);
        hub.add(&a).unwrap();
        hub.add(&b).unwrap();

        drop(a);
        assert_eq!(hub.len(), 1);
        assert!(!hub.is_empty());

        drop(b);
        assert_eq!(hub.len(), 0);
        assert!(hub.is_empty());

        // A new observer is never mistaken for a dead registration
        let c = recorder("c", &log);
        hub.add(&c).unwrap();
        assert!(hub.contains(&c));
        assert_eq!(hub.len(), 1);
    }

    #[test]
    fn test_remove_id() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let hub = logging_hub();
        let a = recorder("a", &log);
        let id = hub.add(&a).unwrap();

        assert!(hub.remove_id(id));
        assert!(!hub.remove_id(id));
        assert!(hub.is_empty());

        // A fresh registration never answers to the stale id
        hub.add(&a).unwrap();
        assert!(!hub.remove_id(id));
        assert!(hub.contains(&a));
    }

    trait Named {
        fn name(&self) -> &'static str;
    }

    struct Fixed(&'static str);

    impl Named for Fixed {
        fn name(&self) -> &'static str {
            self.0
        }
    }

    #[test]
    fn test_trait_object_observers() {
        let hub: ObserverHub<dyn Named> = ObserverHub::new("dyn").with_policy(MisusePolicy::Log);
        let first: Rc<dyn Named> = Rc::new(Fixed("first"));
        let second: Rc<dyn Named> = Rc::new(Fixed("second"));
        hub.add(&first).unwrap();
        hub.add(&second).unwrap();
        assert!(hub.add(&first).is_err());

        let mut names = Vec::new();
        hub.for_each(|o| names.push(o.name()));
        assert_eq!(names, vec!["first", "second"]);
    }
}
