//! Closure-based observers
//!
//! [`LoadableSubscription`] lets any code observe a loadable with a closure
//! instead of implementing [`LoadableObserver`] on one of its own types. The
//! subscription removes itself when dropped, so it can simply be stored in a
//! field and overwritten when re-subscribing.
//!
//! ```rust
//! use blinc_loadable::{BasicPureLoadable, LoadableSubscription, PureLoadable};
//!
//! let loadable = BasicPureLoadable::new();
//! let subscription = LoadableSubscription::new(Some(&loadable), |l: &dyn PureLoadable| {
//!     println!("state is now {}", l.loadable_state());
//! });
//! assert!(subscription.is_some());
//!
//! loadable.set_did_sync_successfully();
//! drop(subscription);
//! assert!(!loadable.has_observers());
//! ```

use std::fmt;
use std::rc::Rc;

use crate::loadable::{LoadableObserver, PureLoadable};

/// Adapts a closure to [`LoadableObserver`]
pub(crate) struct CallbackObserver<F>(pub(crate) F);

impl<F> LoadableObserver for CallbackObserver<F>
where
    F: Fn(&dyn PureLoadable),
{
    fn loadable_did_change(&self, loadable: &dyn PureLoadable) {
        (self.0)(loadable)
    }
}

/// Wrap a closure into a registrable observer
pub(crate) fn observer_fn<F>(f: F) -> Rc<dyn LoadableObserver>
where
    F: Fn(&dyn PureLoadable) + 'static,
{
    Rc::new(CallbackObserver(f))
}

/// A closure observer that stays registered while the subscription lives
#[must_use = "dropping the subscription stops the notifications"]
pub struct LoadableSubscription {
    observer: Rc<dyn LoadableObserver>,
    detach: Option<Box<dyn FnOnce(&Rc<dyn LoadableObserver>)>>,
}

impl LoadableSubscription {
    /// Start observing `loadable`
    ///
    /// Returns `None` when there is nothing to observe, which keeps
    /// "re-subscribe to whatever the current loadable is" code free of
    /// special cases.
    pub fn new<L, F>(loadable: Option<&Rc<L>>, on_change: F) -> Option<Self>
    where
        L: PureLoadable + ?Sized + 'static,
        F: Fn(&dyn PureLoadable) + 'static,
    {
        let loadable = loadable?;
        let observer = observer_fn(on_change);
        if !loadable.add_observer(&observer) {
            return None;
        }

        let target = Rc::downgrade(loadable);
        Some(Self {
            observer,
            detach: Some(Box::new(move |observer: &Rc<dyn LoadableObserver>| {
                if let Some(target) = target.upgrade() {
                    target.remove_observer(observer);
                }
            })),
        })
    }

    /// Stop observing; safe to call more than once
    pub fn remove(&mut self) {
        if let Some(detach) = self.detach.take() {
            detach(&self.observer);
        }
    }

    pub fn is_active(&self) -> bool {
        self.detach.is_some()
    }
}

impl Drop for LoadableSubscription {
    fn drop(&mut self) {
        self.remove();
    }
}

impl fmt::Debug for LoadableSubscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadableSubscription")
            .field("active", &self.is_active())
            .finish()
    }
}
