//! Loadable interfaces
//!
//! A loadable models a value that is obtained asynchronously and can be
//! refreshed later. Unlike a promise it can move "backward" (a successful
//! loadable goes back to syncing on refresh), and its contents can stay
//! available while a refresh is in flight or after it failed.
//!
//! - [`PureLoadable`] - the read-only view: state, error, contents
//!   availability, observation
//! - [`Loadable`] - adds the `sync` trigger
//! - [`LoadableObserver`] - receives "did change" notifications

use std::fmt;
use std::rc::Rc;

use crate::error::SyncError;

/// Main states a loadable can be in
///
/// There is no total order of progress here: any state can follow any other.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum LoadableState {
    /// Never synced, or the result of the last sync does not matter
    #[default]
    Idle,
    /// A sync (download, upload, etc.) is in progress
    Syncing,
    /// The last sync succeeded; contents are available
    Succeeded,
    /// The last sync failed; see [`PureLoadable::error`]
    Failed,
}

impl LoadableState {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoadableState::Idle => "idle",
            LoadableState::Syncing => "syncing",
            LoadableState::Succeeded => "did-sync-successfully",
            LoadableState::Failed => "did-fail-to-sync",
        }
    }
}

impl fmt::Display for LoadableState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Receives change notifications from loadables
///
/// Called whenever the loadable changes, or might have changed. This covers
/// the state, contents availability and the contents themselves, so
/// observers should re-read whatever they need from `loadable`.
pub trait LoadableObserver {
    fn loadable_did_change(&self, loadable: &dyn PureLoadable);
}

/// Read-only view of a loadable
///
/// Consumers that must not trigger side effects get this view only.
pub trait PureLoadable {
    /// Current state
    fn loadable_state(&self) -> LoadableState;

    /// Why the last sync failed
    ///
    /// Only meaningful while the state is [`LoadableState::Failed`].
    fn error(&self) -> Option<SyncError>;

    /// `true` when the contents of this loadable can be used now
    ///
    /// Always `true` when the state is [`LoadableState::Succeeded`]; can also
    /// be `true` in other states (stale contents kept during a refresh).
    fn is_contents_available(&self) -> bool;

    /// Register an observer
    ///
    /// Registering the same observer twice is a programmer error: it panics
    /// in debug builds and returns `false` in release builds.
    fn add_observer(&self, observer: &Rc<dyn LoadableObserver>) -> bool;

    /// Unregister an observer
    ///
    /// Removing an observer that is not registered is reported the same way
    /// as a double registration.
    fn remove_observer(&self, observer: &Rc<dyn LoadableObserver>) -> bool;

    /// `true` when at least one observer is registered
    fn has_observers(&self) -> bool;
}

/// A loadable that can be asked to sync
pub trait Loadable: PureLoadable {
    /// Ask the loadable to sync now
    ///
    /// Ignored while a sync is already in progress.
    fn sync(&self);

    /// `true` when a sync is due even though the last one succeeded, e.g.
    /// because a cache entry expired
    fn needs_sync(&self) -> bool {
        false
    }

    /// Sync when [`needs_sync`](Self::needs_sync) says so or when the state
    /// is anything other than [`LoadableState::Succeeded`]
    fn sync_if_needed(&self) {
        if self.needs_sync() || self.loadable_state() != LoadableState::Succeeded {
            self.sync();
        }
    }
}
