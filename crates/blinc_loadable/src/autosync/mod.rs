//! Periodic refresh
//!
//! [`AutosyncLoadable`] wraps a [`Loadable`] and calls `sync_if_needed()` on
//! it at a fixed interval. The interval depends on whether the app is in the
//! foreground or the background; the timer is restarted on every lifecycle
//! change and cancelled when the wrapper is dropped.
//!
//! ```rust
//! use std::time::Duration;
//! use blinc_loadable::autosync::{AppLifecycle, AutosyncConfig, AutosyncLoadable, ManualScheduler};
//! use blinc_loadable::testing::TestLoadable;
//!
//! let target = TestLoadable::new();
//! let scheduler = ManualScheduler::new();
//! let lifecycle = AppLifecycle::new();
//!
//! let autosync = AutosyncLoadable::new(
//!     target.clone(),
//!     AutosyncConfig::foreground_only().with_interval_secs(30.0),
//!     scheduler.clone(),
//!     &lifecycle,
//! );
//!
//! scheduler.advance(Duration::from_secs(90));
//! assert_eq!(target.sync_if_needed_counter(), 3);
//! # drop(autosync);
//! ```

mod config;
mod lifecycle;
mod timer;

pub use config::AutosyncConfig;
pub use lifecycle::{AppLifecycle, AppState, LifecycleEvent, LifecycleObserver};
#[cfg(feature = "tokio")]
pub use timer::TokioScheduler;
pub use timer::{ManualScheduler, TimerCallback, TimerId, TimerScheduler, MIN_PERIOD};

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};
use std::time::Duration;

use blinc_hub::ObserverToken;

use crate::error::SyncError;
use crate::loadable::{Loadable, LoadableObserver, LoadableState, PureLoadable};
use crate::state::StateCell;

/// Whether an autosync timer is currently running
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AutosyncSchedule {
    Stopped,
    Scheduled(Duration),
}

struct TargetRelay(Weak<AutosyncLoadable>);

impl LoadableObserver for TargetRelay {
    fn loadable_did_change(&self, _target: &dyn PureLoadable) {
        if let Some(autosync) = self.0.upgrade() {
            autosync.cell.notify(&*autosync);
        }
    }
}

struct LifecycleRelay(Weak<AutosyncLoadable>);

impl LifecycleObserver for LifecycleRelay {
    fn lifecycle_did_change(&self, lifecycle: &AppLifecycle, _event: LifecycleEvent) {
        if let Some(autosync) = self.0.upgrade() {
            autosync.reschedule(lifecycle.state());
        }
    }
}

/// A loadable refreshed on a timer
///
/// Reads, `sync` and observation are forwarded to the wrapped target, so the
/// wrapper can be handed out in its place.
pub struct AutosyncLoadable {
    this: Weak<AutosyncLoadable>,
    target: Rc<dyn Loadable>,
    config: AutosyncConfig,
    scheduler: Rc<dyn TimerScheduler>,
    cell: StateCell,
    target_relay: Rc<dyn LoadableObserver>,
    lifecycle_relay: Rc<dyn LifecycleObserver>,
    lifecycle_token: RefCell<Option<ObserverToken<dyn LifecycleObserver>>>,
    timer: Cell<Option<(TimerId, Duration)>>,
}

impl AutosyncLoadable {
    /// Wrap `target` and start the timer matching the current app state
    pub fn new(
        target: Rc<dyn Loadable>,
        config: AutosyncConfig,
        scheduler: Rc<dyn TimerScheduler>,
        lifecycle: &AppLifecycle,
    ) -> Rc<Self> {
        if let Err(err) = config.validate() {
            tracing::warn!(%err, "invalid autosync config, affected app states will not sync");
        }
        let autosync = Rc::new_cyclic(|this: &Weak<AutosyncLoadable>| {
            let target_relay: Rc<dyn LoadableObserver> = Rc::new(TargetRelay(this.clone()));
            let lifecycle_relay: Rc<dyn LifecycleObserver> =
                Rc::new(LifecycleRelay(this.clone()));
            AutosyncLoadable {
                this: this.clone(),
                target,
                config,
                scheduler,
                cell: StateCell::new("AutosyncLoadable"),
                target_relay,
                lifecycle_relay,
                lifecycle_token: RefCell::new(None),
                timer: Cell::new(None),
            }
        });

        autosync.target.add_observer(&autosync.target_relay);
        let token = lifecycle.subscribe(&autosync.lifecycle_relay).ok();
        autosync.lifecycle_token.replace(token);
        autosync.reschedule(lifecycle.state());
        autosync
    }

    pub fn target(&self) -> &Rc<dyn Loadable> {
        &self.target
    }

    pub fn config(&self) -> &AutosyncConfig {
        &self.config
    }

    pub fn schedule(&self) -> AutosyncSchedule {
        match self.timer.get() {
            Some((_, interval)) => AutosyncSchedule::Scheduled(interval),
            None => AutosyncSchedule::Stopped,
        }
    }

    /// Restart the timer for `state`, so the next tick comes one full
    /// interval after the transition
    fn reschedule(&self, state: AppState) {
        self.stop();
        if let Some(interval) = self.config.interval_for(state) {
            let this = self.this.clone();
            let id = self.scheduler.schedule_repeating(
                interval,
                Box::new(move || {
                    if let Some(autosync) = this.upgrade() {
                        autosync.tick();
                    }
                }),
            );
            self.timer.set(Some((id, interval)));
        }
        tracing::debug!(?state, schedule = ?self.schedule(), "autosync rescheduled");
    }

    fn stop(&self) {
        if let Some((id, _)) = self.timer.take() {
            self.scheduler.cancel(id);
        }
    }

    fn tick(&self) {
        tracing::trace!("autosync tick");
        self.target.sync_if_needed();
    }
}

impl PureLoadable for AutosyncLoadable {
    fn loadable_state(&self) -> LoadableState {
        self.target.loadable_state()
    }

    fn error(&self) -> Option<SyncError> {
        self.target.error()
    }

    fn is_contents_available(&self) -> bool {
        self.target.is_contents_available()
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

impl Loadable for AutosyncLoadable {
    fn sync(&self) {
        self.target.sync();
    }

    fn needs_sync(&self) -> bool {
        self.target.needs_sync()
    }

    fn sync_if_needed(&self) {
        self.target.sync_if_needed();
    }
}

impl Drop for AutosyncLoadable {
    fn drop(&mut self) {
        self.stop();
        self.lifecycle_token.get_mut().take();
        self.target.remove_observer(&self.target_relay);
    }
}

impl fmt::Debug for AutosyncLoadable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AutosyncLoadable")
            .field("state", &self.target.loadable_state())
            .field("schedule", &self.schedule())
            .field("config", &self.config)
            .finish()
    }
}
