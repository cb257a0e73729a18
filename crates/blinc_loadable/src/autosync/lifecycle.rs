//! Application lifecycle signals
//!
//! The host (platform event loop, mobile runtime glue) forwards its
//! foreground/background events to an [`AppLifecycle`]; autosync loadables
//! subscribe to it to adjust their timers.

use std::cell::Cell;
use std::rc::Rc;

use blinc_hub::{ObserverHub, ObserverToken};

/// Whether the application is in the foreground
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum AppState {
    #[default]
    Active,
    Background,
}

/// Foreground/background transitions
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LifecycleEvent {
    /// Application came to the foreground
    Resumed,
    /// Application went to the background
    Suspended,
}

impl LifecycleEvent {
    /// State the application is in after this event
    pub fn resulting_state(self) -> AppState {
        match self {
            LifecycleEvent::Resumed => AppState::Active,
            LifecycleEvent::Suspended => AppState::Background,
        }
    }
}

pub trait LifecycleObserver {
    fn lifecycle_did_change(&self, lifecycle: &AppLifecycle, event: LifecycleEvent);
}

/// Current app state plus the observers interested in its changes
pub struct AppLifecycle {
    state: Cell<AppState>,
    hub: ObserverHub<dyn LifecycleObserver>,
}

impl AppLifecycle {
    pub fn new() -> Rc<Self> {
        Self::with_state(AppState::Active)
    }

    pub fn with_state(state: AppState) -> Rc<Self> {
        Rc::new(Self {
            state: Cell::new(state),
            hub: ObserverHub::new("AppLifecycle"),
        })
    }

    pub fn state(&self) -> AppState {
        self.state.get()
    }

    /// Apply an event from the host
    ///
    /// Events that do not change the state (a second `Resumed`, ...) are
    /// dropped.
    pub fn handle_event(&self, event: LifecycleEvent) {
        let state = event.resulting_state();
        if self.state.replace(state) == state {
            tracing::trace!(?event, "lifecycle event without state change ignored");
            return;
        }
        tracing::debug!(?event, ?state, "app lifecycle changed");
        self.hub
            .for_each(|observer| observer.lifecycle_did_change(self, event));
    }

    /// Observe lifecycle changes while the returned token lives
    pub fn subscribe(
        &self,
        observer: &Rc<dyn LifecycleObserver>,
    ) -> blinc_hub::Result<ObserverToken<dyn LifecycleObserver>> {
        self.hub.subscribe(observer)
    }

    pub fn has_observers(&self) -> bool {
        !self.hub.is_empty()
    }
}

impl std::fmt::Debug for AppLifecycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppLifecycle")
            .field("state", &self.state.get())
            .field("observers", &self.hub.len())
            .finish()
    }
}
