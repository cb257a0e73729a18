//! Repeating timers
//!
//! Autosync never spawns threads or touches a runtime directly. It asks a
//! [`TimerScheduler`] for repeating callbacks, which run on the same thread
//! as the loadables they refresh.
//!
//! - [`ManualScheduler`] - virtual clock advanced by the host loop or tests
//! - [`TokioScheduler`] - `spawn_local` tasks on a tokio `LocalSet`
//!   (feature `tokio`)

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;

use slotmap::{new_key_type, SlotMap};

new_key_type! {
    /// Handle to a scheduled repeating timer
    pub struct TimerId;
}

/// Callback invoked on every tick
pub type TimerCallback = Box<dyn FnMut()>;

/// Shortest period a scheduler will accept
pub const MIN_PERIOD: Duration = Duration::from_millis(1);

/// Source of repeating timers
pub trait TimerScheduler {
    /// Call `callback` every `period`, first after one full period
    fn schedule_repeating(&self, period: Duration, callback: TimerCallback) -> TimerId;

    /// Stop a timer; returns `false` when it was not scheduled
    ///
    /// The callback never runs again once this returns.
    fn cancel(&self, id: TimerId) -> bool;
}

fn clamp_period(period: Duration) -> Duration {
    if period < MIN_PERIOD {
        tracing::warn!(?period, min = ?MIN_PERIOD, "timer period too short, clamped");
        MIN_PERIOD
    } else {
        period
    }
}

// =============================================================================
// MANUAL SCHEDULER
// =============================================================================

struct ManualTimer {
    period: Duration,
    next_due: Duration,
    /// Taken out while the callback runs
    callback: Option<TimerCallback>,
}

/// Scheduler driven by an explicit virtual clock
///
/// Nothing fires until [`advance`](Self::advance) is called. Callbacks may
/// schedule or cancel timers, including their own.
pub struct ManualScheduler {
    now: Cell<Duration>,
    timers: RefCell<SlotMap<TimerId, ManualTimer>>,
}

impl ManualScheduler {
    pub fn new() -> Rc<Self> {
        Rc::new(Self {
            now: Cell::new(Duration::ZERO),
            timers: RefCell::new(SlotMap::with_key()),
        })
    }

    /// Virtual time elapsed since creation
    pub fn now(&self) -> Duration {
        self.now.get()
    }

    pub fn active_timers(&self) -> usize {
        self.timers.borrow().len()
    }

    pub fn is_scheduled(&self, id: TimerId) -> bool {
        self.timers.borrow().contains_key(id)
    }

    pub fn period(&self, id: TimerId) -> Option<Duration> {
        self.timers.borrow().get(id).map(|t| t.period)
    }

    /// Move the clock forward, firing due timers in deadline order
    ///
    /// Returns the number of callbacks that ran.
    pub fn advance(&self, by: Duration) -> usize {
        let target = self.now.get() + by;
        let mut fired = 0;

        while let Some((id, due)) = self.next_due(target) {
            self.now.set(due);
            let callback = self
                .timers
                .borrow_mut()
                .get_mut(id)
                .and_then(|t| t.callback.take());
            let Some(mut callback) = callback else {
                continue;
            };

            callback();
            fired += 1;

            // Cancelled during the callback: the callback is dropped here
            if let Some(timer) = self.timers.borrow_mut().get_mut(id) {
                timer.next_due = due + timer.period;
                timer.callback = Some(callback);
            }
        }

        self.now.set(target);
        fired
    }

    fn next_due(&self, target: Duration) -> Option<(TimerId, Duration)> {
        self.timers
            .borrow()
            .iter()
            .filter(|(_, t)| t.callback.is_some() && t.next_due <= target)
            .min_by_key(|(_, t)| t.next_due)
            .map(|(id, t)| (id, t.next_due))
    }
}

impl TimerScheduler for ManualScheduler {
    fn schedule_repeating(&self, period: Duration, callback: TimerCallback) -> TimerId {
        let period = clamp_period(period);
        let next_due = self.now.get() + period;
        self.timers.borrow_mut().insert(ManualTimer {
            period,
            next_due,
            callback: Some(callback),
        })
    }

    fn cancel(&self, id: TimerId) -> bool {
        // Dropping a callback can run arbitrary destructors, keep it outside
        // the borrow
        let removed = self.timers.borrow_mut().remove(id);
        removed.is_some()
    }
}

impl std::fmt::Debug for ManualScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManualScheduler")
            .field("now", &self.now.get())
            .field("timers", &self.timers.borrow().len())
            .finish()
    }
}

// =============================================================================
// TOKIO SCHEDULER
// =============================================================================

#[cfg(feature = "tokio")]
pub use tokio_scheduler::TokioScheduler;

#[cfg(feature = "tokio")]
mod tokio_scheduler {
    use super::*;
    use tokio::task::JoinHandle;

    /// Scheduler running each timer as a local tokio task
    ///
    /// Must be used from within a [`tokio::task::LocalSet`]; timers are
    /// aborted when cancelled or when the scheduler is dropped.
    #[derive(Default)]
    pub struct TokioScheduler {
        tasks: RefCell<SlotMap<TimerId, JoinHandle<()>>>,
    }

    impl TokioScheduler {
        pub fn new() -> Rc<Self> {
            Rc::new(Self::default())
        }

        pub fn active_timers(&self) -> usize {
            self.tasks.borrow().len()
        }
    }

    impl TimerScheduler for TokioScheduler {
        fn schedule_repeating(&self, period: Duration, mut callback: TimerCallback) -> TimerId {
            let period = clamp_period(period);
            let task = tokio::task::spawn_local(async move {
                loop {
                    tokio::time::sleep(period).await;
                    callback();
                }
            });
            self.tasks.borrow_mut().insert(task)
        }

        fn cancel(&self, id: TimerId) -> bool {
            let task = self.tasks.borrow_mut().remove(id);
            match task {
                Some(task) => {
                    task.abort();
                    true
                }
                None => false,
            }
        }
    }

    impl Drop for TokioScheduler {
        fn drop(&mut self) {
            for (_, task) in self.tasks.get_mut().drain() {
                task.abort();
            }
        }
    }

    impl std::fmt::Debug for TokioScheduler {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.debug_struct("TokioScheduler")
                .field("timers", &self.tasks.borrow().len())
                .finish()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ticker(scheduler: &ManualScheduler, secs: u64) -> (TimerId, Rc<Cell<u32>>) {
        let ticks = Rc::new(Cell::new(0));
        let ticks_clone = Rc::clone(&ticks);
        let id = scheduler.schedule_repeating(
            Duration::from_secs(secs),
            Box::new(move || ticks_clone.set(ticks_clone.get() + 1)),
        );
        (id, ticks)
    }

    #[test]
    fn test_manual_fires_after_full_period() {
        let scheduler = ManualScheduler::new();
        let (_id, ticks) = ticker(&scheduler, 10);

        assert_eq!(scheduler.advance(Duration::from_secs(9)), 0);
        assert_eq!(scheduler.advance(Duration::from_secs(1)), 1);
        assert_eq!(scheduler.advance(Duration::from_secs(25)), 2);
        assert_eq!(ticks.get(), 3);
        assert_eq!(scheduler.now(), Duration::from_secs(35));
    }

    #[test]
    fn test_manual_deadline_order() {
        let scheduler = ManualScheduler::new();
        let order = Rc::new(RefCell::new(Vec::new()));
        for (name, secs) in [("slow", 3), ("fast", 2)] {
            let order = Rc::clone(&order);
            scheduler.schedule_repeating(
                Duration::from_secs(secs),
                Box::new(move || order.borrow_mut().push(name)),
            );
        }

        scheduler.advance(Duration::from_secs(6));
        assert_eq!(&order.borrow()[..3], &["fast", "slow", "fast"]);
        assert_eq!(order.borrow().len(), 5);
    }

    #[test]
    fn test_manual_cancel() {
        let scheduler = ManualScheduler::new();
        let (id, ticks) = ticker(&scheduler, 1);
        assert!(scheduler.cancel(id));
        assert!(!scheduler.cancel(id));
        scheduler.advance(Duration::from_secs(5));
        assert_eq!(ticks.get(), 0);
        assert_eq!(scheduler.active_timers(), 0);
    }

    #[test]
    fn test_manual_callback_cancels_itself() {
        let scheduler = ManualScheduler::new();
        let ticks = Rc::new(Cell::new(0));
        let own_id: Rc<Cell<Option<TimerId>>> = Rc::new(Cell::new(None));

        let weak = Rc::downgrade(&scheduler);
        let ticks_clone = Rc::clone(&ticks);
        let own_id_clone = Rc::clone(&own_id);
        let id = scheduler.schedule_repeating(
            Duration::from_secs(1),
            Box::new(move || {
                ticks_clone.set(ticks_clone.get() + 1);
                if let (Some(scheduler), Some(id)) = (weak.upgrade(), own_id_clone.get()) {
                    scheduler.cancel(id);
                }
            }),
        );
        own_id.set(Some(id));

        scheduler.advance(Duration::from_secs(10));
        assert_eq!(ticks.get(), 1);
        assert!(!scheduler.is_scheduled(id));
    }

    #[test]
    fn test_zero_period_clamped() {
        let scheduler = ManualScheduler::new();
        let (id, _ticks) = ticker(&scheduler, 0);
        assert_eq!(scheduler.period(id), Some(MIN_PERIOD));
    }

    #[cfg(feature = "tokio")]
    #[tokio::test(start_paused = true)]
    async fn test_tokio_scheduler_ticks_until_cancelled() {
        let local = tokio::task::LocalSet::new();
        local
            .run_until(async {
                let scheduler = TokioScheduler::new();
                let ticks = Rc::new(Cell::new(0));
                let ticks_clone = Rc::clone(&ticks);
                let id = scheduler.schedule_repeating(
                    Duration::from_secs(10),
                    Box::new(move || ticks_clone.set(ticks_clone.get() + 1)),
                );

                tokio::time::sleep(Duration::from_secs(35)).await;
                assert_eq!(ticks.get(), 3);

                assert!(scheduler.cancel(id));
                assert_eq!(scheduler.active_timers(), 0);
                tokio::time::sleep(Duration::from_secs(30)).await;
                assert_eq!(ticks.get(), 3);
            })
            .await;
    }
}
