//! Blinc Loadables
//!
//! Observable state machines for values that are fetched asynchronously and
//! refreshed later:
//!
//! - **Loadable**: `Idle`, `Syncing`, `Succeeded` or `Failed`, plus an error
//!   and a contents-available flag, with change notifications
//! - **Groups**: several loadables observed as one, with a failure policy
//! - **Proxies**: stand-ins for loadables that do not exist yet
//! - **Autosync**: timer-driven refresh aware of foreground/background
//! - **Test double**: [`testing::TestLoadable`] for consumers' tests
//!
//! Everything here is single-threaded: loadables are shared through `Rc`,
//! and the actual async work must resume on the thread that owns them.
//!
//! # Example
//!
//! ```rust
//! use std::rc::Rc;
//! use blinc_loadable::{
//!     BasicLoadable, FailurePolicy, GroupMember, Loadable, LoadableGroup, LoadableState,
//!     LoadableSubscription, PureLoadable, SyncError,
//! };
//!
//! let user = BasicLoadable::new(|ctx| {
//!     ctx.did_sync_successfully();
//! });
//! let avatar = BasicLoadable::new(|ctx| {
//!     ctx.failed_to_sync(SyncError::with_code(404, "no avatar"));
//! });
//!
//! let profile = LoadableGroup::new(
//!     vec![GroupMember::syncable(Rc::clone(&user)), GroupMember::syncable(Rc::clone(&avatar))],
//!     FailurePolicy::Strict,
//! );
//!
//! let _subscription = LoadableSubscription::new(Some(&profile), |l: &dyn PureLoadable| {
//!     println!("profile is {}", l.loadable_state());
//! });
//!
//! profile.sync();
//! assert_eq!(profile.loadable_state(), LoadableState::Failed);
//! assert_eq!(profile.error().and_then(|e| e.code()), Some(404));
//! ```

pub mod autosync;
mod basic;
mod error;
mod group;
mod loadable;
mod observer;
mod proxy;
mod state;
pub mod testing;

pub use autosync::{AutosyncConfig, AutosyncLoadable, AutosyncSchedule};
pub use basic::{BasicLoadable, BasicLoadableBuilder, BasicPureLoadable, SyncContext};
pub use error::{LoadableError, Result, SyncError};
pub use group::{FailurePolicy, GroupMember, LoadableGroup};
pub use loadable::{Loadable, LoadableObserver, LoadableState, PureLoadable};
pub use observer::LoadableSubscription;
pub use proxy::{LoadableProxy, Proxy, ProxyTarget, PureLoadableProxy};

/// Re-exported for custom observers that want the raw hub
pub use blinc_hub::{MisusePolicy, ObserverHub, ObserverId, ObserverToken};
