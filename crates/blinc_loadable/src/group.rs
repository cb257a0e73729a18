//! Loadable groups
//!
//! [`LoadableGroup`] treats several loadables as one. Its state is derived
//! from the children:
//!
//! | Policy   | Any child failed | Any child syncing or idle | Otherwise   |
//! |----------|------------------|---------------------------|-------------|
//! | `Strict` | `Failed`         | `Syncing`                 | `Succeeded` |
//! | `Never`  | (ignored)        | `Syncing`                 | `Succeeded` |
//!
//! Contents are available when every child has its contents available. The
//! group notifies its observers when the derived state changes and, once all
//! children have contents, on every child notification, so observers can pick
//! up fresh per-child values after the aggregate has settled.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use smallvec::SmallVec;

use crate::error::SyncError;
use crate::loadable::{Loadable, LoadableObserver, LoadableState, PureLoadable};
use crate::state::StateCell;

/// How failures of children affect the state of a group
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum FailurePolicy {
    /// The group fails as soon as any child fails
    #[default]
    Strict,
    /// The group never fails; callers inspect the children themselves
    Never,
}

/// A child of a [`LoadableGroup`]
///
/// Only `Syncable` members receive `sync` calls forwarded by the group.
#[derive(Clone)]
pub enum GroupMember {
    Pure(Rc<dyn PureLoadable>),
    Syncable(Rc<dyn Loadable>),
}

impl GroupMember {
    pub fn pure<L: PureLoadable + 'static>(loadable: Rc<L>) -> Self {
        GroupMember::Pure(loadable)
    }

    pub fn syncable<L: Loadable + 'static>(loadable: Rc<L>) -> Self {
        GroupMember::Syncable(loadable)
    }

    pub fn loadable_state(&self) -> LoadableState {
        match self {
            GroupMember::Pure(l) => l.loadable_state(),
            GroupMember::Syncable(l) => l.loadable_state(),
        }
    }

    pub fn error(&self) -> Option<SyncError> {
        match self {
            GroupMember::Pure(l) => l.error(),
            GroupMember::Syncable(l) => l.error(),
        }
    }

    pub fn is_contents_available(&self) -> bool {
        match self {
            GroupMember::Pure(l) => l.is_contents_available(),
            GroupMember::Syncable(l) => l.is_contents_available(),
        }
    }

    fn add_observer(&self, observer: &Rc<dyn LoadableObserver>) -> bool {
        match self {
            GroupMember::Pure(l) => l.add_observer(observer),
            GroupMember::Syncable(l) => l.add_observer(observer),
        }
    }

    fn remove_observer(&self, observer: &Rc<dyn LoadableObserver>) -> bool {
        match self {
            GroupMember::Pure(l) => l.remove_observer(observer),
            GroupMember::Syncable(l) => l.remove_observer(observer),
        }
    }

    fn as_loadable(&self) -> Option<&Rc<dyn Loadable>> {
        match self {
            GroupMember::Pure(_) => None,
            GroupMember::Syncable(l) => Some(l),
        }
    }

    /// Identity of the underlying loadable
    fn addr(&self) -> *const () {
        match self {
            GroupMember::Pure(l) => Rc::as_ptr(l) as *const (),
            GroupMember::Syncable(l) => Rc::as_ptr(l) as *const (),
        }
    }
}

impl From<Rc<dyn PureLoadable>> for GroupMember {
    fn from(loadable: Rc<dyn PureLoadable>) -> Self {
        GroupMember::Pure(loadable)
    }
}

impl From<Rc<dyn Loadable>> for GroupMember {
    fn from(loadable: Rc<dyn Loadable>) -> Self {
        GroupMember::Syncable(loadable)
    }
}

impl fmt::Debug for GroupMember {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self {
            GroupMember::Pure(_) => "Pure",
            GroupMember::Syncable(_) => "Syncable",
        };
        f.debug_struct(kind)
            .field("state", &self.loadable_state())
            .field("contents_available", &self.is_contents_available())
            .finish()
    }
}

/// Observer registered on every child; forwards to the group
struct GroupRelay(Weak<LoadableGroup>);

impl LoadableObserver for GroupRelay {
    fn loadable_did_change(&self, _child: &dyn PureLoadable) {
        if let Some(group) = self.0.upgrade() {
            group.update(true);
        }
    }
}

type GroupHook = Rc<dyn Fn(&LoadableGroup)>;

/// Several loadables observed as one
pub struct LoadableGroup {
    cell: StateCell,
    policy: FailurePolicy,
    members: RefCell<Vec<GroupMember>>,
    relay: Rc<dyn LoadableObserver>,
    on_group_change: RefCell<Option<GroupHook>>,
}

impl LoadableGroup {
    /// Create a group and compute its state right away
    pub fn new(members: Vec<GroupMember>, policy: FailurePolicy) -> Rc<Self> {
        let group = Rc::new_cyclic(|this: &Weak<LoadableGroup>| {
            let relay: Rc<dyn LoadableObserver> = Rc::new(GroupRelay(this.clone()));
            LoadableGroup {
                cell: StateCell::new("LoadableGroup"),
                policy,
                members: RefCell::new(Vec::new()),
                relay,
                on_group_change: RefCell::new(None),
            }
        });
        group.replace_members(members, false);
        group
    }

    /// Group of read-only children; `sync` has nothing to forward to
    pub fn pure(children: Vec<Rc<dyn PureLoadable>>, policy: FailurePolicy) -> Rc<Self> {
        Self::new(children.into_iter().map(GroupMember::Pure).collect(), policy)
    }

    pub fn failure_policy(&self) -> FailurePolicy {
        self.policy
    }

    pub fn members(&self) -> Vec<GroupMember> {
        self.members.borrow().clone()
    }

    /// Replace all children, e.g. once lazily created children exist
    ///
    /// Observation moves from the old children to the new ones and the state
    /// is recomputed immediately.
    pub fn set_members(&self, members: Vec<GroupMember>) {
        self.replace_members(members, true);
    }

    /// Called after the group's state was recomputed and before observers
    /// are notified
    pub fn on_group_change(&self, f: impl Fn(&LoadableGroup) + 'static) {
        self.on_group_change.replace(Some(Rc::new(f)));
    }

    fn replace_members(&self, members: Vec<GroupMember>, notify: bool) {
        let old = self.members.replace(members);
        for member in unique(&old) {
            member.remove_observer(&self.relay);
        }
        let current = self.members();
        for member in unique(&current) {
            member.add_observer(&self.relay);
        }
        tracing::debug!(
            members = current.len(),
            policy = ?self.policy,
            "loadable group members replaced"
        );
        self.update(notify);
    }

    fn update(&self, notify: bool) {
        let members = self.members();
        let state = aggregate(&members, self.policy);
        let changed = state != self.cell.state();
        if changed {
            self.cell.force_state(state);
        }
        if !notify {
            return;
        }
        if changed || members.iter().all(GroupMember::is_contents_available) {
            let hook = self.on_group_change.borrow().clone();
            if let Some(hook) = hook {
                hook(self);
            }
            self.cell.notify(self);
        }
    }
}

fn aggregate(members: &[GroupMember], policy: FailurePolicy) -> LoadableState {
    let mut failed = false;
    let mut pending = false;
    for member in members {
        match member.loadable_state() {
            LoadableState::Failed => failed = true,
            LoadableState::Syncing | LoadableState::Idle => pending = true,
            LoadableState::Succeeded => {}
        }
    }
    match policy {
        FailurePolicy::Strict if failed => LoadableState::Failed,
        _ if pending => LoadableState::Syncing,
        _ => LoadableState::Succeeded,
    }
}

/// Members with duplicates removed; a child listed twice is observed once
fn unique(members: &[GroupMember]) -> SmallVec<[&GroupMember; 8]> {
    let mut seen: SmallVec<[*const (); 8]> = SmallVec::new();
    let mut out = SmallVec::new();
    for member in members {
        let addr = member.addr();
        if !seen.contains(&addr) {
            seen.push(addr);
            out.push(member);
        }
    }
    out
}

impl PureLoadable for LoadableGroup {
    fn loadable_state(&self) -> LoadableState {
        self.cell.state()
    }

    /// The error of the first failed child while a strict group is failed
    fn error(&self) -> Option<SyncError> {
        if self.policy != FailurePolicy::Strict || self.cell.state() != LoadableState::Failed {
            return None;
        }
        self.members()
            .iter()
            .find(|m| m.loadable_state() == LoadableState::Failed)
            .and_then(GroupMember::error)
    }

    fn is_contents_available(&self) -> bool {
        self.members().iter().all(GroupMember::is_contents_available)
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

impl Loadable for LoadableGroup {
    fn sync(&self) {
        for member in self.members() {
            if let Some(loadable) = member.as_loadable() {
                loadable.sync();
            }
        }
    }

    fn needs_sync(&self) -> bool {
        self.members()
            .iter()
            .filter_map(GroupMember::as_loadable)
            .any(|l| l.needs_sync())
    }

    fn sync_if_needed(&self) {
        for member in self.members() {
            if let Some(loadable) = member.as_loadable() {
                loadable.sync_if_needed();
            }
        }
    }
}

impl Drop for LoadableGroup {
    fn drop(&mut self) {
        let members = std::mem::take(self.members.get_mut());
        for member in unique(&members) {
            member.remove_observer(&self.relay);
        }
    }
}

impl fmt::Debug for LoadableGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadableGroup")
            .field("state", &self.cell.state())
            .field("policy", &self.policy)
            .field("members", &self.members.borrow().len())
            .finish()
    }
}
