//! Registration tokens

use std::cell::RefCell;
use std::fmt;
use std::rc::Weak;

use crate::hub::{HubInner, ObserverId};

/// Keeps an observer registered until removed or dropped
///
/// Returned by [`ObserverHub::subscribe`](crate::ObserverHub::subscribe).
/// The token does not keep the hub alive; removing through a token whose hub
/// is gone, or removing twice, is a no-op.
#[must_use = "dropping the token unregisters the observer"]
pub struct ObserverToken<O: ?Sized> {
    hub: Weak<RefCell<HubInner<O>>>,
    id: Option<ObserverId>,
}

impl<O: ?Sized> ObserverToken<O> {
    pub(crate) fn new(hub: Weak<RefCell<HubInner<O>>>, id: ObserverId) -> Self {
        Self { hub, id: Some(id) }
    }

    /// The registration id, or `None` once removed
    pub fn id(&self) -> Option<ObserverId> {
        self.id
    }

    /// Unregister the observer
    ///
    /// Returns `true` if a registration was actually removed.
    pub fn remove(&mut self) -> bool {
        let Some(id) = self.id.take() else {
            return false;
        };
        match self.hub.upgrade() {
            Some(hub) => hub.borrow_mut().remove_id(id),
            None => false,
        }
    }
}

impl<O: ?Sized> Drop for ObserverToken<O> {
    fn drop(&mut self) {
        self.remove();
    }
}

impl<O: ?Sized> fmt::Debug for ObserverToken<O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObserverToken").field("id", &self.id).finish()
    }
}

#[cfg(test)]
mod tests {
    use crate::{MisusePolicy, ObserverHub};
    use std::rc::Rc;

    #[test]
    fn test_token_removes_on_drop() {
        let hub: ObserverHub<u32> = ObserverHub::new("tokens");
        let observer = Rc::new(7u32);

        let token = hub.subscribe(&observer).unwrap();
        assert!(hub.contains(&observer));
        assert!(token.id().is_some());

        drop(token);
        assert!(hub.is_empty());
    }

    #[test]
    fn test_token_remove_is_idempotent() {
        let hub: ObserverHub<u32> = ObserverHub::new("tokens").with_policy(MisusePolicy::Log);
        let observer = Rc::new(7u32);

        let mut token = hub.subscribe(&observer).unwrap();
        assert!(token.remove());
        assert!(!token.remove());
        assert_eq!(token.id(), None);

        // Removed through the token, so the hub no longer knows the observer
        assert!(hub.remove(&observer).is_err());
    }

    #[test]
    fn test_token_outliving_hub() {
        let hub: ObserverHub<u32> = ObserverHub::new("tokens");
        let observer = Rc::new(7u32);

        let mut token = hub.subscribe(&observer).unwrap();
        drop(hub);
        assert!(!token.remove());
    }

    #[test]
    fn test_token_removed_during_notification() {
        let hub: ObserverHub<u32> = ObserverHub::new("tokens");
        let first = Rc::new(1u32);
        let second = Rc::new(2u32);

        let _first_token = hub.subscribe(&first).unwrap();
        let second_token = std::cell::RefCell::new(Some(hub.subscribe(&second).unwrap()));

        let mut seen = Vec::new();
        hub.for_each(|value| {
            seen.push(*value);
            second_token.borrow_mut().take();
        });
        assert_eq!(seen, vec![1]);
        assert_eq!(hub.len(), 1);
    }
}
