//! Blinc Observer Hub
//!
//! A small building block for observable objects: a per-object registry of
//! non-owning observer references that can be safely mutated while its
//! observers are being notified.
//!
//! - [`ObserverHub`] - ordered `Weak` registry with reentrancy-safe iteration
//! - [`ObserverToken`] - RAII registration handle
//! - [`MisusePolicy`] - how double registration and stray removals are reported
//!
//! # Example
//!
//! ```rust
//! use std::rc::Rc;
//! use blinc_hub::ObserverHub;
//!
//! trait Listener {
//!     fn changed(&self, value: i32);
//! }
//!
//! struct Printer;
//!
//! impl Listener for Printer {
//!     fn changed(&self, value: i32) {
//!         println!("value is now {value}");
//!     }
//! }
//!
//! let hub: ObserverHub<dyn Listener> = ObserverHub::new("counter");
//! let printer: Rc<dyn Listener> = Rc::new(Printer);
//!
//! hub.add(&printer).unwrap();
//! hub.for_each(|listener| listener.changed(42));
//! hub.remove(&printer).unwrap();
//! assert!(hub.is_empty());
//! ```

mod error;
mod hub;
mod token;

pub use error::{HubError, Result};
pub use hub::{MisusePolicy, ObserverHub, ObserverId};
pub use token::ObserverToken;
