//! # Dispatch
//!
//! A typed, synchronous, in-process publish/subscribe dispatcher.
//!
//! ## Overview
//!
//! Producers publish plain Rust values; consumers register callbacks for a
//! concrete event type and receive every value of that type for as long as
//! they hold the returned [`Subscription`].
//!
//! The interesting part is lifetime coordination. The dispatcher owns one
//! channel per event type; subscriptions point back at their channel through
//! a [`Weak`](std::sync::Weak) reference only. Either side may be dropped
//! first, cancellation is idempotent, and callbacks may subscribe, cancel or
//! publish from inside a dispatch pass.
//!
//! ## Features
//!
//! * **Type-Safe**: Events are identified by their Rust type ([`EventTypeId`]).
//! * **Scoped delivery**: Dropping a [`Subscription`] ends delivery.
//! * **Teardown safe**: Outstanding subscriptions survive the [`Dispatcher`]
//!   and simply read as inactive.
//! * **Re-entrant**: Each publish iterates a snapshot of its subscribers.
//! * **Bounded recursion**: Nested publishes are capped per thread
//!   ([`DispatcherConfig::max_dispatch_depth`]).
//!
//! # Example
//!
//! ```rust
//! use std::sync::{Arc, Mutex};
//! use tether_dispatch::{DispatchError, Dispatcher};
//!
//! struct SomeEvent { value: i32 }
//!
//! fn main() -> Result<(), DispatchError> {
//!     let dispatcher = Dispatcher::new();
//!     let seen = Arc::new(Mutex::new(Vec::new()));
//!
//!     {
//!         let log = Arc::clone(&seen);
//!         let _sub = dispatcher.subscribe(move |event: Arc<SomeEvent>| {
//!             log.lock().unwrap().push(event.value);
//!         })?;
//!
//!         for value in 0..3 {
//!             dispatcher.publish(SomeEvent { value })?;
//!         }
//!     }
//!
//!     // The subscription went out of scope above.
//!     dispatcher.publish(SomeEvent { value: 3 })?;
//!
//!     assert_eq!(*seen.lock().unwrap(), vec![0, 1, 2]);
//!     Ok(())
//! }
//! ```

mod channel;
mod config;
mod dispatcher;
mod error;
mod event;
mod subscription;
mod token;

pub use config::{DEFAULT_MAX_DISPATCH_DEPTH, DispatcherConfig};
pub use dispatcher::{Dispatcher, DispatcherHandle};
pub use error::{DispatchError, DispatchErrorExt};
pub use event::Event;
pub use subscription::{Cancel, Subscription, SubscriptionSet};
pub use token::{EventTypeId, SubscriptionId};
