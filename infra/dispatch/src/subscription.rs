use crate::channel::Channel;
use crate::event::Event;
use crate::token::{EventTypeId, SubscriptionId};
use std::fmt;
use std::sync::Weak;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::trace;

/// Keeps one callback registered for as long as it is alive.
///
/// Obtained from [`Dispatcher::subscribe`](crate::Dispatcher::subscribe). The
/// handle never keeps its channel alive: it holds a [`Weak`] reference and
/// asks it, at cancellation time, whether the channel still exists. Handles may
/// therefore outlive the dispatcher, be cancelled any number of times, and be
/// dropped in any order relative to it.
///
/// Cancellation takes `&self`, so a handle can be shared (for example behind
/// an `Arc`) with the very callback it controls.
#[must_use = "dropping a Subscription cancels it immediately"]
pub struct Subscription<T: Event> {
    id: SubscriptionId,
    channel: Weak<Channel<T>>,
    cancelled: AtomicBool,
}

impl<T: Event> Subscription<T> {
    pub(crate) const fn new(id: SubscriptionId, channel: Weak<Channel<T>>) -> Self {
        Self { id, channel, cancelled: AtomicBool::new(false) }
    }

    /// Stops delivery. Once this returns the callback is never invoked by a
    /// later publish. Calling it again, or after the dispatcher is gone, does
    /// nothing.
    pub fn cancel(&self) {
        if self.cancelled.swap(true, Ordering::AcqRel) {
            return;
        }
        match self.channel.upgrade() {
            Some(channel) => {
                channel.unregister(self.id);
            },
            None => {
                trace!(
                    event = std::any::type_name::<T>(),
                    id = %self.id,
                    "Cancelled subscription outlived its channel"
                );
            },
        }
    }

    /// `true` until the subscription is cancelled or its dispatcher is torn down.
    #[must_use]
    pub fn is_active(&self) -> bool {
        !self.cancelled.load(Ordering::Acquire)
            && self.channel.upgrade().is_some_and(|channel| channel.is_open())
    }

    /// The token this subscription was registered under.
    #[must_use]
    pub const fn id(&self) -> SubscriptionId {
        self.id
    }

    /// The event type this subscription listens to.
    #[must_use]
    pub fn event_type(&self) -> EventTypeId {
        EventTypeId::of::<T>()
    }
}

impl<T: Event> Drop for Subscription<T> {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl<T: Event> fmt::Debug for Subscription<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("event", &std::any::type_name::<T>())
            .field("id", &self.id)
            .field("active", &self.is_active())
            .finish()
    }
}

/// Object-safe view of a subscription, independent of its event type.
pub trait Cancel: Send + Sync + fmt::Debug {
    /// See [`Subscription::cancel`].
    fn cancel(&self);

    /// See [`Subscription::is_active`].
    fn is_active(&self) -> bool;

    /// See [`Subscription::id`].
    fn id(&self) -> SubscriptionId;
}

impl<T: Event> Cancel for Subscription<T> {
    fn cancel(&self) {
        Self::cancel(self);
    }

    fn is_active(&self) -> bool {
        Self::is_active(self)
    }

    fn id(&self) -> SubscriptionId {
        Self::id(self)
    }
}

/// Owns subscriptions of any event types and cancels them together.
///
/// Useful for components that listen to several events and want all of them
/// to end with the component. Dropping the set cancels everything it holds.
#[derive(Debug, Default)]
pub struct SubscriptionSet {
    entries: Vec<Box<dyn Cancel>>,
}

impl SubscriptionSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes ownership of `subscription`.
    pub fn insert(&mut self, subscription: impl Cancel + 'static) {
        self.entries.push(Box::new(subscription));
    }

    /// Number of subscriptions held, active or not.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of held subscriptions that still receive events.
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.entries.iter().filter(|entry| entry.is_active()).count()
    }

    /// Cancels and releases every held subscription. Returns how many were
    /// still active.
    pub fn cancel_all(&mut self) -> usize {
        let entries = std::mem::take(&mut self.entries);
        let active = entries.iter().filter(|entry| entry.is_active()).count();
        for entry in &entries {
            entry.cancel();
        }
        active
    }
}

impl<T: Event> Extend<Subscription<T>> for SubscriptionSet {
    fn extend<I: IntoIterator<Item = Subscription<T>>>(&mut self, iter: I) {
        for subscription in iter {
            self.insert(subscription);
        }
    }
}

impl Drop for SubscriptionSet {
    fn drop(&mut self) {
        self.cancel_all();
    }
}
