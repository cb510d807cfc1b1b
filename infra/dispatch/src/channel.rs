use crate::event::{Callback, Event};
use crate::token::{EventTypeId, SubscriptionId};
use fxhash::FxHashMap;
use parking_lot::Mutex;
use std::any::Any;
use std::borrow::Cow;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::trace;

struct Subscribers<T> {
    open: bool,
    entries: FxHashMap<SubscriptionId, Callback<T>>,
}

/// The table of active subscriptions for one event type.
///
/// The lock is only ever held for map bookkeeping, never while a callback
/// runs, so callbacks are free to register, unregister or publish again.
/// Callbacks leaving the map are always dropped after the lock is released:
/// dropping one may drop a [`Subscription`](crate::Subscription) it captured,
/// which re-enters [`Channel::unregister`].
pub(crate) struct Channel<T: Event> {
    state: Mutex<Subscribers<T>>,
    next_id: AtomicU64,
}

/// Outcome of one dispatch pass.
#[derive(Debug, Default)]
pub(crate) struct Delivery {
    pub(crate) delivered: usize,
    pub(crate) panics: Vec<Cow<'static, str>>,
}

impl<T: Event> Channel<T> {
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(Subscribers { open: true, entries: FxHashMap::default() }),
            next_id: AtomicU64::new(0),
        }
    }

    /// Stores `callback` under a fresh token. A closed channel hands out the
    /// token but keeps nothing, so the resulting handle is born inactive.
    pub(crate) fn register(&self, callback: Callback<T>) -> SubscriptionId {
        let id = SubscriptionId::new(self.next_id.fetch_add(1, Ordering::Relaxed) + 1);

        let rejected = {
            let mut state = self.state.lock();
            if state.open {
                state.entries.insert(id, callback);
                None
            } else {
                Some(callback)
            }
        };

        if rejected.is_some() {
            trace!(event = std::any::type_name::<T>(), %id, "Registration on closed channel ignored");
        } else {
            trace!(event = std::any::type_name::<T>(), %id, "Subscriber registered");
        }
        id
    }

    /// Removes the entry for `id`. Returns `false` if there was none.
    pub(crate) fn unregister(&self, id: SubscriptionId) -> bool {
        let removed = self.state.lock().entries.remove(&id);
        let found = removed.is_some();
        drop(removed);

        if found {
            trace!(event = std::any::type_name::<T>(), %id, "Subscriber removed");
        }
        found
    }

    /// Invokes every callback registered when the call began.
    ///
    /// With `isolate_panics` each callback runs under `catch_unwind`; without
    /// it a panic unwinds out of this call, skipping the rest of the pass.
    pub(crate) fn publish(&self, event: &Arc<T>, isolate_panics: bool) -> Delivery {
        let snapshot: Vec<Callback<T>> = self.state.lock().entries.values().cloned().collect();
        let mut delivery = Delivery::default();

        for callback in &snapshot {
            if isolate_panics {
                let outcome = catch_unwind(AssertUnwindSafe(|| callback(Arc::clone(event))));
                if let Err(payload) = outcome {
                    delivery.panics.push(panic_message(payload.as_ref()));
                    continue;
                }
            } else {
                callback(Arc::clone(event));
            }
            delivery.delivered += 1;
        }

        delivery
    }

    /// Closes the channel: first marks it closed so that every handle bound to
    /// it reads as inactive, then releases the subscriber storage.
    pub(crate) fn close(&self) -> usize {
        let drained = {
            let mut state = self.state.lock();
            state.open = false;
            std::mem::take(&mut state.entries)
        };
        let count = drained.len();
        drop(drained);
        count
    }

    pub(crate) fn is_open(&self) -> bool {
        self.state.lock().open
    }

    pub(crate) fn len(&self) -> usize {
        self.state.lock().entries.len()
    }
}

impl<T: Event> fmt::Debug for Channel<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("Channel")
            .field("event", &std::any::type_name::<T>())
            .field("open", &state.open)
            .field("subscribers", &state.entries.len())
            .finish_non_exhaustive()
    }
}

/// Type-erased view of a [`Channel`], as stored by the dispatcher.
pub(crate) trait ErasedChannel: Send + Sync + fmt::Debug {
    fn event_type(&self) -> EventTypeId;

    fn len(&self) -> usize;

    fn close(&self) -> usize;

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

impl<T: Event> ErasedChannel for Channel<T> {
    fn event_type(&self) -> EventTypeId {
        EventTypeId::of::<T>()
    }

    fn len(&self) -> usize {
        Self::len(self)
    }

    fn close(&self) -> usize {
        Self::close(self)
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> Cow<'static, str> {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        Cow::Borrowed(message)
    } else if let Some(message) = payload.downcast_ref::<String>() {
        Cow::Owned(message.clone())
    } else {
        Cow::Borrowed("non-string panic payload")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Weak;
    use std::sync::atomic::AtomicUsize;

    #[derive(Debug)]
    struct Ping(u32);

    fn counter() -> (Arc<AtomicUsize>, Callback<Ping>) {
        let hits = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&hits);
        (hits, Arc::new(move |_: Arc<Ping>| {
            seen.fetch_add(1, Ordering::SeqCst);
        }))
    }

    #[test]
    fn test_register_allocates_fresh_ids() {
        let channel = Channel::<Ping>::new();
        let (_, a) = counter();
        let (_, b) = counter();

        let first = channel.register(a);
        let second = channel.register(b);

        assert_ne!(first, second);
        assert_eq!(first.get(), 1);
        assert_eq!(channel.len(), 2);
    }

    #[test]
    fn test_unregister_unknown_id_is_noop() {
        let channel = Channel::<Ping>::new();
        let (_, cb) = counter();
        let id = channel.register(cb);

        assert!(channel.unregister(id));
        assert!(!channel.unregister(id));
        assert!(!channel.unregister(SubscriptionId::new(99)));
        assert_eq!(channel.len(), 0);
    }

    #[test]
    fn test_publish_reaches_every_subscriber() {
        let channel = Channel::<Ping>::new();
        let (a_hits, a) = counter();
        let (b_hits, b) = counter();
        channel.register(a);
        channel.register(b);

        let delivery = channel.publish(&Arc::new(Ping(1)), false);

        assert_eq!(delivery.delivered, 2);
        assert!(delivery.panics.is_empty());
        assert_eq!(a_hits.load(Ordering::SeqCst), 1);
        assert_eq!(b_hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_publish_uses_snapshot_when_callback_unregisters_peer() {
        let channel = Arc::new(Channel::<Ping>::new());
        let victim_hits = Arc::new(AtomicUsize::new(0));
        let victim_id = Arc::new(Mutex::new(None::<SubscriptionId>));

        let weak: Weak<Channel<Ping>> = Arc::downgrade(&channel);
        let target = Arc::clone(&victim_id);
        channel.register(Arc::new(move |_: Arc<Ping>| {
            if let (Some(channel), Some(id)) = (weak.upgrade(), *target.lock()) {
                channel.unregister(id);
            }
        }));

        let hits = Arc::clone(&victim_hits);
        let id = channel.register(Arc::new(move |_: Arc<Ping>| {
            hits.fetch_add(1, Ordering::SeqCst);
        }));
        *victim_id.lock() = Some(id);

        let first = channel.publish(&Arc::new(Ping(1)), false);
        assert_eq!(first.delivered, 2, "snapshot taken at publish start");
        assert_eq!(victim_hits.load(Ordering::SeqCst), 1);

        let second = channel.publish(&Arc::new(Ping(2)), false);
        assert_eq!(second.delivered, 1);
        assert_eq!(victim_hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_register_during_publish_joins_next_pass() {
        let channel = Arc::new(Channel::<Ping>::new());
        let late_hits = Arc::new(AtomicUsize::new(0));

        let weak = Arc::downgrade(&channel);
        let hits = Arc::clone(&late_hits);
        channel.register(Arc::new(move |event: Arc<Ping>| {
            if event.0 == 1
                && let Some(channel) = weak.upgrade()
            {
                let hits = Arc::clone(&hits);
                channel.register(Arc::new(move |_: Arc<Ping>| {
                    hits.fetch_add(1, Ordering::SeqCst);
                }));
            }
        }));

        assert_eq!(channel.publish(&Arc::new(Ping(1)), false).delivered, 1);
        assert_eq!(late_hits.load(Ordering::SeqCst), 0);

        assert_eq!(channel.publish(&Arc::new(Ping(2)), false).delivered, 2);
        assert_eq!(late_hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_close_invalidates_and_rejects_registration() {
        let channel = Channel::<Ping>::new();
        let (hits, a) = counter();
        channel.register(a);
        assert!(channel.is_open());

        assert_eq!(channel.close(), 1);
        assert!(!channel.is_open());
        assert_eq!(channel.len(), 0);

        let (_, late) = counter();
        channel.register(late);
        assert_eq!(channel.len(), 0);

        assert_eq!(channel.publish(&Arc::new(Ping(1)), false).delivered, 0);
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        assert_eq!(channel.close(), 0);
    }

    #[test]
    fn test_isolated_panic_does_not_stop_pass() {
        let channel = Channel::<Ping>::new();
        channel.register(Arc::new(|_: Arc<Ping>| panic!("subscriber failed")));
        let (hits, ok) = counter();
        channel.register(ok);

        let delivery = channel.publish(&Arc::new(Ping(7)), true);

        assert_eq!(delivery.delivered, 1);
        assert_eq!(delivery.panics, vec![Cow::Borrowed("subscriber failed")]);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(channel.len(), 2, "a panicking subscriber stays registered");
    }

    #[test]
    fn test_dropping_callback_may_reenter_unregister() {
        struct Unhook {
            channel: Weak<Channel<Ping>>,
            id: Arc<Mutex<Option<SubscriptionId>>>,
        }

        impl Drop for Unhook {
            fn drop(&mut self) {
                if let (Some(channel), Some(id)) = (self.channel.upgrade(), *self.id.lock()) {
                    channel.unregister(id);
                }
            }
        }

        let channel = Arc::new(Channel::<Ping>::new());
        let (_, other) = counter();
        let other_id = channel.register(other);

        let unhook = Unhook {
            channel: Arc::downgrade(&channel),
            id: Arc::new(Mutex::new(Some(other_id))),
        };
        let id = channel.register(Arc::new(move |_: Arc<Ping>| {
            let _held = &unhook;
        }));

        assert!(channel.unregister(id));
        assert_eq!(channel.len(), 0, "dropping the callback released its peer");
    }

    #[test]
    fn test_erased_channel_round_trip() {
        let channel: Arc<dyn ErasedChannel> = Arc::new(Channel::<Ping>::new());
        assert_eq!(channel.event_type(), EventTypeId::of::<Ping>());
        assert_eq!(ErasedChannel::len(channel.as_ref()), 0);

        let typed = channel.into_any().downcast::<Channel<Ping>>();
        assert!(typed.is_ok());
    }
}
