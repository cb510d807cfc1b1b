use crate::channel::{Channel, ErasedChannel};
use crate::config::DispatcherConfig;
use crate::error::{DispatchError, DispatchErrorExt};
use crate::event::{Callback, Event};
use crate::subscription::Subscription;
use crate::token::EventTypeId;
use fxhash::FxHashMap;
use parking_lot::RwLock;
use std::cell::RefCell;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tracing::{debug, error, trace, warn};

thread_local! {
    /// Publish frames on this thread's stack, per registry address. Entries
    /// are removed when they drop back to zero, so a reused address starts
    /// from a clean count.
    static DISPATCH_DEPTH: RefCell<FxHashMap<usize, usize>> = RefCell::default();
}

/// Marks one publish frame of one registry on the current thread. Restores
/// the counter on drop, including when a callback unwinds.
struct DepthGuard {
    key: usize,
}

impl DepthGuard {
    fn enter(key: usize, limit: usize) -> Result<Self, DispatchError> {
        DISPATCH_DEPTH.with(|depths| {
            let mut depths = depths.borrow_mut();
            let current = depths.entry(key).or_default();
            if *current >= limit {
                let nested = *current;
                if nested == 0 {
                    depths.remove(&key);
                }
                return Err(DispatchError::DepthExceeded {
                    message: format!("{nested} nested publishes in progress (limit {limit})")
                        .into(),
                    context: None,
                });
            }
            *current += 1;
            Ok(Self { key })
        })
    }
}

impl Drop for DepthGuard {
    fn drop(&mut self) {
        DISPATCH_DEPTH.with(|depths| {
            let mut depths = depths.borrow_mut();
            if let Some(current) = depths.get_mut(&self.key) {
                *current = current.saturating_sub(1);
                if *current == 0 {
                    depths.remove(&self.key);
                }
            }
        });
    }
}

#[derive(Debug)]
struct Registry {
    channels: RwLock<FxHashMap<EventTypeId, Arc<dyn ErasedChannel>>>,
    closed: AtomicBool,
    config: DispatcherConfig,
}

impl Registry {
    fn new(config: DispatcherConfig) -> Self {
        Self { channels: RwLock::default(), closed: AtomicBool::new(false), config }
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Identifies this registry in the per-thread depth table.
    fn depth_key(&self) -> usize {
        std::ptr::from_ref(self) as usize
    }

    /// Returns the channel for `T`, creating it on first use.
    fn channel<T: Event>(&self) -> Result<Arc<Channel<T>>, DispatchError> {
        if self.is_closed() {
            return Err(closed_error());
        }

        let key = EventTypeId::of::<T>();
        let existing = self.channels.read().get(&key).cloned();

        let erased = match existing {
            Some(channel) => channel,
            None => {
                let mut channels = self.channels.write();
                if self.is_closed() {
                    return Err(closed_error());
                }
                Arc::clone(channels.entry(key).or_insert_with(|| {
                    trace!(event = key.name(), "Initializing new event channel");
                    let channel: Arc<dyn ErasedChannel> = Arc::new(Channel::<T>::new());
                    channel
                }))
            },
        };

        // One key per type, so this only fails if the map itself is corrupt.
        erased.into_any().downcast::<Channel<T>>().map_err(|_| DispatchError::TypeMismatch {
            message: key.name().into(),
            context: None,
        })
    }

    fn subscribe<T: Event>(&self, callback: Callback<T>) -> Result<Subscription<T>, DispatchError> {
        let channel = self.channel::<T>().context("subscribe")?;
        let id = channel.register(callback);
        Ok(Subscription::new(id, Arc::downgrade(&channel)))
    }

    fn publish<T: Event>(&self, event: Arc<T>) -> Result<usize, DispatchError> {
        let _frame =
            DepthGuard::enter(self.depth_key(), self.config.max_dispatch_depth).inspect_err(|err| {
                warn!(event = std::any::type_name::<T>(), kind = err.kind(), "{err}");
            })?;

        let channel = self.channel::<T>().context("publish")?;
        let delivery = channel.publish(&event, self.config.isolate_panics);

        if let Some(first) = delivery.panics.first() {
            for reason in &delivery.panics {
                error!(event = std::any::type_name::<T>(), %reason, "Subscriber panicked");
            }
            return Err(DispatchError::CallbackPanicked {
                message: format!(
                    "{} of {} subscribers panicked",
                    delivery.panics.len(),
                    delivery.panics.len() + delivery.delivered
                )
                .into(),
                context: Some(first.clone()),
            });
        }

        if delivery.delivered == 0 {
            trace!(event = std::any::type_name::<T>(), "Event dropped: no active subscribers");
        } else {
            trace!(event = std::any::type_name::<T>(), count = delivery.delivered, "Event dispatched");
        }
        Ok(delivery.delivered)
    }

    fn subscriber_count(&self, key: &EventTypeId) -> usize {
        self.channels.read().get(key).map_or(0, |channel| channel.len())
    }

    /// Closes every channel, then releases them. Idempotent.
    fn shutdown(&self) -> usize {
        let drained = {
            let mut channels = self.channels.write();
            self.closed.store(true, Ordering::Release);
            std::mem::take(&mut *channels)
        };

        let invalidated: usize = drained.values().map(|channel| channel.close()).sum();
        let count = drained.len();
        drop(drained);

        if count > 0 {
            debug!(channels = count, subscriptions = invalidated, "Dispatcher shut down");
        }
        count
    }
}

fn closed_error() -> DispatchError {
    DispatchError::Closed { message: "dispatcher has been shut down".into(), context: None }
}

/// Typed publish/subscribe dispatcher.
///
/// Keeps one channel per event type, keyed by [`EventTypeId`] and created on
/// first use. Delivery is synchronous: [`publish`](Self::publish) invokes
/// every matching callback on the calling thread before it returns.
///
/// The dispatcher is owned by the application and deliberately not `Clone`.
/// Callbacks that need to publish or subscribe re-entrantly capture a
/// [`DispatcherHandle`] instead, which does not keep the dispatcher alive.
///
/// Dropping the dispatcher runs [`shutdown`](Self::shutdown): every channel is
/// marked closed before its storage is released, so outstanding
/// [`Subscription`]s simply read as inactive afterwards.
#[derive(Debug)]
pub struct Dispatcher {
    inner: Arc<Registry>,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self { inner: Arc::new(Registry::new(DispatcherConfig::default())) }
    }
}

impl Dispatcher {
    /// Creates a dispatcher with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a dispatcher with a custom configuration.
    ///
    /// # Errors
    /// Returns [`DispatchError::InvalidConfiguration`] if `config` fails validation.
    pub fn with_config(config: DispatcherConfig) -> Result<Self, DispatchError> {
        config.validate()?;
        Ok(Self { inner: Arc::new(Registry::new(config)) })
    }

    /// Registers `callback` for every event of type `T`.
    ///
    /// Delivery continues until the returned [`Subscription`] is cancelled or
    /// dropped.
    ///
    /// # Errors
    /// Returns [`DispatchError::Closed`] after [`shutdown`](Self::shutdown).
    ///
    /// # Examples
    /// ```rust
    /// use std::sync::Arc;
    /// use std::sync::atomic::{AtomicU64, Ordering};
    /// use tether_dispatch::Dispatcher;
    ///
    /// struct UserCreated(u64);
    ///
    /// # fn main() -> Result<(), tether_dispatch::DispatchError> {
    /// let dispatcher = Dispatcher::new();
    /// let last = Arc::new(AtomicU64::new(0));
    ///
    /// let seen = Arc::clone(&last);
    /// let sub = dispatcher.subscribe(move |event: Arc<UserCreated>| {
    ///     seen.store(event.0, Ordering::SeqCst);
    /// })?;
    ///
    /// dispatcher.publish(UserCreated(42))?;
    /// assert_eq!(last.load(Ordering::SeqCst), 42);
    ///
    /// drop(sub);
    /// assert_eq!(dispatcher.publish(UserCreated(7))?, 0);
    /// # Ok(())
    /// # }
    /// ```
    pub fn subscribe<T, F>(&self, callback: F) -> Result<Subscription<T>, DispatchError>
    where
        T: Event,
        F: Fn(Arc<T>) + Send + Sync + 'static,
    {
        self.inner.subscribe(Arc::new(callback))
    }

    /// Delivers `event` to every active subscriber of `T`.
    ///
    /// Returns the number of callbacks invoked; publishing a type without
    /// subscribers returns `Ok(0)`. The set of callbacks is fixed when the
    /// call starts, so subscriptions added or cancelled by a callback only
    /// affect later publishes. No ordering between subscribers is guaranteed.
    ///
    /// # Errors
    /// * [`DispatchError::Closed`] after [`shutdown`](Self::shutdown).
    /// * [`DispatchError::DepthExceeded`] if called from callbacks nested
    ///   deeper than [`DispatcherConfig::max_dispatch_depth`].
    /// * [`DispatchError::CallbackPanicked`] if panic isolation is enabled and
    ///   at least one callback panicked.
    ///
    /// # Panics
    /// Without panic isolation a panicking callback unwinds through this call.
    /// The dispatcher stays consistent; the remaining callbacks of this pass
    /// are skipped.
    pub fn publish<T: Event>(&self, event: T) -> Result<usize, DispatchError> {
        self.inner.publish(Arc::new(event))
    }

    /// Publishes an already shared event without re-wrapping it.
    ///
    /// # Errors
    /// Same as [`publish`](Self::publish).
    pub fn publish_arc<T: Event>(&self, event: Arc<T>) -> Result<usize, DispatchError> {
        self.inner.publish(event)
    }

    /// Number of active subscriptions for `T`.
    #[must_use]
    pub fn subscriber_count<T: Event>(&self) -> usize {
        self.inner.subscriber_count(&EventTypeId::of::<T>())
    }

    /// `true` if a channel for `T` has been created.
    #[must_use]
    pub fn contains<T: Event>(&self) -> bool {
        self.inner.channels.read().contains_key(&EventTypeId::of::<T>())
    }

    /// Number of event types with a channel.
    #[must_use]
    pub fn channel_count(&self) -> usize {
        self.inner.channels.read().len()
    }

    #[must_use]
    pub fn config(&self) -> &DispatcherConfig {
        &self.inner.config
    }

    /// `true` once [`shutdown`](Self::shutdown) has run.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }

    /// Returns a non-owning handle suitable for capture inside callbacks.
    #[must_use]
    pub fn handle(&self) -> DispatcherHandle {
        DispatcherHandle { inner: Arc::downgrade(&self.inner) }
    }

    /// Closes every channel and refuses further subscribe and publish calls.
    ///
    /// Returns the number of event channels that were closed. Calling it again
    /// returns `0`.
    pub fn shutdown(&self) -> usize {
        self.inner.shutdown()
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        self.inner.shutdown();
    }
}

/// Weak handle to a [`Dispatcher`].
///
/// Cheap to clone and safe to capture in callbacks: it never extends the
/// dispatcher's lifetime, so no ownership cycle can form through it. Every
/// operation fails with [`DispatchError::Closed`] once the dispatcher is gone.
#[derive(Debug, Clone)]
pub struct DispatcherHandle {
    inner: Weak<Registry>,
}

impl DispatcherHandle {
    fn registry(&self) -> Result<Arc<Registry>, DispatchError> {
        self.inner.upgrade().ok_or_else(|| DispatchError::Closed {
            message: "dispatcher has been dropped".into(),
            context: None,
        })
    }

    /// See [`Dispatcher::subscribe`].
    ///
    /// # Errors
    /// Returns [`DispatchError::Closed`] if the dispatcher is gone or shut down.
    pub fn subscribe<T, F>(&self, callback: F) -> Result<Subscription<T>, DispatchError>
    where
        T: Event,
        F: Fn(Arc<T>) + Send + Sync + 'static,
    {
        self.registry().context("subscribe")?.subscribe(Arc::new(callback))
    }

    /// See [`Dispatcher::publish`].
    ///
    /// # Errors
    /// Same as [`Dispatcher::publish`], plus [`DispatchError::Closed`] if the
    /// dispatcher has been dropped.
    pub fn publish<T: Event>(&self, event: T) -> Result<usize, DispatchError> {
        self.publish_arc(Arc::new(event))
    }

    /// See [`Dispatcher::publish_arc`].
    ///
    /// # Errors
    /// Same as [`DispatcherHandle::publish`].
    pub fn publish_arc<T: Event>(&self, event: Arc<T>) -> Result<usize, DispatchError> {
        self.registry().context("publish")?.publish(event)
    }

    /// `true` while the dispatcher exists and has not been shut down.
    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.inner.upgrade().is_some_and(|registry| !registry.is_closed())
    }
}
