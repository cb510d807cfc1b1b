use std::any::Any;
use std::sync::Arc;

/// Marker trait for types that can be published through a [`Dispatcher`](crate::Dispatcher).
///
/// Any type that is `Send + Sync + 'static` automatically implements this trait.
pub trait Event: Any + Send + Sync + 'static {}
impl<T: Any + Send + Sync + 'static> Event for T {}

/// A subscriber callback. Every invocation receives a shared handle to the event.
pub(crate) type Callback<T> = Arc<dyn Fn(Arc<T>) + Send + Sync>;
