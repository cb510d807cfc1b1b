use parking_lot::Mutex;
use std::sync::Arc;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TestEvent(pub i64);

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OtherEvent(pub i64);

pub trait Valued {
    fn value(&self) -> i64;
}

impl Valued for TestEvent {
    fn value(&self) -> i64 {
        self.0
    }
}

impl Valued for OtherEvent {
    fn value(&self) -> i64 {
        self.0
    }
}

/// Records the values a callback receives, in arrival order.
#[derive(Clone, Debug, Default)]
pub struct Recorder {
    seen: Arc<Mutex<Vec<i64>>>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn callback<E: Valued + Send + Sync + 'static>(
        &self,
    ) -> impl Fn(Arc<E>) + Send + Sync + 'static {
        let seen = Arc::clone(&self.seen);
        move |event: Arc<E>| seen.lock().push(event.value())
    }

    pub fn values(&self) -> Vec<i64> {
        self.seen.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.seen.lock().len()
    }
}
