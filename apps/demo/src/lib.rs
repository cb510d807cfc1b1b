pub mod config;

use parking_lot::Mutex;
use std::sync::Arc;
use tether_dispatch::{DispatchError, Dispatcher};
use tracing::info;

#[derive(Debug)]
pub struct SomeEvent {
    pub value: i32,
}

/// Subscribes to [`SomeEvent`] inside a scope, publishes `0..3` while the
/// subscription lives, then publishes `3` after it has been dropped.
///
/// Returns the values the subscriber actually received.
///
/// # Errors
/// Propagates any [`DispatchError`] raised by the dispatcher.
pub fn run_scenario(dispatcher: &Dispatcher) -> Result<Vec<i32>, DispatchError> {
    let received = Arc::new(Mutex::new(Vec::new()));

    {
        let sink = Arc::clone(&received);
        let _subscription = dispatcher.subscribe(move |event: Arc<SomeEvent>| {
            info!(value = event.value, "Received event");
            sink.lock().push(event.value);
        })?;

        for value in 0..3 {
            dispatcher.publish(SomeEvent { value })?;
        }
    }

    let delivered = dispatcher.publish(SomeEvent { value: 3 })?;
    info!(delivered, "Published after the subscription went out of scope");

    let values = received.lock().clone();
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scenario_stops_at_scope_end() {
        let dispatcher = Dispatcher::new();
        assert_eq!(run_scenario(&dispatcher).unwrap(), vec![0, 1, 2]);
        assert_eq!(dispatcher.subscriber_count::<SomeEvent>(), 0);
    }

    #[test]
    fn test_scenario_after_shutdown_fails() {
        let dispatcher = Dispatcher::new();
        dispatcher.shutdown();
        let err = run_scenario(&dispatcher).unwrap_err();
        assert!(matches!(err, DispatchError::Closed { .. }));
    }
}
