use crate::error::DispatchError;
use serde::Deserialize;

/// Nesting limit for publishes issued from inside callbacks.
pub const DEFAULT_MAX_DISPATCH_DEPTH: usize = 64;
const MIN_DISPATCH_DEPTH: usize = 1;

/// Runtime settings of a [`Dispatcher`](crate::Dispatcher).
///
/// Deserializable so that applications can embed it in their own
/// configuration files; missing fields take their defaults.
///
/// # Example
/// ```rust
/// use tether_dispatch::{Dispatcher, DispatcherConfig};
///
/// # fn main() -> Result<(), tether_dispatch::DispatchError> {
/// let config = DispatcherConfig::default().max_dispatch_depth(8).isolate_panics(true);
/// let dispatcher = Dispatcher::with_config(config)?;
/// assert_eq!(dispatcher.config().max_dispatch_depth, 8);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DispatcherConfig {
    /// Maximum number of publish calls into this dispatcher that may be
    /// nested on one thread, counting the outermost one. Publishes into other
    /// dispatchers do not count.
    pub max_dispatch_depth: usize,
    /// Catch callback panics, keep dispatching, and report them as
    /// [`DispatchError::CallbackPanicked`].
    pub isolate_panics: bool,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self { max_dispatch_depth: DEFAULT_MAX_DISPATCH_DEPTH, isolate_panics: false }
    }
}

impl DispatcherConfig {
    #[must_use = "The config must be passed to a dispatcher to take effect."]
    pub const fn max_dispatch_depth(mut self, depth: usize) -> Self {
        self.max_dispatch_depth = depth;
        self
    }

    #[must_use = "The config must be passed to a dispatcher to take effect."]
    pub const fn isolate_panics(mut self, enabled: bool) -> Self {
        self.isolate_panics = enabled;
        self
    }

    /// Checks that the settings can be used.
    ///
    /// # Errors
    /// Returns [`DispatchError::InvalidConfiguration`] if `max_dispatch_depth` is zero.
    pub fn validate(&self) -> Result<(), DispatchError> {
        if self.max_dispatch_depth < MIN_DISPATCH_DEPTH {
            return Err(DispatchError::InvalidConfiguration {
                message: format!("max_dispatch_depth must be >= {MIN_DISPATCH_DEPTH}").into(),
                context: None,
            });
        }
        Ok(())
    }
}
