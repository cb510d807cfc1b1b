use std::borrow::Cow;

/// Errors that can occur during dispatcher operations.
///
/// None of these arise in normal operation: publishing to a type without
/// subscribers and cancelling a dead subscription are both silent no-ops.
#[tether_derive::tether_error]
pub enum DispatchError {
    /// A channel stored under an event type could not be recovered as that type.
    /// This indicates a broken invariant in the type registry.
    #[error("Type mismatch{}: {message}", format_context(.context))]
    TypeMismatch { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    /// The dispatcher has been shut down or dropped.
    #[error("Dispatcher closed{}: {message}", format_context(.context))]
    Closed { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    /// A re-entrant publish would exceed the configured nesting depth.
    #[error("Dispatch depth exceeded{}: {message}", format_context(.context))]
    DepthExceeded { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    /// One or more callbacks panicked while panic isolation was enabled.
    #[error("Callback panicked{}: {message}", format_context(.context))]
    CallbackPanicked { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    /// The dispatcher configuration is not usable.
    #[error("Invalid dispatcher configuration{}: {message}", format_context(.context))]
    InvalidConfiguration { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
}
