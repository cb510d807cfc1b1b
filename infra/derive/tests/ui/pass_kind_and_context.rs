use std::borrow::Cow;
use tether_derive::tether_error;

#[tether_error]
pub enum LinkError {
    #[error("Link closed{}: {message}", format_context(.context))]
    Closed { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("Link stalled: {message}")]
    Stalled { message: Cow<'static, str> },
}

fn main() {
    let closed: Result<(), LinkError> =
        Err(LinkError::Closed { message: "peer left".into(), context: None });
    let err = closed.context("sending frame").unwrap_err();
    assert_eq!(err.kind(), "Closed");
    assert_eq!(err.to_string(), "Link closed (sending frame): peer left");

    let stalled: Result<(), LinkError> = Err(LinkError::Stalled { message: "no credit".into() });
    let err = stalled.context("ignored").unwrap_err();
    assert_eq!(err.kind(), "Stalled");
    assert_eq!(err.to_string(), "Link stalled: no credit");
}
