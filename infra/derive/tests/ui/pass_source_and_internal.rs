use std::borrow::Cow;
use tether_derive::tether_error;

#[tether_error]
pub enum StoreError {
    #[error("IO error{}: {source}", format_context(.context))]
    Io {
        #[source]
        source: std::io::Error,
        context: Option<Cow<'static, str>>,
    },

    #[error("Internal error{}: {message}", format_context(.context))]
    Internal { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
}

fn read() -> Result<(), StoreError> {
    Err(std::io::Error::other("disk gone")).context("reading index")
}

fn main() {
    let err = read().unwrap_err();
    assert_eq!(err.to_string(), "IO error (reading index): disk gone");

    let err: StoreError = "boom".into();
    assert_eq!(err.to_string(), "Internal error: boom");

    let err: StoreError = String::from("owned").into();
    assert_eq!(err.kind(), "Internal");
}
