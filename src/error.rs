use std::any::Any;

use thiserror::Error;

/// Boxed error used at the producer and consumer boundaries.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Rejected configuration, raised synchronously by the constructor.
///
/// Every capacity-bound [`crate::OverflowPolicy`] needs room for at least one
/// queued item plus the one in flight, so a capacity of 0 or 1 is refused
/// before any subscriber is created.
#[derive(Debug, Error)]
#[error("buffer capacity must be greater than 1, got {capacity}")]
pub struct ConfigError {
    /// The capacity that was rejected.
    pub capacity: usize,
}

/// The fault that terminated a stream.
///
/// Whichever fault is recorded first wins; it is handed to
/// [`crate::Consumer::on_error`] exactly once, after the queue has drained.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum StreamFault {
    /// A producer pushed `None` where an item was required.
    #[error("absent item pushed by producer")]
    AbsentItem,
    /// A producer signaled an upstream error through `on_error`.
    #[error("upstream error: {0}")]
    Upstream(BoxError),
    /// The consumer's item handler panicked or its acknowledgment failed.
    #[error("consumer failed while handling an item: {0}")]
    Consumer(BoxError),
}

/// Turns a caught panic payload into something loggable and storable.
pub(crate) fn panic_to_error(payload: Box<dyn Any + Send>) -> BoxError {
    let message = match payload.downcast::<String>() {
        Ok(message) => *message,
        Err(payload) => match payload.downcast::<&'static str>() {
            Ok(message) => (*message).to_owned(),
            Err(_) => "consumer panicked".to_owned(),
        },
    };
    message.into()
}
