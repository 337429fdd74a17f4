//! A buffering bridge for push-based streams: many producers in -> one
//! sequential consumer out.
//!
//! # About
//! [`BufferedSubscriber`] sits between a fast, possibly multi-threaded
//! producer side and a single consumer that must see items one at a time,
//! in order, never concurrently. Producers push items and termination
//! signals from any thread; an [`OverflowPolicy`] decides what happens
//! when the consumer falls behind; and a single drain loop delivers items
//! and exactly one terminal signal downstream.
//!
//! This crate does not directly use `unsafe` code. Reputable dependencies
//! like arc-swap and crossbeam-queue are used here, which internally _do_
//! have unsafe code.
//!
//! # Details
//! A normal `channel()` has 2 main components - a sender and a receiver.
//! A funnel has 3:
//! 1. The [`BufferedSubscriber`]. Cheap to clone; every producer thread holds one and calls `on_next` / `on_complete` / `on_error` on it.
//! 2. The [`Consumer`]. Your code. It gets one item at a time and acknowledges each with continue-or-[`Ack::Stop`], synchronously or asynchronously.
//! 3. The [`Executor`]. The runtime the drain loop's steps are submitted to, and the sink for faults that have nowhere else to go.
//!
//! ## Admission
//! Producers never block. Each `on_next` runs the overflow policy against
//! the current queue length and returns an [`Admission`] - an already
//! resolved acknowledgment for every policy except
//! [`OverflowPolicy::BackPressure`], which suspends the producer's
//! acknowledgment (not the thread) until the queue has room again.
//!
//! ## Drain loop
//! Exactly one drain execution is active per subscriber, guaranteed by a
//! single atomic idle-to-draining transition. The loop delivers queued
//! items in admission order and waits for each acknowledgment before the
//! next delivery. Long synchronous runs are trampolined: the loop
//! resubmits its continuation to the [`Executor`] instead of looping
//! forever in one step, so pushing 10,000 items grows no stacks.
//!
//! ## Termination
//! Completion and error are drain-exhaustive: the consumer sees the
//! terminal signal only after every item admitted before it has been
//! delivered. The one exception is the consumer's own `Stop`
//! acknowledgment, which discards whatever is still queued and suppresses
//! any pending terminal signal. A panicking consumer never unwinds into a
//! producer: item-handler faults are redirected into the normal error
//! termination, and faults from the terminal handlers themselves go to
//! [`Executor::report_failure`].
//!
//! # Feature Flags
//! - `tokio` (default): [`TokioExecutor`], a tokio-backed [`Executor`].

mod drain;
mod error;
mod executor;
mod policy;
mod shared;
mod subscriber;

use std::sync::Arc;

use futures::future::BoxFuture;

pub use error::{BoxError, ConfigError, StreamFault};
#[cfg(feature = "tokio")]
pub use executor::TokioExecutor;
pub use executor::Executor;
pub use policy::OverflowPolicy;
pub use subscriber::{Admission, BufferedSubscriber};

/// The consumer's verdict after one item: keep them coming, or stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ack {
    /// Send the next item when there is one.
    Continue,
    /// Send nothing further - no items, no completion, no error.
    Stop,
}

/// A deferred acknowledgment. `Err` terminates the stream as a consumer
/// fault.
pub type AckFuture = BoxFuture<'static, Result<Ack, BoxError>>;

/// A consumer's response to one delivered item.
pub enum Reply {
    /// Acknowledge on the spot.
    Now(Ack),
    /// Acknowledge later. The drain loop delivers nothing else until this
    /// resolves.
    Later(AckFuture),
}

impl Reply {
    /// Wrap an asynchronous acknowledgment.
    pub fn later<F>(ack: F) -> Self
    where
        F: futures::Future<Output = Result<Ack, BoxError>> + Send + 'static,
    {
        Reply::Later(Box::pin(ack))
    }
}

impl From<Ack> for Reply {
    fn from(ack: Ack) -> Self {
        Reply::Now(ack)
    }
}

impl std::fmt::Debug for Reply {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Reply::Now(ack) => f.debug_tuple("Now").field(ack).finish(),
            Reply::Later(_) => f.debug_struct("Later").finish_non_exhaustive(),
        }
    }
}

/// The downstream side of a funnel.
///
/// `on_item` is never called again before its previous acknowledgment
/// resolved. `on_error` and `on_complete` are mutually exclusive, called
/// at most once, and never after a `Stop` acknowledgment. Panics out of
/// any of these are contained by the drain loop.
pub trait Consumer<Item>: Send + 'static {
    /// Handle one item and say whether to keep going.
    fn on_item(&mut self, item: Item) -> Reply;

    /// The stream ended with a fault, delivered after the queue drained.
    fn on_error(&mut self, fault: Arc<StreamFault>);

    /// The stream ended cleanly, delivered after the queue drained.
    fn on_complete(&mut self);
}

/// Wire a consumer behind a buffer - the funnel equivalent of building a
/// channel.
///
/// Producers clone the returned [`BufferedSubscriber`] freely. Fails fast
/// with [`ConfigError`] when a capacity-bound policy has capacity 0 or 1.
pub fn buffer<Item, C>(
    consumer: C,
    policy: OverflowPolicy,
    executor: Arc<dyn Executor>,
) -> Result<BufferedSubscriber<Item, C>, ConfigError>
where
    Item: Send + 'static,
    C: Consumer<Item>,
{
    BufferedSubscriber::new(consumer, policy, executor)
}
