use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::channel::oneshot;
use futures::Future;

use crate::drain::DrainLoop;
use crate::error::{BoxError, ConfigError, StreamFault};
use crate::executor::Executor;
use crate::shared::Shared;
use crate::{Ack, Consumer, OverflowPolicy};

/// The producer-facing half of a buffered stream.
///
/// Any number of threads may hold a clone and call [`on_next`],
/// [`on_complete`] and [`on_error`] concurrently. The subscriber applies
/// its [`OverflowPolicy`], keeps the items in order, and drives one drain
/// loop that delivers them to the consumer sequentially.
///
/// [`on_next`]: BufferedSubscriber::on_next
/// [`on_complete`]: BufferedSubscriber::on_complete
/// [`on_error`]: BufferedSubscriber::on_error
pub struct BufferedSubscriber<Item, C>
where
    Item: Send + 'static,
    C: Consumer<Item>,
{
    shared: Arc<Shared<Item>>,
    drain: Arc<DrainLoop<Item, C>>,
}

impl<Item, C> Clone for BufferedSubscriber<Item, C>
where
    Item: Send + 'static,
    C: Consumer<Item>,
{
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
            drain: Arc::clone(&self.drain),
        }
    }
}

impl<Item, C> std::fmt::Debug for BufferedSubscriber<Item, C>
where
    Item: Send + 'static,
    C: Consumer<Item>,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferedSubscriber")
            .field("shared", &self.shared)
            .field("policy", &self.shared.policy())
            .finish()
    }
}

impl<Item, C> BufferedSubscriber<Item, C>
where
    Item: Send + 'static,
    C: Consumer<Item>,
{
    /// Wire a consumer behind a buffer with the given overflow policy.
    ///
    /// Fails fast when a capacity-bound policy has capacity 0 or 1 - no
    /// subscriber is created in that case.
    pub fn new(
        consumer: C,
        policy: OverflowPolicy,
        executor: Arc<dyn Executor>,
    ) -> Result<Self, ConfigError> {
        policy.validate()?;
        let shared = Arc::new(Shared::new(policy));
        let drain = Arc::new(DrainLoop::new(Arc::clone(&shared), consumer, executor));
        Ok(Self { shared, drain })
    }

    /// Offer one item to the buffer.
    ///
    /// `None` is a producer contract violation: it is recorded as the
    /// stream's fault and reaches the consumer through `on_error` once the
    /// queue drains; the call itself still returns `Continue`.
    ///
    /// The returned [`Admission`] is already resolved for every policy
    /// except `BackPressure`, which suspends it until occupancy drops
    /// below capacity. After the stream has stopped - consumer `Stop`,
    /// delivered completion, or delivered error - this returns `Stop`
    /// immediately and the item is not enqueued.
    pub fn on_next(&self, item: Option<Item>) -> Admission {
        if self.shared.is_stopped() {
            return Admission::Ready(Ack::Stop);
        }
        let Some(item) = item else {
            log::debug!("absent item from producer");
            self.shared.store_error(StreamFault::AbsentItem);
            self.drain.try_schedule();
            return Admission::Ready(Ack::Continue);
        };
        let (admission, admitted) = self.shared.admit(item);
        if admitted {
            self.drain.try_schedule();
        }
        admission
    }

    /// Signal that the upstream is finished. The consumer sees
    /// `on_complete` only after everything queued before this call has
    /// been delivered. No-op once the stream has stopped.
    pub fn on_complete(&self) {
        if self.shared.is_stopped() {
            return;
        }
        self.shared.mark_done();
        self.drain.try_schedule();
    }

    /// Signal an upstream error. The first error wins; later ones are
    /// dropped. The consumer sees `on_error` only after everything queued
    /// before this call has been delivered. No-op once the stream has
    /// stopped.
    pub fn on_error(&self, error: BoxError) {
        if self.shared.is_stopped() {
            return;
        }
        self.shared.store_error(StreamFault::Upstream(error));
        self.drain.try_schedule();
    }
}

/// A producer's acknowledgment: resolved on the spot for every policy
/// except `BackPressure`, which hands back a suspended acknowledgment.
///
/// Await it to get the [`Ack`]. A suspension abandoned by the subscriber
/// (it can only be dropped once the stream stopped) resolves to `Stop`.
#[derive(Debug)]
pub enum Admission {
    /// The acknowledgment was immediate.
    Ready(Ack),
    /// The producer is suspended until capacity frees up.
    Suspended(oneshot::Receiver<Ack>),
}

impl Admission {
    /// The acknowledgment, if it is already resolved. `None` means the
    /// producer is suspended.
    pub fn now(&self) -> Option<Ack> {
        match self {
            Admission::Ready(ack) => Some(*ack),
            Admission::Suspended(_) => None,
        }
    }
}

/// Safety: both variants hold only Unpin data.
impl Unpin for Admission {}

impl Future for Admission {
    type Output = Ack;

    fn poll(self: Pin<&mut Self>, context: &mut Context<'_>) -> Poll<Self::Output> {
        match self.get_mut() {
            Admission::Ready(ack) => Poll::Ready(*ack),
            Admission::Suspended(receiver) => Pin::new(receiver)
                .poll(context)
                .map(|resolved| resolved.unwrap_or(Ack::Stop)),
        }
    }
}
