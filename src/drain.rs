use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, PoisonError};

use crate::error::{panic_to_error, StreamFault};
use crate::executor::Executor;
use crate::shared::Shared;
use crate::{Ack, Consumer, Reply};

/// Deliveries per scheduled step. A long run of synchronously-acking items
/// is cut here and the continuation resubmitted to the executor, so stack
/// depth and scheduler occupancy stay bounded no matter how long the
/// stream is.
const DRAIN_BATCH: usize = 128;

/// The single active worker that delivers queued items and the terminal
/// signal to the consumer, one at a time, in admission order.
///
/// Exactly one drain execution is live per subscriber: producers race on
/// the idle-to-draining compare-and-set in [`Shared`], and only the winner
/// calls [`DrainLoop::try_schedule`] through to the executor. The consumer
/// mutex below is therefore uncontended; it exists so the consumer can be
/// reached from whichever executor thread runs the current step.
pub(crate) struct DrainLoop<Item, C> {
    shared: Arc<Shared<Item>>,
    consumer: Mutex<C>,
    executor: Arc<dyn Executor>,
}

impl<Item, C> DrainLoop<Item, C>
where
    Item: Send + 'static,
    C: Consumer<Item>,
{
    pub fn new(shared: Arc<Shared<Item>>, consumer: C, executor: Arc<dyn Executor>) -> Self {
        Self {
            shared,
            consumer: Mutex::new(consumer),
            executor,
        }
    }

    /// Schedule a drain execution if nobody is draining yet.
    pub fn try_schedule(self: &Arc<Self>) {
        if self.shared.try_begin_drain() {
            self.schedule();
        }
    }

    fn schedule(self: &Arc<Self>) {
        let this = Arc::clone(self);
        self.executor.schedule(Box::pin(async move { this.run().await }));
    }

    /// One scheduled step of the drain state machine.
    async fn run(self: Arc<Self>) {
        let mut delivered = 0_usize;
        loop {
            if let Some(item) = self.shared.pop() {
                self.shared.release_capacity();
                match self.deliver(item).await {
                    Ok(Ack::Continue) => {}
                    Ok(Ack::Stop) => {
                        log::debug!("consumer asked to stop, discarding the rest");
                        self.halt();
                        return;
                    }
                    Err(error) => {
                        // A consumer fault terminates the stream like an
                        // upstream error would: the remaining queued items
                        // are still delivered first.
                        self.shared.store_error(StreamFault::Consumer(error));
                    }
                }
                delivered += 1;
                if DRAIN_BATCH <= delivered {
                    log::trace!("batch exhausted, rescheduling drain");
                    self.schedule();
                    return;
                }
                continue;
            }

            if self.shared.is_done() {
                // A producer can push and then mark done in the window
                // between our empty pop and this load. Its push
                // happens-before the Release store on upstream_done, so
                // after an Acquire read of done the item is visible here:
                // re-check the queue before reporting the terminal.
                if 0 < self.shared.queue_len() {
                    continue;
                }
                self.finish();
                return;
            }

            // Nothing to do. Give up the draining right, then re-check:
            // a producer may have enqueued between our last pop and the
            // transition to idle.
            self.shared.set_idle();
            if self.shared.has_pending_work() && self.shared.try_begin_drain() {
                continue;
            }
            log::trace!("drain idle");
            return;
        }
    }

    /// Hand one item to the consumer and normalize its acknowledgment.
    /// A synchronous panic and a failed asynchronous acknowledgment are
    /// both consumer faults.
    async fn deliver(&self, item: Item) -> Result<Ack, crate::BoxError> {
        let reply = {
            let mut consumer = self.lock_consumer();
            catch_unwind(AssertUnwindSafe(|| consumer.on_item(item)))
        };
        match reply {
            Ok(Reply::Now(ack)) => Ok(ack),
            Ok(Reply::Later(ack)) => ack.await,
            Err(payload) => Err(panic_to_error(payload)),
        }
    }

    /// The consumer said stop: terminal, undelivered items are dropped,
    /// suspended producers are told to stop, and any pending
    /// completion/error is suppressed.
    fn halt(&self) {
        self.shared.stop();
        self.shared.discard_queue();
        self.shared.release_parked(Ack::Stop);
    }

    /// The queue is drained and the upstream is done: deliver the terminal
    /// signal exactly once. A panic out of the terminal handler has no
    /// remaining channel to the consumer, so it goes to the executor's
    /// failure sink instead.
    fn finish(&self) {
        self.shared.stop();
        self.shared.release_parked(Ack::Stop);
        let fault = self.shared.error();
        log::debug!(
            "terminal: {}",
            if fault.is_some() { "error" } else { "complete" }
        );
        let outcome = {
            let mut consumer = self.lock_consumer();
            catch_unwind(AssertUnwindSafe(|| match fault {
                Some(fault) => consumer.on_error(fault),
                None => consumer.on_complete(),
            }))
        };
        if let Err(payload) = outcome {
            self.executor.report_failure(panic_to_error(payload));
        }
    }

    /// A consumer panic poisons the mutex on the way out of catch_unwind;
    /// the consumer stays usable for the terminal signal, so recover the
    /// guard.
    fn lock_consumer(&self) -> std::sync::MutexGuard<'_, C> {
        self.consumer.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
