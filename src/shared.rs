use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwapOption;
use crossbeam_queue::SegQueue;
use futures::channel::oneshot;

use crate::error::StreamFault;
use crate::policy::{AdmissionDecision, OverflowPolicy};
use crate::subscriber::Admission;
use crate::Ack;

const IDLE: u8 = 0;
const DRAINING: u8 = 1;
const STOPPED: u8 = 2;

/// The one structure producers and the drain loop mutate concurrently.
///
/// Producers only touch it through atomic operations and lock-free queues;
/// the consumer is never called while anything in here is held. The
/// `state` word is the authority on who may drain: exactly one caller wins
/// the idle-to-draining compare-and-set, and only that caller schedules a
/// drain execution.
pub(crate) struct Shared<Item> {
    queue: SegQueue<Item>,
    state: AtomicU8,
    upstream_done: AtomicBool,
    error: ArcSwapOption<StreamFault>,
    parked: SegQueue<oneshot::Sender<Ack>>,
    policy: OverflowPolicy,
}

impl<Item> std::fmt::Debug for Shared<Item> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Shared")
            .field("queue_len", &self.queue.len())
            .field("state", &self.state.load(Ordering::Relaxed))
            .field("upstream_done", &self.upstream_done.load(Ordering::Relaxed))
            .field("parked", &self.parked.len())
            .finish()
    }
}

impl<Item> Shared<Item> {
    pub fn new(policy: OverflowPolicy) -> Self {
        Self {
            queue: SegQueue::new(),
            state: AtomicU8::new(IDLE),
            upstream_done: AtomicBool::new(false),
            error: ArcSwapOption::empty(),
            parked: SegQueue::new(),
            policy,
        }
    }

    pub fn policy(&self) -> OverflowPolicy {
        self.policy
    }

    /// Run the admission policy for one incoming item. Returns the
    /// producer's acknowledgment and whether an item actually entered the
    /// queue (only admitted items warrant a drain trigger).
    pub fn admit(&self, item: Item) -> (Admission, bool) {
        match self.policy.decide(self.queue.len()) {
            AdmissionDecision::Admit => {
                self.queue.push(item);
                (Admission::Ready(Ack::Continue), true)
            }
            AdmissionDecision::DiscardIncoming => (Admission::Ready(Ack::Continue), false),
            AdmissionDecision::EvictOldest => {
                let _evicted = self.queue.pop();
                self.queue.push(item);
                (Admission::Ready(Ack::Continue), true)
            }
            AdmissionDecision::EvictAll => {
                while self.queue.pop().is_some() {}
                self.queue.push(item);
                (Admission::Ready(Ack::Continue), true)
            }
            AdmissionDecision::AdmitThenSuspend => {
                self.queue.push(item);
                let (sender, receiver) = oneshot::channel();
                self.parked.push(sender);
                log::trace!("producer suspended at occupancy {}", self.queue.len());
                // The drain may have dropped below capacity, or stopped,
                // between our push and our park. Both sides check, so a
                // parked producer cannot be missed.
                if self.is_stopped() {
                    self.release_parked(Ack::Stop);
                } else {
                    self.release_capacity();
                }
                (Admission::Suspended(receiver), true)
            }
        }
    }

    pub fn pop(&self) -> Option<Item> {
        self.queue.pop()
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    pub fn discard_queue(&self) {
        let mut discarded = 0_usize;
        while self.queue.pop().is_some() {
            discarded += 1;
        }
        if 0 < discarded {
            log::debug!("discarded {discarded} undelivered items after stop");
        }
    }

    /// Record a fault. The first one wins; `upstream_done` comes along
    /// with it because a fault always terminates the stream.
    pub fn store_error(&self, fault: StreamFault) {
        let fault = Arc::new(fault);
        self.error
            .rcu(|current| current.clone().or_else(|| Some(Arc::clone(&fault))));
        self.upstream_done.store(true, Ordering::Release);
    }

    pub fn error(&self) -> Option<Arc<StreamFault>> {
        self.error.load_full()
    }

    pub fn mark_done(&self) {
        self.upstream_done.store(true, Ordering::Release);
    }

    pub fn is_done(&self) -> bool {
        self.upstream_done.load(Ordering::Acquire)
    }

    /// True when an idle drain would immediately find something to do.
    pub fn has_pending_work(&self) -> bool {
        !self.queue.is_empty() || self.is_done()
    }

    pub fn try_begin_drain(&self) -> bool {
        self.state
            .compare_exchange(IDLE, DRAINING, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Drain-side only. Returning to idle can race a producer that saw us
    /// still draining and walked away; the drain re-checks for work after
    /// this and re-acquires the draining right if anything arrived.
    pub fn set_idle(&self) {
        let _ = self
            .state
            .compare_exchange(DRAINING, IDLE, Ordering::AcqRel, Ordering::Acquire);
    }

    pub fn stop(&self) {
        self.state.store(STOPPED, Ordering::Release);
    }

    pub fn is_stopped(&self) -> bool {
        self.state.load(Ordering::Acquire) == STOPPED
    }

    /// Resolve suspended producers once occupancy is below capacity again.
    /// Every parked producer's item is already queued, so waking all of
    /// them cannot over-admit.
    pub fn release_capacity(&self) {
        if let OverflowPolicy::BackPressure { capacity } = self.policy {
            if self.queue.len() < capacity && !self.parked.is_empty() {
                self.release_parked(Ack::Continue);
            }
        }
    }

    pub fn release_parked(&self, ack: Ack) {
        let mut released = 0_usize;
        while let Some(sender) = self.parked.pop() {
            let _ = sender.send(ack);
            released += 1;
        }
        if 0 < released {
            log::trace!("released {released} suspended producers with {ack:?}");
        }
    }
}
