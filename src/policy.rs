use crate::error::ConfigError;

/// What to do with an incoming item when the queue is at capacity.
///
/// This is a closed set: every place that consumes a policy matches it
/// exhaustively, so the admission behavior for each variant is spelled out
/// rather than left to subclass hooks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverflowPolicy {
    /// Never reject. The queue grows without bound.
    Unbounded,
    /// Discard the incoming item; the producer is still told to continue.
    DropNew {
        /// Maximum queued-but-undelivered items.
        capacity: usize,
    },
    /// Evict the oldest queued item to make room for the new one.
    DropOld {
        /// Maximum queued-but-undelivered items.
        capacity: usize,
    },
    /// Evict the entire queue to make room for the new item.
    ClearBuffer {
        /// Maximum queued-but-undelivered items.
        capacity: usize,
    },
    /// Admit the item, but suspend the producer's acknowledgment until
    /// queue occupancy drops below capacity again.
    BackPressure {
        /// Occupancy at which producers start being suspended.
        capacity: usize,
    },
}

/// The outcome of one admission decision. `Shared` applies the queue
/// mutation; the decision itself has no side effects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum AdmissionDecision {
    /// Push the item.
    Admit,
    /// Silently discard the incoming item.
    DiscardIncoming,
    /// Pop the oldest queued item, then push.
    EvictOldest,
    /// Empty the queue, then push.
    EvictAll,
    /// Push the item and park the producer's acknowledgment.
    AdmitThenSuspend,
}

impl OverflowPolicy {
    /// The capacity bound, if this policy has one.
    pub fn capacity(&self) -> Option<usize> {
        match self {
            OverflowPolicy::Unbounded => None,
            OverflowPolicy::DropNew { capacity }
            | OverflowPolicy::DropOld { capacity }
            | OverflowPolicy::ClearBuffer { capacity }
            | OverflowPolicy::BackPressure { capacity } => Some(*capacity),
        }
    }

    /// Capacity-bound policies need room for more than one item.
    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        match self.capacity() {
            Some(capacity) if capacity <= 1 => Err(ConfigError { capacity }),
            _ => Ok(()),
        }
    }

    /// Pure admission decision for a queue currently holding `queue_len`
    /// items. Queue mutation happens elsewhere.
    pub(crate) fn decide(&self, queue_len: usize) -> AdmissionDecision {
        match *self {
            OverflowPolicy::Unbounded => AdmissionDecision::Admit,
            OverflowPolicy::DropNew { capacity } => {
                if capacity <= queue_len {
                    log::debug!("dropping incoming item, queue is at {queue_len}");
                    AdmissionDecision::DiscardIncoming
                } else {
                    AdmissionDecision::Admit
                }
            }
            OverflowPolicy::DropOld { capacity } => {
                if capacity <= queue_len {
                    log::debug!("evicting oldest item, queue is at {queue_len}");
                    AdmissionDecision::EvictOldest
                } else {
                    AdmissionDecision::Admit
                }
            }
            OverflowPolicy::ClearBuffer { capacity } => {
                if capacity <= queue_len {
                    log::debug!("clearing queue of {queue_len} items");
                    AdmissionDecision::EvictAll
                } else {
                    AdmissionDecision::Admit
                }
            }
            OverflowPolicy::BackPressure { capacity } => {
                if capacity <= queue_len + 1 {
                    AdmissionDecision::AdmitThenSuspend
                } else {
                    AdmissionDecision::Admit
                }
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn unbounded_always_admits() {
        assert_eq!(
            OverflowPolicy::Unbounded.decide(usize::MAX - 1),
            AdmissionDecision::Admit
        );
    }

    #[test]
    fn drop_new_discards_at_capacity() {
        let policy = OverflowPolicy::DropNew { capacity: 2 };
        assert_eq!(policy.decide(0), AdmissionDecision::Admit);
        assert_eq!(policy.decide(1), AdmissionDecision::Admit);
        assert_eq!(policy.decide(2), AdmissionDecision::DiscardIncoming);
        assert_eq!(policy.decide(3), AdmissionDecision::DiscardIncoming);
    }

    #[test]
    fn drop_old_evicts_at_capacity() {
        let policy = OverflowPolicy::DropOld { capacity: 2 };
        assert_eq!(policy.decide(1), AdmissionDecision::Admit);
        assert_eq!(policy.decide(2), AdmissionDecision::EvictOldest);
    }

    #[test]
    fn clear_buffer_evicts_everything_at_capacity() {
        let policy = OverflowPolicy::ClearBuffer { capacity: 2 };
        assert_eq!(policy.decide(1), AdmissionDecision::Admit);
        assert_eq!(policy.decide(2), AdmissionDecision::EvictAll);
    }

    #[test]
    fn back_pressure_suspends_when_the_admitted_item_fills_the_queue() {
        let policy = OverflowPolicy::BackPressure { capacity: 3 };
        assert_eq!(policy.decide(0), AdmissionDecision::Admit);
        assert_eq!(policy.decide(1), AdmissionDecision::Admit);
        assert_eq!(policy.decide(2), AdmissionDecision::AdmitThenSuspend);
        assert_eq!(policy.decide(5), AdmissionDecision::AdmitThenSuspend);
    }

    #[test]
    fn tiny_capacities_are_rejected() {
        for capacity in [0, 1] {
            assert!(OverflowPolicy::DropNew { capacity }.validate().is_err());
            assert!(OverflowPolicy::DropOld { capacity }.validate().is_err());
            assert!(OverflowPolicy::ClearBuffer { capacity }.validate().is_err());
            assert!(OverflowPolicy::BackPressure { capacity }.validate().is_err());
        }
        assert!(OverflowPolicy::DropNew { capacity: 2 }.validate().is_ok());
        assert!(OverflowPolicy::Unbounded.validate().is_ok());
    }
}
