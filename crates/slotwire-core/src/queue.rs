//! The single-threaded delivery queue.
//!
//! All cross-boundary deliveries are queued, never direct: an emit appends
//! [`Delivery`] records here and returns immediately, so a handler never
//! runs reentrantly inside the emitting call frame. The host's event loop
//! drains the queue later, strictly in FIFO order; each delivery carries a
//! sequence number so the ordering is explicit rather than implicit in host
//! plumbing.
//!
//! Argument vectors are moved into the queue at emit time and consumed by
//! the dispatch step, which drops them after use whether or not the target
//! still exists. There is no cancellation: once enqueued, a delivery is
//! either dispatched or dropped because its destination was disposed first.

use std::collections::VecDeque;

use crate::arena::DynamicHandle;
use crate::ids::{NativeHandle, SlotId};
use crate::signature::Signature;
use crate::value::HostValue;

/// Where a queued call lands.
#[derive(Debug, Clone, PartialEq)]
pub enum DeliveryTarget {
    /// A dynamic object's slot-table entry (unmarshal, then invoke the
    /// script callable).
    Script {
        object: DynamicHandle,
        slot: SlotId,
    },
    /// A native object's slot (arguments pass through untouched).
    Native {
        object: NativeHandle,
        slot: Signature,
    },
}

/// One queued call: a target plus the raw argument vector.
#[derive(Debug)]
pub struct Delivery {
    /// Position in the queue's total order.
    pub seq: u64,
    pub target: DeliveryTarget,
    pub args: Vec<HostValue>,
}

/// FIFO queue of pending deliveries.
#[derive(Debug, Default)]
pub struct DeliveryQueue {
    pending: VecDeque<Delivery>,
    next_seq: u64,
}

impl DeliveryQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a delivery, taking ownership of the argument vector.
    pub fn push(&mut self, target: DeliveryTarget, args: Vec<HostValue>) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        tracing::trace!(seq, ?target, argc = args.len(), "delivery enqueued");
        self.pending.push_back(Delivery { seq, target, args });
        seq
    }

    /// Take the oldest pending delivery.
    pub fn pop(&mut self) -> Option<Delivery> {
        self.pending.pop_front()
    }

    /// Number of pending deliveries.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Whether nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn native_target(index: u32) -> DeliveryTarget {
        DeliveryTarget::Native {
            object: NativeHandle::new(index),
            slot: Signature::parse("onPing()").unwrap(),
        }
    }

    #[test]
    fn fifo_order() {
        let mut queue = DeliveryQueue::new();
        queue.push(native_target(0), vec![HostValue::Int(1)]);
        queue.push(native_target(1), vec![HostValue::Int(2)]);

        let first = queue.pop().unwrap();
        let second = queue.pop().unwrap();
        assert!(first.seq < second.seq);
        assert_eq!(first.args, vec![HostValue::Int(1)]);
        assert_eq!(second.args, vec![HostValue::Int(2)]);
        assert!(queue.pop().is_none());
    }

    #[test]
    fn sequence_numbers_survive_draining() {
        let mut queue = DeliveryQueue::new();
        queue.push(native_target(0), vec![]);
        queue.pop();
        let seq = queue.push(native_target(0), vec![]);
        assert_eq!(seq, 1);
    }

    #[test]
    fn len_tracks_pending() {
        let mut queue = DeliveryQueue::new();
        assert!(queue.is_empty());
        queue.push(native_target(0), vec![]);
        assert_eq!(queue.len(), 1);
        queue.pop();
        assert!(queue.is_empty());
    }
}
