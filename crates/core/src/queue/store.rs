//! Bounded FIFO of pending operations

use std::collections::VecDeque;

use super::operation::Operation;

/// Pending operations in submission order, bounded by `capacity`.
///
/// Operations taken out for a retry pass still count against the bound until
/// the pass releases them.
#[derive(Debug)]
pub struct OperationQueue {
    items: VecDeque<Operation>,
    capacity: usize,
    in_flight: usize,
}

impl OperationQueue {
    pub fn new(capacity: usize) -> Self {
        Self { items: VecDeque::new(), capacity, in_flight: 0 }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Operations taken by the current pass and not yet handed back.
    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    pub fn is_full(&self) -> bool {
        self.items.len() + self.in_flight >= self.capacity
    }

    /// Append `operation`, handing it back when the queue is full.
    #[allow(clippy::result_large_err)]
    pub fn try_push(&mut self, operation: Operation) -> Result<(), Operation> {
        if self.is_full() {
            return Err(operation);
        }
        self.items.push_back(operation);
        Ok(())
    }

    /// Place restored operations ahead of the live ones, which were all
    /// enqueued later. Cache files were bounded when written, so the capacity
    /// check is skipped.
    pub fn restore_front(&mut self, operations: impl IntoIterator<Item = Operation>) {
        let mut restored: VecDeque<Operation> = operations.into_iter().collect();
        restored.append(&mut self.items);
        self.items = restored;
    }

    /// Take every queued operation for a pass. They count as in flight until
    /// the pass releases them.
    pub fn take_all(&mut self) -> Vec<Operation> {
        let taken: Vec<Operation> = self.items.drain(..).collect();
        self.in_flight += taken.len();
        taken
    }

    /// Stop counting `count` taken operations, because the pass finished
    /// or discarded them.
    pub fn release_in_flight(&mut self, count: usize) {
        self.in_flight = self.in_flight.saturating_sub(count);
    }

    /// End a pass that held `held` operations: hand back the unprocessed
    /// ones ahead of anything queued since they were taken, preserving
    /// their order.
    pub fn requeue_front(&mut self, operations: impl IntoIterator<Item = Operation>, held: usize) {
        self.restore_front(operations);
        self.release_in_flight(held);
    }

    pub fn clear(&mut self) -> usize {
        let removed = self.items.len();
        self.items.clear();
        removed
    }

    /// Keep operations matching `keep`; returns how many were removed.
    pub fn retain(&mut self, keep: impl FnMut(&Operation) -> bool) -> usize {
        let before = self.items.len();
        self.items.retain(keep);
        before - self.items.len()
    }

    pub fn iter(&self) -> impl ExactSizeIterator<Item = &Operation> {
        self.items.iter()
    }
}
