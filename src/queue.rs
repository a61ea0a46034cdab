//! The lock-free work queue used for every cross-thread handoff.
//!
//! All worker loops in the crate drain one or more [`WorkQueue`]s with a
//! non-blocking [`try_pop`](WorkQueue::try_pop), yielding the processor when
//! nothing is pending and re-checking their stop flag on every iteration.
//! There is no back-pressure: `push` always succeeds, and the only ordering
//! guarantee is that every pushed item is observed by exactly one pop.

use crate::promise::{Handle, Promise};
use crossbeam_queue::SegQueue;

/// Unbounded multi-producer/multi-consumer queue of pending work.
#[derive(Default)]
pub struct WorkQueue<T> {
    inner: SegQueue<T>,
}

impl<T> WorkQueue<T> {
    pub fn new() -> Self {
        Self {
            inner: SegQueue::new(),
        }
    }

    /// Enqueue an item. Never blocks.
    pub fn push(&self, item: T) {
        self.inner.push(item);
    }

    /// Dequeue an item if one is available. Never blocks.
    pub fn try_pop(&self) -> Option<T> {
        self.inner.pop()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

/// One unit of work: an input that may still be in flight, paired with the
/// slot the consumer must fulfill exactly once.
pub struct WorkItem<In, Out> {
    pub input: Handle<In>,
    pub output: Promise<Out>,
}

impl<In, Out> WorkItem<In, Out> {
    pub fn new(input: Handle<In>, output: Promise<Out>) -> Self {
        Self { input, output }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn push_pop_single_thread() {
        let q = WorkQueue::new();
        assert!(q.try_pop().is_none());
        q.push(1);
        q.push(2);
        assert_eq!(q.try_pop(), Some(1));
        assert_eq!(q.try_pop(), Some(2));
        assert!(q.is_empty());
    }

    #[test]
    fn every_item_popped_exactly_once() {
        let q = Arc::new(WorkQueue::new());
        for i in 0..1000u32 {
            q.push(i);
        }

        let mut joins = Vec::new();
        for _ in 0..4 {
            let q = Arc::clone(&q);
            joins.push(std::thread::spawn(move || {
                let mut seen = Vec::new();
                while let Some(v) = q.try_pop() {
                    seen.push(v);
                }
                seen
            }));
        }

        let mut all: Vec<u32> = joins
            .into_iter()
            .flat_map(|j| j.join().unwrap())
            .collect();
        all.sort_unstable();
        assert_eq!(all, (0..1000).collect::<Vec<_>>());
    }
}
