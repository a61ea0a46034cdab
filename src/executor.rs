//! Replica management for intra-stage parallelism.

use crate::node::NodePtr;
use crate::promise::{Handle, Promise};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Drives one or more interchangeable replicas of a wrapped node.
///
/// Replicas are produced with [`ExecNode::replicate`](crate::node::ExecNode::replicate)
/// from the configured node, so they share configuration but own nothing in
/// common. Selection is round-robin; since replicas are stateless any
/// assignment that processes every submitted item would do.
pub struct Executor<In: Send + 'static, Out: Send + 'static> {
    replicas: Vec<NodePtr<In, Out>>,
    next: AtomicUsize,
}

impl<In, Out> Executor<In, Out>
where
    In: Send + 'static,
    Out: Send + 'static,
{
    /// Wrap `node` with `replica_count` total replicas (the node itself plus
    /// `replica_count - 1` fresh copies). `node` must be uninitialized.
    pub fn new(node: NodePtr<In, Out>, replica_count: usize) -> Self {
        assert!(replica_count > 0, "executor needs at least one replica");
        let mut replicas = Vec::with_capacity(replica_count);
        for _ in 1..replica_count {
            replicas.push(node.replicate());
        }
        replicas.push(node);
        Self {
            replicas,
            next: AtomicUsize::new(0),
        }
    }

    pub fn initialize(&self) {
        for replica in &self.replicas {
            replica.initialize();
        }
    }

    pub fn dispose(&self) {
        for replica in &self.replicas {
            replica.dispose();
        }
    }

    /// Drive one replica: block until `input` resolves, compute, fulfill
    /// `output`. Runs on the calling (worker) thread.
    pub fn compute(&self, input: Handle<In>, output: Promise<Out>) {
        let index = self.next.fetch_add(1, Ordering::Relaxed) % self.replicas.len();
        let result = self.replicas[index].submit(input);
        output.fulfill(result.wait());
    }

    /// An uninitialized copy of the wrapped node, for replicating the
    /// pattern that owns this executor.
    pub fn replicate_node(&self) -> NodePtr<In, Out> {
        self.replicas[0].replicate()
    }

    pub fn replica_count(&self) -> usize {
        self.replicas.len()
    }

    pub fn thread_count(&self) -> usize {
        self.replicas.len() * self.replicas[0].thread_count()
    }

    pub fn name(&self) -> String {
        self.replicas[0].name()
    }
}
