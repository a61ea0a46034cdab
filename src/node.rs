//! The execution-node contract every pattern implements.
//!
//! An [`ExecNode`] is a composable unit of concurrent execution: it accepts
//! work through [`submit`](ExecNode::submit) between
//! [`initialize`](ExecNode::initialize) and [`dispose`](ExecNode::dispose),
//! owns its worker threads and queues exclusively, and can stamp out fresh
//! uninitialized copies of itself for intra-stage replication.
//!
//! Lifecycle rules (violations are defects in the calling code and panic):
//!
//! - `initialize` before any `submit`; repeated calls are no-ops.
//! - `dispose` is idempotent, joins all owned threads, and is also run as a
//!   safety net when the node is dropped.
//! - `replicate` is only valid on a node that has never been initialized.

use crate::promise::Handle;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// A composable execution pattern over `In -> Out`.
pub trait ExecNode<In: Send + 'static, Out: Send + 'static>: Send + Sync {
    /// Allocate worker threads and queues. Idempotent.
    fn initialize(&self);

    /// Register one unit of work and return the handle its result will
    /// arrive on. Pattern nodes never block here; the
    /// [`AlgorithmAdapter`](crate::adapter::AlgorithmAdapter) and the
    /// map-reduce variants are the documented exceptions (the latter block
    /// at the shuffle barrier).
    ///
    /// # Panics
    ///
    /// Panics when called before `initialize` or after `dispose`.
    fn submit(&self, input: Handle<In>) -> Handle<Out>;

    /// Stop accepting work, join all owned threads, dispose sub-nodes.
    /// Idempotent. Items already dequeued run to completion first.
    fn dispose(&self);

    /// A fresh, uninitialized node with the same configuration.
    ///
    /// # Panics
    ///
    /// Panics on an initialized node.
    fn replicate(&self) -> NodePtr<In, Out>;

    /// Threads owned transitively by this node.
    fn thread_count(&self) -> usize;

    /// Composed diagnostic name, e.g. `pipeline(increase,taskpool(4,quick_sort))`.
    fn name(&self) -> String;
}

/// Shared-ownership pointer to an execution node.
pub type NodePtr<In, Out> = Arc<dyn ExecNode<In, Out>>;

/// Shared lifecycle state backing the contract above: an initialized flag
/// driving idempotency and the usage-error asserts, and a stop flag the
/// worker poll loops re-check on every iteration.
pub(crate) struct Lifecycle {
    initialized: AtomicBool,
    stop: Arc<AtomicBool>,
}

impl Lifecycle {
    pub(crate) fn new() -> Self {
        Self {
            initialized: AtomicBool::new(false),
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Transition uninitialized -> initialized. Returns false when the node
    /// was already initialized (the caller skips its setup).
    pub(crate) fn begin_init(&self) -> bool {
        if self
            .initialized
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }
        self.stop.store(false, Ordering::Release);
        true
    }

    /// Transition initialized -> disposed and raise the stop flag. Returns
    /// false when there is nothing to tear down.
    pub(crate) fn begin_dispose(&self) -> bool {
        if self
            .initialized
            .compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }
        self.stop.store(true, Ordering::Release);
        true
    }

    pub(crate) fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    /// The flag worker loops poll; cloned into each spawned thread.
    pub(crate) fn stop_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    pub(crate) fn assert_live(&self, node: &str) {
        assert!(
            self.is_initialized(),
            "{node}: submit called on a node that is not initialized"
        );
    }

    pub(crate) fn assert_uninitialized(&self, node: &str) {
        assert!(
            !self.is_initialized(),
            "{node}: cannot replicate an initialized node"
        );
    }
}
