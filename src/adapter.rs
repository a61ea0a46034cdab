//! Lifts a leaf [`Algorithm`] into the execution-node contract.

use crate::algorithm::{Algorithm, AlgorithmPtr};
use crate::node::{ExecNode, Lifecycle, NodePtr};
use crate::promise::{self, Handle};
use std::sync::Arc;

/// The leaf of every composition: wraps one [`Algorithm`] and computes on
/// the thread that drives it.
///
/// Unlike the pattern nodes, `submit` here is synchronous: it waits for the
/// upstream handle on the calling thread, runs the algorithm, and returns an
/// already-resolved handle. In practice the caller is an
/// [`Executor`](crate::executor::Executor) worker, which is exactly the
/// suspension point the patterns are built around.
pub struct AlgorithmAdapter<In, Out> {
    algorithm: AlgorithmPtr<In, Out>,
    lifecycle: Lifecycle,
}

impl<In, Out> AlgorithmAdapter<In, Out>
where
    In: Send + 'static,
    Out: Send + 'static,
{
    pub fn new(algorithm: AlgorithmPtr<In, Out>) -> Self {
        Self {
            algorithm,
            lifecycle: Lifecycle::new(),
        }
    }

    /// Convenience: wrap an algorithm straight into a [`NodePtr`].
    pub fn create<A>(algorithm: A) -> NodePtr<In, Out>
    where
        A: Algorithm<In, Out> + 'static,
    {
        Arc::new(Self::new(Arc::new(algorithm)))
    }
}

impl<In, Out> ExecNode<In, Out> for AlgorithmAdapter<In, Out>
where
    In: Send + 'static,
    Out: Send + 'static,
{
    fn initialize(&self) {
        self.lifecycle.begin_init();
    }

    fn submit(&self, input: Handle<In>) -> Handle<Out> {
        self.lifecycle.assert_live(&self.name());
        promise::ready(self.algorithm.compute(input.wait()))
    }

    fn dispose(&self) {
        self.lifecycle.begin_dispose();
    }

    fn replicate(&self) -> NodePtr<In, Out> {
        self.lifecycle.assert_uninitialized(&self.name());
        Arc::new(Self::new(Arc::clone(&self.algorithm)))
    }

    fn thread_count(&self) -> usize {
        0
    }

    fn name(&self) -> String {
        self.algorithm.name()
    }
}

impl<In, Out> Drop for AlgorithmAdapter<In, Out> {
    fn drop(&mut self) {
        self.lifecycle.begin_dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithm::FnAlgorithm;
    use crate::promise::ready;

    #[test]
    fn computes_synchronously() {
        let node = AlgorithmAdapter::create(FnAlgorithm::new("double", |x: u32| x * 2));
        node.initialize();
        assert_eq!(node.submit(ready(21)).wait(), 42);
        assert_eq!(node.thread_count(), 0);
        assert_eq!(node.name(), "double");
        node.dispose();
    }

    #[test]
    #[should_panic(expected = "not initialized")]
    fn submit_before_initialize_panics() {
        let node = AlgorithmAdapter::create(FnAlgorithm::new("id", |x: u32| x));
        node.submit(ready(1));
    }

    #[test]
    fn replicate_is_uninitialized() {
        let node = AlgorithmAdapter::create(FnAlgorithm::new("id", |x: u32| x));
        let copy = node.replicate();
        copy.initialize();
        assert_eq!(copy.submit(ready(5)).wait(), 5);
        copy.dispose();
    }

    #[test]
    #[should_panic(expected = "cannot replicate")]
    fn replicate_initialized_panics() {
        let node = AlgorithmAdapter::create(FnAlgorithm::new("id", |x: u32| x));
        node.initialize();
        let _ = node.replicate();
    }
}
