//! Leaf computation contracts.
//!
//! An [`Algorithm`] is the unit the execution patterns compose: a pure
//! function from one value to another plus a display name. Implementations
//! must be safe to call concurrently on independent inputs; any configuration
//! they carry is immutable after construction.

use crate::shuffle::Key;
use std::sync::Arc;

/// A sequential leaf computation.
///
/// `compute` must be side-effect-free with respect to shared state: the
/// [`Executor`](crate::executor::Executor) may invoke the same instance from
/// several worker threads at once.
pub trait Algorithm<In, Out>: Send + Sync {
    fn compute(&self, input: In) -> Out;

    /// Diagnostic name, used when composing pattern names.
    fn name(&self) -> String;
}

/// Shared-ownership pointer to a leaf algorithm.
pub type AlgorithmPtr<In, Out> = Arc<dyn Algorithm<In, Out>>;

/// Adapt a closure into an [`Algorithm`].
///
/// ```
/// use parloom::algorithm::{Algorithm, FnAlgorithm};
///
/// let double = FnAlgorithm::new("double", |x: u32| x * 2);
/// assert_eq!(double.compute(21), 42);
/// ```
pub struct FnAlgorithm<F> {
    name: String,
    f: F,
}

impl<F> FnAlgorithm<F> {
    pub fn new(name: impl Into<String>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }
}

impl<In, Out, F> Algorithm<In, Out> for FnAlgorithm<F>
where
    F: Fn(In) -> Out + Send + Sync,
{
    fn compute(&self, input: In) -> Out {
        (self.f)(input)
    }

    fn name(&self) -> String {
        self.name.clone()
    }
}

/// Assigns each shuffle key to the cluster node that owns its final
/// reduction. Must be pure, and must return an index in `[0, node_count)`;
/// an out-of-range owner silently misroutes data, so the distributed variants
/// treat it as fatal.
pub trait Distributer: Send + Sync {
    fn owner(&self, key: Key) -> usize;

    fn name(&self) -> String;
}

/// Ownership by `key % node_count`.
pub struct ModuloDistributer {
    nodes: usize,
}

impl ModuloDistributer {
    pub fn new(nodes: usize) -> Self {
        assert!(nodes > 0, "distributer needs at least one node");
        Self { nodes }
    }
}

impl Distributer for ModuloDistributer {
    fn owner(&self, key: Key) -> usize {
        key % self.nodes
    }

    fn name(&self) -> String {
        format!("modulo({})", self.nodes)
    }
}
