//! # Parloom
//!
//! A library of **composable parallel execution patterns** for Rust. Parloom
//! wraps sequential leaf computations in reusable skeletons (worker pools,
//! two-stage pipelines, and several map-reduce variants) that all share one
//! submission contract, so a pool can feed a pipeline whose stages are
//! themselves pools.
//!
//! ## Key Features
//!
//! - **One contract for everything** - every pattern implements
//!   [`ExecNode`](node::ExecNode), so patterns nest freely
//! - **Promise-based hand-off** - submission returns immediately with a
//!   [`Handle`](promise::Handle) the caller redeems when it needs the value
//! - **Replicated executors** - an [`Executor`] fans work out over replicas of
//!   a node, round-robin
//! - **Lock-free dispatch** - work travels through crossbeam segment queues;
//!   workers poll and yield, never block on a lock to fetch work
//! - **Keyed shuffle** - a fixed 768-bucket [`KeyedShuffleBuffer`] collects
//!   mapper output by key for the reduce stage
//! - **Cluster-ready map-reduce** - [`MapReduceGlobal`] redistributes keys
//!   across process ranks over a pluggable [`ClusterTransport`] and merges the
//!   final result on rank 0
//!
//! ## Quick Start
//!
//! ```
//! use parloom::{AlgorithmAdapter, TaskPool, promise};
//! use parloom::algorithms::QuickSort;
//! use parloom::node::ExecNode;
//!
//! let pool = TaskPool::create(AlgorithmAdapter::create(QuickSort::<u32>::new()), 4);
//! pool.initialize();
//!
//! let sorted = pool.submit(promise::ready(vec![3, 1, 2]));
//! assert_eq!(sorted.wait(), vec![1, 2, 3]);
//!
//! pool.dispose();
//! ```
//!
//! ## Core Concepts
//!
//! ### ExecNode
//!
//! An [`ExecNode<In, Out>`](node::ExecNode) accepts a handle to an input and
//! returns a handle to the eventual output. The lifecycle is explicit:
//! `initialize` spawns whatever threads the node needs, `submit` may be
//! called from any thread while the node is live, and `dispose` stops and
//! joins them. [`replicate`](node::ExecNode::replicate) clones an
//! uninitialized node so an [`Executor`] can run several copies side by side.
//!
//! ### Algorithm
//!
//! An [`Algorithm<In, Out>`](algorithm::Algorithm) is the sequential leaf: a
//! pure `compute` function plus a diagnostic name. [`AlgorithmAdapter`] lifts
//! an algorithm into the `ExecNode` contract without spawning any threads;
//! closures can be lifted via [`FnAlgorithm`](algorithm::FnAlgorithm).
//!
//! ### Patterns
//!
//! - [`TaskPool`] - N workers pulling from a shared queue
//! - [`Pipeline`] - two stages connected by an intermediate handle, each
//!   stage a full `ExecNode` in its own right
//! - [`MapReduceHorizontal`] - map and shuffle per input element, then reduce
//!   each key's value list
//! - [`MapReduceVertical`] - map per element, then fold the per-element maps
//!   pairwise with a combiner
//! - [`MapReduceGlobal`] - the horizontal flow plus a cross-rank key exchange
//!   driven by a [`Distributer`](algorithm::Distributer)
//!
//! ### Cluster execution
//!
//! The distributed variants talk to peers through the [`ClusterTransport`]
//! trait. [`LocalCluster`](cluster::LocalCluster) implements it in-process
//! with one thread per rank, which is what the distributed tests run on.
//! Values cross the wire via serde and postcard.
//!
//! ## Module Overview
//!
//! - [`algorithm`] - the leaf computation contract and key ownership
//! - [`algorithms`] - ready-made leaves: sorting, arithmetic, histograms
//! - [`adapter`] - lifts an algorithm into the node contract
//! - [`node`] - the `ExecNode` contract and lifecycle state
//! - [`promise`] - single-value promise/handle cells
//! - [`queue`] - lock-free work queues and queue items
//! - [`executor`] - round-robin replica manager
//! - [`task_pool`], [`pipeline`], [`mapreduce`] - the patterns
//! - [`shuffle`] - the fixed-key-space shuffle buffer
//! - [`cluster`] - transport trait, wire framing, in-process cluster
//! - [`testing`] - assertion helpers for pattern outputs

pub mod adapter;
pub mod algorithm;
pub mod algorithms;
pub mod cluster;
pub mod executor;
pub mod mapreduce;
pub mod node;
pub mod pipeline;
pub mod promise;
pub mod queue;
pub mod shuffle;
pub mod task_pool;
pub mod testing;

pub use adapter::AlgorithmAdapter;
pub use cluster::ClusterTransport;
pub use executor::Executor;
pub use mapreduce::{MapReduceGlobal, MapReduceHorizontal, MapReduceVertical};
pub use pipeline::Pipeline;
pub use shuffle::{KEY_SPACE, Key, KeyedShuffleBuffer};
pub use task_pool::TaskPool;

/// Worker count matching the machine's logical CPUs, the usual default for
/// a [`TaskPool`].
pub fn default_parallelism() -> usize {
    num_cpus::get().max(1)
}
