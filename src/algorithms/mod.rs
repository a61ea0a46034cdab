//! Ready-made leaf algorithms.
//!
//! These satisfy the [`Algorithm`](crate::algorithm::Algorithm) contract and
//! cover the workloads the patterns were built against: sorting and simple
//! arithmetic for the pools and pipelines, histogram decomposition and
//! reduction for the map-reduce variants.

pub mod arith;
pub mod bitmap;
pub mod histogram;
pub mod sort;

pub use arith::{Increase, ModuloKey, Nop, ReduceAdd, ReduceAddVec};
pub use bitmap::{BitmapFileHistogram, BitmapHistogram, BitmapHistogramParts, first_bitmap, load_bitmap};
pub use histogram::{Histogram, MergeCounts, ReduceHistogram};
pub use sort::QuickSort;
