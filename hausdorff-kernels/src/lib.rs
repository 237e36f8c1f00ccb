//! Weighted reduction kernels for Hausdorff distance-transform losses.
//!
//! The loss is a boundary-aware Hausdorff-distance surrogate: a weighted
//! sum-of-squared-differences between a prediction and its ground truth,
//! with precomputed distance-transform maps of each acting as per-element
//! weighting fields. This crate reduces four equal-length flat buffers to
//! that single scalar.
//!
//! # Kernel strategy
//!
//! ## GPU path (feature `cuda`)
//!
//! One thread per element. Each thread block folds its members' terms in
//! shared memory with a halving tree that is safe for non-power-of-two block
//! sizes, then contributes its partial sum to a single global accumulator
//! through one `atomicAdd`. The host sizes the launch
//! (`threads_per_block = min(n, max_threads)`, one scratch slot per thread),
//! joins on the stream, and divides the accumulator by the element count.
//!
//! ## CPU path
//!
//! The same launch plan executed across a rayon thread pool: one task per
//! block, the identical halving tree over a per-block scratch buffer, and
//! per-block partials folded by the pool. This path also serves as the
//! recovery when no accelerator is present.
//!
//! Both paths must agree with [`reference_loss`], the sequential oracle,
//! within floating-point summation-order tolerance.
//!
//! Inputs of any rank are accepted in flattened form. Working precision is
//! promoted across the two input families through the [`Promote`] rule
//! table; boolean or integer predictions combine with floating
//! distance maps without implicit coercion surprises.

mod error;
mod formula;
mod kernel;
mod launch;
mod promote;

#[cfg(feature = "cuda")]
pub mod cuda;

pub use error::{HausdorffError, HausdorffResult};
pub use formula::reference_loss;
pub use launch::{
    reduction_loss, reduction_loss_with_caps, DeviceCaps, LaunchPlan, DEFAULT_MAX_THREADS,
};
pub use promote::{LossElement, Promote, WorkingFloat};
