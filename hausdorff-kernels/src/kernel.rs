//! Thread-pool rendition of the block-cooperative reduction.
//!
//! Blocks are independent units of work scheduled across the rayon pool;
//! each runs the same cooperative program as the CUDA kernel: guarded term
//! computation into a zero-initialized scratch buffer, then a halving tree
//! whose barrier phases collapse to phase-ordered loops on a single worker.
//! Per-block partials are folded by the pool instead of a contended global
//! accumulator.

use rayon::prelude::*;

use crate::{formula::weighted_term, launch::LaunchPlan, promote::WorkingFloat};

/// Reduce one block's slice of the element range to a single partial sum.
///
/// Threads whose global index falls past the end of the buffers contribute
/// nothing, but their scratch slot is still zero-initialized: the tree reads
/// every slot in the active window unconditionally.
fn block_partial<F: WorkingFloat>(
    block: usize,
    plan: &LaunchPlan,
    pred: &[F],
    truth: &[F],
    pred_dtm: &[F],
    truth_dtm: &[F],
) -> F {
    let n = pred.len();
    let threads = plan.threads_per_block;
    let base = block * threads;

    let mut scratch = vec![F::zero(); threads];
    for t in 0..threads {
        let i = base + t;
        if i < n {
            scratch[t] = weighted_term(pred[i], truth[i], pred_dtm[i], truth_dtm[i]);
        }
    }

    // Halving tree over a shrinking window. `half` rounds the odd case up,
    // so a non-power-of-two window folds without dropping any slot: width 5
    // folds slots 3 and 4 into 0 and 1, leaving width 3, and so on down to 1.
    let mut width = threads;
    while width > 1 {
        let half = (width - 1) / 2 + 1;
        for t in 0..width - half {
            scratch[t] = scratch[t] + scratch[t + half];
        }
        width = half;
    }

    scratch[0]
}

/// Execute the launch plan across the thread pool and return the raw sum
/// over all elements (the planner performs the final division).
pub(crate) fn launch_blocks<F: WorkingFloat>(
    plan: &LaunchPlan,
    pred: &[F],
    truth: &[F],
    pred_dtm: &[F],
    truth_dtm: &[F],
) -> F {
    (0..plan.block_count)
        .into_par_iter()
        .map(|block| block_partial(block, plan, pred, truth, pred_dtm, truth_dtm))
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Plain sequential accumulation over all terms, the baseline the tree
    /// must match element-for-element.
    fn sequential_sum(pred: &[f32], truth: &[f32], pred_dtm: &[f32], truth_dtm: &[f32]) -> f32 {
        (0..pred.len())
            .map(|i| weighted_term(pred[i], truth[i], pred_dtm[i], truth_dtm[i]))
            .sum()
    }

    /// Bounded cyclic data so every term stays O(1) and tolerances hold at
    /// any length.
    fn cyclic(n: usize, period: usize, scale: f32, offset: f32) -> Vec<f32> {
        (0..n).map(|i| (i % period) as f32 * scale + offset).collect()
    }

    fn assert_tree_matches_sequential(n: usize, max_threads: usize) {
        let pred = cyclic(n, 13, 0.0625, 0.0);
        let truth = cyclic(n, 7, 0.125, 0.25);
        let pred_dtm = cyclic(n, 11, 0.09375, 0.5);
        let truth_dtm = cyclic(n, 5, 0.1875, 0.125);

        let plan = LaunchPlan::new(n, max_threads).unwrap();
        let tree = launch_blocks(&plan, &pred, &truth, &pred_dtm, &truth_dtm);
        let sequential = sequential_sum(&pred, &truth, &pred_dtm, &truth_dtm);

        let tolerance = sequential.abs().max(1.0) * 1e-5;
        assert!(
            (tree - sequential).abs() <= tolerance,
            "n={n}, max_threads={max_threads}: tree={tree}, sequential={sequential}"
        );
    }

    #[test]
    fn exact_multiple_of_block_size() {
        assert_tree_matches_sequential(256, 256);
        assert_tree_matches_sequential(512, 256);
    }

    #[test]
    fn one_past_a_full_block_is_not_dropped() {
        assert_tree_matches_sequential(257, 256);
        assert_tree_matches_sequential(9, 8);
    }

    #[test]
    fn odd_block_widths_fold_completely() {
        // Width 5 exercises the 5 -> 3 -> 2 -> 1 halving chain; width 7 the
        // 7 -> 4 -> 2 -> 1 chain.
        assert_tree_matches_sequential(5, 5);
        assert_tree_matches_sequential(7, 7);
        assert_tree_matches_sequential(21, 7);
        assert_tree_matches_sequential(23, 3);
    }

    #[test]
    fn single_element_launch() {
        assert_tree_matches_sequential(1, 256);
    }

    #[test]
    fn partial_tail_block_is_guarded() {
        // 2 full blocks of 4 plus a tail block holding a single element.
        assert_tree_matches_sequential(9, 4);
    }

    #[test]
    fn equal_buffers_reduce_to_exactly_zero() {
        let values = cyclic(100, 9, 0.1, 0.0);
        let dtm = cyclic(100, 6, 0.2, 0.3);

        let plan = LaunchPlan::new(100, 32).unwrap();
        let sum: f32 = launch_blocks(&plan, &values, &values, &dtm, &dtm);
        assert_eq!(sum, 0.0);
    }
}
