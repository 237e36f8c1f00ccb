//! Host-side launch planning and dispatch.
//!
//! The planner translates an arbitrary-length flattened input into concrete
//! execution geometry (threads per block, block count, shared scratch
//! footprint), issues the kernel, and finalizes the scalar by dividing the
//! global sum by the element count. When no accelerator can be acquired the
//! same plan runs on the CPU block engine.

use crate::{
    error::{HausdorffError, HausdorffResult},
    formula::validate_buffers,
    kernel,
    promote::{promote_buffer, LossElement, Promote, WorkingFloat},
};

/// Default thread-block cap: a safe upper bound on cooperating threads
/// within one block for current CUDA targets.
pub const DEFAULT_MAX_THREADS: usize = 256;

/// Capability descriptor for the target accelerator.
#[derive(Debug, Clone)]
pub struct DeviceCaps {
    /// Upper bound on cooperating threads within one block.
    pub max_threads: usize,
}

impl Default for DeviceCaps {
    fn default() -> Self {
        Self {
            max_threads: DEFAULT_MAX_THREADS,
        }
    }
}

/// Concrete execution geometry for one reduction launch.
///
/// Sizing is pure arithmetic over the element count and the device cap, so
/// it is testable without any device:
/// `threads_per_block = min(n, max_threads)`,
/// `block_count = ceil(n / threads_per_block)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchPlan {
    /// Cooperating threads within each block.
    pub threads_per_block: usize,
    /// Number of independent blocks; the last one may be partially filled.
    pub block_count: usize,
}

impl LaunchPlan {
    /// Size a launch for `n` elements under the given thread-block cap.
    ///
    /// # Errors
    ///
    /// [`HausdorffError::InvalidInput`] if `n` or `max_threads` is zero; the
    /// kernel must never be launched over an empty range.
    pub fn new(n: usize, max_threads: usize) -> HausdorffResult<Self> {
        if n == 0 {
            return Err(HausdorffError::InvalidInput {
                reason: "cannot plan a launch over zero elements".to_owned(),
            });
        }
        if max_threads == 0 {
            return Err(HausdorffError::InvalidInput {
                reason: "thread-block cap must be non-zero".to_owned(),
            });
        }

        let threads_per_block = n.min(max_threads);
        Ok(Self {
            threads_per_block,
            block_count: n.div_ceil(threads_per_block),
        })
    }

    /// Bytes of block-shared scratch required for working type `F`: one slot
    /// per thread.
    pub fn shared_mem_bytes<F>(&self) -> usize {
        self.threads_per_block * std::mem::size_of::<F>()
    }
}

/// Mean weighted squared difference over four equal-length buffers, reduced
/// in parallel under the default device capabilities.
///
/// Dispatches to the CUDA kernel when the `cuda` feature is enabled and a
/// device answers the probe; otherwise the identical plan runs on the CPU
/// block engine. The result is deterministic up to the floating-point
/// summation-order nondeterminism inherent to parallel reduction.
///
/// # Errors
///
/// [`HausdorffError::ShapeMismatch`] and [`HausdorffError::InvalidInput`]
/// before any device work is issued; [`HausdorffError::DeviceError`] if a
/// launch or synchronization fails at the host join point (never retried
/// internally).
pub fn reduction_loss<P, D>(
    pred: &[P],
    truth: &[P],
    pred_dtm: &[D],
    truth_dtm: &[D],
) -> HausdorffResult<P::Working>
where
    P: Promote<D>,
    D: LossElement,
{
    reduction_loss_with_caps(pred, truth, pred_dtm, truth_dtm, &DeviceCaps::default())
}

/// [`reduction_loss`] with an explicit thread-block cap override.
pub fn reduction_loss_with_caps<P, D>(
    pred: &[P],
    truth: &[P],
    pred_dtm: &[D],
    truth_dtm: &[D],
    caps: &DeviceCaps,
) -> HausdorffResult<P::Working>
where
    P: Promote<D>,
    D: LossElement,
{
    let n = validate_buffers(pred, truth, pred_dtm, truth_dtm)?;
    let plan = LaunchPlan::new(n, caps.max_threads)?;

    let pred_w: Vec<P::Working> = promote_buffer(pred);
    let truth_w: Vec<P::Working> = promote_buffer(truth);
    let pred_dtm_w: Vec<P::Working> = promote_buffer(pred_dtm);
    let truth_dtm_w: Vec<P::Working> = promote_buffer(truth_dtm);

    let sum = match P::Working::reduce_cuda(&pred_w, &truth_w, &pred_dtm_w, &truth_dtm_w, &plan) {
        Ok(sum) => {
            log::debug!(
                "CUDA reduction over {n} elements: {} blocks of {} threads",
                plan.block_count,
                plan.threads_per_block
            );
            sum
        }
        Err(HausdorffError::DeviceUnavailable { reason }) => {
            log::debug!("accelerator unavailable ({reason}); using the CPU block engine");
            kernel::launch_blocks(&plan, &pred_w, &truth_w, &pred_dtm_w, &truth_dtm_w)
        }
        Err(other) => return Err(other),
    };

    Ok(sum / P::Working::from_widened(n as f64))
}
