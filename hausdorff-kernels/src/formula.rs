//! Sequential reference path for the weighted squared-difference loss.
//!
//! This is the correctness oracle: a pure, single-threaded accumulation of
//! `mean((pred[i] - truth[i])^2 * (pred_dtm[i]^2 + truth_dtm[i]^2))` that
//! every accelerated path must match within floating-point tolerance. It is
//! also the documented recovery when no accelerator can be acquired.

use num_traits::Float;

use crate::{
    error::{HausdorffError, HausdorffResult},
    promote::{LossElement, Promote, WorkingFloat},
};

/// One element's contribution: `(pred - truth)^2 * (pred_dtm^2 + truth_dtm^2)`.
#[inline]
pub(crate) fn weighted_term<F: Float>(pred: F, truth: F, pred_dtm: F, truth_dtm: F) -> F {
    let diff = pred - truth;
    diff * diff * (pred_dtm * pred_dtm + truth_dtm * truth_dtm)
}

/// Validate the four-buffer input contract and return the shared element
/// count. Rejects mismatched lengths and empty inputs before any compute.
pub(crate) fn validate_buffers<P: LossElement, D: LossElement>(
    pred: &[P],
    truth: &[P],
    pred_dtm: &[D],
    truth_dtm: &[D],
) -> HausdorffResult<usize> {
    let n = pred.len();
    if truth.len() != n {
        return Err(HausdorffError::ShapeMismatch {
            buffer: "truth",
            expected: n,
            actual: truth.len(),
        });
    }
    if pred_dtm.len() != n {
        return Err(HausdorffError::ShapeMismatch {
            buffer: "pred_dtm",
            expected: n,
            actual: pred_dtm.len(),
        });
    }
    if truth_dtm.len() != n {
        return Err(HausdorffError::ShapeMismatch {
            buffer: "truth_dtm",
            expected: n,
            actual: truth_dtm.len(),
        });
    }
    if n == 0 {
        return Err(HausdorffError::InvalidInput {
            reason: "loss reduction over zero elements".to_owned(),
        });
    }

    #[cfg(debug_assertions)]
    {
        check_finite(pred, "pred")?;
        check_finite(truth, "truth")?;
        check_finite(pred_dtm, "pred_dtm")?;
        check_finite(truth_dtm, "truth_dtm")?;
    }

    Ok(n)
}

/// Validation-build scan for values the reduction would silently propagate
/// as NaN.
#[cfg(debug_assertions)]
fn check_finite<E: LossElement>(buffer: &[E], name: &'static str) -> HausdorffResult<()> {
    for (index, value) in buffer.iter().enumerate() {
        if !value.widen().is_finite() {
            return Err(HausdorffError::InvalidInput {
                reason: format!("non-finite value at index {index} in `{name}`"),
            });
        }
    }
    Ok(())
}

/// Mean weighted squared difference over four equal-length buffers,
/// accumulated sequentially on the host.
///
/// Arrays of any rank are accepted in flattened form; only the total element
/// count matters. The result is a scalar of the promoted working precision.
///
/// # Errors
///
/// [`HausdorffError::ShapeMismatch`] if the lengths are not pairwise equal,
/// [`HausdorffError::InvalidInput`] for empty buffers.
pub fn reference_loss<P, D>(
    pred: &[P],
    truth: &[P],
    pred_dtm: &[D],
    truth_dtm: &[D],
) -> HausdorffResult<P::Working>
where
    P: Promote<D>,
    D: LossElement,
{
    let n = validate_buffers(pred, truth, pred_dtm, truth_dtm)?;

    let mut sum = <P::Working as num_traits::Zero>::zero();
    for i in 0..n {
        sum = sum
            + weighted_term(
                P::Working::from_widened(pred[i].widen()),
                P::Working::from_widened(truth[i].widen()),
                P::Working::from_widened(pred_dtm[i].widen()),
                P::Working::from_widened(truth_dtm[i].widen()),
            );
    }
    Ok(sum / P::Working::from_widened(n as f64))
}
