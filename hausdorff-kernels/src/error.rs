use thiserror::Error;

/// The error type for loss-reduction operations.
///
/// All failures are detected either at the calling boundary (input
/// validation, before any device work is issued) or at the single
/// host/device join point; no partial results are ever returned.
#[derive(Error, Debug)]
pub enum HausdorffError {
    /// Error for when the input buffer lengths are not pairwise equal.
    #[error("shape mismatch: `{buffer}` has {actual} elements, expected {expected}")]
    ShapeMismatch {
        /// Name of the offending buffer.
        buffer: &'static str,
        /// The element count shared by the preceding buffers.
        expected: usize,
        /// The element count actually supplied.
        actual: usize,
    },

    /// Error for when an input cannot be reduced at all, such as empty
    /// buffers or (in validation builds) non-finite values.
    #[error("invalid input: {reason}")]
    InvalidInput {
        /// The reason why the input is invalid.
        reason: String,
    },

    /// Error for when no accelerator is present or its context failed to
    /// initialize. The documented recovery is to fall back to a CPU path.
    #[error("accelerator unavailable: {reason}")]
    DeviceUnavailable {
        /// The reason why the accelerator could not be acquired.
        reason: String,
    },

    /// Error for when a kernel launch or synchronization fails, reported at
    /// the host join point. Fatal to that call; never retried internally.
    #[error("accelerator failure: {reason}")]
    DeviceError {
        /// A description of the failed device operation.
        reason: String,
    },
}

/// A specialized `Result` type for loss-reduction operations.
pub type HausdorffResult<T> = Result<T, HausdorffError>;
