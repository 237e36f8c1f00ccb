//! CUDA rendition of the block-cooperative reduction kernel.
//!
//! One thread maps to one (or zero) element index. Each block computes its
//! members' weighted squared-difference terms into dynamic shared memory,
//! folds them with a halving tree that is safe for non-power-of-two block
//! sizes, and the surviving thread publishes the block partial with a single
//! `atomicAdd` into a zero-initialized global accumulator. The host joins on
//! the stream before reading the accumulator back.
//!
//! Kernels are compiled from inline CUDA C through NVRTC when the
//! accelerator is acquired; all device resources live for one reduction
//! call and are reclaimed when the accelerator is dropped.

use std::sync::Arc;

use cudarc::driver::{CudaContext, CudaFunction, CudaStream, LaunchConfig, PushKernelArg};
use cudarc::nvrtc::compile_ptx;

use crate::{
    error::{HausdorffError, HausdorffResult},
    launch::LaunchPlan,
};

/// Inline CUDA C source for the weighted squared-difference reduction, in
/// f32 and f64 working precisions.
///
/// The halving rule `half = (width - 1) / 2 + 1` rounds the odd case up so
/// no scratch slot is dropped when the block size is not a power of two.
/// Guarded-off threads in the final partial block still zero their slot,
/// since the tree reads every slot in the active window unconditionally.
pub const KERNEL_SRC: &str = r#"
#if defined(__CUDA_ARCH__) && __CUDA_ARCH__ < 600
static __device__ double atomicAdd(double* address, double val)
{
    unsigned long long int* address_as_ull = (unsigned long long int*)address;
    unsigned long long int old = *address_as_ull;
    unsigned long long int assumed;
    do {
        assumed = old;
        old = atomicCAS(address_as_ull, assumed,
                        __double_as_longlong(val + __longlong_as_double(assumed)));
    } while (assumed != old);
    return __longlong_as_double(old);
}
#endif

extern "C" __global__ void hausdorff_wsd_f32(
    const float* __restrict__ pred,
    const float* __restrict__ truth,
    const float* __restrict__ pred_dtm,
    const float* __restrict__ truth_dtm,
    float* __restrict__ accum,
    int n)
{
    extern __shared__ float scratch_f32[];
    unsigned int t = threadIdx.x;
    unsigned int i = blockIdx.x * blockDim.x + t;

    float term = 0.0f;
    if (i < (unsigned int)n) {
        float d = pred[i] - truth[i];
        term = d * d * (pred_dtm[i] * pred_dtm[i] + truth_dtm[i] * truth_dtm[i]);
    }
    scratch_f32[t] = term;
    __syncthreads();

    for (unsigned int width = blockDim.x; width > 1; ) {
        unsigned int half = (width - 1) / 2 + 1;
        if (t + half < width) {
            scratch_f32[t] += scratch_f32[t + half];
        }
        __syncthreads();
        width = half;
    }

    if (t == 0) {
        atomicAdd(accum, scratch_f32[0]);
    }
}

extern "C" __global__ void hausdorff_wsd_f64(
    const double* __restrict__ pred,
    const double* __restrict__ truth,
    const double* __restrict__ pred_dtm,
    const double* __restrict__ truth_dtm,
    double* __restrict__ accum,
    int n)
{
    extern __shared__ double scratch_f64[];
    unsigned int t = threadIdx.x;
    unsigned int i = blockIdx.x * blockDim.x + t;

    double term = 0.0;
    if (i < (unsigned int)n) {
        double d = pred[i] - truth[i];
        term = d * d * (pred_dtm[i] * pred_dtm[i] + truth_dtm[i] * truth_dtm[i]);
    }
    scratch_f64[t] = term;
    __syncthreads();

    for (unsigned int width = blockDim.x; width > 1; ) {
        unsigned int half = (width - 1) / 2 + 1;
        if (t + half < width) {
            scratch_f64[t] += scratch_f64[t + half];
        }
        __syncthreads();
        width = half;
    }

    if (t == 0) {
        atomicAdd(accum, scratch_f64[0]);
    }
}
"#;

fn device_error(context: &str, detail: impl std::fmt::Debug) -> HausdorffError {
    HausdorffError::DeviceError {
        reason: format!("{context}: {detail:?}"),
    }
}

/// CUDA accelerator for the weighted squared-difference reduction.
pub struct CudaReduction {
    #[allow(dead_code)]
    ctx: Arc<CudaContext>,
    stream: Arc<CudaStream>,
    kernel_f32: CudaFunction,
    kernel_f64: CudaFunction,
}

impl CudaReduction {
    /// Check if CUDA is available at runtime (driver loaded, GPU present).
    pub fn is_available() -> bool {
        // `cudarc` can panic when the CUDA driver shared library is missing
        // (e.g. on non-CUDA machines). Treat that as "not available".
        std::panic::catch_unwind(|| CudaContext::new(0).is_ok()).unwrap_or(false)
    }

    /// Acquire device 0 and compile the reduction kernels.
    ///
    /// # Errors
    ///
    /// [`HausdorffError::DeviceUnavailable`] when no driver or device can be
    /// acquired; [`HausdorffError::DeviceError`] when NVRTC compilation or
    /// module loading fails on an otherwise healthy device.
    pub fn new() -> HausdorffResult<Self> {
        let ctx = match std::panic::catch_unwind(|| CudaContext::new(0)) {
            Ok(Ok(ctx)) => ctx,
            Ok(Err(e)) => {
                return Err(HausdorffError::DeviceUnavailable {
                    reason: format!("failed to acquire CUDA device 0: {e:?}"),
                })
            }
            Err(_) => {
                return Err(HausdorffError::DeviceUnavailable {
                    reason: "CUDA driver library not available".to_owned(),
                })
            }
        };
        let stream = ctx.default_stream();

        let ptx = compile_ptx(KERNEL_SRC).map_err(|e| device_error("NVRTC compilation failed", e))?;
        let module = ctx
            .load_module(ptx)
            .map_err(|e| device_error("failed to load PTX module", e))?;
        let kernel_f32 = module
            .load_function("hausdorff_wsd_f32")
            .map_err(|e| device_error("hausdorff_wsd_f32 not found", e))?;
        let kernel_f64 = module
            .load_function("hausdorff_wsd_f64")
            .map_err(|e| device_error("hausdorff_wsd_f64 not found", e))?;

        Ok(Self {
            ctx,
            stream,
            kernel_f32,
            kernel_f64,
        })
    }
}

macro_rules! impl_reduce {
    ($name:ident, $ty:ty, $kernel:ident) => {
        impl CudaReduction {
            /// Run one reduction launch and return the raw global
            /// accumulator (the un-normalized sum over all elements).
            ///
            /// The accumulator is freshly zero-allocated per call, mutated
            /// only by per-block `atomicAdd`, and read back exactly once
            /// after the stream join.
            pub fn $name(
                &self,
                pred: &[$ty],
                truth: &[$ty],
                pred_dtm: &[$ty],
                truth_dtm: &[$ty],
                plan: &LaunchPlan,
            ) -> HausdorffResult<$ty> {
                let d_pred = self
                    .stream
                    .memcpy_stod(pred)
                    .map_err(|e| device_error("failed to copy pred to device", e))?;
                let d_truth = self
                    .stream
                    .memcpy_stod(truth)
                    .map_err(|e| device_error("failed to copy truth to device", e))?;
                let d_pred_dtm = self
                    .stream
                    .memcpy_stod(pred_dtm)
                    .map_err(|e| device_error("failed to copy pred_dtm to device", e))?;
                let d_truth_dtm = self
                    .stream
                    .memcpy_stod(truth_dtm)
                    .map_err(|e| device_error("failed to copy truth_dtm to device", e))?;
                let mut d_accum = self
                    .stream
                    .alloc_zeros::<$ty>(1)
                    .map_err(|e| device_error("failed to allocate the accumulator", e))?;

                let cfg = LaunchConfig {
                    grid_dim: (plan.block_count as u32, 1, 1),
                    block_dim: (plan.threads_per_block as u32, 1, 1),
                    shared_mem_bytes: plan.shared_mem_bytes::<$ty>() as u32,
                };
                let n = pred.len() as i32;

                let mut builder = self.stream.launch_builder(&self.$kernel);
                builder.arg(&d_pred);
                builder.arg(&d_truth);
                builder.arg(&d_pred_dtm);
                builder.arg(&d_truth_dtm);
                builder.arg(&mut d_accum);
                builder.arg(&n);

                // Safety: kernel signature matches the CUDA source; buffer
                // lengths were validated by the planner.
                unsafe { builder.launch(cfg) }
                    .map_err(|e| device_error("kernel launch failed", e))?;

                // The host join: every block has contributed once past this
                // point.
                self.stream
                    .synchronize()
                    .map_err(|e| device_error("stream synchronize failed", e))?;

                let host: Vec<$ty> = self
                    .stream
                    .memcpy_dtov(&d_accum)
                    .map_err(|e| device_error("failed to copy the accumulator to host", e))?;
                host.first().copied().ok_or_else(|| HausdorffError::DeviceError {
                    reason: "accumulator read back empty".to_owned(),
                })
            }
        }
    };
}

impl_reduce!(reduce_f32, f32, kernel_f32);
impl_reduce!(reduce_f64, f64, kernel_f64);
