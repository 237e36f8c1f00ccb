//! Distance-transform weighting fields for the Hausdorff loss.
//!
//! The loss weights each element's squared error by the squared distances to
//! the nearest mask boundary, so training needs a Euclidean distance
//! transform of both the predicted and the ground-truth mask. The transform
//! here is the exact brute-force one: adequate for the mask resolutions the
//! loss is applied at, and a correctness baseline for faster ports.

use burn::tensor::{backend::Backend, Tensor, TensorData};
use hausdorff_kernels::{HausdorffError, HausdorffResult};

/// Euclidean distance transform of a binary mask.
///
/// For each element of a `[B, C, H, W]` mask (values above 0.5 are
/// foreground), computes the distance to the nearest foreground element of
/// the same plane; foreground elements map to 0. A plane with no foreground
/// keeps the `height + width` far sentinel everywhere.
///
/// # Errors
///
/// [`HausdorffError::InvalidInput`] if the tensor data cannot be read back
/// as `f32`.
pub fn euclidean_distance_transform<B: Backend>(
    mask: Tensor<B, 4>,
) -> HausdorffResult<Tensor<B, 4>> {
    let [batch, channels, height, width] = mask.dims();
    let device = mask.device();

    let data = mask
        .into_data()
        .convert::<f32>()
        .to_vec::<f32>()
        .map_err(|e| HausdorffError::InvalidInput {
            reason: format!("mask tensor data is not readable as f32: {e:?}"),
        })?;

    let plane = height * width;
    let far = (height + width) as f32;
    let mut distances = vec![far; data.len()];

    for p in 0..batch * channels {
        let src = &data[p * plane..(p + 1) * plane];
        let dst = &mut distances[p * plane..(p + 1) * plane];

        let mut foreground = Vec::new();
        for y in 0..height {
            for x in 0..width {
                if src[y * width + x] > 0.5 {
                    foreground.push((y as f32, x as f32));
                }
            }
        }

        for y in 0..height {
            for x in 0..width {
                let index = y * width + x;
                if src[index] > 0.5 {
                    dst[index] = 0.0;
                    continue;
                }
                for &(fy, fx) in &foreground {
                    let distance = (y as f32 - fy).hypot(x as f32 - fx);
                    if distance < dst[index] {
                        dst[index] = distance;
                    }
                }
            }
        }
    }

    Ok(Tensor::from_data(
        TensorData::new(distances, [batch, channels, height, width]),
        &device,
    ))
}
