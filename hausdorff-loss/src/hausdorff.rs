//! Hausdorff distance-transform loss for boundary-aware training.

use burn::{
    prelude::*,
    tensor::{backend::Backend, Tensor},
};

use crate::distance::euclidean_distance_transform;
use hausdorff_kernels::HausdorffResult;

/// Configuration for the Hausdorff DT loss.
#[derive(Config, Debug)]
pub struct HausdorffDtLossConfig {
    #[config(default = 1.0)]
    pub weight: f32,
}

/// Hausdorff distance-transform loss.
///
/// A differentiable surrogate of the Hausdorff metric between two region
/// boundaries: the squared prediction error of each element, weighted by the
/// summed squared distance transforms of both masks, averaged over all
/// elements. Elements far from either boundary that disagree are penalized
/// hardest, which is what pulls predicted boundaries toward the target.
#[derive(Module, Debug)]
pub struct HausdorffDtLoss<B: Backend> {
    pub weight: f32,
    _phantom: std::marker::PhantomData<B>,
}

impl HausdorffDtLossConfig {
    /// Initialize a new Hausdorff DT loss with the given configuration.
    pub const fn init<B: Backend>(&self) -> HausdorffDtLoss<B> {
        HausdorffDtLoss {
            weight: self.weight,
            _phantom: std::marker::PhantomData,
        }
    }
}

impl<B: Backend> Default for HausdorffDtLoss<B> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: Backend> HausdorffDtLoss<B> {
    /// Create a new Hausdorff DT loss with default configuration.
    pub fn new() -> Self {
        HausdorffDtLossConfig::new().init()
    }

    /// Calculate the DTM-weighted boundary loss.
    ///
    /// # Arguments
    /// * `pred` - Predicted segmentation map with shape [N, C, H, W]
    /// * `target` - Ground truth segmentation map with shape [N, C, H, W]
    /// * `pred_dtm` - Distance transform of the predicted mask
    /// * `target_dtm` - Distance transform of the ground-truth mask
    ///
    /// # Returns
    /// The mean weighted squared difference as a scalar tensor.
    pub fn forward(
        &self,
        pred: Tensor<B, 4>,
        target: Tensor<B, 4>,
        pred_dtm: Tensor<B, 4>,
        target_dtm: Tensor<B, 4>,
    ) -> Tensor<B, 1> {
        let weight_field = pred_dtm.powf_scalar(2.0) + target_dtm.powf_scalar(2.0);
        ((pred - target).powf_scalar(2.0) * weight_field).mean() * self.weight
    }

    /// Calculate the loss deriving both weighting fields from the inputs
    /// themselves (foreground above 0.5, see
    /// [`euclidean_distance_transform`]).
    ///
    /// # Errors
    ///
    /// Propagates [`hausdorff_kernels::HausdorffError::InvalidInput`] if the
    /// mask data cannot be read back from the backend.
    pub fn forward_with_masks(
        &self,
        pred: Tensor<B, 4>,
        target: Tensor<B, 4>,
    ) -> HausdorffResult<Tensor<B, 1>> {
        let pred_dtm = euclidean_distance_transform(pred.clone())?;
        let target_dtm = euclidean_distance_transform(target.clone())?;
        Ok(self.forward(pred, target, pred_dtm, target_dtm))
    }
}

#[cfg(test)]
mod tests {
    use burn::backend::NdArray;
    use burn::tensor::{ElementConversion, TensorData};
    use hausdorff_kernels::reference_loss;

    use super::*;

    type TestBackend = NdArray<f32>;

    fn tensor_from(values: &[f32], shape: [usize; 4]) -> Tensor<TestBackend, 4> {
        let device = Default::default();
        Tensor::from_data(TensorData::new(values.to_vec(), shape), &device)
    }

    fn scalar(loss: Tensor<TestBackend, 1>) -> f32 {
        loss.into_scalar().elem::<f32>()
    }

    #[test]
    fn identical_inputs_give_zero() {
        let pred = [1.0_f32, 0.0, 1.0, 0.0];
        let dtm = [0.5_f32, 0.2, 0.9, 0.1];

        let loss = HausdorffDtLoss::new().forward(
            tensor_from(&pred, [1, 1, 2, 2]),
            tensor_from(&pred, [1, 1, 2, 2]),
            tensor_from(&dtm, [1, 1, 2, 2]),
            tensor_from(&dtm, [1, 1, 2, 2]),
        );
        assert_eq!(scalar(loss), 0.0);
    }

    #[test]
    fn unit_dtm_scenario_gives_two() {
        let pred = [1.0_f32; 4];
        let target = [0.0_f32; 4];
        let dtm = [1.0_f32; 4];

        let loss = HausdorffDtLoss::new().forward(
            tensor_from(&pred, [1, 1, 2, 2]),
            tensor_from(&target, [1, 1, 2, 2]),
            tensor_from(&dtm, [1, 1, 2, 2]),
            tensor_from(&dtm, [1, 1, 2, 2]),
        );
        assert!((scalar(loss) - 2.0).abs() < 1e-6);
    }

    #[test]
    fn matches_the_flat_buffer_oracle() {
        let n = 6 * 5;
        let pred: Vec<f32> = (0..n).map(|i| (i % 13) as f32 * 0.0625).collect();
        let target: Vec<f32> = (0..n).map(|i| (i % 7) as f32 * 0.125).collect();
        let pred_dtm: Vec<f32> = (0..n).map(|i| (i % 11) as f32 * 0.09375).collect();
        let target_dtm: Vec<f32> = (0..n).map(|i| (i % 5) as f32 * 0.1875).collect();

        let tensor_loss = HausdorffDtLoss::new().forward(
            tensor_from(&pred, [1, 1, 6, 5]),
            tensor_from(&target, [1, 1, 6, 5]),
            tensor_from(&pred_dtm, [1, 1, 6, 5]),
            tensor_from(&target_dtm, [1, 1, 6, 5]),
        );
        let oracle = reference_loss(&pred, &target, &pred_dtm, &target_dtm).unwrap();

        assert!(
            (scalar(tensor_loss) - oracle).abs() <= oracle.abs().max(1e-3) * 1e-5,
            "tensor path disagrees with the oracle"
        );
    }

    #[test]
    fn weight_scales_the_loss() {
        let pred = [1.0_f32; 4];
        let target = [0.0_f32; 4];
        let dtm = [1.0_f32; 4];

        let loss = HausdorffDtLossConfig::new().with_weight(0.5).init().forward(
            tensor_from(&pred, [1, 1, 2, 2]),
            tensor_from(&target, [1, 1, 2, 2]),
            tensor_from(&dtm, [1, 1, 2, 2]),
            tensor_from(&dtm, [1, 1, 2, 2]),
        );
        assert!((scalar(loss) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn mask_convenience_path_is_zero_for_identical_masks() {
        let mask = [1.0_f32, 0.0, 0.0, 1.0, 1.0, 0.0, 0.0, 0.0, 1.0];

        let loss = HausdorffDtLoss::new()
            .forward_with_masks(
                tensor_from(&mask, [1, 1, 3, 3]),
                tensor_from(&mask, [1, 1, 3, 3]),
            )
            .unwrap();
        assert_eq!(scalar(loss), 0.0);
    }

    #[test]
    fn mask_convenience_path_penalizes_disagreement() {
        let pred = [1.0_f32, 0.0, 0.0, 0.0];
        let target = [0.0_f32, 0.0, 0.0, 1.0];

        let loss = HausdorffDtLoss::new()
            .forward_with_masks(
                tensor_from(&pred, [1, 1, 2, 2]),
                tensor_from(&target, [1, 1, 2, 2]),
            )
            .unwrap();
        assert!(scalar(loss) > 0.0);
    }
}
