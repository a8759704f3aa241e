use burn::{
    module::{Module, Param},
    tensor::{Tensor, backend::Backend},
};

/// Channel-wise L2 normalization with a learned per-channel scale.
///
/// “SSD: Single Shot MultiBox Detector” - Pg. 7
///
/// Since, as pointed out in [12], conv4 3 has a different feature scale
/// compared to the other layers, we use the L2 normalization technique
/// introduced in [12] to scale the feature norm at each location in the
/// feature map to 20 and learn the scale during back propagation.
///
/// [12] is ParseNet (Liu et al., https://arxiv.org/abs/1506.04579).
#[derive(Module, Debug)]
pub struct L2Norm<B: Backend> {
    pub gamma: Param<Tensor<B, 1>>,
}

impl<B: Backend> L2Norm<B> {
    pub fn new(device: &B::Device, channels: usize) -> Self {
        L2Norm {
            gamma: Param::from_tensor(Tensor::full([channels], 20.0, device)),
        }
    }

    /// Normalizes each spatial location of `input` `(B, C, H, W)` to unit L2
    /// norm over the channel axis, then rescales channels by `gamma`.
    pub fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
        let [batch_size, channels, height, width] = input.shape().dims();

        let norm = input
            .clone()
            .powi_scalar(2)
            .sum_dim(1)
            .sqrt()
            .clamp_min(1e-10);

        let scale = self
            .gamma
            .val()
            .reshape([1, channels, 1, 1])
            .expand([batch_size, channels, height, width]);

        input / norm.expand([batch_size, channels, height, width]) * scale
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::{NdArray, ndarray::NdArrayDevice};
    use burn::tensor::Tolerance;

    type B = NdArray<f32>;

    #[test]
    fn unit_norm_times_gamma() {
        let device = NdArrayDevice::default();
        let norm: L2Norm<B> = L2Norm::new(&device, 2);

        // two channels, one location: (3, 4) has L2 norm 5
        let input = Tensor::<B, 4>::from_data([[[[3.0]], [[4.0]]]], &device);
        let out = norm.forward(input);

        out.into_data().assert_approx_eq::<f32>(
            &Tensor::<B, 4>::from_data([[[[12.0]], [[16.0]]]], &device).into_data(),
            Tolerance::default(),
        );
    }

    #[test]
    fn gamma_starts_at_twenty() {
        let device = NdArrayDevice::default();
        let norm: L2Norm<B> = L2Norm::new(&device, 512);

        let gamma = norm.gamma.val();
        assert_eq!(gamma.shape().dims, [512]);
        gamma
            .into_data()
            .assert_eq(&Tensor::<B, 1>::full([512], 20.0, &device).into_data(), true);
    }
}
