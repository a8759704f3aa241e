/// Convolutional feature map taps used by the SSD300 detector.
///
/// Each variant names one of the six layers the model predicts from, ordered
/// from the early high-resolution tap (`Conv4_3`) down to the final 1x1 map.
/// Multi-scale prediction follows Liu et al., "SSD: Single Shot MultiBox
/// Detector" (https://arxiv.org/abs/1512.02325), Fig. 2.
#[repr(usize)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeatureLayer {
    /// Fourth VGG16 convolution block tap, L2-normalized before prediction.
    Conv4_3,
    /// Converted fully connected layer (FC7 in the original VGG16).
    Conv7,
    Conv8_2,
    Conv9_2,
    Conv10_2,
    /// Final 1x1 feature map.
    Conv11_2,
}

impl FeatureLayer {
    /// All prediction taps in detection order.
    pub fn as_list() -> Vec<FeatureLayer> {
        vec![
            FeatureLayer::Conv4_3,
            FeatureLayer::Conv7,
            FeatureLayer::Conv8_2,
            FeatureLayer::Conv9_2,
            FeatureLayer::Conv10_2,
            FeatureLayer::Conv11_2,
        ]
    }

    pub fn count() -> usize {
        Self::as_list().len()
    }

    /// One-based layer index `k`, used by the prior-box scale schedule.
    pub fn scale_index(&self) -> usize {
        *self as usize + 1
    }

    /// Aspect ratios of the default boxes tiled on this layer.
    ///
    /// The 38x38 tap and the two coarsest taps carry 4 boxes per cell
    /// (ratios plus the extra ar=1 box), the middle taps carry 6, matching
    /// the `3x3x(k*(Classes+4))` classifiers in the paper's Fig. 2.
    pub fn aspect_ratios(&self) -> Vec<f32> {
        match self {
            FeatureLayer::Conv4_3 => vec![1., 2., 1.0 / 2.0],
            FeatureLayer::Conv7 => vec![1., 2., 3., 1.0 / 2.0, 1.0 / 3.0],
            FeatureLayer::Conv8_2 => vec![1., 2., 3., 1.0 / 2.0, 1.0 / 3.0],
            FeatureLayer::Conv9_2 => vec![1., 2., 3., 1.0 / 2.0, 1.0 / 3.0],
            FeatureLayer::Conv10_2 => vec![1., 2., 1.0 / 2.0],
            FeatureLayer::Conv11_2 => vec![1., 2., 1.0 / 2.0],
        }
    }

    /// Number of output channels of the tap, which sizes the prediction head
    /// convolutions stacked on top of it.
    pub fn output_size(&self) -> usize {
        match self {
            FeatureLayer::Conv4_3 => 512,
            FeatureLayer::Conv7 => 1024,
            FeatureLayer::Conv8_2 => 512,
            FeatureLayer::Conv9_2 => 256,
            FeatureLayer::Conv10_2 => 256,
            FeatureLayer::Conv11_2 => 256,
        }
    }
}
