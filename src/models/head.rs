use burn::nn::PaddingConfig2d;
use burn::nn::conv::Conv2d;
use burn::nn::conv::Conv2dConfig;
use burn::{module::Module, tensor::backend::Backend};

use crate::boxes::boxes_per_cell;
use crate::layers::FeatureLayer;

/// A pair of 3x3 convolutions predicting class scores and box offsets for one
/// feature map.
///
/// Convolutional predictors for detection - Pg. 4 Liu et al.
///
/// For a feature layer of size m × n with p channels, the basic element for
/// predicting parameters of a potential detection is a 3 × 3 × p small kernel
/// that produces either a score for a category, or a shape offset relative to
/// the default box coordinates.
#[derive(Module, Debug)]
pub struct PredictionHead<B: Backend> {
    pub conv_classifier: Conv2d<B>,
    pub conv_bbox: Conv2d<B>,
}

impl<B: Backend> PredictionHead<B> {
    pub fn new(device: &B::Device, layer: &FeatureLayer, cls_cnt: usize) -> Self {
        let channels = layer.output_size();
        let k = boxes_per_cell(layer);

        let conv_classifier = Conv2dConfig::new([channels, k * cls_cnt], [3, 3])
            .with_padding(PaddingConfig2d::Explicit(1, 1))
            .init(device);

        let conv_bbox = Conv2dConfig::new([channels, k * 4], [3, 3])
            .with_padding(PaddingConfig2d::Explicit(1, 1))
            .init(device);

        PredictionHead {
            conv_classifier,
            conv_bbox,
        }
    }
}
