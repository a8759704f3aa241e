use burn::nn::PaddingConfig2d;
use burn::nn::conv::Conv2d;
use burn::nn::conv::Conv2dConfig;
use burn::nn::pool::MaxPool2d;
use burn::nn::pool::MaxPool2dConfig;
use burn::{
    module::Module,
    tensor::{Tensor, backend::Backend},
};

/// SSD uses VGG-16 Type D as its base network.
///
/// “Very Deep Convolutional Networks for Large-Scale Image Recognition”
/// Authors: Karen Simonyan, Andrew Zisserman
/// Link (official): https://arxiv.org/abs/1409.1556
///
/// Pg. 3
///
/// Table 1: ConvNet configurations (shown in columns). The depth of the configurations increases
/// from the left (A) to the right (E), as more layers are added (the added layers are shown in
/// bold). The convolutional layer parameters are denoted as “conv(receptive field size)-(number
/// of channels)”. The ReLU activation function is not shown for brevity.
///
/// ```text
///     D
/// -----------
/// 16 weight
///  layers
/// -----------
///  conv3-64
///  conv3-64
///
///  conv3-128
///  conv3-128
///
///  conv3-256
///  conv3-256
///  conv3-256
///
///  conv3-512
///  conv3-512
///  conv3-512
///
///  conv3-512
///  conv3-512
///  conv3-512
/// ```
///
/// The SSD variant drops fc6/fc7/fc8 entirely (they become Conv6/Conv7 in the
/// detector) and changes pool5 from 2 × 2 − s2 to 3 × 3 − s1.
///
/// Pool3 is padded by one pixel so a 300x300 input reaches conv4_3 as a 38x38
/// feature map under floor pooling, matching the paper's grid and keeping the
/// total default box count at 8732.
#[derive(Module, Debug)]
pub struct Vgg16<B: Backend> {
    conv1_1: Conv2d<B>,
    conv1_2: Conv2d<B>,
    maxpool2d1: MaxPool2d,

    conv2_1: Conv2d<B>,
    conv2_2: Conv2d<B>,
    maxpool2d2: MaxPool2d,

    conv3_1: Conv2d<B>,
    conv3_2: Conv2d<B>,
    conv3_3: Conv2d<B>,
    maxpool2d3: MaxPool2d,

    conv4_1: Conv2d<B>,
    conv4_2: Conv2d<B>,
    conv4_3: Conv2d<B>,
    maxpool2d4: MaxPool2d,

    conv5_1: Conv2d<B>,
    conv5_2: Conv2d<B>,
    conv5_3: Conv2d<B>,
    maxpool2d5: MaxPool2d,
}

impl<B: Backend> Vgg16<B> {
    pub fn new(device: &B::Device) -> Self {
        // 64 out 3x3 (x2) conv1 block
        let conv1_1 = Conv2dConfig::new([3, 64], [3, 3])
            .with_padding(PaddingConfig2d::Explicit(1, 1))
            .init(device);
        let conv1_2 = Conv2dConfig::new([64, 64], [3, 3])
            .with_padding(PaddingConfig2d::Explicit(1, 1))
            .init(device);

        let maxpool2d1 = MaxPool2dConfig::new([2, 2]).with_strides([2, 2]).init();

        // out -> 128 3x3 (x2) conv2 block
        let conv2_1 = Conv2dConfig::new([64, 128], [3, 3])
            .with_padding(PaddingConfig2d::Explicit(1, 1))
            .init(device);
        let conv2_2 = Conv2dConfig::new([128, 128], [3, 3])
            .with_padding(PaddingConfig2d::Explicit(1, 1))
            .init(device);

        let maxpool2d2 = MaxPool2dConfig::new([2, 2]).with_strides([2, 2]).init();

        // out -> 256 3x3 (x3) conv3 block
        let conv3_1 = Conv2dConfig::new([128, 256], [3, 3])
            .with_padding(PaddingConfig2d::Explicit(1, 1))
            .init(device);
        let conv3_2 = Conv2dConfig::new([256, 256], [3, 3])
            .with_padding(PaddingConfig2d::Explicit(1, 1))
            .init(device);
        let conv3_3 = Conv2dConfig::new([256, 256], [3, 3])
            .with_padding(PaddingConfig2d::Explicit(1, 1))
            .init(device);

        // padded so 75 pools to 38, not 37
        let maxpool2d3 = MaxPool2dConfig::new([2, 2])
            .with_strides([2, 2])
            .with_padding(PaddingConfig2d::Explicit(1, 1))
            .init();

        // out -> 512 3x3 (x3) conv4 block, conv4_3 feeds the first head
        let conv4_1 = Conv2dConfig::new([256, 512], [3, 3])
            .with_padding(PaddingConfig2d::Explicit(1, 1))
            .init(device);
        let conv4_2 = Conv2dConfig::new([512, 512], [3, 3])
            .with_padding(PaddingConfig2d::Explicit(1, 1))
            .init(device);
        let conv4_3 = Conv2dConfig::new([512, 512], [3, 3])
            .with_padding(PaddingConfig2d::Explicit(1, 1))
            .init(device);

        let maxpool2d4 = MaxPool2dConfig::new([2, 2]).with_strides([2, 2]).init();

        // out -> 512 3x3 (x3) conv5 block
        let conv5_1 = Conv2dConfig::new([512, 512], [3, 3])
            .with_padding(PaddingConfig2d::Explicit(1, 1))
            .init(device);
        let conv5_2 = Conv2dConfig::new([512, 512], [3, 3])
            .with_padding(PaddingConfig2d::Explicit(1, 1))
            .init(device);
        let conv5_3 = Conv2dConfig::new([512, 512], [3, 3])
            .with_padding(PaddingConfig2d::Explicit(1, 1))
            .init(device);

        // pool5 changed from 2x2-s2 to 3x3-s1, keeps 19x19
        let maxpool2d5 = MaxPool2dConfig::new([3, 3])
            .with_strides([1, 1])
            .with_padding(PaddingConfig2d::Explicit(1, 1))
            .init();

        Self {
            conv1_1,
            conv1_2,
            maxpool2d1,
            conv2_1,
            conv2_2,
            maxpool2d2,
            conv3_1,
            conv3_2,
            conv3_3,
            maxpool2d3,
            conv4_1,
            conv4_2,
            conv4_3,
            maxpool2d4,
            conv5_1,
            conv5_2,
            conv5_3,
            maxpool2d5,
        }
    }

    /// Runs the backbone up to pool5 and returns the two taps the detector
    /// needs: the conv4_3 feature map and the pooled conv5_3 output.
    pub fn partial_forward(&self, input: Tensor<B, 4>) -> (Tensor<B, 4>, Tensor<B, 4>) {
        // Convolutional layer 1
        let conv1_1_out = self.conv1_1.forward(input);
        let relu1_1_out = burn::tensor::activation::relu(conv1_1_out);
        let conv1_2_out = self.conv1_2.forward(relu1_1_out);
        let relu1_2_out = burn::tensor::activation::relu(conv1_2_out);

        let maxpool_1_out = self.maxpool2d1.forward(relu1_2_out); // 150x150

        // Convolutional layer 2
        let conv2_1_out = self.conv2_1.forward(maxpool_1_out);
        let relu2_1_out = burn::tensor::activation::relu(conv2_1_out);
        let conv2_2_out = self.conv2_2.forward(relu2_1_out);
        let relu2_2_out = burn::tensor::activation::relu(conv2_2_out);

        let maxpool_2_out = self.maxpool2d2.forward(relu2_2_out); // 75x75

        // Convolutional layer 3
        let conv3_1_out = self.conv3_1.forward(maxpool_2_out);
        let relu3_1_out = burn::tensor::activation::relu(conv3_1_out);
        let conv3_2_out = self.conv3_2.forward(relu3_1_out);
        let relu3_2_out = burn::tensor::activation::relu(conv3_2_out);
        let conv3_3_out = self.conv3_3.forward(relu3_2_out);
        let relu3_3_out = burn::tensor::activation::relu(conv3_3_out);

        let maxpool_3_out = self.maxpool2d3.forward(relu3_3_out); // 38x38

        // Convolutional layer 4
        let conv4_1_out = self.conv4_1.forward(maxpool_3_out);
        let relu4_1_out = burn::tensor::activation::relu(conv4_1_out);
        let conv4_2_out = self.conv4_2.forward(relu4_1_out);
        let relu4_2_out = burn::tensor::activation::relu(conv4_2_out);
        let conv4_3_out = self.conv4_3.forward(relu4_2_out);
        let conv4_3_out = burn::tensor::activation::relu(conv4_3_out);

        let maxpool_4_out = self.maxpool2d4.forward(conv4_3_out.clone()); // 19x19

        // Convolutional layer 5
        let conv5_1_out = self.conv5_1.forward(maxpool_4_out);
        let relu5_1_out = burn::tensor::activation::relu(conv5_1_out);
        let conv5_2_out = self.conv5_2.forward(relu5_1_out);
        let relu5_2_out = burn::tensor::activation::relu(conv5_2_out);
        let conv5_3_out = self.conv5_3.forward(relu5_2_out);
        let relu5_3_out = burn::tensor::activation::relu(conv5_3_out);

        let maxpool_5_out = self.maxpool2d5.forward(relu5_3_out); // 19x19

        (conv4_3_out, maxpool_5_out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::{NdArray, ndarray::NdArrayDevice};

    type B = NdArray<f32>;

    #[test]
    fn backbone_tap_shapes() {
        let device = NdArrayDevice::default();
        let vgg: Vgg16<B> = Vgg16::new(&device);

        let t = Tensor::<B, 4>::ones([1, 3, 300, 300], &device);
        let (conv4_3, conv5) = vgg.partial_forward(t);

        assert_eq!(conv4_3.shape().dims, [1, 512, 38, 38]);
        assert_eq!(conv5.shape().dims, [1, 512, 19, 19]);
    }
}
