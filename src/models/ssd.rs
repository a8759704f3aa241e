use burn::nn::PaddingConfig2d;
use burn::nn::conv::Conv2d;
use burn::nn::conv::Conv2dConfig;

use crate::layers::FeatureLayer;
use crate::models;
use crate::models::head::PredictionHead;
use crate::models::norm::L2Norm;

use burn::{
    module::Module,
    prelude::*,
    tensor::{Tensor, backend::Backend},
};

use models::vgg::Vgg16;

/// SSD300 detector: VGG-16 backbone, the auxiliary Conv6-Conv11_2 stack and a
/// prediction head per feature map.
#[derive(Module, Debug)]
pub struct Ssd<B: Backend> {
    pub vgg16: Vgg16<B>,
    l2_norm: L2Norm<B>,
    conv_6: Conv2d<B>,
    conv_7: Conv2d<B>,
    conv8_1: Conv2d<B>,
    conv8_2: Conv2d<B>,
    conv9_1: Conv2d<B>,
    conv9_2: Conv2d<B>,
    conv10_1: Conv2d<B>,
    conv10_2: Conv2d<B>,
    conv11_1: Conv2d<B>,
    conv11_2: Conv2d<B>,
    pub pred_heads: Vec<PredictionHead<B>>,
    cls_cnt: usize,
}

impl<B: Backend> Ssd<B> {
    pub fn new(device: &B::Device, record: Option<SsdRecord<B>>, cls_cnt: usize) -> Self {
        let vgg_mod: Vgg16<B> = Vgg16::new(device);

        // conv4_3 runs hot compared to the later taps, normalize it
        let l2_norm = L2Norm::new(device, FeatureLayer::Conv4_3.output_size());

        // Create new layers on top of the vgg network

        // 19x19 - Conv6: 3x3x1024 (Fig 2, Pg 4) replaces FC6
        let conv_6 = Conv2dConfig::new([512, 1024], [3, 3])
            .with_padding(PaddingConfig2d::Explicit(1, 1))
            .init(device);

        // 19x19 - Conv7: 1x1x1024 (Fig 2, Pg 4) replaces FC7
        let conv_7: Conv2d<B> = Conv2dConfig::new([1024, 1024], [1, 1]).init(device);

        // 19x19 => 10x10 - Conv8_2: 1x1x256/Conv: 3x3x512-s2 (Fig 2, Pg 4)
        let conv8_1: Conv2d<B> = Conv2dConfig::new([1024, 256], [1, 1]).init(device);
        let conv8_2: Conv2d<B> = Conv2dConfig::new([256, 512], [3, 3])
            .with_padding(PaddingConfig2d::Explicit(1, 1))
            .with_stride([2, 2])
            .init(device);

        // 10x10 => 5x5 - Conv9_2: 1x1x128/Conv: 3x3x256-s2 (Fig 2, Pg 4)
        let conv9_1: Conv2d<B> = Conv2dConfig::new([512, 128], [1, 1]).init(device);
        let conv9_2: Conv2d<B> = Conv2dConfig::new([128, 256], [3, 3])
            .with_padding(PaddingConfig2d::Explicit(1, 1))
            .with_stride([2, 2])
            .init(device);

        // 5x5 => 3x3 - Conv10_2: 1x1x128/Conv: 3x3x256-s1 (Fig 2, Pg 4)
        let conv10_1: Conv2d<B> = Conv2dConfig::new([256, 128], [1, 1]).init(device);
        let conv10_2: Conv2d<B> = Conv2dConfig::new([128, 256], [3, 3])
            .with_stride([1, 1])
            .init(device);

        // 3x3 => 1x1 - Conv11_2: 1x1x128/Conv: 3x3x256-s1 (Fig 2, Pg 4)
        let conv11_1: Conv2d<B> = Conv2dConfig::new([256, 128], [1, 1]).init(device);
        let conv11_2: Conv2d<B> = Conv2dConfig::new([128, 256], [3, 3])
            .with_stride([1, 1])
            .init(device);

        // Create prediction heads for:
        // conv4_3, conv7 (was FC7), conv8_2, conv9_2, conv10_2, conv11_2

        let mut pred_heads = Vec::new();

        for conv_layer in FeatureLayer::as_list().iter() {
            pred_heads.push(PredictionHead::new(device, conv_layer, cls_cnt));
        }

        let ssd = Ssd {
            vgg16: vgg_mod,
            l2_norm,
            conv_6,
            conv_7,
            conv8_1,
            conv8_2,
            conv9_1,
            conv9_2,
            conv10_1,
            conv10_2,
            conv11_1,
            conv11_2,
            pred_heads,
            cls_cnt,
        };

        match record {
            Some(record) => {
                println!("Loading SSD model weights from checkpoint...");
                ssd.load_record(record)
            }
            None => ssd,
        }
    }

    /// Performs a forward pass through the backbone, feature layers, and
    /// prediction heads.
    ///
    /// # Arguments
    /// * `input` - `(B, 3, 300, 300)` batch of normalized images.
    ///
    /// # Returns
    /// 1. **Class predictions** - `Tensor<B, 3>` with shape
    ///    `(B, num_boxes, num_classes)`, concatenated logits from all heads.
    /// 2. **Box predictions** - `Tensor<B, 3>` with shape `(B, num_boxes, 4)`,
    ///    encoded offsets relative to the default boxes.
    /// 3. **Feature maps** - `[Tensor<B, 4>; 6]`, the taps the default box
    ///    generator derives its grids from:
    ///    `Conv4_3`, `Conv7`, `Conv8_2`, `Conv9_2`, `Conv10_2`, `Conv11_2`.
    ///
    /// Each head output `(B, A * N, H, W)` is regrouped to `(B, H, W, A, N)`
    /// before flattening so the per-box ordering matches the default box list:
    /// row-major over cells, aspect ratios within a cell.
    pub fn forward(&self, input: Tensor<B, 4>) -> (Tensor<B, 3>, Tensor<B, 3>, [Tensor<B, 4>; 6]) {
        let (conv_4_3_38x38_out, conv_5_out) = self.vgg16.partial_forward(input);

        let conv_4_3_38x38_out = self.l2_norm.forward(conv_4_3_38x38_out);

        // Convolutional layers 6,7 - 19x19
        let conv_6_out = self.conv_6.forward(conv_5_out);
        let relu_6_out = burn::tensor::activation::relu(conv_6_out);
        let conv_7_out = self.conv_7.forward(relu_6_out);

        // relu_7_19x19_out -> prediction head
        let conv_7_19x19_out = burn::tensor::activation::relu(conv_7_out);

        // Convolutional layer 8 - 10x10
        let conv_8_1_out = self.conv8_1.forward(conv_7_19x19_out.clone());
        let relu_8_1_out = burn::tensor::activation::relu(conv_8_1_out);
        let conv_8_2_out = self.conv8_2.forward(relu_8_1_out);

        // relu_8_2_10x10_out -> prediction head
        let conv_8_2_10x10_out = burn::tensor::activation::relu(conv_8_2_out);

        // Convolutional layer 9 - 5x5
        let conv_9_1_out = self.conv9_1.forward(conv_8_2_10x10_out.clone());
        let relu_9_1_out = burn::tensor::activation::relu(conv_9_1_out);
        let conv_9_2_out = self.conv9_2.forward(relu_9_1_out);

        // relu_9_2_5x5_out -> prediction head
        let conv_9_2_5x5_out = burn::tensor::activation::relu(conv_9_2_out);

        // Convolutional layer 10 - 3x3
        let conv_10_1_out = self.conv10_1.forward(conv_9_2_5x5_out.clone());
        let relu_10_1_out = burn::tensor::activation::relu(conv_10_1_out);
        let conv_10_2_out = self.conv10_2.forward(relu_10_1_out);

        // relu_10_2_3x3_out -> prediction head
        let conv_10_2_3x3_out = burn::tensor::activation::relu(conv_10_2_out);

        // Convolutional layer 11 - 1x1
        let conv_11_1_out = self.conv11_1.forward(conv_10_2_3x3_out.clone());
        let relu_11_1_out = burn::tensor::activation::relu(conv_11_1_out);
        let conv_11_2_out = self.conv11_2.forward(relu_11_1_out);

        // relu_11_2_1x1_out -> prediction head
        let conv_11_2_1x1_out = burn::tensor::activation::relu(conv_11_2_out);

        let outputs = [
            conv_4_3_38x38_out,
            conv_7_19x19_out,
            conv_8_2_10x10_out,
            conv_9_2_5x5_out,
            conv_10_2_3x3_out,
            conv_11_2_1x1_out,
        ];

        let mut class_predictors = vec![];
        let mut box_predictors = vec![];

        for (i, conv_out) in outputs.iter().enumerate() {
            let box_pred = self.pred_heads[i].conv_bbox.forward(conv_out.clone());
            let class_pred = self.pred_heads[i].conv_classifier.forward(conv_out.clone());

            let [batch_size, _, height, width] = class_pred.shape().dims();

            // B = Batch Size
            // A = Anchor Boxes
            // H = Feature Height
            // W = Feature Width
            // N = Number Of Classes
            //
            // (B, A * N, H, W) -> (B, A, N, H, W) -> (B, H, W, A, N) -> (B, H*W*A, N)

            let class_pred = class_pred.reshape([
                batch_size as i32,
                -1,
                self.cls_cnt as i32,
                height as i32,
                width as i32,
            ]);

            let class_pred = class_pred.permute([0, 3, 4, 1, 2]);
            let class_pred = class_pred.reshape([batch_size as i32, -1, self.cls_cnt as i32]);

            class_predictors.push(class_pred);

            // same regrouping with 4 coordinates per anchor:
            // (B, A * 4, H, W) -> (B, H*W*A, 4)

            let box_pred = box_pred.reshape([
                batch_size as i32,
                -1,
                4,
                height as i32,
                width as i32,
            ]);

            let box_pred = box_pred.permute([0, 3, 4, 1, 2]);
            let box_pred = box_pred.reshape([batch_size as i32, -1, 4]);

            box_predictors.push(box_pred);
        }

        let class_predictors = Tensor::cat(class_predictors, 1);
        let box_predictions = Tensor::cat(box_predictors, 1);

        (class_predictors, box_predictions, outputs)
    }
}
