use burn::{
    data::dataloader::batcher::Batcher,
    prelude::*,
    tensor::{Int, Tensor, s},
};

use crate::{
    config::{HEIGHT, WIDTH},
    transforms::Transform,
    voc::VocSample,
};

/// Whether a batch receives stochastic augmentation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BatchType {
    Train,
    Test,
}

/// A collated batch of images and padded ground truth.
///
/// Ground-truth tensors are rectangular, so every item is padded up to the
/// widest item in the batch with zero boxes and background labels.
/// `target_padding` records how many trailing rows of each item are padding;
/// [`strip_padding`] removes them again before matching.
#[derive(Clone, Debug)]
pub struct SsdBatch<B: Backend> {
    /// `[batch, 3, HEIGHT, WIDTH]` normalized images.
    pub images: Tensor<B, 4>,
    /// `[batch, max_boxes, 4]` boxes in [0, 1] corner form.
    pub gt_boxes: Tensor<B, 3>,
    /// `[batch, max_boxes]` model class ids.
    pub target_labels: Tensor<B, 2, Int>,
    /// `[batch, 1]` count of padded rows per item.
    pub target_padding: Tensor<B, 2, Int>,
    /// Image keys, for logging and debugging.
    pub keys: Vec<String>,
}

/// Removes the padded tail of one batch item's ground truth.
pub fn strip_padding<B: Backend>(
    gt_boxes: Tensor<B, 2>,
    target_labels: Tensor<B, 1, Int>,
    target_padding: Tensor<B, 1, Int>,
) -> (Tensor<B, 1, Int>, Tensor<B, 2>) {
    use burn::tensor::cast::ToElement;

    let pad = target_padding.into_scalar().to_i32() as usize;
    let [n, _] = gt_boxes.shape().dims();
    let keep = n - pad;

    (
        target_labels.slice(s![0..keep]),
        gt_boxes.slice(s![0..keep, ..]),
    )
}

/// Turns [`VocSample`]s into an [`SsdBatch`].
///
/// Training batches are resized, randomly flipped and normalized; validation
/// batches skip the stochastic step so the validation loss is stable.
#[derive(Clone)]
pub struct SsdBatcher {
    batch_type: BatchType,
}

impl SsdBatcher {
    pub fn new(batch_type: BatchType) -> Self {
        SsdBatcher { batch_type }
    }
}

impl<B: Backend> Batcher<B, VocSample, SsdBatch<B>> for SsdBatcher {
    fn batch(&self, items: Vec<VocSample>, device: &B::Device) -> SsdBatch<B> {
        let max_boxes = items.iter().map(|i| i.boxes.len()).max().unwrap_or(1);

        let mut images = vec![];
        let mut gt_boxes = vec![];
        let mut target_labels = vec![];
        let mut target_padding = vec![];
        let mut keys = vec![];

        for item in items {
            let count = item.boxes.len();

            let coords: Vec<f32> = item.boxes.iter().flatten().copied().collect();
            let boxes = Tensor::<B, 1>::from_floats(coords.as_slice(), device).reshape([count, 4]);
            let labels = Tensor::<B, 1, Int>::from_data(item.labels.as_slice(), device);

            let mut pipeline = Transform::<B>::new(item.image, Some(boxes), Some(labels), device)
                .resize_triangular(WIDTH, HEIGHT);

            let mut pipeline = match self.batch_type {
                BatchType::Train => pipeline.random_horizontal_flip(0.5),
                BatchType::Test => pipeline,
            };

            let (image, boxes, labels) = pipeline.normalize().finish().unwrap();

            let mut boxes = boxes.unwrap();
            let mut labels = labels.unwrap();

            // pad up to the widest item with zero boxes / background labels
            let pad = max_boxes - count;
            if pad > 0 {
                boxes = Tensor::cat(vec![boxes, Tensor::zeros([pad, 4], device)], 0);
                labels = Tensor::cat(vec![labels, Tensor::zeros([pad], device)], 0);
            }

            images.push(image);
            gt_boxes.push(boxes);
            target_labels.push(labels);
            target_padding.push(Tensor::<B, 1, Int>::from_data([pad as i64], device));
            keys.push(item.key);
        }

        SsdBatch {
            images: Tensor::stack(images, 0),
            gt_boxes: Tensor::stack(gt_boxes, 0),
            target_labels: Tensor::stack(target_labels, 0),
            target_padding: Tensor::stack(target_padding, 0),
            keys,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transforms::pipeline::create_test_image;
    use burn::{
        backend::{NdArray, ndarray::NdArrayDevice},
        tensor::{Tolerance, ops::FloatElem},
    };

    type B = NdArray<f32>;
    type FT = FloatElem<B>;

    fn sample(key: &str, boxes: Vec<[f32; 4]>, labels: Vec<i64>) -> VocSample {
        VocSample {
            image: create_test_image(100, 100, [100, 100, 100]),
            boxes,
            labels,
            key: key.into(),
        }
    }

    #[test]
    fn batch_pads_to_widest_item() {
        let device = &NdArrayDevice::default();
        let batcher = SsdBatcher::new(BatchType::Test);

        let items = vec![
            sample(
                "a.jpg",
                vec![[10.0, 20.0, 40.0, 60.0], [50.0, 50.0, 90.0, 90.0]],
                vec![1, 2],
            ),
            sample("b.jpg", vec![[25.0, 25.0, 75.0, 75.0]], vec![3]),
        ];

        let batch: SsdBatch<B> = batcher.batch(items, device);

        assert_eq!(batch.images.shape().dims, [2, 3, HEIGHT, WIDTH]);
        assert_eq!(batch.gt_boxes.shape().dims, [2, 2, 4]);
        assert_eq!(batch.target_labels.shape().dims, [2, 2]);
        assert_eq!(batch.keys, vec!["a.jpg", "b.jpg"]);

        Tensor::<B, 2, Int>::from_data([[0], [1]], device)
            .into_data()
            .assert_eq(&batch.target_padding.to_data(), true);

        // second item: padded label row is background
        Tensor::<B, 2, Int>::from_data([[1, 2], [3, 0]], device)
            .into_data()
            .assert_eq(&batch.target_labels.to_data(), true);
    }

    #[test]
    fn boxes_end_up_normalized() {
        let device = &NdArrayDevice::default();
        let batcher = SsdBatcher::new(BatchType::Test);

        let items = vec![sample("a.jpg", vec![[10.0, 20.0, 40.0, 60.0]], vec![1])];
        let batch: SsdBatch<B> = batcher.batch(items, device);

        // 100px image scaled x3 to 300, then divided back to [0, 1]
        Tensor::<B, 3>::from_data([[[0.1, 0.2, 0.4, 0.6]]], device)
            .into_data()
            .assert_approx_eq::<FT>(&batch.gt_boxes.to_data(), Tolerance::default());
    }

    #[test]
    fn strip_padding_recovers_item() {
        let device = &NdArrayDevice::default();

        let gt_boxes = Tensor::<B, 2>::from_data(
            [[0.1, 0.1, 0.2, 0.2], [0.3, 0.3, 0.4, 0.4], [0.0, 0.0, 0.0, 0.0]],
            device,
        );
        let labels = Tensor::<B, 1, Int>::from_data([4, 2, 0], device);
        let padding = Tensor::<B, 1, Int>::from_data([1], device);

        let (labels, boxes) = strip_padding(gt_boxes, labels, padding);

        assert_eq!(boxes.shape().dims, [2, 4]);
        Tensor::<B, 1, Int>::from_data([4, 2], device)
            .into_data()
            .assert_eq(&labels.to_data(), true);
    }
}
