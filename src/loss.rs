use burn::nn::loss::HuberLossConfig;
use burn::tensor::cast::ToElement;
use burn::tensor::{Tensor, s};

use crate::boxes::{
    BOX_SCALE_FACTORS, encode_boxes, labels_for_priors, match_priors,
};
use crate::data::{SsdBatch, strip_padding};

use burn::prelude::*;

/// Computes per-box cross-entropy from raw logits and integer class targets,
/// torch-style (log-softmax followed by negative log-likelihood), so the
/// targets never need one-hot encoding.
///
/// # Arguments
/// * `logits` - `[num_boxes, num_classes]` raw class scores.
/// * `targets` - `[num_boxes]` class ids in `[0, num_classes)`.
///
/// # Returns
/// * `Tensor<B, 1>` of shape `[num_boxes]`, loss per box.
fn cross_entropy_loss<B: Backend>(logits: Tensor<B, 2>, targets: Tensor<B, 1, Int>) -> Tensor<B, 1> {
    let [box_count] = targets.dims();

    let log_probabilities = burn::tensor::activation::log_softmax(logits, 1);
    let targets = targets.clone().reshape([box_count, 1]);

    let nll = log_probabilities.gather(1, targets) * -1;

    nll.reshape([box_count])
}

/// Picks the hardest negatives for the confidence loss.
///
/// Hard negative mining - Pg. 6 Liu et al.
///
/// After the matching step, most of the default boxes are negatives,
/// especially when the number of possible default boxes is large. Instead of
/// using all the negative examples, we sort them using the highest confidence
/// loss for each default box and pick the top ones so that the ratio between
/// the negatives and positives is at most 3:1.
///
/// Positives are sunk to negative infinity before the sort so only
/// background boxes can surface. The returned index tensor holds exactly
/// `min(neg_pos_ratio * num_positives, num_negatives)` entries.
///
/// Requires at least one positive; the caller guards the zero-positive case.
pub fn hard_negative_indices<B: Backend>(
    conf_loss: Tensor<B, 1>,
    fg_mask: Tensor<B, 1, Bool>,
    neg_pos_ratio: usize,
) -> Tensor<B, 1, Int> {
    let device = conf_loss.device();
    let [total] = conf_loss.dims();

    let num_pos = fg_mask.clone().int().sum().into_scalar().to_i32() as usize;
    let available = total - num_pos;
    let keep = (neg_pos_ratio * num_pos).min(available);

    let fg_index = Tensor::cat(fg_mask.nonzero(), 0);
    let masked = conf_loss.select_assign(
        0,
        fg_index.clone(),
        Tensor::full(fg_index.shape(), f32::NEG_INFINITY, &device),
    );

    let (_vals, order) = masked.sort_descending_with_indices(0);

    order.slice(s![0..keep])
}

/// The SSD training objective: localization + mined confidence loss.
///
/// Training objective - Pg. 5 Liu et al.
///
/// The overall objective loss function is a weighted sum of the localization
/// loss (loc) and the confidence loss (conf):
///
/// ```text
///                 ⎛1⎞
/// L(x, c, l, g) = ⎜─⎟ ⋅ (Lconf(x, c) + α ⋅ Lloc(x, l, g))
///                 ⎝N⎠
/// ```
///
/// where N is the number of matched default boxes. If N = 0, we set the loss
/// to 0. The localization loss is a Smooth L1 loss between the predicted box
/// and the encoded ground truth parameters.
pub struct MultiboxLoss {
    /// Minimum IoU for a prior to count as a positive.
    pub iou_threshold: f32,
    /// At most this many negatives per positive survive mining.
    pub neg_pos_ratio: usize,
    /// Weight of the localization term.
    pub alpha: f32,
}

impl Default for MultiboxLoss {
    fn default() -> Self {
        MultiboxLoss {
            iou_threshold: 0.5,
            neg_pos_ratio: 3,
            alpha: 1.0,
        }
    }
}

impl MultiboxLoss {
    /// Computes the loss for a batch of predictions.
    ///
    /// # Arguments
    /// * `class_logits` - `[batch, num_priors, num_classes]` class scores.
    /// * `bbox_logits` - `[batch, num_priors, 4]` predicted box offsets.
    /// * `priors` - `[num_priors, 4]` prior boxes, corner form; the same
    ///   list for every image in the batch.
    /// * `batch` - images, padded ground truth and padding counts.
    ///
    /// # Returns
    /// 1. `Tensor<B, 2>` - loss per batch element, `[batch, 1]`.
    /// 2. `Tensor<B, 2, Int>` - per-prior class targets, `[batch, num_priors]`.
    pub fn forward<B: Backend>(
        &self,
        class_logits: Tensor<B, 3>,
        bbox_logits: Tensor<B, 3>,
        priors: Tensor<B, 2>,
        batch: &SsdBatch<B>,
    ) -> (Tensor<B, 2>, Tensor<B, 2, Int>) {
        let device = &class_logits.device();

        let [batch_size, num_priors, _] = class_logits.shape().dims();

        let mut loss_b = vec![];
        let mut class_targets_b = vec![];

        for i in 0..batch_size {
            let gt_boxes: Tensor<B, 2> = batch.gt_boxes.clone().slice(s![i..i + 1]).squeeze(0);
            let target_labels = batch.target_labels.clone().slice(s![i..i + 1]).squeeze(0);
            let target_padding: Tensor<B, 1, Int> =
                batch.target_padding.clone().slice(s![i..i + 1]).squeeze(0);

            let bbox_logits: Tensor<B, 2> = bbox_logits.clone().slice(s![i..i + 1]).squeeze(0);
            let class_logits: Tensor<B, 2> = class_logits.clone().slice(s![i..i + 1]).squeeze(0);

            // An image whose ground truth is entirely padding contributes
            // nothing; the objective is defined as zero when N = 0.
            let [max_boxes, _] = gt_boxes.shape().dims();
            let pad = target_padding.clone().into_scalar().to_i32() as usize;
            if pad == max_boxes {
                loss_b.push(Tensor::zeros([1], device));
                class_targets_b.push(Tensor::zeros([num_priors], device));
                continue;
            }

            let (target_labels, gt_boxes) = strip_padding(gt_boxes, target_labels, target_padding);

            let assignments = match_priors(gt_boxes.clone(), priors.clone(), self.iou_threshold);

            // indices of the positive priors (assignment != -1)
            let positive_index = assignments
                .clone()
                .add_scalar(1)
                .bool()
                .nonzero()[0]
                .clone();

            // encode the matched (ground truth, prior) pairs into the
            // regression targets the box head should learn
            let gt_matches = gt_boxes
                .clone()
                .select(0, assignments.clone().select(0, positive_index.clone()));
            let prior_matches = priors.clone().select(0, positive_index.clone());

            let box_targets = encode_boxes(gt_matches, prior_matches, BOX_SCALE_FACTORS);
            let box_predictions: Tensor<B, 2> = bbox_logits.select(0, positive_index.clone());

            let loc_loss = HuberLossConfig::new(0.5)
                .init()
                .forward_no_reduction(box_predictions, box_targets);

            let class_targets =
                labels_for_priors(&assignments, target_labels.clone(), num_priors);

            let conf_loss = cross_entropy_loss(class_logits.clone(), class_targets.clone());

            let fg_mask = class_targets.clone().greater_elem(0);
            let fg_index = Tensor::cat(fg_mask.clone().nonzero(), 0);

            let negative_index =
                hard_negative_indices(conf_loss.clone(), fg_mask, self.neg_pos_ratio);

            let n = positive_index.shape().num_elements() as i32;

            let loss = if n >= 1 {
                let lconf = conf_loss.clone().select(0, fg_index).sum()
                    + conf_loss.select(0, negative_index).sum();

                let lloc = loc_loss.sum();

                (lconf + lloc * self.alpha) / n
            } else {
                Tensor::zeros([1], device)
            };

            loss_b.push(loss);
            class_targets_b.push(class_targets);
        }

        (Tensor::stack(loss_b, 0), Tensor::stack(class_targets_b, 0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::{NdArray, ndarray::NdArrayDevice};

    type B = NdArray<f32>;

    fn quadrant_priors(device: &NdArrayDevice) -> Tensor<B, 2> {
        Tensor::<B, 2>::from_data(
            [
                [0.0, 0.0, 0.5, 0.5],
                [0.5, 0.0, 1.0, 0.5],
                [0.0, 0.5, 0.5, 1.0],
                [0.5, 0.5, 1.0, 1.0],
            ],
            device,
        )
    }

    fn single_box_batch(device: &NdArrayDevice, pad: i64) -> SsdBatch<B> {
        SsdBatch {
            images: Tensor::zeros([1, 3, 300, 300], device),
            gt_boxes: Tensor::<B, 3>::from_data([[[0.1, 0.1, 0.4, 0.4]]], device),
            target_labels: Tensor::<B, 2, Int>::from_data([[1]], device),
            target_padding: Tensor::<B, 2, Int>::from_data([[pad]], device),
            keys: vec!["a.jpg".into()],
        }
    }

    #[test]
    fn mining_keeps_ratio_times_positives() {
        let device = &NdArrayDevice::default();

        let conf_loss = Tensor::<B, 1>::from_data([0.1, 5.0, 0.3, 0.2, 0.4], device);
        let fg_mask =
            Tensor::<B, 1, Int>::from_data([1, 0, 0, 0, 0], device).greater_elem(0);

        let picked = hard_negative_indices(conf_loss, fg_mask, 1);

        // one positive, ratio 1: exactly the single hardest negative
        Tensor::<B, 1, Int>::from_data([1], device)
            .into_data()
            .assert_eq(&picked.to_data(), true);
    }

    #[test]
    fn mining_is_clamped_to_available_negatives() {
        let device = &NdArrayDevice::default();

        let conf_loss = Tensor::<B, 1>::from_data([0.5, 0.5, 0.5, 0.5, 0.9, 0.8], device);
        let fg_mask =
            Tensor::<B, 1, Int>::from_data([1, 1, 1, 1, 0, 0], device).greater_elem(0);

        // quota is 3 * 4 = 12 but only 2 negatives exist
        let picked = hard_negative_indices(conf_loss, fg_mask, 3);

        assert_eq!(picked.shape().dims, [2]);
        Tensor::<B, 1, Int>::from_data([4, 5], device)
            .into_data()
            .assert_eq(&picked.to_data(), true);
    }

    #[test]
    fn loss_on_uniform_logits() {
        let device = &NdArrayDevice::default();
        let batch = single_box_batch(device, 0);

        // 3 classes, all-zero logits: cross entropy is ln(3) per box
        let class_logits = Tensor::<B, 3>::zeros([1, 4, 3], device);
        let bbox_logits = Tensor::<B, 3>::zeros([1, 4, 4], device);

        let (loss, targets) = MultiboxLoss::default().forward(
            class_logits,
            bbox_logits,
            quadrant_priors(device),
            &batch,
        );

        // The box is force-assigned to the top-left prior. With one positive
        // and ratio 3 every negative survives mining:
        //   Lconf = 4 ln(3)                  = 4.3944
        //   Lloc  = 2 * huber(5 ln(0.6), 0.5) = 2.3041
        loss.into_data().assert_within_range(6.69..6.71);

        Tensor::<B, 2, Int>::from_data([[1, 0, 0, 0]], device)
            .into_data()
            .assert_eq(&targets.to_data(), true);
    }

    #[test]
    fn zero_positives_means_zero_loss() {
        let device = &NdArrayDevice::default();
        // the only ground-truth row is padding
        let batch = single_box_batch(device, 1);

        let class_logits = Tensor::<B, 3>::zeros([1, 4, 3], device);
        let bbox_logits = Tensor::<B, 3>::zeros([1, 4, 4], device);

        let (loss, targets) = MultiboxLoss::default().forward(
            class_logits,
            bbox_logits,
            quadrant_priors(device),
            &batch,
        );

        loss.into_data()
            .assert_eq(&Tensor::<B, 2>::zeros([1, 1], device).into_data(), true);
        Tensor::<B, 2, Int>::zeros([1, 4], device)
            .into_data()
            .assert_eq(&targets.to_data(), true);
    }
}
