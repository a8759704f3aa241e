use std::collections::HashMap;

use crate::{check_nan, layers::FeatureLayer};

use burn::{
    prelude::Backend,
    tensor::{Int, Tensor, s},
};

/// Multipliers applied to the four box-regression components.
///
/// These are the reciprocals of the "variances" (0.1, 0.1, 0.2, 0.2) used by
/// most SSD implementations. They act as hyperparameters weighting center
/// offsets against size offsets in the localization loss; there is no
/// principled derivation for them in the literature, the values are simply
/// the ones everybody converged on.
pub const BOX_SCALE_FACTORS: (f32, f32, f32, f32) = (10.0, 10.0, 5.0, 5.0);

/// Number of default boxes tiled at every cell of the given layer: one per
/// aspect ratio plus the extra ar=1 box at the intermediate scale.
pub fn boxes_per_cell(layer: &FeatureLayer) -> usize {
    layer.aspect_ratios().len() + 1
}

/// Prior-box scale for the k-th feature map (one-based), per Liu et al. Pg 6:
///
/// ```text
///                      smax - smin
/// sk = smin + ─────────────────── (k - 1)
///                        m - 1
/// ```
///
/// The lowest layer gets 0.2, the highest 0.9, the rest are regularly spaced.
/// `k = m + 1` extrapolates past the last layer and only feeds the extra
/// ar=1 box of the coarsest map.
fn sk(k: usize) -> f32 {
    let smin = 0.2;
    let smax = 0.9;

    smin + ((smax - smin) / (FeatureLayer::count() as f32 - 1.0)) * (k - 1) as f32
}

/// Width of the default box for scale index `k` and aspect ratio `ar`.
fn wk(k: usize, ar: f32) -> f32 {
    sk(k) * f32::sqrt(ar)
}

/// Height of the default box for scale index `k` and aspect ratio `ar`.
fn hk(k: usize, ar: f32) -> f32 {
    sk(k) / f32::sqrt(ar)
}

/// The extra square box added for aspect ratio 1, sized at the geometric mean
/// of this layer's scale and the next one's.
fn ar1(k: usize) -> (f32, f32) {
    let s = f32::sqrt(sk(k) * sk(k + 1));
    (s, s)
}

/// Returns the `(width, height)` of every default box shape tiled on the
/// given layer, in fractions of the input image. The extra ar=1 box comes
/// first, then one box per configured aspect ratio.
pub fn default_box_sizes(layer: &FeatureLayer) -> Vec<(f32, f32)> {
    let k = layer.scale_index();

    let mut sizes = vec![ar1(k)];
    for ar in layer.aspect_ratios() {
        sizes.push((wk(k, ar), hk(k, ar)));
    }

    sizes
}

/// Centers of the cells of an `f`-wide feature map axis: `(i + 0.5) / f`.
pub fn cell_centers(f: usize) -> Vec<f32> {
    (0..f).map(|i| (i as f32 + 0.5) / f as f32).collect()
}

/// Generates the full prior-box list for a set of feature map shapes.
///
/// For every cell of every feature map, the default box shapes of the
/// corresponding [`FeatureLayer`] are centered on the cell midpoint and
/// emitted in corner (x1, y1, x2, y2) form, normalized to the unit square.
/// The output is fully determined by `feature_shapes` and the static
/// aspect-ratio/scale configuration, so the same list is reproduced at
/// training and inference time.
///
/// # Arguments
///
/// * `feature_shapes` - `(height, width)` of each of the six feature maps,
///   in detection order.
///
/// # Returns
///
/// * `Tensor<B, 2>` of shape `[num_priors, 4]`.
pub fn generate_priors<B: Backend>(
    feature_shapes: &[(usize, usize)],
    device: &B::Device,
) -> Tensor<B, 2> {
    let layers = FeatureLayer::as_list();
    assert_eq!(
        feature_shapes.len(),
        layers.len(),
        "one feature map shape per detection layer"
    );

    let mut coords: Vec<f32> = vec![];

    for (layer, &(height, width)) in layers.iter().zip(feature_shapes.iter()) {
        let sizes = default_box_sizes(layer);
        let cx_vec = cell_centers(width);
        let cy_vec = cell_centers(height);

        for cy in &cy_vec {
            for cx in &cx_vec {
                for (w, h) in &sizes {
                    coords.extend(corner_coords(*cx, *cy, *w, *h));
                }
            }
        }
    }

    let count = coords.len() / 4;

    Tensor::<B, 1>::from_floats(coords.as_slice(), device).reshape([count, 4])
}

/// Generates priors for live feature map tensors by reading off their spatial
/// shapes, so the box list always lines up with what the model produced.
pub fn priors_for_feature_maps<B: Backend>(feature_maps: &[Tensor<B, 4>; 6]) -> Tensor<B, 2> {
    let device = feature_maps[0].device();

    let shapes: Vec<(usize, usize)> = feature_maps
        .iter()
        .map(|map| {
            let [_batch, _depth, height, width] = map.shape().dims();
            (height, width)
        })
        .collect();

    generate_priors(&shapes, &device)
}

/// Computes the Intersection over Union between two sets of boxes in corner
/// (x1, y1, x2, y2) form.
///
/// # Returns
///
/// * `Tensor<B, 2>` of shape `[num_gt, num_priors]` where entry `(i, j)` is
///   the IoU between ground truth `i` and prior `j`.
pub fn iou<B: Backend>(gt_boxes: Tensor<B, 2>, priors: Tensor<B, 2>) -> Tensor<B, 2> {
    let [n, _] = gt_boxes.shape().dims();
    let [m, _] = priors.shape().dims();

    let (gx1, gy1, gx2, gy2) = boxes_to_components(gt_boxes);
    let (px1, py1, px2, py2) = boxes_to_components(priors);

    let gt_area = (gx2.clone() - gx1.clone()) * (gy2.clone() - gy1.clone());
    let prior_area = (px2.clone() - px1.clone()) * (py2.clone() - py1.clone());

    // Broadcast ground-truth components down the rows and prior components
    // across the columns of the [n, m] overlap grid.
    let rows = |t: Tensor<B, 2>| t.expand([n, m]);
    let cols = |t: Tensor<B, 2>| t.reshape([1, m as i32]).expand([n, m]);

    // Intersection corners: larger of the two top-lefts, smaller of the two
    // bottom-rights. Width/height clamp at 0 for disjoint boxes.
    let x1 = rows(gx1).max_pair(cols(px1));
    let y1 = rows(gy1).max_pair(cols(py1));
    let x2 = rows(gx2).min_pair(cols(px2));
    let y2 = rows(gy2).min_pair(cols(py2));

    let intersection = (x2 - x1).clamp_min(0) * (y2 - y1).clamp_min(0);
    let union = rows(gt_area) + cols(prior_area) - intersection.clone();

    intersection / union
}

/// Assigns priors to ground-truth boxes.
///
/// The matching strategy follows Liu et al. Pg 6: every prior whose best
/// overlap clears `threshold` is assigned to that ground truth, which lets
/// the network score multiple overlapping priors instead of exactly one.
/// On top of that, every ground-truth box is force-assigned to its single
/// best-IoU prior regardless of the threshold, so rare or awkwardly shaped
/// objects always receive at least one positive. When two ground truths
/// claim the same prior the higher IoU wins.
///
/// # Arguments
///
/// * `gt_boxes` - `[num_gt, 4]` ground-truth boxes, corner form.
/// * `priors` - `[num_priors, 4]` prior boxes, corner form.
/// * `threshold` - minimum IoU for threshold-based assignment.
///
/// # Returns
///
/// * `Tensor<B, 1, Int>` of shape `[num_priors]` holding the matched
///   ground-truth index per prior, or `-1` for background.
pub fn match_priors<B: Backend>(
    gt_boxes: Tensor<B, 2>,
    priors: Tensor<B, 2>,
    threshold: f32,
) -> Tensor<B, 1, Int> {
    let device = gt_boxes.device();

    let overlaps = iou(gt_boxes, priors);

    // Per prior: index of the best-overlapping ground truth, kept only when
    // the overlap clears the threshold.
    let (best_iou, best_gt) = overlaps.clone().max_dim_with_indices(0);
    let assigned = best_gt.mask_fill(best_iou.lower_elem(threshold), -1);
    let mut assigned = assigned
        .to_data()
        .convert::<i64>()
        .to_vec::<i64>()
        .unwrap();

    // Per ground truth: its best prior, claimed unconditionally.
    let (claim_iou, claim_prior) = overlaps.max_dim_with_indices(1);
    let claim_iou = claim_iou.to_data().convert::<f32>().to_vec::<f32>().unwrap();
    let claim_prior = claim_prior
        .to_data()
        .convert::<i64>()
        .to_vec::<i64>()
        .unwrap();

    let mut claims: HashMap<i64, (usize, f32)> = HashMap::new();

    for (gt, (&prior, &overlap)) in claim_prior.iter().zip(claim_iou.iter()).enumerate() {
        let entry = claims.entry(prior).or_insert((gt, overlap));
        if overlap > entry.1 {
            *entry = (gt, overlap);
        }
    }

    for (&prior, &(gt, _)) in claims.iter() {
        assigned[prior as usize] = gt as i64;
    }

    Tensor::<B, 1, Int>::from_data(assigned.as_slice(), &device)
}

/// Expands per-prior ground-truth assignments into per-prior class labels.
///
/// Matched priors copy the class id of their ground-truth box; everything
/// else becomes background (0). The result acts as an associative array from
/// prior index to class id, ready for the cross-entropy targets.
pub fn labels_for_priors<B: Backend>(
    assignments: &Tensor<B, 1, Int>,
    gt_labels: Tensor<B, 1, Int>,
    num_priors: usize,
) -> Tensor<B, 1, Int> {
    let device = assignments.device();

    let matched = assignments.clone().greater_elem(-1).nonzero();

    if matched.is_empty() {
        return Tensor::zeros([num_priors], &device);
    }

    let matched = Tensor::cat(matched, 0);
    let gt_index = assignments.clone().select(0, matched.clone());

    Tensor::zeros([num_priors], &device).scatter(0, matched, gt_labels.select(0, gt_index))
}

/// Computes box-regression targets for matched (ground truth, prior) pairs.
///
/// Boxes are converted to center form and encoded as a scale-invariant
/// center translation plus log-space size ratios, per the R-CNN family:
///
/// - tx = (Gx - Px) / Pw * w1
/// - ty = (Gy - Py) / Ph * w2
/// - tw = ln(Gw / Pw) * w3
/// - th = ln(Gh / Ph) * w4
///
/// The log keeps size corrections comparable between small and large boxes.
///
/// # Arguments
///
/// * `g` - `[num_matched, 4]` ground-truth boxes, corner form.
/// * `d` - `[num_matched, 4]` matched priors, corner form.
/// * `(w1, w2, w3, w4)` - scale factors, normally [`BOX_SCALE_FACTORS`].
pub fn encode_boxes<B: Backend>(
    g: Tensor<B, 2>,
    d: Tensor<B, 2>,
    (w1, w2, w3, w4): (f32, f32, f32, f32),
) -> Tensor<B, 2> {
    let (gx, gy, gw, gh) = boxes_to_components(corners_to_centers(g));
    let (px, py, pw, ph) = boxes_to_components(corners_to_centers(d));

    let tx = (gx - px) / pw.clone() * w1;
    let ty = (gy - py) / ph.clone() * w2;

    let tw = (gw.clone() / pw.clone()).log() * w3;
    check_nan!(tw, gw, pw);

    let th = (gh / ph).log() * w4;

    Tensor::cat(vec![tx, ty, tw, th], 1)
}

/// Inverse of [`encode_boxes`]: applies predicted offsets to priors and
/// returns boxes in corner form. Decoding an encoded pair reproduces the
/// ground-truth box up to floating-point error.
pub fn decode_boxes<B: Backend>(
    p: Tensor<B, 2>,
    d: Tensor<B, 2>,
    (w1, w2, w3, w4): (f32, f32, f32, f32),
) -> Tensor<B, 2> {
    let (px, py, pw, ph) = boxes_to_components(corners_to_centers(d));
    let (tx, ty, tw, th) = boxes_to_components(p);

    let cx = tx / w1 * pw.clone() + px;
    let cy = ty / w2 * ph.clone() + py;
    let w = (tw / w3).exp() * pw;
    let h = (th / w4).exp() * ph;

    centers_to_corners(Tensor::cat(vec![cx, cy, w, h], 1))
}

/// Splits `[num_boxes, 4]` boxes into their four `[num_boxes, 1]` component
/// columns, regardless of representation (corner or center form).
pub fn boxes_to_components<B: Backend>(
    boxes: Tensor<B, 2>,
) -> (Tensor<B, 2>, Tensor<B, 2>, Tensor<B, 2>, Tensor<B, 2>) {
    (
        boxes.clone().slice(s![.., 0..1]),
        boxes.clone().slice(s![.., 1..2]),
        boxes.clone().slice(s![.., 2..3]),
        boxes.slice(s![.., 3..4]),
    )
}

/// Converts `[num_boxes, 4]` boxes from center (cx, cy, w, h) to corner
/// (x1, y1, x2, y2) form.
pub fn centers_to_corners<B: Backend>(a: Tensor<B, 2>) -> Tensor<B, 2> {
    let (cx, cy, w, h) = boxes_to_components(a);

    Tensor::cat(
        vec![
            cx.clone() - w.clone() * 0.5,
            cy.clone() - h.clone() * 0.5,
            cx + w * 0.5,
            cy + h * 0.5,
        ],
        1,
    )
}

/// Converts `[num_boxes, 4]` boxes from corner to center form.
pub fn corners_to_centers<B: Backend>(a: Tensor<B, 2>) -> Tensor<B, 2> {
    let (x1, y1, x2, y2) = boxes_to_components(a);

    let w = x2.clone() - x1.clone();
    let h = y2.clone() - y1.clone();
    let cx = x1 + w.clone() * 0.5;
    let cy = y1 + h.clone() * 0.5;

    Tensor::cat(vec![cx, cy, w, h], 1)
}

/// Corner coordinates `[x1, y1, x2, y2]` of a single box given in center form.
pub fn corner_coords(cx: f32, cy: f32, w: f32, h: f32) -> [f32; 4] {
    [cx - w * 0.5, cy - h * 0.5, cx + w * 0.5, cy + h * 0.5]
}
