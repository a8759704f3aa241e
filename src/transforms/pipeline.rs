use burn::tensor::{Int, Tensor, TensorData, backend::Backend};
use image::RgbImage;

use rand::{Rng, SeedableRng, rngs::StdRng};

/// Maximum pixel value for a RGB8 pixel
pub const MAX_PIXEL_VAL: f32 = 255.0;

/// A chainable image augmentation pipeline.
///
/// `Transform` carries an image tensor in `[C, H, W]` layout together with
/// the optional bounding boxes and labels that must stay aligned with it
/// through geometric transformations. Each operation consumes the current
/// state and hands back the pipeline, so augmentations read as a chain:
///
/// ```ignore
/// let (image, boxes, labels) = Transform::new(img, Some(boxes), Some(labels), &device)
///     .resize_triangular(300, 300)
///     .random_horizontal_flip(0.5)
///     .normalize()
///     .finish()?;
/// ```
#[derive(Clone, Debug)]
pub struct Transform<B, R = StdRng>
where
    B: Backend,
    R: rand::Rng,
{
    pub image: Tensor<B, 3>,
    pub bboxes: Option<Tensor<B, 2>>,
    pub labels: Option<Tensor<B, 1, Int>>,
    pub device: <B as Backend>::Device,
    pub rng: R,
}

impl<B: Backend, R: rand::Rng> Transform<B, R> {
    /// Builds a pipeline with an explicit RNG, for reproducible stochastic
    /// augmentations in tests.
    pub fn new_seeded(
        image: Tensor<B, 3>,
        bboxes: Option<Tensor<B, 2>>,
        labels: Option<Tensor<B, 1, Int>>,
        rng: R,
    ) -> Self {
        let device = image.device().clone();
        Self {
            image,
            bboxes,
            rng,
            device,
            labels,
        }
    }
}

impl<B: Backend> Transform<B> {
    /// Builds a pipeline from a decoded RGB image. Bounding boxes are
    /// expected in pixel corner `[x1, y1, x2, y2]` form, `[N, 4]`.
    pub fn new(
        image: image::RgbImage,
        bboxes: Option<Tensor<B, 2>>,
        labels: Option<Tensor<B, 1, Int>>,
        device: &<B as Backend>::Device,
    ) -> Self {
        let rng = StdRng::from_os_rng();
        let image = Self::rgb_img_as_tensor(image, device);

        Self {
            rng,
            image,
            bboxes,
            device: device.clone(),
            labels,
        }
    }

    /// Returns `true` with probability `p` (clamped to [0, 1]).
    pub fn should_apply(&mut self, p: f32) -> bool {
        self.rng.random::<f32>() < p.clamp(0.0, 1.0)
    }

    /// Ends the chain and returns `(image, bboxes, labels)`.
    #[allow(clippy::type_complexity)]
    pub fn finish(
        self,
    ) -> Result<
        (
            Tensor<B, 3>,
            Option<Tensor<B, 2>>,
            Option<Tensor<B, 1, Int>>,
        ),
        String,
    > {
        Ok((self.image, self.bboxes, self.labels))
    }

    /// Converts an `RgbImage` into a `[3, H, W]` float tensor. Pixel values
    /// stay in the 0-255 range; [`Transform::normalize`] rescales them.
    pub fn rgb_img_as_tensor(image: image::RgbImage, device: &B::Device) -> Tensor<B, 3> {
        let img_vec = image.clone().into_raw().iter().map(|&p| p as f32).collect();
        Tensor::<B, 3>::from_data(
            TensorData::new(
                img_vec,
                [image.height() as usize, image.width() as usize, 3],
            )
            .convert::<B::FloatElem>(),
            device,
        )
        .permute([2, 0, 1])
    }
}

/// Creates a solid-color RGB test image.
pub fn create_test_image(width: u32, height: u32, pattern: [u8; 3]) -> RgbImage {
    let mut img = RgbImage::new(width, height);
    let img_pattern: image::Rgb<u8> = image::Rgb(pattern);

    for px in img.pixels_mut() {
        *px = img_pattern;
    }

    img
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::{NdArray, ndarray::NdArrayDevice};

    type B = NdArray<f32>;

    #[test]
    fn seeded_rng_is_reproducible() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut test_vec = Vec::<i32>::new();
        let expected_vec = vec![-1513825812, 408920382, -83330236, 1513922966, 612228279];

        for _ in 0..5 {
            test_vec.push(rng.random::<i32>());
        }

        assert_eq!(expected_vec, test_vec);
    }

    #[test]
    fn image_tensor_is_channels_first() {
        let device = &NdArrayDevice::default();
        let image = create_test_image(4, 2, [10, 20, 30]);

        let tensor = Transform::<B>::rgb_img_as_tensor(image, device);
        assert_eq!(tensor.shape().dims, [3, 2, 4]);

        // channel planes hold the per-channel pattern value
        let data = tensor.to_data().to_vec::<f32>().unwrap();
        assert_eq!(data[0], 10.0);
        assert_eq!(data[8], 20.0);
        assert_eq!(data[16], 30.0);
    }
}
