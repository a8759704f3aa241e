use crate::boxes::boxes_to_components;

use super::pipeline::{MAX_PIXEL_VAL, Transform};
use burn::{
    prelude::Backend,
    tensor::{Device, Tensor},
};

// ImageNet mean and std values

const MEAN: [f64; 3] = [0.485, 0.456, 0.406];
const STD: [f64; 3] = [0.229, 0.224, 0.225];

#[derive(Clone)]
pub struct ImageNormalizer<B: Backend> {
    pub mean: Tensor<B, 3>,
    pub std: Tensor<B, 3>,
}

impl<B: Backend> ImageNormalizer<B> {
    pub fn new(device: &Device<B>) -> Self {
        let mean = Tensor::<B, 1>::from_floats(MEAN, device).reshape([3, 1, 1]);
        let std = Tensor::<B, 1>::from_floats(STD, device).reshape([3, 1, 1]);
        Self { mean, std }
    }

    /// Channel-wise `(input - mean) / std`; input is expected in [0, 1].
    pub fn normalize(&self, input: Tensor<B, 3>) -> Tensor<B, 3> {
        (input - self.mean.clone()) / self.std.clone()
    }
}

impl<B: Backend> Transform<B> {
    /// Prepares the sample for the network:
    ///
    /// 1. bounding boxes go from pixel coordinates to the [0, 1] range the
    ///    prior boxes live in,
    /// 2. pixels are scaled to [0, 1] and standardized with the ImageNet
    ///    statistics the backbone expects.
    pub fn normalize(&mut self) -> Self {
        let [_ch, height, width] = self.image.dims();

        if let Some(bboxes) = self.bboxes.as_mut() {
            let (x1, y1, x2, y2) = boxes_to_components(bboxes.clone());
            let x1 = x1 / width as f32;
            let y1 = y1 / height as f32;
            let x2 = x2 / width as f32;
            let y2 = y2 / height as f32;

            self.bboxes = Some(Tensor::cat(vec![x1, y1, x2, y2], 1));
        }

        self.image = self.image.clone().div_scalar(MAX_PIXEL_VAL);

        self.image = ImageNormalizer::new(&self.device).normalize(self.image.clone());

        self.clone()
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

    #[test]
    fn boxes_normalize_to_unit_square() {
        let device = &NdArrayDevice::default();
        let image = create_test_image(200, 100, [0, 0, 0]);
        let bboxes = Tensor::<B, 2>::from_data([[20.0, 25.0, 180.0, 75.0]], device);

        let mut t = Transform::<B>::new(image, Some(bboxes), None, device);
        let t = t.normalize();

        Tensor::<B, 2>::from_data([[0.1, 0.25, 0.9, 0.75]], device)
            .into_data()
            .assert_approx_eq::<FT>(&t.bboxes.unwrap().to_data(), Tolerance::default());
    }

    #[test]
    fn pixels_are_standardized() {
        let device = &NdArrayDevice::default();
        // mid-gray: 0.5 in every channel after scaling
        let image = create_test_image(2, 2, [128, 128, 128]);

        let mut t = Transform::<B>::new(image, None, None, device);
        let t = t.normalize();

        let data = t.image.to_data().to_vec::<f32>().unwrap();

        // (128/255 - mean) / std per channel
        let expected = [
            (128.0 / 255.0 - 0.485) / 0.229,
            (128.0 / 255.0 - 0.456) / 0.224,
            (128.0 / 255.0 - 0.406) / 0.225,
        ];

        for ch in 0..3 {
            for px in 0..4 {
                let v: f32 = data[ch * 4 + px];
                assert!((v - expected[ch] as f32).abs() < 1e-4);
            }
        }
    }
}
