use crate::boxes::boxes_to_components;

use super::pipeline::Transform;
use burn::{prelude::Backend, tensor::Tensor};
use image::DynamicImage;

fn resize_bboxes<B: Backend>(
    t: &mut Transform<B>,
    new_w: usize,
    new_h: usize,
    image_h: usize,
    image_w: usize,
) {
    if let Some(bboxes) = t.bboxes.as_mut() {
        let (x1, y1, x2, y2) = boxes_to_components(bboxes.clone());
        let h_ratio = new_h as f32 / image_h as f32;
        let w_ratio = new_w as f32 / image_w as f32;

        t.bboxes = Some(
            Tensor::cat(
                vec![x1 * w_ratio, y1 * h_ratio, x2 * w_ratio, y2 * h_ratio],
                1,
            )
            .floor(),
        );
    }
}

impl<B: Backend> Transform<B> {
    /// Resizes the image to `new_w` x `new_h` with triangular filtering and
    /// rescales bounding boxes proportionally.
    ///
    /// The resize round-trips through the `image` crate on the CPU; for a
    /// 300x300 SSD input this is cheap next to the forward pass, and the
    /// dataloader workers absorb it anyway.
    pub fn resize_triangular(&mut self, new_w: usize, new_h: usize) -> Self {
        let [_ch, height, width] = self.image.dims();
        let image = self.image.clone().permute([1, 2, 0]);

        let buf: Vec<u8> = image
            .to_data()
            .to_vec::<f32>()
            .unwrap()
            .iter()
            .map(|&p| p as u8)
            .collect();

        let image = DynamicImage::from(
            image::RgbImage::from_vec(width as u32, height as u32, buf).unwrap(),
        );

        let image = image
            .resize_exact(
                new_w as u32,
                new_h as u32,
                image::imageops::FilterType::Triangle,
            )
            .to_rgb8();

        self.image = Self::rgb_img_as_tensor(image, &self.device);

        resize_bboxes(self, new_w, new_h, height, width);

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
    fn resize_scales_image_and_boxes() {
        let device = &NdArrayDevice::default();
        let image = create_test_image(600, 400, [50, 60, 70]);
        let bboxes = Tensor::<B, 2>::from_data([[60.0, 40.0, 300.0, 200.0]], device);

        let mut t = Transform::<B>::new(image, Some(bboxes), None, device);
        let t = t.resize_triangular(300, 300);

        assert_eq!(t.image.shape().dims, [3, 300, 300]);

        // x scaled by 0.5, y scaled by 0.75
        Tensor::<B, 2>::from_data([[30.0, 30.0, 150.0, 150.0]], device)
            .into_data()
            .assert_approx_eq::<FT>(&t.bboxes.unwrap().to_data(), Tolerance::default());
    }

    #[test]
    fn resize_preserves_solid_color() {
        let device = &NdArrayDevice::default();
        let image = create_test_image(64, 64, [128, 128, 128]);

        let mut t = Transform::<B>::new(image, None, None, device);
        let t = t.resize_triangular(32, 32);

        let data = t.image.to_data().to_vec::<f32>().unwrap();
        assert!(data.iter().all(|&p| (p - 128.0).abs() < 1.5));
    }
}
