use crate::{boxes::boxes_to_components, transforms::pipeline::Transform};
use burn::{prelude::Backend, tensor::Tensor};

impl<B: Backend> Transform<B> {
    /// Applies [`Transform::vertical_flip`] with probability `p`.
    pub fn random_vertical_flip(&mut self, p: f32) -> Self {
        if !self.should_apply(p) {
            return self.clone();
        }

        self.vertical_flip()
    }

    /// Mirrors the image top-to-bottom and reflects bounding boxes to keep
    /// them aligned with the flipped content.
    pub fn vertical_flip(&mut self) -> Self {
        let [_ch, height, _width] = self.image.dims();

        self.image = self.image.clone().flip([1]);

        if let Some(bboxes) = self.bboxes.as_mut() {
            let (x1, y1, x2, y2) = boxes_to_components(bboxes.clone());

            // reflect around the horizontal midline; y1/y2 swap roles
            let new_y1 = y2.clone() + (height as f32 / 2.0 - y2) * 2.0;
            let new_y2 = y1.clone() + (height as f32 / 2.0 - y1) * 2.0;

            self.bboxes = Some(Tensor::cat(vec![x1, new_y1, x2, new_y2], 1));
        }

        self.clone()
    }

    /// Applies [`Transform::horizontal_flip`] with probability `p`.
    ///
    /// Horizontal flips are the one augmentation that almost always helps a
    /// detector; the original training recipe ran this at p = 0.5.
    pub fn random_horizontal_flip(&mut self, p: f32) -> Self {
        if !self.should_apply(p) {
            return self.clone();
        }

        self.horizontal_flip()
    }

    /// Mirrors the image left-to-right and reflects bounding boxes to keep
    /// them aligned with the flipped content.
    pub fn horizontal_flip(&mut self) -> Self {
        let [_ch, _height, width] = self.image.dims();

        self.image = self.image.clone().flip([2]);

        if let Some(bboxes) = self.bboxes.as_mut() {
            let (x1, y1, x2, y2) = boxes_to_components(bboxes.clone());

            let new_x1 = x2.clone() + (width as f32 / 2.0 - x2) * 2.0;
            let new_x2 = x1.clone() + (width as f32 / 2.0 - x1) * 2.0;

            self.bboxes = Some(Tensor::cat(vec![new_x1, y1, new_x2, y2], 1));
        }

        self.clone()
    }
}
