pub mod head;
pub mod norm;
pub mod ssd;
pub mod vgg;
