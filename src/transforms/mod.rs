pub mod flip;
pub mod normalize;
pub mod pipeline;
pub mod resize;

pub use pipeline::Transform;
