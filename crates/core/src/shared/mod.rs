pub mod bounding_box;
pub mod constants;
pub mod detected_face;
pub mod frame;
pub mod message;
