pub mod batch;
pub mod detector_config;
pub mod geometry;
pub mod inference_backend;
pub mod item_source;
pub mod result_finalizer;
pub mod rotation_angles;
pub mod rotation_matrix;
pub mod rotation_search;
