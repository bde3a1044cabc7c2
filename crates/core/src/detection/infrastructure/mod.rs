pub mod batch_assembler;
pub mod image_ops;
pub mod math;
pub mod onnx_box_backend;
