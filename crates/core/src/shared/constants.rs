/// Square model input used when the caller does not specify one.
pub const DEFAULT_INPUT_SIZE: u32 = 640;

pub const DEFAULT_BATCH_SIZE: usize = 8;

pub const DEFAULT_CONFIDENCE: f64 = 0.5;

/// Angle increment of the `on` rotation mode.
pub const ROTATION_ON_STEP: i32 = 90;

/// Capacity of the queues between reader, detector and writer.
pub const QUEUE_CAPACITY: usize = 16;

pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "tiff", "tif", "webp"];
