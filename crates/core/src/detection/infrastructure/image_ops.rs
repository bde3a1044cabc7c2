//! Pixel-level steps of feed compilation: colour order, resize, centring.

use image::imageops::FilterType;
use image::RgbImage;
use ndarray::Array3;

use crate::detection::domain::detector_config::ColorOrder;
use crate::detection::domain::geometry::scaled_dimensions;

/// Reorders channels for the model. Frames are RGB, so only `Bgr` changes anything.
pub fn convert_color(mut image: RgbImage, order: ColorOrder) -> RgbImage {
    if order == ColorOrder::Bgr {
        for pixel in image.pixels_mut() {
            pixel.0.swap(0, 2);
        }
    }
    image
}

/// Resizes by `scale`: bicubic when enlarging, area-style when shrinking,
/// untouched at exactly 1.0.
pub fn scale_image(image: RgbImage, scale: f64) -> RgbImage {
    if scale == 1.0 {
        return image;
    }
    let (width, height) = image.dimensions();
    let (new_w, new_h) = scaled_dimensions(width, height, scale);
    let (new_w, new_h) = (new_w.max(1), new_h.max(1));
    let filter = if scale > 1.0 {
        FilterType::CatmullRom
    } else {
        FilterType::Triangle
    };
    log::trace!("Resizing detection image from {width}x{height} to {new_w}x{new_h}. Scale={scale}");
    image::imageops::resize(&image, new_w, new_h, filter)
}

/// Centres `image` on a zeroed `input_size²` canvas as `(H, W, 3)` floats.
///
/// Offsets come from the actual image size; an odd remainder goes to the
/// right/bottom edge. Anything larger than the canvas is cropped.
pub fn pad_image(image: &RgbImage, input_size: u32) -> Array3<f32> {
    let size = input_size as usize;
    let (width, height) = image.dimensions();
    let pad_l = input_size.saturating_sub(width) / 2;
    let pad_t = input_size.saturating_sub(height) / 2;

    let mut canvas = Array3::<f32>::zeros((size, size, 3));
    for (x, y, pixel) in image.enumerate_pixels() {
        let cx = (x + pad_l) as usize;
        let cy = (y + pad_t) as usize;
        if cx >= size || cy >= size {
            continue;
        }
        for c in 0..3 {
            canvas[[cy, cx, c]] = pixel.0[c] as f32;
        }
    }
    canvas
}
