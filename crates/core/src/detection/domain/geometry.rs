//! Scale/pad arithmetic between frame space and the square model input.
//!
//! The forward direction shrinks (or grows) a frame so its longer side equals
//! `input_size`, then centres it. `inverse_map` undoes exactly that.

use crate::shared::bounding_box::BoundingBox;

/// Offset of the scaled frame inside the model input, in model-input pixels.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Pad {
    pub left: u32,
    pub top: u32,
}

impl Pad {
    pub fn new(left: u32, top: u32) -> Self {
        Self { left, top }
    }
}

/// Factor mapping frame lengths to model-input lengths.
pub fn compute_scale(width: u32, height: u32, input_size: u32) -> f64 {
    input_size as f64 / width.max(height) as f64
}

/// Frame dimensions after scaling, truncated toward zero.
pub fn scaled_dimensions(width: u32, height: u32, scale: f64) -> (u32, u32) {
    (
        (width as f64 * scale) as u32,
        (height as f64 * scale) as u32,
    )
}

/// Padding derived from the declared scale: `(input - floor(dim * scale)) / 2`.
///
/// This can differ by a pixel from the centring done on the actual resized
/// image; both computations are kept as they are.
pub fn compute_pad(width: u32, height: u32, scale: f64, input_size: u32) -> Pad {
    let (scaled_w, scaled_h) = scaled_dimensions(width, height, scale);
    Pad {
        left: input_size.saturating_sub(scaled_w) / 2,
        top: input_size.saturating_sub(scaled_h) / 2,
    }
}

/// Maps a box from model-input space back to frame space.
pub fn inverse_map(bounds: &BoundingBox, scale: f64, pad: Pad) -> BoundingBox {
    let pad_left = pad.left as f64;
    let pad_top = pad.top as f64;
    BoundingBox {
        left: (bounds.left - pad_left) / scale,
        top: (bounds.top - pad_top) / scale,
        right: (bounds.right - pad_left) / scale,
        bottom: (bounds.bottom - pad_top) / scale,
    }
}
