use serde::Serialize;

use crate::shared::bounding_box::BoundingBox;

/// A face record: integer origin plus size.
///
/// `right()` and `bottom()` are derived from the rounded size, so they can
/// differ by one pixel from rounding the raw corner directly.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct DetectedFace {
    pub x: i32,
    pub y: i32,
    pub w: i32,
    pub h: i32,
}

impl DetectedFace {
    pub fn new(x: i32, y: i32, w: i32, h: i32) -> Self {
        Self { x, y, w, h }
    }

    /// Rounds origin and size of `bounds` to the nearest integer, ties to even.
    /// Values beyond the `i32` range saturate.
    pub fn from_bounds(bounds: &BoundingBox) -> Self {
        Self {
            x: round_coord(bounds.left),
            y: round_coord(bounds.top),
            w: round_coord(bounds.right - bounds.left),
            h: round_coord(bounds.bottom - bounds.top),
        }
    }

    pub fn left(&self) -> i32 {
        self.x
    }

    pub fn top(&self) -> i32 {
        self.y
    }

    pub fn right(&self) -> i32 {
        self.x.saturating_add(self.w)
    }

    pub fn bottom(&self) -> i32 {
        self.y.saturating_add(self.h)
    }

    pub fn bounds(&self) -> BoundingBox {
        BoundingBox::new(
            self.x as f64,
            self.y as f64,
            self.x as f64 + self.w as f64,
            self.y as f64 + self.h as f64,
        )
    }

    /// Length of the box diagonal in pixels.
    pub fn diagonal(&self) -> f64 {
        let w = self.w as f64;
        let h = self.h as f64;
        (w * w + h * h).sqrt()
    }

    /// False when the record lies entirely outside a `width × height` frame.
    pub fn overlaps_frame(&self, width: u32, height: u32) -> bool {
        let (x, y) = (self.x as i64, self.y as i64);
        x + self.w as i64 > 0 && x < width as i64 && y + self.h as i64 > 0 && y < height as i64
    }
}

fn round_coord(value: f64) -> i32 {
    value
        .round_ties_even()
        .clamp(i32::MIN as f64, i32::MAX as f64) as i32
}
