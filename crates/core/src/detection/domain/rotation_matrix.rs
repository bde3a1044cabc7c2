//! 2×3 affine rotation between the upright feed and a rotated feed.
//!
//! The matrix is always constructed in the forward direction (upright →
//! rotated, the direction the feed image is warped). Detections found on the
//! rotated feed are mapped back through [`RotationMatrix::unrotate_face`],
//! which applies the inverse. No caller negates angles or inverts matrices.

use ndarray::{Array3, ArrayView3};

use crate::shared::bounding_box::BoundingBox;
use crate::shared::detected_face::DetectedFace;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RotationMatrix {
    rows: [[f64; 3]; 2],
}

impl RotationMatrix {
    /// Rotation about the centre of a `width × height` image by `angle`
    /// degrees clockwise, translated so the centre lands on the centre of an
    /// `input_size` square.
    pub fn new(width: u32, height: u32, angle: i32, input_size: u32) -> Self {
        let cx = width as f64 / 2.0;
        let cy = height as f64 / 2.0;
        // Counter-clockwise is positive in image coordinates, hence the negation.
        let theta = (-(angle as f64)).to_radians();
        let alpha = theta.cos();
        let beta = theta.sin();

        let half = input_size as f64 / 2.0;
        let rows = [
            [alpha, beta, (1.0 - alpha) * cx - beta * cy + (half - cx)],
            [-beta, alpha, beta * cx + (1.0 - alpha) * cy + (half - cy)],
        ];
        log::trace!("Rotation matrix for {angle} degrees: {rows:?}");
        Self { rows }
    }

    /// Upright → rotated.
    pub fn apply(&self, (x, y): (f64, f64)) -> (f64, f64) {
        let [r0, r1] = self.rows;
        (
            r0[0] * x + r0[1] * y + r0[2],
            r1[0] * x + r1[1] * y + r1[2],
        )
    }

    /// Maps a face record found on the rotated feed back onto the upright
    /// feed, returning the axis-aligned box enclosing its rotated corners.
    /// Coordinates are truncated toward zero.
    pub fn unrotate_face(&self, face: &DetectedFace) -> DetectedFace {
        let inverse = self.inverse();
        let BoundingBox {
            left,
            top,
            right,
            bottom,
        } = face.bounds();
        let corners = [(left, top), (right, top), (right, bottom), (left, bottom)]
            .map(|corner| inverse.apply(corner));

        let min_x = corners.iter().map(|p| p.0).fold(f64::INFINITY, f64::min);
        let min_y = corners.iter().map(|p| p.1).fold(f64::INFINITY, f64::min);
        let max_x = corners.iter().map(|p| p.0).fold(f64::NEG_INFINITY, f64::max);
        let max_y = corners.iter().map(|p| p.1).fold(f64::NEG_INFINITY, f64::max);

        DetectedFace::new(
            truncate_coord(min_x),
            truncate_coord(min_y),
            truncate_coord(max_x - min_x),
            truncate_coord(max_y - min_y),
        )
    }

    /// Inverse affine transform. A singular matrix inverts to all zeros.
    pub fn inverse(&self) -> RotationMatrix {
        let [[a, b, tx], [c, d, ty]] = self.rows;
        let det = a * d - b * c;
        let det = if det != 0.0 { 1.0 / det } else { 0.0 };
        let ia = d * det;
        let ib = -b * det;
        let ic = -c * det;
        let id = a * det;
        RotationMatrix {
            rows: [
                [ia, ib, -ia * tx - ib * ty],
                [ic, id, -ic * tx - id * ty],
            ],
        }
    }

    /// Warps an `(H, W, C)` image into a `size × size` canvas with bilinear
    /// sampling. Pixels that map outside the source are zero.
    pub fn warp(&self, src: ArrayView3<'_, f32>, size: u32) -> Array3<f32> {
        let inverse = self.inverse();
        let (_, _, channels) = src.dim();
        let s = size as usize;
        let mut out = Array3::<f32>::zeros((s, s, channels));

        for y in 0..s {
            for x in 0..s {
                let (sx, sy) = inverse.apply((x as f64, y as f64));
                let x0 = sx.floor();
                let y0 = sy.floor();
                let fx = (sx - x0) as f32;
                let fy = (sy - y0) as f32;
                let x0 = x0 as i64;
                let y0 = y0 as i64;

                for c in 0..channels {
                    let top = sample(&src, x0, y0, c) * (1.0 - fx) + sample(&src, x0 + 1, y0, c) * fx;
                    let bottom =
                        sample(&src, x0, y0 + 1, c) * (1.0 - fx) + sample(&src, x0 + 1, y0 + 1, c) * fx;
                    out[[y, x, c]] = top * (1.0 - fy) + bottom * fy;
                }
            }
        }
        out
    }
}

/// Truncates toward zero, saturating at the `i32` range.
fn truncate_coord(value: f64) -> i32 {
    value.trunc().clamp(i32::MIN as f64, i32::MAX as f64) as i32
}

fn sample(src: &ArrayView3<'_, f32>, x: i64, y: i64, c: usize) -> f32 {
    let (h, w, _) = src.dim();
    if x < 0 || y < 0 || x as usize >= w || y as usize >= h {
        return 0.0;
    }
    src[[y as usize, x as usize, c]]
}
