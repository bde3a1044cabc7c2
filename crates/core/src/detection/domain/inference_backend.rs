use ndarray::ArrayView4;

use crate::detection::domain::rotation_matrix::RotationMatrix;
use crate::shared::bounding_box::BoundingBox;

pub type BackendError = Box<dyn std::error::Error + Send + Sync>;

/// Everything a backend may consult for one invocation.
pub struct PredictRequest<'a> {
    /// `(items, input_size, input_size, channels)`, possibly rotated and
    /// with zeroed placeholders for items that already have a face.
    pub feed: ArrayView4<'a, f32>,
    pub filenames: &'a [String],
    pub rotation_matrices: &'a [Option<RotationMatrix>],
    /// Angle the feed was rotated by, in degrees.
    pub angle: i32,
}

/// Domain interface for the model call.
///
/// Returns one list of boxes per item, in model-input space of the feed.
/// Implementations may keep session state, hence `&mut self`.
pub trait InferenceBackend: Send {
    fn predict(&mut self, request: &PredictRequest<'_>) -> Result<Vec<Vec<BoundingBox>>, BackendError>;
}
