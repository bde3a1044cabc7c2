//! Column-oriented batch types passed between the detection stages.
//!
//! Each stage consumes the previous stage's struct and returns a narrower
//! one: `PreparedBatch` (assembler) → `SearchedBatch` (rotation search) →
//! `Detections` (finalizer). Column lengths are checked at every boundary.

use ndarray::Array4;
use thiserror::Error;

use crate::detection::domain::geometry::Pad;
use crate::detection::domain::rotation_matrix::RotationMatrix;
use crate::shared::bounding_box::BoundingBox;
use crate::shared::detected_face::DetectedFace;
use crate::shared::frame::Frame;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("batch column '{column}' has {actual} entries, expected {expected}")]
pub struct BatchShapeError {
    pub column: &'static str,
    pub expected: usize,
    pub actual: usize,
}

fn check_column(column: &'static str, expected: usize, actual: usize) -> Result<(), BatchShapeError> {
    if expected == actual {
        Ok(())
    } else {
        Err(BatchShapeError {
            column,
            expected,
            actual,
        })
    }
}

/// One frame delivered by the upstream source.
#[derive(Clone, Debug, PartialEq)]
pub struct SourceItem {
    pub filename: String,
    pub image: Frame,
    /// Faces known upstream; replaced by this detector's output.
    pub detected_faces: Vec<DetectedFace>,
}

impl SourceItem {
    pub fn new(filename: impl Into<String>, image: Frame) -> Self {
        Self {
            filename: filename.into(),
            image,
            detected_faces: Vec::new(),
        }
    }
}

/// Assembler output: per-item columns plus the stacked model feed.
#[derive(Debug)]
pub struct PreparedBatch {
    pub filenames: Vec<String>,
    pub images: Vec<Frame>,
    pub scales: Vec<f64>,
    pub pads: Vec<Pad>,
    /// `(items, input_size, input_size, channels)`.
    pub feed: Array4<f32>,
}

impl PreparedBatch {
    pub fn len(&self) -> usize {
        self.filenames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filenames.is_empty()
    }

    pub fn check_lengths(&self) -> Result<(), BatchShapeError> {
        let n = self.len();
        check_column("image", n, self.images.len())?;
        check_column("scale", n, self.scales.len())?;
        check_column("pad", n, self.pads.len())?;
        check_column("feed", n, self.feed.shape()[0])
    }
}

/// Rotation-search output.
///
/// `rotation_matrices[i]` is the matrix of the angle that produced
/// `predictions[i]`, or `None` when found upright or not found at all.
#[derive(Debug)]
pub struct SearchedBatch {
    pub filenames: Vec<String>,
    pub images: Vec<Frame>,
    pub scales: Vec<f64>,
    pub pads: Vec<Pad>,
    /// Boxes in model-input space of the feed they were found on.
    pub predictions: Vec<Vec<BoundingBox>>,
    pub rotation_matrices: Vec<Option<RotationMatrix>>,
    /// Number of backend invocations the search needed.
    pub angles_tried: usize,
}

impl SearchedBatch {
    pub fn len(&self) -> usize {
        self.filenames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filenames.is_empty()
    }

    pub fn check_lengths(&self) -> Result<(), BatchShapeError> {
        let n = self.len();
        check_column("image", n, self.images.len())?;
        check_column("scale", n, self.scales.len())?;
        check_column("pad", n, self.pads.len())?;
        check_column("prediction", n, self.predictions.len())?;
        check_column("rotation_matrix", n, self.rotation_matrices.len())
    }
}

/// Final per-item record handed downstream.
#[derive(Clone, Debug, PartialEq)]
pub struct DetectionResult {
    pub filename: String,
    pub image: Frame,
    /// Faces in frame space.
    pub detected_faces: Vec<DetectedFace>,
}

/// The finalized records of one batch, yielded once each in input order.
#[derive(Debug)]
pub struct Detections {
    inner: std::vec::IntoIter<DetectionResult>,
}

impl Detections {
    pub fn new(results: Vec<DetectionResult>) -> Self {
        Self {
            inner: results.into_iter(),
        }
    }
}

impl Iterator for Detections {
    type Item = DetectionResult;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl ExactSizeIterator for Detections {}

impl std::iter::FusedIterator for Detections {}
