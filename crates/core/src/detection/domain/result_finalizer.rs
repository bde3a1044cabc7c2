use crate::detection::domain::batch::{
    BatchShapeError, DetectionResult, Detections, SearchedBatch,
};
use crate::detection::domain::geometry::inverse_map;
use crate::shared::detected_face::DetectedFace;
use crate::shared::message::Message;

/// Turns raw model-space boxes into frame-space face records.
pub struct ResultFinalizer {
    min_size: u32,
}

impl ResultFinalizer {
    /// `min_size` is the smallest kept face diagonal in frame pixels; 0 keeps all.
    pub fn new(min_size: u32) -> Self {
        Self { min_size }
    }

    /// Finalizes a batch; the end-of-stream marker passes through unchanged.
    pub fn finalize(
        &self,
        message: Message<SearchedBatch>,
    ) -> Result<Message<Detections>, BatchShapeError> {
        match message {
            Message::Item(batch) => self.finalize_batch(batch).map(Message::Item),
            Message::Eof => {
                log::trace!("Item out: EOF");
                Ok(Message::Eof)
            }
        }
    }

    pub fn finalize_batch(&self, batch: SearchedBatch) -> Result<Detections, BatchShapeError> {
        batch.check_lengths()?;
        let SearchedBatch {
            filenames,
            images,
            scales,
            pads,
            predictions,
            rotation_matrices,
            ..
        } = batch;

        let mut batch_faces: Vec<Vec<DetectedFace>> = predictions
            .iter()
            .map(|faces| faces.iter().map(DetectedFace::from_bounds).collect())
            .collect();

        let any_rotated = rotation_matrices.iter().any(Option::is_some);
        if any_rotated && batch_faces.iter().any(|faces| !faces.is_empty()) {
            for (faces, matrix) in batch_faces.iter_mut().zip(&rotation_matrices) {
                if let Some(matrix) = matrix {
                    log::trace!("Rotating bounding boxes back to upright");
                    for face in faces.iter_mut() {
                        *face = matrix.unrotate_face(face);
                    }
                }
            }
        }

        let results: Vec<DetectionResult> = filenames
            .into_iter()
            .zip(images)
            .zip(scales.into_iter().zip(pads))
            .zip(batch_faces)
            .map(|(((filename, image), (scale, pad)), faces)| {
                let (width, height) = (image.width(), image.height());
                let detected_faces = faces
                    .iter()
                    .map(|face| DetectedFace::from_bounds(&inverse_map(&face.bounds(), scale, pad)))
                    .filter(|face| face.overlaps_frame(width, height))
                    .filter(|face| self.is_large_enough(face))
                    .collect();
                DetectionResult {
                    filename,
                    image,
                    detected_faces,
                }
            })
            .collect();

        for result in &results {
            log::trace!(
                "final output: (filename: {}, detected_faces: {:?})",
                result.filename,
                result.detected_faces
            );
        }
        Ok(Detections::new(results))
    }

    fn is_large_enough(&self, face: &DetectedFace) -> bool {
        if self.min_size == 0 {
            return true;
        }
        let face_size = face.diagonal();
        if face_size < self.min_size as f64 {
            log::debug!(
                "Removing detected face: (face_size: {face_size}, min_size: {})",
                self.min_size
            );
            return false;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::domain::geometry::{compute_pad, compute_scale, Pad};
    use crate::detection::domain::rotation_matrix::RotationMatrix;
    use crate::shared::bounding_box::BoundingBox;
    use crate::shared::frame::Frame;
    use rstest::rstest;

    fn frame(width: u32, height: u32) -> Frame {
        Frame::new(vec![0u8; (width * height * 3) as usize], width, height, 3)
    }

    fn searched(
        predictions: Vec<Vec<BoundingBox>>,
        rotation_matrices: Vec<Option<RotationMatrix>>,
        width: u32,
        height: u32,
        input_size: u32,
    ) -> SearchedBatch {
        let n = predictions.len();
        let scale = compute_scale(width, height, input_size);
        let pad = compute_pad(width, height, scale, input_size);
        SearchedBatch {
            filenames: (0..n).map(|i| format!("frame_{i}.png")).collect(),
            images: vec![frame(width, height); n],
            scales: vec![scale; n],
            pads: vec![pad; n],
            predictions,
            rotation_matrices,
            angles_tried: 1,
        }
    }

    fn identity_batch(predictions: Vec<Vec<BoundingBox>>, width: u32, height: u32) -> SearchedBatch {
        let n = predictions.len();
        SearchedBatch {
            filenames: (0..n).map(|i| format!("frame_{i}.png")).collect(),
            images: vec![frame(width, height); n],
            scales: vec![1.0; n],
            pads: vec![Pad::default(); n],
            predictions,
            rotation_matrices: vec![None; n],
            angles_tried: 1,
        }
    }

    #[test]
    fn test_eof_passes_through() {
        let out = ResultFinalizer::new(0).finalize(Message::Eof).unwrap();
        assert!(out.is_eof());
    }

    #[test]
    fn test_reference_scenario_maps_to_frame_space() {
        let batch = searched(
            vec![vec![BoundingBox::new(50.0, 50.0, 150.0, 150.0)]],
            vec![None],
            800,
            600,
            256,
        );
        let results: Vec<_> = ResultFinalizer::new(0).finalize_batch(batch).unwrap().collect();
        assert_eq!(results.len(), 1);
        // (156.25, 56.25, 468.75, 368.75): origin rounds down, 312.5 ties to even.
        assert_eq!(results[0].detected_faces, vec![DetectedFace::new(156, 56, 312, 312)]);
    }

    #[test]
    fn test_half_pixel_origin_rounds_to_even() {
        let mut batch = identity_batch(vec![vec![BoundingBox::new(53.0, 53.0, 73.0, 73.0)]], 100, 100);
        batch.scales = vec![2.0];
        let results: Vec<_> = ResultFinalizer::new(0).finalize_batch(batch).unwrap().collect();
        // 26.5 -> 26, 36.5 - 26.5 -> 10
        assert_eq!(results[0].detected_faces, vec![DetectedFace::new(26, 26, 10, 10)]);
    }

    #[test]
    fn test_box_beyond_integer_range_dropped() {
        let batch = identity_batch(vec![vec![BoundingBox::new(1.5e9, 0.0, 3.0e9, 10.0)]], 100, 100);
        let results: Vec<_> = ResultFinalizer::new(0).finalize_batch(batch).unwrap().collect();
        assert!(results[0].detected_faces.is_empty());
    }

    #[test]
    fn test_output_preserves_order_and_fields() {
        let batch = identity_batch(vec![Vec::new(), Vec::new(), Vec::new()], 10, 10);
        let results: Vec<_> = ResultFinalizer::new(0).finalize_batch(batch).unwrap().collect();
        let names: Vec<_> = results.iter().map(|r| r.filename.as_str()).collect();
        assert_eq!(names, vec!["frame_0.png", "frame_1.png", "frame_2.png"]);
        assert_eq!(results[0].image.width(), 10);
    }

    #[test]
    fn test_zero_width_box_at_origin_dropped() {
        let batch = identity_batch(vec![vec![BoundingBox::new(0.0, 5.0, 0.0, 9.0)]], 100, 100);
        let results: Vec<_> = ResultFinalizer::new(0).finalize_batch(batch).unwrap().collect();
        assert!(results[0].detected_faces.is_empty());
    }

    #[rstest]
    #[case::left(BoundingBox::new(-50.0, 10.0, -5.0, 40.0))]
    #[case::right(BoundingBox::new(100.0, 10.0, 150.0, 40.0))]
    #[case::above(BoundingBox::new(10.0, -60.0, 40.0, 0.0))]
    #[case::below(BoundingBox::new(10.0, 120.0, 40.0, 160.0))]
    fn test_out_of_frame_box_dropped(#[case] bounds: BoundingBox) {
        let batch = identity_batch(vec![vec![bounds]], 100, 100);
        let results: Vec<_> = ResultFinalizer::new(0).finalize_batch(batch).unwrap().collect();
        assert!(results[0].detected_faces.is_empty());
    }

    #[test]
    fn test_partially_visible_box_kept() {
        let batch = identity_batch(vec![vec![BoundingBox::new(-20.0, -20.0, 30.0, 30.0)]], 100, 100);
        let results: Vec<_> = ResultFinalizer::new(0).finalize_batch(batch).unwrap().collect();
        assert_eq!(results[0].detected_faces, vec![DetectedFace::new(-20, -20, 50, 50)]);
    }

    #[rstest]
    // 70x71 -> diagonal 99.70
    #[case::just_below(70.0, 71.0, false)]
    // 71x71 -> diagonal 100.41
    #[case::just_above(71.0, 71.0, true)]
    // 60x80 -> diagonal exactly 100
    #[case::exactly_threshold(60.0, 80.0, true)]
    fn test_min_size_filter(#[case] w: f64, #[case] h: f64, #[case] kept: bool) {
        let batch = identity_batch(vec![vec![BoundingBox::new(10.0, 10.0, 10.0 + w, 10.0 + h)]], 500, 500);
        let results: Vec<_> = ResultFinalizer::new(100).finalize_batch(batch).unwrap().collect();
        assert_eq!(!results[0].detected_faces.is_empty(), kept);
    }

    #[test]
    fn test_min_size_zero_keeps_tiny_faces() {
        let batch = identity_batch(vec![vec![BoundingBox::new(10.0, 10.0, 12.0, 12.0)]], 100, 100);
        let results: Vec<_> = ResultFinalizer::new(0).finalize_batch(batch).unwrap().collect();
        assert_eq!(results[0].detected_faces.len(), 1);
    }

    #[test]
    fn test_rotated_detection_mapped_back_before_scaling() {
        // 180° on a 100px input: (x, y) -> (100 - x, 100 - y).
        let matrix = RotationMatrix::new(100, 100, 180, 100);
        let mut batch = identity_batch(vec![vec![BoundingBox::new(60.0, 70.0, 80.0, 80.0)], Vec::new()], 200, 200);
        batch.scales = vec![0.5; 2];
        batch.rotation_matrices = vec![Some(matrix), None];

        let results: Vec<_> = ResultFinalizer::new(0).finalize_batch(batch).unwrap().collect();
        let face = results[0].detected_faces[0];
        // Upright model-space box is (20..40, 20..30); at scale 0.5 that is (40..80, 40..60).
        assert!((face.x - 40).abs() <= 2);
        assert!((face.y - 40).abs() <= 2);
        assert!((face.w - 40).abs() <= 2);
        assert!((face.h - 20).abs() <= 2);
        assert!(results[1].detected_faces.is_empty());
    }

    #[test]
    fn test_upright_detection_ignores_other_items_rotation() {
        let matrix = RotationMatrix::new(100, 100, 90, 100);
        let mut batch = identity_batch(
            vec![
                vec![BoundingBox::new(10.0, 20.0, 30.0, 60.0)],
                vec![BoundingBox::new(40.0, 10.0, 80.0, 30.0)],
            ],
            100,
            100,
        );
        batch.rotation_matrices = vec![None, Some(matrix)];

        let results: Vec<_> = ResultFinalizer::new(0).finalize_batch(batch).unwrap().collect();
        assert_eq!(results[0].detected_faces, vec![DetectedFace::new(10, 20, 20, 40)]);
        let rotated = results[1].detected_faces[0];
        assert!((rotated.x - 10).abs() <= 1);
        assert!((rotated.y - 20).abs() <= 1);
    }

    #[test]
    fn test_shape_mismatch_rejected() {
        let mut batch = identity_batch(vec![Vec::new(), Vec::new()], 10, 10);
        batch.rotation_matrices.pop();
        let err = ResultFinalizer::new(0).finalize_batch(batch).unwrap_err();
        assert_eq!(err.column, "rotation_matrix");
    }
}
