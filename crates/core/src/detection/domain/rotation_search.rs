//! Multi-angle search over a prepared batch.
//!
//! The backend is called once per angle until every item has at least one
//! box. Items that already have a face are fed as zeroed placeholders on
//! later angles so they cannot be re-detected or overwritten.

use ndarray::Array4;
use thiserror::Error;

use crate::detection::domain::batch::{BatchShapeError, PreparedBatch, SearchedBatch};
use crate::detection::domain::inference_backend::{BackendError, InferenceBackend, PredictRequest};
use crate::detection::domain::rotation_angles::RotationAngles;
use crate::detection::domain::rotation_matrix::RotationMatrix;
use crate::shared::bounding_box::BoundingBox;

#[derive(Error, Debug)]
pub enum SearchError {
    #[error("inference failed at rotation {angle} degrees: {source}")]
    Inference {
        angle: i32,
        #[source]
        source: BackendError,
    },
    #[error("backend returned {actual} predictions for a batch of {expected}")]
    PredictionCount { expected: usize, actual: usize },
    #[error("feed images are {actual:?}, expected {expected}x{expected}")]
    FeedShape { expected: usize, actual: (usize, usize) },
    #[error(transparent)]
    Shape(#[from] BatchShapeError),
}

pub struct RotationSearch {
    angles: RotationAngles,
    input_size: u32,
}

impl RotationSearch {
    pub fn new(angles: RotationAngles, input_size: u32) -> Self {
        Self { angles, input_size }
    }

    pub fn angles(&self) -> &RotationAngles {
        &self.angles
    }

    /// Runs the search. Any backend error abandons the batch.
    pub fn run(
        &self,
        batch: PreparedBatch,
        backend: &mut dyn InferenceBackend,
    ) -> Result<SearchedBatch, SearchError> {
        batch.check_lengths()?;
        let expected = self.input_size as usize;
        let feed_hw = (batch.feed.shape()[1], batch.feed.shape()[2]);
        if feed_hw != (expected, expected) {
            return Err(SearchError::FeedShape {
                expected,
                actual: feed_hw,
            });
        }

        let PreparedBatch {
            filenames,
            images,
            scales,
            pads,
            feed: initial_feed,
        } = batch;
        let n = filenames.len();

        let mut rotation_matrices: Vec<Option<RotationMatrix>> = vec![None; n];
        let mut found_faces: Vec<Vec<BoundingBox>> = vec![Vec::new(); n];
        let mut angles_tried = 0;

        for angle in self.angles.iter() {
            let rotated: Array4<f32>;
            let feed = if angle == 0 {
                initial_feed.view()
            } else {
                rotated = self.rotate_feed(&initial_feed, &found_faces, &mut rotation_matrices, angle);
                rotated.view()
            };

            let request = PredictRequest {
                feed,
                filenames: &filenames,
                rotation_matrices: &rotation_matrices,
                angle,
            };
            let prediction = backend
                .predict(&request)
                .map_err(|source| SearchError::Inference { angle, source })?;
            angles_tried += 1;

            if prediction.len() != n {
                return Err(SearchError::PredictionCount {
                    expected: n,
                    actual: prediction.len(),
                });
            }

            if angle != 0 && prediction.iter().any(|faces| !faces.is_empty()) {
                log::info!("found face(s) by rotating image {angle} degrees");
            }

            for (found, faces) in found_faces.iter_mut().zip(prediction) {
                if found.is_empty() {
                    *found = faces;
                }
            }

            if found_faces.iter().all(|faces| !faces.is_empty()) {
                log::trace!("Faces found for all images");
                break;
            }
        }

        // Items nothing was found for carry no rotation.
        for (matrix, faces) in rotation_matrices.iter_mut().zip(&found_faces) {
            if faces.is_empty() {
                *matrix = None;
            }
        }

        log::trace!(
            "detect_prediction output: (filenames: {filenames:?}, prediction: {found_faces:?}, \
             rotation_matrices: {rotation_matrices:?})"
        );

        Ok(SearchedBatch {
            filenames,
            images,
            scales,
            pads,
            predictions: found_faces,
            rotation_matrices,
            angles_tried,
        })
    }

    /// Builds the feed for a non-zero angle, always rotating from the upright feed.
    fn rotate_feed(
        &self,
        initial_feed: &Array4<f32>,
        found_faces: &[Vec<BoundingBox>],
        rotation_matrices: &mut [Option<RotationMatrix>],
        angle: i32,
    ) -> Array4<f32> {
        let mut rotated = Array4::<f32>::zeros(initial_feed.raw_dim());

        for (i, (mut slot, source)) in rotated
            .outer_iter_mut()
            .zip(initial_feed.outer_iter())
            .enumerate()
        {
            // Found items stay zeroed and keep the matrix they were found with.
            if !found_faces[i].is_empty() {
                continue;
            }
            let (height, width, _) = source.dim();
            let matrix = RotationMatrix::new(width as u32, height as u32, angle, self.input_size);
            slot.assign(&matrix.warp(source, self.input_size));
            rotation_matrices[i] = Some(matrix);
        }

        rotated
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::domain::geometry::Pad;
    use crate::shared::frame::Frame;
    use std::collections::HashMap;

    const INPUT: u32 = 8;

    fn face(v: f64) -> BoundingBox {
        BoundingBox::new(v, v, v + 2.0, v + 2.0)
    }

    fn batch(n: usize) -> PreparedBatch {
        PreparedBatch {
            filenames: (0..n).map(|i| format!("{i}.png")).collect(),
            images: vec![Frame::new(vec![0u8; 12], 2, 2, 3); n],
            scales: vec![1.0; n],
            pads: vec![Pad::default(); n],
            feed: Array4::from_elem((n, INPUT as usize, INPUT as usize, 3), 1.0),
        }
    }

    fn search(spec: &str) -> RotationSearch {
        RotationSearch::new(spec.parse().unwrap(), INPUT)
    }

    /// Records every call; answers from a per-angle script, where the
    /// script lists the items (by index) that "see" a face at that angle.
    struct ScriptedBackend {
        script: HashMap<i32, Vec<usize>>,
        calls: Vec<i32>,
        feeds: Vec<Array4<f32>>,
        matrices_seen: Vec<Vec<Option<RotationMatrix>>>,
    }

    impl ScriptedBackend {
        fn new(script: &[(i32, &[usize])]) -> Self {
            Self {
                script: script.iter().map(|(a, items)| (*a, items.to_vec())).collect(),
                calls: Vec::new(),
                feeds: Vec::new(),
                matrices_seen: Vec::new(),
            }
        }
    }

    impl InferenceBackend for ScriptedBackend {
        fn predict(
            &mut self,
            request: &PredictRequest<'_>,
        ) -> Result<Vec<Vec<BoundingBox>>, BackendError> {
            self.calls.push(request.angle);
            self.feeds.push(request.feed.to_owned());
            self.matrices_seen.push(request.rotation_matrices.to_vec());
            let hits = self.script.get(&request.angle).cloned().unwrap_or_default();
            Ok((0..request.filenames.len())
                .map(|i| {
                    if hits.contains(&i) {
                        vec![face(request.angle as f64)]
                    } else {
                        Vec::new()
                    }
                })
                .collect())
        }
    }

    struct FailingBackend;

    impl InferenceBackend for FailingBackend {
        fn predict(
            &mut self,
            request: &PredictRequest<'_>,
        ) -> Result<Vec<Vec<BoundingBox>>, BackendError> {
            if request.angle == 90 {
                Err("device lost".into())
            } else {
                Ok(vec![Vec::new(); request.filenames.len()])
            }
        }
    }

    struct ShortBackend;

    impl InferenceBackend for ShortBackend {
        fn predict(
            &mut self,
            _request: &PredictRequest<'_>,
        ) -> Result<Vec<Vec<BoundingBox>>, BackendError> {
            Ok(vec![Vec::new()])
        }
    }

    #[test]
    fn test_upright_only_calls_backend_once() {
        let mut backend = ScriptedBackend::new(&[]);
        let out = search("off").run(batch(2), &mut backend).unwrap();
        assert_eq!(backend.calls, vec![0]);
        assert_eq!(out.angles_tried, 1);
        assert!(out.predictions.iter().all(Vec::is_empty));
        assert_eq!(out.rotation_matrices, vec![None, None]);
    }

    #[test]
    fn test_stops_once_all_items_found() {
        let mut backend = ScriptedBackend::new(&[(0, &[0]), (90, &[1])]);
        let out = search("on").run(batch(2), &mut backend).unwrap();
        assert_eq!(backend.calls, vec![0, 90]);
        assert_eq!(out.angles_tried, 2);
    }

    #[test]
    fn test_all_found_upright_skips_rotation() {
        let mut backend = ScriptedBackend::new(&[(0, &[0, 1, 2])]);
        let out = search("on").run(batch(3), &mut backend).unwrap();
        assert_eq!(backend.calls, vec![0]);
        assert!(out.rotation_matrices.iter().all(Option::is_none));
    }

    #[test]
    fn test_exhausts_angle_list_when_nothing_found() {
        let mut backend = ScriptedBackend::new(&[]);
        let out = search("on").run(batch(1), &mut backend).unwrap();
        assert_eq!(backend.calls, vec![0, 90, 180, 270]);
        assert_eq!(out.rotation_matrices, vec![None]);
    }

    #[test]
    fn test_found_face_is_not_overwritten() {
        // Item 0 found at 0; the script claims a face for it at 90 and 180 too.
        let mut backend = ScriptedBackend::new(&[(0, &[0]), (90, &[0]), (180, &[0, 1])]);
        let out = search("90,180").run(batch(2), &mut backend).unwrap();
        assert_eq!(out.predictions[0], vec![face(0.0)]);
        assert_eq!(out.predictions[1], vec![face(180.0)]);
    }

    #[test]
    fn test_rotation_matrix_tracks_winning_angle() {
        let mut backend = ScriptedBackend::new(&[(0, &[0]), (180, &[1])]);
        let out = search("90,180").run(batch(2), &mut backend).unwrap();
        assert_eq!(out.rotation_matrices[0], None);
        assert_eq!(
            out.rotation_matrices[1],
            Some(RotationMatrix::new(INPUT, INPUT, 180, INPUT))
        );
    }

    #[test]
    fn test_found_items_get_zero_placeholder() {
        let mut backend = ScriptedBackend::new(&[(0, &[0])]);
        search("90").run(batch(2), &mut backend).unwrap();

        let upright = &backend.feeds[0];
        assert!(upright.iter().all(|&v| v == 1.0));

        let at_90 = &backend.feeds[1];
        assert!(at_90.index_axis(ndarray::Axis(0), 0).iter().all(|&v| v == 0.0));
        // The unresolved item is rotated from the upright feed, so its centre is intact.
        assert!(at_90[[1, 4, 4, 0]] > 0.5);
    }

    #[test]
    fn test_placeholder_keeps_previous_matrix() {
        // Item 0 found at 90; at 180 the backend must still see the 90 matrix for it.
        let mut backend = ScriptedBackend::new(&[(90, &[0])]);
        search("90,180").run(batch(2), &mut backend).unwrap();
        let seen_at_180 = &backend.matrices_seen[2];
        assert_eq!(seen_at_180[0], Some(RotationMatrix::new(INPUT, INPUT, 90, INPUT)));
        assert_eq!(seen_at_180[1], Some(RotationMatrix::new(INPUT, INPUT, 180, INPUT)));
    }

    #[test]
    fn test_backend_failure_is_fatal() {
        let err = search("on").run(batch(2), &mut FailingBackend).unwrap_err();
        match err {
            SearchError::Inference { angle, source } => {
                assert_eq!(angle, 90);
                assert_eq!(source.to_string(), "device lost");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_prediction_count_mismatch() {
        let err = search("off").run(batch(2), &mut ShortBackend).unwrap_err();
        assert!(matches!(
            err,
            SearchError::PredictionCount {
                expected: 2,
                actual: 1
            }
        ));
    }

    #[test]
    fn test_rejects_wrong_feed_size() {
        let mut prepared = batch(1);
        prepared.feed = Array4::zeros((1, 4, 4, 3));
        let err = search("off")
            .run(prepared, &mut ScriptedBackend::new(&[]))
            .unwrap_err();
        assert!(matches!(err, SearchError::FeedShape { expected: 8, .. }));
    }

    #[test]
    fn test_invocations_bounded_by_angle_count() {
        for spec in ["off", "on", "90,180", "45"] {
            let s = search(spec);
            let mut backend = ScriptedBackend::new(&[]);
            s.run(batch(3), &mut backend).unwrap();
            assert_eq!(backend.calls.len(), s.angles().len());
        }
    }
}
