/// Box-regressing face detector behind ONNX Runtime via `ort`.
///
/// Takes the batch feed as prepared upstream, runs the session once per
/// call and decodes `[N, D, >=5]` rows of `(x1, y1, x2, y2, score, ...)` in
/// model-input space. Confidence threshold and NMS are applied per item.
use std::path::Path;

use ndarray::{Array4, ArrayViewD};

use crate::detection::domain::inference_backend::{BackendError, InferenceBackend, PredictRequest};
use crate::shared::bounding_box::BoundingBox;

use super::math::{nms, ScoredBox};

/// NMS IoU threshold.
const NMS_IOU_THRESH: f64 = 0.45;

/// Values per decoded row: four corners plus a score.
const ROW_VALUES: usize = 5;

pub struct OnnxBoxBackend {
    session: ort::session::Session,
    confidence: f64,
    channels_first: bool,
    input_size: Option<u32>,
}

impl OnnxBoxBackend {
    /// Loads the model. Layout is read from the first input: a channel axis of
    /// 3 at position 1 means NCHW, anything else is fed as NHWC.
    pub fn new(model_path: &Path, confidence: f64) -> Result<Self, Box<dyn std::error::Error>> {
        let session = ort::session::Session::builder()?
            .with_execution_providers(execution_providers())?
            .commit_from_file(model_path)?;

        let input_shape: Option<Vec<i64>> = session.inputs().first().and_then(|input| {
            if let ort::value::ValueType::Tensor { ref shape, .. } = input.dtype() {
                Some(shape.iter().copied().collect())
            } else {
                None
            }
        });
        let (channels_first, input_size) = match input_shape.as_deref() {
            Some([_, 3, h, _]) => (true, (*h > 0).then_some(*h as u32)),
            Some([_, h, _, _]) => (false, (*h > 0).then_some(*h as u32)),
            _ => (false, None),
        };
        log::debug!(
            "Loaded detector model: (path: {}, channels_first: {channels_first}, input_size: {input_size:?})",
            model_path.display()
        );

        Ok(Self {
            session,
            confidence,
            channels_first,
            input_size,
        })
    }

    /// Square input size declared by the model, when it is static.
    pub fn model_input_size(&self) -> Option<u32> {
        self.input_size
    }
}

impl InferenceBackend for OnnxBoxBackend {
    fn predict(&mut self, request: &PredictRequest<'_>) -> Result<Vec<Vec<BoundingBox>>, BackendError> {
        let batch = request.feed.shape()[0];
        let input: Array4<f32> = if self.channels_first {
            request
                .feed
                .permuted_axes([0, 3, 1, 2])
                .as_standard_layout()
                .into_owned()
        } else {
            request.feed.to_owned()
        };

        let input_value = ort::value::Tensor::from_array(input)?;
        let outputs = self.session.run(ort::inputs![input_value])?;
        if outputs.len() == 0 {
            return Err("detector model produced no outputs".into());
        }
        let tensor = outputs[0].try_extract_array::<f32>()?;
        decode_predictions(tensor.view(), batch, self.confidence, NMS_IOU_THRESH)
    }
}

fn execution_providers() -> Vec<ort::execution_providers::ExecutionProviderDispatch> {
    #[cfg(target_os = "macos")]
    {
        vec![ort::execution_providers::CoreMLExecutionProvider::default().build()]
    }
    #[cfg(target_os = "windows")]
    {
        vec![ort::execution_providers::DirectMLExecutionProvider::default().build()]
    }
    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    {
        vec![]
    }
}

/// Decodes a `[N, D, >=5]` output into per-item boxes.
pub fn decode_predictions(
    output: ArrayViewD<'_, f32>,
    batch: usize,
    confidence: f64,
    iou_thresh: f64,
) -> Result<Vec<Vec<BoundingBox>>, BackendError> {
    let shape = output.shape();
    if shape.len() != 3 || shape[0] != batch || shape[2] < ROW_VALUES {
        return Err(format!(
            "unexpected detector output shape {shape:?} for batch of {batch}"
        )
        .into());
    }

    let predictions = output
        .into_dimensionality::<ndarray::Ix3>()?
        .outer_iter()
        .map(|rows| {
            let candidates: Vec<ScoredBox> = rows
                .outer_iter()
                .filter_map(|row| {
                    let score = row[4] as f64;
                    if score < confidence {
                        return None;
                    }
                    let bounds = BoundingBox::new(
                        row[0] as f64,
                        row[1] as f64,
                        row[2] as f64,
                        row[3] as f64,
                    );
                    Some(ScoredBox { bounds, score })
                })
                .collect();
            nms(candidates, iou_thresh)
                .into_iter()
                .map(|candidate| candidate.bounds)
                .collect()
        })
        .collect();
    Ok(predictions)
}
