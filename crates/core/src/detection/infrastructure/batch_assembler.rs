use ndarray::{Array3, Axis};
use thiserror::Error;

use crate::detection::domain::batch::{PreparedBatch, SourceItem};
use crate::detection::domain::detector_config::{ColorOrder, DetectorConfig};
use crate::detection::domain::geometry::{compute_pad, compute_scale, Pad};
use crate::detection::domain::item_source::{ItemSource, SourceError};
use crate::shared::frame::Frame;
use crate::shared::message::Message;

use super::image_ops::{convert_color, pad_image, scale_image};

#[derive(Error, Debug)]
pub enum AssembleError {
    #[error("malformed item '{filename}': {reason}")]
    MalformedItem { filename: String, reason: String },
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error("failed to stack detection feed: {0}")]
    Stack(#[from] ndarray::ShapeError),
}

/// Pulls items off a source and compiles them into a model-ready batch.
pub struct BatchAssembler {
    input_size: u32,
    batchsize: usize,
    color_order: ColorOrder,
}

impl BatchAssembler {
    pub fn new(config: &DetectorConfig) -> Self {
        Self {
            input_size: config.input_size(),
            batchsize: config.batchsize(),
            color_order: config.color_order(),
        }
    }

    /// Collects up to `batchsize` items, stopping early at end of stream.
    ///
    /// Returns `(exhausted, batch)`; the batch is `None` when the marker
    /// arrived before any item. Blocks on the source without a timeout.
    pub fn assemble(
        &self,
        source: &mut dyn ItemSource,
    ) -> Result<(bool, Option<PreparedBatch>), AssembleError> {
        let mut exhausted = false;
        let mut filenames = Vec::with_capacity(self.batchsize);
        let mut images = Vec::with_capacity(self.batchsize);
        let mut scales = Vec::with_capacity(self.batchsize);
        let mut pads = Vec::with_capacity(self.batchsize);
        let mut scaled = Vec::with_capacity(self.batchsize);

        while filenames.len() < self.batchsize {
            let item = match source.next_message()? {
                Message::Item(item) => item,
                Message::Eof => {
                    log::trace!("EOF received");
                    exhausted = true;
                    break;
                }
            };
            let SourceItem {
                filename, image, ..
            } = item;
            log::trace!("Putting to batch: (filename: {filename})");
            let (feed_image, scale, pad) = self.compile_detection_image(&filename, &image)?;
            filenames.push(filename);
            images.push(image);
            scales.push(scale);
            pads.push(pad);
            scaled.push(feed_image);
        }

        if filenames.is_empty() {
            log::trace!("Returning empty batch");
            return Ok((exhausted, None));
        }

        let views: Vec<_> = scaled.iter().map(|image| image.view()).collect();
        let feed = ndarray::stack(Axis(0), &views)?;
        log::trace!(
            "Returning batch: (filenames: {filenames:?}, feed shape: {:?}, scales: {scales:?}, pads: {pads:?})",
            feed.shape()
        );
        let batch = PreparedBatch {
            filenames,
            images,
            scales,
            pads,
            feed,
        };
        Ok((exhausted, Some(batch)))
    }

    /// Colour-converts, scales and centres one frame for the model.
    pub fn compile_detection_image(
        &self,
        filename: &str,
        frame: &Frame,
    ) -> Result<(Array3<f32>, f64, Pad), AssembleError> {
        let malformed = |reason: String| AssembleError::MalformedItem {
            filename: filename.to_string(),
            reason,
        };
        if frame.width() == 0 || frame.height() == 0 {
            return Err(malformed("empty image".to_string()));
        }
        if frame.channels() != 3 {
            return Err(malformed(format!(
                "unsupported channel count {}",
                frame.channels()
            )));
        }
        let rgb = frame.to_rgb_image().ok_or_else(|| {
            malformed(format!(
                "pixel buffer of {} bytes does not match {}x{}x3",
                frame.data().len(),
                frame.width(),
                frame.height()
            ))
        })?;

        let image = convert_color(rgb, self.color_order);
        let scale = compute_scale(frame.width(), frame.height(), self.input_size);
        let pad = compute_pad(frame.width(), frame.height(), scale, self.input_size);
        let image = scale_image(image, scale);
        let compiled = pad_image(&image, self.input_size);
        log::trace!(
            "compiled: (image shape: {:?}, scale: {scale}, pad: {pad:?})",
            compiled.shape()
        );
        Ok((compiled, scale, pad))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    struct QueueSource(VecDeque<Message<SourceItem>>);

    impl ItemSource for QueueSource {
        fn next_message(&mut self) -> Result<Message<SourceItem>, SourceError> {
            self.0.pop_front().ok_or(SourceError::Disconnected)
        }
    }

    fn item(name: &str, width: u32, height: u32) -> Message<SourceItem> {
        let frame = Frame::new(vec![200u8; (width * height * 3) as usize], width, height, 3);
        Message::Item(SourceItem::new(name, frame))
    }

    fn source(messages: Vec<Message<SourceItem>>) -> QueueSource {
        QueueSource(messages.into())
    }

    fn assembler(input_size: u32, batchsize: usize) -> BatchAssembler {
        BatchAssembler::new(&DetectorConfig::new(input_size, batchsize, "off", 0).unwrap())
    }

    #[test]
    fn test_fills_batch_without_consuming_eof() {
        let mut src = source(vec![item("a", 8, 8), item("b", 8, 8), Message::Eof]);
        let (exhausted, batch) = assembler(16, 2).assemble(&mut src).unwrap();
        let batch = batch.unwrap();
        assert!(!exhausted);
        assert_eq!(batch.filenames, vec!["a", "b"]);
        assert_eq!(batch.feed.shape(), &[2, 16, 16, 3]);
        assert_eq!(src.0.len(), 1);
    }

    #[test]
    fn test_partial_batch_at_eof() {
        let mut src = source(vec![item("a", 8, 8), Message::Eof]);
        let (exhausted, batch) = assembler(16, 4).assemble(&mut src).unwrap();
        assert!(exhausted);
        assert_eq!(batch.unwrap().len(), 1);
    }

    #[test]
    fn test_immediate_eof_gives_no_batch() {
        let mut src = source(vec![Message::Eof]);
        let (exhausted, batch) = assembler(16, 4).assemble(&mut src).unwrap();
        assert!(exhausted);
        assert!(batch.is_none());
    }

    #[test]
    fn test_records_scale_and_pad_per_item() {
        let mut src = source(vec![item("wide", 800, 600), item("tall", 400, 600), Message::Eof]);
        let (_, batch) = assembler(256, 2).assemble(&mut src).unwrap();
        let batch = batch.unwrap();
        approx::assert_relative_eq!(batch.scales[0], 0.32);
        assert_eq!(batch.pads[0], Pad::new(0, 32));
        approx::assert_relative_eq!(batch.scales[1], 256.0 / 600.0);
        assert_eq!(batch.pads[1], Pad::new(43, 0));
        batch.check_lengths().unwrap();
    }

    #[test]
    fn test_feed_holds_pixel_values_inside_pad() {
        let mut src = source(vec![item("a", 8, 4), Message::Eof]);
        let (_, batch) = assembler(8, 1).assemble(&mut src).unwrap();
        let feed = batch.unwrap().feed;
        assert_eq!(feed[[0, 0, 0, 0]], 0.0);
        assert_eq!(feed[[0, 2, 0, 0]], 200.0);
        assert_eq!(feed[[0, 5, 7, 2]], 200.0);
        assert_eq!(feed[[0, 6, 0, 0]], 0.0);
    }

    #[test]
    fn test_malformed_item_is_an_error() {
        let bad = SourceItem::new("broken.png", Frame::new(vec![0u8; 5], 4, 4, 3));
        let mut src = source(vec![Message::Item(bad), Message::Eof]);
        let err = assembler(16, 2).assemble(&mut src).unwrap_err();
        assert!(matches!(err, AssembleError::MalformedItem { ref filename, .. } if filename == "broken.png"));
    }

    #[test]
    fn test_empty_image_is_an_error() {
        let bad = SourceItem::new("empty.png", Frame::new(Vec::new(), 0, 0, 3));
        let mut src = source(vec![Message::Item(bad)]);
        assert!(matches!(
            assembler(16, 2).assemble(&mut src),
            Err(AssembleError::MalformedItem { .. })
        ));
    }

    #[test]
    fn test_grayscale_frame_rejected() {
        let gray = SourceItem::new("gray.png", Frame::new(vec![0u8; 16], 4, 4, 1));
        let mut src = source(vec![Message::Item(gray)]);
        assert!(matches!(
            assembler(16, 2).assemble(&mut src),
            Err(AssembleError::MalformedItem { .. })
        ));
    }

    #[test]
    fn test_disconnect_without_eof_is_an_error() {
        let mut src = source(vec![item("a", 8, 8)]);
        let err = assembler(16, 4).assemble(&mut src).unwrap_err();
        assert!(matches!(err, AssembleError::Source(SourceError::Disconnected)));
    }

    #[test]
    fn test_bgr_order_applied_to_feed() {
        let frame = Frame::new([10u8, 20, 30].repeat(4), 2, 2, 3);
        let mut src = source(vec![Message::Item(SourceItem::new("c", frame)), Message::Eof]);
        let config = DetectorConfig::new(2, 1, "off", 0)
            .unwrap()
            .with_color_order(ColorOrder::Bgr);
        let (_, batch) = BatchAssembler::new(&config).assemble(&mut src).unwrap();
        let feed = batch.unwrap().feed;
        assert_eq!(feed[[0, 0, 0, 0]], 30.0);
        assert_eq!(feed[[0, 0, 0, 2]], 10.0);
    }
}
