use std::time::Instant;

use crossbeam_channel::Sender;
use thiserror::Error;

use crate::detection::domain::batch::{
    BatchShapeError, DetectionResult, Detections, PreparedBatch,
};
use crate::detection::domain::detector_config::DetectorConfig;
use crate::detection::domain::inference_backend::InferenceBackend;
use crate::detection::domain::item_source::ItemSource;
use crate::detection::domain::result_finalizer::ResultFinalizer;
use crate::detection::domain::rotation_search::{RotationSearch, SearchError};
use crate::detection::infrastructure::batch_assembler::{AssembleError, BatchAssembler};
use crate::pipeline::pipeline_logger::PipelineLogger;
use crate::shared::message::Message;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Assemble(#[from] AssembleError),
    #[error(transparent)]
    Search(#[from] SearchError),
    #[error(transparent)]
    Shape(#[from] BatchShapeError),
    #[error("detection sink closed before all results were delivered")]
    SinkClosed,
}

/// Batch loop: assemble → rotation search → finalize → downstream.
///
/// Each batch is processed to completion before the next is assembled.
/// Results leave in input order, followed by a single end-of-stream marker.
pub struct DetectFacesUseCase {
    assembler: BatchAssembler,
    search: RotationSearch,
    finalizer: ResultFinalizer,
    backend: Box<dyn InferenceBackend>,
    logger: Box<dyn PipelineLogger>,
    total_items: usize,
}

impl DetectFacesUseCase {
    pub fn new(
        config: &DetectorConfig,
        backend: Box<dyn InferenceBackend>,
        logger: Box<dyn PipelineLogger>,
    ) -> Self {
        Self {
            assembler: BatchAssembler::new(config),
            search: RotationSearch::new(config.rotation().clone(), config.input_size()),
            finalizer: ResultFinalizer::new(config.min_size()),
            backend,
            logger,
            total_items: 0,
        }
    }

    /// Expected item count, used for progress reporting only.
    pub fn with_total_items(mut self, total_items: usize) -> Self {
        self.total_items = total_items;
        self
    }

    /// Searches and finalizes one prepared batch. The end marker passes through.
    pub fn process(
        &mut self,
        message: Message<PreparedBatch>,
    ) -> Result<Message<Detections>, PipelineError> {
        let batch = match message {
            Message::Item(batch) => batch,
            Message::Eof => return Ok(self.finalizer.finalize(Message::Eof)?),
        };

        self.logger.metric("batch_size", batch.len() as f64);
        let start = Instant::now();
        let searched = self.search.run(batch, self.backend.as_mut())?;
        self.logger.timing("search", elapsed_ms(start));
        self.logger.metric("angles_tried", searched.angles_tried as f64);

        let start = Instant::now();
        let detections = self.finalizer.finalize(Message::Item(searched))?;
        self.logger.timing("finalize", elapsed_ms(start));
        Ok(detections)
    }

    /// Drains `source` batch by batch, sending every result to `sink`.
    ///
    /// Returns the number of results delivered. Any error abandons the
    /// current batch and stops the run without sending the end marker.
    pub fn execute(
        &mut self,
        source: &mut dyn ItemSource,
        sink: &Sender<Message<DetectionResult>>,
    ) -> Result<usize, PipelineError> {
        let mut delivered = 0;
        loop {
            let start = Instant::now();
            let (exhausted, batch) = self.assembler.assemble(source)?;
            self.logger.timing("assemble", elapsed_ms(start));

            if let Some(batch) = batch {
                let detections = self.process(Message::Item(batch))?;
                delivered += forward(detections, sink)?;
                self.logger.progress(delivered, self.total_items);
            }
            if exhausted {
                break;
            }
        }

        let eof = self.process(Message::Eof)?;
        forward(eof, sink)?;
        self.logger.summary();
        Ok(delivered)
    }
}

/// Sends finalized records (or the end marker) downstream; returns how many records went out.
fn forward(
    message: Message<Detections>,
    sink: &Sender<Message<DetectionResult>>,
) -> Result<usize, PipelineError> {
    match message {
        Message::Item(detections) => {
            let mut sent = 0;
            for result in detections {
                sink.send(Message::Item(result))
                    .map_err(|_| PipelineError::SinkClosed)?;
                sent += 1;
            }
            Ok(sent)
        }
        Message::Eof => {
            sink.send(Message::Eof)
                .map_err(|_| PipelineError::SinkClosed)?;
            Ok(0)
        }
    }
}

fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}
