use std::thread::JoinHandle;

use crossbeam_channel::{Receiver, Sender};

use crate::detection::domain::batch::{DetectionResult, SourceItem};
use crate::io::domain::detection_writer::{DetectionWriter, WriteError};
use crate::io::domain::frame_reader::{FrameReader, ReadError};
use crate::pipeline::detect_faces_use_case::DetectFacesUseCase;
use crate::shared::constants::QUEUE_CAPACITY;
use crate::shared::message::Message;

/// Runs a detection use case with decoding and output on their own threads.
///
/// Layout: `reader → [assemble/search/finalize on caller thread] → writer`
///
/// Queues are bounded, so a slow stage back-pressures the others.
pub struct ThreadedDetectionRunner {
    channel_capacity: usize,
}

impl ThreadedDetectionRunner {
    pub fn new() -> Self {
        Self {
            channel_capacity: QUEUE_CAPACITY,
        }
    }

    pub fn with_capacity(channel_capacity: usize) -> Self {
        Self {
            channel_capacity: channel_capacity.max(1),
        }
    }

    /// Returns the number of results handed to the writer.
    pub fn run(
        &self,
        reader: Box<dyn FrameReader>,
        writer: Box<dyn DetectionWriter>,
        use_case: &mut DetectFacesUseCase,
    ) -> Result<usize, Box<dyn std::error::Error>> {
        let cap = self.channel_capacity;
        let (item_tx, item_rx) = crossbeam_channel::bounded::<Message<SourceItem>>(cap);
        let (result_tx, result_rx) = crossbeam_channel::bounded::<Message<DetectionResult>>(cap);

        let reader_handle = spawn_reader(reader, item_tx);
        let writer_handle = spawn_writer(writer, result_rx);

        let mut source = item_rx;
        let outcome = use_case.execute(&mut source, &result_tx);

        // Unblock both threads before joining.
        drop(source);
        drop(result_tx);

        join_threads(reader_handle, writer_handle, outcome)
    }
}

impl Default for ThreadedDetectionRunner {
    fn default() -> Self {
        Self::new()
    }
}

/// Sends every decoded item, then the end marker. A read error stops the
/// thread without the marker, which the detection loop sees as a disconnect.
fn spawn_reader(
    mut reader: Box<dyn FrameReader>,
    item_tx: Sender<Message<SourceItem>>,
) -> JoinHandle<Result<(), ReadError>> {
    std::thread::spawn(move || {
        for item in reader.items() {
            if item_tx.send(Message::Item(item?)).is_err() {
                return Ok(());
            }
        }
        let _ = item_tx.send(Message::Eof);
        Ok(())
    })
}

fn spawn_writer(
    mut writer: Box<dyn DetectionWriter>,
    result_rx: Receiver<Message<DetectionResult>>,
) -> JoinHandle<Result<(), WriteError>> {
    std::thread::spawn(move || {
        for message in result_rx {
            match message {
                Message::Item(result) => writer.write(&result)?,
                Message::Eof => break,
            }
        }
        writer.close()
    })
}

/// Joins both threads. Errors from the reader and writer take precedence
/// over the detection loop's, since those are usually the root cause of a
/// disconnect or closed sink seen by the loop.
fn join_threads<E: std::error::Error + 'static>(
    reader_handle: JoinHandle<Result<(), ReadError>>,
    writer_handle: JoinHandle<Result<(), WriteError>>,
    outcome: Result<usize, E>,
) -> Result<usize, Box<dyn std::error::Error>> {
    fn set_if_none(slot: &mut Option<Box<dyn std::error::Error>>, err: Box<dyn std::error::Error>) {
        if slot.is_none() {
            *slot = Some(err);
        }
    }

    let mut first_error: Option<Box<dyn std::error::Error>> = None;

    match reader_handle.join() {
        Ok(Ok(())) => {}
        Ok(Err(e)) => set_if_none(&mut first_error, e),
        Err(_) => set_if_none(&mut first_error, "Reader thread panicked".into()),
    }

    match writer_handle.join() {
        Ok(Ok(())) => {}
        Ok(Err(e)) => set_if_none(&mut first_error, e),
        Err(_) => set_if_none(&mut first_error, "Writer thread panicked".into()),
    }

    match (first_error, outcome) {
        (Some(e), _) => Err(e),
        (None, Ok(delivered)) => Ok(delivered),
        (None, Err(e)) => Err(Box::new(e)),
    }
}
