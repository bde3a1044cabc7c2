use crate::detection::domain::batch::DetectionResult;

pub type WriteError = Box<dyn std::error::Error + Send + Sync>;

/// Consumes finalized detections, one record at a time in input order.
pub trait DetectionWriter: Send {
    fn write(&mut self, result: &DetectionResult) -> Result<(), WriteError>;

    /// Flushes and releases the sink.
    fn close(&mut self) -> Result<(), WriteError>;
}
