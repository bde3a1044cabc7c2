use crate::detection::domain::batch::SourceItem;

pub type ReadError = Box<dyn std::error::Error + Send + Sync>;

/// Supplies source items in a stable order.
///
/// Implementations own the decoding details; the pipeline only sees
/// `SourceItem`s. Runs on its own thread, hence `Send`.
pub trait FrameReader: Send {
    /// Number of items the reader will yield.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns an iterator over items in read order.
    fn items(&mut self) -> Box<dyn Iterator<Item = Result<SourceItem, ReadError>> + '_>;
}
