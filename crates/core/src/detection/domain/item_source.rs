use thiserror::Error;

use crate::detection::domain::batch::SourceItem;
use crate::shared::message::Message;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    #[error("item source disconnected before end of stream")]
    Disconnected,
}

/// Blocking supplier of source items, terminated by `Message::Eof`.
pub trait ItemSource {
    fn next_message(&mut self) -> Result<Message<SourceItem>, SourceError>;
}

impl ItemSource for crossbeam_channel::Receiver<Message<SourceItem>> {
    fn next_message(&mut self) -> Result<Message<SourceItem>, SourceError> {
        self.recv().map_err(|_| SourceError::Disconnected)
    }
}
