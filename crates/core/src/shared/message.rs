/// A queue message: a payload or the end-of-stream marker.
#[derive(Clone, Debug, PartialEq)]
pub enum Message<T> {
    Item(T),
    Eof,
}

impl<T> Message<T> {
    pub fn is_eof(&self) -> bool {
        matches!(self, Message::Eof)
    }
}
