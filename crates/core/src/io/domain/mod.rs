pub mod detection_writer;
pub mod frame_reader;
