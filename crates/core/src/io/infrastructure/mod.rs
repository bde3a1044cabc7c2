pub mod image_file_reader;
pub mod json_lines_writer;
