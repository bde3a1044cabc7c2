use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use serde::Serialize;

use crate::detection::domain::batch::DetectionResult;
use crate::io::domain::detection_writer::{DetectionWriter, WriteError};
use crate::shared::detected_face::DetectedFace;

#[derive(Serialize)]
struct Record<'a> {
    filename: &'a str,
    width: u32,
    height: u32,
    faces: &'a [DetectedFace],
}

/// Writes one JSON object per detection result, newline separated.
pub struct JsonLinesWriter<W: Write + Send> {
    out: BufWriter<W>,
}

impl<W: Write + Send> JsonLinesWriter<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: BufWriter::new(out),
        }
    }
}

impl JsonLinesWriter<File> {
    /// Creates (or truncates) the output file, making parent directories as needed.
    pub fn create(path: &Path) -> Result<Self, WriteError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(Self::new(File::create(path)?))
    }
}

impl<W: Write + Send> DetectionWriter for JsonLinesWriter<W> {
    fn write(&mut self, result: &DetectionResult) -> Result<(), WriteError> {
        let record = Record {
            filename: &result.filename,
            width: result.image.width(),
            height: result.image.height(),
            faces: &result.detected_faces,
        };
        serde_json::to_writer(&mut self.out, &record)?;
        self.out.write_all(b"\n")?;
        Ok(())
    }

    fn close(&mut self) -> Result<(), WriteError> {
        self.out.flush()?;
        Ok(())
    }
}
