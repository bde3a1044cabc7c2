use std::path::{Path, PathBuf};

use crate::detection::domain::batch::SourceItem;
use crate::io::domain::frame_reader::{FrameReader, ReadError};
use crate::shared::constants::IMAGE_EXTENSIONS;
use crate::shared::frame::Frame;

/// Decodes image files into RGB source items using the `image` crate.
///
/// Directory inputs are expanded to the image files directly inside them,
/// sorted by name. Explicit file inputs are kept in the order given.
pub struct ImageFileReader {
    paths: Vec<PathBuf>,
}

impl ImageFileReader {
    pub fn new(inputs: &[PathBuf]) -> Result<Self, ReadError> {
        let paths = collect_inputs(inputs)?;
        log::debug!("Collected {} input image(s)", paths.len());
        Ok(Self { paths })
    }
}

/// Expands directories to their image files; plain files pass through.
pub fn collect_inputs(inputs: &[PathBuf]) -> Result<Vec<PathBuf>, ReadError> {
    let mut paths = Vec::new();
    for input in inputs {
        if input.is_dir() {
            let mut entries: Vec<PathBuf> = std::fs::read_dir(input)?
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .filter(|path| path.is_file() && has_image_extension(path))
                .collect();
            entries.sort();
            paths.extend(entries);
        } else if input.is_file() {
            paths.push(input.clone());
        } else {
            return Err(format!("input not found: {}", input.display()).into());
        }
    }
    Ok(paths)
}

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

fn read_item(path: &Path) -> Result<SourceItem, ReadError> {
    let image = image::open(path)
        .map_err(|e| format!("failed to decode {}: {e}", path.display()))?
        .to_rgb8();
    let filename = path.to_string_lossy().into_owned();
    log::trace!(
        "Loaded image: (filename: {filename}, size: {}x{})",
        image.width(),
        image.height()
    );
    Ok(SourceItem::new(filename, Frame::from_rgb_image(image)))
}

impl FrameReader for ImageFileReader {
    fn len(&self) -> usize {
        self.paths.len()
    }

    fn items(&mut self) -> Box<dyn Iterator<Item = Result<SourceItem, ReadError>> + '_> {
        Box::new(self.paths.iter().map(|path| read_item(path)))
    }
}
