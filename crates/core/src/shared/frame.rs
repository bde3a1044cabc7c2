use image::RgbImage;

/// A decoded source image: contiguous interleaved bytes in row-major order.
///
/// Three-channel frames are RGB. Conversion to the model's channel order
/// happens when the detection feed is compiled, never here.
#[derive(Clone, Debug, PartialEq)]
pub struct Frame {
    data: Vec<u8>,
    width: u32,
    height: u32,
    channels: u8,
}

impl Frame {
    pub fn new(data: Vec<u8>, width: u32, height: u32, channels: u8) -> Self {
        Self {
            data,
            width,
            height,
            channels,
        }
    }

    pub fn from_rgb_image(image: RgbImage) -> Self {
        let (width, height) = image.dimensions();
        Self::new(image.into_raw(), width, height, 3)
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn channels(&self) -> u8 {
        self.channels
    }

    /// True when the buffer is non-empty and its length matches the declared shape.
    pub fn is_consistent(&self) -> bool {
        self.width > 0
            && self.height > 0
            && self.channels > 0
            && self.data.len() == self.expected_len()
    }

    /// Copies the pixels into an `image` buffer. `None` unless this is a consistent RGB frame.
    pub fn to_rgb_image(&self) -> Option<RgbImage> {
        if self.channels != 3 || !self.is_consistent() {
            return None;
        }
        RgbImage::from_raw(self.width, self.height, self.data.clone())
    }

    fn expected_len(&self) -> usize {
        (self.width as usize) * (self.height as usize) * (self.channels as usize)
    }
}
