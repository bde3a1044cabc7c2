use std::str::FromStr;

use thiserror::Error;

use crate::detection::domain::rotation_angles::RotationAngles;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid rotation angle '{token}' in '{spec}': expected an integer")]
    InvalidRotation { token: String, spec: String },
    #[error("invalid color order '{0}': expected 'rgb' or 'bgr'")]
    InvalidColorOrder(String),
    #[error("input size must be greater than zero")]
    ZeroInputSize,
    #[error("batch size must be greater than zero")]
    ZeroBatchSize,
}

/// Channel order expected by the model input.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ColorOrder {
    #[default]
    Rgb,
    Bgr,
}

impl FromStr for ColorOrder {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "rgb" => Ok(ColorOrder::Rgb),
            "bgr" => Ok(ColorOrder::Bgr),
            _ => Err(ConfigError::InvalidColorOrder(s.to_string())),
        }
    }
}

/// Validated detector settings, fixed for the lifetime of a run.
#[derive(Clone, Debug, PartialEq)]
pub struct DetectorConfig {
    input_size: u32,
    batchsize: usize,
    rotation: RotationAngles,
    min_size: u32,
    color_order: ColorOrder,
}

impl DetectorConfig {
    /// Parses `rotation` and checks sizes; errors here are startup errors.
    pub fn new(
        input_size: u32,
        batchsize: usize,
        rotation: &str,
        min_size: u32,
    ) -> Result<Self, ConfigError> {
        if input_size == 0 {
            return Err(ConfigError::ZeroInputSize);
        }
        if batchsize == 0 {
            return Err(ConfigError::ZeroBatchSize);
        }
        let rotation: RotationAngles = rotation.parse()?;
        log::debug!(
            "Detector config: (input_size: {input_size}, batchsize: {batchsize}, \
             rotation: {:?}, min_size: {min_size})",
            rotation.as_slice()
        );
        Ok(Self {
            input_size,
            batchsize,
            rotation,
            min_size,
            color_order: ColorOrder::default(),
        })
    }

    pub fn with_color_order(mut self, color_order: ColorOrder) -> Self {
        self.color_order = color_order;
        self
    }

    pub fn input_size(&self) -> u32 {
        self.input_size
    }

    pub fn batchsize(&self) -> usize {
        self.batchsize
    }

    pub fn rotation(&self) -> &RotationAngles {
        &self.rotation
    }

    /// Minimum face diagonal in frame pixels; 0 disables the filter.
    pub fn min_size(&self) -> u32 {
        self.min_size
    }

    pub fn color_order(&self) -> ColorOrder {
        self.color_order
    }
}
