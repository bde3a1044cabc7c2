use std::str::FromStr;

use crate::detection::domain::detector_config::ConfigError;
use crate::shared::constants::ROTATION_ON_STEP;

/// Ordered angles (degrees) to search. Always starts with 0.
///
/// Grammar accepted by `from_str`:
/// - `""` or `"off"`: upright only
/// - `"on"`: 0, 90, 180, 270
/// - a single integer step `n`: 0, n, 2n, ... while below 360
/// - a comma-separated list: 0 followed by the non-zero entries in order
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RotationAngles(Vec<i32>);

impl RotationAngles {
    pub fn upright() -> Self {
        Self(vec![0])
    }

    pub fn as_slice(&self) -> &[i32] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = i32> + '_ {
        self.0.iter().copied()
    }
}

impl Default for RotationAngles {
    fn default() -> Self {
        Self::upright()
    }
}

impl FromStr for RotationAngles {
    type Err = ConfigError;

    fn from_str(spec: &str) -> Result<Self, Self::Err> {
        let trimmed = spec.trim();
        let mut angles = vec![0];

        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("off") {
            log::debug!("Not setting rotation angles");
            return Ok(Self(angles));
        }

        if trimmed.eq_ignore_ascii_case("on") {
            angles.extend((ROTATION_ON_STEP..360).step_by(ROTATION_ON_STEP as usize));
        } else {
            let passed = trimmed
                .split(',')
                .map(|token| {
                    let token = token.trim();
                    token
                        .parse::<i32>()
                        .map_err(|_| ConfigError::InvalidRotation {
                            token: token.to_string(),
                            spec: spec.to_string(),
                        })
                })
                .collect::<Result<Vec<_>, _>>()?;
            let passed: Vec<i32> = passed.into_iter().filter(|&a| a != 0).collect();

            match passed.as_slice() {
                [] => {}
                // A single entry is a step size; non-positive steps add nothing.
                [step] if *step > 0 => angles.extend((*step..360).step_by(*step as usize)),
                [_] => {}
                many => angles.extend_from_slice(many),
            }
        }

        log::debug!("Rotation Angles: {angles:?}");
        Ok(Self(angles))
    }
}
