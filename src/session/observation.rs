//! Orientation observations reported by the rig's IMU.

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};

/// Yaw, pitch and roll in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Observation {
    /// Yaw in degrees
    pub yaw: f32,
    /// Pitch in degrees
    pub pitch: f32,
    /// Roll in degrees
    pub roll: f32,
}

impl Observation {
    /// Observation substituted whenever the sensor data is missing or malformed.
    pub const ZERO: Observation = Observation {
        yaw: 0.0,
        pitch: 0.0,
        roll: 0.0,
    };

    /// Create an observation from its three angles.
    pub fn new(yaw: f32, pitch: f32, roll: f32) -> Self {
        Self { yaw, pitch, roll }
    }

    /// Build an observation from sensor readings; `None` unless there are exactly three.
    pub fn from_readings(readings: &[f64]) -> Option<Self> {
        match readings {
            [yaw, pitch, roll] => Some(Self::new(*yaw as f32, *pitch as f32, *roll as f32)),
            _ => None,
        }
    }

    /// `[yaw, pitch, roll]`
    pub fn to_array(self) -> [f32; 3] {
        [self.yaw, self.pitch, self.roll]
    }
}

/// Parse a sensor data line into numbers.
///
/// Fields may be separated by commas, whitespace or both (`"1.5,-2,3"`,
/// `"1.5 -2 3"`, `"1.5, -2, 3"`).
pub fn parse_readings(line: &str) -> Result<Vec<f64>> {
    let fields: Vec<&str> = line
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|field| !field.is_empty())
        .collect();
    if fields.is_empty() {
        return Err(anyhow!("Empty sensor line"));
    }
    fields
        .iter()
        .map(|field| {
            field
                .parse::<f64>()
                .with_context(|| format!("Failed to parse sensor field '{}' in '{}'", field, line))
        })
        .collect()
}
