//! Color maps for 8-bit saliency levels.

use serde::{Deserialize, Serialize};

/// Color map applied to the inverted saliency level.
///
/// Tables are blue-first, like OpenCV's; reading an inverted level through
/// them puts the most salient pixels in the warm end of the map.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Colormap {
    /// Blue-cyan-yellow-red rainbow.
    #[default]
    Jet,
    /// Black-red-yellow-white.
    Hot,
}

impl Colormap {
    /// Blue-first color of an 8-bit level.
    #[must_use]
    pub fn lookup(&self, level: u8) -> [u8; 3] {
        let x = f32::from(level) / 255.0;
        let [r, g, b] = match self {
            Self::Jet => [
                ramp(1.5 - (4.0 * x - 3.0).abs()),
                ramp(1.5 - (4.0 * x - 2.0).abs()),
                ramp(1.5 - (4.0 * x - 1.0).abs()),
            ],
            Self::Hot => [ramp(3.0 * x), ramp(3.0 * x - 1.0), ramp(3.0 * x - 2.0)],
        };
        [to_u8(b), to_u8(g), to_u8(r)]
    }
}

fn ramp(v: f32) -> f32 {
    v.clamp(0.0, 1.0)
}

fn to_u8(v: f32) -> u8 {
    (v * 255.0).round() as u8
}
