//! Colour thresholding of the warped top-down view.
//!
//! Every pixel inside the warp's validity mask lands in exactly one of three
//! classes:
//!
//! - **navigable** – bright sand, every channel strictly above a threshold;
//! - **rock** – yellow/gold sample, every channel strictly inside a band;
//! - **obstacle** – everything else that the camera could actually see.
//!
//! Pixels outside the validity mask belong to no class.

use rover_types::CameraFrame;
use serde::{Deserialize, Serialize};

use crate::mask::BinaryMask;

/// An exclusive RGB range: `low[c] < p[c] < high[c]` for every channel `c`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColorBand {
    pub low: [u8; 3],
    pub high: [u8; 3],
}

impl ColorBand {
    pub fn contains(&self, rgb: [u8; 3]) -> bool {
        (0..3).all(|c| rgb[c] > self.low[c] && rgb[c] < self.high[c])
    }
}

impl Default for ColorBand {
    fn default() -> Self {
        Self {
            low: [130, 105, 0],
            high: [220, 190, 70],
        }
    }
}

/// Per-class pixel masks for one frame.  The three masks are disjoint.
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub navigable: BinaryMask,
    pub obstacle: BinaryMask,
    pub rock: BinaryMask,
}

/// `true` when every channel of `rgb` is strictly above `threshold`.
pub fn is_navigable(rgb: [u8; 3], threshold: [u8; 3]) -> bool {
    (0..3).all(|c| rgb[c] > threshold[c])
}

/// Split the valid pixels of `warped` into navigable, rock and obstacle.
///
/// A pixel that passes both the navigable threshold and the rock band is
/// classified as navigable.
pub fn classify(
    warped: &CameraFrame,
    valid: &BinaryMask,
    navigable_threshold: [u8; 3],
    rock_band: &ColorBand,
) -> Classification {
    let (width, height) = (warped.width, warped.height);
    let mut navigable = BinaryMask::new(width, height);
    let mut obstacle = BinaryMask::new(width, height);
    let mut rock = BinaryMask::new(width, height);

    for row in 0..height {
        for col in 0..width {
            if !valid.get(col, row) {
                continue;
            }
            let rgb = warped.pixel(col, row);
            if is_navigable(rgb, navigable_threshold) {
                navigable.set(col, row, true);
            } else if rock_band.contains(rgb) {
                rock.set(col, row, true);
            } else {
                obstacle.set(col, row, true);
            }
        }
    }

    Classification {
        navigable,
        obstacle,
        rock,
    }
}
