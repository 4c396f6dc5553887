//! Coordinate frames for the rover camera, the rover body and the world map.
//!
//! Three frames are involved:
//!
//! - **Image frame** – pixel `(col, row)` of the top-down warped camera view,
//!   origin top-left, rows increasing downward.
//! - **Rover frame** – cartesian, centred on the rover at the bottom-centre of
//!   the warped image; `x` points forward (image up), `y` points left.
//!   Units are warped-image pixels.
//! - **World frame** – the fixed grid of the occupancy map.  One world unit
//!   spans `scale` rover-frame pixels.
//!
//! All angles are in **degrees**; every downstream threshold is expressed in
//! degrees too.
//!
//! # Example
//!
//! ```rust
//! use rover_perception::geometry::{rover_to_world_point, world_to_rover_frame, RoverPoint};
//! use rover_types::Pose;
//!
//! let pose = Pose::new(100.0, 50.0, 90.0);
//! // 10 px straight ahead of a rover facing +y lands one world unit north.
//! let w = rover_to_world_point(RoverPoint::new(10.0, 0.0), &pose, 10.0);
//! assert!((w.x - 100.0).abs() < 1e-4);
//! assert!((w.y - 51.0).abs() < 1e-4);
//!
//! let back = world_to_rover_frame(w, &pose, 10.0);
//! assert!((back.x - 10.0).abs() < 1e-3);
//! ```

use nalgebra::{Point2, Rotation2, Vector2};
use rover_types::Pose;

use crate::mask::BinaryMask;

/// A point in the rover frame (pixels, x forward, y left).
pub type RoverPoint = Point2<f32>;

/// A point in the world frame (map units).
pub type WorldPoint = Point2<f32>;

// ────────────────────────────────────────────────────────────────────────────
// Image ↔ rover frame
// ────────────────────────────────────────────────────────────────────────────

/// Convert every set pixel of `mask` to a rover-frame offset.
///
/// The rover sits at the bottom-centre of the image: a pixel at `(col, row)`
/// becomes `x = height − row`, `y = width/2 − col`, so pixels left of the
/// centre column have positive `y`.
pub fn image_to_rover_frame(mask: &BinaryMask) -> Vec<RoverPoint> {
    let height = mask.height() as f32;
    let half_width = mask.width() as f32 / 2.0;
    mask.iter_set()
        .map(|(col, row)| RoverPoint::new(height - row as f32, half_width - col as f32))
        .collect()
}

// ────────────────────────────────────────────────────────────────────────────
// Cartesian ↔ polar
// ────────────────────────────────────────────────────────────────────────────

/// `(x, y)` → `(distance, angle_deg)` with `angle = atan2(y, x)`.
pub fn cartesian_to_polar(x: f32, y: f32) -> (f32, f32) {
    (x.hypot(y), y.atan2(x).to_degrees())
}

/// Inverse of [`cartesian_to_polar`].
pub fn polar_to_cartesian(distance: f32, angle_deg: f32) -> (f32, f32) {
    let (sin, cos) = angle_deg.to_radians().sin_cos();
    (distance * cos, distance * sin)
}

// ────────────────────────────────────────────────────────────────────────────
// Rover ↔ world frame
// ────────────────────────────────────────────────────────────────────────────

fn yaw_rotation(yaw_deg: f32) -> Rotation2<f32> {
    Rotation2::new(yaw_deg.to_radians())
}

/// Rotate `p` by the pose yaw, shrink by `scale` and translate by the pose
/// position.  The result is not clipped to the map.
pub fn rover_to_world_point(p: RoverPoint, pose: &Pose, scale: f32) -> WorldPoint {
    let rotated = yaw_rotation(pose.yaw) * p.coords;
    WorldPoint::new(rotated.x / scale + pose.x, rotated.y / scale + pose.y)
}

/// Exact inverse of [`rover_to_world_point`].
///
/// Used to express a fixed world reference (the home beacon) in the rover
/// frame.
pub fn world_to_rover_frame(p: WorldPoint, pose: &Pose, scale: f32) -> RoverPoint {
    let offset = Vector2::new((p.x - pose.x) * scale, (p.y - pose.y) * scale);
    RoverPoint::from(yaw_rotation(pose.yaw).inverse() * offset)
}

/// Map rover-frame points onto world cells `(x, y)`.
///
/// World coordinates are truncated toward zero and clipped to
/// `[0, world_size − 1]`, so every returned index is valid for a map of
/// `world_size × world_size` cells.
pub fn rover_to_world_cells(
    points: &[RoverPoint],
    pose: &Pose,
    scale: f32,
    world_size: usize,
) -> Vec<(usize, usize)> {
    points
        .iter()
        .map(|&p| {
            let w = rover_to_world_point(p, pose, scale);
            (clip_cell(w.x, world_size), clip_cell(w.y, world_size))
        })
        .collect()
}

fn clip_cell(v: f32, world_size: usize) -> usize {
    let max = world_size.saturating_sub(1) as i64;
    // `as` saturates and maps NaN to 0.
    (v.trunc() as i64).clamp(0, max) as usize
}

// ────────────────────────────────────────────────────────────────────────────
// PolarSet
// ────────────────────────────────────────────────────────────────────────────

/// Classified pixels of one class in rover-centric polar form.
///
/// `distances[i]` and `angles[i]` describe the same pixel.  Means are only
/// defined for non-empty sets, so they are returned as `Option`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PolarSet {
    pub distances: Vec<f32>,
    pub angles: Vec<f32>,
}

impl PolarSet {
    pub fn from_points(points: &[RoverPoint]) -> Self {
        points.iter().map(|p| cartesian_to_polar(p.x, p.y)).collect()
    }

    pub fn len(&self) -> usize {
        self.angles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.angles.is_empty()
    }

    /// Mean angle in degrees, `None` for an empty set.
    pub fn mean_angle(&self) -> Option<f32> {
        mean(&self.angles)
    }

    /// Mean distance in rover pixels, `None` for an empty set.
    pub fn mean_distance(&self) -> Option<f32> {
        mean(&self.distances)
    }

    /// Angles strictly left of straight ahead.
    pub fn left_angles(&self) -> Vec<f32> {
        self.angles.iter().copied().filter(|&a| a > 0.0).collect()
    }

    /// Number of pixels strictly right of straight ahead.
    pub fn right_count(&self) -> usize {
        self.angles.iter().filter(|&&a| a < 0.0).count()
    }
}

impl FromIterator<(f32, f32)> for PolarSet {
    /// Collect `(distance, angle_deg)` pairs.
    fn from_iter<I: IntoIterator<Item = (f32, f32)>>(iter: I) -> Self {
        let (distances, angles): (Vec<f32>, Vec<f32>) = iter.into_iter().unzip();
        Self { distances, angles }
    }
}

/// Arithmetic mean; `None` for an empty slice.
pub fn mean(values: &[f32]) -> Option<f32> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f32>() / values.len() as f32)
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
