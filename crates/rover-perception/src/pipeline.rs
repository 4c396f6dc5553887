//! Per-cycle perception: camera frame + pose in, classified polar pixel sets
//! out, occupancy map updated when the rover is level.
//!
//! # Example
//!
//! ```rust
//! use rover_perception::pipeline::{Perception, PerceptionConfig};
//! use rover_types::{CameraFrame, Pose};
//!
//! let mut perception = Perception::new(PerceptionConfig::default()).unwrap();
//! let mut map = perception.new_map();
//!
//! let frame = CameraFrame::filled(320, 160, [200, 200, 200]);
//! let out = perception.process(&frame, &Pose::new(100.0, 100.0, 0.0), &mut map).unwrap();
//!
//! assert!(out.stable);
//! assert!(!out.navigable.is_empty());
//! assert!(out.rock.is_empty());
//! ```

use nalgebra::Point2;
use rover_types::{CameraFrame, Pose, RoverError};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::classify::{ColorBand, classify};
use crate::geometry::{PolarSet, RoverPoint, cartesian_to_polar, image_to_rover_frame, mean, rover_to_world_cells};
use crate::occupancy::{AccumulationPolicy, Channel, OccupancyMap};
use crate::warp::{PerspectiveWarp, Quad};

// ────────────────────────────────────────────────────────────────────────────
// Configuration
// ────────────────────────────────────────────────────────────────────────────

/// Every tunable of the perception pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PerceptionConfig {
    pub frame_width: u32,
    pub frame_height: u32,
    /// Ground-plane trapezoid in the camera image, `[col, row]`, ordered
    /// bottom-left, bottom-right, top-right, top-left.
    pub source_quad: [[f64; 2]; 4],
    /// Half the side of the destination square, in warped pixels.
    pub dst_size: f64,
    /// Gap between the destination square and the bottom of the image.
    pub bottom_offset: f64,
    pub navigable_threshold: [u8; 3],
    pub rock_band: ColorBand,
    /// Points farther than this (rover pixels) are not written to the map.
    pub navigable_max_distance: f32,
    pub obstacle_max_distance: f32,
    pub rock_max_distance: f32,
    pub world_size: usize,
    /// Rover pixels per world cell.
    pub world_scale: f32,
    pub pitch_tolerance_deg: f32,
    pub roll_tolerance_deg: f32,
    pub accumulation: AccumulationPolicy,
}

impl Default for PerceptionConfig {
    fn default() -> Self {
        Self {
            frame_width: 320,
            frame_height: 160,
            source_quad: [[14.0, 140.0], [300.0, 140.0], [200.0, 96.0], [118.0, 96.0]],
            dst_size: 5.0,
            bottom_offset: 6.0,
            navigable_threshold: [160, 160, 160],
            rock_band: ColorBand::default(),
            navigable_max_distance: 60.0,
            obstacle_max_distance: 80.0,
            rock_max_distance: 70.0,
            world_size: 200,
            world_scale: 10.0,
            pitch_tolerance_deg: 0.5,
            roll_tolerance_deg: 0.75,
            accumulation: AccumulationPolicy::Count,
        }
    }
}

impl PerceptionConfig {
    pub fn source(&self) -> Quad {
        self.source_quad.map(|[x, y]| Point2::new(x, y))
    }

    /// The square the source trapezoid is warped onto, centred horizontally
    /// and `bottom_offset` pixels above the bottom edge.
    pub fn destination(&self) -> Quad {
        let cx = self.frame_width as f64 / 2.0;
        let bottom = self.frame_height as f64 - self.bottom_offset;
        let top = bottom - 2.0 * self.dst_size;
        [
            Point2::new(cx - self.dst_size, bottom),
            Point2::new(cx + self.dst_size, bottom),
            Point2::new(cx + self.dst_size, top),
            Point2::new(cx - self.dst_size, top),
        ]
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Stability gate
// ────────────────────────────────────────────────────────────────────────────

/// Decides whether the rover is level enough for its top-down view to be
/// trusted for mapping.
#[derive(Debug, Clone)]
pub struct StabilityGate {
    pitch_tolerance_deg: f32,
    roll_tolerance_deg: f32,
    last: Option<bool>,
}

impl StabilityGate {
    pub fn new(pitch_tolerance_deg: f32, roll_tolerance_deg: f32) -> Self {
        Self {
            pitch_tolerance_deg,
            roll_tolerance_deg,
            last: None,
        }
    }

    /// `true` when both pitch and roll are within tolerance of level.
    ///
    /// Angles wrap at 360°, so 359.8° counts as 0.2° below level.
    pub fn is_stable(&self, pose: &Pose) -> bool {
        is_level(pose.pitch, self.pitch_tolerance_deg) && is_level(pose.roll, self.roll_tolerance_deg)
    }

    /// Same as [`is_stable`][Self::is_stable], logging when the answer
    /// changes from the previous frame.
    pub fn observe(&mut self, pose: &Pose) -> bool {
        let stable = self.is_stable(pose);
        if self.last != Some(stable) {
            info!(
                stable,
                pitch = pose.pitch,
                roll = pose.roll,
                "map writes {}",
                if stable { "enabled" } else { "suspended" }
            );
            self.last = Some(stable);
        }
        stable
    }
}

fn is_level(angle_deg: f32, tolerance_deg: f32) -> bool {
    let a = angle_deg.rem_euclid(360.0);
    a < tolerance_deg || a > 360.0 - tolerance_deg
}

// ────────────────────────────────────────────────────────────────────────────
// Output
// ────────────────────────────────────────────────────────────────────────────

/// Classified pixels of one cycle in rover-centric polar form.
///
/// `navigable` and `obstacle` hold every visible pixel; `rock` only those
/// within the rock distance cutoff.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PerceptionOutput {
    pub navigable: PolarSet,
    pub obstacle: PolarSet,
    pub rock: PolarSet,
    /// Mean distance of every rock pixel, before the distance cutoff.
    pub rock_distance: Option<f32>,
    /// Navigable angles strictly left of straight ahead.
    pub navigable_left: Vec<f32>,
    /// The frame passed the stability gate.
    pub stable: bool,
    /// The occupancy map was written this cycle.
    pub map_updated: bool,
}

impl PerceptionOutput {
    pub fn mean_left_angle(&self) -> Option<f32> {
        mean(&self.navigable_left)
    }

    pub fn left_count(&self) -> usize {
        self.navigable_left.len()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Pipeline
// ────────────────────────────────────────────────────────────────────────────

/// The perception pipeline.  The homography is solved once, in [`new`][Self::new].
#[derive(Debug, Clone)]
pub struct Perception {
    config: PerceptionConfig,
    warp: PerspectiveWarp,
    gate: StabilityGate,
}

impl Perception {
    /// # Errors
    ///
    /// [`RoverError::Calibration`] when the configured quad is degenerate.
    pub fn new(config: PerceptionConfig) -> Result<Self, RoverError> {
        let warp = PerspectiveWarp::new(&config.source(), &config.destination())?;
        let gate = StabilityGate::new(config.pitch_tolerance_deg, config.roll_tolerance_deg);
        Ok(Self { config, warp, gate })
    }

    pub fn config(&self) -> &PerceptionConfig {
        &self.config
    }

    /// An empty map sized and configured for this pipeline.
    pub fn new_map(&self) -> OccupancyMap {
        OccupancyMap::new(self.config.world_size, self.config.accumulation)
    }

    /// Run one cycle.
    ///
    /// # Errors
    ///
    /// [`RoverError::FrameSize`] when `frame` does not have the configured
    /// dimensions.
    pub fn process(
        &mut self,
        frame: &CameraFrame,
        pose: &Pose,
        map: &mut OccupancyMap,
    ) -> Result<PerceptionOutput, RoverError> {
        let cfg = &self.config;
        if frame.width != cfg.frame_width || frame.height != cfg.frame_height {
            return Err(RoverError::FrameSize {
                expected: cfg.frame_width as usize * cfg.frame_height as usize * 3,
                actual: frame.data.len(),
            });
        }

        let (warped, valid) = self.warp.apply(frame);
        let classes = classify(&warped, &valid, cfg.navigable_threshold, &cfg.rock_band);

        let nav_points = image_to_rover_frame(&classes.navigable);
        let obs_points = image_to_rover_frame(&classes.obstacle);
        let all_rock_points = image_to_rover_frame(&classes.rock);
        let rock_distance = PolarSet::from_points(&all_rock_points).mean_distance();
        let rock_points = within(all_rock_points, cfg.rock_max_distance);

        let navigable = PolarSet::from_points(&nav_points);
        let obstacle = PolarSet::from_points(&obs_points);
        let rock = PolarSet::from_points(&rock_points);
        let navigable_left = navigable.left_angles();

        let stable = self.gate.observe(pose);
        if stable {
            let cfg = &self.config;
            let to_cells = |points: &[RoverPoint]| rover_to_world_cells(points, pose, cfg.world_scale, cfg.world_size);

            let nav_near = within(nav_points, cfg.navigable_max_distance);
            let obs_near = within(obs_points, cfg.obstacle_max_distance);
            map.mark(Channel::Navigable, &to_cells(&nav_near));
            map.mark(Channel::Obstacle, &to_cells(&obs_near));
            if !rock_points.is_empty() {
                map.mark(Channel::Rock, &to_cells(&rock_points));
            }
        }

        debug!(
            navigable = navigable.len(),
            obstacle = obstacle.len(),
            rock = rock.len(),
            left = navigable_left.len(),
            stable,
            "perception cycle"
        );

        Ok(PerceptionOutput {
            navigable,
            obstacle,
            rock,
            rock_distance,
            navigable_left,
            stable,
            map_updated: stable,
        })
    }
}

/// Keep the points strictly closer than `max_distance` to the rover.
fn within(points: Vec<RoverPoint>, max_distance: f32) -> Vec<RoverPoint> {
    points
        .into_iter()
        .filter(|p| cartesian_to_polar(p.x, p.y).0 < max_distance)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAND: [u8; 3] = [200, 200, 200];
    const GOLD: [u8; 3] = [180, 150, 20];

    fn level_pose() -> Pose {
        Pose::new(100.0, 100.0, 0.0)
    }

    fn setup() -> (Perception, OccupancyMap) {
        let perception = Perception::new(PerceptionConfig::default()).unwrap();
        let map = perception.new_map();
        (perception, map)
    }

    #[test]
    fn default_destination_square() {
        let dst = PerceptionConfig::default().destination();
        assert_eq!(dst[0], Point2::new(155.0, 154.0));
        assert_eq!(dst[2], Point2::new(165.0, 144.0));
    }

    #[test]
    fn level_detection_wraps_at_360() {
        let gate = StabilityGate::new(0.5, 0.75);
        let mut pose = level_pose();
        for (pitch, roll, expected) in [
            (0.0, 0.0, true),
            (359.8, 0.0, true),
            (0.0, 359.3, true),
            (0.49, 0.74, true),
            (0.5, 0.0, false),
            (0.0, 0.75, false),
            (359.5, 0.0, false),
            (-0.2, 0.0, true),
            (180.0, 0.0, false),
        ] {
            pose.pitch = pitch;
            pose.roll = roll;
            assert_eq!(gate.is_stable(&pose), expected, "pitch {pitch} roll {roll}");
        }
    }

    #[test]
    fn bright_frame_is_navigable_ahead() {
        let (mut perception, mut map) = setup();
        let frame = CameraFrame::filled(320, 160, SAND);
        let out = perception.process(&frame, &level_pose(), &mut map).unwrap();

        assert!(out.stable && out.map_updated);
        assert!(out.obstacle.is_empty());
        assert!(out.rock.is_empty());
        let mean = out.navigable.mean_angle().unwrap();
        assert!(mean.abs() < 1.0, "symmetric view should centre on 0°, got {mean}");
        assert!(out.left_count() > 0);
        assert!(out.mean_left_angle().unwrap() > 0.0);
        assert!(map.channel(Channel::Navigable).iter().any(|&v| v > 0));
    }

    #[test]
    fn stable_frame_without_rock_leaves_rock_channel_unchanged() {
        let (mut perception, mut map) = setup();
        let before = map.channel(Channel::Rock).to_vec();
        let frame = CameraFrame::filled(320, 160, SAND);
        perception.process(&frame, &level_pose(), &mut map).unwrap();
        assert_eq!(map.channel(Channel::Rock), before.as_slice());
    }

    #[test]
    fn unstable_frame_leaves_map_unchanged() {
        let (mut perception, mut map) = setup();
        let frame = CameraFrame::filled(320, 160, GOLD);
        // Seed the map so "unchanged" is not trivially all zeros.
        perception.process(&frame, &level_pose(), &mut map).unwrap();
        let before = map.clone();

        let mut pose = level_pose();
        pose.roll = 3.0;
        let out = perception.process(&frame, &pose, &mut map).unwrap();

        assert!(!out.stable && !out.map_updated);
        assert!(!out.rock.is_empty(), "output is still produced");
        assert_eq!(map, before);
    }

    #[test]
    fn gold_frame_writes_rock_channel() {
        let (mut perception, mut map) = setup();
        let frame = CameraFrame::filled(320, 160, GOLD);
        let out = perception.process(&frame, &level_pose(), &mut map).unwrap();

        assert!(out.navigable.is_empty());
        assert!(!out.rock.is_empty());
        assert!(out.rock.distances.iter().all(|&d| d < 70.0));
        assert!(map.channel(Channel::Rock).iter().any(|&v| v > 0));
    }

    #[test]
    fn rock_distance_covers_pixels_beyond_the_cutoff() {
        let (mut perception, mut map) = setup();
        let frame = CameraFrame::filled(320, 160, GOLD);
        let out = perception.process(&frame, &level_pose(), &mut map).unwrap();

        let clipped = out.rock.mean_distance().unwrap();
        let full = out.rock_distance.unwrap();
        assert!(clipped < 70.0);
        // A gold field filling the view averages well beyond the 71 px
        // sample range.
        assert!(full > 100.0, "unfiltered mean {full}");
    }

    #[test]
    fn no_rock_means_no_rock_distance() {
        let (mut perception, mut map) = setup();
        let frame = CameraFrame::filled(320, 160, SAND);
        let out = perception.process(&frame, &level_pose(), &mut map).unwrap();
        assert!(out.rock_distance.is_none());
    }

    #[test]
    fn slightly_wrapped_pitch_still_maps() {
        let (mut perception, mut map) = setup();
        let mut pose = level_pose();
        pose.pitch = 359.8;
        let frame = CameraFrame::filled(320, 160, SAND);
        let out = perception.process(&frame, &pose, &mut map).unwrap();
        assert!(out.map_updated);
    }

    #[test]
    fn wrong_frame_size_is_rejected() {
        let (mut perception, mut map) = setup();
        let frame = CameraFrame::filled(64, 32, SAND);
        let err = perception.process(&frame, &level_pose(), &mut map).unwrap_err();
        assert!(matches!(err, RoverError::FrameSize { .. }));
    }

    #[test]
    fn mapped_cells_lie_ahead_of_the_rover() {
        let (mut perception, mut map) = setup();
        let frame = CameraFrame::filled(320, 160, SAND);
        perception.process(&frame, &level_pose(), &mut map).unwrap();
        // Facing +x from (100, 100): nothing is mapped behind x = 100.
        for y in 0..200 {
            for x in 0..100 {
                assert_eq!(map.get(Channel::Navigable, x, y), 0, "cell ({x},{y})");
            }
        }
    }
}
