//! Tunable thresholds of the navigation state machine.
//!
//! Angles are degrees (positive = left), distances rover-frame pixels,
//! velocities m/s, timeouts seconds.

use std::time::Duration;

use rover_types::StateId;
use serde::{Deserialize, Serialize};

/// How long each state tolerates a stationary rover before `is_stuck` fires.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StuckTimeouts {
    pub follow_wall: f32,
    pub go_to_sample: f32,
    pub get_unstuck: f32,
    pub return_home: f32,
}

impl Default for StuckTimeouts {
    fn default() -> Self {
        Self {
            follow_wall: 2.0,
            go_to_sample: 4.0,
            get_unstuck: 2.3,
            return_home: 2.5,
        }
    }
}

impl StuckTimeouts {
    /// The timeout for `state`, or `None` when that state never checks for
    /// being stuck.  Negative or NaN values are treated as zero; infinite or
    /// overflowing values as [`Duration::MAX`], which never expires.
    pub fn for_state(&self, state: StateId) -> Option<Duration> {
        let secs = match state {
            StateId::FollowWall => self.follow_wall,
            StateId::GoToSample => self.go_to_sample,
            StateId::GetUnstuck => self.get_unstuck,
            StateId::ReturnHome => self.return_home,
            StateId::TurnToWall
            | StateId::AvoidWall
            | StateId::AvoidObstacles
            | StateId::Stop
            | StateId::Park => return None,
        };
        if secs.is_nan() || secs <= 0.0 {
            return Some(Duration::ZERO);
        }
        Some(Duration::try_from_secs_f32(secs).unwrap_or(Duration::MAX))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlParams {
    // ── Actuator limits ──────────────────────────────────────────────────────
    pub max_velocity: f32,
    pub min_velocity: f32,
    pub max_throttle: f32,
    pub max_brake: f32,
    pub steer_left_max: f32,
    pub steer_right_max: f32,
    /// Outside `[min_angle_right, min_angle_left]` the rover pivots in place
    /// instead of driving.
    pub min_angle_left: f32,
    pub min_angle_right: f32,

    // ── Wall following ───────────────────────────────────────────────────────
    pub cruise_throttle: f32,
    pub follow_wall_bias: f32,
    pub deviation_max_angle: f32,
    pub deviation_min_left_pixels: usize,
    pub clear_left_min_pixels: usize,
    pub obstacle_left_min_pixels: usize,
    pub obstacle_front_min_pixels: usize,
    pub pointed_min_left_pixels: usize,
    pub pointed_wall_bias: f32,

    // ── Samples ──────────────────────────────────────────────────────────────
    pub sample_max_distance: f32,
    pub sample_min_angle: f32,
    pub sample_max_angle: f32,
    pub sample_approach_velocity: f32,
    pub sample_throttle: f32,
    pub sample_bias: f32,

    // ── Stuck detection ──────────────────────────────────────────────────────
    pub stuck_velocity: f32,
    pub stuck_timeouts: StuckTimeouts,
    /// Leaving GetUnstuck once this speed is reached.
    pub recovery_velocity: f32,

    // ── Mission / homing ─────────────────────────────────────────────────────
    pub min_samples: u32,
    pub min_mapped_percent: f32,
    /// Home position in world units.
    pub home: [f32; 2],
    pub home_arrival_radius: f32,
    pub home_far_distance: f32,
    pub home_mid_distance: f32,
    pub home_slow_distance: f32,
    /// Weight of the home bearing in the blended heading.
    pub home_weight: f32,
    pub slow_throttle: f32,
    pub slow_velocity: f32,
    pub park_velocity: f32,
    pub park_throttle: f32,
    pub park_pivot_angle: f32,
}

impl Default for ControlParams {
    fn default() -> Self {
        Self {
            max_velocity: 2.0,
            min_velocity: 0.2,
            max_throttle: 1.0,
            max_brake: 10.0,
            steer_left_max: 15.0,
            steer_right_max: -15.0,
            min_angle_left: 20.0,
            min_angle_right: -20.0,

            cruise_throttle: 0.8,
            follow_wall_bias: -9.0,
            deviation_max_angle: 25.0,
            deviation_min_left_pixels: 50,
            clear_left_min_pixels: 1500,
            obstacle_left_min_pixels: 50,
            obstacle_front_min_pixels: 600,
            pointed_min_left_pixels: 500,
            pointed_wall_bias: -10.0,

            sample_max_distance: 71.0,
            sample_min_angle: -17.0,
            sample_max_angle: 90.0,
            sample_approach_velocity: 1.0,
            sample_throttle: 0.39,
            sample_bias: -3.6,

            stuck_velocity: 0.1,
            stuck_timeouts: StuckTimeouts::default(),
            recovery_velocity: 1.0,

            min_samples: 5,
            min_mapped_percent: 95.0,
            home: [99.7, 85.6],
            home_arrival_radius: 3.0,
            home_far_distance: 450.0,
            home_mid_distance: 200.0,
            home_slow_distance: 100.0,
            home_weight: 0.3,
            slow_throttle: 0.2,
            slow_velocity: 1.0,
            park_velocity: 0.5,
            park_throttle: 0.3,
            park_pivot_angle: 23.0,
        }
    }
}

impl ControlParams {
    /// Clamp `angle` into the steering range.
    pub fn clip_steer(&self, angle: f32) -> f32 {
        angle.clamp(self.steer_right_max, self.steer_left_max)
    }
}
