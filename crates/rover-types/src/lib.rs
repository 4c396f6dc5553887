use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Vehicle pose as reported by the simulator once per cycle.
///
/// Angles are in degrees, position in world units.  Missing fields read as
/// zero.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Pose {
    pub x: f32,
    pub y: f32,
    pub yaw: f32,
    pub pitch: f32,
    pub roll: f32,
    /// Forward speed (m/s).
    pub velocity: f32,
}

impl Pose {
    pub fn new(x: f32, y: f32, yaw: f32) -> Self {
        Self {
            x,
            y,
            yaw,
            ..Self::default()
        }
    }
}

/// Per-cycle telemetry snapshot, minus the camera image.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Telemetry {
    pub pose: Pose,
    /// The simulator reports the rover is close enough to pick a sample up.
    #[serde(default)]
    pub near_sample: bool,
    /// A pickup is currently being executed by the simulator.
    #[serde(default)]
    pub picking_up: bool,
    #[serde(default)]
    pub samples_collected: u32,
    #[serde(default)]
    pub samples_to_find: u32,
    /// Percentage of the ground-truth map matched so far.
    #[serde(default)]
    pub percent_mapped: f32,
}

/// A raw RGB24 camera frame.
#[derive(Debug, Clone, PartialEq)]
pub struct CameraFrame {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Packed RGB24 pixel data, row-major.
    pub data: Vec<u8>,
}

impl CameraFrame {
    /// Wrap an RGB24 buffer, checking that its length matches the dimensions.
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Result<Self, RoverError> {
        let expected = width as usize * height as usize * 3;
        if data.len() != expected {
            return Err(RoverError::FrameSize {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// A frame where every pixel has the same colour.
    pub fn filled(width: u32, height: u32, rgb: [u8; 3]) -> Self {
        let data = rgb
            .iter()
            .copied()
            .cycle()
            .take(width as usize * height as usize * 3)
            .collect();
        Self {
            width,
            height,
            data,
        }
    }

    /// RGB value at (`col`, `row`).  Panics when out of bounds.
    pub fn pixel(&self, col: u32, row: u32) -> [u8; 3] {
        let i = self.offset(col, row);
        [self.data[i], self.data[i + 1], self.data[i + 2]]
    }

    pub fn set_pixel(&mut self, col: u32, row: u32, rgb: [u8; 3]) {
        let i = self.offset(col, row);
        self.data[i..i + 3].copy_from_slice(&rgb);
    }

    fn offset(&self, col: u32, row: u32) -> usize {
        (row as usize * self.width as usize + col as usize) * 3
    }
}

/// The nine behaviours of the navigation state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StateId {
    FollowWall,
    TurnToWall,
    AvoidWall,
    AvoidObstacles,
    GoToSample,
    Stop,
    GetUnstuck,
    ReturnHome,
    Park,
}

impl StateId {
    pub const ALL: [StateId; 9] = [
        StateId::FollowWall,
        StateId::TurnToWall,
        StateId::AvoidWall,
        StateId::AvoidObstacles,
        StateId::GoToSample,
        StateId::Stop,
        StateId::GetUnstuck,
        StateId::ReturnHome,
        StateId::Park,
    ];

    pub fn name(self) -> &'static str {
        match self {
            StateId::FollowWall => "follow_wall",
            StateId::TurnToWall => "turn_to_wall",
            StateId::AvoidWall => "avoid_wall",
            StateId::AvoidObstacles => "avoid_obstacles",
            StateId::GoToSample => "go_to_sample",
            StateId::Stop => "stop",
            StateId::GetUnstuck => "get_unstuck",
            StateId::ReturnHome => "return_home",
            StateId::Park => "park",
        }
    }
}

impl std::fmt::Display for StateId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// What leaves the core each cycle.  The simulator accepts exactly one of
/// these per telemetry message.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", content = "payload")]
pub enum RoverCommand {
    /// Throttle / brake / steering-angle (degrees) command.
    Drive { throttle: f32, brake: f32, steer: f32 },
    /// Ask the simulator to pick up the nearby sample.
    Pickup,
}

impl RoverCommand {
    /// Zero throttle, zero brake, zero steer.
    pub fn neutral() -> Self {
        RoverCommand::Drive {
            throttle: 0.0,
            brake: 0.0,
            steer: 0.0,
        }
    }
}

/// Record of a single state-machine transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionEvent {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub from: StateId,
    pub to: StateId,
    /// Name of the predicate that fired, e.g. `"obstacle_on_left"`.
    pub reason: String,
}

impl TransitionEvent {
    pub fn new(from: StateId, to: StateId, reason: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            from,
            to,
            reason: reason.into(),
        }
    }
}

/// Workspace-wide error type.
#[derive(Error, Debug, Serialize, Deserialize)]
pub enum RoverError {
    #[error("Invalid telemetry: {0}")]
    InvalidTelemetry(String),

    #[error("Frame size mismatch: expected {expected} bytes, got {actual}")]
    FrameSize { expected: usize, actual: usize },

    #[error("Calibration error: {0}")]
    Calibration(String),

    #[error("Command rejected by {rule}: {details}")]
    CommandRejected { rule: String, details: String },

    #[error("Transport error: {0}")]
    Transport(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drive_command_roundtrip() {
        let cmd = RoverCommand::Drive {
            throttle: 0.8,
            brake: 0.0,
            steer: -15.0,
        };
        let json = serde_json::to_string(&cmd).unwrap();
        assert!(json.contains("\"action\":\"Drive\""));
        let back: RoverCommand = serde_json::from_str(&json).unwrap();
        assert_eq!(back, cmd);
    }

    #[test]
    fn pickup_command_roundtrip() {
        let json = serde_json::to_string(&RoverCommand::Pickup).unwrap();
        let back: RoverCommand = serde_json::from_str(&json).unwrap();
        assert!(matches!(back, RoverCommand::Pickup));
    }

    #[test]
    fn telemetry_defaults_missing_flags() {
        let json = r#"{"pose":{"x":99.7,"y":85.6,"yaw":10.0,"pitch":0.0,"roll":0.0,"velocity":0.5}}"#;
        let t: Telemetry = serde_json::from_str(json).unwrap();
        assert!(!t.near_sample);
        assert!(!t.picking_up);
        assert_eq!(t.samples_collected, 0);
        assert!((t.pose.x - 99.7).abs() < 1e-5);
    }

    #[test]
    fn camera_frame_rejects_wrong_length() {
        let err = CameraFrame::new(4, 4, vec![0u8; 10]).unwrap_err();
        assert!(matches!(
            err,
            RoverError::FrameSize {
                expected: 48,
                actual: 10
            }
        ));
    }

    #[test]
    fn camera_frame_pixel_access() {
        let mut frame = CameraFrame::filled(3, 2, [1, 2, 3]);
        assert_eq!(frame.data.len(), 18);
        assert_eq!(frame.pixel(2, 1), [1, 2, 3]);
        frame.set_pixel(1, 0, [9, 8, 7]);
        assert_eq!(frame.pixel(1, 0), [9, 8, 7]);
        assert_eq!(frame.pixel(0, 0), [1, 2, 3]);
    }

    #[test]
    fn state_names_are_unique() {
        let mut names: Vec<&str> = StateId::ALL.iter().map(|s| s.name()).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), 9);
    }

    #[test]
    fn rover_error_display() {
        let err = RoverError::CommandRejected {
            rule: "steer_limit".to_string(),
            details: "steer 40 outside [-15, 15]".to_string(),
        };
        assert!(err.to_string().contains("steer_limit"));
    }
}
