//! [`RoverState`] – everything the decision layer knows about the rover,
//! partitioned by who writes it.
//!
//! | Zone | Written by |
//! |---|---|
//! | `telemetry` | control loop, from the incoming message |
//! | `perception` | perception pipeline |
//! | `control` | state actuators only |
//! | `mission` | control loop (counters) and supervisor (`going_home`) |
//! | `fsm` | supervisor and control loop |

use rover_kernel::StuckTimer;
use rover_perception::PerceptionOutput;
use rover_types::{RoverCommand, Telemetry};

/// Actuator output for one cycle.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ControlOutput {
    pub throttle: f32,
    pub brake: f32,
    pub steer: f32,
    /// Ask the simulator to pick up the nearby sample.
    pub send_pickup: bool,
}

impl ControlOutput {
    pub fn drive(throttle: f32, brake: f32, steer: f32) -> Self {
        Self {
            throttle,
            brake,
            steer,
            send_pickup: false,
        }
    }

    /// The command to emit.  A pickup replaces the drive command only while
    /// no pickup is already in progress.
    pub fn to_command(&self, picking_up: bool) -> RoverCommand {
        if self.send_pickup && !picking_up {
            return RoverCommand::Pickup;
        }
        RoverCommand::Drive {
            throttle: self.throttle,
            brake: self.brake,
            steer: self.steer,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MissionState {
    pub samples_collected: u32,
    pub samples_to_find: u32,
    pub percent_mapped: f32,
    /// Latched once the mission-complete predicate fires.
    pub going_home: bool,
}

/// Which side of the rover the navigable terrain was last seen on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NavSide {
    #[default]
    Left,
    Right,
}

/// Home position relative to the rover, in rover-frame polar form.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HomeFix {
    pub distance: f32,
    pub angle: f32,
}

#[derive(Debug, Clone, Default)]
pub struct FsmState {
    pub stuck_timer: StuckTimer,
    /// Yaw when GetUnstuck was entered.  Kept for diagnostics only; the
    /// recovery pivot steers by navigable terrain and does not read it.
    pub stuck_yaw: Option<f32>,
    /// A pickup was observed in progress since Stop was entered.
    pub pickup_seen: bool,
    pub last_nav_side: NavSide,
    pub home: Option<HomeFix>,
}

/// The per-mission aggregate owned by the control loop.
#[derive(Debug, Clone, Default)]
pub struct RoverState {
    pub telemetry: Telemetry,
    pub perception: Option<PerceptionOutput>,
    pub control: ControlOutput,
    pub mission: MissionState,
    pub fsm: FsmState,
}

impl RoverState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take in this cycle's telemetry and refresh the mission counters.
    /// `going_home` is left alone.
    pub fn update_telemetry(&mut self, telemetry: &Telemetry) {
        self.telemetry = telemetry.clone();
        self.mission.samples_collected = telemetry.samples_collected;
        self.mission.samples_to_find = telemetry.samples_to_find;
        self.mission.percent_mapped = telemetry.percent_mapped;
    }

    pub fn velocity(&self) -> f32 {
        self.telemetry.pose.velocity
    }

    /// Replace the perception output and remember which side the navigable
    /// terrain is on.
    pub fn set_perception(&mut self, output: PerceptionOutput) {
        if let Some(angle) = output.navigable.mean_angle() {
            self.fsm.last_nav_side = if angle >= 0.0 { NavSide::Left } else { NavSide::Right };
        }
        self.perception = Some(output);
    }
}
