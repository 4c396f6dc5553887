//! [`ControlLoop`] – one perception + decision cycle per telemetry frame.
//!
//! Each tick:
//!
//! 1. **Observe** – copy the telemetry into [`RoverState`].  A non-finite
//!    velocity skips the rest of the cycle and yields a neutral command.
//! 2. **Perceive** – run [`Perception`]; when the rover is level the
//!    [`OccupancyMap`] is updated.
//! 3. **Orient** – refresh the home fix (distance and bearing to home in the
//!    rover frame).
//! 4. **Decide** – [`DecisionSupervisor::run`] selects and actuates a state.
//! 5. **Gatekeep** – the resulting [`RoverCommand`] is checked by the
//!    [`CommandVerifier`]; a rejected command is logged and replaced by the
//!    neutral command.
//!
//! # Example
//!
//! ```rust
//! use std::time::Instant;
//! use rover_perception::PerceptionConfig;
//! use rover_runtime::control_loop::ControlLoop;
//! use rover_runtime::params::ControlParams;
//! use rover_types::{CameraFrame, RoverCommand, StateId, Telemetry};
//!
//! let mut rover = ControlLoop::new(PerceptionConfig::default(), ControlParams::default()).unwrap();
//! let frame = CameraFrame::filled(320, 160, [200, 200, 200]);
//! let command = rover.tick(&frame, &Telemetry::default(), Instant::now()).unwrap();
//!
//! assert!(matches!(command, RoverCommand::Drive { .. }));
//! assert_eq!(rover.current_state(), StateId::FollowWall);
//! ```

use std::collections::VecDeque;
use std::time::Instant;

use rover_hal::{CommandSink, TelemetrySource};
use rover_kernel::CommandVerifier;
use rover_perception::geometry::{WorldPoint, cartesian_to_polar, world_to_rover_frame};
use rover_perception::{OccupancyMap, Perception, PerceptionConfig};
use rover_types::{CameraFrame, RoverCommand, RoverError, StateId, Telemetry, TransitionEvent};
use tracing::{debug, error, warn};

use crate::decision::DecisionSupervisor;
use crate::params::ControlParams;
use crate::rover_state::{HomeFix, RoverState};

pub struct ControlLoop {
    perception: Perception,
    map: OccupancyMap,
    params: ControlParams,
    state: RoverState,
    supervisor: DecisionSupervisor,
    verifier: CommandVerifier,
    cycles: u64,
}

impl ControlLoop {
    /// # Errors
    ///
    /// [`RoverError::Calibration`] when the perspective calibration is
    /// degenerate.
    pub fn new(perception_config: PerceptionConfig, params: ControlParams) -> Result<Self, RoverError> {
        let perception = Perception::new(perception_config)?;
        let map = perception.new_map();
        let verifier = CommandVerifier::with_limits(
            params.max_throttle,
            params.max_brake,
            params.steer_right_max,
            params.steer_left_max,
        );
        Ok(Self {
            perception,
            map,
            params,
            state: RoverState::new(),
            supervisor: DecisionSupervisor::new(),
            verifier,
            cycles: 0,
        })
    }

    /// Process one telemetry frame taken at `now` and return the command to
    /// send back.
    ///
    /// # Errors
    ///
    /// [`RoverError::FrameSize`] when the image does not match the configured
    /// camera resolution.
    pub fn tick(&mut self, frame: &CameraFrame, telemetry: &Telemetry, now: Instant) -> Result<RoverCommand, RoverError> {
        self.cycles += 1;
        self.state.update_telemetry(telemetry);

        let velocity = telemetry.pose.velocity;
        if !velocity.is_finite() {
            warn!(cycle = self.cycles, velocity, "non-finite velocity, skipping cycle");
            return Ok(RoverCommand::neutral());
        }

        let pose = telemetry.pose;
        let output = self.perception.process(frame, &pose, &mut self.map)?;
        self.state.set_perception(output);
        self.state.fsm.home = Some(self.home_fix());

        self.supervisor.run(&mut self.state, &self.params, now);

        let command = self.state.control.to_command(telemetry.picking_up);
        if let Err(e) = self.verifier.verify(&command) {
            error!(cycle = self.cycles, state = %self.supervisor.current(), error = %e, "command rejected");
            return Ok(RoverCommand::neutral());
        }

        debug!(
            cycle = self.cycles,
            state = %self.supervisor.current(),
            ?command,
            "cycle complete"
        );
        Ok(command)
    }

    /// Pull one frame from `source`, tick, and push the command to `sink`.
    ///
    /// Returns `Ok(false)` once the source is exhausted.
    pub fn step(&mut self, source: &mut dyn TelemetrySource, sink: &mut dyn CommandSink) -> Result<bool, RoverError> {
        let Some(frame) = source.next_frame()? else {
            return Ok(false);
        };
        let command = self.tick(&frame.image, &frame.telemetry, Instant::now())?;
        sink.send(&command)?;
        Ok(true)
    }

    fn home_fix(&self) -> HomeFix {
        let [hx, hy] = self.params.home;
        let scale = self.perception.config().world_scale;
        let p = world_to_rover_frame(WorldPoint::new(hx, hy), &self.state.telemetry.pose, scale);
        let (distance, angle) = cartesian_to_polar(p.x, p.y);
        HomeFix { distance, angle }
    }

    /// Read-only view of the occupancy map.
    pub fn map(&self) -> &OccupancyMap {
        &self.map
    }

    pub fn state(&self) -> &RoverState {
        &self.state
    }

    pub fn params(&self) -> &ControlParams {
        &self.params
    }

    pub fn current_state(&self) -> StateId {
        self.supervisor.current()
    }

    pub fn transitions(&self) -> &VecDeque<TransitionEvent> {
        self.supervisor.history()
    }

    /// Number of frames ticked so far.
    pub fn cycles(&self) -> u64 {
        self.cycles
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use rover_hal::sim::{RecordingSink, ScriptedSource};
    use rover_perception::Channel;

    const SAND: [u8; 3] = [200, 200, 200];
    const GOLD: [u8; 3] = [180, 150, 20];

    fn rover() -> ControlLoop {
        ControlLoop::new(PerceptionConfig::default(), ControlParams::default()).unwrap()
    }

    fn telemetry(velocity: f32) -> Telemetry {
        let mut t = Telemetry::default();
        t.pose.x = 100.0;
        t.pose.y = 100.0;
        t.pose.velocity = velocity;
        t
    }

    #[test]
    fn open_ground_leads_to_wall_following() {
        let mut rover = rover();
        let frame = CameraFrame::filled(320, 160, SAND);
        let now = Instant::now();

        let cmd = rover.tick(&frame, &telemetry(0.5), now).unwrap();
        assert_eq!(rover.current_state(), StateId::FollowWall);
        assert_eq!(rover.transitions().len(), 1);
        match cmd {
            RoverCommand::Drive { throttle, brake, steer } => {
                assert!((throttle - 0.8).abs() < 1e-6);
                assert_eq!(brake, 0.0);
                assert!(steer > 0.0 && steer <= 15.0);
            }
            RoverCommand::Pickup => panic!("unexpected pickup"),
        }
        assert!(rover.map().channel(Channel::Navigable).iter().any(|&v| v > 0));
        assert!(rover.state().fsm.home.is_some());
    }

    #[test]
    fn non_finite_velocity_yields_neutral_and_skips_perception() {
        let mut rover = rover();
        let frame = CameraFrame::filled(320, 160, SAND);
        let cmd = rover.tick(&frame, &telemetry(f32::NAN), Instant::now()).unwrap();
        assert_eq!(cmd, RoverCommand::neutral());
        assert!(rover.state().perception.is_none());
        assert!(rover.map().channel(Channel::Navigable).iter().all(|&v| v == 0));
        assert_eq!(rover.current_state(), StateId::TurnToWall);
    }

    #[test]
    fn wrong_frame_size_is_an_error() {
        let mut rover = rover();
        let frame = CameraFrame::filled(10, 10, SAND);
        let err = rover.tick(&frame, &telemetry(0.0), Instant::now()).unwrap_err();
        assert!(matches!(err, RoverError::FrameSize { .. }));
    }

    #[test]
    fn rejected_command_becomes_neutral() {
        let params = ControlParams {
            // The verifier allows less throttle than wall following uses.
            max_throttle: 0.5,
            ..ControlParams::default()
        };
        let mut rover = ControlLoop::new(PerceptionConfig::default(), params).unwrap();
        let frame = CameraFrame::filled(320, 160, SAND);
        let cmd = rover.tick(&frame, &telemetry(0.5), Instant::now()).unwrap();
        assert_eq!(rover.current_state(), StateId::FollowWall);
        assert_eq!(cmd, RoverCommand::neutral());
    }

    #[test]
    fn pickup_emitted_once_not_while_picking_up() {
        let mut rover = rover();
        let gold = CameraFrame::filled(320, 160, GOLD);
        let now = Instant::now();

        let mut t = telemetry(0.0);
        t.near_sample = true;
        // No navigable ground: TurnToWall keeps pivoting.
        rover.tick(&gold, &t, now).unwrap();
        assert_eq!(rover.current_state(), StateId::TurnToWall);

        // Force the sample approach path: GoToSample -> Stop.
        rover.supervisor.switch_to_state(StateId::GoToSample, "test", &mut rover.state, &rover.params);
        let cmd = rover.tick(&gold, &t, now).unwrap();
        assert_eq!(rover.current_state(), StateId::Stop);
        assert_eq!(cmd, RoverCommand::Pickup);

        t.picking_up = true;
        let cmd = rover.tick(&gold, &t, now + Duration::from_millis(100)).unwrap();
        assert_eq!(rover.current_state(), StateId::Stop);
        assert!(matches!(cmd, RoverCommand::Drive { .. }));
        assert!(rover.state().control.send_pickup);

        t.picking_up = false;
        t.near_sample = false;
        rover.tick(&gold, &t, now + Duration::from_millis(200)).unwrap();
        assert_eq!(rover.current_state(), StateId::AvoidWall);
    }

    #[test]
    fn home_fix_points_at_home() {
        let mut rover = rover();
        let frame = CameraFrame::filled(320, 160, SAND);
        let mut t = telemetry(0.0);
        // 5 world units east of home, facing west.
        t.pose.x = 104.7;
        t.pose.y = 85.6;
        t.pose.yaw = 180.0;
        rover.tick(&frame, &t, Instant::now()).unwrap();
        let home = rover.state().fsm.home.unwrap();
        assert!((home.distance - 50.0).abs() < 1e-2, "distance {}", home.distance);
        assert!(home.angle.abs() < 1e-2, "angle {}", home.angle);
    }

    #[test]
    fn step_drives_source_into_sink() {
        let mut rover = rover();
        let mut source = ScriptedSource::repeat(telemetry(0.5), CameraFrame::filled(320, 160, SAND), 3);
        let mut sink = RecordingSink::new();

        while rover.step(&mut source, &mut sink).unwrap() {}

        assert_eq!(sink.commands().len(), 3);
        assert_eq!(rover.cycles(), 3);
        assert_eq!(sink.pickup_count(), 0);
    }
}
