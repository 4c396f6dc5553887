//! [`DecisionSupervisor`] – the navigation finite-state machine.
//!
//! Each cycle [`DecisionSupervisor::run`] evaluates the transition logic of
//! the current state in priority order, calls
//! [`switch_to_state`][DecisionSupervisor::switch_to_state] with the
//! outcome (possibly the same state) and thereby actuates the selected state
//! in the same cycle.
//!
//! | From | Checked in order | To |
//! |---|---|---|
//! | FollowWall | deviated ∧ left clear, obstacle on left, sample visible, mission complete, stuck | TurnToWall, AvoidWall, GoToSample, ReturnHome, GetUnstuck |
//! | TurnToWall / AvoidWall | pointed along wall | FollowWall |
//! | AvoidObstacles | mission complete, pointed along wall | ReturnHome, FollowWall |
//! | GoToSample | near sample, stuck | Stop, GetUnstuck |
//! | Stop | pickup finished | AvoidWall |
//! | GetUnstuck | moving again or stuck | ReturnHome if homing, else FollowWall |
//! | ReturnHome | obstacle at front, reached home, stuck | AvoidObstacles, Park, GetUnstuck |
//! | Park | – | Park |
//!
//! # Example
//!
//! ```rust
//! use std::time::Instant;
//! use rover_runtime::decision::DecisionSupervisor;
//! use rover_runtime::params::ControlParams;
//! use rover_runtime::rover_state::RoverState;
//! use rover_types::StateId;
//!
//! let mut fsm = DecisionSupervisor::new();
//! let mut state = RoverState::new();
//! assert_eq!(fsm.current(), StateId::TurnToWall);
//!
//! // Without perception output no transition logic runs.
//! fsm.run(&mut state, &ControlParams::default(), Instant::now());
//! assert_eq!(fsm.current(), StateId::TurnToWall);
//! assert!(fsm.history().is_empty());
//! ```

use std::collections::VecDeque;
use std::time::Instant;

use rover_types::{StateId, TransitionEvent};
use tracing::{debug, info};

use crate::actuators::actuate;
use crate::events;
use crate::params::ControlParams;
use crate::rover_state::RoverState;

const DEFAULT_HISTORY_CAPACITY: usize = 64;

pub struct DecisionSupervisor {
    current: StateId,
    history: VecDeque<TransitionEvent>,
    capacity: usize,
}

impl Default for DecisionSupervisor {
    fn default() -> Self {
        Self::new()
    }
}

impl DecisionSupervisor {
    /// Start in TurnToWall with the default history capacity.
    pub fn new() -> Self {
        Self::with_history_capacity(DEFAULT_HISTORY_CAPACITY)
    }

    /// Keep at most `capacity` transition records; older ones are dropped.
    pub fn with_history_capacity(capacity: usize) -> Self {
        Self {
            current: StateId::TurnToWall,
            history: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn current(&self) -> StateId {
        self.current
    }

    /// Most recent transitions, oldest first.
    pub fn history(&self) -> &VecDeque<TransitionEvent> {
        &self.history
    }

    /// Make `to` the current state and actuate it.
    ///
    /// Leaving a state disarms the stuck timer and records a
    /// [`TransitionEvent`]; staying in the same state only actuates.
    pub fn switch_to_state(&mut self, to: StateId, reason: &str, state: &mut RoverState, params: &ControlParams) {
        if to != self.current {
            info!(from = %self.current, to = %to, reason, "state transition");
            state.fsm.stuck_timer.disarm();
            match to {
                StateId::GetUnstuck => state.fsm.stuck_yaw = Some(state.telemetry.pose.yaw),
                StateId::Stop => state.fsm.pickup_seen = false,
                _ => {}
            }
            if self.capacity > 0 {
                if self.history.len() == self.capacity {
                    self.history.pop_front();
                }
                self.history.push_back(TransitionEvent::new(self.current, to, reason));
            }
            self.current = to;
        }
        state.control = actuate(self.current, state, params);
    }

    /// One decision cycle.  Transition logic only runs once perception
    /// output exists; until then the current state is simply actuated.
    pub fn run(&mut self, state: &mut RoverState, params: &ControlParams, now: Instant) {
        if state.perception.is_none() {
            debug!(state = %self.current, "no perception output, holding state");
            state.control = actuate(self.current, state, params);
            return;
        }

        let (to, reason) = self.transition(state, params, now);
        self.switch_to_state(to, reason, state, params);
    }

    fn transition(&self, state: &mut RoverState, params: &ControlParams, now: Instant) -> (StateId, &'static str) {
        let current = self.current;
        let stuck = |state: &mut RoverState| match params.stuck_timeouts.for_state(current) {
            Some(timeout) => events::is_stuck(state, params, timeout, now),
            None => false,
        };

        match current {
            StateId::FollowWall => {
                if events::deviated_from_wall(state, params) && events::left_path_clear(state, params) {
                    (StateId::TurnToWall, "deviated_from_wall")
                } else if events::obstacle_on_left(state, params) {
                    (StateId::AvoidWall, "obstacle_on_left")
                } else if events::sample_visible(state, params) {
                    (StateId::GoToSample, "sample_visible")
                } else if events::mission_complete(state, params) {
                    state.mission.going_home = true;
                    (StateId::ReturnHome, "mission_complete")
                } else if stuck(state) {
                    (StateId::GetUnstuck, "is_stuck")
                } else {
                    (current, "hold")
                }
            }
            StateId::TurnToWall | StateId::AvoidWall => {
                if events::pointed_along_wall(state, params) {
                    (StateId::FollowWall, "pointed_along_wall")
                } else {
                    (current, "hold")
                }
            }
            StateId::AvoidObstacles => {
                if events::mission_complete(state, params) {
                    state.mission.going_home = true;
                    (StateId::ReturnHome, "mission_complete")
                } else if events::pointed_along_wall(state, params) {
                    (StateId::FollowWall, "pointed_along_wall")
                } else {
                    (current, "hold")
                }
            }
            StateId::GoToSample => {
                if state.telemetry.near_sample {
                    (StateId::Stop, "near_sample")
                } else if stuck(state) {
                    (StateId::GetUnstuck, "is_stuck")
                } else {
                    (current, "hold")
                }
            }
            StateId::Stop => {
                if state.telemetry.picking_up {
                    state.fsm.pickup_seen = true;
                    (current, "hold")
                } else if state.fsm.pickup_seen || !state.telemetry.near_sample {
                    (StateId::AvoidWall, "pickup_complete")
                } else {
                    (current, "hold")
                }
            }
            StateId::GetUnstuck => {
                let recovered = state.velocity() >= params.recovery_velocity;
                if recovered || stuck(state) {
                    let reason = if recovered { "recovered" } else { "is_stuck" };
                    if state.mission.going_home {
                        (StateId::ReturnHome, reason)
                    } else {
                        (StateId::FollowWall, reason)
                    }
                } else {
                    (current, "hold")
                }
            }
            StateId::ReturnHome => {
                if events::obstacle_at_front(state, params) {
                    (StateId::AvoidObstacles, "obstacle_at_front")
                } else if events::reached_home(state, params) {
                    (StateId::Park, "reached_home")
                } else if stuck(state) {
                    (StateId::GetUnstuck, "is_stuck")
                } else {
                    (current, "hold")
                }
            }
            StateId::Park => (current, "hold"),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::rover_state::HomeFix;
    use rover_perception::{PerceptionOutput, PolarSet};

    /// `count` navigable pixels all at `angle`.
    fn perception(count: usize, angle: f32) -> PerceptionOutput {
        let navigable: PolarSet = std::iter::repeat_n((30.0, angle), count).collect();
        PerceptionOutput {
            navigable_left: navigable.left_angles(),
            navigable,
            ..PerceptionOutput::default()
        }
    }

    /// A rover cruising along the wall: nothing should fire in FollowWall.
    fn cruising() -> RoverState {
        let mut state = RoverState::new();
        state.perception = Some(perception(600, 15.0));
        state.telemetry.pose.velocity = 1.0;
        state
    }

    fn in_state(id: StateId) -> DecisionSupervisor {
        let mut fsm = DecisionSupervisor::new();
        fsm.current = id;
        fsm
    }

    #[test]
    fn starts_in_turn_to_wall() {
        assert_eq!(DecisionSupervisor::new().current(), StateId::TurnToWall);
    }

    #[test]
    fn turn_to_wall_switches_to_follow_wall_once() {
        let p = ControlParams::default();
        let mut fsm = DecisionSupervisor::new();
        let mut state = cruising();
        let now = Instant::now();

        for i in 0..10 {
            fsm.run(&mut state, &p, now + Duration::from_millis(i * 100));
            assert_eq!(fsm.current(), StateId::FollowWall);
        }
        assert_eq!(fsm.history().len(), 1);
        let event = &fsm.history()[0];
        assert_eq!((event.from, event.to), (StateId::TurnToWall, StateId::FollowWall));
        assert_eq!(event.reason, "pointed_along_wall");
        // FollowWall actuated in the switching cycle: 15° + bias.
        assert!((state.control.steer - 6.0).abs() < 1e-4);
    }

    #[test]
    fn turn_to_wall_holds_without_wall() {
        let p = ControlParams::default();
        let mut fsm = DecisionSupervisor::new();
        let mut state = RoverState::new();
        state.perception = Some(perception(400, 15.0));
        fsm.run(&mut state, &p, Instant::now());
        assert_eq!(fsm.current(), StateId::TurnToWall);
        assert_eq!(state.control.steer, 15.0);
    }

    #[test]
    fn follow_wall_priorities() {
        let p = ControlParams::default();

        // Deviated with a clear left: turn back to the wall.
        let mut fsm = in_state(StateId::FollowWall);
        let mut state = cruising();
        state.perception = Some(perception(1600, 40.0));
        fsm.run(&mut state, &p, Instant::now());
        assert_eq!(fsm.current(), StateId::TurnToWall);

        // Wall too close on the left.
        let mut fsm = in_state(StateId::FollowWall);
        let mut state = cruising();
        state.perception = Some(perception(700, -10.0));
        fsm.run(&mut state, &p, Instant::now());
        assert_eq!(fsm.current(), StateId::AvoidWall);

        // Sample ahead.
        let mut fsm = in_state(StateId::FollowWall);
        let mut state = cruising();
        if let Some(out) = state.perception.as_mut() {
            out.rock = [(40.0, 5.0)].into_iter().collect();
            out.rock_distance = Some(40.0);
        }
        fsm.run(&mut state, &p, Instant::now());
        assert_eq!(fsm.current(), StateId::GoToSample);
    }

    #[test]
    fn mission_complete_latches_going_home() {
        let p = ControlParams::default();
        let mut fsm = in_state(StateId::FollowWall);
        let mut state = cruising();
        state.mission.samples_collected = 5;
        state.mission.percent_mapped = 96.0;
        fsm.run(&mut state, &p, Instant::now());
        assert_eq!(fsm.current(), StateId::ReturnHome);
        assert!(state.mission.going_home);
    }

    #[test]
    fn follow_wall_stuck_at_timeout_boundary() {
        let p = ControlParams::default();
        let mut fsm = in_state(StateId::FollowWall);
        let mut state = cruising();
        state.telemetry.pose.velocity = 0.0;
        state.telemetry.pose.yaw = 123.0;
        let t0 = Instant::now();

        fsm.run(&mut state, &p, t0);
        fsm.run(&mut state, &p, t0 + Duration::from_millis(1999));
        assert_eq!(fsm.current(), StateId::FollowWall);

        fsm.run(&mut state, &p, t0 + Duration::from_millis(2000));
        assert_eq!(fsm.current(), StateId::GetUnstuck);
        assert_eq!(state.fsm.stuck_yaw, Some(123.0));
        assert!(!state.fsm.stuck_timer.is_armed(), "transition disarms the timer");
    }

    #[test]
    fn moving_resets_stuck_timer() {
        let p = ControlParams::default();
        let mut fsm = in_state(StateId::FollowWall);
        let mut state = cruising();
        let t0 = Instant::now();

        state.telemetry.pose.velocity = 0.0;
        fsm.run(&mut state, &p, t0);
        state.telemetry.pose.velocity = 0.1;
        fsm.run(&mut state, &p, t0 + Duration::from_millis(1500));
        state.telemetry.pose.velocity = 0.0;
        fsm.run(&mut state, &p, t0 + Duration::from_millis(2500));
        assert_eq!(fsm.current(), StateId::FollowWall);
        fsm.run(&mut state, &p, t0 + Duration::from_millis(4500));
        assert_eq!(fsm.current(), StateId::GetUnstuck);
    }

    #[test]
    fn stop_waits_for_pickup_cycle() {
        let p = ControlParams::default();
        let mut fsm = in_state(StateId::GoToSample);
        let mut state = cruising();
        state.telemetry.near_sample = true;
        state.telemetry.pose.velocity = 0.0;
        let now = Instant::now();

        fsm.run(&mut state, &p, now);
        assert_eq!(fsm.current(), StateId::Stop);
        assert!(state.control.send_pickup);

        // Still near, pickup not started yet.
        fsm.run(&mut state, &p, now);
        assert_eq!(fsm.current(), StateId::Stop);
        assert!(state.control.send_pickup);

        // Pickup in flight.
        state.telemetry.picking_up = true;
        for _ in 0..3 {
            fsm.run(&mut state, &p, now);
            assert_eq!(fsm.current(), StateId::Stop);
            assert!(state.control.send_pickup);
        }

        // Pickup done.
        state.telemetry.picking_up = false;
        fsm.run(&mut state, &p, now);
        assert_eq!(fsm.current(), StateId::AvoidWall);
        assert!(!state.control.send_pickup);
    }

    #[test]
    fn stop_leaves_when_sample_no_longer_near() {
        let p = ControlParams::default();
        let mut fsm = in_state(StateId::Stop);
        let mut state = cruising();
        state.telemetry.near_sample = false;
        fsm.run(&mut state, &p, Instant::now());
        assert_eq!(fsm.current(), StateId::AvoidWall);
    }

    #[test]
    fn get_unstuck_returns_to_mission() {
        let p = ControlParams::default();

        let mut fsm = in_state(StateId::GetUnstuck);
        let mut state = cruising();
        fsm.run(&mut state, &p, Instant::now());
        assert_eq!(fsm.current(), StateId::FollowWall);

        let mut fsm = in_state(StateId::GetUnstuck);
        let mut state = cruising();
        state.mission.going_home = true;
        fsm.run(&mut state, &p, Instant::now());
        assert_eq!(fsm.current(), StateId::ReturnHome);

        // Slow but not yet stuck: keep pivoting.
        let mut fsm = in_state(StateId::GetUnstuck);
        let mut state = cruising();
        state.telemetry.pose.velocity = 0.5;
        fsm.run(&mut state, &p, Instant::now());
        assert_eq!(fsm.current(), StateId::GetUnstuck);
    }

    #[test]
    fn return_home_transitions() {
        let p = ControlParams::default();

        let mut fsm = in_state(StateId::ReturnHome);
        let mut state = cruising();
        state.perception = Some(perception(100, 0.0));
        fsm.run(&mut state, &p, Instant::now());
        assert_eq!(fsm.current(), StateId::AvoidObstacles);

        let mut fsm = in_state(StateId::ReturnHome);
        let mut state = cruising();
        state.mission.going_home = true;
        state.fsm.home = Some(HomeFix { distance: 2.0, angle: 0.0 });
        fsm.run(&mut state, &p, Instant::now());
        assert_eq!(fsm.current(), StateId::Park);

        // Park is terminal.
        for _ in 0..5 {
            fsm.run(&mut state, &p, Instant::now());
        }
        assert_eq!(fsm.current(), StateId::Park);
        assert_eq!(state.control.brake, p.max_brake);
    }

    #[test]
    fn follow_wall_deviation_needs_a_clear_left() {
        let p = ControlParams::default();

        // Deviated, but the left is not clear: fall through and hold.
        let mut fsm = in_state(StateId::FollowWall);
        let mut state = cruising();
        state.perception = Some(perception(1499, 40.0));
        fsm.run(&mut state, &p, Instant::now());
        assert_eq!(fsm.current(), StateId::FollowWall);

        // Same, with a sample in view: the next predicate wins.
        let mut fsm = in_state(StateId::FollowWall);
        if let Some(out) = state.perception.as_mut() {
            out.rock = [(40.0, 5.0)].into_iter().collect();
            out.rock_distance = Some(40.0);
        }
        fsm.run(&mut state, &p, Instant::now());
        assert_eq!(fsm.current(), StateId::GoToSample);

        let mut fsm = in_state(StateId::FollowWall);
        let mut state = cruising();
        state.perception = Some(perception(1500, 40.0));
        fsm.run(&mut state, &p, Instant::now());
        assert_eq!(fsm.current(), StateId::TurnToWall);
    }

    #[test]
    fn avoid_obstacles_prefers_mission_complete() {
        let p = ControlParams::default();
        let mut fsm = in_state(StateId::AvoidObstacles);
        let mut state = cruising();
        state.mission.samples_collected = 5;
        state.mission.percent_mapped = 95.0;
        assert!(!state.mission.going_home);

        fsm.run(&mut state, &p, Instant::now());
        assert_eq!(fsm.current(), StateId::ReturnHome);
        assert!(state.mission.going_home);
        assert_eq!(fsm.history()[0].reason, "mission_complete");
    }

    #[test]
    fn avoid_obstacles_returns_to_wall_when_aligned() {
        let p = ControlParams::default();

        let mut fsm = in_state(StateId::AvoidObstacles);
        let mut state = cruising();
        state.perception = Some(perception(499, 15.0));
        fsm.run(&mut state, &p, Instant::now());
        assert_eq!(fsm.current(), StateId::AvoidObstacles);

        state.perception = Some(perception(500, 15.0));
        fsm.run(&mut state, &p, Instant::now());
        assert_eq!(fsm.current(), StateId::FollowWall);
        assert!(!state.mission.going_home);
        assert_eq!(fsm.history()[0].reason, "pointed_along_wall");
    }

    #[test]
    fn go_to_sample_stuck_after_four_seconds() {
        let p = ControlParams::default();
        let mut fsm = in_state(StateId::GoToSample);
        let mut state = cruising();
        state.telemetry.pose.velocity = 0.0;
        let t0 = Instant::now();

        fsm.run(&mut state, &p, t0);
        fsm.run(&mut state, &p, t0 + Duration::from_millis(3999));
        assert_eq!(fsm.current(), StateId::GoToSample);

        fsm.run(&mut state, &p, t0 + Duration::from_millis(4000));
        assert_eq!(fsm.current(), StateId::GetUnstuck);
        assert_eq!(fsm.history()[0].reason, "is_stuck");
    }

    #[test]
    fn return_home_stuck_after_two_and_a_half_seconds() {
        let p = ControlParams::default();
        let mut fsm = in_state(StateId::ReturnHome);
        let mut state = cruising();
        state.mission.going_home = true;
        state.fsm.home = Some(HomeFix { distance: 300.0, angle: 0.0 });
        state.telemetry.pose.velocity = 0.0;
        let t0 = Instant::now();

        fsm.run(&mut state, &p, t0);
        fsm.run(&mut state, &p, t0 + Duration::from_millis(2499));
        assert_eq!(fsm.current(), StateId::ReturnHome);

        fsm.run(&mut state, &p, t0 + Duration::from_millis(2500));
        assert_eq!(fsm.current(), StateId::GetUnstuck);
    }

    #[test]
    fn get_unstuck_gives_up_after_its_timeout() {
        let p = ControlParams::default();
        let mut fsm = in_state(StateId::GetUnstuck);
        let mut state = cruising();
        state.telemetry.pose.velocity = 0.05;
        let t0 = Instant::now();

        fsm.run(&mut state, &p, t0);
        fsm.run(&mut state, &p, t0 + Duration::from_millis(2299));
        assert_eq!(fsm.current(), StateId::GetUnstuck);

        fsm.run(&mut state, &p, t0 + Duration::from_millis(2300));
        assert_eq!(fsm.current(), StateId::FollowWall);
        assert_eq!(fsm.history()[0].reason, "is_stuck");
        assert!(!state.fsm.stuck_timer.is_armed());
    }

    #[test]
    fn history_is_bounded() {
        let p = ControlParams::default();
        let mut fsm = DecisionSupervisor::with_history_capacity(2);
        let mut state = RoverState::new();
        fsm.switch_to_state(StateId::FollowWall, "a", &mut state, &p);
        fsm.switch_to_state(StateId::AvoidWall, "b", &mut state, &p);
        fsm.switch_to_state(StateId::FollowWall, "c", &mut state, &p);
        fsm.switch_to_state(StateId::FollowWall, "same", &mut state, &p);
        let reasons: Vec<&str> = fsm.history().iter().map(|e| e.reason.as_str()).collect();
        assert_eq!(reasons, ["b", "c"]);
    }
}
