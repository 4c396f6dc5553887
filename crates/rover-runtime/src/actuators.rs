//! State actuators: the control law of each state.
//!
//! [`actuate`] is pure.  It reads the rover state and returns the throttle,
//! brake and steering the current state asks for; it never changes state.

use rover_types::StateId;

use crate::params::ControlParams;
use crate::rover_state::{ControlOutput, NavSide, RoverState};

/// Distance band of the ReturnHome control law.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HomeBand {
    /// Follow the terrain.
    Far,
    /// Blend terrain and home bearings.
    Mid,
    /// Blend bearings at low speed.
    Slow,
    /// Line up on home and creep in.
    Park,
}

pub fn home_band(distance: f32, params: &ControlParams) -> HomeBand {
    if distance > params.home_far_distance {
        HomeBand::Far
    } else if distance > params.home_mid_distance {
        HomeBand::Mid
    } else if distance > params.home_slow_distance {
        HomeBand::Slow
    } else {
        HomeBand::Park
    }
}

/// Control output of `state_id` for this cycle.
pub fn actuate(state_id: StateId, state: &RoverState, params: &ControlParams) -> ControlOutput {
    match state_id {
        StateId::FollowWall => follow_wall(state, params),
        StateId::TurnToWall => stop_then_pivot(state, params, NavSide::Left),
        StateId::AvoidWall => stop_then_pivot(state, params, NavSide::Right),
        StateId::AvoidObstacles | StateId::GetUnstuck => nav_pivot(state, params),
        StateId::GoToSample => go_to_sample(state, params),
        StateId::Stop => ControlOutput {
            send_pickup: true,
            ..brake(params)
        },
        StateId::ReturnHome => return_home(state, params),
        StateId::Park => brake(params),
    }
}

fn brake(params: &ControlParams) -> ControlOutput {
    ControlOutput::drive(0.0, params.max_brake, 0.0)
}

fn pivot(params: &ControlParams, side: NavSide) -> ControlOutput {
    let steer = match side {
        NavSide::Left => params.steer_left_max,
        NavSide::Right => params.steer_right_max,
    };
    ControlOutput::drive(0.0, 0.0, steer)
}

/// Throttle that holds speed just under `limit`.
fn throttle_below(velocity: f32, limit: f32, throttle: f32) -> f32 {
    if velocity < limit { throttle } else { 0.0 }
}

fn follow_wall(state: &RoverState, params: &ControlParams) -> ControlOutput {
    let Some(angle) = state.perception.as_ref().and_then(|p| p.mean_left_angle()) else {
        return ControlOutput::default();
    };
    ControlOutput::drive(
        throttle_below(state.velocity(), params.max_velocity, params.cruise_throttle),
        0.0,
        params.clip_steer(angle + params.follow_wall_bias),
    )
}

fn stop_then_pivot(state: &RoverState, params: &ControlParams, side: NavSide) -> ControlOutput {
    if state.velocity() > params.min_velocity {
        return brake(params);
    }
    pivot(params, side)
}

fn nav_pivot(state: &RoverState, params: &ControlParams) -> ControlOutput {
    if state.velocity() > params.min_velocity {
        return brake(params);
    }
    let Some(p) = &state.perception else {
        return pivot(params, NavSide::Right);
    };
    let side = match p.navigable.mean_angle() {
        None => NavSide::Right,
        Some(a) if a < params.min_angle_right => NavSide::Right,
        Some(a) if a > params.min_angle_left => NavSide::Left,
        Some(_) if p.left_count() > p.navigable.right_count() => NavSide::Left,
        Some(_) => NavSide::Right,
    };
    pivot(params, side)
}

fn go_to_sample(state: &RoverState, params: &ControlParams) -> ControlOutput {
    if state.velocity() > params.sample_approach_velocity {
        return brake(params);
    }
    let Some(angle) = state.perception.as_ref().and_then(|p| p.rock.mean_angle()) else {
        return pivot(params, state.fsm.last_nav_side);
    };
    let biased = angle + params.sample_bias;
    if biased >= params.min_angle_left {
        pivot(params, NavSide::Left)
    } else if biased <= params.min_angle_right {
        pivot(params, NavSide::Right)
    } else {
        ControlOutput::drive(params.sample_throttle, 0.0, params.clip_steer(biased))
    }
}

fn return_home(state: &RoverState, params: &ControlParams) -> ControlOutput {
    let velocity = state.velocity();
    let nav = state.perception.as_ref().and_then(|p| p.navigable.mean_angle());
    let Some(home) = state.fsm.home else {
        // No fix on home yet: follow the terrain.
        let steer = nav.map_or(0.0, |a| params.clip_steer(a));
        return ControlOutput::drive(
            throttle_below(velocity, params.max_velocity, params.cruise_throttle),
            0.0,
            steer,
        );
    };

    let nav_bearing = nav.unwrap_or(home.angle);
    let blended = params.home_weight * home.angle + (1.0 - params.home_weight) * nav_bearing;
    let cruise = throttle_below(velocity, params.max_velocity, params.cruise_throttle);

    match home_band(home.distance, params) {
        HomeBand::Far => ControlOutput::drive(cruise, 0.0, params.clip_steer(nav_bearing)),
        HomeBand::Mid => ControlOutput::drive(cruise, 0.0, params.clip_steer(blended)),
        HomeBand::Slow => ControlOutput::drive(
            throttle_below(velocity, params.slow_velocity, params.slow_throttle),
            0.0,
            params.clip_steer(blended),
        ),
        HomeBand::Park => {
            if velocity > params.park_velocity {
                brake(params)
            } else if home.angle >= params.park_pivot_angle {
                pivot(params, NavSide::Left)
            } else if home.angle <= -params.park_pivot_angle {
                pivot(params, NavSide::Right)
            } else {
                ControlOutput::drive(params.park_throttle, 0.0, params.clip_steer(home.angle))
            }
        }
    }
}
