//! Event predicates: boolean questions the state machine asks about the
//! current [`RoverState`].
//!
//! Every predicate that reads perception answers `false` when no perception
//! output exists yet or when the statistic it needs is undefined.

use std::time::{Duration, Instant};

use crate::params::ControlParams;
use crate::rover_state::RoverState;

/// The rover has turned away from the left wall and is heading into open
/// ground.
pub fn deviated_from_wall(state: &RoverState, params: &ControlParams) -> bool {
    let Some(p) = &state.perception else {
        return false;
    };
    match p.mean_left_angle() {
        Some(angle) => angle > params.deviation_max_angle && p.left_count() >= params.deviation_min_left_pixels,
        None => false,
    }
}

/// Plenty of navigable ground on the left.
pub fn left_path_clear(state: &RoverState, params: &ControlParams) -> bool {
    state
        .perception
        .as_ref()
        .is_some_and(|p| p.left_count() >= params.clear_left_min_pixels)
}

/// Too little navigable ground on the left: the wall is too close.
pub fn obstacle_on_left(state: &RoverState, params: &ControlParams) -> bool {
    state
        .perception
        .as_ref()
        .is_some_and(|p| p.left_count() < params.obstacle_left_min_pixels)
}

/// Too little navigable ground anywhere ahead.
pub fn obstacle_at_front(state: &RoverState, params: &ControlParams) -> bool {
    state
        .perception
        .as_ref()
        .is_some_and(|p| p.navigable.len() < params.obstacle_front_min_pixels)
}

/// Heading roughly parallel to the left wall with enough room beside it.
pub fn pointed_along_wall(state: &RoverState, params: &ControlParams) -> bool {
    let Some(p) = &state.perception else {
        return false;
    };
    if p.left_count() < params.pointed_min_left_pixels {
        return false;
    }
    match p.mean_left_angle() {
        Some(angle) => angle + params.pointed_wall_bias > 0.0,
        None => false,
    }
}

/// A rock sample is close and not behind the rover's right shoulder.
///
/// Distance is judged over every rock pixel in view, the bearing over those
/// within the rock cutoff.
pub fn sample_visible(state: &RoverState, params: &ControlParams) -> bool {
    let Some(p) = &state.perception else {
        return false;
    };
    match (p.rock.mean_angle(), p.rock_distance) {
        (Some(angle), Some(distance)) => {
            distance < params.sample_max_distance
                && angle > params.sample_min_angle
                && angle <= params.sample_max_angle
        }
        _ => false,
    }
}

/// Feed the stuck timer with this cycle's velocity and report whether the
/// rover has been stationary for at least `timeout`.
pub fn is_stuck(state: &mut RoverState, params: &ControlParams, timeout: Duration, now: Instant) -> bool {
    let velocity = state.velocity();
    state
        .fsm
        .stuck_timer
        .observe(velocity, now, timeout, params.stuck_velocity)
}

pub fn mission_complete(state: &RoverState, params: &ControlParams) -> bool {
    state.mission.samples_collected >= params.min_samples
        && state.mission.percent_mapped >= params.min_mapped_percent
}

/// Homing and within the arrival radius.
pub fn reached_home(state: &RoverState, params: &ControlParams) -> bool {
    state.mission.going_home
        && state
            .fsm
            .home
            .is_some_and(|home| home.distance < params.home_arrival_radius)
}
