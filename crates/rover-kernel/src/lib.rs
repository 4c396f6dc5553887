//! `rover-kernel` – Safety interlocks
//!
//! Does not decide anything; it enforces limits on what the decision layer
//! produces and watches for a rover that has stopped making progress.
//!
//! # Modules
//!
//! - [`command_verifier`] – [`CommandVerifier`][command_verifier::CommandVerifier]:
//!   a rule engine that validates every [`RoverCommand`][rover_types::RoverCommand]
//!   against actuator limits (finite values, steering rack, brake and
//!   throttle range) before it reaches the simulator.
//! - [`stuck_timer`] – [`StuckTimer`][stuck_timer::StuckTimer]:
//!   monotonic low-velocity timer behind the `is_stuck` predicate.

pub mod command_verifier;
pub mod stuck_timer;

pub use command_verifier::{
    BrakeLimitRule, CommandVerifier, FiniteCommandRule, Rule, SteerLimitRule, ThrottleLimitRule,
};
pub use stuck_timer::StuckTimer;
