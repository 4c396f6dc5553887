//! `rover-runtime` – The decision loop
//!
//! Turns each telemetry frame into exactly one rover command by running
//! perception, a nine-state navigation state machine and the command safety
//! gate.
//!
//! # Modules
//!
//! - [`control_loop`] – [`ControlLoop`][control_loop::ControlLoop]:
//!   the per-frame orchestrator (observe, perceive, decide, gatekeep) and
//!   owner of the occupancy map and [`RoverState`][rover_state::RoverState].
//! - [`decision`] – [`DecisionSupervisor`][decision::DecisionSupervisor]:
//!   state transitions in priority order, with a bounded transition history.
//! - [`events`] – boolean predicates over the rover state (wall deviation,
//!   obstacles, sample visibility, stuck, mission complete, home reached).
//! - [`actuators`] – the throttle/brake/steer law of each state.
//! - [`params`] – [`ControlParams`][params::ControlParams]: every threshold,
//!   serde-loadable with defaults.
//! - [`rover_state`] – the partitioned per-mission state aggregate.
//! - [`logging`] – [`init_tracing`][logging::init_tracing]: global `tracing`
//!   subscriber with optional JSON output and OTLP span export.
//!
//! # Command gating
//!
//! Every command produced by the state machine passes through
//! [`CommandVerifier`] before it is returned.  [`CommandVerifier`] is
//! re-exported so callers can build custom rule sets without depending on
//! `rover-kernel` directly.

pub mod actuators;
pub mod control_loop;
pub mod decision;
pub mod events;
pub mod logging;
pub mod params;
pub mod rover_state;

pub use control_loop::ControlLoop;
pub use decision::DecisionSupervisor;
pub use logging::{TracingGuard, init_tracing};
pub use params::{ControlParams, StuckTimeouts};
pub use rover_state::{ControlOutput, RoverState};

pub use rover_kernel::CommandVerifier;
