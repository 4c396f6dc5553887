//! Generic `CommandSink` trait for whatever consumes the rover's commands.
//!
//! The control loop only ever talks to the trait, so the simulator link can
//! be swapped for a log writer or a test recorder without touching decision
//! logic.

use rover_types::{RoverCommand, RoverError};

/// Receives exactly one [`RoverCommand`] per processed telemetry frame.
pub trait CommandSink {
    /// # Errors
    ///
    /// Returns [`RoverError::Transport`] if the command cannot be delivered.
    fn send(&mut self, command: &RoverCommand) -> Result<(), RoverError>;
}
