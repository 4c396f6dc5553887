//! In-process telemetry source and command sink for CI/CD testing without
//! the simulator.
//!
//! [`ScriptedSource`] replays a fixed list of frames; [`RecordingSink`]
//! keeps every command it receives.  Together they let the full control loop
//! run in headless tests.
//!
//! # Example
//!
//! ```rust
//! use rover_hal::sim::{RecordingSink, ScriptedSource};
//! use rover_hal::{CommandSink, TelemetrySource};
//! use rover_types::{CameraFrame, RoverCommand, Telemetry};
//!
//! let mut source = ScriptedSource::repeat(
//!     Telemetry::default(),
//!     CameraFrame::filled(320, 160, [200, 200, 200]),
//!     3,
//! );
//! let mut sink = RecordingSink::new();
//!
//! while let Some(_frame) = source.next_frame().unwrap() {
//!     sink.send(&RoverCommand::neutral()).unwrap();
//! }
//! assert_eq!(sink.commands().len(), 3);
//! ```

use std::collections::VecDeque;

use rover_types::{CameraFrame, RoverCommand, RoverError, Telemetry};

use crate::sink::CommandSink;
use crate::source::{TelemetryFrame, TelemetrySource};

// ────────────────────────────────────────────────────────────────────────────
// Scripted source
// ────────────────────────────────────────────────────────────────────────────

/// Yields a pre-built sequence of frames, then `None`.
#[derive(Debug, Default)]
pub struct ScriptedSource {
    frames: VecDeque<TelemetryFrame>,
}

impl ScriptedSource {
    pub fn new(frames: impl IntoIterator<Item = TelemetryFrame>) -> Self {
        Self {
            frames: frames.into_iter().collect(),
        }
    }

    /// `count` copies of the same telemetry and image.
    pub fn repeat(telemetry: Telemetry, image: CameraFrame, count: usize) -> Self {
        Self::new(std::iter::repeat_n(TelemetryFrame { telemetry, image }, count))
    }

    /// Append one frame to the end of the script.
    pub fn push(&mut self, telemetry: Telemetry, image: CameraFrame) {
        self.frames.push_back(TelemetryFrame { telemetry, image });
    }

    pub fn remaining(&self) -> usize {
        self.frames.len()
    }
}

impl TelemetrySource for ScriptedSource {
    fn next_frame(&mut self) -> Result<Option<TelemetryFrame>, RoverError> {
        Ok(self.frames.pop_front())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Recording sink
// ────────────────────────────────────────────────────────────────────────────

/// Stores every command sent to it.  Always succeeds.
#[derive(Debug, Default)]
pub struct RecordingSink {
    commands: Vec<RoverCommand>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn commands(&self) -> &[RoverCommand] {
        &self.commands
    }

    pub fn last(&self) -> Option<&RoverCommand> {
        self.commands.last()
    }

    pub fn pickup_count(&self) -> usize {
        self.commands
            .iter()
            .filter(|c| matches!(c, RoverCommand::Pickup))
            .count()
    }
}

impl CommandSink for RecordingSink {
    fn send(&mut self, command: &RoverCommand) -> Result<(), RoverError> {
        self.commands.push(*command);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn telemetry_at(x: f32) -> Telemetry {
        let mut t = Telemetry::default();
        t.pose.x = x;
        t
    }

    #[test]
    fn scripted_source_preserves_order() {
        let image = CameraFrame::filled(2, 2, [1, 2, 3]);
        let mut src = ScriptedSource::default();
        src.push(telemetry_at(1.0), image.clone());
        src.push(telemetry_at(2.0), image);
        assert_eq!(src.remaining(), 2);

        let first = src.next_frame().unwrap().unwrap();
        let second = src.next_frame().unwrap().unwrap();
        assert!((first.telemetry.pose.x - 1.0).abs() < f32::EPSILON);
        assert!((second.telemetry.pose.x - 2.0).abs() < f32::EPSILON);
        assert!(src.next_frame().unwrap().is_none());
    }

    #[test]
    fn recording_sink_counts_pickups() {
        let mut sink = RecordingSink::new();
        sink.send(&RoverCommand::Pickup).unwrap();
        sink.send(&RoverCommand::neutral()).unwrap();
        sink.send(&RoverCommand::Pickup).unwrap();
        assert_eq!(sink.pickup_count(), 2);
        assert_eq!(sink.last(), Some(&RoverCommand::Pickup));
    }
}
