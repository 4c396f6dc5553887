//! Generic `TelemetrySource` trait: where camera frames and pose come from.

use rover_types::{CameraFrame, RoverError, Telemetry};

/// One simulator message: the telemetry snapshot and the matching camera
/// image.
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetryFrame {
    pub telemetry: Telemetry,
    pub image: CameraFrame,
}

/// A stream of telemetry frames (live simulator link, recorded log, test
/// script, ...).
pub trait TelemetrySource {
    /// Return the next frame, or `Ok(None)` once the stream is exhausted.
    ///
    /// # Errors
    ///
    /// Returns [`RoverError::Transport`] or [`RoverError::InvalidTelemetry`]
    /// when a message cannot be received or decoded.
    fn next_frame(&mut self) -> Result<Option<TelemetryFrame>, RoverError>;
}
