//! `rover-hal` – Simulator boundary
//!
//! The control loop reads telemetry from a [`TelemetrySource`] and writes
//! commands to a [`CommandSink`].  Transport (websocket bridge, recorded log,
//! test script) lives behind these traits.
//!
//! # Modules
//!
//! - [`source`] – [`TelemetrySource`] and [`TelemetryFrame`].
//! - [`sink`] – [`CommandSink`].
//! - [`sim`] – [`ScriptedSource`][sim::ScriptedSource] and
//!   [`RecordingSink`][sim::RecordingSink] for headless tests.

pub mod sim;
pub mod sink;
pub mod source;

pub use sink::CommandSink;
pub use source::{TelemetryFrame, TelemetrySource};
