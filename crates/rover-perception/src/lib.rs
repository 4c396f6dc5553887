//! `rover-perception` – turns the rover's camera into terrain knowledge.
//!
//! Converts a perspective-distorted, single-camera RGB frame into
//! rover-centric polar statistics for the navigation state machine and into
//! world-frame evidence for the persistent occupancy map.
//!
//! # Modules
//!
//! - [`warp`] – [`PerspectiveWarp`][warp::PerspectiveWarp]: four-point
//!   homography from the camera view to a top-down view, with a validity
//!   mask.
//! - [`classify`] – colour thresholds splitting the top-down view into
//!   navigable, obstacle and rock pixels.
//! - [`geometry`] – image ↔ rover ↔ world frame conversions and the
//!   [`PolarSet`][geometry::PolarSet] statistics container.
//! - [`occupancy`] – [`OccupancyMap`][occupancy::OccupancyMap]: three-channel
//!   accumulation grid with ground-truth scoring and RGB export.
//! - [`pipeline`] – [`Perception`][pipeline::Perception]: one full cycle,
//!   including the pitch/roll stability gate for map writes.
//! - [`mask`] – [`BinaryMask`][mask::BinaryMask] boolean image.

pub mod classify;
pub mod geometry;
pub mod mask;
pub mod occupancy;
pub mod pipeline;
pub mod warp;

pub use geometry::PolarSet;
pub use mask::BinaryMask;
pub use occupancy::{AccumulationPolicy, Channel, MapScore, OccupancyMap};
pub use pipeline::{Perception, PerceptionConfig, PerceptionOutput};
