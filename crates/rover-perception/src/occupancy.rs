//! Persistent world-frame occupancy map.
//!
//! The map is a square grid of `size × size` world cells with three
//! independent accumulation channels.  Cell `(x, y)` is stored at index
//! `y * size + x`.  Channels only ever grow: a [`Count`][AccumulationPolicy::Count]
//! map adds one (saturating) per classified pixel that lands in a cell, a
//! [`Seen`][AccumulationPolicy::Seen] map only records that a cell was hit.
//!
//! # Example
//!
//! ```rust
//! use rover_perception::occupancy::{AccumulationPolicy, Channel, OccupancyMap};
//!
//! let mut map = OccupancyMap::new(200, AccumulationPolicy::Count);
//! map.mark(Channel::Navigable, &[(10, 20), (10, 20)]);
//! map.mark(Channel::Obstacle, &[(10, 20)]);
//!
//! assert_eq!(map.get(Channel::Navigable, 10, 20), 2);
//! assert!(map.is_navigable(10, 20));
//! assert!(!map.is_navigable(11, 20));
//! ```

use rover_types::CameraFrame;
use serde::{Deserialize, Serialize};

use crate::mask::BinaryMask;

/// How repeated hits on the same cell are recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccumulationPolicy {
    /// Saturating per-hit confidence count.
    #[default]
    Count,
    /// Binary "seen at least once" flag.
    Seen,
}

/// One of the three map layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    Navigable,
    Obstacle,
    Rock,
}

/// Ground-truth comparison of the navigable layer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MapScore {
    /// Percent of truly navigable cells the map believes navigable.
    pub percent_mapped: f32,
    /// Percent of map-navigable cells that are truly navigable.
    pub fidelity: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OccupancyMap {
    size: usize,
    policy: AccumulationPolicy,
    navigable: Vec<u16>,
    obstacle: Vec<u16>,
    rock: Vec<u16>,
}

impl OccupancyMap {
    pub fn new(size: usize, policy: AccumulationPolicy) -> Self {
        let cells = size * size;
        Self {
            size,
            policy,
            navigable: vec![0; cells],
            obstacle: vec![0; cells],
            rock: vec![0; cells],
        }
    }

    /// Side length in cells.
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn policy(&self) -> AccumulationPolicy {
        self.policy
    }

    /// Raw layer, indexed `y * size + x`.
    pub fn channel(&self, channel: Channel) -> &[u16] {
        match channel {
            Channel::Navigable => &self.navigable,
            Channel::Obstacle => &self.obstacle,
            Channel::Rock => &self.rock,
        }
    }

    /// Value of one cell; `0` outside the map.
    pub fn get(&self, channel: Channel, x: usize, y: usize) -> u16 {
        if x >= self.size || y >= self.size {
            return 0;
        }
        self.channel(channel)[y * self.size + x]
    }

    /// Record one hit per entry of `cells`.  Out-of-range cells are ignored.
    pub fn mark(&mut self, channel: Channel, cells: &[(usize, usize)]) {
        let size = self.size;
        let policy = self.policy;
        let layer = match channel {
            Channel::Navigable => &mut self.navigable,
            Channel::Obstacle => &mut self.obstacle,
            Channel::Rock => &mut self.rock,
        };
        for &(x, y) in cells {
            if x >= size || y >= size {
                continue;
            }
            let cell = &mut layer[y * size + x];
            *cell = match policy {
                AccumulationPolicy::Count => cell.saturating_add(1),
                AccumulationPolicy::Seen => 1,
            };
        }
    }

    /// A cell is believed navigable when it has navigable evidence that is
    /// not outweighed by obstacle evidence.
    pub fn is_navigable(&self, x: usize, y: usize) -> bool {
        let nav = self.get(Channel::Navigable, x, y);
        nav > 0 && nav >= self.get(Channel::Obstacle, x, y)
    }

    /// Compare the navigable layer against a ground-truth mask indexed by
    /// world cell (`mask.get(x, y)`).
    ///
    /// Returns `None` when the mask does not match the map size or contains
    /// no navigable cell.
    pub fn score(&self, ground_truth: &BinaryMask) -> Option<MapScore> {
        if ground_truth.width() as usize != self.size || ground_truth.height() as usize != self.size {
            return None;
        }

        let mut truth_total = 0usize;
        let mut mapped_total = 0usize;
        let mut good = 0usize;
        for y in 0..self.size {
            for x in 0..self.size {
                let truth = ground_truth.get(x as u32, y as u32);
                let mapped = self.is_navigable(x, y);
                truth_total += truth as usize;
                mapped_total += mapped as usize;
                good += (truth && mapped) as usize;
            }
        }

        if truth_total == 0 {
            return None;
        }
        let fidelity = if mapped_total == 0 {
            0.0
        } else {
            100.0 * good as f32 / mapped_total as f32
        };
        Some(MapScore {
            percent_mapped: 100.0 * good as f32 / truth_total as f32,
            fidelity,
        })
    }

    /// Render the map as an RGB image with north up.
    ///
    /// Red marks obstacles, green rocks and blue navigable terrain.  Cells
    /// with navigable evidence are never drawn red.
    pub fn to_rgb(&self) -> CameraFrame {
        let side = self.size as u32;
        let mut frame = CameraFrame::filled(side, side, [0, 0, 0]);
        for y in 0..self.size {
            for x in 0..self.size {
                let i = y * self.size + x;
                let nav = self.navigable[i] > 0;
                let red = if self.obstacle[i] > 0 && !nav { 255 } else { 0 };
                let green = if self.rock[i] > 0 { 255 } else { 0 };
                let blue = if nav { 255 } else { 0 };
                frame.set_pixel(x as u32, side - 1 - y as u32, [red, green, blue]);
            }
        }
        frame
    }
}
