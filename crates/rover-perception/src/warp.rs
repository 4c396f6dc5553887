//! Perspective warp from the forward-looking camera to a top-down view.
//!
//! A [`Homography`] is solved exactly from four point correspondences (the
//! ground-plane trapezoid seen by the camera and the square it should become
//! from above).  [`PerspectiveWarp`] then inverse-maps every output pixel
//! into the source frame and samples it bilinearly.  Output pixels whose
//! source falls outside the camera frame are black and `false` in the
//! accompanying validity mask.

use nalgebra::{Matrix3, Point2, SMatrix, SVector, Vector3};
use rover_types::{CameraFrame, RoverError};

use crate::mask::BinaryMask;

/// Source points this close outside the frame still count as on the edge.
const EDGE_TOLERANCE: f64 = 1e-6;

/// Four image points, in `(x = col, y = row)` pixel coordinates.
pub type Quad = [Point2<f64>; 4];

/// A projective transform `p' ~ H p` between two image planes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Homography {
    matrix: Matrix3<f64>,
}

impl Homography {
    /// Solve the homography mapping each `src[i]` onto `dst[i]`.
    ///
    /// Fixing `H[2,2] = 1` leaves eight unknowns and each correspondence
    /// contributes two equations, giving an 8×8 linear system.
    ///
    /// # Errors
    ///
    /// Returns [`RoverError::Calibration`] when the quads are degenerate
    /// (three collinear points, repeated points, ...).
    pub fn from_quads(src: &Quad, dst: &Quad) -> Result<Self, RoverError> {
        let mut a = SMatrix::<f64, 8, 8>::zeros();
        let mut b = SVector::<f64, 8>::zeros();

        for (i, (s, d)) in src.iter().zip(dst.iter()).enumerate() {
            let (x, y, u, v) = (s.x, s.y, d.x, d.y);
            let r = 2 * i;

            a[(r, 0)] = x;
            a[(r, 1)] = y;
            a[(r, 2)] = 1.0;
            a[(r, 6)] = -u * x;
            a[(r, 7)] = -u * y;
            b[r] = u;

            a[(r + 1, 3)] = x;
            a[(r + 1, 4)] = y;
            a[(r + 1, 5)] = 1.0;
            a[(r + 1, 6)] = -v * x;
            a[(r + 1, 7)] = -v * y;
            b[r + 1] = v;
        }

        let h = a
            .lu()
            .solve(&b)
            .filter(|h| h.iter().all(|v| v.is_finite()))
            .ok_or_else(|| RoverError::Calibration("degenerate calibration quad".to_string()))?;

        Ok(Self {
            matrix: Matrix3::new(h[0], h[1], h[2], h[3], h[4], h[5], h[6], h[7], 1.0),
        })
    }

    /// The transform going the other way.
    pub fn inverse(&self) -> Result<Self, RoverError> {
        self.matrix
            .try_inverse()
            .map(|matrix| Self { matrix })
            .ok_or_else(|| RoverError::Calibration("homography is not invertible".to_string()))
    }

    /// Project `p`; `None` when it maps to the line at infinity.
    pub fn apply(&self, p: Point2<f64>) -> Option<Point2<f64>> {
        let v = self.matrix * Vector3::new(p.x, p.y, 1.0);
        if v.z.abs() < f64::EPSILON {
            return None;
        }
        Some(Point2::new(v.x / v.z, v.y / v.z))
    }
}

/// A precomputed camera → top-down warp.
#[derive(Debug, Clone)]
pub struct PerspectiveWarp {
    /// Maps output (top-down) pixels back to source (camera) pixels.
    inverse: Homography,
}

impl PerspectiveWarp {
    pub fn new(src: &Quad, dst: &Quad) -> Result<Self, RoverError> {
        let forward = Homography::from_quads(src, dst)?;
        Ok(Self {
            inverse: forward.inverse()?,
        })
    }

    /// Warp `frame`, returning the top-down view and its validity mask.
    ///
    /// Both outputs have exactly the dimensions of `frame`.
    pub fn apply(&self, frame: &CameraFrame) -> (CameraFrame, BinaryMask) {
        let (width, height) = (frame.width, frame.height);
        let mut warped = CameraFrame::filled(width, height, [0, 0, 0]);
        let mut valid = BinaryMask::new(width, height);
        let max_x = width.saturating_sub(1) as f64;
        let max_y = height.saturating_sub(1) as f64;
        let inside = |v: f64, max: f64| v >= -EDGE_TOLERANCE && v <= max + EDGE_TOLERANCE;

        for row in 0..height {
            for col in 0..width {
                let Some(src) = self.inverse.apply(Point2::new(col as f64, row as f64)) else {
                    continue;
                };
                if !inside(src.x, max_x) || !inside(src.y, max_y) {
                    continue;
                }
                let (x, y) = (src.x.clamp(0.0, max_x), src.y.clamp(0.0, max_y));
                warped.set_pixel(col, row, sample_bilinear(frame, x, y));
                valid.set(col, row, true);
            }
        }

        (warped, valid)
    }
}

/// Convenience wrapper: solve the homography for `src → dst` and warp
/// `frame` in one call.
pub fn perspective_warp(
    frame: &CameraFrame,
    src: &Quad,
    dst: &Quad,
) -> Result<(CameraFrame, BinaryMask), RoverError> {
    Ok(PerspectiveWarp::new(src, dst)?.apply(frame))
}

fn sample_bilinear(frame: &CameraFrame, x: f64, y: f64) -> [u8; 3] {
    let x0 = x.floor() as u32;
    let y0 = y.floor() as u32;
    let x1 = (x0 + 1).min(frame.width - 1);
    let y1 = (y0 + 1).min(frame.height - 1);
    let fx = x - x0 as f64;
    let fy = y - y0 as f64;

    let p00 = frame.pixel(x0, y0);
    let p10 = frame.pixel(x1, y0);
    let p01 = frame.pixel(x0, y1);
    let p11 = frame.pixel(x1, y1);

    let mut out = [0u8; 3];
    for c in 0..3 {
        let top = p00[c] as f64 * (1.0 - fx) + p10[c] as f64 * fx;
        let bottom = p01[c] as f64 * (1.0 - fx) + p11[c] as f64 * fx;
        out[c] = (top * (1.0 - fy) + bottom * fy).round().clamp(0.0, 255.0) as u8;
    }
    out
}
