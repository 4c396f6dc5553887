//! Recorded-log transport: a JSON-lines [`TelemetrySource`] and a JSON-lines
//! [`CommandSink`].
//!
//! Each log line is one telemetry record plus the path of its camera image:
//!
//! ```json
//! {"image": "IMG/frame_0001.jpg", "pose": {"x": 99.7, "y": 85.6, "yaw": 0.0, "velocity": 0.0}, "near_sample": false}
//! ```
//!
//! Relative image paths are resolved against the log's directory.

use std::fs::File;
use std::io::{BufRead, BufReader, Lines, Write};
use std::path::{Path, PathBuf};

use rover_hal::{CommandSink, TelemetryFrame, TelemetrySource};
use rover_perception::BinaryMask;
use rover_types::{CameraFrame, RoverCommand, RoverError, Telemetry};
use serde::Deserialize;
use tracing::debug;

#[derive(Debug, Deserialize)]
struct LogRecord {
    image: PathBuf,
    #[serde(flatten)]
    telemetry: Telemetry,
}

pub struct ReplaySource {
    lines: Lines<BufReader<File>>,
    base_dir: PathBuf,
    line_no: usize,
}

impl ReplaySource {
    pub fn open(path: &Path) -> Result<Self, RoverError> {
        let file = File::open(path)
            .map_err(|e| RoverError::Transport(format!("cannot open {}: {e}", path.display())))?;
        let base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        Ok(Self {
            lines: BufReader::new(file).lines(),
            base_dir,
            line_no: 0,
        })
    }
}

impl TelemetrySource for ReplaySource {
    fn next_frame(&mut self) -> Result<Option<TelemetryFrame>, RoverError> {
        loop {
            let Some(line) = self.lines.next() else {
                return Ok(None);
            };
            self.line_no += 1;
            let line = line.map_err(|e| RoverError::Transport(e.to_string()))?;
            if line.trim().is_empty() {
                continue;
            }

            let record: LogRecord = serde_json::from_str(&line)
                .map_err(|e| RoverError::InvalidTelemetry(format!("line {}: {e}", self.line_no)))?;
            let image_path = if record.image.is_absolute() {
                record.image
            } else {
                self.base_dir.join(record.image)
            };
            debug!(line = self.line_no, image = %image_path.display(), "replaying frame");
            let image = load_frame(&image_path)?;
            return Ok(Some(TelemetryFrame {
                telemetry: record.telemetry,
                image,
            }));
        }
    }
}

/// Writes every command as one JSON object per line.
pub struct JsonLinesSink<W: Write> {
    out: W,
}

impl<W: Write> JsonLinesSink<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> CommandSink for JsonLinesSink<W> {
    fn send(&mut self, command: &RoverCommand) -> Result<(), RoverError> {
        serde_json::to_writer(&mut self.out, command).map_err(|e| RoverError::Transport(e.to_string()))?;
        writeln!(self.out).map_err(|e| RoverError::Transport(e.to_string()))
    }
}

/// Decode an image file into an RGB24 [`CameraFrame`].
pub fn load_frame(path: &Path) -> Result<CameraFrame, RoverError> {
    let img = image::open(path)
        .map_err(|e| RoverError::Transport(format!("cannot decode {}: {e}", path.display())))?
        .to_rgb8();
    let (width, height) = img.dimensions();
    CameraFrame::new(width, height, img.into_raw())
}

/// Load a north-up ground-truth image as a mask indexed by world cell.
///
/// Any non-black pixel is navigable; image row 0 is the largest world y.
pub fn load_ground_truth(path: &Path) -> Result<BinaryMask, RoverError> {
    let frame = load_frame(path)?;
    let (w, h) = (frame.width, frame.height);
    Ok(BinaryMask::from_fn(w, h, |x, y| frame.pixel(x, h - 1 - y) != [0, 0, 0]))
}

/// Save a [`CameraFrame`] as PNG.
pub fn save_png(frame: &CameraFrame, path: &Path) -> Result<(), RoverError> {
    image::save_buffer(path, &frame.data, frame.width, frame.height, image::ColorType::Rgb8)
        .map_err(|e| RoverError::Transport(format!("cannot write {}: {e}", path.display())))
}
