//! `rover` – replay driver for the autonomous rover stack.
//!
//! ```text
//! rover replay run.jsonl --map-out map.png --ground-truth truth.png
//! rover config --init
//! ```
//!
//! `replay` feeds a recorded telemetry log through the control loop and
//! prints one JSON command per frame on stdout.  Logs go to stderr; Ctrl-C
//! stops after the current frame and still prints the summary.

mod config;
mod replay;

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use clap::{Parser, Subcommand};
use colored::Colorize;
use rover_hal::{CommandSink, TelemetrySource};
use rover_perception::{BinaryMask, MapScore};
use rover_runtime::ControlLoop;
use rover_types::RoverError;
use tracing::{info, warn};

use config::RoverConfig;
use replay::{JsonLinesSink, ReplaySource};

#[derive(Debug, Parser)]
#[command(name = "rover", version, about = "Autonomous rover perception and navigation")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run a recorded telemetry log through the control loop.
    Replay {
        /// JSON-lines telemetry log.
        log: PathBuf,
        /// Config file (default: ~/.rover/config.toml).
        #[arg(long)]
        config: Option<PathBuf>,
        /// Write the final occupancy map here as PNG.
        #[arg(long)]
        map_out: Option<PathBuf>,
        /// Ground-truth navigability image used to score the map.
        #[arg(long)]
        ground_truth: Option<PathBuf>,
        /// Stop after this many frames.
        #[arg(long)]
        max_frames: Option<u64>,
    },
    /// Print the effective configuration.
    Config {
        /// Write the defaults to ~/.rover/config.toml.
        #[arg(long)]
        init: bool,
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let _guard = rover_runtime::init_tracing("rover");

    let result = match cli.command {
        Command::Replay {
            log,
            config,
            map_out,
            ground_truth,
            max_frames,
        } => run_replay(&log, config.as_deref(), map_out.as_deref(), ground_truth.as_deref(), max_frames),
        Command::Config { init, config } => run_config(init, config.as_deref()),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}: {}", "error".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// replay
// ─────────────────────────────────────────────────────────────────────────────

struct ReplayReport {
    frames: u64,
    samples_collected: u32,
    score: Option<MapScore>,
    interrupted: bool,
}

fn run_replay(
    log: &Path,
    config_path: Option<&Path>,
    map_out: Option<&Path>,
    ground_truth: Option<&Path>,
    max_frames: Option<u64>,
) -> Result<(), String> {
    let cfg = config::resolve(config_path)?;
    let truth = ground_truth
        .map(replay::load_ground_truth)
        .transpose()
        .map_err(|e| e.to_string())?;
    if let Some(mask) = &truth
        && mask.width() as usize != cfg.perception.world_size
    {
        warn!(
            width = mask.width(),
            world_size = cfg.perception.world_size,
            "ground truth does not match the world size; map will not be scored"
        );
    }

    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_flag = shutdown.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        eprintln!("{}", "⚠  Ctrl-C received – stopping after the current frame …".yellow().bold());
        shutdown_flag.store(true, Ordering::SeqCst);
    }) {
        warn!(error = %e, "Failed to install Ctrl-C handler");
    }

    let mut rover = ControlLoop::new(cfg.perception, cfg.control).map_err(|e| e.to_string())?;
    let mut source = ReplaySource::open(log).map_err(|e| e.to_string())?;
    let stdout = io::stdout();
    let mut sink = JsonLinesSink::new(stdout.lock());

    info!(log = %log.display(), "replay started");
    let report = drive(
        &mut rover,
        &mut source,
        &mut sink,
        truth.as_ref(),
        max_frames,
        &shutdown,
    )
    .map_err(|e| e.to_string())?;
    sink.into_inner().flush().map_err(|e| e.to_string())?;

    if let Some(path) = map_out {
        replay::save_png(&rover.map().to_rgb(), path).map_err(|e| e.to_string())?;
        info!(path = %path.display(), "map saved");
    }

    print_summary(&rover, &report);
    Ok(())
}

/// Feed every frame of `source` through `rover` until the log ends, the
/// frame limit is hit or `shutdown` is raised.
///
/// With a ground-truth mask the percent mapped reported to the state machine
/// comes from the live map score instead of the recorded telemetry.
fn drive(
    rover: &mut ControlLoop,
    source: &mut dyn TelemetrySource,
    sink: &mut dyn CommandSink,
    truth: Option<&BinaryMask>,
    max_frames: Option<u64>,
    shutdown: &AtomicBool,
) -> Result<ReplayReport, RoverError> {
    let mut report = ReplayReport {
        frames: 0,
        samples_collected: 0,
        score: None,
        interrupted: false,
    };

    loop {
        if shutdown.load(Ordering::SeqCst) {
            report.interrupted = true;
            break;
        }
        if max_frames.is_some_and(|max| report.frames >= max) {
            break;
        }
        let Some(mut frame) = source.next_frame()? else {
            break;
        };

        if let Some(score) = truth.and_then(|t| rover.map().score(t)) {
            frame.telemetry.percent_mapped = score.percent_mapped;
        }
        let command = rover.tick(&frame.image, &frame.telemetry, Instant::now())?;
        sink.send(&command)?;

        report.frames += 1;
        report.samples_collected = frame.telemetry.samples_collected;
    }

    report.score = truth.and_then(|t| rover.map().score(t));
    Ok(report)
}

fn print_summary(rover: &ControlLoop, report: &ReplayReport) {
    let mut err = io::stderr().lock();
    let _ = writeln!(err);
    let _ = writeln!(err, "{}", "  Replay summary".bold().cyan());
    if report.interrupted {
        let _ = writeln!(err, "  {}", "(interrupted)".yellow());
    }
    let _ = writeln!(err, "  Frames       : {}", report.frames.to_string().bold());
    let _ = writeln!(err, "  Final state  : {}", rover.current_state().to_string().bold());
    let _ = writeln!(err, "  Transitions  : {}", rover.transitions().len());
    let _ = writeln!(
        err,
        "  Samples      : {}/{}",
        report.samples_collected,
        rover.params().min_samples
    );
    match report.score {
        Some(s) => {
            let _ = writeln!(
                err,
                "  Map          : {:.1}% mapped, {:.1}% fidelity",
                s.percent_mapped, s.fidelity
            );
        }
        None => {
            let _ = writeln!(err, "  Map          : {}", "not scored".dimmed());
        }
    }
    for t in rover.transitions().iter().rev().take(5).rev() {
        let _ = writeln!(err, "    {} → {}  ({})", t.from, t.to, t.reason.dimmed());
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// config
// ─────────────────────────────────────────────────────────────────────────────

fn run_config(init: bool, config_path: Option<&Path>) -> Result<(), String> {
    if init {
        let path = config::save(&RoverConfig::default())?;
        eprintln!(
            "  {} Config saved to {}",
            "✓".green().bold(),
            path.display().to_string().bold()
        );
        return Ok(());
    }
    let cfg = config::resolve(config_path)?;
    print!("{}", config::to_toml(&cfg)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rover_hal::sim::{RecordingSink, ScriptedSource};
    use rover_perception::PerceptionConfig;
    use rover_runtime::params::ControlParams;
    use rover_types::{CameraFrame, Telemetry};

    fn rover() -> ControlLoop {
        ControlLoop::new(PerceptionConfig::default(), ControlParams::default()).unwrap()
    }

    fn sand(count: usize) -> ScriptedSource {
        let mut t = Telemetry::default();
        t.pose.x = 100.0;
        t.pose.y = 100.0;
        t.pose.velocity = 0.5;
        ScriptedSource::repeat(t, CameraFrame::filled(320, 160, [200, 200, 200]), count)
    }

    #[test]
    fn drive_stops_at_frame_limit() {
        let mut rover = rover();
        let mut source = sand(5);
        let mut sink = RecordingSink::new();
        let report = drive(&mut rover, &mut source, &mut sink, None, Some(3), &AtomicBool::new(false)).unwrap();
        assert_eq!(report.frames, 3);
        assert_eq!(sink.commands().len(), 3);
        assert_eq!(source.remaining(), 2);
        assert!(report.score.is_none());
    }

    #[test]
    fn drive_honours_shutdown_flag() {
        let mut rover = rover();
        let mut source = sand(5);
        let mut sink = RecordingSink::new();
        let report = drive(&mut rover, &mut source, &mut sink, None, None, &AtomicBool::new(true)).unwrap();
        assert!(report.interrupted);
        assert_eq!(report.frames, 0);
        assert!(sink.commands().is_empty());
    }

    #[test]
    fn drive_scores_against_ground_truth() {
        let mut rover = rover();
        let mut source = sand(2);
        let mut sink = RecordingSink::new();
        let truth = BinaryMask::from_fn(200, 200, |_, _| true);
        let report = drive(&mut rover, &mut source, &mut sink, Some(&truth), None, &AtomicBool::new(false)).unwrap();
        assert_eq!(report.frames, 2);
        let score = report.score.expect("scored");
        assert!(score.percent_mapped > 0.0 && score.percent_mapped < 100.0);
        assert!((score.fidelity - 100.0).abs() < 1e-3);
        // The second frame saw the score of the map built by the first.
        assert!(rover.state().mission.percent_mapped > 0.0);
    }
}
