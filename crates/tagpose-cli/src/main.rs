//! `tagpose` – multi-camera fiducial localisation from the command line.
//!
//! 1. Loads `~/.tagpose/config.toml` (or `--config`), applies `TAGPOSE_*`
//!    environment overrides, then command-line flags.
//! 2. Builds the vision pipeline in live or simulation mode.
//! 3. Runs a fixed-period loop: every tick each camera's latest detections
//!    become a pose estimate with standard deviations, printed to stdout; the
//!    first estimate of the tick is shown as the robot's field pose.
//!
//! In live mode detections arrive on stdin, one JSON object per line:
//! `{"camera": "<name>", "result": <DetectionResult>}`.
//! **Ctrl-C** stops the loop after the current tick.

mod config;
mod display;
#[cfg(feature = "sim")]
mod track;

use std::error::Error;
use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use serde::Deserialize;
use tracing::{info, warn};

use tagpose_hal::DetectionFeed;
use tagpose_perception::{ExecutionMode, Vision, VisionBuilder};
use tagpose_types::{DetectionResult, TagLayout, VisionError};

use display::{ConsoleField, OutputFormat};

#[derive(Debug, Parser)]
#[command(author, version, about = "Multi-camera fiducial localisation")]
struct Cli {
    /// Configuration file [default: ~/.tagpose/config.toml].
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the estimation loop (the default).
    Run(RunArgs),
    /// Write the default configuration file.
    Init {
        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },
    /// Print the tags of the configured field layout.
    Layout,
}

#[derive(Debug, Default, Args)]
struct RunArgs {
    /// `live` reads detections from stdin; `simulation` synthesises them.
    #[arg(long)]
    mode: Option<ExecutionMode>,

    /// Field layout JSON.
    #[arg(long)]
    layout: Option<PathBuf>,

    /// Stop after this many ticks (0 runs until interrupted).
    #[arg(long)]
    ticks: Option<u64>,

    /// Simulation noise seed (0 draws from entropy).
    #[arg(long)]
    seed: Option<u64>,

    /// Emit one JSON object per estimate.
    #[arg(long)]
    json: bool,

    /// Do not wait between ticks.
    #[arg(long)]
    fast: bool,

    /// Evaluate cameras concurrently.
    #[arg(long)]
    parallel: bool,
}

impl RunArgs {
    fn apply_to(&self, cfg: &mut config::Config) {
        if let Some(mode) = self.mode {
            cfg.mode = mode;
        }
        if let Some(layout) = &self.layout {
            cfg.tag_layout = Some(layout.clone());
        }
        if let Some(ticks) = self.ticks {
            cfg.ticks = ticks;
        }
        if let Some(seed) = self.seed {
            cfg.sim.seed = seed;
        }
    }

    fn format(&self) -> OutputFormat {
        if self.json { OutputFormat::Json } else { OutputFormat::Pretty }
    }
}

fn main() {
    // ── Structured logging ────────────────────────────────────────────────
    // RUST_LOG selects the filter (default "info"); TAGPOSE_LOG_FORMAT=json
    // switches to newline-delimited JSON.  Logs go to stderr so stdout stays
    // reserved for estimates.
    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level));

    if std::env::var("TAGPOSE_LOG_FORMAT").as_deref() == Ok("json") {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_writer(std::io::stderr)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_writer(std::io::stderr)
            .compact()
            .init();
    }

    if let Err(err) = try_main() {
        eprintln!("{}: {err}", "error".red().bold());
        std::process::exit(1);
    }
}

fn try_main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    let config_path = cli.config.clone().unwrap_or_else(config::config_path);

    match cli.command.unwrap_or(Command::Run(RunArgs::default())) {
        Command::Init { force } => {
            if config_path.exists() && !force {
                return Err(format!(
                    "{} already exists (use --force to overwrite)",
                    config_path.display()
                )
                .into());
            }
            config::save_to(&config::Config::default(), &config_path)?;
            println!(
                "  {} Config written to {}",
                "✓".green().bold(),
                config_path.display().to_string().bold()
            );
            Ok(())
        }
        Command::Layout => {
            let cfg = config::resolve(&config_path)?;
            let layout = load_layout(cfg.tag_layout.as_deref())?;
            print_layout(&layout);
            Ok(())
        }
        Command::Run(args) => {
            let mut cfg = config::resolve(&config_path)?;
            args.apply_to(&mut cfg);
            run(&cfg, &args)
        }
    }
}

fn load_layout(path: Option<&Path>) -> Result<TagLayout, VisionError> {
    match path {
        Some(path) => TagLayout::from_path(path),
        None => Ok(TagLayout::sample_field()),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Estimation loop
// ─────────────────────────────────────────────────────────────────────────────

fn run(cfg: &config::Config, args: &RunArgs) -> Result<(), Box<dyn Error>> {
    let format = args.format();
    if format == OutputFormat::Pretty {
        print_banner();
    }

    let layout = Arc::new(load_layout(cfg.tag_layout.as_deref())?);
    info!(
        tags = layout.len(),
        source = cfg
            .tag_layout
            .as_deref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "sample field".to_string()),
        "tag layout loaded"
    );

    let builder = VisionBuilder::new(layout.clone())
        .cameras(cfg.camera_configs())
        .confidence(cfg.confidence)
        .sim_seed(cfg.sim.seed);
    #[cfg(feature = "sim")]
    let builder = builder.sim_properties(cfg.sim.camera.clone());
    let mut rig = builder.build(cfg.mode)?;

    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_flag = shutdown.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        shutdown_flag.store(true, Ordering::SeqCst);
    }) {
        warn!(error = %e, "Failed to install Ctrl-C handler; the loop can only stop after --ticks");
    }

    if !rig.live_feeds.is_empty() {
        spawn_stdin_reader(std::mem::take(&mut rig.live_feeds));
    }

    #[cfg(feature = "sim")]
    let track = track::SweepTrack::facing_origin_wall(&layout);

    let period = Duration::from_millis(cfg.tick_period_ms.max(1));
    let mut field = ConsoleField::new(format);
    let mut tick = 0u64;
    let mut produced = 0usize;
    let mut usable = 0usize;

    info!(mode = %cfg.mode, period_ms = period.as_millis() as u64, ticks = cfg.ticks, "estimation loop started");
    while !shutdown.load(Ordering::SeqCst) && (cfg.ticks == 0 || tick < cfg.ticks) {
        let started = Instant::now();

        #[cfg(feature = "sim")]
        if let Some(sim) = rig.sim.as_mut() {
            let now = tick as f64 * period.as_secs_f64();
            sim.update(&track.pose_at(now), now);
        }

        let estimates = if args.parallel {
            rig.vision.estimated_global_poses_parallel()
        } else {
            rig.vision.estimated_global_poses()
        };
        for estimate in &estimates {
            println!("{}", display::format_estimate(tick, estimate, format));
        }
        produced += estimates.len();
        usable += estimates.iter().filter(|e| e.std_devs.is_usable()).count();
        Vision::publish_first(&estimates, &mut field);

        tick += 1;
        if !args.fast
            && let Some(rest) = period.checked_sub(started.elapsed())
        {
            std::thread::sleep(rest);
        }
    }

    info!(ticks = tick, estimates = produced, usable, "estimation loop finished");
    if let Some(pose) = field.last_pose() {
        info!(
            x = pose.translation.x,
            y = pose.translation.y,
            heading_deg = pose.rotation.degrees(),
            "last displayed field pose"
        );
    }
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Live input
// ─────────────────────────────────────────────────────────────────────────────

/// One line of live detection input.
#[derive(Debug, Deserialize)]
struct FeedMessage {
    camera: String,
    result: DetectionResult,
}

/// Publish one JSON line to the feed it names.  Returns `false` when the line
/// was dropped.
fn route_message(feeds: &[DetectionFeed], line: &str) -> bool {
    let msg: FeedMessage = match serde_json::from_str(line) {
        Ok(msg) => msg,
        Err(e) => {
            warn!(error = %e, "malformed detection line");
            return false;
        }
    };
    match feeds.iter().find(|f| f.name() == msg.camera) {
        Some(feed) => {
            feed.publish(msg.result);
            true
        }
        None => {
            warn!(camera = %msg.camera, "detections for unknown camera");
            false
        }
    }
}

fn spawn_stdin_reader(feeds: Vec<DetectionFeed>) {
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let line = match line {
                Ok(line) => line,
                Err(e) => {
                    warn!(error = %e, "stdin read failed");
                    break;
                }
            };
            if !line.trim().is_empty() {
                route_message(&feeds, &line);
            }
        }
        info!("detection input closed");
    });
}

// ─────────────────────────────────────────────────────────────────────────────
// Banner / layout listing
// ─────────────────────────────────────────────────────────────────────────────

fn print_banner() {
    println!();
    println!("  {} {}",
        "tagpose".bold().cyan(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
    println!("  Multi-camera fiducial localisation");
    println!();
}

fn print_layout(layout: &TagLayout) {
    println!(
        "  Field {:.2} m × {:.2} m, {} tag(s)",
        layout.field_length(),
        layout.field_width(),
        layout.len()
    );
    for (id, pose) in layout.tags() {
        println!(
            "    {:>3}  x={:>6.2} y={:>6.2} z={:>5.2} yaw={:>7.1}°",
            id.to_string().bold(),
            pose.translation.x,
            pose.translation.y,
            pose.translation.z,
            pose.rotation.yaw().to_degrees()
        );
    }
}
