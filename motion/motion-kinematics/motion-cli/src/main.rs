use std::{io::Write, path::PathBuf};

use clap::{Parser, Subcommand};
use eyre::WrapErr;
use nalgebra::Point2;
use serde::Serialize;

use motion_kinematics::{
    AnalysisSession, CalibrationTransform, EngineInvocation, SessionConfig, parse_config_file,
};
use motion_types::FrameRange;

#[derive(Debug, Parser)]
#[command(about, version)]
struct Opt {
    /// The analyzed video. Results are read from `<stem>_Sports2D/` next to it.
    video: PathBuf,

    /// Session configuration TOML file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// How many times slower the video plays than the real motion.
    ///
    /// Overrides the value in the configuration file.
    #[arg(long)]
    slowmo_factor: Option<f64>,

    /// Frame rate of the video in Hz.
    ///
    /// Overrides the rate declared in the position table.
    #[arg(long)]
    frame_rate: Option<f64>,

    /// Convert to meters using this many pixels per meter.
    ///
    /// Overrides the calibration in the configuration file.
    #[arg(long)]
    pixels_per_meter: Option<f64>,

    /// Also write log messages to this file.
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, clap::Args)]
struct RangeArgs {
    /// First frame to output
    #[arg(long)]
    start_frame: Option<u64>,
    /// Last frame to output
    #[arg(long)]
    stop_frame: Option<u64>,
}

impl RangeArgs {
    fn range(&self) -> FrameRange {
        FrameRange {
            start: self.start_frame,
            stop: self.stop_frame,
        }
    }
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print a summary of the loaded analysis
    Summary,
    /// Write position, velocity and acceleration of a joint as CSV
    Kinematics {
        #[arg(short, long)]
        joint: String,
        #[command(flatten)]
        range: RangeArgs,
        /// Output CSV file. Defaults to stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Write an angle with its angular velocity and acceleration as CSV
    Angles {
        /// Angle column name, e.g. "right knee"
        #[arg(short, long)]
        angle: String,
        #[command(flatten)]
        range: RangeArgs,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Write the path of a joint as CSV
    Trajectory {
        #[arg(short, long)]
        joint: String,
        /// Express the path relative to this joint
        #[arg(short, long)]
        reference: Option<String>,
        /// Place the relative path at the reference position of this frame
        #[arg(long, requires = "reference")]
        anchor_frame: Option<u64>,
        #[command(flatten)]
        range: RangeArgs,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Print the values of a joint at one frame
    Stats {
        #[arg(short, long)]
        joint: String,
        #[arg(short, long)]
        frame: u64,
    },
    /// Print the joint nearest to an image point
    Select {
        #[arg(short, long)]
        frame: u64,
        x: f64,
        y: f64,
        /// Search radius in pixels
        #[arg(long, default_value_t = sports2d_parser::DEFAULT_SELECT_RADIUS_PX)]
        radius: f64,
    },
    /// Print the command line that analyzes the video with Sports2D
    EngineCommand {
        /// Path to the sports2d executable
        #[arg(long)]
        program: Option<PathBuf>,
    },
}

#[derive(Debug, Serialize)]
struct KinematicsRow {
    frame: u64,
    time_s: f64,
    x: f64,
    y: f64,
    vx: f64,
    vy: f64,
    speed: f64,
    ax: f64,
    ay: f64,
    acceleration: f64,
    units: &'static str,
}

#[derive(Debug, Serialize)]
struct AngleRow {
    frame: u64,
    time_s: f64,
    degrees: f64,
    velocity_deg_s: f64,
    acceleration_deg_s2: f64,
}

#[derive(Debug, Serialize)]
struct TrajectoryRow {
    frame: u64,
    x: f64,
    y: f64,
    units: &'static str,
}

fn main() -> eyre::Result<()> {
    let opt = Opt::parse();
    let log_options = env_tracing_logger::LogOptions {
        log_file: opt.log_file.clone(),
        ..Default::default()
    };
    let _tracing_guard = env_tracing_logger::initiate_logging(&log_options)
        .map_err(|e| eyre::eyre!("{e}"))
        .wrap_err("initializing logging")?;
    run(opt)
}

fn session_config(opt: &Opt) -> eyre::Result<SessionConfig> {
    let mut cfg = match &opt.config {
        Some(path) => parse_config_file(path)
            .with_context(|| format!("reading configuration {}", path.display()))?,
        None => SessionConfig::default(),
    };
    if let Some(slowmo_factor) = opt.slowmo_factor {
        cfg.slowmo_factor = slowmo_factor;
    }
    Ok(cfg)
}

fn open_session(opt: &Opt, cfg: &SessionConfig) -> eyre::Result<AnalysisSession> {
    let mut session = AnalysisSession::open_video(&opt.video, cfg)
        .with_context(|| format!("loading Sports2D results for {}", opt.video.display()))?;
    if let Some(frame_rate) = opt.frame_rate {
        session = session.with_frame_rate(frame_rate)?;
    }
    if let Some(ppm) = opt.pixels_per_meter {
        session = session.with_calibration(CalibrationTransform::from_pixels_per_meter(ppm)?);
    }
    Ok(session)
}

fn csv_writer(output: &Option<PathBuf>) -> eyre::Result<csv::Writer<Box<dyn Write>>> {
    let wtr: Box<dyn Write> = match output {
        Some(path) => Box::new(
            std::fs::File::create(path)
                .with_context(|| format!("creating {}", path.display()))?,
        ),
        None => Box::new(std::io::stdout()),
    };
    Ok(csv::Writer::from_writer(wtr))
}

fn run(opt: Opt) -> eyre::Result<()> {
    let cfg = session_config(&opt)?;

    if let Commands::EngineCommand { program } = &opt.command {
        let mut invocation = EngineInvocation::new(&opt.video, cfg.slowmo_factor);
        if let Some(program) = program {
            invocation = invocation.with_program(program);
        }
        println!("{}", invocation.command_line());
        return Ok(());
    }

    let session = open_session(&opt, &cfg)?;
    query(&session, &opt.command)
}

fn query(session: &AnalysisSession, command: &Commands) -> eyre::Result<()> {
    let dt = session.timebase().dt();

    match command {
        Commands::Summary => {
            let yaml_buf = serde_yaml::to_string(&session.store().summary())?;
            println!("{yaml_buf}");
        }
        Commands::Kinematics {
            joint,
            range,
            output,
        } => {
            let kinematics = session.linear_kinematics(joint, &range.range())?;
            let units = kinematics.units.label();
            let mut wtr = csv_writer(output)?;
            for k in &kinematics.frames {
                wtr.serialize(KinematicsRow {
                    frame: k.frame_index,
                    time_s: k.frame_index as f64 * dt,
                    x: k.position.x,
                    y: k.position.y,
                    vx: k.velocity.x,
                    vy: k.velocity.y,
                    speed: k.speed,
                    ax: k.acceleration.x,
                    ay: k.acceleration.y,
                    acceleration: k.acceleration_magnitude,
                    units,
                })?;
            }
            wtr.flush()?;
            tracing::info!("wrote {} frames of {joint}", kinematics.frames.len());
        }
        Commands::Angles {
            angle,
            range,
            output,
        } => {
            let kinematics = session.angular_kinematics(angle, &range.range())?;
            let mut wtr = csv_writer(output)?;
            for k in &kinematics.frames {
                wtr.serialize(AngleRow {
                    frame: k.frame_index,
                    time_s: k.frame_index as f64 * dt,
                    degrees: k.angle_degrees,
                    velocity_deg_s: k.angular_velocity_deg_s,
                    acceleration_deg_s2: k.angular_accel_deg_s2,
                })?;
            }
            wtr.flush()?;
            tracing::info!("wrote {} frames of {angle}", kinematics.frames.len());
        }
        Commands::Trajectory {
            joint,
            reference,
            anchor_frame,
            range,
            output,
        } => {
            let projector = session.trajectories();
            let range = range.range();
            let trajectory = match (reference, anchor_frame) {
                (Some(reference), Some(anchor)) => {
                    projector.anchored_relative_trajectory(joint, reference, &range, *anchor)?
                }
                (Some(reference), None) => {
                    projector.relative_trajectory(joint, reference, &range)?
                }
                (None, _) => projector.absolute_trajectory(joint, &range)?,
            };
            let units = trajectory.units.label();
            let mut wtr = csv_writer(output)?;
            for p in &trajectory.points {
                wtr.serialize(TrajectoryRow {
                    frame: p.frame_index,
                    x: p.position.x,
                    y: p.position.y,
                    units,
                })?;
            }
            wtr.flush()?;
            tracing::info!(
                "path of {joint}: {} points, length {:.3} {units}",
                trajectory.points.len(),
                trajectory.path_length()
            );
        }
        Commands::Stats { joint, frame } => {
            let stats = session.frame_stats(joint, *frame)?;
            println!("{}", serde_yaml::to_string(&stats)?);
        }
        Commands::Select {
            frame,
            x,
            y,
            radius,
        } => match session
            .store()
            .nearest_joint(*frame, Point2::new(*x, *y), *radius)
        {
            Some(joint) => println!("{joint}"),
            None => eyre::bail!("no joint within {radius} px of ({x}, {y}) at frame {frame}"),
        },
        Commands::EngineCommand { .. } => {
            eyre::bail!("engine-command does not read analysis results")
        }
    }

    Ok(())
}
