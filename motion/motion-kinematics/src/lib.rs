//! Turn the raw joint tracks of a Sports2D analysis into motion signals.
//!
//! Positions are optionally converted to meters ([`CalibrationTransform`]),
//! smoothed with a Savitzky–Golay filter ([`SavitzkyGolay`]) and
//! differentiated by finite differences ([`derive_linear`],
//! [`derive_angular`]). [`TrajectoryProjector`] builds absolute and
//! reference-centered paths. [`AnalysisSession`] ties these together for one
//! loaded analysis.
//!
//! Everything here is a pure function of its inputs. Results are new values;
//! nothing is cached.

use std::path::PathBuf;

mod analysis;
mod calibration;
mod derive;
mod session;
mod smoothing;
mod trajectory;

pub use analysis::{AnalysisOutcome, AnalysisRegistry, AnalysisTicket, EngineInvocation};
pub use calibration::{CalibrationTransform, MIN_REFERENCE_PIXELS};
pub use derive::{Timebase, derive_angular, derive_linear, gradient};
pub use session::{AnalysisSession, FrameStats, SessionConfig, parse_config_file};
pub use smoothing::{SavitzkyGolay, SmoothingConfig, smooth};
pub use trajectory::TrajectoryProjector;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("format error: {0}")]
    Format(String),
    #[error("\"{0}\" not found")]
    NotFound(String),
    #[error("invalid calibration: {0}")]
    InvalidCalibration(String),
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("reference joint \"{reference}\" of \"{joint}\" is missing at frame {frame}")]
    MissingReference {
        joint: String,
        reference: String,
        frame: u64,
    },
    #[error("an analysis of {} is already running", .0.display())]
    AnalysisInProgress(PathBuf),
    #[error(transparent)]
    Parser(sports2d_parser::Error),
    #[error("IO error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
    #[error("TOML error: {source}")]
    Toml {
        #[from]
        source: toml::de::Error,
    },
}

impl From<sports2d_parser::Error> for Error {
    fn from(orig: sports2d_parser::Error) -> Self {
        match orig {
            sports2d_parser::Error::Format(msg) => Error::Format(msg),
            sports2d_parser::Error::NotFound(name) => Error::NotFound(name),
            other => Error::Parser(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
