use std::{
    collections::BTreeSet,
    ffi::OsString,
    path::{Path, PathBuf},
    sync::{Arc, Mutex, PoisonError},
};

use serde::Serialize;

use sports2d_parser::AnalysisOutputPaths;

use crate::{Error, Result};

/// The command line that runs Sports2D on one video.
///
/// Only describes the command; starting the process is up to the caller.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EngineInvocation {
    pub program: PathBuf,
    pub video_path: PathBuf,
    pub slowmo_factor: f64,
}

impl EngineInvocation {
    pub const DEFAULT_PROGRAM: &'static str = "sports2d";

    pub fn new<P: Into<PathBuf>>(video_path: P, slowmo_factor: f64) -> Self {
        Self {
            program: PathBuf::from(Self::DEFAULT_PROGRAM),
            video_path: video_path.into(),
            slowmo_factor,
        }
    }

    pub fn with_program<P: Into<PathBuf>>(self, program: P) -> Self {
        Self {
            program: program.into(),
            ..self
        }
    }

    /// Arguments passed to the program.
    ///
    /// Gaps are filled with zeros so that the loader can recognize untracked
    /// frames, and angle values are not drawn on the output video.
    pub fn args(&self) -> Vec<OsString> {
        vec![
            "--video_input".into(),
            self.video_path.clone().into_os_string(),
            "--slowmo_factor".into(),
            self.slowmo_factor.to_string().into(),
            "--fill_large_gaps_with".into(),
            "zeros".into(),
            "--display_angle_values_on".into(),
            "none".into(),
        ]
    }

    /// The directory the program should run in.
    pub fn working_dir(&self) -> Option<&Path> {
        self.video_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
    }

    /// The full command line, for display.
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_os_str().to_os_string())
            .chain(self.args())
            .map(|a| a.to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// How an analysis run ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum AnalysisOutcome {
    Succeeded {
        video_path: PathBuf,
        output_dir: PathBuf,
    },
    Failed {
        message: String,
    },
}

impl AnalysisOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, AnalysisOutcome::Succeeded { .. })
    }

    /// Where to find the results of a successful run for `person_index`.
    pub fn output_paths(&self, person_index: u32) -> Result<Option<AnalysisOutputPaths>> {
        match self {
            AnalysisOutcome::Succeeded { video_path, .. } => Ok(Some(
                AnalysisOutputPaths::for_video_and_person(video_path, person_index)?,
            )),
            AnalysisOutcome::Failed { .. } => Ok(None),
        }
    }
}

type InFlight = Arc<Mutex<BTreeSet<PathBuf>>>;

/// Allows at most one analysis run per video at a time.
#[derive(Debug, Clone, Default)]
pub struct AnalysisRegistry {
    in_flight: InFlight,
}

impl AnalysisRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `video_path` for a new run.
    ///
    /// Fails with [`Error::AnalysisInProgress`] while another ticket for the
    /// same video is alive.
    pub fn try_begin<P: AsRef<Path>>(
        &self,
        video_path: P,
        slowmo_factor: f64,
    ) -> Result<AnalysisTicket> {
        let video_path = video_path.as_ref();
        if !(slowmo_factor.is_finite() && slowmo_factor > 0.0) {
            return Err(Error::Config(format!(
                "slow motion factor must be positive, got {slowmo_factor}"
            )));
        }
        let key = registry_key(video_path)?;
        {
            let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
            if !in_flight.insert(key.clone()) {
                return Err(Error::AnalysisInProgress(key));
            }
        }
        tracing::info!("starting analysis of {}", video_path.display());
        Ok(AnalysisTicket {
            key,
            invocation: EngineInvocation::new(video_path, slowmo_factor),
            in_flight: self.in_flight.clone(),
        })
    }

    pub fn is_running<P: AsRef<Path>>(&self, video_path: P) -> bool {
        let Ok(key) = registry_key(video_path.as_ref()) else {
            return false;
        };
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&key)
    }

    /// Videos with a live ticket.
    pub fn in_flight(&self) -> Vec<PathBuf> {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }
}

/// The same video reached through different relative paths or links maps to
/// one key.
fn registry_key(video_path: &Path) -> Result<PathBuf> {
    match std::fs::canonicalize(video_path) {
        Ok(p) => Ok(p),
        Err(_) => Ok(std::path::absolute(video_path)?),
    }
}

/// A claimed analysis slot. Dropping the ticket releases the slot.
#[derive(Debug)]
pub struct AnalysisTicket {
    key: PathBuf,
    invocation: EngineInvocation,
    in_flight: InFlight,
}

impl AnalysisTicket {
    pub fn video_path(&self) -> &Path {
        &self.invocation.video_path
    }

    pub fn invocation(&self) -> &EngineInvocation {
        &self.invocation
    }

    /// Record how the run ended and release the slot.
    ///
    /// A run reported as successful that left no output directory is turned
    /// into a failure.
    pub fn finish(self, result: std::result::Result<(), String>) -> AnalysisOutcome {
        let outcome = match result {
            Ok(()) => self.success_outcome(),
            Err(message) => AnalysisOutcome::Failed { message },
        };
        match &outcome {
            AnalysisOutcome::Succeeded { output_dir, .. } => {
                tracing::info!("analysis finished, results in {}", output_dir.display());
            }
            AnalysisOutcome::Failed { message } => {
                tracing::warn!(
                    "analysis of {} failed: {message}",
                    self.video_path().display()
                );
            }
        }
        outcome
    }

    fn success_outcome(&self) -> AnalysisOutcome {
        let paths = match AnalysisOutputPaths::for_video(self.video_path()) {
            Ok(paths) => paths,
            Err(e) => {
                return AnalysisOutcome::Failed {
                    message: e.to_string(),
                };
            }
        };
        if !paths.output_dir.is_dir() {
            return AnalysisOutcome::Failed {
                message: format!(
                    "no results found in {} after the analysis finished",
                    paths.output_dir.display()
                ),
            };
        }
        AnalysisOutcome::Succeeded {
            video_path: self.invocation.video_path.clone(),
            output_dir: paths.output_dir,
        }
    }
}

impl Drop for AnalysisTicket {
    fn drop(&mut self) {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.key);
    }
}
