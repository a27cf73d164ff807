use std::path::{Path, PathBuf};

use motion_types::{ANALYSIS_DIR_SUFFIX, MOT_EXTENSION, TRC_EXTENSION};

use crate::{Error, Result};

/// Where Sports2D puts its results for one video and one tracked person.
///
/// For `/data/jump.mp4` the results live in `/data/jump_Sports2D/`, with
/// files such as `jump_Sports2D_px_person00.trc`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisOutputPaths {
    pub output_dir: PathBuf,
    pub pixel_positions: PathBuf,
    pub metric_positions: PathBuf,
    pub angles: PathBuf,
}

impl AnalysisOutputPaths {
    pub fn for_video<P: AsRef<Path>>(video_path: P) -> Result<Self> {
        Self::for_video_and_person(video_path, 0)
    }

    pub fn for_video_and_person<P: AsRef<Path>>(video_path: P, person_index: u32) -> Result<Self> {
        let video_path = video_path.as_ref();
        let stem = video_path
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| {
                Error::NotFound(format!("file stem of video {}", video_path.display()))
            })?;
        let parent = video_path.parent().unwrap_or_else(|| Path::new(""));
        let base = format!("{stem}{ANALYSIS_DIR_SUFFIX}");
        let output_dir = parent.join(&base);
        let person = format!("person{person_index:02}");
        Ok(Self {
            pixel_positions: output_dir.join(format!("{base}_px_{person}.{TRC_EXTENSION}")),
            metric_positions: output_dir.join(format!("{base}_m_{person}.{TRC_EXTENSION}")),
            angles: output_dir.join(format!("{base}_angles_{person}.{MOT_EXTENSION}")),
            output_dir,
        })
    }
}

/// The set of files to load into a store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisSource {
    pub pixel_positions: PathBuf,
    pub metric_positions: Option<PathBuf>,
    pub angles: Option<PathBuf>,
}

impl AnalysisSource {
    pub fn from_positions<P: Into<PathBuf>>(pixel_positions: P) -> Self {
        Self {
            pixel_positions: pixel_positions.into(),
            metric_positions: None,
            angles: None,
        }
    }

    /// Keep the files of `paths` that exist. The pixel position table is
    /// required.
    pub fn discover(paths: &AnalysisOutputPaths) -> Result<Self> {
        if !paths.pixel_positions.is_file() {
            return Err(Error::NotFound(paths.pixel_positions.display().to_string()));
        }
        let existing = |p: &PathBuf| p.is_file().then(|| p.clone());
        let source = Self {
            pixel_positions: paths.pixel_positions.clone(),
            metric_positions: existing(&paths.metric_positions),
            angles: existing(&paths.angles),
        };
        tracing::debug!(
            "discovered analysis in {}: metric positions {}, angles {}",
            paths.output_dir.display(),
            source.metric_positions.is_some(),
            source.angles.is_some()
        );
        Ok(source)
    }
}
