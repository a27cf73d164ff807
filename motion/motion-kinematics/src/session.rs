use std::{path::Path, sync::Arc};

use nalgebra::Point2;
use serde::{Deserialize, Serialize};

use motion_types::{
    AngleSample, AngularKinematics, CalibrationSpec, FrameRange, LinearKinematics, PositionSample,
    Units, angle_for_joint,
};
use sports2d_parser::{AnalysisOutputPaths, AnalysisSource, LoadOptions, TimeSeriesStore};

use crate::{
    CalibrationTransform, Result, SmoothingConfig, Timebase, TrajectoryProjector,
    derive::{derive_angular_with, derive_linear_with},
    smoothing::{SavitzkyGolay, smooth_runs},
};

/// Settings for loading and analyzing one Sports2D result, read from TOML.
///
/// ```toml
/// slowmo_factor = 4.0
///
/// [smoothing]
/// window_length = 9
///
/// [calibration]
/// pixel_point_a = [120.0, 610.0]
/// pixel_point_b = [480.0, 610.0]
/// real_length_meters = 1.5
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// How many times slower the video plays than the real motion.
    pub slowmo_factor: f64,
    /// Use this frame rate instead of the `DataRate` of the position table.
    pub frame_rate_hz: Option<f64>,
    pub smoothing: SmoothingConfig,
    pub calibration: Option<CalibrationSpec>,
    pub zeros_as_missing: bool,
    /// Which tracked person to load.
    pub person_index: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            slowmo_factor: 1.0,
            frame_rate_hz: None,
            smoothing: SmoothingConfig::default(),
            calibration: None,
            zeros_as_missing: true,
            person_index: 0,
        }
    }
}

impl SessionConfig {
    pub fn load_options(&self) -> LoadOptions {
        LoadOptions {
            zeros_as_missing: self.zeros_as_missing,
        }
    }

    pub fn calibration_transform(&self) -> Result<CalibrationTransform> {
        match &self.calibration {
            Some(spec) => CalibrationTransform::from_spec(spec),
            None => Ok(CalibrationTransform::identity()),
        }
    }
}

/// Parse a `.toml` file and return a [SessionConfig].
pub fn parse_config_file<P: AsRef<Path>>(fname: P) -> Result<SessionConfig> {
    let contents = std::fs::read_to_string(fname.as_ref())?;
    let cfg: SessionConfig = toml::from_str(&contents)?;
    Ok(cfg)
}

/// Values of one joint at one frame, for display next to the video.
///
/// Values that are missing or not finite are `None`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrameStats {
    pub joint: String,
    pub frame_index: u64,
    pub units: Units,
    pub position: Option<Point2<f64>>,
    pub speed: Option<f64>,
    pub acceleration_magnitude: Option<f64>,
    pub angle: Option<String>,
    pub angle_degrees: Option<f64>,
    pub angular_velocity_deg_s: Option<f64>,
    pub angular_accel_deg_s2: Option<f64>,
}

fn finite(v: f64) -> Option<f64> {
    v.is_finite().then_some(v)
}

/// One loaded analysis together with the parameters used to derive
/// kinematics from it.
///
/// Sessions are immutable. The `with_*` methods return a new session
/// sharing the same store.
#[derive(Debug, Clone)]
pub struct AnalysisSession {
    store: Arc<TimeSeriesStore>,
    calibration: CalibrationTransform,
    smoothing: SmoothingConfig,
    filter: Option<SavitzkyGolay>,
    timebase: Timebase,
}

impl AnalysisSession {
    /// Pixels, default smoothing, real time playback.
    pub fn new(store: Arc<TimeSeriesStore>) -> Result<Self> {
        Self::from_config(store, &SessionConfig::default())
    }

    pub fn from_config(store: Arc<TimeSeriesStore>, config: &SessionConfig) -> Result<Self> {
        let frame_rate_hz = config.frame_rate_hz.unwrap_or(store.data_rate());
        Ok(Self {
            timebase: Timebase::new(frame_rate_hz, config.slowmo_factor)?,
            calibration: config.calibration_transform()?,
            smoothing: config.smoothing,
            filter: config.smoothing.filter()?,
            store,
        })
    }

    /// Load the analysis Sports2D wrote for `video_path`.
    pub fn open_video<P: AsRef<Path>>(video_path: P, config: &SessionConfig) -> Result<Self> {
        let paths = AnalysisOutputPaths::for_video_and_person(video_path, config.person_index)?;
        let source = AnalysisSource::discover(&paths)?;
        let store = TimeSeriesStore::load(&source, config.load_options())?;
        tracing::debug!(
            "opened analysis in {} ({} frames)",
            paths.output_dir.display(),
            store.frame_count()
        );
        Self::from_config(Arc::new(store), config)
    }

    pub fn with_calibration(&self, calibration: CalibrationTransform) -> Self {
        Self {
            calibration,
            ..self.clone()
        }
    }

    pub fn with_smoothing(&self, smoothing: SmoothingConfig) -> Result<Self> {
        Ok(Self {
            smoothing,
            filter: smoothing.filter()?,
            ..self.clone()
        })
    }

    pub fn with_slowmo_factor(&self, slowmo_factor: f64) -> Result<Self> {
        Ok(Self {
            timebase: Timebase::new(self.timebase.frame_rate_hz(), slowmo_factor)?,
            ..self.clone()
        })
    }

    pub fn with_frame_rate(&self, frame_rate_hz: f64) -> Result<Self> {
        Ok(Self {
            timebase: Timebase::new(frame_rate_hz, self.timebase.slowmo_factor())?,
            ..self.clone()
        })
    }

    pub fn store(&self) -> &Arc<TimeSeriesStore> {
        &self.store
    }

    pub fn calibration(&self) -> &CalibrationTransform {
        &self.calibration
    }

    pub fn smoothing(&self) -> &SmoothingConfig {
        &self.smoothing
    }

    pub fn timebase(&self) -> &Timebase {
        &self.timebase
    }

    pub fn units(&self) -> Units {
        self.calibration.units()
    }

    fn pre_filter(&self) -> Option<&SavitzkyGolay> {
        self.filter
            .as_ref()
            .filter(|_| self.smoothing.smooth_positions)
    }

    fn post_filter(&self) -> Option<&SavitzkyGolay> {
        self.filter
            .as_ref()
            .filter(|_| self.smoothing.smooth_derivatives)
    }

    /// Calibrated and, if configured, smoothed positions of `joint` over
    /// the whole recording.
    pub fn positions(&self, joint: &str) -> Result<Vec<PositionSample>> {
        let series = self.store.series_for(joint)?;
        let frames: Vec<u64> = series.frames().collect();
        let calibrated: Vec<_> = series
            .samples()
            .iter()
            .map(|s| self.calibration.apply(&s.position()))
            .collect();
        let xs: Vec<f64> = calibrated.iter().map(|p| p.x).collect();
        let ys: Vec<f64> = calibrated.iter().map(|p| p.y).collect();
        let xs = smooth_runs(self.pre_filter(), &frames, &xs, joint);
        let ys = smooth_runs(self.pre_filter(), &frames, &ys, joint);
        Ok(frames
            .into_iter()
            .zip(xs.into_iter().zip(ys))
            .map(|(frame_index, (x, y))| PositionSample {
                frame_index,
                position: Point2::new(x, y),
            })
            .collect())
    }

    /// Velocity and acceleration of `joint` at the frames in `range`.
    ///
    /// Smoothing and differentiation run over the whole recording before
    /// the range is applied, so results do not depend on the range.
    pub fn linear_kinematics(&self, joint: &str, range: &FrameRange) -> Result<LinearKinematics> {
        let positions = self.positions(joint)?;
        let frames = derive_linear_with(&positions, &self.timebase, self.post_filter())
            .into_iter()
            .filter(|f| range.contains(f.frame_index))
            .collect();
        Ok(LinearKinematics {
            joint: joint.to_string(),
            units: self.units(),
            frames,
        })
    }

    pub fn angular_kinematics(&self, angle: &str, range: &FrameRange) -> Result<AngularKinematics> {
        let series = self.store.angle_series_for(angle)?;
        let frames: Vec<u64> = series.frames().collect();
        let degrees: Vec<f64> = series.samples().iter().map(|s| s.degrees).collect();
        let degrees = smooth_runs(self.pre_filter(), &frames, &degrees, angle);
        let samples: Vec<AngleSample> = frames
            .into_iter()
            .zip(degrees)
            .map(|(frame_index, degrees)| AngleSample {
                frame_index,
                degrees,
            })
            .collect();
        let frames = derive_angular_with(&samples, &self.timebase, self.post_filter())
            .into_iter()
            .filter(|f| range.contains(f.frame_index))
            .collect();
        Ok(AngularKinematics {
            angle: angle.to_string(),
            frames,
        })
    }

    /// Angular kinematics of the angle associated with `joint`, if the joint
    /// has one and the analysis contains it.
    pub fn joint_angle_kinematics(
        &self,
        joint: &str,
        range: &FrameRange,
    ) -> Result<Option<AngularKinematics>> {
        let Some(angle) = angle_for_joint(joint) else {
            return Ok(None);
        };
        if self.store.angle_series_for(angle).is_err() {
            tracing::debug!("no \"{angle}\" column for joint {joint}");
            return Ok(None);
        }
        self.angular_kinematics(angle, range).map(Some)
    }

    pub fn trajectories(&self) -> TrajectoryProjector<'_> {
        TrajectoryProjector::new(&self.store, &self.calibration)
    }

    /// Position, speed, acceleration and angle values of `joint` at `frame`.
    ///
    /// If the joint was not tracked at `frame`, every value is `None`.
    pub fn frame_stats(&self, joint: &str, frame: u64) -> Result<FrameStats> {
        let mut stats = FrameStats {
            joint: joint.to_string(),
            frame_index: frame,
            units: self.units(),
            position: None,
            speed: None,
            acceleration_magnitude: None,
            angle: None,
            angle_degrees: None,
            angular_velocity_deg_s: None,
            angular_accel_deg_s2: None,
        };
        let tracked = self
            .store
            .series_for(joint)?
            .get(frame)
            .is_some_and(|s| s.is_valid());
        if !tracked {
            return Ok(stats);
        }

        let range = FrameRange::new(frame, frame);
        if let Some(k) = self.linear_kinematics(joint, &range)?.at_frame(frame) {
            stats.position = Some(k.position).filter(|p| p.x.is_finite() && p.y.is_finite());
            stats.speed = finite(k.speed);
            stats.acceleration_magnitude = finite(k.acceleration_magnitude);
        }
        if let Some(angular) = self.joint_angle_kinematics(joint, &range)? {
            if let Some(a) = angular.at_frame(frame) {
                stats.angle_degrees = finite(a.angle_degrees);
                stats.angular_velocity_deg_s = finite(a.angular_velocity_deg_s);
                stats.angular_accel_deg_s2 = finite(a.angular_accel_deg_s2);
            }
            stats.angle = Some(angular.angle);
        }
        Ok(stats)
    }
}
