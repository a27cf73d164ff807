use nalgebra::Point2;

use motion_types::{FrameRange, JointSample, Trajectory, TrajectoryPoint};
use sports2d_parser::TimeSeriesStore;

use crate::{CalibrationTransform, Error, Result};

/// Builds joint paths from a store, in calibrated units.
///
/// Frames at which the joint itself was not tracked are left out of every
/// path.
#[derive(Debug, Clone, Copy)]
pub struct TrajectoryProjector<'a> {
    store: &'a TimeSeriesStore,
    calibration: CalibrationTransform,
}

impl<'a> TrajectoryProjector<'a> {
    pub fn new(store: &'a TimeSeriesStore, calibration: &CalibrationTransform) -> Self {
        Self {
            store,
            calibration: *calibration,
        }
    }

    fn valid_samples(&self, joint: &str, range: &FrameRange) -> Result<Vec<&'a JointSample>> {
        Ok(self
            .store
            .series_for(joint)?
            .in_range(range)
            .iter()
            .filter(|s| s.is_valid())
            .collect())
    }

    pub fn absolute_trajectory(&self, joint: &str, range: &FrameRange) -> Result<Trajectory> {
        let points = self
            .valid_samples(joint, range)?
            .into_iter()
            .map(|s| TrajectoryPoint {
                frame_index: s.frame_index,
                position: self.calibration.apply(&s.position()),
            })
            .collect();
        Ok(Trajectory {
            joint: joint.to_string(),
            reference: None,
            units: self.calibration.units(),
            points,
        })
    }

    /// Path of `joint` minus the position of `reference` at the same frame.
    ///
    /// Fails at the first frame where `joint` was tracked but `reference`
    /// was not.
    pub fn relative_trajectory(
        &self,
        joint: &str,
        reference: &str,
        range: &FrameRange,
    ) -> Result<Trajectory> {
        let reference_series = self.store.series_for(reference)?;
        let points = self
            .valid_samples(joint, range)?
            .into_iter()
            .map(|s| {
                let frame_index = s.frame_index;
                let r = reference_series
                    .get(frame_index)
                    .filter(|r| r.is_valid())
                    .ok_or_else(|| Error::MissingReference {
                        joint: joint.to_string(),
                        reference: reference.to_string(),
                        frame: frame_index,
                    })?;
                Ok(TrajectoryPoint {
                    frame_index,
                    position: self
                        .calibration
                        .apply(&Point2::from(s.position() - r.position())),
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Trajectory {
            joint: joint.to_string(),
            reference: Some(reference.to_string()),
            units: self.calibration.units(),
            points,
        })
    }

    /// The relative path placed at the position of `reference` at
    /// `anchor_frame`, e.g. a hip-centered trail drawn around the current
    /// hip position.
    pub fn anchored_relative_trajectory(
        &self,
        joint: &str,
        reference: &str,
        range: &FrameRange,
        anchor_frame: u64,
    ) -> Result<Trajectory> {
        let anchor = self
            .store
            .series_for(reference)?
            .get(anchor_frame)
            .filter(|r| r.is_valid())
            .ok_or_else(|| Error::MissingReference {
                joint: joint.to_string(),
                reference: reference.to_string(),
                frame: anchor_frame,
            })?;
        let relative = self.relative_trajectory(joint, reference, range)?;
        Ok(relative.translated(self.calibration.apply(&anchor.position()).coords))
    }
}
