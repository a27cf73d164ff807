use std::{
    collections::BTreeMap,
    fs::File,
    io::{BufRead, BufReader},
    path::Path,
};

use nalgebra::Point2;
use serde::{Deserialize, Serialize};

use motion_types::{AngleSample, JointSample, TimeSeries};

use crate::{AnalysisSource, Error, MotTable, Result, TrcTable, parse_mot, parse_trc};

/// Radius, in pixels, within which a click selects a joint.
pub const DEFAULT_SELECT_RADIUS_PX: f64 = 50.0;

/// Options applied while converting the raw tables into series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadOptions {
    /// Treat samples at exactly (0, 0) as untracked and store them as NaN.
    ///
    /// Sports2D fills large tracking gaps with zeros when run with
    /// `--fill_large_gaps_with zeros`.
    pub zeros_as_missing: bool,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            zeros_as_missing: true,
        }
    }
}

/// Per-joint position series and per-angle series of one analysis.
///
/// Built once, never modified afterwards.
#[derive(Debug, Clone)]
pub struct TimeSeriesStore {
    data_rate: f64,
    units: Option<String>,
    frames: Vec<u64>,
    joint_names: Vec<String>,
    joints: BTreeMap<String, TimeSeries<JointSample>>,
    metric_joints: Option<BTreeMap<String, TimeSeries<JointSample>>>,
    angles: BTreeMap<String, TimeSeries<AngleSample>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JointSummary {
    pub name: String,
    pub num_valid_samples: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreSummary {
    pub data_rate: f64,
    pub frame_count: usize,
    pub frame_limits: Option<[u64; 2]>,
    pub units: Option<String>,
    pub joints: Vec<JointSummary>,
    pub angles: Vec<String>,
    pub has_metric_positions: bool,
}

fn open<P: AsRef<Path>>(path: P) -> Result<BufReader<File>> {
    let path = path.as_ref();
    let fd = File::open(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => Error::NotFound(path.display().to_string()),
        _ => Error::from(e),
    })?;
    Ok(BufReader::new(fd))
}

impl TimeSeriesStore {
    pub fn load(source: &AnalysisSource, options: LoadOptions) -> Result<Self> {
        tracing::debug!("loading positions from {}", source.pixel_positions.display());
        let positions = parse_trc(open(&source.pixel_positions)?)?;
        let metric = match &source.metric_positions {
            Some(path) => {
                tracing::debug!("loading metric positions from {}", path.display());
                Some(parse_trc(open(path)?)?)
            }
            None => None,
        };
        let angles = match &source.angles {
            Some(path) => {
                tracing::debug!("loading angles from {}", path.display());
                Some(parse_mot(open(path)?)?)
            }
            None => None,
        };
        Self::from_tables(positions, metric, angles, options)
    }

    /// Parse a pixel position table and an optional angle table.
    pub fn from_readers<R, M>(positions: R, angles: Option<M>, options: LoadOptions) -> Result<Self>
    where
        R: BufRead,
        M: BufRead,
    {
        let positions = parse_trc(positions)?;
        let angles = angles.map(parse_mot).transpose()?;
        Self::from_tables(positions, None, angles, options)
    }

    /// Assemble a store from already parsed tables.
    ///
    /// Angle rows are matched to position rows by row number: angle row `i`
    /// gets the frame index of position row `i`. Angle rows without a
    /// matching position row are dropped.
    pub fn from_tables(
        positions: TrcTable,
        metric: Option<TrcTable>,
        angles: Option<MotTable>,
        options: LoadOptions,
    ) -> Result<Self> {
        let joints = joint_series(&positions, options)?;
        let metric_joints = match &metric {
            Some(table) => Some(joint_series(table, options)?),
            None => None,
        };

        let mut angle_map = BTreeMap::new();
        if let Some(table) = angles {
            if table.num_rows() > positions.num_rows() {
                tracing::warn!(
                    "dropping {} angle rows without matching position rows",
                    table.num_rows() - positions.num_rows()
                );
            }
            for (name, column) in table.angle_names.into_iter().zip(table.columns) {
                let samples = positions
                    .frames
                    .iter()
                    .zip(column)
                    .map(|(&frame_index, degrees)| AngleSample {
                        frame_index,
                        degrees,
                    })
                    .collect();
                let series = TimeSeries::new(name.clone(), samples)?;
                if angle_map.insert(name.clone(), series).is_some() {
                    return Err(Error::Format(format!("duplicate angle column \"{name}\"")));
                }
            }
        }

        tracing::debug!(
            "loaded {} joints and {} angles over {} frames at {} Hz",
            joints.len(),
            angle_map.len(),
            positions.num_rows(),
            positions.header.data_rate
        );

        Ok(Self {
            data_rate: positions.header.data_rate,
            units: positions.header.units,
            frames: positions.frames,
            joint_names: positions.marker_names,
            joints,
            metric_joints,
            angles: angle_map,
        })
    }

    /// The frame rate declared by the position table, in Hz.
    pub fn data_rate(&self) -> f64 {
        self.data_rate
    }

    /// Units declared by the position table header, if any.
    pub fn units(&self) -> Option<&str> {
        self.units.as_deref()
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    pub fn frame_limits(&self) -> Option<[u64; 2]> {
        match (self.frames.first(), self.frames.last()) {
            (Some(&first), Some(&last)) => Some([first, last]),
            _ => None,
        }
    }

    /// Joint names in file order.
    pub fn joint_names(&self) -> &[String] {
        &self.joint_names
    }

    pub fn angle_names(&self) -> impl Iterator<Item = &str> {
        self.angles.keys().map(String::as_str)
    }

    pub fn has_metric_positions(&self) -> bool {
        self.metric_joints.is_some()
    }

    pub fn series_for(&self, joint: &str) -> Result<&TimeSeries<JointSample>> {
        self.joints
            .get(joint)
            .ok_or_else(|| Error::NotFound(joint.to_string()))
    }

    /// Positions of `joint` as calibrated by Sports2D itself.
    pub fn metric_series_for(&self, joint: &str) -> Result<&TimeSeries<JointSample>> {
        self.metric_joints
            .as_ref()
            .and_then(|m| m.get(joint))
            .ok_or_else(|| Error::NotFound(format!("{joint} (metric positions)")))
    }

    pub fn angle_series_for(&self, angle: &str) -> Result<&TimeSeries<AngleSample>> {
        self.angles
            .get(angle)
            .ok_or_else(|| Error::NotFound(angle.to_string()))
    }

    /// The joint closest to `point` at `frame`, if any valid joint lies
    /// within `max_distance` pixels.
    pub fn nearest_joint(&self, frame: u64, point: Point2<f64>, max_distance: f64) -> Option<&str> {
        let mut best = None;
        let mut best_distance = max_distance;
        for name in self.joint_names.iter() {
            let Some(sample) = self.joints[name].get(frame) else {
                continue;
            };
            if !sample.is_valid() {
                continue;
            }
            let d = nalgebra::distance(&sample.position(), &point);
            if d < best_distance {
                best_distance = d;
                best = Some(name.as_str());
            }
        }
        best
    }

    pub fn summary(&self) -> StoreSummary {
        StoreSummary {
            data_rate: self.data_rate,
            frame_count: self.frame_count(),
            frame_limits: self.frame_limits(),
            units: self.units.clone(),
            joints: self
                .joint_names
                .iter()
                .map(|name| JointSummary {
                    name: name.clone(),
                    num_valid_samples: self.joints[name]
                        .samples()
                        .iter()
                        .filter(|s| s.is_valid())
                        .count(),
                })
                .collect(),
            angles: self.angles.keys().cloned().collect(),
            has_metric_positions: self.has_metric_positions(),
        }
    }
}

fn joint_series(
    table: &TrcTable,
    options: LoadOptions,
) -> Result<BTreeMap<String, TimeSeries<JointSample>>> {
    let mut result = BTreeMap::new();
    for (i, name) in table.marker_names.iter().enumerate() {
        let samples = table
            .frames
            .iter()
            .zip(table.xs[i].iter().zip(table.ys[i].iter()))
            .map(|(&frame_index, (&x, &y))| {
                let (x, y) = if options.zeros_as_missing && x == 0.0 && y == 0.0 {
                    (f64::NAN, f64::NAN)
                } else {
                    (x, y)
                };
                JointSample {
                    frame_index,
                    x,
                    y,
                    confidence: None,
                }
            })
            .collect();
        result.insert(name.clone(), TimeSeries::new(name.clone(), samples)?);
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn store_is_shareable() {
        assert_send_sync::<TimeSeriesStore>();
    }
}
