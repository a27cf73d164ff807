//! Types shared between the Sports2D output parser and the kinematics
//! pipeline.
use serde::{Deserialize, Serialize};

use nalgebra::{Point2, Vector2};

mod series;
pub use series::{FrameIndexed, FrameOrderError, TimeSeries};

/// Suffix appended to the video file stem to form the engine's output directory.
pub const ANALYSIS_DIR_SUFFIX: &str = "_Sports2D";
/// Extension of the joint position tables.
pub const TRC_EXTENSION: &str = "trc";
/// Extension of the joint angle tables.
pub const MOT_EXTENSION: &str = "mot";

/// Length units of positions and everything derived from them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Units {
    #[default]
    Pixels,
    Meters,
}

impl Units {
    pub fn label(&self) -> &'static str {
        match self {
            Units::Pixels => "px",
            Units::Meters => "m",
        }
    }
}

impl std::fmt::Display for Units {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// An inclusive range of frame indices. `None` leaves that side unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FrameRange {
    pub start: Option<u64>,
    pub stop: Option<u64>,
}

impl FrameRange {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn new(start: u64, stop: u64) -> Self {
        Self {
            start: Some(start),
            stop: Some(stop),
        }
    }

    /// From `len` frames before `current` up to and including `current`,
    /// i.e. `len + 1` frames, or fewer near the start of the recording.
    ///
    /// A trail of length zero contains only `current`.
    pub fn trailing(current: u64, len: u64) -> Self {
        Self::new(current.saturating_sub(len), current)
    }

    pub fn contains(&self, frame: u64) -> bool {
        self.start.is_none_or(|start| start <= frame) && self.stop.is_none_or(|stop| frame <= stop)
    }
}

/// One tracked landmark at one frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct JointSample {
    pub frame_index: u64,
    pub x: f64,
    pub y: f64,
    /// Detection confidence in `[0, 1]`, if the source provides one.
    pub confidence: Option<f64>,
}

impl JointSample {
    pub fn position(&self) -> Point2<f64> {
        Point2::new(self.x, self.y)
    }

    /// `true` if both coordinates are finite.
    pub fn is_valid(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl FrameIndexed for JointSample {
    fn frame_index(&self) -> u64 {
        self.frame_index
    }
}

/// One joint or segment angle at one frame, in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AngleSample {
    pub frame_index: u64,
    pub degrees: f64,
}

impl FrameIndexed for AngleSample {
    fn frame_index(&self) -> u64 {
        self.frame_index
    }
}

/// A position after calibration (and possibly smoothing), ready to be
/// differentiated.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PositionSample {
    pub frame_index: u64,
    pub position: Point2<f64>,
}

impl FrameIndexed for PositionSample {
    fn frame_index(&self) -> u64 {
        self.frame_index
    }
}

/// Reference segment of known length used to convert pixels to meters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalibrationSpec {
    pub pixel_point_a: [f64; 2],
    pub pixel_point_b: [f64; 2],
    pub real_length_meters: f64,
}

impl CalibrationSpec {
    pub fn pixel_distance(&self) -> f64 {
        nalgebra::distance(
            &Point2::from(self.pixel_point_a),
            &Point2::from(self.pixel_point_b),
        )
    }
}

/// Linear kinematics of one joint at one frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KinematicFrame {
    pub frame_index: u64,
    pub position: Point2<f64>,
    pub velocity: Vector2<f64>,
    /// `|velocity|`
    pub speed: f64,
    pub acceleration: Vector2<f64>,
    /// `|acceleration|`
    pub acceleration_magnitude: f64,
}

/// Angular kinematics of one angle at one frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AngularKinematicFrame {
    pub frame_index: u64,
    pub angle_degrees: f64,
    pub angular_velocity_deg_s: f64,
    pub angular_accel_deg_s2: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearKinematics {
    pub joint: String,
    pub units: Units,
    pub frames: Vec<KinematicFrame>,
}

impl LinearKinematics {
    pub fn at_frame(&self, frame: u64) -> Option<&KinematicFrame> {
        self.frames
            .binary_search_by_key(&frame, |f| f.frame_index)
            .ok()
            .map(|idx| &self.frames[idx])
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AngularKinematics {
    pub angle: String,
    pub frames: Vec<AngularKinematicFrame>,
}

impl AngularKinematics {
    pub fn at_frame(&self, frame: u64) -> Option<&AngularKinematicFrame> {
        self.frames
            .binary_search_by_key(&frame, |f| f.frame_index)
            .ok()
            .map(|idx| &self.frames[idx])
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrajectoryPoint {
    pub frame_index: u64,
    pub position: Point2<f64>,
}

/// The path of one joint, either absolute or relative to a reference joint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trajectory {
    pub joint: String,
    /// The reference joint for a reference-centered path.
    pub reference: Option<String>,
    pub units: Units,
    pub points: Vec<TrajectoryPoint>,
}

impl Trajectory {
    /// Return a copy of this trajectory with every point shifted by `offset`.
    pub fn translated(&self, offset: Vector2<f64>) -> Self {
        Self {
            joint: self.joint.clone(),
            reference: self.reference.clone(),
            units: self.units,
            points: self
                .points
                .iter()
                .map(|p| TrajectoryPoint {
                    frame_index: p.frame_index,
                    position: p.position + offset,
                })
                .collect(),
        }
    }

    /// Sum of segment lengths between consecutive points.
    pub fn path_length(&self) -> f64 {
        self.points
            .windows(2)
            .map(|w| nalgebra::distance(&w[0].position, &w[1].position))
            .sum()
    }
}

/// Sports2D marker names and the angle that describes motion at that marker.
const MARKER_TO_ANGLE: &[(&str, &str)] = &[
    ("RAnkle", "right ankle"),
    ("LAnkle", "left ankle"),
    ("RKnee", "right knee"),
    ("LKnee", "left knee"),
    ("RHip", "right hip"),
    ("LHip", "left hip"),
    ("RShoulder", "right shoulder"),
    ("LShoulder", "left shoulder"),
    ("RElbow", "right elbow"),
    ("LElbow", "left elbow"),
    ("RWrist", "right forearm"),
    ("LWrist", "left forearm"),
    ("RBigToe", "right foot"),
    ("RSmallToe", "right foot"),
    ("RHeel", "right foot"),
    ("LBigToe", "left foot"),
    ("LSmallToe", "left foot"),
    ("LHeel", "left foot"),
    ("Hip", "pelvis"),
    ("Neck", "trunk"),
    ("Head", "head"),
    ("Nose", "head"),
];

/// Name of the angle column associated with a marker, if any.
pub fn angle_for_joint(joint: &str) -> Option<&'static str> {
    MARKER_TO_ANGLE
        .iter()
        .find(|(marker, _)| *marker == joint)
        .map(|(_, angle)| *angle)
}
