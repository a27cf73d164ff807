use nalgebra::Vector2;

use motion_types::{
    AngleSample, AngularKinematicFrame, FrameIndexed, KinematicFrame, PositionSample,
};

use crate::{
    Error, Result,
    smoothing::{SavitzkyGolay, smooth_runs},
};

/// Converts derivatives per frame into derivatives per second of real time.
///
/// A video recorded at `frame_rate_hz` and played back `slowmo_factor` times
/// slower spans `slowmo_factor / frame_rate_hz` seconds per frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Timebase {
    frame_rate_hz: f64,
    slowmo_factor: f64,
}

impl Timebase {
    pub fn new(frame_rate_hz: f64, slowmo_factor: f64) -> Result<Self> {
        if !(frame_rate_hz.is_finite() && frame_rate_hz > 0.0) {
            return Err(Error::Config(format!(
                "frame rate must be positive, got {frame_rate_hz}"
            )));
        }
        if !(slowmo_factor.is_finite() && slowmo_factor > 0.0) {
            return Err(Error::Config(format!(
                "slow motion factor must be positive, got {slowmo_factor}"
            )));
        }
        Ok(Self {
            frame_rate_hz,
            slowmo_factor,
        })
    }

    pub fn frame_rate_hz(&self) -> f64 {
        self.frame_rate_hz
    }

    pub fn slowmo_factor(&self) -> f64 {
        self.slowmo_factor
    }

    /// Seconds per frame.
    pub fn dt(&self) -> f64 {
        self.slowmo_factor / self.frame_rate_hz
    }

    /// Divide a per-frame derivative by [`Self::dt`].
    fn per_second(&self, per_frame: Vec<f64>) -> Vec<f64> {
        let dt = self.dt();
        per_frame.into_iter().map(|v| v / dt).collect()
    }
}

/// Derivative of `values` with respect to frame index.
///
/// Interior points use second order central differences, the two end points
/// second order one-sided differences. Gaps in `frames` are handled with the
/// non-uniform spacing form of the same stencils. With exactly two samples
/// both outputs are the first order difference. Fewer than two samples give
/// an empty result.
///
/// Panics if `frames` and `values` differ in length.
pub fn gradient(frames: &[u64], values: &[f64]) -> Vec<f64> {
    assert_eq!(frames.len(), values.len());
    let n = values.len();
    if n < 2 {
        return Vec::new();
    }
    let f: Vec<f64> = frames.iter().map(|&f| f as f64).collect();
    let v = values;

    if n == 2 {
        let d = (v[1] - v[0]) / (f[1] - f[0]);
        return vec![d, d];
    }

    let mut result = Vec::with_capacity(n);

    let (h1, h2) = (f[1] - f[0], f[2] - f[1]);
    result.push(if h1 == h2 {
        (-3.0 * v[0] + 4.0 * v[1] - v[2]) / (2.0 * h1)
    } else {
        let a = -(2.0 * h1 + h2) / (h1 * (h1 + h2));
        let b = (h1 + h2) / (h1 * h2);
        let c = -h1 / (h2 * (h1 + h2));
        a * v[0] + b * v[1] + c * v[2]
    });

    for i in 1..n - 1 {
        let (h1, h2) = (f[i] - f[i - 1], f[i + 1] - f[i]);
        result.push(if h1 == h2 {
            (v[i + 1] - v[i - 1]) / (2.0 * h1)
        } else {
            let a = -h2 / (h1 * (h1 + h2));
            let b = (h2 - h1) / (h1 * h2);
            let c = h1 / (h2 * (h1 + h2));
            a * v[i - 1] + b * v[i] + c * v[i + 1]
        });
    }

    let (h1, h2) = (f[n - 2] - f[n - 3], f[n - 1] - f[n - 2]);
    result.push(if h1 == h2 {
        (v[n - 3] - 4.0 * v[n - 2] + 3.0 * v[n - 1]) / (2.0 * h1)
    } else {
        let a = h2 / (h1 * (h1 + h2));
        let b = -(h1 + h2) / (h1 * h2);
        let c = (2.0 * h2 + h1) / (h2 * (h1 + h2));
        a * v[n - 3] + b * v[n - 2] + c * v[n - 1]
    });

    result
}

/// Samples must have strictly increasing frame indices.
fn check_frame_order<S: FrameIndexed>(samples: &[S]) -> Result<()> {
    match samples
        .windows(2)
        .find(|w| w[1].frame_index() <= w[0].frame_index())
    {
        Some(w) => Err(Error::Config(format!(
            "frame {} does not follow frame {}",
            w[1].frame_index(),
            w[0].frame_index()
        ))),
        None => Ok(()),
    }
}

/// Velocity and acceleration of a position series.
///
/// Fails with [`Error::Config`] unless frame indices strictly increase.
pub fn derive_linear(
    samples: &[PositionSample],
    frame_rate_hz: f64,
    slowmo_factor: f64,
) -> Result<Vec<KinematicFrame>> {
    let timebase = Timebase::new(frame_rate_hz, slowmo_factor)?;
    check_frame_order(samples)?;
    Ok(derive_linear_with(samples, &timebase, None))
}

/// Like [`derive_linear`], optionally smoothing each derivative component.
pub(crate) fn derive_linear_with(
    samples: &[PositionSample],
    timebase: &Timebase,
    post_filter: Option<&SavitzkyGolay>,
) -> Vec<KinematicFrame> {
    if samples.len() < 2 {
        return Vec::new();
    }
    let frames: Vec<u64> = samples.iter().map(|s| s.frame_index).collect();
    let xs: Vec<f64> = samples.iter().map(|s| s.position.x).collect();
    let ys: Vec<f64> = samples.iter().map(|s| s.position.y).collect();

    let derivative = |values: &[f64], what: &str| -> Vec<f64> {
        let d = timebase.per_second(gradient(&frames, values));
        smooth_runs(post_filter, &frames, &d, what)
    };

    let vx = derivative(&xs, "x velocity");
    let vy = derivative(&ys, "y velocity");
    let ax = derivative(&vx, "x acceleration");
    let ay = derivative(&vy, "y acceleration");

    samples
        .iter()
        .enumerate()
        .map(|(i, s)| {
            let velocity = Vector2::new(vx[i], vy[i]);
            let acceleration = Vector2::new(ax[i], ay[i]);
            KinematicFrame {
                frame_index: s.frame_index,
                position: s.position,
                velocity,
                speed: velocity.norm(),
                acceleration,
                acceleration_magnitude: acceleration.norm(),
            }
        })
        .collect()
}

/// Angular velocity and acceleration of an angle series, in deg/s and deg/s².
///
/// Fails with [`Error::Config`] unless frame indices strictly increase.
pub fn derive_angular(
    samples: &[AngleSample],
    frame_rate_hz: f64,
    slowmo_factor: f64,
) -> Result<Vec<AngularKinematicFrame>> {
    let timebase = Timebase::new(frame_rate_hz, slowmo_factor)?;
    check_frame_order(samples)?;
    Ok(derive_angular_with(samples, &timebase, None))
}

pub(crate) fn derive_angular_with(
    samples: &[AngleSample],
    timebase: &Timebase,
    post_filter: Option<&SavitzkyGolay>,
) -> Vec<AngularKinematicFrame> {
    if samples.len() < 2 {
        return Vec::new();
    }
    let frames: Vec<u64> = samples.iter().map(|s| s.frame_index).collect();
    let degrees: Vec<f64> = samples.iter().map(|s| s.degrees).collect();

    let velocity = smooth_runs(
        post_filter,
        &frames,
        &timebase.per_second(gradient(&frames, &degrees)),
        "angular velocity",
    );
    let accel = smooth_runs(
        post_filter,
        &frames,
        &timebase.per_second(gradient(&frames, &velocity)),
        "angular acceleration",
    );

    samples
        .iter()
        .zip(velocity.into_iter().zip(accel))
        .map(|(s, (angular_velocity_deg_s, angular_accel_deg_s2))| AngularKinematicFrame {
            frame_index: s.frame_index,
            angle_degrees: s.degrees,
            angular_velocity_deg_s,
            angular_accel_deg_s2,
        })
        .collect()
}
