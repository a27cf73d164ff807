use nalgebra::Point2;
use serde::{Deserialize, Serialize};

use motion_types::{CalibrationSpec, Units};

use crate::{Error, Result};

/// Reference segments shorter than this, in pixels, are rejected.
pub const MIN_REFERENCE_PIXELS: f64 = 1.0;

/// Maps pixel coordinates to output units.
///
/// The mapping is a uniform isotropic scale about the image origin. Camera
/// rotation, perspective and lens distortion are not modeled, so distances
/// are only meaningful in the plane of the reference segment.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalibrationTransform {
    /// Output units per pixel.
    scale: f64,
    units: Units,
}

impl Default for CalibrationTransform {
    fn default() -> Self {
        Self::identity()
    }
}

impl CalibrationTransform {
    /// Keep pixels.
    pub fn identity() -> Self {
        Self {
            scale: 1.0,
            units: Units::Pixels,
        }
    }

    /// Calibrate from two image points `real_length_meters` apart.
    pub fn from_reference(
        a: Point2<f64>,
        b: Point2<f64>,
        real_length_meters: f64,
    ) -> Result<Self> {
        if !(real_length_meters.is_finite() && real_length_meters > 0.0) {
            return Err(Error::InvalidCalibration(format!(
                "reference length must be positive, got {real_length_meters}"
            )));
        }
        let pixels = nalgebra::distance(&a, &b);
        if !(pixels.is_finite() && pixels >= MIN_REFERENCE_PIXELS) {
            return Err(Error::InvalidCalibration(format!(
                "reference segment is {pixels} px long, need at least {MIN_REFERENCE_PIXELS} px"
            )));
        }
        let result = Self {
            scale: real_length_meters / pixels,
            units: Units::Meters,
        };
        tracing::debug!(
            "calibrated {pixels:.2} px as {real_length_meters} m ({:.3} px/m)",
            result.pixels_per_unit()
        );
        Ok(result)
    }

    pub fn from_spec(spec: &CalibrationSpec) -> Result<Self> {
        Self::from_reference(
            Point2::from(spec.pixel_point_a),
            Point2::from(spec.pixel_point_b),
            spec.real_length_meters,
        )
    }

    /// Restore a calibration from a previously computed pixels-per-meter ratio.
    pub fn from_pixels_per_meter(pixels_per_meter: f64) -> Result<Self> {
        if !(pixels_per_meter.is_finite() && pixels_per_meter > 0.0) {
            return Err(Error::InvalidCalibration(format!(
                "pixels per meter must be positive, got {pixels_per_meter}"
            )));
        }
        Ok(Self {
            scale: 1.0 / pixels_per_meter,
            units: Units::Meters,
        })
    }

    /// Output units per pixel.
    pub fn scale(&self) -> f64 {
        self.scale
    }

    /// Pixels per output unit.
    pub fn pixels_per_unit(&self) -> f64 {
        1.0 / self.scale
    }

    pub fn units(&self) -> Units {
        self.units
    }

    pub fn is_identity(&self) -> bool {
        self.units == Units::Pixels
    }

    pub fn to_metric(&self, x_px: f64, y_px: f64) -> (f64, f64) {
        (x_px * self.scale, y_px * self.scale)
    }

    pub fn apply(&self, p: &Point2<f64>) -> Point2<f64> {
        Point2::from(p.coords * self.scale)
    }

    /// Inverse of [`Self::apply`].
    pub fn to_pixels(&self, p: &Point2<f64>) -> Point2<f64> {
        Point2::from(p.coords / self.scale)
    }
}
