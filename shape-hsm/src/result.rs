//! Shape measurement output record

use serde::{Deserialize, Serialize};

use crate::config::CorrectionMethod;
use crate::error::StatusFlags;

/// Convention used for the reported ellipticity components
///
/// Distortion is `(a^2 - b^2) / (a^2 + b^2)`; shear is `(a - b) / (a + b)`.
/// Which one a correction method reports is a property of the method:
/// KSB estimates shear, the others estimate distortion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShapeConvention {
    Distortion,
    Shear,
}

/// Complete output of a shape measurement
///
/// Always returned when the solver ran, even on failure; the `flags` bitset
/// records which stages degraded or failed. Fields downstream of a failed
/// stage hold the last usable values (or zero when nothing usable exists),
/// so consumers must check `flags` before trusting `e1`/`e2`/`resolution`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShapeMeasurementResult {
    /// Best-fit centroid, x along columns in image coordinates
    pub x: f64,
    /// Best-fit centroid, y along rows in image coordinates
    pub y: f64,
    /// Adaptive second moment xx
    pub xx: f64,
    /// Adaptive second moment xy
    pub xy: f64,
    /// Adaptive second moment yy
    pub yy: f64,
    /// PSF-corrected ellipticity, first component
    pub e1: f64,
    /// PSF-corrected ellipticity, second component
    pub e2: f64,
    /// Convention of `e1`/`e2`, determined by the correction method
    pub convention: ShapeConvention,
    /// Gaussian scale radius, `det(M)^(1/4)` in pixels
    pub sigma: f64,
    /// Total flux under the adaptive weight
    pub flux: f64,
    /// Resolution factor in [0, 1]; 0 means unresolved (object is the PSF)
    pub resolution: f64,
    /// Propagated ellipticity uncertainty from the sky variance
    pub sigma_err: f64,
    /// Accumulated failure and degradation flags
    pub flags: StatusFlags,
    /// Iterations spent by the object moment solve
    pub iterations: usize,
    /// Correction method that produced `e1`/`e2`
    pub method: CorrectionMethod,
}

impl ShapeMeasurementResult {
    /// True when no failure or degradation flag is set
    pub fn is_clean(&self) -> bool {
        self.flags.is_empty()
    }
}
