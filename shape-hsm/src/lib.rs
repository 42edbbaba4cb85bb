//! Adaptive-moment galaxy shape measurement with PSF correction.
//!
//! Implements the weak-lensing shape pipeline built on iteratively matched
//! elliptical-Gaussian weights: an adaptive moment solver finds the
//! best-fit Gaussian description of a source, and one of four correction
//! strategies (KSB, BJ, LINEAR, REGAUSS) removes the smearing of the
//! point-spread function from the converged moments.
//!
//! Each measurement is synchronous and self-contained: all iteration state
//! is allocated per call and nothing is shared, so measuring many sources
//! against one image parallelizes trivially at the caller's discretion with
//! read-only [`PixelRegion`] views over a shared buffer.
//!
//! Failures never cross the measurement boundary as errors. Every call that
//! reaches the solver returns a [`ShapeMeasurementResult`] whose
//! [`StatusFlags`] record what degraded; hard errors are limited to invalid
//! configuration and malformed input arrays.
//!
//! ```no_run
//! use ndarray::Array2;
//! use shape_hsm::{
//!     measure_shape, InitialGuess, PixelRegion, PsfEstimate, Roi, ShapeConfig, Variance,
//! };
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let image: Array2<f64> = Array2::zeros((128, 128));
//! let region = PixelRegion::new(image.view(), Variance::Uniform(35.0), None, (0, 0))?;
//! let config = ShapeConfig::default();
//! let psf = PsfEstimate::from_gaussian(2.0, 33, &config)?;
//!
//! let result = measure_shape(
//!     &region,
//!     &Roi::centered(64.0, 64.0, 30),
//!     &InitialGuess::at(64.0, 64.0),
//!     &psf,
//!     &config,
//! )?;
//! if result.is_clean() {
//!     println!("e = ({:.4}, {:.4})", result.e1, result.e2);
//! }
//! # Ok(())
//! # }
//! ```

pub mod accumulate;
pub mod config;
mod convolve;
mod correct;
pub mod error;
mod gaussian;
pub mod moments;
pub mod psf;
pub mod region;
pub mod result;
pub mod solver;
pub mod test_patterns;
pub mod weight;

pub use config::{CorrectionMethod, ShapeConfig};
pub use error::{CorrectionError, MeasureError, RegionError, StatusFlags};
pub use moments::Moments;
pub use psf::{measure_psf_moments, PsfEstimate, PsfSource};
pub use region::{PixelRegion, Roi, Variance};
pub use result::{ShapeConvention, ShapeMeasurementResult};
pub use solver::{solve_moments, ConvergenceState, InitialGuess, SolveOutcome, SolverStatus};

use correct::apply_correction;

/// Measure a PSF-corrected source shape
///
/// Clips the region of interest against the region, runs the adaptive moment
/// solver from the initial guess, and applies the configured PSF correction
/// to the converged moments.
///
/// # Arguments
/// * `region` - Intensity, variance, and mask views in absolute coordinates
/// * `roi` - Region of interest bounding the source, absolute coordinates
/// * `guess` - Initial centroid and width for the moment iteration
/// * `psf` - PSF characterization shared across sources on this image
/// * `config` - Solver settings and correction method
///
/// # Returns
/// * `Ok(ShapeMeasurementResult)` - Best-effort result; inspect `flags`
///   before using the shape fields
/// * `Err(MeasureError::InvalidConfig)` - Configuration rejected up front
pub fn measure_shape(
    region: &PixelRegion<'_>,
    roi: &Roi,
    guess: &InitialGuess,
    psf: &PsfEstimate,
    config: &ShapeConfig,
) -> Result<ShapeMeasurementResult, MeasureError> {
    config.validate()?;

    let method = config.correction_method;
    let convention = match method {
        CorrectionMethod::Ksb => ShapeConvention::Shear,
        _ => ShapeConvention::Distortion,
    };

    let (sub, truncated) = match region.clipped(roi) {
        Some(pair) => pair,
        None => {
            // ROI entirely off the image: nothing to measure
            log::debug!("region of interest {roi:?} does not overlap the image");
            return Ok(failed_result(
                guess,
                StatusFlags::EDGE_TRUNCATED | StatusFlags::INSUFFICIENT_FLUX,
                convention,
                method,
            ));
        }
    };
    let mut flags = StatusFlags::empty();
    if truncated {
        flags |= StatusFlags::EDGE_TRUNCATED;
    }

    let outcome = solver::solve_moments(&sub, guess, config);
    flags |= match outcome.convergence.status {
        SolverStatus::Converged => StatusFlags::empty(),
        SolverStatus::MaxIterationsExceeded => StatusFlags::CONVERGENCE_FAILED,
        SolverStatus::Degenerate => StatusFlags::DEGENERATE_MOMENTS,
        SolverStatus::InsufficientFlux => StatusFlags::INSUFFICIENT_FLUX,
    };

    let m = outcome.moments;
    let usable = outcome.convergence.status.has_usable_moments() && m.is_positive_definite();
    if outcome.convergence.status.has_usable_moments() && !m.is_positive_definite() {
        flags |= StatusFlags::DEGENERATE_MOMENTS;
    }

    let mut result = ShapeMeasurementResult {
        x: m.x,
        y: m.y,
        xx: m.xx,
        xy: m.xy,
        yy: m.yy,
        e1: 0.0,
        e2: 0.0,
        convention,
        sigma: if m.is_positive_definite() { m.sigma() } else { 0.0 },
        flux: m.flux,
        resolution: 0.0,
        sigma_err: 0.0,
        flags,
        iterations: outcome.convergence.iterations,
        method,
    };

    if usable {
        match apply_correction(&m, psf, &sub, config) {
            Ok(shape) => {
                result.e1 = shape.e1;
                result.e2 = shape.e2;
                result.convention = shape.convention;
                result.resolution = shape.resolution;
                result.sigma_err = shape_uncertainty(
                    sub.mean_variance(),
                    result.sigma,
                    m.flux,
                    shape.resolution,
                    method,
                );
            }
            Err(e) => {
                log::warn!("PSF correction ({method:?}) failed: {e}");
                result.flags |= e.flags();
            }
        }
    }

    Ok(result)
}

/// Ellipticity uncertainty propagated from the sky variance
///
/// `4 * sqrt(pi * skyvar) * sigma / (flux * resolution)`, halved for the
/// shear-convention KSB estimate. The sky variance is the plain mean of the
/// per-pixel variance, a known approximation kept for continuity with the
/// published estimator. Zero when flux or resolution leave no support.
fn shape_uncertainty(
    skyvar: f64,
    sigma: f64,
    flux: f64,
    resolution: f64,
    method: CorrectionMethod,
) -> f64 {
    if !(flux > 0.0) || !(resolution > 0.0) || !(skyvar >= 0.0) {
        return 0.0;
    }
    let err = 4.0 * (std::f64::consts::PI * skyvar).sqrt() * sigma / (flux * resolution);
    match method {
        CorrectionMethod::Ksb => 0.5 * err,
        _ => err,
    }
}

fn failed_result(
    guess: &InitialGuess,
    flags: StatusFlags,
    convention: ShapeConvention,
    method: CorrectionMethod,
) -> ShapeMeasurementResult {
    ShapeMeasurementResult {
        x: guess.x,
        y: guess.y,
        xx: 0.0,
        xy: 0.0,
        yy: 0.0,
        e1: 0.0,
        e2: 0.0,
        convention,
        sigma: 0.0,
        flux: 0.0,
        resolution: 0.0,
        sigma_err: 0.0,
        flags,
        iterations: 0,
        method,
    }
}
