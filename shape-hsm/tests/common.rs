//! Shared scene builders for the integration tests.
//!
//! A Gaussian galaxy blurred by a Gaussian PSF is itself a Gaussian whose
//! covariance is the sum of the two, so observed scenes with known intrinsic
//! shapes can be rendered in closed form.

use ndarray::Array2;
use shape_hsm::test_patterns::render_gaussian_spot;
use shape_hsm::PsfEstimate;

/// Initialize test logging; safe to call from every test
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Intrinsic covariance of a synthetic galaxy
#[derive(Debug, Clone, Copy)]
pub struct Intrinsic {
    pub xx: f64,
    pub xy: f64,
    pub yy: f64,
}

impl Intrinsic {
    /// Intrinsic distortion `(e1, e2)` of the covariance
    pub fn distortion(&self) -> (f64, f64) {
        let trace = self.xx + self.yy;
        ((self.xx - self.yy) / trace, 2.0 * self.xy / trace)
    }
}

/// Render the observation of a Gaussian galaxy through the given PSF
///
/// The measured PSF moments (not the nominal model width) enter the summed
/// covariance, so pixelization effects cancel between the scene and the
/// correction.
pub fn blurred_scene(
    psf: &PsfEstimate,
    shape: (usize, usize),
    flux: f64,
    x0: f64,
    y0: f64,
    intrinsic: Intrinsic,
) -> Array2<f64> {
    let p = psf.moments();
    render_gaussian_spot(
        shape,
        flux,
        x0,
        y0,
        intrinsic.xx + p.xx,
        intrinsic.xy + p.xy,
        intrinsic.yy + p.yy,
    )
}
