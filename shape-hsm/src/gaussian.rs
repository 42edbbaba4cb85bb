//! Elliptical Gaussian image rendering.
//!
//! Used to realize analytic PSF models and the Gaussian approximations that
//! the re-Gaussianization correction subtracts from real pixels.

use ndarray::Array2;
use shape_math::{invert_checked, moment_matrix, DegenerateMatrixError};

/// Render an elliptical Gaussian sampled at pixel centers
///
/// # Arguments
/// * `shape` - Output dimensions (rows, cols)
/// * `flux` - Total flux; the amplitude is `flux / (2*pi*sqrt(det))`
/// * `x0`, `y0` - Centroid in the output array's own frame (x along columns)
/// * `xx`, `xy`, `yy` - Covariance of the profile
///
/// # Returns
/// * `Err(DegenerateMatrixError)` - When the covariance is not
///   positive-definite
pub(crate) fn render_gaussian(
    shape: (usize, usize),
    flux: f64,
    x0: f64,
    y0: f64,
    xx: f64,
    xy: f64,
    yy: f64,
) -> Result<Array2<f64>, DegenerateMatrixError> {
    let m = moment_matrix(xx, xy, yy);
    let inv = invert_checked(&m)?;
    let amp = flux / (2.0 * std::f64::consts::PI * m.determinant().sqrt());

    let mut image = Array2::zeros(shape);
    for ((row, col), value) in image.indexed_iter_mut() {
        let dx = col as f64 - x0;
        let dy = row as f64 - y0;
        let chi2 = inv.m11 * dx * dx + 2.0 * inv.m12 * dx * dy + inv.m22 * dy * dy;
        *value = amp * (-0.5 * chi2).exp();
    }
    Ok(image)
}
