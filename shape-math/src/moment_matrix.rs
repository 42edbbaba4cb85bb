//! 2x2 second-moment matrix utilities using nalgebra
//!
//! A second-moment matrix `[[xx, xy], [xy, yy]]` describes the size and
//! orientation of an elliptical intensity profile. All operations here check
//! for the degenerate (non-positive-definite) case and report it as an error
//! rather than producing NaN downstream.

use nalgebra::Matrix2;
use thiserror::Error;

/// Error when a moment matrix is singular or not positive-definite
#[derive(Error, Debug, Clone, PartialEq)]
#[error("degenerate moment matrix: xx={xx:.6e}, yy={yy:.6e}, det={determinant:.6e}")]
pub struct DegenerateMatrixError {
    /// The xx diagonal element
    pub xx: f64,
    /// The yy diagonal element
    pub yy: f64,
    /// The determinant value (zero, negative, or non-finite)
    pub determinant: f64,
}

/// Build a symmetric 2x2 moment matrix from its three free components
pub fn moment_matrix(xx: f64, xy: f64, yy: f64) -> Matrix2<f64> {
    Matrix2::new(xx, xy, xy, yy)
}

/// Check that a symmetric 2x2 matrix is positive-definite
///
/// # Returns
/// * `Ok(())` - If `xx > 0`, `yy > 0` and `xx*yy > xy^2`
/// * `Err(DegenerateMatrixError)` - Otherwise, or if any entry is non-finite
pub fn check_positive_definite(m: &Matrix2<f64>) -> Result<(), DegenerateMatrixError> {
    let det = m.determinant();
    let ok = m.m11 > 0.0 && m.m22 > 0.0 && det > 0.0 && det.is_finite();
    if ok {
        Ok(())
    } else {
        Err(DegenerateMatrixError {
            xx: m.m11,
            yy: m.m22,
            determinant: det,
        })
    }
}

/// Invert a 2x2 moment matrix with a positive-definiteness check
///
/// # Arguments
/// * `m` - The symmetric 2x2 matrix to invert
///
/// # Returns
/// * `Ok(Matrix2<f64>)` - The inverse matrix
/// * `Err(DegenerateMatrixError)` - If the matrix is not positive-definite
pub fn invert_checked(m: &Matrix2<f64>) -> Result<Matrix2<f64>, DegenerateMatrixError> {
    check_positive_definite(m)?;
    let det = m.determinant();
    m.try_inverse().ok_or(DegenerateMatrixError {
        xx: m.m11,
        yy: m.m22,
        determinant: det,
    })
}

/// Gaussian size of a moment matrix: `sigma = det(M)^(1/4)`
///
/// For a circular Gaussian of width `s` this returns `s`. Returns NaN for a
/// matrix with negative determinant.
pub fn gaussian_sigma(m: &Matrix2<f64>) -> f64 {
    m.determinant().powf(0.25)
}

/// Squared semi-major and semi-minor axes `(a^2, b^2)` of a moment matrix
///
/// These are the eigenvalues of the matrix, computed through the principal-axis
/// angle so the major axis always comes first.
pub fn semi_axes_squared(m: &Matrix2<f64>) -> (f64, f64) {
    let (xx, xy, yy) = (m.m11, m.m12, m.m22);
    let two_psi = (2.0 * xy).atan2(xx - yy);
    let a2 = 0.5 * ((xx + yy) + (xx - yy) * two_psi.cos()) + xy * two_psi.sin();
    let b2 = (xx + yy) - a2;
    (a2, b2)
}
