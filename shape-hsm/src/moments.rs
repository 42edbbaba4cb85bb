//! Converged weighted-moment description of a source or PSF.

use nalgebra::Matrix2;
use serde::{Deserialize, Serialize};
use shape_math::{gaussian_sigma, moment_matrix, Distortion};

/// Adaptive second moments of a source or PSF
///
/// `x`/`y` are the weighted centroid in the same absolute pixel frame as the
/// input region. `xx`, `xy`, `yy` are the second central moments. `flux` is
/// the Gaussian-weighted flux (total flux for a Gaussian profile) and `rho4`
/// the weighted radial fourth moment, which equals 2 for a Gaussian.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Moments {
    /// Weighted centroid x (column direction)
    pub x: f64,
    /// Weighted centroid y (row direction)
    pub y: f64,
    /// Second central moment in x
    pub xx: f64,
    /// Second central cross moment
    pub xy: f64,
    /// Second central moment in y
    pub yy: f64,
    /// Gaussian-weighted flux estimate
    pub flux: f64,
    /// Weighted radial fourth moment `<rho^4>` (2 for a Gaussian)
    pub rho4: f64,
}

impl Moments {
    /// The second-moment matrix `[[xx, xy], [xy, yy]]`
    pub fn matrix(&self) -> Matrix2<f64> {
        moment_matrix(self.xx, self.xy, self.yy)
    }

    /// Trace `xx + yy`
    pub fn trace(&self) -> f64 {
        self.xx + self.yy
    }

    /// Gaussian size `sigma = (xx*yy - xy^2)^(1/4)`
    pub fn sigma(&self) -> f64 {
        gaussian_sigma(&self.matrix())
    }

    /// Distortion `(e1, e2)`, or None when the trace is not positive
    pub fn distortion(&self) -> Option<Distortion> {
        Distortion::from_moments(self.xx, self.xy, self.yy)
    }

    /// Radial fourth-moment excess over a Gaussian, `a4 = rho4/2 - 1`
    pub fn a4(&self) -> f64 {
        self.rho4 / 2.0 - 1.0
    }

    /// True when the second-moment matrix is positive-definite
    pub fn is_positive_definite(&self) -> bool {
        self.xx > 0.0 && self.yy > 0.0 && self.xx * self.yy - self.xy * self.xy > 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn circular(sigma: f64) -> Moments {
        Moments {
            x: 0.0,
            y: 0.0,
            xx: sigma * sigma,
            xy: 0.0,
            yy: sigma * sigma,
            flux: 1.0,
            rho4: 2.0,
        }
    }

    #[test]
    fn test_circular_gaussian_derived_quantities() {
        let m = circular(3.0);
        assert_relative_eq!(m.sigma(), 3.0, epsilon = 1e-12);
        assert_relative_eq!(m.a4(), 0.0, epsilon = 1e-12);
        let e = m.distortion().unwrap();
        assert_eq!(e.e1, 0.0);
        assert_eq!(e.e2, 0.0);
        assert!(m.is_positive_definite());
    }

    #[test]
    fn test_degenerate_matrix_detected() {
        let mut m = circular(2.0);
        m.xy = 4.0; // xx*yy == xy^2
        assert!(!m.is_positive_definite());
    }
}
