//! Elliptical-Gaussian weight function for moment accumulation.

use nalgebra::Matrix2;
use shape_math::{invert_checked, moment_matrix, semi_axes_squared, DegenerateMatrixError};

/// Elliptical Gaussian weight `w(r) = exp(-chi^2/2)` with
/// `chi^2 = (r - r0)^T M^-1 (r - r0)`
///
/// The weight is re-derived from the current moment estimate on every solver
/// iteration; it is never shared across concurrent measurements. The inverse
/// shape matrix is cached at construction.
#[derive(Debug, Clone)]
pub struct WeightFunction {
    x0: f64,
    y0: f64,
    xx: f64,
    xy: f64,
    yy: f64,
    inverse: Matrix2<f64>,
}

impl WeightFunction {
    /// Create a weight centered at `(x0, y0)` with the given shape matrix
    ///
    /// # Returns
    /// * `Err(DegenerateMatrixError)` - If the shape matrix is not
    ///   positive-definite
    pub fn new(x0: f64, y0: f64, xx: f64, xy: f64, yy: f64) -> Result<Self, DegenerateMatrixError> {
        let inverse = invert_checked(&moment_matrix(xx, xy, yy))?;
        Ok(Self {
            x0,
            y0,
            xx,
            xy,
            yy,
            inverse,
        })
    }

    /// Circular weight of width `sigma`, the solver's starting point
    pub fn circular(x0: f64, y0: f64, sigma: f64) -> Result<Self, DegenerateMatrixError> {
        let s2 = sigma * sigma;
        Self::new(x0, y0, s2, 0.0, s2)
    }

    /// Weight centroid
    pub fn centroid(&self) -> (f64, f64) {
        (self.x0, self.y0)
    }

    /// Shape matrix components `(xx, xy, yy)`
    pub fn shape(&self) -> (f64, f64, f64) {
        (self.xx, self.xy, self.yy)
    }

    /// Squared semi-major and semi-minor axes of the shape matrix
    pub fn semi_axes_squared(&self) -> (f64, f64) {
        semi_axes_squared(&moment_matrix(self.xx, self.xy, self.yy))
    }

    /// Elliptical radius `chi^2` at offset `(dx, dy)` from the centroid
    #[inline]
    pub fn chi2(&self, dx: f64, dy: f64) -> f64 {
        self.inverse.m11 * dx * dx + 2.0 * self.inverse.m12 * dx * dy + self.inverse.m22 * dy * dy
    }
}
