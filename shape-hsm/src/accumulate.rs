//! Weighted moment accumulation over a pixel region.
//!
//! One pass over the pixels inside the weight's elliptical support computes
//! all the sums the solver needs. The accumulator is pure: it owns no state
//! and never touches the input arrays beyond reading them.

use crate::region::PixelRegion;
use crate::weight::WeightFunction;

/// Elliptical support cut: pixels beyond `chi^2 = 25` (5 sigma) of the weight
/// contribute negligibly and are skipped.
pub const MAX_WEIGHT_NSIG2: f64 = 25.0;

/// Raw (unnormalized) weighted moment sums
///
/// First and second moment sums are taken relative to the weight centroid,
/// not normalized by flux; the solver applies the normalization as part of
/// its update step.
#[derive(Debug, Clone, Copy, Default)]
pub struct RawMoments {
    /// Weighted flux `sum w*I`
    pub flux: f64,
    /// `sum w*I*dx`
    pub sum_x: f64,
    /// `sum w*I*dy`
    pub sum_y: f64,
    /// `sum w*I*dx^2`
    pub sum_xx: f64,
    /// `sum w*I*dx*dy`
    pub sum_xy: f64,
    /// `sum w*I*dy^2`
    pub sum_yy: f64,
    /// `sum w*I*rho^4` with `rho^2 = chi^2`
    pub sum_rho4: f64,
    /// Noise variance of the weighted flux, `sum w^2 * var`
    pub noise_variance: f64,
    /// Number of unmasked pixels visited
    pub n_pixels: usize,
}

impl RawMoments {
    /// Significance of the weighted flux against the accumulated noise
    ///
    /// Returns infinity for a noiseless region with positive flux.
    pub fn significance(&self) -> f64 {
        if self.flux <= 0.0 {
            return 0.0;
        }
        if self.noise_variance <= 0.0 {
            return f64::INFINITY;
        }
        self.flux / self.noise_variance.sqrt()
    }
}

/// Accumulate weighted moments of a region under an elliptical-Gaussian weight
///
/// Bad pixels are skipped. Only pixels inside the weight's 5-sigma elliptical
/// support are visited; the bounding box of that ellipse limits the loop.
pub fn accumulate(region: &PixelRegion<'_>, weight: &WeightFunction) -> RawMoments {
    let (x0, y0) = weight.centroid();
    let (wxx, _, wyy) = weight.shape();
    let (ox, oy) = region.origin();

    // Bounding box of the chi^2 <= MAX_WEIGHT_NSIG2 ellipse, clamped to the region
    let half_x = (MAX_WEIGHT_NSIG2 * wxx).sqrt();
    let half_y = (MAX_WEIGHT_NSIG2 * wyy).sqrt();
    let col_lo = ((x0 - half_x - ox as f64).floor().max(0.0)) as usize;
    let col_hi = (((x0 + half_x - ox as f64).ceil() as i64).max(0) as usize).min(region.width());
    let row_lo = ((y0 - half_y - oy as f64).floor().max(0.0)) as usize;
    let row_hi = (((y0 + half_y - oy as f64).ceil() as i64).max(0) as usize).min(region.height());

    let mut out = RawMoments::default();
    for row in row_lo..row_hi {
        let dy = (oy + row as i64) as f64 - y0;
        for col in col_lo..col_hi {
            if region.is_bad(row, col) {
                continue;
            }
            let dx = (ox + col as i64) as f64 - x0;
            let chi2 = weight.chi2(dx, dy);
            if chi2 > MAX_WEIGHT_NSIG2 {
                continue;
            }
            let w = (-0.5 * chi2).exp();
            let wi = w * region.image[[row, col]];

            out.flux += wi;
            out.sum_x += wi * dx;
            out.sum_y += wi * dy;
            out.sum_xx += wi * dx * dx;
            out.sum_xy += wi * dx * dy;
            out.sum_yy += wi * dy * dy;
            out.sum_rho4 += wi * chi2 * chi2;
            out.noise_variance += w * w * region.variance_at(row, col);
            out.n_pixels += 1;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::region::Variance;
    use crate::test_patterns::render_gaussian_spot;
    use approx::assert_relative_eq;
    use ndarray::Array2;

    #[test]
    fn test_matched_weight_on_circular_gaussian() {
        // A circular Gaussian measured with the matched weight: the weighted
        // covariance is half the true covariance.
        let sigma = 3.0;
        let image = render_gaussian_spot((41, 41), 1000.0, 20.0, 20.0, sigma * sigma, 0.0, sigma * sigma);
        let region = crate::region::PixelRegion::new(
            image.view(),
            Variance::Uniform(0.0),
            None,
            (0, 0),
        )
        .unwrap();
        let weight = WeightFunction::circular(20.0, 20.0, sigma).unwrap();

        let raw = accumulate(&region, &weight);
        assert!(raw.flux > 0.0);
        assert_relative_eq!(raw.sum_x / raw.flux, 0.0, epsilon = 1e-9);
        assert_relative_eq!(raw.sum_y / raw.flux, 0.0, epsilon = 1e-9);
        assert_relative_eq!(
            raw.sum_xx / raw.flux,
            0.5 * sigma * sigma,
            epsilon = 1e-3
        );
        assert_relative_eq!(
            raw.sum_yy / raw.flux,
            0.5 * sigma * sigma,
            epsilon = 1e-3
        );
        assert_relative_eq!(raw.sum_xy / raw.flux, 0.0, epsilon = 1e-9);
        // <rho^4> = 2 for a Gaussian under the matched weight
        assert_relative_eq!(raw.sum_rho4 / raw.flux, 2.0, epsilon = 5e-3);
    }

    #[test]
    fn test_masked_pixels_are_skipped() {
        let mut image = Array2::<f64>::zeros((9, 9));
        image[[4, 4]] = 10.0;
        image[[4, 5]] = 1000.0; // will be masked out
        let mut mask = Array2::from_elem((9, 9), false);
        mask[[4, 5]] = true;

        let region = crate::region::PixelRegion::new(
            image.view(),
            Variance::Uniform(1.0),
            Some(mask.view()),
            (0, 0),
        )
        .unwrap();
        let weight = WeightFunction::circular(4.0, 4.0, 2.0).unwrap();

        let raw = accumulate(&region, &weight);
        // Only the unmasked central pixel contributes
        assert_relative_eq!(raw.flux, 10.0, epsilon = 1e-12);
        assert_relative_eq!(raw.sum_x, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_zero_image_has_zero_significance() {
        let image = Array2::<f64>::zeros((9, 9));
        let region = crate::region::PixelRegion::new(
            image.view(),
            Variance::Uniform(4.0),
            None,
            (0, 0),
        )
        .unwrap();
        let weight = WeightFunction::circular(4.0, 4.0, 2.0).unwrap();

        let raw = accumulate(&region, &weight);
        assert_eq!(raw.flux, 0.0);
        assert_eq!(raw.significance(), 0.0);
    }

    #[test]
    fn test_support_cut_respects_offset_origin() {
        // Same data, different absolute origins: sums must agree when the
        // weight centroid moves with the origin.
        let sigma = 2.0;
        let image = render_gaussian_spot((25, 25), 500.0, 12.0, 12.0, sigma * sigma, 0.0, sigma * sigma);

        let at_zero = crate::region::PixelRegion::new(
            image.view(),
            Variance::Uniform(1.0),
            None,
            (0, 0),
        )
        .unwrap();
        let offset = crate::region::PixelRegion::new(
            image.view(),
            Variance::Uniform(1.0),
            None,
            (1000, -500),
        )
        .unwrap();

        let w0 = WeightFunction::circular(12.0, 12.0, sigma).unwrap();
        let w1 = WeightFunction::circular(1012.0, -488.0, sigma).unwrap();

        let a = accumulate(&at_zero, &w0);
        let b = accumulate(&offset, &w1);
        assert_eq!(a.n_pixels, b.n_pixels);
        assert_relative_eq!(a.flux, b.flux, epsilon = 1e-12);
        assert_relative_eq!(a.sum_xx, b.sum_xx, epsilon = 1e-9);
    }
}
