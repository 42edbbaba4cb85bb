//! Re-Gaussianization correction (Hirata & Seljak 2003).
//!
//! Models the PSF as its best-fit elliptical Gaussian plus a residual. The
//! residual, convolved with a Gaussian approximation of the intrinsic object,
//! is subtracted from the observed pixels; the cleaned image is re-measured
//! and then corrected as if both object and PSF were Gaussian. For a truly
//! Gaussian PSF the residual vanishes and the method reduces to moment
//! subtraction; for realistic PSFs it removes the leading non-Gaussian bias.

use ndarray::Array2;

use super::linear::observed_distortion;
use super::{check_finite, guarded_div, resolution_factor, trace_dilution, CorrectedShape};
use crate::config::ShapeConfig;
use crate::convolve::convolve_same;
use crate::error::CorrectionError;
use crate::gaussian::render_gaussian;
use crate::moments::Moments;
use crate::psf::PsfEstimate;
use crate::region::PixelRegion;
use crate::result::ShapeConvention;
use crate::solver::{solve_moments, InitialGuess};

pub(crate) fn correct(
    object: &Moments,
    psf: &PsfEstimate,
    region: &PixelRegion<'_>,
    config: &ShapeConfig,
) -> Result<CorrectedShape, CorrectionError> {
    let psf_m = psf.moments();
    if !object.is_positive_definite() || !psf_m.is_positive_definite() {
        return Err(CorrectionError::DegenerateMoments(
            "moment matrix not positive-definite".to_string(),
        ));
    }

    // Gaussian approximation of the intrinsic (deconvolved) object. When the
    // difference matrix is not positive-definite the object is unresolved and
    // no residual can be subtracted; the observed moments are corrected as-is.
    let fxx = object.xx - psf_m.xx;
    let fxy = object.xy - psf_m.xy;
    let fyy = object.yy - psf_m.yy;
    let resolved = fxx > 0.0 && fyy > 0.0 && fxx * fyy - fxy * fxy > 0.0;

    let remeasured;
    let working = if resolved {
        let cleaned = subtract_psf_residual(object, psf, region, (fxx, fxy, fyy))?;
        let cleaned_region = region
            .with_image(cleaned.view())
            .map_err(|e| CorrectionError::DegenerateMoments(e.to_string()))?;
        let guess = InitialGuess {
            x: object.x,
            y: object.y,
            sigma: object.sigma(),
        };
        let outcome = solve_moments(&cleaned_region, &guess, config);
        if !outcome.convergence.status.has_usable_moments()
            || !outcome.moments.is_positive_definite()
        {
            return Err(CorrectionError::DegenerateMoments(format!(
                "re-measurement terminated with {:?}",
                outcome.convergence.status
            )));
        }
        remeasured = outcome.moments;
        &remeasured
    } else {
        object
    };

    // Both profiles are now (approximately) Gaussian: subtract moments.
    let e_obs = observed_distortion(working, "re-gaussianized object")?;
    let e_psf = observed_distortion(psf_m, "psf")?;
    let resolution = resolution_factor(psf_m.trace(), working.trace())?;
    let dilution = trace_dilution(working, psf_m)?;

    let (e1, e2) = guarded_div(
        e_obs.e1 - dilution * e_psf.e1,
        e_obs.e2 - dilution * e_psf.e2,
        1.0 - dilution,
    )?;
    let (e1, e2) = check_finite(e1, e2)?;

    Ok(CorrectedShape {
        e1,
        e2,
        convention: ShapeConvention::Distortion,
        resolution,
    })
}

/// Subtract `f0' * (psf - gaussian_fit(psf))` from the observed pixels
///
/// `f0'` is the Gaussian with the difference covariance and the object's
/// centroid and flux, rendered in the region's own frame.
fn subtract_psf_residual(
    object: &Moments,
    psf: &PsfEstimate,
    region: &PixelRegion<'_>,
    (fxx, fxy, fyy): (f64, f64, f64),
) -> Result<Array2<f64>, CorrectionError> {
    let psf_m = psf.moments();
    let psf_dim = psf.image().dim();
    let (pox, poy) = psf.origin();
    let fit = render_gaussian(
        psf_dim,
        psf_m.flux,
        psf_m.x - pox as f64,
        psf_m.y - poy as f64,
        psf_m.xx,
        psf_m.xy,
        psf_m.yy,
    )
    .map_err(|e| CorrectionError::DegenerateMoments(e.to_string()))?;
    // Residual normalized to unit PSF flux so the convolution preserves
    // the object's flux scale
    let mut residual = psf.image() - &fit;
    if psf_m.flux.abs() > f64::EPSILON {
        residual /= psf_m.flux;
    }

    let (ox, oy) = region.origin();
    let deconvolved = render_gaussian(
        (region.height(), region.width()),
        object.flux,
        object.x - ox as f64,
        object.y - oy as f64,
        fxx,
        fxy,
        fyy,
    )
    .map_err(|e| CorrectionError::DegenerateMoments(e.to_string()))?;

    let correction = convolve_same(&deconvolved.view(), &residual.view());
    Ok(region.image_owned() - &correction)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::region::Variance;
    use crate::test_patterns::render_gaussian_spot;
    use approx::{assert_abs_diff_eq, assert_relative_eq};

    #[test]
    fn test_gaussian_scene_reduces_to_moment_subtraction() {
        // Gaussian PSF: the residual is pixelization noise only, so the
        // corrected shape matches the intrinsic distortion closely.
        let config = ShapeConfig::default();
        let psf = PsfEstimate::from_gaussian(2.0, 33, &config).unwrap();

        let (ixx, ixy, iyy) = (7.0, 1.2, 5.0);
        let image = render_gaussian_spot(
            (61, 61),
            3000.0,
            30.2,
            29.7,
            ixx + psf.moments().xx,
            ixy + psf.moments().xy,
            iyy + psf.moments().yy,
        );
        let region = PixelRegion::new(image.view(), Variance::Uniform(1.0), None, (0, 0)).unwrap();
        let outcome = solve_moments(&region, &InitialGuess::at(30.0, 30.0), &config);
        assert!(outcome.convergence.status.has_usable_moments());

        let shape = correct(&outcome.moments, &psf, &region, &config).unwrap();
        let trace = ixx + iyy;
        assert_abs_diff_eq!(shape.e1, (ixx - iyy) / trace, epsilon = 5e-3);
        assert_abs_diff_eq!(shape.e2, 2.0 * ixy / trace, epsilon = 5e-3);
        assert_relative_eq!(
            shape.resolution,
            trace / (trace + psf.moments().trace()),
            max_relative = 1e-2
        );
    }

    #[test]
    fn test_object_equal_to_psf_is_round_and_unresolved() {
        // The difference covariance is exactly zero, so the residual step is
        // skipped and the moment subtraction cancels bitwise.
        let config = ShapeConfig::default();
        let psf_image = render_gaussian_spot((33, 33), 1.0, 16.0, 16.0, 4.0, 0.0, 4.0);
        let region =
            PixelRegion::new(psf_image.view(), Variance::Uniform(0.0), None, (0, 0)).unwrap();
        let guess = InitialGuess {
            x: 16.0,
            y: 16.0,
            sigma: 2.0,
        };
        let psf = PsfEstimate::from_image(&region, &guess, &config).unwrap();
        let outcome = solve_moments(&region, &guess, &config);

        let shape = correct(&outcome.moments, &psf, &region, &config).unwrap();
        assert_eq!(shape.e1, 0.0);
        assert_eq!(shape.e2, 0.0);
        assert_eq!(shape.resolution, 0.0);
    }
}
