//! Bernstein & Jarvis (2002) rounding-kernel correction.
//!
//! The PSF distortion is removed from the observed shape with the nonlinear
//! distortion composition law, the remainder is boosted by the resolution of
//! the rounded system, and the PSF distortion is composed back on. Unlike
//! plain moment subtraction this stays well-behaved for strongly elliptical
//! PSFs.

use shape_math::Distortion;

use super::linear::observed_distortion;
use super::{check_finite, guarded_div, resolution_factor, CorrectedShape, DENOM_EPS};
use crate::error::CorrectionError;
use crate::moments::Moments;
use crate::result::ShapeConvention;

pub(crate) fn correct(
    object: &Moments,
    psf: &Moments,
) -> Result<CorrectedShape, CorrectionError> {
    let e_obs = observed_distortion(object, "object")?;
    let e_psf = observed_distortion(psf, "psf")?;
    let resolution = resolution_factor(psf.trace(), object.trace())?;

    // Observed shape with the PSF distortion rounded away
    let e_red = e_obs.compose(&e_psf.negate());

    let one_minus_red2 = 1.0 - e_red.magnitude().powi(2);
    let one_minus_psf2 = 1.0 - e_psf.magnitude().powi(2);
    if !(one_minus_red2 > 0.0) || !(one_minus_psf2 > 0.0) {
        return Err(CorrectionError::DegenerateMoments(
            "distortion magnitude at or above 1".to_string(),
        ));
    }
    let a4_denom = 1.0 + object.a4();
    if !(a4_denom.abs() > DENOM_EPS) {
        return Err(CorrectionError::DegenerateMoments(format!(
            "object radial fourth moment rho4 = {} unusable",
            object.rho4
        )));
    }

    // Size ratio of PSF to object in the rounded frame
    let sig2ratio = (psf.trace() / object.trace())
        * (one_minus_red2 / one_minus_psf2).sqrt()
        * (1.0 + psf.a4())
        / a4_denom;

    let (e1, e2) = guarded_div(e_red.e1, e_red.e2, 1.0 - sig2ratio)?;
    let intrinsic_rounded = Distortion { e1, e2 };
    let corrected = intrinsic_rounded.compose(&e_psf);
    let (e1, e2) = check_finite(corrected.e1, corrected.e2)?;

    Ok(CorrectedShape {
        e1,
        e2,
        convention: ShapeConvention::Distortion,
        resolution,
    })
}
