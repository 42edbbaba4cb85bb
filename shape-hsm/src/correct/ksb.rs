//! Kaiser, Squires & Broadhurst (1995) polarizability correction.
//!
//! Estimates shear rather than distortion: the PSF-subtracted distortion is
//! divided by the shear polarizability `2*(1 - |e_obs|^2)` along with the
//! usual dilution denominator. Reported in the shear convention `(g1, g2)`.

use super::linear::observed_distortion;
use super::{check_finite, guarded_div, resolution_factor, trace_dilution, CorrectedShape};
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
    let dilution = trace_dilution(object, psf)?;

    let polarizability = 2.0 * (1.0 - e_obs.magnitude().powi(2));
    if !(polarizability > 0.0) {
        return Err(CorrectionError::DegenerateMoments(
            "observed distortion magnitude at or above 1".to_string(),
        ));
    }

    let (g1, g2) = guarded_div(
        e_obs.e1 - dilution * e_psf.e1,
        e_obs.e2 - dilution * e_psf.e2,
        polarizability * (1.0 - dilution),
    )?;
    let (g1, g2) = check_finite(g1, g2)?;

    Ok(CorrectedShape {
        e1: g1,
        e2: g2,
        convention: ShapeConvention::Shear,
        resolution,
    })
}
