//! Resolution-rescaling (moment subtraction) correction.
//!
//! The observed distortion of a Gaussian object is the intrinsic distortion
//! diluted by the trace ratio, so the correction divides the PSF-subtracted
//! distortion by one minus the dilution. Exact for a Gaussian object blurred
//! by a Gaussian PSF; the radial-fourth-moment factors in the dilution absorb
//! the leading non-Gaussian deviation.

use shape_math::Distortion;

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

pub(super) fn observed_distortion(
    moments: &Moments,
    what: &str,
) -> Result<Distortion, CorrectionError> {
    moments.distortion().ok_or_else(|| {
        CorrectionError::DegenerateMoments(format!("{what} moment trace not positive"))
    })
}
