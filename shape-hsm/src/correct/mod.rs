//! PSF correction strategies.
//!
//! Four estimators remove the PSF's smearing from converged object moments.
//! They share one contract: converged object and PSF moments in, a corrected
//! ellipticity plus resolution factor out, inputs never mutated. KSB reports
//! shear, the others distortion. Calibration follows Kaiser, Squires &
//! Broadhurst (1995), Bernstein & Jarvis (2002), and Hirata & Seljak (2003).

mod bj;
mod ksb;
mod linear;
mod regauss;

use crate::config::{CorrectionMethod, ShapeConfig};
use crate::error::CorrectionError;
use crate::moments::Moments;
use crate::psf::PsfEstimate;
use crate::region::PixelRegion;
use crate::result::ShapeConvention;

/// Denominators smaller than this are treated as vanished
const DENOM_EPS: f64 = 1e-8;
/// Numerators smaller than this ride a vanished denominator to exact zero
const NUMER_EPS: f64 = 1e-9;

/// Output of one correction strategy
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct CorrectedShape {
    pub e1: f64,
    pub e2: f64,
    pub convention: ShapeConvention,
    /// `1 - T_psf/T_obj`, clamped to [0, 1]
    pub resolution: f64,
}

/// Apply the configured correction strategy
///
/// `region` carries the object pixels the moments were measured from; only
/// re-Gaussianization re-reads them.
pub(crate) fn apply_correction(
    object: &Moments,
    psf: &PsfEstimate,
    region: &PixelRegion<'_>,
    config: &ShapeConfig,
) -> Result<CorrectedShape, CorrectionError> {
    match config.correction_method {
        CorrectionMethod::Ksb => ksb::correct(object, psf.moments()),
        CorrectionMethod::Bj => bj::correct(object, psf.moments()),
        CorrectionMethod::Linear => linear::correct(object, psf.moments()),
        CorrectionMethod::Regauss => regauss::correct(object, psf, region, config),
    }
}

/// Resolution factor `1 - T_psf/T_obj`
///
/// Values outside [0, 1] beyond rounding slop mean the object came out
/// smaller than the PSF that blurred it, which no strategy can correct.
fn resolution_factor(t_psf: f64, t_obj: f64) -> Result<f64, CorrectionError> {
    if !(t_obj > 0.0) || !(t_psf > 0.0) {
        return Err(CorrectionError::DegenerateMoments(format!(
            "non-positive moment traces: object {t_obj}, psf {t_psf}"
        )));
    }
    let resolution = 1.0 - t_psf / t_obj;
    if !(-1e-6..=1.0 + 1e-6).contains(&resolution) {
        return Err(CorrectionError::ResolutionOutOfRange { resolution });
    }
    Ok(resolution.clamp(0.0, 1.0))
}

/// Trace dilution `(T_psf/T_obj) * (1 + a4_psf)/(1 + a4_obj)`
///
/// The radial-fourth-moment ratio adjusts the plain trace ratio for
/// non-Gaussian profiles; both factors are exactly 1 for a Gaussian PSF on a
/// Gaussian object.
fn trace_dilution(object: &Moments, psf: &Moments) -> Result<f64, CorrectionError> {
    let denom = 1.0 + object.a4();
    if !(denom.abs() > DENOM_EPS) {
        return Err(CorrectionError::DegenerateMoments(format!(
            "object radial fourth moment rho4 = {} unusable",
            object.rho4
        )));
    }
    Ok((psf.trace() / object.trace()) * (1.0 + psf.a4()) / denom)
}

/// Divide an ellipticity pair by a shared denominator, guarding the
/// unresolved limit
///
/// When the denominator has vanished and both numerator components have too
/// (the object is the PSF), the corrected shape is exactly round and `(0, 0)`
/// is returned. A vanished denominator with a surviving numerator is a
/// genuine singularity.
fn guarded_div(n1: f64, n2: f64, denom: f64) -> Result<(f64, f64), CorrectionError> {
    if denom.abs() < DENOM_EPS {
        if n1.hypot(n2) < NUMER_EPS {
            return Ok((0.0, 0.0));
        }
        return Err(CorrectionError::SingularDenominator { denominator: denom });
    }
    Ok((n1 / denom, n2 / denom))
}

/// Reject non-finite corrected components
fn check_finite(e1: f64, e2: f64) -> Result<(f64, f64), CorrectionError> {
    if e1.is_finite() && e2.is_finite() {
        Ok((e1, e2))
    } else {
        Err(CorrectionError::NonFinite)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gaussian_moments(xx: f64, xy: f64, yy: f64) -> Moments {
        Moments {
            x: 0.0,
            y: 0.0,
            xx,
            xy,
            yy,
            flux: 1000.0,
            rho4: 2.0,
        }
    }

    #[test]
    fn test_resolution_factor_range() {
        assert_eq!(resolution_factor(4.0, 16.0).unwrap(), 0.75);
        assert_eq!(resolution_factor(16.0, 16.0).unwrap(), 0.0);
        assert!(matches!(
            resolution_factor(20.0, 16.0),
            Err(CorrectionError::ResolutionOutOfRange { .. })
        ));
    }

    #[test]
    fn test_trace_dilution_for_gaussians_is_trace_ratio() {
        let object = gaussian_moments(10.0, 0.0, 10.0);
        let psf = gaussian_moments(4.0, 0.0, 4.0);
        assert_eq!(trace_dilution(&object, &psf).unwrap(), 0.4);
    }

    #[test]
    fn test_guarded_div_unresolved_limit() {
        assert_eq!(guarded_div(0.0, 0.0, 0.0).unwrap(), (0.0, 0.0));
        assert!(matches!(
            guarded_div(0.1, 0.0, 0.0),
            Err(CorrectionError::SingularDenominator { .. })
        ));
        assert_eq!(guarded_div(0.2, -0.4, 0.5).unwrap(), (0.4, -0.8));
    }
}
