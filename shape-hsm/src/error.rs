//! Error types and result status flags for shape measurement.
//!
//! Failures inside a measurement never cross the call boundary as errors:
//! they are folded into [`StatusFlags`] on a best-effort result. The only hard
//! errors are invalid configuration, malformed input regions, and a PSF
//! characterization that cannot produce usable moments at all.

use bitflags::bitflags;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

use crate::solver::SolverStatus;

bitflags! {
    /// Status flags attached to every measurement result (`0` = success)
    ///
    /// Flags are additive: a measurement can, for example, be both
    /// `CONVERGENCE_FAILED` and `EDGE_TRUNCATED`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct StatusFlags: u16 {
        /// Moment iteration hit the iteration cap before converging
        const CONVERGENCE_FAILED = 1 << 0;
        /// Second-moment matrix became singular or non-positive-definite
        const DEGENERATE_MOMENTS = 1 << 1;
        /// Weighted flux too low relative to the noise level
        const INSUFFICIENT_FLUX = 1 << 2;
        /// Region of interest was clipped by the image bounds
        const EDGE_TRUNCATED = 1 << 3;
        /// PSF correction denominator singular or resolution out of range
        const PSF_CORRECTION_FAILED = 1 << 4;
    }
}

impl Default for StatusFlags {
    fn default() -> Self {
        StatusFlags::empty()
    }
}

// Serialized as the raw bit pattern so results stay a flat record.
impl Serialize for StatusFlags {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u16(self.bits())
    }
}

impl<'de> Deserialize<'de> for StatusFlags {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(StatusFlags::from_bits_truncate(u16::deserialize(
            deserializer,
        )?))
    }
}

/// Errors reported before or outside the per-object measurement loop.
#[derive(Error, Debug)]
pub enum MeasureError {
    /// Configuration rejected before any iteration began.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Input arrays are inconsistent with each other.
    #[error(transparent)]
    Region(#[from] RegionError),

    /// PSF characterization failed; no correction is possible without it.
    #[error("PSF moment measurement failed: {status:?} after {iterations} iterations")]
    PsfMeasurement {
        /// Terminal solver status.
        status: SolverStatus,
        /// Iterations completed before failure.
        iterations: usize,
    },
}

/// Errors constructing a pixel region from caller-owned arrays.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RegionError {
    /// Variance array dimensions do not match the image.
    #[error("variance dimensions {variance:?} do not match image {image:?}")]
    VarianceShapeMismatch {
        /// Image (rows, cols).
        image: (usize, usize),
        /// Variance (rows, cols).
        variance: (usize, usize),
    },

    /// Mask array dimensions do not match the image.
    #[error("mask dimensions {mask:?} do not match image {image:?}")]
    MaskShapeMismatch {
        /// Image (rows, cols).
        image: (usize, usize),
        /// Mask (rows, cols).
        mask: (usize, usize),
    },

    /// Image has a zero-sized dimension.
    #[error("empty image: {rows}x{cols}")]
    EmptyImage {
        /// Image rows.
        rows: usize,
        /// Image columns.
        cols: usize,
    },
}

/// Failure modes of a single PSF-correction strategy.
///
/// These are internal to the corrector; `measure_shape` maps them onto
/// [`StatusFlags`] on the returned result.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CorrectionError {
    /// Object or PSF moment matrix unusable for this method.
    #[error("degenerate input moments: {0}")]
    DegenerateMoments(String),

    /// Resolution factor fell outside the physical range.
    #[error("resolution {resolution:.6} outside [0, 1]")]
    ResolutionOutOfRange {
        /// The offending resolution value.
        resolution: f64,
    },

    /// Correction denominator vanished with a non-zero numerator.
    #[error("singular correction denominator {denominator:.6e}")]
    SingularDenominator {
        /// The offending denominator value.
        denominator: f64,
    },

    /// Corrected shape came out non-finite.
    #[error("non-finite corrected shape")]
    NonFinite,
}

impl CorrectionError {
    /// Status flags this failure contributes to the result.
    pub fn flags(&self) -> StatusFlags {
        match self {
            CorrectionError::DegenerateMoments(_) => {
                StatusFlags::DEGENERATE_MOMENTS | StatusFlags::PSF_CORRECTION_FAILED
            }
            _ => StatusFlags::PSF_CORRECTION_FAILED,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_are_additive() {
        let f = StatusFlags::CONVERGENCE_FAILED | StatusFlags::EDGE_TRUNCATED;
        assert!(f.contains(StatusFlags::CONVERGENCE_FAILED));
        assert!(f.contains(StatusFlags::EDGE_TRUNCATED));
        assert!(!f.contains(StatusFlags::DEGENERATE_MOMENTS));
    }

    #[test]
    fn test_flags_serde_round_trip() {
        let f = StatusFlags::INSUFFICIENT_FLUX | StatusFlags::PSF_CORRECTION_FAILED;
        let json = serde_json::to_string(&f).unwrap();
        let back: StatusFlags = serde_json::from_str(&json).unwrap();
        assert_eq!(f, back);
    }

    #[test]
    fn test_correction_error_flag_mapping() {
        let e = CorrectionError::ResolutionOutOfRange { resolution: 1.5 };
        assert_eq!(e.flags(), StatusFlags::PSF_CORRECTION_FAILED);

        let e = CorrectionError::DegenerateMoments("psf".into());
        assert!(e.flags().contains(StatusFlags::DEGENERATE_MOMENTS));
    }
}
