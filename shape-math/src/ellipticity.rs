//! Ellipticity conventions: distortion and shear
//!
//! Two conventions are in common use for describing an elliptical shape with
//! two numbers. The *distortion* `(e1, e2)` is defined from second moments as
//! `e1 = (xx - yy)/(xx + yy)`, `e2 = 2*xy/(xx + yy)`. The *shear* `(g1, g2)`
//! is related to it by `e = 2g/(1 + |g|^2)`. Distortions do not add linearly;
//! the composition law of Bernstein & Jarvis (2002) is provided here for use
//! by rounding-kernel PSF corrections.

use serde::{Deserialize, Serialize};

/// Distortion-convention ellipticity `(e1, e2)`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Distortion {
    /// + component, `(xx - yy)/(xx + yy)`
    pub e1: f64,
    /// x component, `2*xy/(xx + yy)`
    pub e2: f64,
}

/// Shear-convention ellipticity `(g1, g2)`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Shear {
    /// + component
    pub g1: f64,
    /// x component
    pub g2: f64,
}

impl Distortion {
    /// Zero (circular) distortion
    pub const ZERO: Distortion = Distortion { e1: 0.0, e2: 0.0 };

    /// Distortion of a second-moment matrix, or None when the trace is not positive
    pub fn from_moments(xx: f64, xy: f64, yy: f64) -> Option<Self> {
        let trace = xx + yy;
        if trace <= 0.0 || !trace.is_finite() {
            return None;
        }
        Some(Distortion {
            e1: (xx - yy) / trace,
            e2: 2.0 * xy / trace,
        })
    }

    /// Magnitude `|e| = sqrt(e1^2 + e2^2)`
    pub fn magnitude(&self) -> f64 {
        self.e1.hypot(self.e2)
    }

    /// The opposite distortion `(-e1, -e2)`
    pub fn negate(&self) -> Self {
        Distortion {
            e1: -self.e1,
            e2: -self.e2,
        }
    }

    /// Compose two distortions using the Bernstein & Jarvis (2002) addition law
    ///
    /// Returns the distortion obtained by applying `other` on top of `self`.
    /// Composition with the exact negation of `self` yields zero; composition
    /// with zero is the identity.
    pub fn compose(&self, other: &Distortion) -> Distortion {
        let (e1a, e2a) = (self.e1, self.e2);
        let (e1b, e2b) = (other.e1, other.e2);

        let b2 = e1b * e1b + e2b * e2b;
        // (1 - sqrt(1 - |b|^2))/|b|^2 -> 1/2 as |b| -> 0
        let factor = if b2 < 1e-24 {
            0.5
        } else {
            (1.0 - (1.0 - b2).max(0.0).sqrt()) / b2
        };
        let dotp = e1a * e1b + e2a * e2b;

        Distortion {
            e1: (e1a + e1b + e2b * factor * (e2a * e1b - e1a * e2b)) / (1.0 + dotp),
            e2: (e2a + e2b + e1b * factor * (e1a * e2b - e2a * e1b)) / (1.0 + dotp),
        }
    }

    /// Convert to shear convention: `g = e/(1 + sqrt(1 - |e|^2))`
    ///
    /// Returns None when `|e| >= 1` (not a physical shape).
    pub fn to_shear(&self) -> Option<Shear> {
        let e2 = self.e1 * self.e1 + self.e2 * self.e2;
        if e2 >= 1.0 {
            return None;
        }
        let denom = 1.0 + (1.0 - e2).sqrt();
        Some(Shear {
            g1: self.e1 / denom,
            g2: self.e2 / denom,
        })
    }
}

impl Shear {
    /// Magnitude `|g| = sqrt(g1^2 + g2^2)`
    pub fn magnitude(&self) -> f64 {
        self.g1.hypot(self.g2)
    }

    /// Convert to distortion convention: `e = 2g/(1 + |g|^2)`
    pub fn to_distortion(&self) -> Distortion {
        let g2 = self.g1 * self.g1 + self.g2 * self.g2;
        let scale = 2.0 / (1.0 + g2);
        Distortion {
            e1: self.g1 * scale,
            e2: self.g2 * scale,
        }
    }
}
