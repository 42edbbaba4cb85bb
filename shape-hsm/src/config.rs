//! Measurement configuration.

use serde::{Deserialize, Serialize};

use crate::error::MeasureError;

/// PSF correction strategy selection
///
/// The four estimators share one interface but differ in how they remove the
/// PSF's smearing from the observed moments. KSB reports shear `(g1, g2)`;
/// the other three report distortion `(e1, e2)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CorrectionMethod {
    /// Kaiser, Squires & Broadhurst (1995) polarizability correction
    Ksb,
    /// Bernstein & Jarvis (2002) rounding-kernel correction
    Bj,
    /// Resolution-rescaling (moment subtraction) correction
    Linear,
    /// Re-Gaussianization (Hirata & Seljak 2003), best for non-Gaussian PSFs
    Regauss,
}

/// Configuration for the adaptive-moment shape measurement
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShapeConfig {
    /// Iteration cap for the adaptive moment solver
    pub max_iterations: usize,
    /// Relative moment-change tolerance that terminates the iteration
    pub convergence_tolerance: f64,
    /// Minimum weighted-flux significance (flux / noise); 0 disables the cut
    pub minimum_flux: f64,
    /// PSF correction strategy to apply
    pub correction_method: CorrectionMethod,
}

impl Default for ShapeConfig {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            convergence_tolerance: 1e-6,
            minimum_flux: 0.0,
            correction_method: CorrectionMethod::Regauss,
        }
    }
}

impl ShapeConfig {
    /// Validate the configuration before any iteration begins
    ///
    /// # Returns
    /// * `Ok(())` - Configuration usable
    /// * `Err(MeasureError::InvalidConfig)` - With a description of the problem
    pub fn validate(&self) -> Result<(), MeasureError> {
        if self.max_iterations == 0 {
            return Err(MeasureError::InvalidConfig(
                "max_iterations must be at least 1".to_string(),
            ));
        }
        if !(self.convergence_tolerance > 0.0 && self.convergence_tolerance.is_finite()) {
            return Err(MeasureError::InvalidConfig(format!(
                "convergence_tolerance must be positive and finite, got {}",
                self.convergence_tolerance
            )));
        }
        if !(self.minimum_flux >= 0.0 && self.minimum_flux.is_finite()) {
            return Err(MeasureError::InvalidConfig(format!(
                "minimum_flux must be non-negative, got {}",
                self.minimum_flux
            )));
        }
        Ok(())
    }

    /// Save to JSON file
    pub fn save_to_file(&self, path: &std::path::Path) -> Result<(), std::io::Error> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, json)
    }

    /// Load from JSON file
    pub fn load_from_file(path: &std::path::Path) -> Result<Self, std::io::Error> {
        let json = std::fs::read_to_string(path)?;
        serde_json::from_str(&json)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(ShapeConfig::default().validate().is_ok());
    }

    #[test]
    fn test_zero_iterations_rejected() {
        let config = ShapeConfig {
            max_iterations: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_non_positive_tolerance_rejected() {
        let config = ShapeConfig {
            convergence_tolerance: 0.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = ShapeConfig {
            convergence_tolerance: f64::NAN,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_serde_round_trip() {
        let config = ShapeConfig {
            max_iterations: 250,
            convergence_tolerance: 1e-7,
            minimum_flux: 4.0,
            correction_method: CorrectionMethod::Ksb,
        };
        let json = serde_json::to_string(&config).unwrap();
        let back: ShapeConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.max_iterations, 250);
        assert_eq!(back.correction_method, CorrectionMethod::Ksb);
    }
}
