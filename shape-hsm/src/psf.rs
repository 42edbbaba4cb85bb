//! PSF characterization: adaptive moments of a PSF image or analytic model.
//!
//! A [`PsfEstimate`] is measured once and then shared (by reference) across
//! every object correction that uses the same PSF. It keeps an owned copy of
//! the PSF pixels because the re-Gaussianization correction needs the
//! residual between the PSF and its best-fit Gaussian, not just the moments.

use ndarray::Array2;

use crate::config::ShapeConfig;
use crate::error::MeasureError;
use crate::gaussian::render_gaussian;
use crate::moments::Moments;
use crate::region::{PixelRegion, Variance};
use crate::solver::{solve_moments, InitialGuess};

/// PSF image source accepted by [`measure_psf_moments`](crate::measure_psf_moments)
#[derive(Debug, Clone)]
pub enum PsfSource<'a> {
    /// A measured PSF image (e.g. a star cutout or a PSF-model realization)
    Image(PixelRegion<'a>),
    /// A circular Gaussian model, realized on a `dimension` x `dimension`
    /// patch around the centroid guess
    GaussianModel {
        /// Gaussian width in pixels
        sigma: f64,
        /// Patch side length in pixels
        dimension: usize,
    },
}

/// Converged PSF moments plus the pixels they were measured from
#[derive(Debug, Clone)]
pub struct PsfEstimate {
    moments: Moments,
    image: Array2<f64>,
    origin: (i64, i64),
}

impl PsfEstimate {
    /// Measure a PSF image and retain its pixels for later correction
    ///
    /// # Arguments
    /// * `region` - PSF pixels; variance and mask are honored by the solver
    /// * `guess` - Initial centroid and width for the moment iteration
    /// * `config` - Solver settings; the correction method is not consulted
    ///
    /// # Returns
    /// * `Err(MeasureError::PsfMeasurement)` - Solver did not produce usable
    ///   moments; no object correction is possible with this PSF
    pub fn from_image(
        region: &PixelRegion<'_>,
        guess: &InitialGuess,
        config: &ShapeConfig,
    ) -> Result<Self, MeasureError> {
        config.validate()?;
        let outcome = solve_moments(region, guess, config);
        if !outcome.convergence.status.has_usable_moments()
            || !outcome.moments.is_positive_definite()
        {
            return Err(MeasureError::PsfMeasurement {
                status: outcome.convergence.status,
                iterations: outcome.convergence.iterations,
            });
        }
        Ok(Self {
            moments: outcome.moments,
            image: region.image_owned(),
            origin: region.origin(),
        })
    }

    /// Characterize a circular Gaussian PSF model of the given width
    ///
    /// The model is realized on a `dimension` x `dimension` patch and pushed
    /// through the same moment solver as a real image, so the estimate
    /// carries the same pixelization effects an image-based PSF would.
    pub fn from_gaussian(
        sigma: f64,
        dimension: usize,
        config: &ShapeConfig,
    ) -> Result<Self, MeasureError> {
        config.validate()?;
        if !(sigma > 0.0 && sigma.is_finite()) {
            return Err(MeasureError::InvalidConfig(format!(
                "PSF model sigma must be positive and finite, got {sigma}"
            )));
        }
        if dimension == 0 {
            return Err(MeasureError::InvalidConfig(
                "PSF model dimension must be at least 1".to_string(),
            ));
        }

        let center = (dimension / 2) as f64;
        let image = render_gaussian(
            (dimension, dimension),
            1.0,
            center,
            center,
            sigma * sigma,
            0.0,
            sigma * sigma,
        )
        .map_err(|e| MeasureError::InvalidConfig(format!("PSF model covariance: {e}")))?;

        let region = PixelRegion::new(image.view(), Variance::Uniform(0.0), None, (0, 0))?;
        let guess = InitialGuess {
            x: center,
            y: center,
            sigma,
        };
        let outcome = solve_moments(&region, &guess, config);
        if !outcome.convergence.status.has_usable_moments()
            || !outcome.moments.is_positive_definite()
        {
            return Err(MeasureError::PsfMeasurement {
                status: outcome.convergence.status,
                iterations: outcome.convergence.iterations,
            });
        }
        Ok(Self {
            moments: outcome.moments,
            image,
            origin: (0, 0),
        })
    }

    /// The converged PSF moments
    pub fn moments(&self) -> &Moments {
        &self.moments
    }

    /// The PSF pixels the moments were measured from
    pub(crate) fn image(&self) -> &Array2<f64> {
        &self.image
    }

    /// Absolute (x, y) of `image[[0, 0]]`
    pub(crate) fn origin(&self) -> (i64, i64) {
        self.origin
    }
}

/// Measure raw adaptive moments of a PSF, with no correction step
///
/// `guess` positions the measurement for an image source; for a Gaussian
/// model it also positions the realized patch, so the returned centroid is
/// expressed at the guess location.
///
/// # Returns
/// * `Err(MeasureError::PsfMeasurement)` - Solver terminated without usable
///   moments
pub fn measure_psf_moments(
    source: &PsfSource<'_>,
    guess: &InitialGuess,
    config: &ShapeConfig,
) -> Result<Moments, MeasureError> {
    config.validate()?;
    match source {
        PsfSource::Image(region) => {
            let outcome = solve_moments(region, guess, config);
            if !outcome.convergence.status.has_usable_moments() {
                return Err(MeasureError::PsfMeasurement {
                    status: outcome.convergence.status,
                    iterations: outcome.convergence.iterations,
                });
            }
            Ok(outcome.moments)
        }
        PsfSource::GaussianModel { sigma, dimension } => {
            if !(*sigma > 0.0 && sigma.is_finite()) {
                return Err(MeasureError::InvalidConfig(format!(
                    "PSF model sigma must be positive and finite, got {sigma}"
                )));
            }
            if *dimension == 0 {
                return Err(MeasureError::InvalidConfig(
                    "PSF model dimension must be at least 1".to_string(),
                ));
            }

            // Place the patch so the model centroid lands exactly on the guess
            let half = (*dimension / 2) as i64;
            let origin = (guess.x.round() as i64 - half, guess.y.round() as i64 - half);
            let local_x = guess.x - origin.0 as f64;
            let local_y = guess.y - origin.1 as f64;
            let image = render_gaussian(
                (*dimension, *dimension),
                1.0,
                local_x,
                local_y,
                sigma * sigma,
                0.0,
                sigma * sigma,
            )
            .map_err(|e| MeasureError::InvalidConfig(format!("PSF model covariance: {e}")))?;

            let region = PixelRegion::new(image.view(), Variance::Uniform(0.0), None, origin)?;
            let model_guess = InitialGuess {
                x: guess.x,
                y: guess.y,
                sigma: *sigma,
            };
            let outcome = solve_moments(&region, &model_guess, config);
            if !outcome.convergence.status.has_usable_moments() {
                return Err(MeasureError::PsfMeasurement {
                    status: outcome.convergence.status,
                    iterations: outcome.convergence.iterations,
                });
            }
            Ok(outcome.moments)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::{assert_abs_diff_eq, assert_relative_eq};

    #[test]
    fn test_gaussian_model_recovers_width() {
        let guess = InitialGuess::at(23.0, 34.0);
        let source = PsfSource::GaussianModel {
            sigma: 3.0,
            dimension: 35,
        };
        let m = measure_psf_moments(&source, &guess, &ShapeConfig::default()).unwrap();

        assert_abs_diff_eq!(m.x, 23.0, epsilon = 1e-3);
        assert_abs_diff_eq!(m.y, 34.0, epsilon = 1e-3);
        assert_relative_eq!(m.xx, 9.0, max_relative = 1e-3);
        assert_relative_eq!(m.yy, 9.0, max_relative = 1e-3);
        assert_abs_diff_eq!(m.xy, 0.0, epsilon = 1e-6);
        assert_relative_eq!(m.rho4, 2.0, max_relative = 1e-3);
    }

    #[test]
    fn test_estimate_matches_psf_moments_mode() {
        let config = ShapeConfig::default();
        let estimate = PsfEstimate::from_gaussian(2.0, 29, &config).unwrap();
        assert_relative_eq!(estimate.moments().xx, 4.0, max_relative = 1e-3);
        assert_relative_eq!(estimate.moments().sigma(), 2.0, max_relative = 1e-3);
    }

    #[test]
    fn test_invalid_model_rejected() {
        let config = ShapeConfig::default();
        assert!(matches!(
            PsfEstimate::from_gaussian(-1.0, 35, &config),
            Err(MeasureError::InvalidConfig(_))
        ));
        assert!(matches!(
            PsfEstimate::from_gaussian(2.0, 0, &config),
            Err(MeasureError::InvalidConfig(_))
        ));
    }
}
