//! Synthetic scene generation for measurement validation
//!
//! Provides elliptical-Gaussian spot rendering and reproducible noise for
//! exercising the solver and the PSF corrections against closed-form answers.
//! A Gaussian galaxy convolved with a Gaussian PSF is itself a Gaussian with
//! the summed covariance, so observed scenes can be rendered directly.

use ndarray::Array2;
use num_traits::Zero;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};

use crate::gaussian::render_gaussian;

/// Render an elliptical Gaussian spot into a new image
///
/// # Arguments
/// * `shape` - Output dimensions (rows, cols)
/// * `flux` - Total flux of the spot
/// * `x0`, `y0` - Spot centroid in image coordinates (x along columns)
/// * `xx`, `xy`, `yy` - Covariance (second central moments) of the spot
///
/// # Returns
/// Array2 containing the spot on a zero background
///
/// # Panics
/// Panics when the covariance matrix is not positive-definite; test scenes
/// are constructed from known-good covariances.
pub fn render_gaussian_spot(
    shape: (usize, usize),
    flux: f64,
    x0: f64,
    y0: f64,
    xx: f64,
    xy: f64,
    yy: f64,
) -> Array2<f64> {
    render_gaussian(shape, flux, x0, y0, xx, xy, yy)
        .expect("spot covariance must be positive-definite")
}

/// Render a unit-flux circular Gaussian PSF patch
///
/// The patch is square with odd `dimension` and the PSF centered on the
/// middle pixel.
pub fn gaussian_psf_patch(dimension: usize, sigma: f64) -> Array2<f64> {
    let center = (dimension / 2) as f64;
    render_gaussian_spot(
        (dimension, dimension),
        1.0,
        center,
        center,
        sigma * sigma,
        0.0,
        sigma * sigma,
    )
}

/// Generate a uniform field of the given value
pub fn uniform_field<T: Clone + Zero>(shape: (usize, usize), value: T) -> Array2<T> {
    let mut field = Array2::zeros(shape);
    field.fill(value);
    field
}

/// Add seeded Gaussian read noise to an image in place
///
/// The same seed always produces the same noise field, which the
/// determinism tests rely on.
pub fn add_gaussian_noise(image: &mut Array2<f64>, noise_sigma: f64, seed: u64) {
    let mut rng = StdRng::seed_from_u64(seed);
    let dist = Normal::new(0.0, noise_sigma).expect("noise sigma must be finite and non-negative");
    image.mapv_inplace(|v| v + dist.sample(&mut rng));
}
