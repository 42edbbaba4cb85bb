//! shape-math - Mathematical building blocks for galaxy shape measurement
//!
//! This crate provides the small amount of linear algebra and shape-convention
//! bookkeeping shared by the adaptive-moment engine:
//!
//! - **Moment matrices** - 2x2 positive-definite second-moment matrices with
//!   checked inversion and eigen-axis decomposition
//! - **Distortion / shear** - the two standard ellipticity conventions and the
//!   conversions between them
//! - **Distortion composition** - the Bernstein & Jarvis (2002) addition law
//!   used by rounding-kernel PSF corrections
//!
//! # Example
//!
//! ```
//! use shape_math::{moment_matrix, gaussian_sigma, Distortion};
//!
//! let m = moment_matrix(4.0, 0.0, 1.0);
//! assert!((gaussian_sigma(&m) - 2.0f64.sqrt()).abs() < 1e-12);
//!
//! let e = Distortion::from_moments(4.0, 0.0, 1.0).unwrap();
//! assert!((e.e1 - 0.6).abs() < 1e-12);
//! ```

pub mod ellipticity;
pub mod moment_matrix;

// Re-export commonly used types
pub use ellipticity::{Distortion, Shear};
pub use moment_matrix::{
    gaussian_sigma, invert_checked, moment_matrix, semi_axes_squared, DegenerateMatrixError,
};
