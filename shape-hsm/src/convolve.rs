//! 2D convolution used by the re-Gaussianization correction.
//!
//! Zero-padded, output-same-size convolution of an image with a small kernel.
//! This stays single-threaded and allocation-per-call like the rest of the
//! engine.

use ndarray::{Array2, ArrayView2};

/// Convolve an image with a kernel, keeping the image dimensions
///
/// The kernel is applied centered; samples falling outside the image are
/// treated as zero. The kernel is flipped, i.e. this is a true convolution.
///
/// # Arguments
/// * `image` - Input image
/// * `kernel` - Convolution kernel, any (odd or even) dimensions
///
/// # Returns
/// * Array of the same dimensions as `image`
pub fn convolve_same(image: &ArrayView2<f64>, kernel: &ArrayView2<f64>) -> Array2<f64> {
    let (img_rows, img_cols) = image.dim();
    let (ker_rows, ker_cols) = kernel.dim();
    let mut output = Array2::zeros((img_rows, img_cols));
    if ker_rows == 0 || ker_cols == 0 {
        return output;
    }

    let anchor_row = (ker_rows / 2) as isize;
    let anchor_col = (ker_cols / 2) as isize;

    for out_row in 0..img_rows {
        for out_col in 0..img_cols {
            let mut acc = 0.0;
            for k_row in 0..ker_rows {
                // Flipped kernel: out[r] += in[r - (k - anchor)] * ker[k]
                let in_row = out_row as isize - (k_row as isize - anchor_row);
                if in_row < 0 || in_row >= img_rows as isize {
                    continue;
                }
                for k_col in 0..ker_cols {
                    let in_col = out_col as isize - (k_col as isize - anchor_col);
                    if in_col < 0 || in_col >= img_cols as isize {
                        continue;
                    }
                    acc += image[[in_row as usize, in_col as usize]] * kernel[[k_row, k_col]];
                }
            }
            output[[out_row, out_col]] = acc;
        }
    }
    output
}
