//! Read-only pixel region consumed by the moment solver.
//!
//! A [`PixelRegion`] bundles intensity, variance, and bad-pixel-mask views of
//! a caller-owned image with the absolute coordinate of its first pixel. The
//! engine never writes through these views; measuring many sources against
//! one image only needs a cheap view per call.

use ndarray::{s, ArrayView2};

use crate::error::RegionError;

/// Per-pixel or uniform noise variance for a region
#[derive(Debug, Clone, Copy)]
pub enum Variance<'a> {
    /// A single sky-variance value for every pixel
    Uniform(f64),
    /// Per-pixel variance array, same dimensions as the image
    PerPixel(ArrayView2<'a, f64>),
}

/// Rectangular region of interest in absolute pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Roi {
    /// Minimum x (column) coordinate, inclusive
    pub min_x: i64,
    /// Minimum y (row) coordinate, inclusive
    pub min_y: i64,
    /// Width in pixels
    pub width: usize,
    /// Height in pixels
    pub height: usize,
}

impl Roi {
    /// Square ROI centered on `(x, y)` with the given half-width
    pub fn centered(x: f64, y: f64, half_width: usize) -> Self {
        let hw = half_width as i64;
        Roi {
            min_x: x.round() as i64 - hw,
            min_y: y.round() as i64 - hw,
            width: 2 * half_width + 1,
            height: 2 * half_width + 1,
        }
    }

    /// Exclusive maximum x coordinate
    pub fn max_x(&self) -> i64 {
        self.min_x + self.width as i64
    }

    /// Exclusive maximum y coordinate
    pub fn max_y(&self) -> i64 {
        self.min_y + self.height as i64
    }
}

/// Rectangular view over intensity, variance and bad-pixel mask arrays
///
/// Coordinates are absolute: pixel `image[[row, col]]` sits at
/// `(origin_x + col, origin_y + row)`. The region is read-only to the engine
/// and owned by the caller for the duration of one measurement call.
#[derive(Debug, Clone, Copy)]
pub struct PixelRegion<'a> {
    pub(crate) image: ArrayView2<'a, f64>,
    pub(crate) variance: Variance<'a>,
    pub(crate) mask: Option<ArrayView2<'a, bool>>,
    /// Absolute (x, y) of `image[[0, 0]]`
    pub(crate) origin: (i64, i64),
}

impl<'a> PixelRegion<'a> {
    /// Create a region from caller-owned arrays
    ///
    /// # Arguments
    /// * `image` - Background-subtracted intensity values
    /// * `variance` - Uniform sky variance or per-pixel variance array
    /// * `mask` - Optional bad-pixel mask, `true` marks pixels to skip
    /// * `origin` - Absolute (x, y) coordinate of `image[[0, 0]]`
    ///
    /// # Returns
    /// * `Err(RegionError)` - If the image is empty or array shapes disagree
    pub fn new(
        image: ArrayView2<'a, f64>,
        variance: Variance<'a>,
        mask: Option<ArrayView2<'a, bool>>,
        origin: (i64, i64),
    ) -> Result<Self, RegionError> {
        let (rows, cols) = image.dim();
        if rows == 0 || cols == 0 {
            return Err(RegionError::EmptyImage { rows, cols });
        }
        if let Variance::PerPixel(v) = variance {
            if v.dim() != image.dim() {
                return Err(RegionError::VarianceShapeMismatch {
                    image: image.dim(),
                    variance: v.dim(),
                });
            }
        }
        if let Some(m) = mask {
            if m.dim() != image.dim() {
                return Err(RegionError::MaskShapeMismatch {
                    image: image.dim(),
                    mask: m.dim(),
                });
            }
        }
        Ok(Self {
            image,
            variance,
            mask,
            origin,
        })
    }

    /// Region height in pixels (rows)
    pub fn height(&self) -> usize {
        self.image.nrows()
    }

    /// Region width in pixels (columns)
    pub fn width(&self) -> usize {
        self.image.ncols()
    }

    /// Absolute (x, y) of the first pixel
    pub fn origin(&self) -> (i64, i64) {
        self.origin
    }

    /// Owned copy of the intensity pixels
    pub(crate) fn image_owned(&self) -> ndarray::Array2<f64> {
        self.image.to_owned()
    }

    /// A region with the same variance, mask, and origin over substitute
    /// intensity pixels
    ///
    /// The variance and mask views are reborrowed at the substitute image's
    /// lifetime.
    pub(crate) fn with_image<'b>(
        &'b self,
        image: ArrayView2<'b, f64>,
    ) -> Result<PixelRegion<'b>, RegionError> {
        let variance = match &self.variance {
            Variance::Uniform(v) => Variance::Uniform(*v),
            Variance::PerPixel(v) => Variance::PerPixel(v.reborrow()),
        };
        let mask = self.mask.as_ref().map(|m| m.reborrow());
        PixelRegion::new(image, variance, mask, self.origin)
    }

    /// Restrict the region to a region of interest
    ///
    /// The ROI is given in the same absolute frame as the region origin.
    ///
    /// # Returns
    /// * `Some((sub, truncated))` - The overlapping sub-region; `truncated`
    ///   is true when the ROI extended past the region bounds
    /// * `None` - ROI does not overlap the region at all
    pub fn clipped(&self, roi: &Roi) -> Option<(PixelRegion<'a>, bool)> {
        let (ox, oy) = self.origin;
        let max_x = ox + self.width() as i64;
        let max_y = oy + self.height() as i64;

        let x0 = roi.min_x.max(ox);
        let y0 = roi.min_y.max(oy);
        let x1 = roi.max_x().min(max_x);
        let y1 = roi.max_y().min(max_y);
        if x0 >= x1 || y0 >= y1 {
            return None;
        }
        let truncated = x0 != roi.min_x || y0 != roi.min_y || x1 != roi.max_x() || y1 != roi.max_y();

        let (c0, c1) = ((x0 - ox) as usize, (x1 - ox) as usize);
        let (r0, r1) = ((y0 - oy) as usize, (y1 - oy) as usize);

        let variance = match self.variance {
            Variance::Uniform(v) => Variance::Uniform(v),
            Variance::PerPixel(v) => Variance::PerPixel(v.slice_move(s![r0..r1, c0..c1])),
        };
        let sub = PixelRegion {
            image: self.image.slice_move(s![r0..r1, c0..c1]),
            variance,
            mask: self.mask.map(|m| m.slice_move(s![r0..r1, c0..c1])),
            origin: (x0, y0),
        };
        Some((sub, truncated))
    }

    /// True when the pixel at `(row, col)` is flagged bad
    pub(crate) fn is_bad(&self, row: usize, col: usize) -> bool {
        self.mask.map_or(false, |m| m[[row, col]])
    }

    /// Noise variance at `(row, col)`
    pub(crate) fn variance_at(&self, row: usize, col: usize) -> f64 {
        match self.variance {
            Variance::Uniform(v) => v,
            Variance::PerPixel(v) => v[[row, col]],
        }
    }

    /// Mean variance over the region, the `skyvar` entering the uncertainty
    /// estimate. For per-pixel variance this is a plain mean, which is a
    /// documented approximation inherited from the reference measurement.
    pub(crate) fn mean_variance(&self) -> f64 {
        match self.variance {
            Variance::Uniform(v) => v,
            Variance::PerPixel(v) => {
                let n = v.len();
                if n == 0 {
                    0.0
                } else {
                    v.sum() / n as f64
                }
            }
        }
    }
}
