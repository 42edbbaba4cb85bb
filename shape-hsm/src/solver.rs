//! Adaptive moment solver.
//!
//! Alternates moment accumulation and weight re-matching until the moment
//! estimate stops moving. The update step follows the published adaptive
//! moment scheme: changes are expressed in the frame scaled by the weight's
//! semi-minor axis, clamped per iteration, and the convergence statistic is
//! the largest scaled change across centroid and second moments.

use serde::{Deserialize, Serialize};

use crate::accumulate::{accumulate, RawMoments};
use crate::config::ShapeConfig;
use crate::moments::Moments;
use crate::region::PixelRegion;
use crate::weight::WeightFunction;

/// Largest per-iteration change allowed in the scaled update frame
const STEP_BOUND: f64 = 0.25;
/// Second moments beyond this bound (px^2) terminate as degenerate
const MAX_MOMENT: f64 = 8000.0;
/// Centroid drift from the initial guess beyond this bound (px) terminates
const MAX_CENTROID_SHIFT: f64 = 15.0;

/// Terminal state of one solver run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SolverStatus {
    /// Moment changes fell below the configured tolerance
    Converged,
    /// Iteration cap reached; last-computed moments are still reported
    MaxIterationsExceeded,
    /// Weight or moment matrix became non-positive-definite, or the
    /// iteration ran away
    Degenerate,
    /// Weighted flux fell below the noise-derived threshold
    InsufficientFlux,
}

impl SolverStatus {
    /// True for `Converged` and for the flagged-but-usable iteration-cap case
    pub fn has_usable_moments(&self) -> bool {
        matches!(
            self,
            SolverStatus::Converged | SolverStatus::MaxIterationsExceeded
        )
    }
}

/// Convergence bookkeeping for one solver run, discarded at return
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConvergenceState {
    /// Iterations completed
    pub iterations: usize,
    /// Last convergence statistic (scaled moment change)
    pub last_delta: f64,
    /// Terminal status
    pub status: SolverStatus,
}

/// Initial centroid and size guess for the solver
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InitialGuess {
    /// Initial centroid x in absolute pixel coordinates
    pub x: f64,
    /// Initial centroid y in absolute pixel coordinates
    pub y: f64,
    /// Initial circular weight width in pixels
    pub sigma: f64,
}

impl InitialGuess {
    /// Guess at `(x, y)` with a default 1.5 px width
    pub fn at(x: f64, y: f64) -> Self {
        Self { x, y, sigma: 1.5 }
    }
}

/// Result of one adaptive-moment solve: best-effort moments plus the
/// convergence record
#[derive(Debug, Clone)]
pub struct SolveOutcome {
    /// Last-computed moments; only trustworthy when
    /// `convergence.status.has_usable_moments()` holds
    pub moments: Moments,
    /// Convergence record
    pub convergence: ConvergenceState,
}

/// Run the adaptive moment iteration over a region
///
/// The weight starts circular at the initial guess and is re-matched to the
/// measured moments every iteration; the centroid is re-estimated from the
/// weighted first moments at the same time, coupling position and shape
/// convergence. All failure states are terminal; the solver never retries.
pub fn solve_moments(
    region: &PixelRegion<'_>,
    guess: &InitialGuess,
    config: &ShapeConfig,
) -> SolveOutcome {
    let sigma0 = if guess.sigma > 0.0 && guess.sigma.is_finite() {
        guess.sigma
    } else {
        1.0
    };

    let mut x0 = guess.x;
    let mut y0 = guess.y;
    let mut mxx = sigma0 * sigma0;
    let mut mxy = 0.0_f64;
    let mut myy = sigma0 * sigma0;

    let mut shiftscale0 = 0.0_f64;
    let mut last_raw = RawMoments::default();
    let mut delta = f64::INFINITY;
    let mut status = SolverStatus::MaxIterationsExceeded;
    let mut iterations = 0;

    for iter in 1..=config.max_iterations {
        iterations = iter;

        let weight = match WeightFunction::new(x0, y0, mxx, mxy, myy) {
            Ok(w) => w,
            Err(e) => {
                log::debug!("weight degenerate at iteration {iter}: {e}");
                status = SolverStatus::Degenerate;
                break;
            }
        };

        let raw = accumulate(region, &weight);
        if raw.flux <= 0.0 || raw.significance() < config.minimum_flux {
            log::debug!(
                "insufficient flux at iteration {iter}: flux={:.3e}, significance={:.2}",
                raw.flux,
                raw.significance()
            );
            last_raw = raw;
            status = SolverStatus::InsufficientFlux;
            break;
        }
        last_raw = raw;

        // Update frame scaled by the semi-minor axis of the current weight
        let (_, semi_b2) = weight.semi_axes_squared();
        if semi_b2 <= 0.0 {
            status = SolverStatus::Degenerate;
            break;
        }
        let shiftscale = semi_b2.sqrt();
        if iter == 1 {
            shiftscale0 = shiftscale;
        }

        let amp = raw.flux;
        let mut dx = 2.0 * raw.sum_x / (amp * shiftscale);
        let mut dy = 2.0 * raw.sum_y / (amp * shiftscale);
        let mut dxx = 4.0 * (raw.sum_xx / amp - 0.5 * mxx) / semi_b2;
        let mut dxy = 4.0 * (raw.sum_xy / amp - 0.5 * mxy) / semi_b2;
        let mut dyy = 4.0 * (raw.sum_yy / amp - 0.5 * myy) / semi_b2;

        // Clamp the step so a bad early weight cannot overshoot
        for d in [&mut dx, &mut dy, &mut dxx, &mut dxy, &mut dyy] {
            *d = d.clamp(-STEP_BOUND, STEP_BOUND);
        }

        // Convergence statistic: centroid changes enter quadratically,
        // moment changes linearly, all in the scaled frame
        let mut cf = dx.abs().max(dy.abs());
        cf *= cf;
        cf = cf.max(dxx.abs()).max(dxy.abs()).max(dyy.abs());
        cf = cf.sqrt();
        if shiftscale < shiftscale0 {
            cf *= shiftscale0 / shiftscale;
        }
        delta = cf;

        x0 += dx * shiftscale;
        y0 += dy * shiftscale;
        mxx += dxx * semi_b2;
        mxy += dxy * semi_b2;
        myy += dyy * semi_b2;

        // Runaway guards
        if mxx.abs() > MAX_MOMENT
            || mxy.abs() > MAX_MOMENT
            || myy.abs() > MAX_MOMENT
            || (x0 - guess.x).abs() > MAX_CENTROID_SHIFT
            || (y0 - guess.y).abs() > MAX_CENTROID_SHIFT
        {
            log::debug!("moment iteration ran away at iteration {iter}");
            status = SolverStatus::Degenerate;
            break;
        }
        if !(mxx > 0.0 && myy > 0.0 && mxx * myy - mxy * mxy > 0.0) {
            status = SolverStatus::Degenerate;
            break;
        }

        if cf < config.convergence_tolerance {
            status = SolverStatus::Converged;
            break;
        }
    }

    if status == SolverStatus::MaxIterationsExceeded {
        log::debug!(
            "moment iteration hit cap of {} (last delta {delta:.3e})",
            config.max_iterations
        );
    }

    let amp = last_raw.flux;
    let moments = Moments {
        x: x0,
        y: y0,
        xx: mxx,
        xy: mxy,
        yy: myy,
        flux: 2.0 * amp,
        rho4: if amp > 0.0 {
            last_raw.sum_rho4 / amp
        } else {
            f64::NAN
        },
    };

    SolveOutcome {
        moments,
        convergence: ConvergenceState {
            iterations,
            last_delta: delta,
            status,
        },
    }
}
