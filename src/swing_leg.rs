//! Swing leg energy model.
//!
//! The swing leg is a hanging pendulum driven by a hip moment. Its angle
//! follows half a cosine period from the initial to the final angle, so the
//! angular velocity is zero at lift-off and at touchdown:
//!
//! ```text
//! theta(t) = theta0 + A - A cos(2 pi f t),   A = (theta1 - theta0) / 2,   f = 1 / (2 T)
//! M(t)     = m L^2 theta''(t) + m g L sin(theta(t))
//! cost     = integral_0^T |M(t)| dt
//! ```
//!
//! The integral is a left-open Riemann sum on the grid `t_step, 2 t_step, ..., T`.

use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

use crate::error::SimError;

/// One hypothesised swing: half a cosine wave between two leg angles.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SwingTrajectory {
    pub initial_angle: f64,
    pub final_angle: f64,
    pub wave_frequency: f64,
    pub wave_amplitude: f64,
}

impl SwingTrajectory {
    pub fn new(t_swing: f64, initial_angle: f64, final_angle: f64) -> Self {
        Self {
            initial_angle,
            final_angle,
            wave_frequency: 1.0 / (2.0 * t_swing),
            wave_amplitude: (final_angle - initial_angle) / 2.0,
        }
    }

    #[inline]
    fn omega(&self) -> f64 {
        2.0 * PI * self.wave_frequency
    }

    #[inline]
    pub fn angle(&self, t: f64) -> f64 {
        self.initial_angle + self.wave_amplitude - self.wave_amplitude * (self.omega() * t).cos()
    }

    #[inline]
    pub fn velocity(&self, t: f64) -> f64 {
        self.wave_amplitude * self.omega() * (self.omega() * t).sin()
    }

    #[inline]
    pub fn acceleration(&self, t: f64) -> f64 {
        self.wave_amplitude * self.omega().powi(2) * (self.omega() * t).cos()
    }
}

/// Swing leg point mass on a massless rod, hinged at the hip.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SwingLeg {
    pub mass: f64,
    pub leg_length: f64,
    pub gravity: f64,
}

impl SwingLeg {
    pub fn new(mass: f64, gravity: f64, leg_length: f64) -> Self {
        Self {
            mass,
            leg_length,
            gravity,
        }
    }

    /// Hip moment needed to follow `swing` at time `t`.
    #[inline]
    pub fn hip_moment(&self, swing: &SwingTrajectory, t: f64) -> f64 {
        self.mass * self.leg_length.powi(2) * swing.acceleration(t)
            + self.mass * self.gravity * self.leg_length * swing.angle(t).sin()
    }

    /// Energy of one swing lasting `t_swing` seconds.
    pub fn compute_swing_cost(
        &self,
        t_step: f64,
        t_swing: f64,
        initial_angle: f64,
        final_angle: f64,
    ) -> Result<f64, SimError> {
        let n = grid_index(t_step, t_swing)? + 1;
        let swing = SwingTrajectory::new(t_swing, initial_angle, final_angle);
        Ok(self.accumulate(&swing, t_step, n))
    }

    /// Energy of a batch of swings sharing one initial angle.
    ///
    /// Candidate `i` swings to `final_angles[i]` in `t_swing[i]` seconds. All
    /// candidates are integrated on the same grid, up to `max(t_swing)`, and each
    /// one is read off at its own cutoff `round(t_swing[i] / t_step) - 1`.
    pub fn compute_swing_cost_batch(
        &self,
        t_step: f64,
        t_swing: &Array1<f64>,
        initial_angle: f64,
        final_angles: &Array1<f64>,
    ) -> Result<Array1<f64>, SimError> {
        if t_swing.len() != final_angles.len() {
            return Err(SimError::LengthMismatch {
                expected: t_swing.len(),
                got: final_angles.len(),
            });
        }
        let t_swing_max = t_swing.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let grid_len = grid_index(t_step, t_swing_max)? + 1;
        let grid = Array1::linspace(t_step, t_swing_max, grid_len);

        let mut costs = Array1::zeros(t_swing.len());
        for ((cost, &duration), &final_angle) in
            costs.iter_mut().zip(t_swing.iter()).zip(final_angles.iter())
        {
            let cutoff = grid_index(t_step, duration)?;
            let swing = SwingTrajectory::new(duration, initial_angle, final_angle);
            *cost = grid
                .iter()
                .take(cutoff + 1)
                .map(|&t| self.hip_moment(&swing, t).abs())
                .sum::<f64>()
                * t_step;
        }
        Ok(costs)
    }

    fn accumulate(&self, swing: &SwingTrajectory, t_step: f64, n: usize) -> f64 {
        (1..=n)
            .map(|k| self.hip_moment(swing, k as f64 * t_step).abs())
            .sum::<f64>()
            * t_step
    }
}

/// Zero-based grid index of `t` on `t_step, 2 t_step, ...`.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn grid_index(t_step: f64, t: f64) -> Result<usize, SimError> {
    let off_grid = SimError::SwingOffGrid {
        t_swing: t,
        t_step,
    };
    if !(t_step > 0.0 && t > 0.0 && t.is_finite()) {
        return Err(off_grid);
    }
    let ratio = t / t_step;
    if (ratio - ratio.round()).abs() > 1e-6 || ratio.round() < 1.0 {
        return Err(off_grid);
    }
    Ok(ratio.round() as usize - 1)
}
