//! Step-to-step transition cost.
//!
//! At foot contact the CoM velocity is redirected from being perpendicular to
//! the trailing leg to being perpendicular to the leading leg. The horizontal
//! velocity is continuous; only the vertical component changes. For a leg
//! vector `l = (dx_ap, dx_ml, L)` the vertical velocity that keeps `v . l = 0` is
//!
//! ```text
//! v_z = -(dx_ap v_ap + dx_ml v_ml) / L
//! ```
//!
//! and the cost is `0.5 m (v_z_post - v_z_pre)`.
//!
//! A step is invalid when the new foot lands on the same side of the CoM as
//! the stance foot in either axis. Invalid steps are priced at
//! [`INVALID_STEP_COST`] so the optimiser steers away from them without failing.

use nalgebra::Vector3;
use ndarray::Array1;

use crate::error::SimError;
use crate::lip::{Lip2D, LipTrajectory};

/// Cost assigned to geometrically impossible steps. Finite, so it can be
/// summed with the other terms and still compared.
pub const INVALID_STEP_COST: f64 = 1.0e12;

/// Contact geometry along one axis at the instant of touchdown.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisContact {
    pub com_pos: f64,
    pub com_vel: f64,
    /// Pivot of the trailing (current stance) leg.
    pub cop_pos: f64,
    /// Landing position of the leading leg.
    pub step_pos: f64,
}

impl AxisContact {
    /// Trailing and leading legs on opposite sides of the CoM.
    ///
    /// A zero lever arm on either side counts as invalid: the redirection is
    /// then degenerate.
    pub fn straddles_com(&self) -> bool {
        (self.com_pos - self.cop_pos) * (self.com_pos - self.step_pos) < 0.0
    }
}

/// Whether a step with this geometry is physically meaningful.
pub fn is_valid_step(ap: &AxisContact, ml: &AxisContact) -> bool {
    ap.straddles_com() && ml.straddles_com()
}

/// Vertical CoM velocity perpendicular to the leg from `pivot_*` to the CoM.
fn perpendicular_vertical_velocity(
    ap: &AxisContact,
    ml: &AxisContact,
    pivot_ap: f64,
    pivot_ml: f64,
    leg_length: f64,
) -> f64 {
    let leg = Vector3::new(ap.com_pos - pivot_ap, ml.com_pos - pivot_ml, leg_length);
    let horizontal = Vector3::new(ap.com_vel, ml.com_vel, 0.0);
    -leg.dot(&horizontal) / leg.z
}

/// Transition cost for one contact, or [`INVALID_STEP_COST`].
pub fn contact_cost(mass: f64, leg_length: f64, ap: &AxisContact, ml: &AxisContact) -> f64 {
    if !is_valid_step(ap, ml) {
        return INVALID_STEP_COST;
    }
    let pre = perpendicular_vertical_velocity(ap, ml, ap.cop_pos, ml.cop_pos, leg_length);
    let post = perpendicular_vertical_velocity(ap, ml, ap.step_pos, ml.step_pos, leg_length);
    0.5 * mass * (post - pre)
}

/// Transition cost for scalar pendulum states.
pub fn transition_cost(
    mass: f64,
    lip_ap: &Lip2D,
    lip_ml: &Lip2D,
    step_pos_ap: f64,
    step_pos_ml: f64,
) -> f64 {
    let ap = AxisContact {
        com_pos: lip_ap.com_pos(),
        com_vel: lip_ap.com_vel(),
        cop_pos: lip_ap.cop_pos(),
        step_pos: step_pos_ap,
    };
    let ml = AxisContact {
        com_pos: lip_ml.com_pos(),
        com_vel: lip_ml.com_vel(),
        cop_pos: lip_ml.cop_pos(),
        step_pos: step_pos_ml,
    };
    contact_cost(mass, lip_ap.leg_length(), &ap, &ml)
}

/// Per-sample contact geometry of two trajectories and their step locations.
fn contacts<'a>(
    traj_ap: &'a LipTrajectory,
    traj_ml: &'a LipTrajectory,
    step_pos_ap: &'a Array1<f64>,
    step_pos_ml: &'a Array1<f64>,
) -> Result<impl Iterator<Item = (AxisContact, AxisContact)> + 'a, SimError> {
    let n = traj_ap.len();
    for got in [traj_ml.len(), step_pos_ap.len(), step_pos_ml.len()] {
        if got != n {
            return Err(SimError::LengthMismatch { expected: n, got });
        }
    }
    let (cop_ap, cop_ml) = (traj_ap.cop_pos(), traj_ml.cop_pos());
    Ok((0..n).map(move |i| {
        (
            AxisContact {
                com_pos: traj_ap.com_pos()[i],
                com_vel: traj_ap.com_vel()[i],
                cop_pos: cop_ap,
                step_pos: step_pos_ap[i],
            },
            AxisContact {
                com_pos: traj_ml.com_pos()[i],
                com_vel: traj_ml.com_vel()[i],
                cop_pos: cop_ml,
                step_pos: step_pos_ml[i],
            },
        )
    }))
}

/// Transition cost at every horizon sample of an (AP, ML) trajectory pair.
pub fn transition_cost_batch(
    mass: f64,
    traj_ap: &LipTrajectory,
    traj_ml: &LipTrajectory,
    step_pos_ap: &Array1<f64>,
    step_pos_ml: &Array1<f64>,
) -> Result<Array1<f64>, SimError> {
    let leg_length = traj_ap.leg_length();
    Ok(contacts(traj_ap, traj_ml, step_pos_ap, step_pos_ml)?
        .map(|(ap, ml)| contact_cost(mass, leg_length, &ap, &ml))
        .collect())
}

/// Validity of every horizon sample of an (AP, ML) trajectory pair.
pub fn valid_steps_batch(
    traj_ap: &LipTrajectory,
    traj_ml: &LipTrajectory,
    step_pos_ap: &Array1<f64>,
    step_pos_ml: &Array1<f64>,
) -> Result<Array1<bool>, SimError> {
    Ok(contacts(traj_ap, traj_ml, step_pos_ap, step_pos_ml)?
        .map(|(ap, ml)| is_valid_step(&ap, &ml))
        .collect())
}
