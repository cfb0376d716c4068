//! Linear inverted pendulum (LIP) in one horizontal plane.
//!
//! The centre of mass moves on a constant height above a fixed centre of
//! pressure. Between foot contacts the motion has the closed-form solution
//!
//! ```text
//! x(t) = p + (x0 - p) cosh(w0 t) + v0 / w0 sinh(w0 t)
//! v(t) = (x0 - p) w0 sinh(w0 t) + v0 cosh(w0 t)
//! ```
//!
//! with `w0 = sqrt(g / L)`. [`Lip2D`] holds one scalar state; [`LipTrajectory`]
//! holds the same pendulum evaluated at every point of a horizon grid. Both go
//! through [`closed_form`], so the scalar and batched paths cannot drift apart.

use ndarray::{Array1, Zip};
use serde::Serialize;

use crate::error::SimError;

/// Closed-form LIP solution after `t` seconds about a fixed `cop`.
#[inline]
pub fn closed_form(com_pos: f64, com_vel: f64, cop: f64, w0: f64, t: f64) -> (f64, f64) {
    let (sinh, cosh) = ((w0 * t).sinh(), (w0 * t).cosh());
    let pos = cop + (com_pos - cop) * cosh + com_vel / w0 * sinh;
    let vel = (com_pos - cop) * w0 * sinh + com_vel * cosh;
    (pos, vel)
}

/// Leg angle for a foot at `foot_pos`, counter-clockwise positive.
#[inline]
pub fn leg_angle(foot_pos: f64, com_pos: f64, leg_length: f64) -> f64 {
    ((foot_pos - com_pos) / leg_length).atan()
}

/// One planar inverted pendulum at a single instant.
///
/// `xcom_pos` and `leg_angle` are cached and refreshed by every mutator, so
/// they can never go stale relative to position, velocity or pivot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Lip2D {
    leg_length: f64,
    w0: f64,
    com_pos: f64,
    com_vel: f64,
    /// Stance foot position.
    foot_pos: f64,
    /// CoP shift within the stance foot.
    cop_offset: f64,
    xcom_pos: f64,
    leg_angle: f64,
}

impl Lip2D {
    pub fn new(com_pos: f64, com_vel: f64, cop_pos: f64, gravity: f64, leg_length: f64) -> Self {
        let mut lip = Self {
            leg_length,
            w0: (gravity / leg_length).sqrt(),
            com_pos,
            com_vel,
            foot_pos: cop_pos,
            cop_offset: 0.0,
            xcom_pos: 0.0,
            leg_angle: 0.0,
        };
        lip.refresh();
        lip
    }

    fn refresh(&mut self) {
        self.xcom_pos = self.com_pos + self.com_vel / self.w0;
        self.leg_angle = leg_angle(self.cop_pos(), self.com_pos, self.leg_length);
    }

    pub fn com_pos(&self) -> f64 {
        self.com_pos
    }

    pub fn com_vel(&self) -> f64 {
        self.com_vel
    }

    pub fn foot_pos(&self) -> f64 {
        self.foot_pos
    }

    pub fn cop_offset(&self) -> f64 {
        self.cop_offset
    }

    /// Pivot of the pendulum: stance foot plus CoP offset.
    pub fn cop_pos(&self) -> f64 {
        self.foot_pos + self.cop_offset
    }

    pub fn xcom_pos(&self) -> f64 {
        self.xcom_pos
    }

    pub fn leg_angle(&self) -> f64 {
        self.leg_angle
    }

    pub fn leg_length(&self) -> f64 {
        self.leg_length
    }

    pub fn natural_frequency(&self) -> f64 {
        self.w0
    }

    /// Advance (or, for negative `t`, rewind) the state in place about
    /// `foot_pos + cop_offset`.
    pub fn simulate(&mut self, t: f64, cop_offset: f64) {
        self.cop_offset = cop_offset;
        let (pos, vel) = closed_form(self.com_pos, self.com_vel, self.cop_pos(), self.w0, t);
        self.com_pos = pos;
        self.com_vel = vel;
        self.refresh();
    }

    /// Evaluate the pendulum at every time offset of `horizon`, leaving `self`
    /// untouched.
    pub fn simulate_horizon(&self, horizon: &Array1<f64>, cop_offset: f64) -> LipTrajectory {
        let cop = self.foot_pos + cop_offset;
        let mut com_pos = Array1::zeros(horizon.len());
        let mut com_vel = Array1::zeros(horizon.len());
        Zip::from(&mut com_pos)
            .and(&mut com_vel)
            .and(horizon)
            .for_each(|pos, vel, &t| {
                (*pos, *vel) = closed_form(self.com_pos, self.com_vel, cop, self.w0, t);
            });
        LipTrajectory::new(self, cop_offset, com_pos, com_vel)
    }

    /// `atan((foot - com) / L)`; `None` uses the current CoP.
    pub fn to_leg_angle(&self, foot_pos: Option<f64>) -> f64 {
        leg_angle(
            foot_pos.unwrap_or_else(|| self.cop_pos()),
            self.com_pos,
            self.leg_length,
        )
    }

    /// CoM and XCoM relative to `origin` (default: current CoP).
    pub fn to_local(&self, origin: Option<f64>) -> (f64, f64) {
        let origin = origin.unwrap_or_else(|| self.cop_pos());
        (self.com_pos - origin, self.xcom_pos - origin)
    }

    /// Foot placement rule: XCoM plus a fixed offset.
    pub fn step_location_xcom(&self, offset: f64) -> f64 {
        self.xcom_pos + offset
    }

    /// Replace the state at a foot contact. `cop_pos` becomes the new stance
    /// foot and the CoP offset is cleared.
    pub fn override_state(&mut self, com_pos: f64, com_vel: f64, cop_pos: f64) {
        self.com_pos = com_pos;
        self.com_vel = com_vel;
        self.foot_pos = cop_pos;
        self.cop_offset = 0.0;
        self.refresh();
    }

    /// Add an external velocity change (perturbation).
    pub fn perturb_velocity(&mut self, delta_vel: f64) {
        self.com_vel += delta_vel;
        self.refresh();
    }
}

/// A pendulum evaluated at every point of a horizon grid, with a fixed pivot.
#[derive(Debug, Clone)]
pub struct LipTrajectory {
    leg_length: f64,
    w0: f64,
    foot_pos: f64,
    cop_offset: f64,
    com_pos: Array1<f64>,
    com_vel: Array1<f64>,
    xcom_pos: Array1<f64>,
    leg_angle: Array1<f64>,
}

impl LipTrajectory {
    fn new(origin: &Lip2D, cop_offset: f64, com_pos: Array1<f64>, com_vel: Array1<f64>) -> Self {
        let w0 = origin.w0;
        let cop = origin.foot_pos + cop_offset;
        let xcom_pos = Zip::from(&com_pos)
            .and(&com_vel)
            .map_collect(|&pos, &vel| pos + vel / w0);
        let leg_angle = com_pos.mapv(|pos| leg_angle(cop, pos, origin.leg_length));
        Self {
            leg_length: origin.leg_length,
            w0,
            foot_pos: origin.foot_pos,
            cop_offset,
            com_pos,
            com_vel,
            xcom_pos,
            leg_angle,
        }
    }

    pub fn len(&self) -> usize {
        self.com_pos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.com_pos.is_empty()
    }

    pub fn com_pos(&self) -> &Array1<f64> {
        &self.com_pos
    }

    pub fn com_vel(&self) -> &Array1<f64> {
        &self.com_vel
    }

    pub fn xcom_pos(&self) -> &Array1<f64> {
        &self.xcom_pos
    }

    pub fn leg_angle(&self) -> &Array1<f64> {
        &self.leg_angle
    }

    pub fn leg_length(&self) -> f64 {
        self.leg_length
    }

    pub fn cop_offset(&self) -> f64 {
        self.cop_offset
    }

    pub fn cop_pos(&self) -> f64 {
        self.foot_pos + self.cop_offset
    }

    /// Elementwise leg angle towards `foot_pos`.
    pub fn to_leg_angle(&self, foot_pos: &Array1<f64>) -> Result<Array1<f64>, SimError> {
        self.check_len(foot_pos.len())?;
        Ok(Zip::from(foot_pos)
            .and(&self.com_pos)
            .map_collect(|&foot, &com| leg_angle(foot, com, self.leg_length)))
    }

    /// CoM and XCoM relative to a per-sample origin (default: the pivot).
    pub fn to_local(
        &self,
        origin: Option<&Array1<f64>>,
    ) -> Result<(Array1<f64>, Array1<f64>), SimError> {
        match origin {
            Some(origin) => {
                self.check_len(origin.len())?;
                Ok((&self.com_pos - origin, &self.xcom_pos - origin))
            }
            None => {
                let cop = self.cop_pos();
                Ok((self.com_pos.mapv(|x| x - cop), self.xcom_pos.mapv(|x| x - cop)))
            }
        }
    }

    pub fn step_location_xcom(&self, offset: f64) -> Array1<f64> {
        self.xcom_pos.mapv(|x| x + offset)
    }

    /// Scalar pendulum at one horizon sample.
    pub fn state_at(&self, index: usize) -> Result<Lip2D, SimError> {
        let (com_pos, com_vel) = match (self.com_pos.get(index), self.com_vel.get(index)) {
            (Some(&pos), Some(&vel)) => (pos, vel),
            _ => {
                return Err(SimError::IndexOutOfRange {
                    index,
                    len: self.len(),
                })
            }
        };
        let mut lip = Lip2D {
            leg_length: self.leg_length,
            w0: self.w0,
            com_pos,
            com_vel,
            foot_pos: self.foot_pos,
            cop_offset: self.cop_offset,
            xcom_pos: 0.0,
            leg_angle: 0.0,
        };
        lip.refresh();
        Ok(lip)
    }

    fn check_len(&self, got: usize) -> Result<(), SimError> {
        if got != self.len() {
            return Err(SimError::LengthMismatch {
                expected: self.len(),
                got,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::{assert_abs_diff_eq, assert_relative_eq};

    fn walking_lip() -> Lip2D {
        Lip2D::new(0.0, 0.625, 0.0, 9.81, 1.0)
    }

    #[test]
    fn forward_then_backward_returns_to_start() {
        for &t in &[0.001, 0.25, 0.6, 1.0] {
            let mut lip = walking_lip();
            lip.simulate(t, 0.0);
            lip.simulate(-t, 0.0);
            assert_abs_diff_eq!(lip.com_pos(), 0.0, epsilon = 1e-12);
            assert_abs_diff_eq!(lip.com_vel(), 0.625, epsilon = 1e-12);
        }
    }

    #[test]
    fn backward_solution_with_cop_offset_is_reversible() {
        let mut lip = Lip2D::new(0.1, -0.3, 0.05, 9.81, 0.9);
        lip.simulate(0.4, 0.02);
        lip.simulate(-0.4, 0.02);
        assert_abs_diff_eq!(lip.com_pos(), 0.1, epsilon = 1e-12);
        assert_abs_diff_eq!(lip.com_vel(), -0.3, epsilon = 1e-12);
    }

    #[test]
    fn xcom_consistent_after_every_mutation() {
        let mut lip = walking_lip();
        let check = |lip: &Lip2D| {
            assert_relative_eq!(
                lip.xcom_pos(),
                lip.com_pos() + lip.com_vel() / lip.natural_frequency(),
                epsilon = 1e-12
            );
            assert_relative_eq!(lip.leg_angle(), lip.to_leg_angle(None), epsilon = 1e-12);
        };
        check(&lip);
        lip.simulate(0.3, 0.01);
        check(&lip);
        lip.override_state(0.4, 0.5, 0.6);
        check(&lip);
        lip.perturb_velocity(0.2);
        check(&lip);
    }

    #[test]
    fn natural_frequency_from_gravity_and_length() {
        let lip = Lip2D::new(0.0, 0.0, 0.0, 9.81, 1.0);
        assert_relative_eq!(lip.natural_frequency(), 9.81f64.sqrt());
    }

    #[test]
    fn horizon_matches_scalar_path() {
        let lip = walking_lip();
        let horizon = Array1::linspace(0.01, 1.0, 100);
        let traj = lip.simulate_horizon(&horizon, 0.03);
        assert_eq!(traj.len(), 100);

        for (i, &t) in horizon.iter().enumerate() {
            let mut scalar = lip.clone();
            scalar.simulate(t, 0.03);
            let sampled = traj.state_at(i).unwrap();
            assert_relative_eq!(sampled.com_pos(), scalar.com_pos(), epsilon = 1e-12);
            assert_relative_eq!(sampled.com_vel(), scalar.com_vel(), epsilon = 1e-12);
            assert_relative_eq!(sampled.xcom_pos(), scalar.xcom_pos(), epsilon = 1e-12);
            assert_relative_eq!(traj.leg_angle()[i], scalar.leg_angle(), epsilon = 1e-12);
        }
        // The source pendulum is unchanged.
        assert_eq!(lip, walking_lip());
    }

    #[test]
    fn state_at_out_of_range_fails() {
        let traj = walking_lip().simulate_horizon(&Array1::linspace(0.1, 1.0, 10), 0.0);
        assert_eq!(
            traj.state_at(10),
            Err(SimError::IndexOutOfRange { index: 10, len: 10 })
        );
    }

    #[test]
    fn leg_angle_counter_clockwise_positive() {
        let lip = Lip2D::new(0.0, 0.0, 0.0, 9.81, 1.0);
        assert_relative_eq!(lip.to_leg_angle(Some(1.0)), std::f64::consts::FRAC_PI_4);
        assert_relative_eq!(lip.to_leg_angle(Some(-1.0)), -std::f64::consts::FRAC_PI_4);
        assert_eq!(lip.to_leg_angle(None), 0.0);
    }

    #[test]
    fn to_local_defaults_to_cop() {
        let mut lip = Lip2D::new(0.3, 0.0, 0.1, 9.81, 1.0);
        lip.simulate(0.0, 0.05);
        let (com, xcom) = lip.to_local(None);
        assert_relative_eq!(com, 0.15, epsilon = 1e-12);
        assert_relative_eq!(xcom, 0.15, epsilon = 1e-12);
        let (com, _) = lip.to_local(Some(0.5));
        assert_relative_eq!(com, -0.2, epsilon = 1e-12);
    }

    #[test]
    fn override_state_resets_pivot() {
        let mut lip = walking_lip();
        lip.simulate(0.5, 0.04);
        lip.override_state(0.4, 0.6, 0.55);
        assert_eq!(lip.cop_offset(), 0.0);
        assert_eq!(lip.foot_pos(), 0.55);
        assert_eq!(lip.cop_pos(), 0.55);
        assert_relative_eq!(lip.step_location_xcom(-0.1), lip.xcom_pos() - 0.1);
    }

    #[test]
    fn trajectory_length_mismatch_is_reported() {
        let traj = walking_lip().simulate_horizon(&Array1::linspace(0.1, 1.0, 10), 0.0);
        let short = Array1::zeros(3);
        assert_eq!(
            traj.to_leg_angle(&short).unwrap_err(),
            SimError::LengthMismatch { expected: 10, got: 3 }
        );
    }
}
