//! Horizon-scan stepping policy.
//!
//! Each step the simulator forks the AP and ML pendula once per candidate CoP
//! offset, evaluates every fork over the whole horizon grid, prices every
//! (AP offset, ML offset, swing duration) triple with the swing, transition and
//! ankle models, and commits the cheapest one as the next foot contact.
//!
//! Candidates are independent values built from the committed state; the
//! committed state changes only in [`Simulator::step_with`] after selection.

use ndarray::Array1;

use crate::ankle::compute_ankle_cost_batch;
use crate::config::{Axis, GaitConfig};
use crate::error::SimError;
use crate::lip::{Lip2D, LipTrajectory};
use crate::observer::{Diagnostics, StepEvent, StepObserver, TracingObserver};
use crate::samples::{AxisSample, CostLandscape, GaitSample, SampleStore, SelectedCosts};
use crate::swing_leg::SwingLeg;
use crate::transition::{transition_cost_batch, valid_steps_batch};

/// One forked pendulum for one CoP offset, with its per-axis cost curves.
#[derive(Debug, Clone)]
struct AxisCandidate {
    cop_offset: f64,
    trajectory: LipTrajectory,
    step_pos: Array1<f64>,
    swing_cost: Array1<f64>,
    ankle_cost: Array1<f64>,
}

/// Inputs shared by every candidate of one axis.
struct AxisScan<'a> {
    lip: &'a Lip2D,
    swing_leg: &'a SwingLeg,
    initial_leg_angle: f64,
    xcom_offset: f64,
}

/// Winning (AP offset, ML offset, horizon sample).
#[derive(Debug, Clone, Copy, PartialEq)]
struct Selection {
    ap: usize,
    ml: usize,
    time: usize,
    total: f64,
    valid: bool,
}

impl Selection {
    /// Valid steps rank ahead of invalid ones whatever the gains; the total
    /// breaks ties within each class.
    fn beats(&self, other: &Selection) -> bool {
        match (self.valid, other.valid) {
            (true, false) => true,
            (false, true) => false,
            _ => self.total < other.total,
        }
    }
}

/// Walking simulator for one AP/ML pendulum pair.
#[derive(Debug, Clone)]
pub struct Simulator {
    config: GaitConfig,
    horizon: Array1<f64>,
    cop_offsets_ap: Vec<f64>,
    cop_offsets_ml: Vec<f64>,
    lip_ap: Lip2D,
    lip_ml: Lip2D,
    swing_leg_ap: SwingLeg,
    swing_leg_ml: SwingLeg,
    initial_leg_angle_ap: f64,
    initial_leg_angle_ml: f64,
    is_right_swing: bool,
    steps_taken: usize,
    elapsed: f64,
    samples: SampleStore,
    diagnostics: Diagnostics,
}

impl Simulator {
    /// Build a simulator at the configured initial state. Without CoP
    /// modulation both offset sets collapse to `[0]`.
    pub fn new(config: GaitConfig, cop_modulation: bool) -> Result<Self, SimError> {
        config.validate()?;

        let horizon = Array1::linspace(config.t_step, config.t_horizon, config.horizon_len());
        let (cop_offsets_ap, cop_offsets_ml) = offsets_for(&config, cop_modulation);

        let lip_ap = Lip2D::new(
            config.initial_ap.com_pos,
            config.initial_ap.com_vel,
            config.initial_ap.cop_pos,
            config.gravity,
            config.leg_length,
        );
        let lip_ml = Lip2D::new(
            config.initial_ml.com_pos,
            config.initial_ml.com_vel,
            config.initial_ml.cop_pos,
            config.gravity,
            config.leg_length,
        );
        let swing_leg =
            SwingLeg::new(config.mass_swing_leg, config.gravity, config.swing_leg_length);

        tracing::debug!(
            horizon_len = horizon.len(),
            ap_offsets = cop_offsets_ap.len(),
            ml_offsets = cop_offsets_ml.len(),
            "Simulator ready"
        );

        Ok(Self {
            initial_leg_angle_ap: config.initial_ap.leg_angle,
            initial_leg_angle_ml: config.initial_ml.leg_angle,
            horizon,
            cop_offsets_ap,
            cop_offsets_ml,
            lip_ap,
            lip_ml,
            swing_leg_ap: swing_leg,
            swing_leg_ml: swing_leg,
            // First swing is a right swing.
            is_right_swing: true,
            steps_taken: 0,
            elapsed: 0.0,
            samples: SampleStore::new(),
            diagnostics: Diagnostics::default(),
            config,
        })
    }

    pub fn config(&self) -> &GaitConfig {
        &self.config
    }

    pub fn horizon(&self) -> &Array1<f64> {
        &self.horizon
    }

    pub fn lip_ap(&self) -> &Lip2D {
        &self.lip_ap
    }

    pub fn lip_ml(&self) -> &Lip2D {
        &self.lip_ml
    }

    pub fn is_right_swing(&self) -> bool {
        self.is_right_swing
    }

    pub fn initial_leg_angles(&self) -> (f64, f64) {
        (self.initial_leg_angle_ap, self.initial_leg_angle_ml)
    }

    pub fn steps_taken(&self) -> usize {
        self.steps_taken
    }

    pub fn elapsed(&self) -> f64 {
        self.elapsed
    }

    pub fn samples(&self) -> &SampleStore {
        &self.samples
    }

    pub fn diagnostics(&self) -> Diagnostics {
        self.diagnostics
    }

    pub fn into_samples(self) -> SampleStore {
        self.samples
    }

    /// Independent copy of the full walking state with an empty sample store.
    ///
    /// Step numbering and elapsed time continue from `self`.
    pub fn fork(&self, cop_modulation: bool) -> Self {
        let (cop_offsets_ap, cop_offsets_ml) = offsets_for(&self.config, cop_modulation);
        Self {
            config: self.config.clone(),
            horizon: self.horizon.clone(),
            cop_offsets_ap,
            cop_offsets_ml,
            lip_ap: self.lip_ap.clone(),
            lip_ml: self.lip_ml.clone(),
            swing_leg_ap: self.swing_leg_ap,
            swing_leg_ml: self.swing_leg_ml,
            initial_leg_angle_ap: self.initial_leg_angle_ap,
            initial_leg_angle_ml: self.initial_leg_angle_ml,
            is_right_swing: self.is_right_swing,
            steps_taken: self.steps_taken,
            elapsed: self.elapsed,
            samples: SampleStore::new(),
            diagnostics: Diagnostics::default(),
        }
    }

    /// Add an external CoM velocity change to one axis.
    pub fn apply_perturbation(&mut self, axis: Axis, delta_vel: f64) {
        match axis {
            Axis::Ap => self.lip_ap.perturb_velocity(delta_vel),
            Axis::Ml => self.lip_ml.perturb_velocity(delta_vel),
        }
    }

    /// Walk `n_step` steps, logging each decision through `tracing`.
    pub fn run(&mut self, n_step: usize) -> Result<(), SimError> {
        self.run_with(n_step, &mut TracingObserver)
    }

    pub fn run_with(
        &mut self,
        n_step: usize,
        observer: &mut dyn StepObserver,
    ) -> Result<(), SimError> {
        for _ in 0..n_step {
            self.step_with(observer)?;
        }
        Ok(())
    }

    /// Scan the horizon, commit the cheapest candidate and record it.
    pub fn step_with(&mut self, observer: &mut dyn StepObserver) -> Result<GaitSample, SimError> {
        let config = &self.config;
        let gains = config.gains;

        // Foot placement offset in ML flips with the swinging leg.
        let ml_multiplier = if self.is_right_swing { 1.0 } else { -1.0 };

        let scan_ap = AxisScan {
            lip: &self.lip_ap,
            swing_leg: &self.swing_leg_ap,
            initial_leg_angle: self.initial_leg_angle_ap,
            xcom_offset: config.xcom_offset_ap,
        };
        let scan_ml = AxisScan {
            lip: &self.lip_ml,
            swing_leg: &self.swing_leg_ml,
            initial_leg_angle: self.initial_leg_angle_ml,
            xcom_offset: config.xcom_offset_ml * ml_multiplier,
        };

        let candidates_ap = self.scan_axis(&scan_ap, &self.cop_offsets_ap)?;
        let candidates_ml = self.scan_axis(&scan_ml, &self.cop_offsets_ml)?;

        // Transition cost per (AP, ML) pair, entering the total as |cost|.
        let mut sts = Vec::with_capacity(candidates_ap.len());
        let mut invalid_candidates = 0;
        for ap in &candidates_ap {
            let mut row = Vec::with_capacity(candidates_ml.len());
            for ml in &candidates_ml {
                let cost = transition_cost_batch(
                    config.mass_total,
                    &ap.trajectory,
                    &ml.trajectory,
                    &ap.step_pos,
                    &ml.step_pos,
                )?
                .mapv(f64::abs);
                let valid =
                    valid_steps_batch(&ap.trajectory, &ml.trajectory, &ap.step_pos, &ml.step_pos)?;
                invalid_candidates += valid.iter().filter(|v| !**v).count();
                row.push((cost, valid));
            }
            sts.push(row);
        }

        // First-encountered minimum over AP offset, then ML offset, then time.
        let mut best: Option<Selection> = None;
        for (i, ap) in candidates_ap.iter().enumerate() {
            for (j, ml) in candidates_ml.iter().enumerate() {
                let (sts_cost, valid) = &sts[i][j];
                for t in 0..self.horizon.len() {
                    let total = gains.swing_ap * ap.swing_cost[t]
                        + gains.swing_ml * ml.swing_cost[t]
                        + gains.sts * sts_cost[t]
                        + gains.ankle_ap * ap.ankle_cost[t]
                        + gains.ankle_ml * ml.ankle_cost[t];
                    if total.is_nan() {
                        continue;
                    }
                    let candidate = Selection {
                        ap: i,
                        ml: j,
                        time: t,
                        total,
                        valid: valid[t],
                    };
                    if best.map_or(true, |b| candidate.beats(&b)) {
                        best = Some(candidate);
                    }
                }
            }
        }
        let best = best.ok_or(SimError::EmptyHorizon)?;

        let winner_ap = &candidates_ap[best.ap];
        let winner_ml = &candidates_ml[best.ml];
        let (sts_cost, valid) = &sts[best.ap][best.ml];

        let contact_ap = winner_ap.trajectory.state_at(best.time)?;
        let contact_ml = winner_ml.trajectory.state_at(best.time)?;
        let step_pos_ap = sample_at(&winner_ap.step_pos, best.time)?;
        let step_pos_ml = sample_at(&winner_ml.step_pos, best.time)?;
        let duration = sample_at(&self.horizon, best.time)?;

        let costs = SelectedCosts {
            swing_ap: sample_at(&winner_ap.swing_cost, best.time)?,
            swing_ml: sample_at(&winner_ml.swing_cost, best.time)?,
            sts: sample_at(sts_cost, best.time)?,
            ankle_ap: sample_at(&winner_ap.ankle_cost, best.time)?,
            ankle_ml: sample_at(&winner_ml.ankle_cost, best.time)?,
            total: best.total,
        };
        let winner_invalid = !valid.get(best.time).copied().unwrap_or(false);

        let event = StepEvent {
            step: self.steps_taken,
            cop_offset_ap: winner_ap.cop_offset,
            cop_offset_ml: winner_ml.cop_offset,
            duration,
            total_cost: best.total,
            invalid_candidates,
            candidate_count: candidates_ap.len() * candidates_ml.len() * self.horizon.len(),
            winner_invalid,
        };

        if self.config.record_landscapes {
            let landscape = CostLandscape {
                step: self.steps_taken,
                swing_ap: candidates_ap.iter().map(|c| c.swing_cost.to_vec()).collect(),
                swing_ml: candidates_ml.iter().map(|c| c.swing_cost.to_vec()).collect(),
                sts: sts
                    .iter()
                    .map(|row| row.iter().map(|(cost, _)| cost.to_vec()).collect())
                    .collect(),
                ankle_ap: candidates_ap.iter().map(|c| c.ankle_cost.to_vec()).collect(),
                ankle_ml: candidates_ml.iter().map(|c| c.ankle_cost.to_vec()).collect(),
            };
            self.samples.push_landscape(landscape);
        }

        // ── Commit ──

        self.elapsed += duration;
        let sample = GaitSample {
            step: self.steps_taken,
            duration,
            time: self.elapsed,
            ap: AxisSample::at_contact(&contact_ap, step_pos_ap),
            ml: AxisSample::at_contact(&contact_ml, step_pos_ml),
            cop_offset_ap: winner_ap.cop_offset,
            cop_offset_ml: winner_ml.cop_offset,
            costs,
        };
        self.samples.push(sample.clone());

        // The stance leg at contact becomes the next swing leg.
        self.initial_leg_angle_ap = contact_ap.leg_angle();
        self.initial_leg_angle_ml = contact_ml.leg_angle();

        self.lip_ap = contact_ap;
        self.lip_ml = contact_ml;
        self.lip_ap
            .override_state(self.lip_ap.com_pos(), self.lip_ap.com_vel(), step_pos_ap);
        self.lip_ml
            .override_state(self.lip_ml.com_pos(), self.lip_ml.com_vel(), step_pos_ml);

        self.is_right_swing = !self.is_right_swing;
        self.steps_taken += 1;

        self.diagnostics.record(&event);
        observer.on_step(&event);

        Ok(sample)
    }

    /// Fork the axis pendulum once per offset and price each fork.
    fn scan_axis(
        &self,
        scan: &AxisScan<'_>,
        offsets: &[f64],
    ) -> Result<Vec<AxisCandidate>, SimError> {
        let config = &self.config;
        offsets
            .iter()
            .map(|&cop_offset| {
                let trajectory = scan.lip.simulate_horizon(&self.horizon, cop_offset);
                let step_pos = trajectory.step_location_xcom(scan.xcom_offset);
                let final_leg_angle = trajectory.to_leg_angle(&step_pos)?;
                let swing_cost = scan.swing_leg.compute_swing_cost_batch(
                    config.t_step,
                    &self.horizon,
                    scan.initial_leg_angle,
                    &final_leg_angle,
                )?;
                let ankle_cost = compute_ankle_cost_batch(
                    config.mass_total,
                    config.gravity,
                    cop_offset,
                    &self.horizon,
                );
                Ok(AxisCandidate {
                    cop_offset,
                    trajectory,
                    step_pos,
                    swing_cost,
                    ankle_cost,
                })
            })
            .collect()
    }
}

fn offsets_for(config: &GaitConfig, cop_modulation: bool) -> (Vec<f64>, Vec<f64>) {
    if cop_modulation {
        (config.cop_offsets_ap.clone(), config.cop_offsets_ml.clone())
    } else {
        (vec![0.0], vec![0.0])
    }
}

fn sample_at(values: &Array1<f64>, index: usize) -> Result<f64, SimError> {
    values.get(index).copied().ok_or(SimError::IndexOutOfRange {
        index,
        len: values.len(),
    })
}
