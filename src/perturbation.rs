//! Perturbation trials: forks of a steady-state gait, each hit by one
//! velocity change and walked for a few more steps.
//!
//! Trials share nothing mutable, so each one runs on its own scoped thread and
//! reports back over a channel. Results come back in input order.

use crossbeam_channel::{unbounded, Receiver};
use serde::Serialize;
use std::thread;

use crate::config::Axis;
use crate::error::SimError;
use crate::observer::Diagnostics;
use crate::samples::SampleStore;
use crate::simulator::Simulator;

/// Outcome of one perturbed fork.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PerturbationTrial {
    pub index: usize,
    pub axis: Axis,
    pub delta_vel: f64,
    pub samples: SampleStore,
    pub diagnostics: Diagnostics,
}

/// Fork `base` once per magnitude, perturb, and walk `n_steps` steps.
///
/// `base` is only read.
pub fn run_trials(
    base: &Simulator,
    axis: Axis,
    magnitudes: &[f64],
    n_steps: usize,
    cop_modulation: bool,
) -> Result<Vec<PerturbationTrial>, SimError> {
    let (tx, rx) = unbounded();

    thread::scope(|scope| {
        for (index, &delta_vel) in magnitudes.iter().enumerate() {
            let tx = tx.clone();
            let mut sim = base.fork(cop_modulation);
            scope.spawn(move || {
                let span = tracing::info_span!("perturbation", index, %axis, delta_vel);
                let _guard = span.enter();

                sim.apply_perturbation(axis, delta_vel);
                let result = sim.run(n_steps).map(|()| PerturbationTrial {
                    index,
                    axis,
                    delta_vel,
                    diagnostics: sim.diagnostics(),
                    samples: sim.into_samples(),
                });
                if let Err(err) = tx.send(result) {
                    tracing::error!("Trial result dropped: {err}");
                }
            });
        }
    });
    drop(tx);

    let trials = collect_trials(&rx, magnitudes.len())?;

    tracing::info!(trials = trials.len(), %axis, "Perturbation trials complete");
    Ok(trials)
}

/// Drain the finished trials into input order. A missing result is an error.
fn collect_trials(
    rx: &Receiver<Result<PerturbationTrial, SimError>>,
    expected: usize,
) -> Result<Vec<PerturbationTrial>, SimError> {
    let mut trials = rx.try_iter().collect::<Result<Vec<_>, _>>()?;
    if trials.len() != expected {
        return Err(SimError::LengthMismatch {
            expected,
            got: trials.len(),
        });
    }
    trials.sort_by_key(|trial| trial.index);
    Ok(trials)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GaitConfig;
    use approx::assert_relative_eq;

    fn steady_state() -> Simulator {
        let config = GaitConfig {
            t_step: 0.01,
            ..GaitConfig::default()
        };
        let mut sim = Simulator::new(config, false).unwrap();
        sim.run(3).unwrap();
        sim
    }

    #[test]
    fn one_trial_per_magnitude_in_order() {
        let base = steady_state();
        let magnitudes = [0.1, -0.1, 0.05];
        let trials = run_trials(&base, Axis::Ap, &magnitudes, 2, true).unwrap();

        assert_eq!(trials.len(), 3);
        for (i, trial) in trials.iter().enumerate() {
            assert_eq!(trial.index, i);
            assert_relative_eq!(trial.delta_vel, magnitudes[i]);
            assert_eq!(trial.samples.len(), 2);
            assert_eq!(trial.samples.samples()[0].step, 3);
        }
    }

    #[test]
    fn trial_matches_manual_fork() {
        let base = steady_state();
        let trials = run_trials(&base, Axis::Ml, &[0.04], 1, false).unwrap();

        let mut manual = base.fork(false);
        manual.apply_perturbation(Axis::Ml, 0.04);
        manual.run(1).unwrap();

        assert_eq!(&trials[0].samples, manual.samples());
    }

    #[test]
    fn base_is_untouched() {
        let base = steady_state();
        let before = base.clone();
        run_trials(&base, Axis::Ap, &[0.2, -0.2], 1, true).unwrap();
        assert_eq!(base.lip_ap(), before.lip_ap());
        assert_eq!(base.samples(), before.samples());
        assert_eq!(base.steps_taken(), before.steps_taken());
    }

    #[test]
    fn no_magnitudes_no_trials() {
        let base = steady_state();
        assert!(run_trials(&base, Axis::Ap, &[], 1, true).unwrap().is_empty());
    }

    #[test]
    fn lost_trial_is_reported() {
        let base = steady_state();
        let (tx, rx) = unbounded();
        tx.send(Ok(PerturbationTrial {
            index: 0,
            axis: Axis::Ap,
            delta_vel: 0.1,
            samples: base.samples().clone(),
            diagnostics: base.diagnostics(),
        }))
        .unwrap();
        drop(tx);

        assert_eq!(
            collect_trials(&rx, 2).unwrap_err(),
            SimError::LengthMismatch {
                expected: 2,
                got: 1
            }
        );
    }
}
