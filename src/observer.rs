//! Step diagnostics.
//!
//! The simulator reports every committed step through a [`StepObserver`], so
//! callers decide whether decisions are logged, collected or ignored.

use serde::Serialize;

/// Summary of one committed step.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepEvent {
    pub step: usize,
    pub cop_offset_ap: f64,
    pub cop_offset_ml: f64,
    /// Chosen swing duration (s).
    pub duration: f64,
    pub total_cost: f64,
    /// Candidates (offset pair x horizon sample) priced as invalid steps.
    pub invalid_candidates: usize,
    pub candidate_count: usize,
    /// The winner itself is an invalid step.
    pub winner_invalid: bool,
}

impl StepEvent {
    pub fn all_invalid(&self) -> bool {
        self.candidate_count > 0 && self.invalid_candidates == self.candidate_count
    }
}

/// Receives one event per committed step.
pub trait StepObserver {
    fn on_step(&mut self, event: &StepEvent);
}

/// Default observer: structured `tracing` events.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl StepObserver for TracingObserver {
    fn on_step(&mut self, event: &StepEvent) {
        tracing::info!(
            step = event.step,
            cop_offset_ap = event.cop_offset_ap,
            cop_offset_ml = event.cop_offset_ml,
            duration = event.duration,
            total_cost = event.total_cost,
            "Step committed"
        );
        if event.all_invalid() {
            tracing::warn!(
                step = event.step,
                candidates = event.candidate_count,
                "Every candidate is an invalid step; check CoP/XCoM offsets and initial state"
            );
        } else if event.winner_invalid {
            tracing::warn!(step = event.step, "Selected step is invalid");
        }
    }
}

/// Keeps every event; useful for tests and post-run inspection.
#[derive(Debug, Default, Clone)]
pub struct CollectingObserver {
    pub events: Vec<StepEvent>,
}

impl StepObserver for CollectingObserver {
    fn on_step(&mut self, event: &StepEvent) {
        self.events.push(event.clone());
    }
}

/// Running counters of invalid-step diagnostics.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Diagnostics {
    pub invalid_candidates: usize,
    pub all_invalid_steps: usize,
    pub invalid_winners: usize,
}

impl Diagnostics {
    pub fn record(&mut self, event: &StepEvent) {
        self.invalid_candidates += event.invalid_candidates;
        if event.all_invalid() {
            self.all_invalid_steps += 1;
        }
        if event.winner_invalid {
            self.invalid_winners += 1;
        }
    }
}
