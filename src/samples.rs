//! Per-step record of the selected gait, consumed by plotting and analysis.

use serde::Serialize;

use crate::lip::Lip2D;

/// One axis of the pendulum at the moment of foot contact.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AxisSample {
    pub com_pos: f64,
    pub com_vel: f64,
    /// Pivot during the swing that just ended.
    pub cop_pos: f64,
    pub xcom_pos: f64,
    /// New stance foot.
    pub foot_pos: f64,
}

impl AxisSample {
    pub fn at_contact(lip: &Lip2D, foot_pos: f64) -> Self {
        Self {
            com_pos: lip.com_pos(),
            com_vel: lip.com_vel(),
            cop_pos: lip.cop_pos(),
            xcom_pos: lip.xcom_pos(),
            foot_pos,
        }
    }
}

/// Cost terms of the winning candidate, before gains. `total` includes gains.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SelectedCosts {
    pub swing_ap: f64,
    pub swing_ml: f64,
    pub sts: f64,
    pub ankle_ap: f64,
    pub ankle_ml: f64,
    pub total: f64,
}

/// The selected step.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GaitSample {
    pub step: usize,
    /// Swing duration of this step (s).
    pub duration: f64,
    /// Time of foot contact since the start of the gait (s).
    pub time: f64,
    pub ap: AxisSample,
    pub ml: AxisSample,
    pub cop_offset_ap: f64,
    pub cop_offset_ml: f64,
    pub costs: SelectedCosts,
}

/// Every candidate curve evaluated during one step.
///
/// Outer indices follow the configured offset order; inner vectors follow the
/// horizon grid. `sts[ap][ml]` holds the transition cost for that offset pair.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CostLandscape {
    pub step: usize,
    pub swing_ap: Vec<Vec<f64>>,
    pub swing_ml: Vec<Vec<f64>>,
    pub sts: Vec<Vec<Vec<f64>>>,
    pub ankle_ap: Vec<Vec<f64>>,
    pub ankle_ml: Vec<Vec<f64>>,
}

/// Means over a sequence of steps.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GaitSummary {
    pub mean_step_length: f64,
    pub mean_step_width: f64,
    pub mean_swing_time: f64,
    pub mean_forward_velocity: f64,
}

/// Append-only history, one sample per committed step in step order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SampleStore {
    samples: Vec<GaitSample>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    landscapes: Vec<CostLandscape>,
}

impl SampleStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, sample: GaitSample) {
        debug_assert!(self
            .samples
            .last()
            .map_or(true, |last| last.step < sample.step && last.time < sample.time));
        self.samples.push(sample);
    }

    pub(crate) fn push_landscape(&mut self, landscape: CostLandscape) {
        self.landscapes.push(landscape);
    }

    pub fn samples(&self) -> &[GaitSample] {
        &self.samples
    }

    pub fn landscapes(&self) -> &[CostLandscape] {
        &self.landscapes
    }

    /// Landscape recorded for `step`, if landscapes were kept.
    pub fn landscape(&self, step: usize) -> Option<&CostLandscape> {
        self.landscapes.iter().find(|l| l.step == step)
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn last(&self) -> Option<&GaitSample> {
        self.samples.last()
    }

    pub fn iter(&self) -> impl Iterator<Item = &GaitSample> {
        self.samples.iter()
    }

    /// Step length/width come from consecutive foot positions, so at least two
    /// samples are needed.
    pub fn summary(&self) -> Option<GaitSummary> {
        if self.samples.len() < 2 {
            return None;
        }
        let n = self.samples.len() as f64;
        let pairs = self.samples.windows(2);
        let count = (self.samples.len() - 1) as f64;

        let (length, width) = pairs.fold((0.0, 0.0), |(length, width), pair| {
            (
                length + (pair[1].ap.foot_pos - pair[0].ap.foot_pos),
                width + (pair[1].ml.foot_pos - pair[0].ml.foot_pos).abs(),
            )
        });

        Some(GaitSummary {
            mean_step_length: length / count,
            mean_step_width: width / count,
            mean_swing_time: self.samples.iter().map(|s| s.duration).sum::<f64>() / n,
            mean_forward_velocity: self.samples.iter().map(|s| s.ap.com_vel).sum::<f64>() / n,
        })
    }
}

impl<'a> IntoIterator for &'a SampleStore {
    type Item = &'a GaitSample;
    type IntoIter = std::slice::Iter<'a, GaitSample>;

    fn into_iter(self) -> Self::IntoIter {
        self.samples.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn sample(step: usize, time: f64, foot_ap: f64, foot_ml: f64) -> GaitSample {
        let axis = |foot_pos| AxisSample {
            com_pos: 0.0,
            com_vel: 1.0,
            cop_pos: 0.0,
            xcom_pos: 0.0,
            foot_pos,
        };
        GaitSample {
            step,
            duration: 0.5,
            time,
            ap: axis(foot_ap),
            ml: axis(foot_ml),
            cop_offset_ap: 0.0,
            cop_offset_ml: 0.0,
            costs: SelectedCosts {
                swing_ap: 0.0,
                swing_ml: 0.0,
                sts: 0.0,
                ankle_ap: 0.0,
                ankle_ml: 0.0,
                total: 0.0,
            },
        }
    }

    #[test]
    fn summary_needs_two_steps() {
        let mut store = SampleStore::new();
        assert!(store.summary().is_none());
        store.push(sample(0, 0.5, 0.6, 0.1));
        assert!(store.summary().is_none());
    }

    #[test]
    fn summary_means() {
        let mut store = SampleStore::new();
        store.push(sample(0, 0.5, 0.6, 0.1));
        store.push(sample(1, 1.0, 1.2, -0.1));
        store.push(sample(2, 1.5, 1.9, 0.1));
        let summary = store.summary().unwrap();
        assert_relative_eq!(summary.mean_step_length, 0.65, epsilon = 1e-12);
        assert_relative_eq!(summary.mean_step_width, 0.2, epsilon = 1e-12);
        assert_relative_eq!(summary.mean_swing_time, 0.5);
        assert_relative_eq!(summary.mean_forward_velocity, 1.0);
        assert_eq!(store.len(), 3);
        assert_eq!((&store).into_iter().count(), 3);
    }

    #[test]
    fn landscapes_omitted_from_json_when_empty() {
        let mut store = SampleStore::new();
        store.push(sample(0, 0.5, 0.6, 0.1));
        let json = serde_json::to_value(&store).unwrap();
        assert!(json.get("landscapes").is_none());
        assert_eq!(json["samples"].as_array().map(Vec::len), Some(1));
    }
}
