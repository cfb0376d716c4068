//! Gait configuration loader — reads a JSON settings file for one experiment.
//!
//! Every field has a default, so a partial file only overrides what it names.
//! The defaults reproduce the steady-state walking and perturbation experiment
//! the model was tuned against.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::ConfigError;

/// Which pendulum axis a quantity applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    /// Antero-posterior (walking direction).
    Ap,
    /// Medio-lateral (sideways).
    Ml,
}

impl std::fmt::Display for Axis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Axis::Ap => write!(f, "ap"),
            Axis::Ml => write!(f, "ml"),
        }
    }
}

/// Top-level gait configuration, loaded from JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GaitConfig {
    pub gravity: f64,

    /// Resolution of the horizon grid (s).
    pub t_step: f64,

    /// Length of the horizon scan (s). Must be a multiple of `t_step`.
    pub t_horizon: f64,

    /// Stance pendulum length (m).
    pub leg_length: f64,

    /// Hip-to-swing-leg-mass distance (m), straight knee.
    pub swing_leg_length: f64,

    /// Heel-to-toe length (m). The AP CoP offsets must fit within it.
    pub foot_length: f64,

    pub mass_total: f64,
    pub mass_swing_leg: f64,

    /// Candidate CoP offsets relative to the stance foot.
    pub cop_offsets_ap: Vec<f64>,
    pub cop_offsets_ml: Vec<f64>,

    /// Foot placement = XCoM + offset. The ML offset flips sign with the swing leg.
    pub xcom_offset_ap: f64,
    pub xcom_offset_ml: f64,

    pub initial_ap: AxisInit,
    pub initial_ml: AxisInit,

    pub gains: CostGains,

    pub n_step_steady_state: usize,
    pub n_step_post_perturbation: usize,

    pub cop_modulation_steady_state: bool,
    pub cop_modulation_perturbation: bool,

    pub perturbation: PerturbationConfig,

    /// Keep every per-candidate cost curve for each step.
    pub record_landscapes: bool,
}

/// Initial pendulum state for one axis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AxisInit {
    pub com_pos: f64,
    pub com_vel: f64,
    pub cop_pos: f64,
    /// Swing leg angle at the start of the first swing.
    pub leg_angle: f64,
}

/// Weights of the cost terms in the total.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CostGains {
    pub swing_ap: f64,
    pub swing_ml: f64,
    pub sts: f64,
    pub ankle_ap: f64,
    pub ankle_ml: f64,
}

impl Default for CostGains {
    fn default() -> Self {
        Self {
            swing_ap: 1.0,
            swing_ml: 1.0,
            sts: 0.1,
            ankle_ap: 0.33,
            ankle_ml: 1.0,
        }
    }
}

/// Velocity perturbations applied to forks of the steady-state gait.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PerturbationConfig {
    pub axis: Axis,
    /// Velocity deltas (m/s), one trial each.
    pub magnitudes: Vec<f64>,
}

impl Default for PerturbationConfig {
    fn default() -> Self {
        Self {
            axis: Axis::Ap,
            magnitudes: [-0.04, -0.08, -0.12, -0.16, 0.04, 0.08, 0.12, 0.16]
                .iter()
                .map(|fraction| 9.81 * 0.15 * fraction)
                .collect(),
        }
    }
}

/// Evenly spaced values, inclusive of both ends.
pub fn linspace(start: f64, end: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let delta = (end - start) / (n - 1) as f64;
            (0..n).map(|i| start + delta * i as f64).collect()
        }
    }
}

/// Six AP offsets spanning the foot, starting just behind the foot origin.
pub fn cop_offsets_across_foot(foot_length: f64) -> Vec<f64> {
    let cop_ap_minimal = -0.05;
    linspace(cop_ap_minimal, cop_ap_minimal + foot_length, 6)
}

impl Default for GaitConfig {
    fn default() -> Self {
        let mass_total = 80.0;
        let foot_length = 0.21;
        Self {
            gravity: 9.81,
            t_step: 0.001,
            t_horizon: 1.0,
            leg_length: 1.0,
            swing_leg_length: 0.447,
            foot_length,
            mass_total,
            mass_swing_leg: 0.161 * mass_total,
            cop_offsets_ap: cop_offsets_across_foot(foot_length),
            cop_offsets_ml: vec![0.0],
            xcom_offset_ap: -0.1364,
            xcom_offset_ml: 0.0132,
            initial_ap: AxisInit {
                com_vel: 0.625,
                ..AxisInit::default()
            },
            initial_ml: AxisInit {
                com_vel: 0.028,
                ..AxisInit::default()
            },
            gains: CostGains::default(),
            n_step_steady_state: 20,
            n_step_post_perturbation: 1,
            cop_modulation_steady_state: false,
            cop_modulation_perturbation: true,
            perturbation: PerturbationConfig::default(),
            record_landscapes: false,
        }
    }
}

impl GaitConfig {
    /// Load configuration from a JSON file. Falls back to defaults if the file is missing.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::warn!(
                "Config file not found at {}, using defaults",
                path.display()
            );
            return Ok(Self::default());
        }

        let contents =
            std::fs::read_to_string(path).context("Failed to read gait config file")?;

        let config = Self::from_json_str(&contents).context("Failed to parse gait config JSON")?;
        config.validate().context("Invalid gait config")?;

        Ok(config)
    }

    pub fn from_json_str(contents: &str) -> serde_json::Result<Self> {
        serde_json::from_str(contents)
    }

    /// Number of points on the horizon grid.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn horizon_len(&self) -> usize {
        (self.t_horizon / self.t_step).round() as usize
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("gravity", self.gravity),
            ("t_step", self.t_step),
            ("t_horizon", self.t_horizon),
            ("leg_length", self.leg_length),
            ("swing_leg_length", self.swing_leg_length),
            ("foot_length", self.foot_length),
            ("mass_total", self.mass_total),
            ("mass_swing_leg", self.mass_swing_leg),
        ];
        for (field, value) in positive {
            if !value.is_finite() {
                return Err(ConfigError::NonFinite { field, value });
            }
            if value <= 0.0 {
                return Err(ConfigError::NonPositive { field, value });
            }
        }

        let ratio = self.t_horizon / self.t_step;
        if (ratio - ratio.round()).abs() > 1e-6 || ratio.round() < 1.0 {
            return Err(ConfigError::HorizonNotMultiple {
                t_horizon: self.t_horizon,
                t_step: self.t_step,
            });
        }

        let gains = [
            ("gain_swing_ap", self.gains.swing_ap),
            ("gain_swing_ml", self.gains.swing_ml),
            ("gain_sts", self.gains.sts),
            ("gain_ankle_ap", self.gains.ankle_ap),
            ("gain_ankle_ml", self.gains.ankle_ml),
        ];
        for (field, value) in gains {
            if !value.is_finite() {
                return Err(ConfigError::NonFinite { field, value });
            }
            if value < 0.0 {
                return Err(ConfigError::NegativeGain { field, value });
            }
        }

        for (field, offsets) in [
            ("cop_offsets_ap", &self.cop_offsets_ap),
            ("cop_offsets_ml", &self.cop_offsets_ml),
        ] {
            if offsets.is_empty() {
                return Err(ConfigError::EmptyOffsets(field));
            }
            if let Some(&value) = offsets.iter().find(|v| !v.is_finite()) {
                return Err(ConfigError::NonFinite { field, value });
            }
        }

        let (lo, hi) = self
            .cop_offsets_ap
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
                (lo.min(v), hi.max(v))
            });
        if hi - lo > self.foot_length + 1e-9 {
            return Err(ConfigError::CopSpanExceedsFoot {
                span: hi - lo,
                foot_length: self.foot_length,
            });
        }

        let finite = [
            ("xcom_offset_ap", self.xcom_offset_ap),
            ("xcom_offset_ml", self.xcom_offset_ml),
            ("initial_ap.com_pos", self.initial_ap.com_pos),
            ("initial_ap.com_vel", self.initial_ap.com_vel),
            ("initial_ap.cop_pos", self.initial_ap.cop_pos),
            ("initial_ap.leg_angle", self.initial_ap.leg_angle),
            ("initial_ml.com_pos", self.initial_ml.com_pos),
            ("initial_ml.com_vel", self.initial_ml.com_vel),
            ("initial_ml.cop_pos", self.initial_ml.cop_pos),
            ("initial_ml.leg_angle", self.initial_ml.leg_angle),
        ];
        for (field, value) in finite {
            if !value.is_finite() {
                return Err(ConfigError::NonFinite { field, value });
            }
        }

        if let Some(&delta) = self.perturbation.magnitudes.iter().find(|v| !v.is_finite()) {
            return Err(ConfigError::InvalidPerturbation(delta));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn default_config_is_valid() {
        let config = GaitConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.horizon_len(), 1000);
        assert_eq!(config.cop_offsets_ap.len(), 6);
        assert_relative_eq!(config.cop_offsets_ap[0], -0.05);
        assert_relative_eq!(config.cop_offsets_ap[5], 0.16, epsilon = 1e-12);
        assert_relative_eq!(config.mass_swing_leg, 12.88, epsilon = 1e-12);
        assert_eq!(config.perturbation.magnitudes.len(), 8);
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config = GaitConfig::from_json_str(
            r#"{ "t_step": 0.01, "gains": { "sts": 0.5 }, "perturbation": { "axis": "ml" } }"#,
        )
        .unwrap();
        assert_relative_eq!(config.t_step, 0.01);
        assert_relative_eq!(config.gains.sts, 0.5);
        assert_relative_eq!(config.gains.ankle_ap, 0.33);
        assert_eq!(config.perturbation.axis, Axis::Ml);
        assert_eq!(config.perturbation.magnitudes.len(), 8);
        assert_relative_eq!(config.initial_ap.com_vel, 0.625);
    }

    #[test]
    fn horizon_must_be_multiple_of_step() {
        let config = GaitConfig {
            t_step: 0.003,
            t_horizon: 1.0,
            ..GaitConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::HorizonNotMultiple { .. })
        ));
    }

    #[test]
    fn empty_offsets_rejected() {
        let config = GaitConfig {
            cop_offsets_ml: Vec::new(),
            ..GaitConfig::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::EmptyOffsets("cop_offsets_ml"))
        );
    }

    #[test]
    fn negative_gain_rejected() {
        let mut config = GaitConfig::default();
        config.gains.ankle_ml = -1.0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::NegativeGain { field: "gain_ankle_ml", .. })
        ));
    }

    #[test]
    fn non_positive_step_rejected() {
        let config = GaitConfig {
            t_step: 0.0,
            ..GaitConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::NonPositive { field: "t_step", .. })
        ));
    }

    #[test]
    fn cop_offsets_must_fit_under_foot() {
        let config = GaitConfig {
            foot_length: 0.15,
            ..GaitConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::CopSpanExceedsFoot { .. })
        ));

        let config = GaitConfig {
            foot_length: 0.15,
            cop_offsets_ap: cop_offsets_across_foot(0.15),
            ..GaitConfig::default()
        };
        assert!(config.validate().is_ok());
        assert_relative_eq!(config.cop_offsets_ap[5], 0.10, epsilon = 1e-12);
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let config = GaitConfig::load(Path::new("/nonexistent/gait_config.json")).unwrap();
        assert_eq!(config, GaitConfig::default());
    }

    #[test]
    fn linspace_is_inclusive() {
        let values = linspace(0.0, 1.0, 5);
        assert_eq!(values, vec![0.0, 0.25, 0.5, 0.75, 1.0]);
        assert!(linspace(0.0, 1.0, 0).is_empty());
        assert_eq!(linspace(2.0, 3.0, 1), vec![2.0]);
    }
}
