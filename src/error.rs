//! Error types for configuration validation and the stepping pipeline.

use thiserror::Error;

/// Configuration errors, raised before any step runs.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("Invalid value for {field}: {value} (must be > 0)")]
    NonPositive { field: &'static str, value: f64 },

    #[error("Invalid value for {field}: {value} (must be finite)")]
    NonFinite { field: &'static str, value: f64 },

    #[error("Gain {field} must be >= 0, got {value}")]
    NegativeGain { field: &'static str, value: f64 },

    #[error("t_horizon ({t_horizon}) must be an integer multiple of t_step ({t_step})")]
    HorizonNotMultiple { t_horizon: f64, t_step: f64 },

    #[error("CoP offset set {0} must not be empty")]
    EmptyOffsets(&'static str),

    #[error("AP CoP offsets span {span} m, longer than the foot ({foot_length} m)")]
    CopSpanExceedsFoot { span: f64, foot_length: f64 },

    #[error("Perturbation magnitudes must be finite, got {0}")]
    InvalidPerturbation(f64),
}

/// Errors raised while evaluating costs or advancing the simulator.
///
/// Apart from `Config`, these indicate broken bookkeeping between the horizon
/// grid and the per-candidate curves.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Index {index} out of range for trajectory of length {len}")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("Length mismatch: expected {expected}, got {got}")]
    LengthMismatch { expected: usize, got: usize },

    #[error("Swing duration {t_swing} is not a positive multiple of t_step {t_step}")]
    SwingOffGrid { t_swing: f64, t_step: f64 },

    #[error("Empty horizon")]
    EmptyHorizon,
}
