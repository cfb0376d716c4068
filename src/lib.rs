//! Energy-optimal stepping for a bipedal walker modelled as two linear
//! inverted pendula, one antero-posterior (AP) and one medio-lateral (ML).
//!
//! At every step the [`Simulator`] scans a horizon of candidate swing
//! durations and CoP offsets, prices each with a swing-leg, step-to-step
//! transition and ankle cost, and commits the cheapest foot placement.

pub mod ankle;
pub mod config;
pub mod error;
pub mod lip;
pub mod observer;
pub mod perturbation;
pub mod samples;
pub mod simulator;
pub mod swing_leg;
pub mod transition;

pub use config::{Axis, GaitConfig};
pub use error::{ConfigError, SimError};
pub use lip::{Lip2D, LipTrajectory};
pub use observer::{Diagnostics, StepEvent, StepObserver, TracingObserver};
pub use perturbation::{run_trials, PerturbationTrial};
pub use samples::{GaitSample, GaitSummary, SampleStore};
pub use simulator::Simulator;
pub use swing_leg::SwingLeg;
