//! Ankle modulation cost: energy to hold the CoP away from the foot's neutral point.

use ndarray::Array1;

/// `m g |offset| t`: the ankle moment sustained for `time` seconds.
#[inline]
pub fn compute_ankle_cost(mass: f64, gravity: f64, cop_offset: f64, time: f64) -> f64 {
    mass * gravity * cop_offset.abs() * time
}

/// [`compute_ankle_cost`] at every point of a time grid.
pub fn compute_ankle_cost_batch(
    mass: f64,
    gravity: f64,
    cop_offset: f64,
    time: &Array1<f64>,
) -> Array1<f64> {
    time.mapv(|t| compute_ankle_cost(mass, gravity, cop_offset, t))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn neutral_cop_is_free() {
        let time = Array1::linspace(0.1, 1.0, 10);
        assert!(compute_ankle_cost_batch(80.0, 9.81, 0.0, &time)
            .iter()
            .all(|&c| c == 0.0));
    }

    #[test]
    fn cost_grows_linearly_and_ignores_direction() {
        let forward = compute_ankle_cost(80.0, 9.81, 0.05, 0.5);
        let backward = compute_ankle_cost(80.0, 9.81, -0.05, 0.5);
        assert_relative_eq!(forward, 80.0 * 9.81 * 0.05 * 0.5);
        assert_relative_eq!(forward, backward);
        assert_relative_eq!(compute_ankle_cost(80.0, 9.81, 0.05, 1.0), 2.0 * forward);
    }

    #[test]
    fn batch_matches_scalar() {
        let time = Array1::linspace(0.01, 1.0, 100);
        let batch = compute_ankle_cost_batch(80.0, 9.81, 0.11, &time);
        for (cost, &t) in batch.iter().zip(time.iter()) {
            assert_relative_eq!(*cost, compute_ankle_cost(80.0, 9.81, 0.11, t));
        }
    }
}
