use crate::core::models::atoms::AtomicSystem;
use crate::engine::error::EngineError;

/// Iteration cap applied when the caller does not set one. The relaxation
/// procedure itself imposes no cap and defers to this default.
pub const DEFAULT_MAX_ITERATIONS: usize = 100_000;

/// A generalized-coordinate view the minimizer can drive.
///
/// Implementations decide what the coordinates mean: bare atomic positions
/// ([`crate::engine::filter::PositionFilter`]) or positions plus cell degrees
/// of freedom ([`crate::engine::filter::CellFilter`]).
pub trait Optimizable {
    /// Current flat coordinate vector.
    fn coordinates(&self) -> Vec<f64>;

    /// Writes a new flat coordinate vector back into the underlying system.
    fn set_coordinates(&mut self, coordinates: &[f64]) -> Result<(), EngineError>;

    /// Potential energy and generalized forces (negative gradient) at the
    /// current coordinates.
    fn forces(&mut self) -> Result<(f64, Vec<f64>), EngineError>;

    /// Snapshot of the underlying atomic system, for per-step observers.
    fn system(&self) -> &AtomicSystem;
}

/// Per-step observer, called once per optimizer step with the current system
/// and its potential energy.
pub type StepObserver<'a> = Box<dyn FnMut(&AtomicSystem, f64) -> Result<(), EngineError> + 'a>;

/// FIRE minimizer (fast inertial relaxation engine) with the standard
/// parameter set.
///
/// The sole stopping condition is the maximum absolute force component
/// dropping to or below the requested threshold; the iteration cap exists
/// only to bound runaway runs and surfaces as a convergence error.
pub struct Fire<'a> {
    dt_start: f64,
    dt_max: f64,
    n_min: usize,
    f_inc: f64,
    f_dec: f64,
    alpha_start: f64,
    f_alpha: f64,
    max_step: f64,
    max_iterations: usize,
    observer: Option<StepObserver<'a>>,
}

impl Default for Fire<'_> {
    fn default() -> Self {
        Self {
            dt_start: 0.1,
            dt_max: 1.0,
            n_min: 5,
            f_inc: 1.1,
            f_dec: 0.5,
            alpha_start: 0.1,
            f_alpha: 0.99,
            max_step: 0.2,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            observer: None,
        }
    }
}

impl<'a> Fire<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attaches a per-step observer (used to record trajectories).
    pub fn with_observer(mut self, observer: StepObserver<'a>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Minimizes until `max |force component| <= fmax`. Returns the number of
    /// steps taken.
    pub fn run(
        &mut self,
        target: &mut impl Optimizable,
        fmax: f64,
    ) -> Result<usize, EngineError> {
        let mut x = target.coordinates();
        let mut v = vec![0.0; x.len()];
        let mut dt = self.dt_start;
        let mut alpha = self.alpha_start;
        let mut steps_downhill = 0usize;

        for iteration in 0..self.max_iterations {
            let (energy, f) = target.forces()?;
            if let Some(observer) = self.observer.as_mut() {
                observer(target.system(), energy)?;
            }
            let current_fmax = f.iter().fold(0.0f64, |m, c| m.max(c.abs()));
            if current_fmax <= fmax {
                return Ok(iteration);
            }

            let power: f64 = f.iter().zip(&v).map(|(fi, vi)| fi * vi).sum();
            if power > 0.0 {
                steps_downhill += 1;
                if steps_downhill > self.n_min {
                    dt = (dt * self.f_inc).min(self.dt_max);
                    alpha *= self.f_alpha;
                }
            } else {
                v.iter_mut().for_each(|vi| *vi = 0.0);
                alpha = self.alpha_start;
                dt *= self.f_dec;
                steps_downhill = 0;
            }

            let v_norm = v.iter().map(|c| c * c).sum::<f64>().sqrt();
            let f_norm = f.iter().map(|c| c * c).sum::<f64>().sqrt();
            if f_norm > 1e-12 {
                for (vi, fi) in v.iter_mut().zip(&f) {
                    *vi = (1.0 - alpha) * *vi + alpha * v_norm * fi / f_norm;
                }
            }
            for (vi, fi) in v.iter_mut().zip(&f) {
                *vi += dt * fi;
            }

            let mut step: Vec<f64> = v.iter().map(|vi| dt * vi).collect();
            let largest = step.iter().fold(0.0f64, |m, c| m.max(c.abs()));
            if largest > self.max_step {
                let scale = self.max_step / largest;
                step.iter_mut().for_each(|c| *c *= scale);
            }

            for (xi, si) in x.iter_mut().zip(&step) {
                *xi += si;
            }
            target.set_coordinates(&x)?;
        }

        Err(EngineError::Convergence {
            iterations: self.max_iterations,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::{Matrix3, Vector3};

    /// A quadratic bowl in two coordinates, with a dummy system snapshot.
    struct Paraboloid {
        x: Vec<f64>,
        snapshot: AtomicSystem,
    }

    impl Paraboloid {
        fn new() -> Self {
            Self {
                x: vec![1.0, -2.0],
                snapshot: AtomicSystem::new(
                    vec!["H".into()],
                    vec![Vector3::zeros()],
                    Matrix3::identity(),
                )
                .unwrap(),
            }
        }
    }

    impl Optimizable for Paraboloid {
        fn coordinates(&self) -> Vec<f64> {
            self.x.clone()
        }

        fn set_coordinates(&mut self, coordinates: &[f64]) -> Result<(), EngineError> {
            self.x = coordinates.to_vec();
            Ok(())
        }

        fn forces(&mut self) -> Result<(f64, Vec<f64>), EngineError> {
            let energy = self.x.iter().map(|c| c * c).sum::<f64>();
            let forces = self.x.iter().map(|c| -2.0 * c).collect();
            Ok((energy, forces))
        }

        fn system(&self) -> &AtomicSystem {
            &self.snapshot
        }
    }

    #[test]
    fn fire_minimizes_a_quadratic_bowl_to_the_requested_threshold() {
        let mut bowl = Paraboloid::new();
        let steps = Fire::new().run(&mut bowl, 1e-6).unwrap();
        assert!(steps > 0);
        assert!(bowl.x.iter().all(|c| c.abs() < 1e-5));
    }

    #[test]
    fn already_converged_input_takes_zero_steps() {
        let mut bowl = Paraboloid::new();
        bowl.x = vec![0.0, 0.0];
        let steps = Fire::new().run(&mut bowl, 1e-6).unwrap();
        assert_eq!(steps, 0);
    }

    #[test]
    fn exceeding_the_iteration_cap_is_a_convergence_error() {
        let mut bowl = Paraboloid::new();
        let err = Fire::new()
            .with_max_iterations(2)
            .run(&mut bowl, 1e-12)
            .unwrap_err();
        assert!(matches!(err, EngineError::Convergence { iterations: 2 }));
    }

    #[test]
    fn observer_sees_every_step_including_the_converged_one() {
        let mut bowl = Paraboloid::new();
        let mut calls = 0usize;
        {
            let mut fire = Fire::new().with_observer(Box::new(|_, _| {
                calls += 1;
                Ok(())
            }));
            fire.run(&mut bowl, 1e-6).unwrap();
        }
        assert!(calls > 1);
    }
}
