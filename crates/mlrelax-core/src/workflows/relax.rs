use crate::core::io::{poscar, traj::TrajectoryWriter};
use crate::core::models::atoms::AtomicSystem;
use crate::engine::calculator::{Calculator, CalculatorSpec};
use crate::engine::error::EngineError;
use crate::engine::filter::{CellFilter, CellFilterOptions, PositionFilter};
use crate::engine::fire::Fire;
use crate::engine::symmetry::SymmetryConstraint;
use crate::workflows::error::WorkflowError;
use std::path::PathBuf;
use tracing::{info, instrument};

/// Settings for [`relax`], with the documented defaults.
#[derive(Debug, Clone)]
pub struct RelaxConfig {
    /// Convergence threshold on the maximum absolute force component, eV/Å.
    pub fmax: f64,
    /// Relax the cell vectors together with the positions.
    pub relax_cell: bool,
    /// Detect the space group of the input and keep it fixed throughout.
    pub symmetry: bool,
    /// Tolerance for the space-group detection.
    pub symprec: f64,
    /// Scale applied to the cell degrees of freedom in the combined view.
    pub cell_factor: f64,
    /// Random displacement amplitude applied before relaxing, in Å.
    pub rattle: Option<f64>,
    /// Model location forwarded to backends that load from disk.
    pub model_path: Option<PathBuf>,
    /// Trajectory destination; `None` disables recording.
    pub traj_file: Option<PathBuf>,
    /// Where the relaxed structure is written in POSCAR format; `None`
    /// disables the write.
    pub output_file: Option<PathBuf>,
    /// Extra cell-relaxation options forwarded to the combined view.
    pub cell_options: CellFilterOptions,
}

impl Default for RelaxConfig {
    fn default() -> Self {
        Self {
            fmax: 1e-3,
            relax_cell: true,
            symmetry: true,
            symprec: 0.01,
            cell_factor: 1000.0,
            rattle: None,
            model_path: None,
            traj_file: Some(PathBuf::from("relax.traj")),
            output_file: Some(PathBuf::from("POSCAR_relax.vasp")),
            cell_options: CellFilterOptions::default(),
        }
    }
}

/// Result of a relaxation run.
#[derive(Debug)]
pub struct RelaxOutcome {
    /// The relaxed structure. The caller's input is never modified.
    pub system: AtomicSystem,
    /// Potential energy of the relaxed structure, eV.
    pub energy: f64,
    /// Steps spent in the coarse pass (zero for position-only runs).
    pub coarse_steps: usize,
    /// Steps spent in the final pass at the full threshold.
    pub fine_steps: usize,
    /// Space group held fixed during the run, when symmetry was enabled.
    pub spacegroup: Option<i32>,
}

/// Relaxes `system` with the FIRE minimizer.
///
/// With `relax_cell` the combined position-and-cell view is minimized in two
/// passes, first at ten times the threshold and then at the threshold itself;
/// without it a single position-only pass runs at the threshold. The
/// trajectory records every step of the final pass. The input system is
/// cloned, never mutated.
pub fn relax(
    system: &AtomicSystem,
    calculator: CalculatorSpec,
    config: &RelaxConfig,
) -> Result<RelaxOutcome, WorkflowError> {
    let calculator = calculator.resolve(config.model_path.as_deref())?;
    relax_with_calculator(system, calculator.as_ref(), config)
}

/// [`relax`] with an already-constructed calculator, for callers that reuse
/// one across several runs.
#[instrument(skip_all, fields(backend = calculator.name(), atoms = system.len()))]
pub fn relax_with_calculator(
    system: &AtomicSystem,
    calculator: &dyn Calculator,
    config: &RelaxConfig,
) -> Result<RelaxOutcome, WorkflowError> {
    info!("starting relaxation");

    let mut working = system.clone();
    if let Some(magnitude) = config.rattle {
        working.rattle(magnitude);
    }

    let constraint = if config.symmetry {
        let constraint = SymmetryConstraint::detect(&working, config.symprec)?;
        info!(
            spacegroup = constraint.spacegroup_number(),
            operations = constraint.order(),
            "holding the detected space group fixed"
        );
        Some(constraint)
    } else {
        None
    };

    let mut trajectory = match config.traj_file.as_deref() {
        Some(path) => Some(TrajectoryWriter::create(path)?),
        None => None,
    };

    let (relaxed, coarse_steps, fine_steps) = if config.relax_cell {
        let mut filter = CellFilter::new(
            working,
            calculator,
            constraint.as_ref(),
            config.cell_factor,
            config.cell_options,
        );
        let coarse_steps = Fire::new().run(&mut filter, config.fmax * 10.0)?;
        let fine_steps = {
            let mut fire = Fire::new();
            if let Some(writer) = trajectory.as_mut() {
                fire = fire.with_observer(Box::new(move |snapshot: &AtomicSystem, energy| {
                    writer
                        .write_frame(snapshot, Some(energy))
                        .map_err(EngineError::from)
                }));
            }
            fire.run(&mut filter, config.fmax)?
        };
        (filter.into_system(), coarse_steps, fine_steps)
    } else {
        let mut filter = PositionFilter::new(working, calculator, constraint.as_ref());
        let fine_steps = {
            let mut fire = Fire::new();
            if let Some(writer) = trajectory.as_mut() {
                fire = fire.with_observer(Box::new(move |snapshot: &AtomicSystem, energy| {
                    writer
                        .write_frame(snapshot, Some(energy))
                        .map_err(EngineError::from)
                }));
            }
            fire.run(&mut filter, config.fmax)?
        };
        (filter.into_system(), 0, fine_steps)
    };
    drop(trajectory);

    let energy = calculator.evaluate(&relaxed)?.energy;
    if let Some(path) = config.output_file.as_deref() {
        poscar::write(&relaxed, path)?;
    }
    info!(energy, coarse_steps, fine_steps, "relaxation converged");

    Ok(RelaxOutcome {
        system: relaxed,
        energy,
        coarse_steps,
        fine_steps,
        spacegroup: constraint.map(|c| c.spacegroup_number()),
    })
}

/// Relaxation with the fixed pretrained PES of the `matgl` backend.
pub fn relax_with_matgl(
    system: &AtomicSystem,
    config: &RelaxConfig,
) -> Result<RelaxOutcome, WorkflowError> {
    relax(system, CalculatorSpec::from("matgl"), config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::{Matrix3, Vector3};

    fn cscl(a: f64) -> AtomicSystem {
        AtomicSystem::new(
            vec!["Cs".into(), "Cl".into()],
            vec![Vector3::zeros(), Vector3::new(a / 2.0, a / 2.0, a / 2.0)],
            Matrix3::from_diagonal(&Vector3::new(a, a, a)),
        )
        .unwrap()
    }

    fn quiet_config(dir: &std::path::Path) -> RelaxConfig {
        RelaxConfig {
            traj_file: Some(dir.join("relax.traj")),
            output_file: Some(dir.join("POSCAR_relax.vasp")),
            ..RelaxConfig::default()
        }
    }

    #[test]
    fn the_input_system_is_never_mutated() {
        let dir = tempfile::tempdir().unwrap();
        let input = cscl(4.5);
        let positions_before = input.positions().to_vec();
        let cell_before = *input.cell();
        relax(&input, CalculatorSpec::Default, &quiet_config(dir.path())).unwrap();
        assert_eq!(input.positions(), &positions_before[..]);
        assert_eq!(*input.cell(), cell_before);
    }

    #[test]
    fn relaxation_converges_below_the_force_threshold() {
        let dir = tempfile::tempdir().unwrap();
        let config = quiet_config(dir.path());
        let outcome = relax(&cscl(4.5), CalculatorSpec::Default, &config).unwrap();
        let calculator = CalculatorSpec::Default.resolve(None).unwrap();
        let evaluation = calculator.evaluate(&outcome.system).unwrap();
        assert!(evaluation.fmax() <= config.fmax);
    }

    #[test]
    fn disabling_cell_relaxation_keeps_the_cell_bit_identical() {
        let dir = tempfile::tempdir().unwrap();
        let config = RelaxConfig {
            relax_cell: false,
            symmetry: false,
            rattle: Some(0.05),
            ..quiet_config(dir.path())
        };
        let input = cscl(4.5);
        let outcome = relax(&input, CalculatorSpec::Default, &config).unwrap();
        assert_eq!(*outcome.system.cell(), *input.cell());
    }

    #[test]
    fn symmetry_constrained_relaxation_reports_the_space_group() {
        let dir = tempfile::tempdir().unwrap();
        let outcome = relax(&cscl(4.5), CalculatorSpec::Default, &quiet_config(dir.path())).unwrap();
        assert_eq!(outcome.spacegroup, Some(221));
        // Pm-3m survives the run: fractional coordinates are unchanged.
        let fractional = outcome.system.fractional_positions().unwrap();
        assert!((fractional[1] - Vector3::new(0.5, 0.5, 0.5)).amax() < 1e-8);
    }

    #[test]
    fn trajectory_and_output_files_are_written() {
        let dir = tempfile::tempdir().unwrap();
        let config = quiet_config(dir.path());
        relax(&cscl(4.5), CalculatorSpec::Default, &config).unwrap();
        let traj = std::fs::read_to_string(dir.path().join("relax.traj")).unwrap();
        assert!(traj.contains("Lattice="));
        let poscar = std::fs::read_to_string(dir.path().join("POSCAR_relax.vasp")).unwrap();
        assert!(poscar.contains("Cs"));
        assert!(poscar.contains("Direct"));
    }

    #[test]
    fn file_outputs_can_both_be_disabled() {
        let dir = tempfile::tempdir().unwrap();
        let config = RelaxConfig {
            traj_file: None,
            output_file: None,
            ..RelaxConfig::default()
        };
        relax(&cscl(4.5), CalculatorSpec::Default, &config).unwrap();
        assert!(std::fs::read_dir(dir.path()).unwrap().next().is_none());
    }

    #[test]
    fn an_invalid_backend_tag_fails_before_touching_the_structure() {
        let dir = tempfile::tempdir().unwrap();
        let err = relax(
            &cscl(4.5),
            CalculatorSpec::from("quantum-espresso"),
            &quiet_config(dir.path()),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            WorkflowError::Engine(EngineError::InvalidBackend(_))
        ));
    }
}
