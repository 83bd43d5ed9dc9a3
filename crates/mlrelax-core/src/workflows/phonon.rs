use crate::core::models::atoms::AtomicSystem;
use crate::engine::calculator::CalculatorSpec;
use crate::engine::phonon::{PhononConfig, PhononOverrides, calculate_phonons, plot_band, write_band_csv};
use crate::workflows::error::WorkflowError;
use crate::workflows::relax::{RelaxConfig, relax_with_calculator};
use nalgebra::Vector3;
use std::path::PathBuf;
use tracing::{info, instrument};

/// High-symmetry path used when the caller does not give one: the standard
/// circuit of the simple cubic Brillouin zone.
fn default_kpath() -> (Vec<Vector3<f64>>, Vec<String>) {
    (
        vec![
            Vector3::zeros(),
            Vector3::new(0.5, 0.0, 0.0),
            Vector3::new(0.5, 0.5, 0.0),
            Vector3::zeros(),
            Vector3::new(0.5, 0.5, 0.5),
        ],
        ["G", "X", "M", "G", "R"].map(String::from).to_vec(),
    )
}

/// Settings for [`phonon_with_ml`], with the documented defaults.
#[derive(Debug, Clone)]
pub struct PhononOptions {
    /// Relax the structure (with default relaxation settings) before the
    /// phonon run, reusing the same calculator.
    pub relax: bool,
    /// Render the band-structure figure after the run.
    pub plot: bool,
    /// High-symmetry point labels for the plot.
    pub knames: Option<Vec<String>>,
    /// High-symmetry path in fractional reciprocal coordinates.
    pub kvectors: Option<Vec<Vector3<f64>>>,
    /// Samples per path segment.
    pub npoints: usize,
    /// Figure destination.
    pub figname: PathBuf,
    /// Band-structure CSV destination.
    pub band_file: PathBuf,
    /// Field-by-field replacements for the dynamical-matrix settings.
    pub overrides: PhononOverrides,
}

impl Default for PhononOptions {
    fn default() -> Self {
        Self {
            relax: false,
            plot: true,
            knames: None,
            kvectors: None,
            npoints: 100,
            figname: PathBuf::from("phonon.png"),
            band_file: PathBuf::from("phonon_band.csv"),
            overrides: PhononOverrides::default(),
        }
    }
}

/// Frozen-phonon band structure of `system`.
///
/// Optionally relaxes first, assembles force constants with the (possibly
/// overridden) default settings, samples the band structure along the given
/// or default k-path, writes it as CSV, and renders the figure unless
/// plotting is disabled.
#[instrument(skip_all, fields(atoms = system.len(), relax = options.relax))]
pub fn phonon_with_ml(
    system: &AtomicSystem,
    calculator: CalculatorSpec,
    options: &PhononOptions,
) -> Result<(), WorkflowError> {
    let calculator = calculator.resolve(None)?;
    let working = if options.relax {
        relax_with_calculator(system, calculator.as_ref(), &RelaxConfig::default())?.system
    } else {
        system.clone()
    };

    let config = PhononConfig::default().with_overrides(&options.overrides);
    let model = calculate_phonons(&working, calculator.as_ref(), &config)?;

    let (kvectors, knames) = match (&options.kvectors, &options.knames) {
        (Some(vectors), names) => (vectors.clone(), names.clone().unwrap_or_default()),
        (None, _) => default_kpath(),
    };
    let band = model.band_structure(&kvectors, options.npoints);
    write_band_csv(&band, &options.band_file)?;
    info!(
        points = band.distances.len(),
        branches = model.branches(),
        band_file = %options.band_file.display(),
        "band structure written"
    );

    if options.plot {
        let labels = if knames.is_empty() { None } else { Some(&knames[..]) };
        plot_band(&band, labels, &options.figname)?;
        info!(figname = %options.figname.display(), "band figure rendered");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Matrix3;
    use serial_test::serial;
    use std::path::Path;

    fn copper() -> AtomicSystem {
        let a = 2.0 * crate::core::models::element::lookup("Cu").unwrap().covalent_radius;
        AtomicSystem::new(
            vec!["Cu".into()],
            vec![Vector3::zeros()],
            Matrix3::from_diagonal(&Vector3::new(a, a, a)),
        )
        .unwrap()
    }

    struct ChdirGuard {
        previous: PathBuf,
    }

    impl ChdirGuard {
        fn enter(path: &Path) -> Self {
            let previous = std::env::current_dir().unwrap();
            std::env::set_current_dir(path).unwrap();
            Self { previous }
        }
    }

    impl Drop for ChdirGuard {
        fn drop(&mut self) {
            let _ = std::env::set_current_dir(&self.previous);
        }
    }

    #[test]
    fn defaults_match_the_documented_values() {
        let options = PhononOptions::default();
        assert!(!options.relax);
        assert!(options.plot);
        assert!(options.knames.is_none());
        assert!(options.kvectors.is_none());
        assert_eq!(options.npoints, 100);
        assert_eq!(options.figname, PathBuf::from("phonon.png"));
        assert_eq!(options.overrides, PhononOverrides::default());
    }

    #[test]
    #[serial]
    fn band_csv_covers_every_branch_along_the_default_path() {
        let dir = tempfile::tempdir().unwrap();
        let _guard = ChdirGuard::enter(dir.path());
        let options = PhononOptions {
            plot: false,
            npoints: 5,
            band_file: dir.path().join("band.csv"),
            ..PhononOptions::default()
        };
        phonon_with_ml(&copper(), CalculatorSpec::Default, &options).unwrap();
        let content = std::fs::read_to_string(dir.path().join("band.csv")).unwrap();
        assert!(content.starts_with("distance,branch_0,branch_1,branch_2"));
        // Four segments of the default path, five samples each.
        assert_eq!(content.lines().count(), 21);
    }

    #[test]
    #[serial]
    fn relax_first_runs_the_default_relaxation_before_the_phonon_step() {
        let dir = tempfile::tempdir().unwrap();
        let _guard = ChdirGuard::enter(dir.path());
        let options = PhononOptions {
            relax: true,
            plot: false,
            npoints: 3,
            band_file: dir.path().join("band.csv"),
            ..PhononOptions::default()
        };
        phonon_with_ml(&copper(), CalculatorSpec::Default, &options).unwrap();
        // Default relaxation settings leave their usual outputs behind.
        assert!(dir.path().join("relax.traj").exists());
        assert!(dir.path().join("POSCAR_relax.vasp").exists());
        assert!(dir.path().join("band.csv").exists());
    }

    #[test]
    #[serial]
    fn dynamical_matrix_overrides_flow_through_to_the_engine() {
        let dir = tempfile::tempdir().unwrap();
        let _guard = ChdirGuard::enter(dir.path());
        let options = PhononOptions {
            plot: false,
            npoints: 2,
            band_file: dir.path().join("band.csv"),
            overrides: PhononOverrides {
                ndim: Some([1, 1, 1]),
                ..PhononOverrides::default()
            },
            ..PhononOptions::default()
        };
        phonon_with_ml(&copper(), CalculatorSpec::Default, &options).unwrap();
        // A 1x1x1 supercell of one atom leaves only acoustic branches, all
        // zero after the sum rule.
        let content = std::fs::read_to_string(dir.path().join("band.csv")).unwrap();
        for line in content.lines().skip(1) {
            for field in line.split(',').skip(1) {
                assert!(field.parse::<f64>().unwrap().abs() < 1e-8);
            }
        }
    }
}
