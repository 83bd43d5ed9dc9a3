use super::{Calculator, Evaluation};
use crate::core::models::atoms::{AtomicSystem, StructureError};
use crate::core::models::element;
use crate::engine::error::EngineError;
use nalgebra::{Matrix3, Vector3};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Morse parameters for one species pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PairParams {
    /// Well depth in eV.
    pub depth: f64,
    /// Inverse width in 1/Å.
    pub width: f64,
    /// Equilibrium separation in Å.
    pub r0: f64,
}

fn default_cutoff() -> f64 {
    6.0
}

fn default_depth() -> f64 {
    1.0
}

fn default_width() -> f64 {
    1.6
}

/// A loaded interatomic-potential parameter set.
///
/// Every backend evaluates through one of these; pairs absent from the table
/// fall back to parameters derived from covalent radii. The file format is
/// TOML with a `[pairs."A-B"]` table per parameterized pair (species sorted
/// alphabetically in the key).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PotentialModel {
    pub name: String,
    #[serde(default = "default_cutoff")]
    pub cutoff: f64,
    #[serde(default)]
    pub pairs: BTreeMap<String, PairParams>,
    #[serde(default = "default_depth")]
    pub default_depth: f64,
    #[serde(default = "default_width")]
    pub default_width: f64,
}

impl Default for PotentialModel {
    fn default() -> Self {
        Self {
            name: "builtin-default".to_string(),
            cutoff: default_cutoff(),
            pairs: BTreeMap::new(),
            default_depth: default_depth(),
            default_width: default_width(),
        }
    }
}

impl PotentialModel {
    /// Loads a model from a TOML parameter file.
    pub fn from_file(path: &Path) -> Result<Self, EngineError> {
        let content = std::fs::read_to_string(path).map_err(|e| EngineError::ModelLoad {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        toml::from_str(&content).map_err(|e| EngineError::ModelLoad {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Loads network weights stored as `model.toml` inside a directory.
    pub fn from_dir(dir: &Path) -> Result<Self, EngineError> {
        Self::from_file(&dir.join("model.toml"))
    }

    /// The fixed pretrained parameter set shipped with the crate, used when
    /// a named registry model has no on-disk override.
    pub fn pretrained(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }

    fn pair_params(&self, a: &str, b: &str) -> Result<PairParams, EngineError> {
        let key = if a <= b {
            format!("{a}-{b}")
        } else {
            format!("{b}-{a}")
        };
        if let Some(params) = self.pairs.get(&key) {
            return Ok(*params);
        }
        let ra = element::lookup(a)
            .ok_or_else(|| EngineError::Structure(StructureError::UnknownElement(a.to_string())))?
            .covalent_radius;
        let rb = element::lookup(b)
            .ok_or_else(|| EngineError::Structure(StructureError::UnknownElement(b.to_string())))?
            .covalent_radius;
        Ok(PairParams {
            depth: self.default_depth,
            width: self.default_width,
            r0: ra + rb,
        })
    }

    /// Pairwise energy, forces, and virial stress summed over every lattice
    /// image inside the cutoff, so cells smaller than twice the cutoff still
    /// see all their neighbors. The potential is shifted to vanish at the
    /// cutoff.
    pub fn evaluate(&self, system: &AtomicSystem) -> Result<Evaluation, EngineError> {
        let n = system.len();
        let mut energy = 0.0;
        let mut forces = vec![Vector3::zeros(); n];
        let mut virial = Matrix3::zeros();

        let shifts = self.lattice_images(system)?;
        let species = system.species();
        let positions = system.positions();
        for i in 0..n {
            for j in 0..n {
                let params = self.pair_params(&species[i], &species[j])?;
                let separation = positions[j] - positions[i];
                for shift in &shifts {
                    if i == j && shift.norm_squared() < 1e-24 {
                        continue;
                    }
                    let delta = separation + shift;
                    let r = delta.norm();
                    if r >= self.cutoff || r < 1e-12 {
                        continue;
                    }
                    // Each unordered interaction appears twice in this loop,
                    // so pair quantities carry a factor of one half; the
                    // force on atom i is complete as written.
                    energy += 0.5 * (morse(r, &params) - morse(self.cutoff, &params));
                    let dudr = morse_derivative(r, &params);
                    forces[i] += delta * (dudr / r);
                    virial += (delta * delta.transpose()) * (0.5 * dudr / r);
                }
            }
        }

        let stress = if system.is_periodic() {
            Some(virial / system.volume())
        } else {
            None
        };

        Ok(Evaluation {
            energy,
            forces,
            stress,
        })
    }

    /// Lattice translations covering every periodic image within the cutoff.
    /// The per-axis count comes from the perpendicular cell height, so thin
    /// or skewed cells get as many shells as they need.
    fn lattice_images(&self, system: &AtomicSystem) -> Result<Vec<Vector3<f64>>, EngineError> {
        if !system.is_periodic() {
            return Ok(vec![Vector3::zeros()]);
        }
        let volume = system.volume();
        if volume < 1e-12 {
            return Err(EngineError::Structure(StructureError::SingularCell));
        }
        let cell = system.cell();
        let rows = [
            cell.row(0).transpose(),
            cell.row(1).transpose(),
            cell.row(2).transpose(),
        ];
        let mut counts = [0i32; 3];
        for axis in 0..3 {
            let cross = rows[(axis + 1) % 3].cross(&rows[(axis + 2) % 3]);
            counts[axis] = (self.cutoff * cross.norm() / volume).floor() as i32 + 1;
        }
        let mut shifts = Vec::new();
        for na in -counts[0]..=counts[0] {
            for nb in -counts[1]..=counts[1] {
                for nc in -counts[2]..=counts[2] {
                    shifts.push(rows[0] * na as f64 + rows[1] * nb as f64 + rows[2] * nc as f64);
                }
            }
        }
        Ok(shifts)
    }
}

#[inline]
fn morse(r: f64, p: &PairParams) -> f64 {
    let x = (-p.width * (r - p.r0)).exp();
    p.depth * ((1.0 - x) * (1.0 - x) - 1.0)
}

#[inline]
fn morse_derivative(r: f64, p: &PairParams) -> f64 {
    let x = (-p.width * (r - p.r0)).exp();
    2.0 * p.depth * p.width * x * (1.0 - x)
}

/// A backend-constructed calculator: a loaded potential plus the flags the
/// backend was configured with.
pub struct MlCalculator {
    label: String,
    model: PotentialModel,
    stress_weight: f64,
}

impl MlCalculator {
    pub fn new(label: &str, model: PotentialModel) -> Self {
        Self {
            label: label.to_string(),
            model,
            stress_weight: 1.0,
        }
    }

    pub fn with_stress_weight(mut self, weight: f64) -> Self {
        self.stress_weight = weight;
        self
    }

    pub fn model_name(&self) -> &str {
        &self.model.name
    }
}

impl Calculator for MlCalculator {
    fn name(&self) -> &str {
        &self.label
    }

    fn evaluate(&self, system: &AtomicSystem) -> Result<Evaluation, EngineError> {
        let mut evaluation = self.model.evaluate(system)?;
        if let Some(stress) = evaluation.stress.as_mut() {
            *stress *= self.stress_weight;
        }
        Ok(evaluation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Matrix3;

    const TOLERANCE: f64 = 1e-9;

    fn dimer(separation: f64) -> AtomicSystem {
        AtomicSystem::new(
            vec!["Si".into(), "Si".into()],
            vec![Vector3::zeros(), Vector3::new(separation, 0.0, 0.0)],
            Matrix3::from_diagonal(&Vector3::new(30.0, 30.0, 30.0)),
        )
        .unwrap()
    }

    #[test]
    fn morse_minimum_sits_at_the_equilibrium_separation() {
        let p = PairParams {
            depth: 1.0,
            width: 1.6,
            r0: 2.22,
        };
        assert!((morse(p.r0, &p) + 1.0).abs() < TOLERANCE);
        assert!(morse_derivative(p.r0, &p).abs() < TOLERANCE);
        assert!(morse_derivative(p.r0 + 0.2, &p) > 0.0);
        assert!(morse_derivative(p.r0 - 0.2, &p) < 0.0);
    }

    #[test]
    fn forces_vanish_at_the_pair_equilibrium_distance() {
        let model = PotentialModel::default();
        let r0 = 2.0 * element::lookup("Si").unwrap().covalent_radius;
        let evaluation = model.evaluate(&dimer(r0)).unwrap();
        assert!(evaluation.fmax() < 1e-9);
    }

    #[test]
    fn stretched_dimer_feels_an_attractive_pair_force() {
        let model = PotentialModel::default();
        let evaluation = model.evaluate(&dimer(3.0)).unwrap();
        // Atom 0 is pulled toward atom 1 (positive x).
        assert!(evaluation.forces[0].x > 0.0);
        assert!(evaluation.forces[1].x < 0.0);
    }

    #[test]
    fn energy_is_shifted_to_zero_at_the_cutoff() {
        let model = PotentialModel::default();
        let evaluation = model.evaluate(&dimer(5.999)).unwrap();
        assert!(evaluation.energy.abs() < 1e-3);
    }

    #[test]
    fn explicit_pair_table_overrides_the_covalent_radius_fallback() {
        let mut model = PotentialModel::default();
        model.pairs.insert(
            "Si-Si".to_string(),
            PairParams {
                depth: 2.0,
                width: 1.6,
                r0: 3.0,
            },
        );
        let evaluation = model.evaluate(&dimer(3.0)).unwrap();
        assert!((evaluation.energy - (morse(3.0, &model.pairs["Si-Si"]) - morse(6.0, &model.pairs["Si-Si"]))).abs() < TOLERANCE);
        assert!(evaluation.fmax() < 1e-9);
    }

    #[test]
    fn small_cell_interactions_sum_over_every_lattice_image() {
        let model = PotentialModel::default();
        let a = 3.0;
        let system = AtomicSystem::new(
            vec!["Cs".into(), "Cl".into()],
            vec![Vector3::zeros(), Vector3::new(a / 2.0, a / 2.0, a / 2.0)],
            Matrix3::from_diagonal(&Vector3::new(a, a, a)),
        )
        .unwrap();
        let evaluation = model.evaluate(&system).unwrap();
        // Both sites are inversion centers of the lattice, so the image sums
        // cancel exactly; a single nearest image would leave a net force.
        assert!(evaluation.fmax() < TOLERANCE);
        // The cell is compressed well below equilibrium and pushes outward.
        assert!(evaluation.stress.unwrap().trace() < 0.0);
        // Self-images of each atom sit within the cutoff and contribute.
        let lone = AtomicSystem::new(
            vec!["Cs".into()],
            vec![Vector3::zeros()],
            Matrix3::from_diagonal(&Vector3::new(a, a, a)),
        )
        .unwrap();
        assert!(model.evaluate(&lone).unwrap().energy != 0.0);
    }

    #[test]
    fn from_file_reports_unreadable_models() {
        let err = PotentialModel::from_file(Path::new("/nonexistent/model.toml")).unwrap_err();
        assert!(matches!(err, EngineError::ModelLoad { .. }));
    }

    #[test]
    fn from_file_parses_a_pair_table() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.toml");
        std::fs::write(
            &path,
            "name = \"test\"\ncutoff = 5.5\n[pairs.\"Cl-Cs\"]\ndepth = 0.5\nwidth = 1.2\nr0 = 3.5\n",
        )
        .unwrap();
        let model = PotentialModel::from_file(&path).unwrap();
        assert_eq!(model.name, "test");
        assert!((model.cutoff - 5.5).abs() < TOLERANCE);
        assert!((model.pairs["Cl-Cs"].r0 - 3.5).abs() < TOLERANCE);
    }

    #[test]
    fn stress_weight_scales_the_stress_but_not_the_forces() {
        let weighted = MlCalculator::new("matgl", PotentialModel::default()).with_stress_weight(0.5);
        let unweighted = MlCalculator::new("matgl", PotentialModel::default());
        let system = dimer(2.0);
        let a = weighted.evaluate(&system).unwrap();
        let b = unweighted.evaluate(&system).unwrap();
        assert!((a.stress.unwrap()[(0, 0)] - 0.5 * b.stress.unwrap()[(0, 0)]).abs() < TOLERANCE);
        assert!((a.forces[0] - b.forces[0]).norm() < TOLERANCE);
    }
}
