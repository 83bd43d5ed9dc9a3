use crate::core::models::atoms::AtomicSystem;
use crate::engine::error::EngineError;
use moyo::MoyoDataset;
use moyo::base::{AngleTolerance, Cell, Lattice};
use moyo::data::Setting;
use nalgebra::{Matrix3, Vector3};
use tracing::debug;

/// A constraint restricting optimizer moves to those preserving the space
/// group detected on the starting configuration.
///
/// Detection is delegated to moyo; this type only stores the operations and
/// the atom permutation each of them induces, and uses them to project forces
/// and stress onto the symmetry-invariant subspace.
pub struct SymmetryConstraint {
    spacegroup_number: i32,
    cartesian_rotations: Vec<Matrix3<f64>>,
    permutations: Vec<Vec<usize>>,
}

impl SymmetryConstraint {
    /// Detects the space group of `system` at the given symmetry tolerance
    /// and builds the constraint from its operations.
    pub fn detect(system: &AtomicSystem, symprec: f64) -> Result<Self, EngineError> {
        let fractional = system.fractional_positions()?;
        let numbers = system.atomic_numbers()?;
        let cell = Cell::new(
            Lattice::new(*system.cell()),
            fractional.clone(),
            numbers.clone(),
        );
        let dataset = MoyoDataset::new(
            &cell,
            symprec,
            AngleTolerance::Default,
            Setting::Spglib,
            true,
        )
        .map_err(|e| EngineError::Symmetry(format!("{e:?}")))?;

        // Cartesian representation of a fractional rotation W for a cell A
        // with row lattice vectors: R = Aᵀ W A⁻ᵀ.
        let cell_t = system.cell().transpose();
        let cell_t_inv = cell_t
            .try_inverse()
            .ok_or_else(|| EngineError::Symmetry("singular cell".to_string()))?;

        let tolerance = (symprec * 10.0).max(1e-5);
        let mut cartesian_rotations = Vec::new();
        let mut permutations = Vec::new();
        for operation in &dataset.operations {
            let rotation = operation.rotation.map(|v| v as f64);
            let translation = operation.translation;
            let permutation =
                permutation_under(&rotation, &translation, &fractional, &numbers, tolerance)?;
            cartesian_rotations.push(cell_t * rotation * cell_t_inv);
            permutations.push(permutation);
        }

        debug!(
            spacegroup = dataset.number,
            operations = cartesian_rotations.len(),
            "symmetry constraint attached"
        );
        Ok(Self {
            spacegroup_number: dataset.number,
            cartesian_rotations,
            permutations,
        })
    }

    /// International space-group number of the constrained configuration.
    pub fn spacegroup_number(&self) -> i32 {
        self.spacegroup_number
    }

    /// Number of symmetry operations being enforced.
    pub fn order(&self) -> usize {
        self.cartesian_rotations.len()
    }

    /// Replaces forces by their average over all symmetry operations. The
    /// result is invariant under the detected group, so an optimizer stepping
    /// along it cannot break the symmetry.
    pub fn adjust_forces(&self, forces: &mut [Vector3<f64>]) {
        let mut symmetrized = vec![Vector3::zeros(); forces.len()];
        for (rotation, permutation) in self.cartesian_rotations.iter().zip(&self.permutations) {
            for (source, &target) in permutation.iter().enumerate() {
                symmetrized[target] += rotation * forces[source];
            }
        }
        let scale = 1.0 / self.order() as f64;
        for (force, sym) in forces.iter_mut().zip(symmetrized) {
            *force = sym * scale;
        }
    }

    /// Symmetrizes the stress tensor over all operations.
    pub fn adjust_stress(&self, stress: &mut Matrix3<f64>) {
        let mut symmetrized = Matrix3::zeros();
        for rotation in &self.cartesian_rotations {
            symmetrized += rotation * *stress * rotation.transpose();
        }
        *stress = symmetrized / self.order() as f64;
    }
}

/// For one operation, finds the atom each atom is mapped onto: the image of
/// atom `j` must coincide (mod lattice translations) with exactly one atom of
/// the same species.
fn permutation_under(
    rotation: &Matrix3<f64>,
    translation: &Vector3<f64>,
    fractional: &[Vector3<f64>],
    numbers: &[i32],
    tolerance: f64,
) -> Result<Vec<usize>, EngineError> {
    let n = fractional.len();
    let mut permutation = vec![usize::MAX; n];
    for source in 0..n {
        let image = rotation * fractional[source] + translation;
        let mut found = None;
        for target in 0..n {
            if numbers[target] != numbers[source] {
                continue;
            }
            let mut delta = image - fractional[target];
            for component in delta.iter_mut() {
                *component -= component.round();
            }
            if delta.amax() < tolerance {
                found = Some(target);
                break;
            }
        }
        permutation[source] = found.ok_or_else(|| {
            EngineError::Symmetry(format!(
                "operation does not map atom {source} onto an equivalent atom"
            ))
        })?;
    }
    Ok(permutation)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cscl() -> AtomicSystem {
        AtomicSystem::new(
            vec!["Cs".into(), "Cl".into()],
            vec![Vector3::zeros(), Vector3::new(2.1, 2.1, 2.1)],
            Matrix3::from_diagonal(&Vector3::new(4.2, 4.2, 4.2)),
        )
        .unwrap()
    }

    #[test]
    fn cscl_is_detected_as_pm3m() {
        let constraint = SymmetryConstraint::detect(&cscl(), 1e-4).unwrap();
        assert_eq!(constraint.spacegroup_number(), 221);
        assert_eq!(constraint.order(), 48);
    }

    #[test]
    fn forces_on_high_symmetry_sites_are_projected_to_zero() {
        let constraint = SymmetryConstraint::detect(&cscl(), 1e-4).unwrap();
        // Arbitrary unsymmetric forces; both sites have full cubic site
        // symmetry, so the invariant component vanishes.
        let mut forces = vec![Vector3::new(0.3, -0.1, 0.7), Vector3::new(-0.2, 0.5, 0.1)];
        constraint.adjust_forces(&mut forces);
        assert!(forces[0].norm() < 1e-12);
        assert!(forces[1].norm() < 1e-12);
    }

    #[test]
    fn stress_symmetrization_makes_a_cubic_tensor_isotropic() {
        let constraint = SymmetryConstraint::detect(&cscl(), 1e-4).unwrap();
        let mut stress = Matrix3::new(1.0, 0.3, 0.0, 0.3, 2.0, 0.1, 0.0, 0.1, 3.0);
        constraint.adjust_stress(&mut stress);
        let mean = (1.0 + 2.0 + 3.0) / 3.0;
        for i in 0..3 {
            assert!((stress[(i, i)] - mean).abs() < 1e-9);
            for j in 0..3 {
                if i != j {
                    assert!(stress[(i, j)].abs() < 1e-9);
                }
            }
        }
    }

    #[test]
    fn a_distorted_cell_keeps_only_the_trivial_operations() {
        let mut system = cscl();
        let mut positions = system.positions().to_vec();
        positions[1] += Vector3::new(0.4, 0.1, -0.2);
        system.set_positions(positions).unwrap();
        let constraint = SymmetryConstraint::detect(&system, 1e-4).unwrap();
        assert!(constraint.order() < 48);

        // Symmetrized forces under a trivial group are unchanged.
        if constraint.order() == 1 {
            let mut forces = vec![Vector3::new(0.3, -0.1, 0.7), Vector3::new(-0.2, 0.5, 0.1)];
            let before = forces.clone();
            constraint.adjust_forces(&mut forces);
            assert!((forces[0] - before[0]).norm() < 1e-12);
        }
    }
}
