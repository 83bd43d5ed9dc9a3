use super::element;
use nalgebra::{Matrix3, Vector3};
use rand::Rng;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Clone)]
pub enum StructureError {
    #[error("Species and position counts differ: {species} vs {positions}")]
    MismatchedLengths { species: usize, positions: usize },

    #[error("Cell matrix is singular")]
    SingularCell,

    #[error("Unknown element symbol: '{0}'")]
    UnknownElement(String),

    #[error("Supercell repetition counts must be positive")]
    EmptySupercell,
}

/// A periodic atomic configuration: species, Cartesian positions, and a cell
/// whose rows are the lattice vectors.
///
/// This is a plain owned value. Procedures that relax or displace a system
/// always operate on their own copy; the caller's instance is never mutated.
#[derive(Debug, Clone, PartialEq)]
pub struct AtomicSystem {
    species: Vec<String>,
    positions: Vec<Vector3<f64>>,
    cell: Matrix3<f64>,
    periodic: bool,
}

impl AtomicSystem {
    /// Creates a periodic system from species symbols, Cartesian positions,
    /// and a row-vector cell matrix.
    pub fn new(
        species: Vec<String>,
        positions: Vec<Vector3<f64>>,
        cell: Matrix3<f64>,
    ) -> Result<Self, StructureError> {
        if species.len() != positions.len() {
            return Err(StructureError::MismatchedLengths {
                species: species.len(),
                positions: positions.len(),
            });
        }
        Ok(Self {
            species,
            positions,
            cell,
            periodic: true,
        })
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn species(&self) -> &[String] {
        &self.species
    }

    pub fn positions(&self) -> &[Vector3<f64>] {
        &self.positions
    }

    pub fn cell(&self) -> &Matrix3<f64> {
        &self.cell
    }

    pub fn is_periodic(&self) -> bool {
        self.periodic
    }

    /// Replaces all Cartesian positions. The atom count must not change.
    pub fn set_positions(&mut self, positions: Vec<Vector3<f64>>) -> Result<(), StructureError> {
        if positions.len() != self.species.len() {
            return Err(StructureError::MismatchedLengths {
                species: self.species.len(),
                positions: positions.len(),
            });
        }
        self.positions = positions;
        Ok(())
    }

    /// Replaces the cell. With `scale_atoms`, fractional coordinates are kept
    /// fixed so atoms follow the deformation; otherwise Cartesian positions
    /// stay where they are.
    pub fn set_cell(&mut self, cell: Matrix3<f64>, scale_atoms: bool) -> Result<(), StructureError> {
        if scale_atoms {
            let fractional = self.fractional_positions()?;
            self.cell = cell;
            for (pos, frac) in self.positions.iter_mut().zip(fractional) {
                *pos = self.cell.transpose() * frac;
            }
        } else {
            self.cell = cell;
        }
        Ok(())
    }

    /// Cell volume in Å³.
    pub fn volume(&self) -> f64 {
        self.cell.determinant().abs()
    }

    /// Fractional coordinates of every atom.
    pub fn fractional_positions(&self) -> Result<Vec<Vector3<f64>>, StructureError> {
        let inv = self
            .cell
            .try_inverse()
            .ok_or(StructureError::SingularCell)?;
        Ok(self
            .positions
            .iter()
            .map(|p| inv.transpose() * p)
            .collect())
    }

    /// Shortest periodic image of a Cartesian difference vector.
    pub fn minimum_image(&self, delta: Vector3<f64>) -> Result<Vector3<f64>, StructureError> {
        if !self.periodic {
            return Ok(delta);
        }
        let inv = self
            .cell
            .try_inverse()
            .ok_or(StructureError::SingularCell)?;
        let mut frac = inv.transpose() * delta;
        for component in frac.iter_mut() {
            *component -= component.round();
        }
        Ok(self.cell.transpose() * frac)
    }

    /// Atomic masses in amu, one per atom.
    pub fn masses(&self) -> Result<Vec<f64>, StructureError> {
        self.species
            .iter()
            .map(|s| {
                element::lookup(s)
                    .map(|e| e.mass)
                    .ok_or_else(|| StructureError::UnknownElement(s.clone()))
            })
            .collect()
    }

    /// Atomic numbers, one per atom.
    pub fn atomic_numbers(&self) -> Result<Vec<i32>, StructureError> {
        self.species
            .iter()
            .map(|s| {
                element::atomic_number(s)
                    .map(i32::from)
                    .ok_or_else(|| StructureError::UnknownElement(s.clone()))
            })
            .collect()
    }

    /// Builds an `na × nb × nc` repetition of this system.
    pub fn supercell(&self, na: usize, nb: usize, nc: usize) -> Result<Self, StructureError> {
        if na == 0 || nb == 0 || nc == 0 {
            return Err(StructureError::EmptySupercell);
        }
        let a = self.cell.row(0).transpose();
        let b = self.cell.row(1).transpose();
        let c = self.cell.row(2).transpose();

        let mut species = Vec::with_capacity(self.len() * na * nb * nc);
        let mut positions = Vec::with_capacity(self.len() * na * nb * nc);
        for ia in 0..na {
            for ib in 0..nb {
                for ic in 0..nc {
                    let shift = a * ia as f64 + b * ib as f64 + c * ic as f64;
                    for (symbol, pos) in self.species.iter().zip(&self.positions) {
                        species.push(symbol.clone());
                        positions.push(pos + shift);
                    }
                }
            }
        }

        let mut cell = self.cell;
        cell.set_row(0, &(self.cell.row(0) * na as f64));
        cell.set_row(1, &(self.cell.row(1) * nb as f64));
        cell.set_row(2, &(self.cell.row(2) * nc as f64));

        Self::new(species, positions, cell)
    }

    /// Displaces every atom by a uniformly random vector with components in
    /// `[-magnitude, magnitude]`. Used to break symmetric saddle points before
    /// relaxation. Only the size of `magnitude` matters; its sign is ignored.
    pub fn rattle(&mut self, magnitude: f64) {
        let magnitude = magnitude.abs();
        if magnitude == 0.0 {
            return;
        }
        let mut rng = rand::thread_rng();
        for pos in self.positions.iter_mut() {
            for component in pos.iter_mut() {
                *component += rng.gen_range(-magnitude..=magnitude);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cubic(symbols: &[&str], fractions: &[[f64; 3]], a: f64) -> AtomicSystem {
        let cell = Matrix3::from_diagonal(&Vector3::new(a, a, a));
        let positions = fractions
            .iter()
            .map(|f| Vector3::new(f[0] * a, f[1] * a, f[2] * a))
            .collect();
        AtomicSystem::new(symbols.iter().map(|s| s.to_string()).collect(), positions, cell)
            .unwrap()
    }

    #[test]
    fn new_rejects_mismatched_species_and_positions() {
        let cell = Matrix3::identity();
        let result = AtomicSystem::new(vec!["Si".into()], vec![], cell);
        assert_eq!(
            result.unwrap_err(),
            StructureError::MismatchedLengths {
                species: 1,
                positions: 0
            }
        );
    }

    #[test]
    fn volume_of_cubic_cell_is_edge_cubed() {
        let system = cubic(&["Cs"], &[[0.0, 0.0, 0.0]], 4.0);
        assert!((system.volume() - 64.0).abs() < 1e-12);
    }

    #[test]
    fn fractional_positions_invert_cartesian_ones() {
        let system = cubic(&["Cs", "Cl"], &[[0.0, 0.0, 0.0], [0.5, 0.5, 0.5]], 4.1);
        let frac = system.fractional_positions().unwrap();
        assert!((frac[1] - Vector3::new(0.5, 0.5, 0.5)).norm() < 1e-12);
    }

    #[test]
    fn minimum_image_wraps_across_the_cell_boundary() {
        let system = cubic(&["Cs"], &[[0.0, 0.0, 0.0]], 4.0);
        let wrapped = system.minimum_image(Vector3::new(3.5, 0.0, 0.0)).unwrap();
        assert!((wrapped - Vector3::new(-0.5, 0.0, 0.0)).norm() < 1e-12);
    }

    #[test]
    fn set_cell_with_scaling_preserves_fractional_coordinates() {
        let mut system = cubic(&["Cs", "Cl"], &[[0.0, 0.0, 0.0], [0.5, 0.5, 0.5]], 4.0);
        let doubled = Matrix3::from_diagonal(&Vector3::new(8.0, 8.0, 8.0));
        system.set_cell(doubled, true).unwrap();
        assert!((system.positions()[1] - Vector3::new(4.0, 4.0, 4.0)).norm() < 1e-12);
    }

    #[test]
    fn supercell_multiplies_atom_count_and_volume() {
        let system = cubic(&["Si"], &[[0.0, 0.0, 0.0]], 3.0);
        let sc = system.supercell(2, 2, 2).unwrap();
        assert_eq!(sc.len(), 8);
        assert!((sc.volume() - 8.0 * system.volume()).abs() < 1e-9);
    }

    #[test]
    fn rattle_moves_atoms_within_the_requested_bound() {
        let mut system = cubic(&["Si"], &[[0.25, 0.25, 0.25]], 4.0);
        let before = system.positions()[0];
        system.rattle(0.05);
        let displacement = system.positions()[0] - before;
        assert!(displacement.amax() <= 0.05 + 1e-12);
    }

    #[test]
    fn rattle_with_a_negative_magnitude_uses_the_absolute_bound() {
        let mut system = cubic(&["Si"], &[[0.25, 0.25, 0.25]], 4.0);
        let before = system.positions()[0];
        system.rattle(-0.05);
        let displacement = system.positions()[0] - before;
        assert!(displacement.amax() <= 0.05 + 1e-12);
    }

    #[test]
    fn masses_fail_for_unknown_species() {
        let system = cubic(&["Qq"], &[[0.0, 0.0, 0.0]], 4.0);
        assert_eq!(
            system.masses().unwrap_err(),
            StructureError::UnknownElement("Qq".into())
        );
    }
}
