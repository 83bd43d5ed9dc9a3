use crate::core::models::atoms::AtomicSystem;
use crate::engine::calculator::Calculator;
use crate::engine::error::EngineError;
use crate::engine::fire::Optimizable;
use crate::engine::symmetry::SymmetryConstraint;
use nalgebra::{Matrix3, Vector3};

/// Position-only optimization view: the coordinates are the bare Cartesian
/// positions and the cell is left untouched.
pub struct PositionFilter<'a> {
    system: AtomicSystem,
    calculator: &'a dyn Calculator,
    constraint: Option<&'a SymmetryConstraint>,
}

impl<'a> PositionFilter<'a> {
    pub fn new(
        system: AtomicSystem,
        calculator: &'a dyn Calculator,
        constraint: Option<&'a SymmetryConstraint>,
    ) -> Self {
        Self {
            system,
            calculator,
            constraint,
        }
    }

    pub fn into_system(self) -> AtomicSystem {
        self.system
    }
}

impl Optimizable for PositionFilter<'_> {
    fn coordinates(&self) -> Vec<f64> {
        self.system
            .positions()
            .iter()
            .flat_map(|p| [p.x, p.y, p.z])
            .collect()
    }

    fn set_coordinates(&mut self, coordinates: &[f64]) -> Result<(), EngineError> {
        let positions = coordinates
            .chunks_exact(3)
            .map(|c| Vector3::new(c[0], c[1], c[2]))
            .collect();
        self.system.set_positions(positions)?;
        Ok(())
    }

    fn forces(&mut self) -> Result<(f64, Vec<f64>), EngineError> {
        let evaluation = self.calculator.evaluate(&self.system)?;
        let mut forces = evaluation.forces;
        if let Some(constraint) = self.constraint {
            constraint.adjust_forces(&mut forces);
        }
        Ok((
            evaluation.energy,
            forces.iter().flat_map(|f| [f.x, f.y, f.z]).collect(),
        ))
    }

    fn system(&self) -> &AtomicSystem {
        &self.system
    }
}

/// Pass-through tuning options for the combined cell view.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CellFilterOptions {
    /// Restrict the cell degrees of freedom to isotropic scaling.
    pub hydrostatic_strain: bool,
    /// Remove the volume-changing component from the cell gradient.
    pub constant_volume: bool,
    /// External pressure in eV/Å³ added to the diagonal of the stress.
    pub scalar_pressure: f64,
}

impl Default for CellFilterOptions {
    fn default() -> Self {
        Self {
            hydrostatic_strain: false,
            constant_volume: false,
            scalar_pressure: 0.0,
        }
    }
}

/// Combined position-and-cell optimization view.
///
/// The coordinate vector is `[undeformed positions; cell_factor × deformation
/// gradient]`, so one minimizer drives both sets of degrees of freedom. The
/// `cell_factor` balances position against cell-vector step sizes.
pub struct CellFilter<'a> {
    system: AtomicSystem,
    original_cell: Matrix3<f64>,
    calculator: &'a dyn Calculator,
    constraint: Option<&'a SymmetryConstraint>,
    cell_factor: f64,
    options: CellFilterOptions,
}

impl<'a> CellFilter<'a> {
    pub fn new(
        system: AtomicSystem,
        calculator: &'a dyn Calculator,
        constraint: Option<&'a SymmetryConstraint>,
        cell_factor: f64,
        options: CellFilterOptions,
    ) -> Self {
        let original_cell = *system.cell();
        Self {
            system,
            original_cell,
            calculator,
            constraint,
            cell_factor,
            options,
        }
    }

    pub fn into_system(self) -> AtomicSystem {
        self.system
    }

    fn deformation_gradient(&self) -> Result<Matrix3<f64>, EngineError> {
        let inv = self
            .original_cell
            .try_inverse()
            .ok_or(crate::core::models::atoms::StructureError::SingularCell)
            .map_err(EngineError::from)?;
        Ok((inv * self.system.cell()).transpose())
    }
}

impl Optimizable for CellFilter<'_> {
    fn coordinates(&self) -> Vec<f64> {
        // Errors cannot occur here for a cell that was invertible at
        // construction; fall back to the identity gradient if it ever is.
        let gradient = self
            .deformation_gradient()
            .unwrap_or_else(|_| Matrix3::identity());
        let inverse = gradient.try_inverse().unwrap_or_else(Matrix3::identity);

        let mut coordinates: Vec<f64> = self
            .system
            .positions()
            .iter()
            .map(|p| inverse * p)
            .flat_map(|u| [u.x, u.y, u.z])
            .collect();
        for row in 0..3 {
            for col in 0..3 {
                coordinates.push(self.cell_factor * gradient[(row, col)]);
            }
        }
        coordinates
    }

    fn set_coordinates(&mut self, coordinates: &[f64]) -> Result<(), EngineError> {
        let n = self.system.len();
        let (position_part, cell_part) = coordinates.split_at(3 * n);

        let mut gradient = Matrix3::zeros();
        for row in 0..3 {
            for col in 0..3 {
                gradient[(row, col)] = cell_part[3 * row + col] / self.cell_factor;
            }
        }

        self.system
            .set_cell(self.original_cell * gradient.transpose(), false)?;
        let positions = position_part
            .chunks_exact(3)
            .map(|c| gradient * Vector3::new(c[0], c[1], c[2]))
            .collect();
        self.system.set_positions(positions)?;
        Ok(())
    }

    fn forces(&mut self) -> Result<(f64, Vec<f64>), EngineError> {
        let evaluation = self.calculator.evaluate(&self.system)?;
        let mut forces = evaluation.forces;
        let mut stress = evaluation
            .stress
            .ok_or_else(|| EngineError::MissingStress(self.calculator.name().to_string()))?;
        if let Some(constraint) = self.constraint {
            constraint.adjust_forces(&mut forces);
            constraint.adjust_stress(&mut stress);
        }

        let gradient = self.deformation_gradient()?;
        let gradient_inv = gradient
            .try_inverse()
            .ok_or(crate::core::models::atoms::StructureError::SingularCell)
            .map_err(EngineError::from)?;
        let volume = self.system.volume();

        let pressure = Matrix3::from_diagonal_element(self.options.scalar_pressure);
        let mut virial = -(stress + pressure) * volume;
        virial = virial * gradient_inv.transpose();

        if self.options.hydrostatic_strain {
            virial = Matrix3::from_diagonal_element(virial.trace() / 3.0);
        }
        if self.options.constant_volume {
            let mean = virial.trace() / 3.0;
            for i in 0..3 {
                virial[(i, i)] -= mean;
            }
        }

        let mut generalized: Vec<f64> = forces
            .iter()
            .map(|f| gradient.transpose() * f)
            .flat_map(|f| [f.x, f.y, f.z])
            .collect();
        for row in 0..3 {
            for col in 0..3 {
                generalized.push(virial[(row, col)] / self.cell_factor);
            }
        }
        Ok((evaluation.energy, generalized))
    }

    fn system(&self) -> &AtomicSystem {
        &self.system
    }
}
