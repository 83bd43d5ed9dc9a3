use crate::core::models::atoms::AtomicSystem;
use crate::engine::calculator::Calculator;
use crate::engine::error::EngineError;
use nalgebra::{DMatrix, Matrix3, Vector3};
use num_complex::Complex64;
use plotters::prelude::*;
use std::path::Path;
use tracing::{debug, info};

/// Conversion factor from sqrt(eV/Å²/amu) to THz, matching the VASP
/// frequency convention.
pub const VASP_TO_THZ: f64 = 15.633302;

/// How displaced configurations are generated for the finite differences.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplacementScheme {
    /// Decide automatically; currently identical to `Central`.
    Auto,
    /// Displace each coordinate by ±distance (central differences).
    Central,
    /// Displace by +distance only and difference against equilibrium.
    Forward,
}

/// Options controlling dynamical-matrix construction, with the documented
/// defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct PhononConfig {
    /// Diagonal supercell repetitions.
    pub ndim: [usize; 3],
    /// Transformation from the primitive basis the k-vectors refer to.
    pub primitive_matrix: Matrix3<f64>,
    /// Atomic displacement distance in Å.
    pub distance: f64,
    /// Frequency-unit conversion factor.
    pub factor: f64,
    pub scheme: DisplacementScheme,
    /// Symmetrize the force constants after assembly.
    pub is_symmetry: bool,
    /// Symmetry tolerance, kept alongside for downstream consumers.
    pub symprec: f64,
    /// Componentwise force mask applied to every evaluated force.
    pub mask_force: [f64; 3],
}

impl Default for PhononConfig {
    fn default() -> Self {
        Self {
            ndim: [2, 2, 2],
            primitive_matrix: Matrix3::identity(),
            distance: 0.05,
            factor: VASP_TO_THZ,
            scheme: DisplacementScheme::Auto,
            is_symmetry: true,
            symprec: 1e-3,
            mask_force: [1.0, 1.0, 1.0],
        }
    }
}

/// Caller-supplied overrides for [`PhononConfig`]. Application is a flat
/// field-by-field replacement; absent fields keep their defaults.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PhononOverrides {
    pub ndim: Option<[usize; 3]>,
    pub primitive_matrix: Option<Matrix3<f64>>,
    pub distance: Option<f64>,
    pub factor: Option<f64>,
    pub scheme: Option<DisplacementScheme>,
    pub is_symmetry: Option<bool>,
    pub symprec: Option<f64>,
    pub mask_force: Option<[f64; 3]>,
}

impl PhononConfig {
    /// Applies overrides one field at a time, never merging recursively.
    pub fn with_overrides(mut self, overrides: &PhononOverrides) -> Self {
        if let Some(v) = overrides.ndim {
            self.ndim = v;
        }
        if let Some(v) = overrides.primitive_matrix {
            self.primitive_matrix = v;
        }
        if let Some(v) = overrides.distance {
            self.distance = v;
        }
        if let Some(v) = overrides.factor {
            self.factor = v;
        }
        if let Some(v) = overrides.scheme {
            self.scheme = v;
        }
        if let Some(v) = overrides.is_symmetry {
            self.is_symmetry = v;
        }
        if let Some(v) = overrides.symprec {
            self.symprec = v;
        }
        if let Some(v) = overrides.mask_force {
            self.mask_force = v;
        }
        self
    }
}

/// Assembled force constants plus everything needed to evaluate dynamical
/// matrices at arbitrary wave vectors.
pub struct PhononModel {
    n_prim: usize,
    n_cells: [usize; 3],
    masses: Vec<f64>,
    primitive_matrix: Matrix3<f64>,
    factor: f64,
    /// Full supercell force-constant matrix, 3·N_super square, eV/Å².
    force_constants: DMatrix<f64>,
}

/// Frozen-phonon calculation: displaces every supercell atom, differences
/// the forces into force constants, and returns a [`PhononModel`]. Also
/// writes the raw force constants as `force_constants.csv` into the current
/// working directory.
pub fn calculate_phonons(
    system: &AtomicSystem,
    calculator: &dyn Calculator,
    config: &PhononConfig,
) -> Result<PhononModel, EngineError> {
    let [na, nb, nc] = config.ndim;
    let supercell = system.supercell(na, nb, nc)?;
    let n_super = supercell.len();
    info!(
        atoms = system.len(),
        supercell_atoms = n_super,
        distance = config.distance,
        "starting frozen-phonon calculation"
    );

    let mask = Vector3::new(
        config.mask_force[0],
        config.mask_force[1],
        config.mask_force[2],
    );
    let masked_forces = |displaced: &AtomicSystem| -> Result<Vec<Vector3<f64>>, EngineError> {
        let mut forces = calculator.evaluate(displaced)?.forces;
        for force in forces.iter_mut() {
            *force = force.component_mul(&mask);
        }
        Ok(forces)
    };

    let central = !matches!(config.scheme, DisplacementScheme::Forward);
    let baseline = if central {
        None
    } else {
        Some(masked_forces(&supercell)?)
    };

    let mut force_constants = DMatrix::zeros(3 * n_super, 3 * n_super);
    for atom in 0..n_super {
        for axis in 0..3 {
            let plus = {
                let mut displaced = supercell.clone();
                let mut positions = displaced.positions().to_vec();
                positions[atom][axis] += config.distance;
                displaced.set_positions(positions)?;
                masked_forces(&displaced)?
            };
            let (reference, denominator): (Vec<Vector3<f64>>, f64) = if central {
                let mut displaced = supercell.clone();
                let mut positions = displaced.positions().to_vec();
                positions[atom][axis] -= config.distance;
                displaced.set_positions(positions)?;
                (masked_forces(&displaced)?, 2.0 * config.distance)
            } else {
                (
                    baseline.clone().unwrap_or_else(|| vec![Vector3::zeros(); n_super]),
                    config.distance,
                )
            };
            for target in 0..n_super {
                let derivative = (plus[target] - reference[target]) / denominator;
                for beta in 0..3 {
                    force_constants[(3 * atom + axis, 3 * target + beta)] = -derivative[beta];
                }
            }
        }
    }

    if config.is_symmetry {
        // Force constants are the Hessian of the energy; enforce its
        // symmetry against finite-difference noise.
        let transpose = force_constants.transpose();
        force_constants = (force_constants + transpose) * 0.5;
    }
    apply_acoustic_sum_rule(&mut force_constants, n_super);

    write_force_constants_csv(&force_constants, Path::new("force_constants.csv"))?;

    let masses = system.masses()?;
    debug!(rows = 3 * n_super, "force constants assembled");
    Ok(PhononModel {
        n_prim: system.len(),
        n_cells: config.ndim,
        masses,
        primitive_matrix: config.primitive_matrix,
        factor: config.factor,
        force_constants,
    })
}

/// Translation invariance: the self term balances all other interactions in
/// the same row block.
fn apply_acoustic_sum_rule(force_constants: &mut DMatrix<f64>, n_super: usize) {
    for atom in 0..n_super {
        for alpha in 0..3 {
            for beta in 0..3 {
                let mut total = 0.0;
                for target in 0..n_super {
                    if target != atom {
                        total += force_constants[(3 * atom + alpha, 3 * target + beta)];
                    }
                }
                force_constants[(3 * atom + alpha, 3 * atom + beta)] = -total;
            }
        }
    }
}

fn write_force_constants_csv(
    force_constants: &DMatrix<f64>,
    path: &Path,
) -> Result<(), EngineError> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(["row", "col", "value"])?;
    for row in 0..force_constants.nrows() {
        for col in 0..force_constants.ncols() {
            let value = force_constants[(row, col)];
            if value != 0.0 {
                writer.write_record([
                    row.to_string(),
                    col.to_string(),
                    format!("{value:.10e}"),
                ])?;
            }
        }
    }
    writer.flush()?;
    Ok(())
}

impl PhononModel {
    /// Number of branches (3 × primitive atoms).
    pub fn branches(&self) -> usize {
        3 * self.n_prim
    }

    /// Phonon frequencies at a wave vector given in fractional coordinates
    /// of the primitive reciprocal cell, sorted ascending. Imaginary modes
    /// are reported as negative numbers.
    pub fn frequencies_at(&self, q: Vector3<f64>) -> Vec<f64> {
        let q = self.primitive_matrix.transpose() * q;
        let n = self.n_prim;
        let [na, nb, nc] = self.n_cells;
        let mut dynamical = DMatrix::<Complex64>::zeros(3 * n, 3 * n);

        for (cell_index, offset) in cell_offsets(na, nb, nc).into_iter().enumerate() {
            let phase = 2.0 * std::f64::consts::PI * q.dot(&offset);
            let factor = Complex64::new(phase.cos(), phase.sin());
            for p in 0..n {
                for s in 0..n {
                    let target = cell_index * n + s;
                    let weight = factor / (self.masses[p] * self.masses[s]).sqrt();
                    for alpha in 0..3 {
                        for beta in 0..3 {
                            dynamical[(3 * p + alpha, 3 * s + beta)] += weight
                                * self.force_constants[(3 * p + alpha, 3 * target + beta)];
                        }
                    }
                }
            }
        }

        // Hermitize against the nearest-image phase ambiguity.
        let adjoint = dynamical.adjoint();
        dynamical = (dynamical + adjoint) * Complex64::new(0.5, 0.0);

        let eigen = dynamical.symmetric_eigen();
        let mut frequencies: Vec<f64> = eigen
            .eigenvalues
            .iter()
            .map(|&lambda| lambda.signum() * lambda.abs().sqrt() * self.factor)
            .collect();
        frequencies.sort_by(|a, b| a.total_cmp(b));
        frequencies
    }

    /// Samples frequencies along a piecewise-linear k-path.
    pub fn band_structure(&self, kvectors: &[Vector3<f64>], npoints: usize) -> BandStructure {
        let mut distances = Vec::new();
        let mut bands = Vec::new();
        let mut ticks = vec![0.0];
        let mut travelled = 0.0;

        if kvectors.len() < 2 || npoints < 2 {
            return BandStructure {
                distances,
                bands,
                ticks,
            };
        }

        for segment in kvectors.windows(2) {
            let (start, end) = (segment[0], segment[1]);
            let length = (end - start).norm();
            for step in 0..npoints {
                let t = step as f64 / (npoints - 1) as f64;
                let q = start + (end - start) * t;
                distances.push(travelled + t * length);
                bands.push(self.frequencies_at(q));
            }
            travelled += length;
            ticks.push(travelled);
        }

        BandStructure {
            distances,
            bands,
            ticks,
        }
    }
}

/// Wrapped cell offsets of the supercell, in the order atoms were generated.
fn cell_offsets(na: usize, nb: usize, nc: usize) -> Vec<Vector3<f64>> {
    let wrap = |index: usize, n: usize| -> f64 {
        let signed = index as isize;
        if signed * 2 > n as isize {
            (signed - n as isize) as f64
        } else {
            signed as f64
        }
    };
    let mut offsets = Vec::with_capacity(na * nb * nc);
    for ia in 0..na {
        for ib in 0..nb {
            for ic in 0..nc {
                offsets.push(Vector3::new(wrap(ia, na), wrap(ib, nb), wrap(ic, nc)));
            }
        }
    }
    offsets
}

/// A sampled phonon band structure.
#[derive(Debug, Clone)]
pub struct BandStructure {
    /// Cumulative path distance per sampled point.
    pub distances: Vec<f64>,
    /// Frequencies per sampled point, sorted ascending.
    pub bands: Vec<Vec<f64>>,
    /// Path distances of the segment endpoints.
    pub ticks: Vec<f64>,
}

/// Writes a band structure as CSV: one row per sampled point, the path
/// distance followed by every branch frequency.
pub fn write_band_csv(band: &BandStructure, path: &Path) -> Result<(), EngineError> {
    let mut writer = csv::Writer::from_path(path)?;
    let branches = band.bands.first().map_or(0, Vec::len);
    let mut header = vec!["distance".to_string()];
    header.extend((0..branches).map(|b| format!("branch_{b}")));
    writer.write_record(&header)?;
    for (distance, frequencies) in band.distances.iter().zip(&band.bands) {
        let mut record = vec![format!("{distance:.8}")];
        record.extend(frequencies.iter().map(|f| format!("{f:.8}")));
        writer.write_record(&record)?;
    }
    writer.flush()?;
    Ok(())
}

/// Renders the band structure with vertical lines at segment boundaries and
/// optional high-symmetry labels.
pub fn plot_band(
    band: &BandStructure,
    labels: Option<&[String]>,
    path: &Path,
) -> Result<(), EngineError> {
    let plot_error = |e: &dyn std::fmt::Display| EngineError::Plot(e.to_string());

    let x_max = band.distances.last().copied().unwrap_or(1.0).max(1e-9);
    let (mut y_min, mut y_max) = (0.0f64, 1.0f64);
    for frequencies in &band.bands {
        for &f in frequencies {
            y_min = y_min.min(f);
            y_max = y_max.max(f);
        }
    }
    let margin = 0.05 * (y_max - y_min).max(1e-9);

    let root = BitMapBackend::new(path, (960, 720)).into_drawing_area();
    root.fill(&WHITE).map_err(|e| plot_error(&e))?;
    let mut chart = ChartBuilder::on(&root)
        .caption("Phonon band structure", ("sans-serif", 28))
        .margin(24)
        .x_label_area_size(36)
        .y_label_area_size(56)
        .build_cartesian_2d(0.0..x_max, (y_min - margin)..(y_max + margin))
        .map_err(|e| plot_error(&e))?;
    chart
        .configure_mesh()
        .disable_x_mesh()
        .y_desc("Frequency (THz)")
        .x_desc(match labels {
            Some(l) if !l.is_empty() => l.join(" - "),
            _ => "Wave vector".to_string(),
        })
        .draw()
        .map_err(|e| plot_error(&e))?;

    let branches = band.bands.first().map_or(0, Vec::len);
    for branch in 0..branches {
        chart
            .draw_series(LineSeries::new(
                band.distances
                    .iter()
                    .zip(&band.bands)
                    .map(|(&d, f)| (d, f[branch])),
                &BLUE,
            ))
            .map_err(|e| plot_error(&e))?;
    }
    for &tick in &band.ticks {
        chart
            .draw_series(LineSeries::new(
                [(tick, y_min - margin), (tick, y_max + margin)],
                &BLACK.mix(0.3),
            ))
            .map_err(|e| plot_error(&e))?;
    }
    root.present().map_err(|e| plot_error(&e))?;
    Ok(())
}
