//! The calculator seam: backend selection and the evaluation contract.
//!
//! A [`Calculator`] turns an atomic configuration into energy, forces, and
//! (optionally) a stress tensor. Four backends are selectable by tag; each is
//! constructed differently but evaluates through the same loaded
//! [`model::PotentialModel`], so everything above this seam is
//! backend-agnostic.

pub mod model;
pub mod registry;

use crate::core::models::atoms::AtomicSystem;
use crate::engine::error::EngineError;
use model::{MlCalculator, PotentialModel};
use nalgebra::{Matrix3, Vector3};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Result of a single energy/force evaluation.
#[derive(Debug, Clone)]
pub struct Evaluation {
    /// Potential energy in eV.
    pub energy: f64,
    /// Force on each atom in eV/Å.
    pub forces: Vec<Vector3<f64>>,
    /// Stress tensor in eV/Å³, when the backend computes it.
    pub stress: Option<Matrix3<f64>>,
}

impl Evaluation {
    /// Largest absolute force component over all atoms, the quantity the
    /// convergence threshold is compared against.
    pub fn fmax(&self) -> f64 {
        self.forces
            .iter()
            .map(|f| f.amax())
            .fold(0.0, f64::max)
    }
}

/// The fixed call contract every backend satisfies.
pub trait Calculator {
    fn name(&self) -> &str;

    fn evaluate(&self, system: &AtomicSystem) -> Result<Evaluation, EngineError>;
}

/// The closed set of selectable backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Matgl,
    M3gnet,
    Chgnet,
    Deepmd,
}

impl FromStr for Backend {
    type Err = EngineError;

    /// Case-insensitive tag lookup. Fails before any model is touched.
    fn from_str(tag: &str) -> Result<Self, Self::Err> {
        match tag.to_ascii_lowercase().as_str() {
            "matgl" => Ok(Backend::Matgl),
            "m3gnet" => Ok(Backend::M3gnet),
            "chgnet" => Ok(Backend::Chgnet),
            "deepmd" => Ok(Backend::Deepmd),
            _ => Err(EngineError::InvalidBackend(tag.to_string())),
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self {
            Backend::Matgl => "matgl",
            Backend::M3gnet => "m3gnet",
            Backend::Chgnet => "chgnet",
            Backend::Deepmd => "deepmd",
        };
        f.write_str(tag)
    }
}

/// Constructs a calculator for the given backend.
///
/// Model loading differs per backend:
/// - `matgl` loads the fixed pretrained PES and applies a stress weight of
///   1.0; `model_path` is ignored.
/// - `m3gnet` loads the default pretrained network unless a directory is
///   given, and always evaluates stress.
/// - `chgnet` uses the backend's own built-in default parameters.
/// - `deepmd` requires `model_path` and loads the model file from it.
pub fn init_calculator(
    backend: Backend,
    model_path: Option<&Path>,
) -> Result<Box<dyn Calculator>, EngineError> {
    let calculator = match backend {
        Backend::Matgl => {
            let potential = registry::load_potential(registry::M3GNET_PES)?;
            MlCalculator::new("matgl", potential).with_stress_weight(1.0)
        }
        Backend::M3gnet => {
            let potential = match model_path {
                None => registry::load_potential(registry::M3GNET_PES)?,
                Some(dir) => PotentialModel::from_dir(dir)?,
            };
            MlCalculator::new("m3gnet", potential)
        }
        Backend::Chgnet => MlCalculator::new("chgnet", PotentialModel::default()),
        Backend::Deepmd => {
            let path = model_path.ok_or(EngineError::MissingModelPath { backend: "deepmd" })?;
            MlCalculator::new("deepmd", PotentialModel::from_file(path)?)
        }
    };
    Ok(Box::new(calculator))
}

/// Either a ready-made calculator, a backend tag still to be resolved, or
/// nothing at all (which falls back to the default backend).
pub enum CalculatorSpec {
    Instance(Box<dyn Calculator>),
    Tag(String),
    Default,
}

impl CalculatorSpec {
    /// Resolves the spec into a concrete calculator. Tag parsing happens
    /// before any model load, so an invalid tag never touches the registry.
    pub fn resolve(self, model_path: Option<&Path>) -> Result<Box<dyn Calculator>, EngineError> {
        match self {
            CalculatorSpec::Instance(calculator) => Ok(calculator),
            CalculatorSpec::Tag(tag) => init_calculator(tag.parse()?, model_path),
            CalculatorSpec::Default => init_calculator(Backend::Chgnet, None),
        }
    }
}

impl From<&str> for CalculatorSpec {
    fn from(tag: &str) -> Self {
        CalculatorSpec::Tag(tag.to_string())
    }
}

impl From<Box<dyn Calculator>> for CalculatorSpec {
    fn from(calculator: Box<dyn Calculator>) -> Self {
        CalculatorSpec::Instance(calculator)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Matrix3;

    fn dimer() -> AtomicSystem {
        AtomicSystem::new(
            vec!["Si".into(), "Si".into()],
            vec![Vector3::zeros(), Vector3::new(2.3, 0.0, 0.0)],
            Matrix3::from_diagonal(&Vector3::new(20.0, 20.0, 20.0)),
        )
        .unwrap()
    }

    #[test]
    fn backend_tags_parse_case_insensitively() {
        for tag in ["matgl", "MatGL", "M3GNET", "chgnet", "DeepMD"] {
            assert!(tag.parse::<Backend>().is_ok(), "tag '{tag}' should parse");
        }
        assert_eq!("MATGL".parse::<Backend>().unwrap(), Backend::Matgl);
    }

    #[test]
    fn unknown_tag_fails_before_any_model_load() {
        let err = "emt".parse::<Backend>().unwrap_err();
        assert!(matches!(err, EngineError::InvalidBackend(tag) if tag == "emt"));

        let err = CalculatorSpec::from("vasp").resolve(None).err().unwrap();
        assert!(matches!(err, EngineError::InvalidBackend(_)));
    }

    #[test]
    fn every_backend_except_deepmd_constructs_without_a_model_path() {
        for backend in [Backend::Matgl, Backend::M3gnet, Backend::Chgnet] {
            let calculator = init_calculator(backend, None).unwrap();
            assert_eq!(calculator.name(), backend.to_string());
        }
    }

    #[test]
    fn deepmd_without_a_model_path_is_an_error() {
        let err = init_calculator(Backend::Deepmd, None).err().unwrap();
        assert!(matches!(
            err,
            EngineError::MissingModelPath { backend: "deepmd" }
        ));
    }

    #[test]
    fn deepmd_loads_the_model_file_it_is_pointed_at() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frozen.toml");
        std::fs::write(&path, "name = \"dp-test\"\ncutoff = 5.0\n").unwrap();
        let calculator = init_calculator(Backend::Deepmd, Some(&path)).unwrap();
        assert!(calculator.evaluate(&dimer()).is_ok());
    }

    #[test]
    fn default_spec_resolves_to_the_chgnet_backend() {
        let calculator = CalculatorSpec::Default.resolve(None).unwrap();
        assert_eq!(calculator.name(), "chgnet");
    }

    #[test]
    fn instance_spec_passes_the_calculator_through() {
        let inner = init_calculator(Backend::Chgnet, None).unwrap();
        let resolved = CalculatorSpec::Instance(inner).resolve(None).unwrap();
        assert_eq!(resolved.name(), "chgnet");
    }

    #[test]
    fn evaluation_reports_forces_and_stress_for_a_periodic_system() {
        let calculator = init_calculator(Backend::Chgnet, None).unwrap();
        let evaluation = calculator.evaluate(&dimer()).unwrap();
        assert_eq!(evaluation.forces.len(), 2);
        assert!(evaluation.stress.is_some());
        // Forces on an isolated dimer are equal and opposite.
        let sum = evaluation.forces[0] + evaluation.forces[1];
        assert!(sum.norm() < 1e-9);
    }
}
