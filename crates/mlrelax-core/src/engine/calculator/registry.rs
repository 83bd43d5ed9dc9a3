use super::model::PotentialModel;
use crate::core::models::atoms::AtomicSystem;
use crate::engine::error::EngineError;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Name of the pretrained structure potential used for relaxation.
pub const M3GNET_PES: &str = "M3GNet-MP-2021.2.8-PES";

/// Name of the pretrained multi-fidelity band-gap model.
pub const MEGNET_BANDGAP: &str = "MEGNet-MP-2019.4.1-BandGap-mfi";

fn registry_dir() -> Option<PathBuf> {
    ProjectDirs::from("org", "mlrelax", "mlrelax").map(|dirs| dirs.data_dir().join("models"))
}

fn on_disk(name: &str) -> Option<PathBuf> {
    let path = registry_dir()?.join(format!("{name}.toml"));
    path.is_file().then_some(path)
}

/// Resolves a named pretrained potential: a user-installed parameter file in
/// the per-user data directory wins, otherwise the bundled parameter set for
/// the known names is used.
pub fn load_potential(name: &str) -> Result<PotentialModel, EngineError> {
    if let Some(path) = on_disk(name) {
        debug!(model = name, path = %path.display(), "loading potential from registry dir");
        return PotentialModel::from_file(&path);
    }
    match name {
        M3GNET_PES => Ok(PotentialModel::pretrained(name)),
        _ => Err(EngineError::ModelNotFound(name.to_string())),
    }
}

/// Resolves a named band-gap model, with the same precedence as
/// [`load_potential`].
pub fn load_gap_model(name: &str) -> Result<GapModel, EngineError> {
    if let Some(path) = on_disk(name) {
        debug!(model = name, path = %path.display(), "loading gap model from registry dir");
        return GapModel::from_file(&path);
    }
    match name {
        MEGNET_BANDGAP => Ok(GapModel::pretrained(name)),
        _ => Err(EngineError::ModelNotFound(name.to_string())),
    }
}

/// A loaded structure-conditioned band-gap regression model.
///
/// Prediction is a composition average of per-element terms, rescaled and
/// shifted by the fidelity channel the call is conditioned on (one channel
/// per exchange-correlation functional).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GapModel {
    pub name: String,
    #[serde(default)]
    pub element_terms: BTreeMap<String, f64>,
    pub default_term: f64,
    pub fidelity_scale: [f64; 4],
    pub fidelity_offset: [f64; 4],
}

impl GapModel {
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

    /// The bundled parameter set for the fixed pretrained model name.
    pub fn pretrained(name: &str) -> Self {
        let element_terms = [
            ("F", 4.4),
            ("O", 3.1),
            ("Cl", 2.8),
            ("N", 2.6),
            ("S", 1.9),
            ("C", 1.6),
            ("Se", 1.5),
            ("Br", 1.9),
            ("I", 1.4),
            ("Si", 1.1),
            ("Ge", 0.7),
            ("P", 1.2),
        ]
        .into_iter()
        .map(|(symbol, term)| (symbol.to_string(), term))
        .collect();
        Self {
            name: name.to_string(),
            element_terms,
            default_term: 0.4,
            fidelity_scale: [1.0, 1.3, 1.2, 1.15],
            fidelity_offset: [0.0, 0.6, 0.5, 0.3],
        }
    }

    /// Structure-conditioned prediction: `fidelity` is the integer code of
    /// the functional channel (0..=3). Returns the gap in eV.
    pub fn predict(&self, system: &AtomicSystem, fidelity: usize) -> f64 {
        if system.is_empty() {
            return 0.0;
        }
        let mean: f64 = system
            .species()
            .iter()
            .map(|s| *self.element_terms.get(s).unwrap_or(&self.default_term))
            .sum::<f64>()
            / system.len() as f64;
        (mean * self.fidelity_scale[fidelity] + self.fidelity_offset[fidelity]).max(0.0)
    }
}
