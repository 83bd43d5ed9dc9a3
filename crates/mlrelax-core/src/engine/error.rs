use crate::core::io::StructureIoError;
use crate::core::models::atoms::StructureError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Unknown backend tag: '{0}' (expected matgl, m3gnet, chgnet, or deepmd)")]
    InvalidBackend(String),

    #[error("Backend '{backend}' requires a model path")]
    MissingModelPath { backend: &'static str },

    #[error("No model named '{0}' is available in the registry")]
    ModelNotFound(String),

    #[error("Failed to load model from '{path}': {message}", path = path.display())]
    ModelLoad { path: PathBuf, message: String },

    #[error("Unknown exchange-correlation functional label: '{0}'")]
    InvalidFunctional(String),

    #[error("Symmetry analysis failed: {0}")]
    Symmetry(String),

    #[error("Optimizer failed to converge within {iterations} steps")]
    Convergence { iterations: usize },

    #[error("Backend '{0}' does not provide stress; cell relaxation requires it")]
    MissingStress(String),

    #[error(transparent)]
    Structure(#[from] StructureError),

    #[error(transparent)]
    StructureIo(#[from] StructureIoError),

    #[error("Band output failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("Plot rendering failed: {0}")]
    Plot(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
