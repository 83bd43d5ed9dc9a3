//! Structure and trajectory file I/O.
//!
//! - [`poscar`] reads and writes VASP POSCAR structure files, the text format
//!   used for relaxed-structure output.
//! - [`traj`] writes multi-frame extended-XYZ trajectories recording each
//!   optimizer step.

pub mod poscar;
pub mod traj;

use crate::core::models::atoms::StructureError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StructureIoError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error at line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error(transparent)]
    Structure(#[from] StructureError),
}
