use crate::core::io::StructureIoError;
use crate::core::models::atoms::StructureError;
use crate::engine::error::EngineError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    StructureIo(#[from] StructureIoError),

    #[error(transparent)]
    Structure(#[from] StructureError),
}
