use mlrelax::core::io::StructureIoError;
use mlrelax::engine::error::EngineError;
use mlrelax::workflows::WorkflowError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, CliError>;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Workflow(#[from] WorkflowError),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    StructureIo(#[from] StructureIoError),

    #[error("Invalid argument: {0}")]
    Argument(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
