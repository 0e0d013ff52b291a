use thiserror::Error;

use crate::renderer::shader::ShaderStage;

#[derive(Error, Debug)]
pub enum Error {
    #[error("failed to create window: {0}")]
    WindowCreation(String),
    #[error("failed to initialize graphics device: {0}")]
    Initialization(String),
    #[error("failed to compile {stage} shader:\n{log}")]
    ShaderCompilation { stage: ShaderStage, log: String },
    #[error("failed to link program: {0}")]
    ProgramLink(String),
    #[error("failed to allocate device resource: {0}")]
    Allocation(String),
    #[error("unsupported vertex layout: {0}")]
    UnsupportedLayout(String),
    #[error("refusing to upload empty vertex data")]
    EmptyGeometry,
    #[error("frame failed: {0}")]
    Frame(String),
    #[error("{buffer} buffer read back differs from the uploaded data")]
    UploadMismatch { buffer: &'static str },
    #[error("cannot {operation} while {state}")]
    InvalidState {
        operation: &'static str,
        state: &'static str,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
