use gfx_hal::pso;
use std::fmt;

use crate::error::{Error, Result};

pub const VERTEX_SOURCE: &str = include_str!("../data/triangle.vert");
pub const FRAGMENT_SOURCE: &str = include_str!("../data/triangle.frag");

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShaderStage::Vertex => f.write_str("vertex"),
            ShaderStage::Fragment => f.write_str("fragment"),
        }
    }
}

impl ShaderStage {
    fn glsl_type(self) -> glsl_to_spirv::ShaderType {
        match self {
            ShaderStage::Vertex => glsl_to_spirv::ShaderType::Vertex,
            ShaderStage::Fragment => glsl_to_spirv::ShaderType::Fragment,
        }
    }
}

/// Compiles one GLSL stage into SPIR-V words, keeping the compiler output on failure.
pub fn compile(source: &str, stage: ShaderStage) -> Result<Vec<u32>> {
    let file = glsl_to_spirv::compile(source, stage.glsl_type())
        .map_err(|log| Error::ShaderCompilation { stage, log })?;
    let spirv = pso::read_spirv(file).map_err(|err| Error::ShaderCompilation {
        stage,
        log: err.to_string(),
    })?;
    log::debug!("compiled {} shader into {} words", stage, spirv.len());
    Ok(spirv)
}
