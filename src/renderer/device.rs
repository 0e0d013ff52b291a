use crate::error::{Error, Result};

use super::vertex::{DrawCall, VertexLayout};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferUsage {
    Vertex,
    Index,
}

pub trait Device {
    type Buffer;
    type Program;

    fn create_buffer(&self, usage: BufferUsage, data: &[u8]) -> Result<Self::Buffer>;

    fn read_buffer(&self, buffer: &Self::Buffer) -> Result<Vec<u8>>;

    fn destroy_buffer(&self, buffer: Self::Buffer);

    fn create_program(
        &self,
        vertex_source: &str,
        fragment_source: &str,
        layout: &VertexLayout,
    ) -> Result<Self::Program>;

    fn destroy_program(&self, program: Self::Program);

    fn wait_idle(&self);
}

pub trait FrameTarget<D: Device> {
    /// Starts a frame cleared to `clear_color`. Bindings from the previous frame are dropped.
    fn begin_frame(&mut self, clear_color: [f32; 4]) -> Result<()>;

    fn bind_program(&mut self, program: &D::Program);
    fn bind_vertex_buffer(&mut self, buffer: &D::Buffer);
    fn bind_index_buffer(&mut self, buffer: &D::Buffer);
    fn unbind(&mut self, slot: BindSlot);

    fn draw(&mut self, call: DrawCall) -> Result<()>;

    fn present(&mut self) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindSlot {
    Program,
    VertexBuffer,
    IndexBuffer,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Bindings {
    pub program: bool,
    pub vertex_buffer: bool,
    pub index_buffer: bool,
}

impl Bindings {
    pub fn set(&mut self, slot: BindSlot, bound: bool) {
        match slot {
            BindSlot::Program => self.program = bound,
            BindSlot::VertexBuffer => self.vertex_buffer = bound,
            BindSlot::IndexBuffer => self.index_buffer = bound,
        }
    }

    pub fn clear(&mut self) {
        *self = Bindings::default();
    }

    /// Checks that everything `call` reads from is bound.
    pub fn check(&self, call: &DrawCall) -> Result<()> {
        let missing = if !self.program {
            Some("no program is bound")
        } else if !self.vertex_buffer {
            Some("no vertex buffer is bound")
        } else if call.is_indexed() && !self.index_buffer {
            Some("no index buffer is bound")
        } else {
            None
        };
        match missing {
            Some(state) => Err(Error::InvalidState {
                operation: "draw",
                state,
            }),
            None => Ok(()),
        }
    }
}
