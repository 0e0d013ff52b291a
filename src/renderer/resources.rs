use crate::error::Result;

use super::device::{BindSlot, Device, FrameTarget};

pub struct Program<'a, D: Device> {
    device: &'a D,
    raw: Option<D::Program>,
}

impl<'a, D: Device> Program<'a, D> {
    pub(super) fn new(device: &'a D, raw: D::Program) -> Self {
        Program {
            device,
            raw: Some(raw),
        }
    }

    pub fn bind<T: FrameTarget<D>>(&self, target: &mut T) {
        if let Some(raw) = &self.raw {
            target.bind_program(raw);
        }
    }

    pub fn unbind<T: FrameTarget<D>>(&self, target: &mut T) {
        target.unbind(BindSlot::Program);
    }

    pub fn release(mut self) {
        self.destroy();
    }

    fn destroy(&mut self) {
        if let Some(raw) = self.raw.take() {
            log::debug!("releasing program");
            self.device.destroy_program(raw);
        }
    }
}

impl<'a, D: Device> Drop for Program<'a, D> {
    fn drop(&mut self) {
        self.destroy();
    }
}

/// Device buffer plus the number of bytes uploaded into it.
struct RawBuffer<'a, D: Device> {
    device: &'a D,
    raw: Option<D::Buffer>,
    len: usize,
    kind: &'static str,
}

impl<'a, D: Device> RawBuffer<'a, D> {
    fn read_back(&self) -> Result<Vec<u8>> {
        match &self.raw {
            Some(raw) => {
                let mut bytes = self.device.read_buffer(raw)?;
                // allocations may be padded past the uploaded data
                bytes.truncate(self.len);
                Ok(bytes)
            }
            None => Ok(Vec::new()),
        }
    }

    fn destroy(&mut self) {
        if let Some(raw) = self.raw.take() {
            log::debug!("releasing {} buffer ({} bytes)", self.kind, self.len);
            self.device.destroy_buffer(raw);
        }
    }
}

impl<'a, D: Device> Drop for RawBuffer<'a, D> {
    fn drop(&mut self) {
        self.destroy();
    }
}

pub struct VertexBuffer<'a, D: Device> {
    inner: RawBuffer<'a, D>,
}

impl<'a, D: Device> VertexBuffer<'a, D> {
    pub(super) fn new(device: &'a D, raw: D::Buffer, len: usize) -> Self {
        VertexBuffer {
            inner: RawBuffer {
                device,
                raw: Some(raw),
                len,
                kind: "vertex",
            },
        }
    }

    pub fn bind<T: FrameTarget<D>>(&self, target: &mut T) {
        if let Some(raw) = &self.inner.raw {
            target.bind_vertex_buffer(raw);
        }
    }

    pub fn unbind<T: FrameTarget<D>>(&self, target: &mut T) {
        target.unbind(BindSlot::VertexBuffer);
    }

    pub fn read_back(&self) -> Result<Vec<u8>> {
        self.inner.read_back()
    }

    pub fn release(mut self) {
        self.inner.destroy();
    }
}

pub struct IndexBuffer<'a, D: Device> {
    inner: RawBuffer<'a, D>,
}

impl<'a, D: Device> IndexBuffer<'a, D> {
    pub(super) fn new(device: &'a D, raw: D::Buffer, len: usize) -> Self {
        IndexBuffer {
            inner: RawBuffer {
                device,
                raw: Some(raw),
                len,
                kind: "index",
            },
        }
    }

    pub fn bind<T: FrameTarget<D>>(&self, target: &mut T) {
        if let Some(raw) = &self.inner.raw {
            target.bind_index_buffer(raw);
        }
    }

    pub fn unbind<T: FrameTarget<D>>(&self, target: &mut T) {
        target.unbind(BindSlot::IndexBuffer);
    }

    pub fn read_back(&self) -> Result<Vec<u8>> {
        self.inner.read_back()
    }

    pub fn release(mut self) {
        self.inner.destroy();
    }
}

pub struct BufferHandles<'a, D: Device> {
    pub vertices: VertexBuffer<'a, D>,
    pub indices: Option<IndexBuffer<'a, D>>,
}

impl<'a, D: Device> BufferHandles<'a, D> {
    pub fn bind<T: FrameTarget<D>>(&self, target: &mut T) {
        self.vertices.bind(target);
        if let Some(indices) = &self.indices {
            indices.bind(target);
        }
    }

    pub fn unbind<T: FrameTarget<D>>(&self, target: &mut T) {
        if let Some(indices) = &self.indices {
            indices.unbind(target);
        }
        self.vertices.unbind(target);
    }

    /// Releases the index buffer before the vertex buffer it points into.
    pub fn release(self) {
        let BufferHandles { vertices, indices } = self;
        if let Some(indices) = indices {
            indices.release();
        }
        vertices.release();
    }
}
