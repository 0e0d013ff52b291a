use gfx_hal::{
    adapter::MemoryType, buffer, memory as m, prelude::*, Backend, Limits, MemoryTypeId,
};
use std::iter;
use std::ptr;

use crate::error::{Error, Result};
use crate::renderer::device::BufferUsage;

pub struct HalBuffer<B: Backend> {
    pub(super) buf: B::Buffer,
    memory: B::Memory,
    len: u64,
}

fn alloc_error(what: &str, err: impl std::fmt::Debug) -> Error {
    Error::Allocation(format!("{}: {:?}", what, err))
}

impl<B: Backend> HalBuffer<B> {
    pub fn upload(
        device: &B::Device,
        usage: BufferUsage,
        content: &[u8],
        memory_types: &[MemoryType],
        limits: &Limits,
    ) -> Result<Self> {
        let non_coherent_alignment = limits.non_coherent_atom_size as u64;
        let len = content.len() as u64;
        if len == 0 {
            return Err(Error::Allocation("zero-sized buffer".into()));
        }
        let memory_size =
            ((len + non_coherent_alignment - 1) / non_coherent_alignment) * non_coherent_alignment;

        let usage = match usage {
            BufferUsage::Vertex => buffer::Usage::VERTEX,
            BufferUsage::Index => buffer::Usage::INDEX,
        };
        let mut buf = unsafe { device.create_buffer(memory_size, usage) }
            .map_err(|err| alloc_error("cannot create buffer", err))?;

        match Self::allocate_gpu_memory(device, &mut buf, content, memory_types) {
            Ok(memory) => Ok(HalBuffer { buf, memory, len }),
            Err(err) => {
                unsafe { device.destroy_buffer(buf) };
                Err(err)
            }
        }
    }

    fn allocate_gpu_memory(
        device: &B::Device,
        buf: &mut B::Buffer,
        content: &[u8],
        memory_types: &[MemoryType],
    ) -> Result<B::Memory> {
        unsafe {
            let buffer_req = device.get_buffer_requirements(buf);
            let upload_type = Self::upload_type(memory_types, &buffer_req).ok_or_else(|| {
                Error::Allocation("no CPU-visible memory type fits the buffer".into())
            })?;
            let memory = device
                .allocate_memory(upload_type, buffer_req.size)
                .map_err(|err| alloc_error("cannot allocate memory", err))?;

            if let Err(err) = Self::fill(device, buf, &memory, content) {
                device.free_memory(memory);
                return Err(err);
            }
            Ok(memory)
        }
    }

    unsafe fn fill(
        device: &B::Device,
        buf: &mut B::Buffer,
        memory: &B::Memory,
        content: &[u8],
    ) -> Result<()> {
        device
            .bind_buffer_memory(memory, 0, buf)
            .map_err(|err| alloc_error("cannot bind buffer memory", err))?;
        let mapping = device
            .map_memory(memory, m::Segment::ALL)
            .map_err(|err| alloc_error("cannot map memory", err))?;
        ptr::copy_nonoverlapping(content.as_ptr(), mapping, content.len());
        let flushed = device.flush_mapped_memory_ranges(iter::once((memory, m::Segment::ALL)));
        device.unmap_memory(memory);
        flushed.map_err(|err| alloc_error("cannot flush mapped memory", err))
    }

    pub fn read(&self, device: &B::Device) -> Result<Vec<u8>> {
        let mut content = vec![0u8; self.len as usize];
        unsafe {
            let mapping = device
                .map_memory(&self.memory, m::Segment::ALL)
                .map_err(|err| alloc_error("cannot map memory", err))?;
            let invalidated =
                device.invalidate_mapped_memory_ranges(iter::once((&self.memory, m::Segment::ALL)));
            if invalidated.is_ok() {
                ptr::copy_nonoverlapping(mapping as *const u8, content.as_mut_ptr(), content.len());
            }
            device.unmap_memory(&self.memory);
            invalidated.map_err(|err| alloc_error("cannot invalidate mapped memory", err))?;
        }
        Ok(content)
    }

    pub fn destroy(self, device: &B::Device) {
        unsafe {
            device.destroy_buffer(self.buf);
            device.free_memory(self.memory);
        }
    }

    fn upload_type(properties: &[MemoryType], buffer_req: &m::Requirements) -> Option<MemoryTypeId> {
        properties
            .iter()
            .enumerate()
            .position(|(id, mem_type)| {
                buffer_req.type_mask & (1 << id) != 0
                    && mem_type.properties.contains(m::Properties::CPU_VISIBLE)
            })
            .map(MemoryTypeId::from)
    }
}
