use gfx_hal::{
    adapter::{Adapter, MemoryType},
    buffer as b, command, format as f, image as i, pass, pool,
    prelude::*,
    queue::{QueueGroup, Submission},
    window::{Extent2D, PresentationSurface},
    Backend, Features, IndexType, Limits,
};

use std::borrow::Borrow;
use std::iter;
use std::mem::ManuallyDrop;
use std::ptr;

mod memory;
mod pipeline;
mod swapchain;

use memory::HalBuffer;
use pipeline::Pipeline;
use swapchain::Swapchain;

use super::device::{BindSlot, Bindings, BufferUsage, Device as RenderDevice, FrameTarget};
use super::shader::{self, ShaderStage};
use super::vertex::{DrawCall, VertexLayout};
use crate::error::{Error, Result};

const FRAMES_IN_FLIGHT: usize = 2;

pub struct HalDevice<B: Backend> {
    device: B::Device,
    memory_types: Vec<MemoryType>,
    limits: Limits,
    format: f::Format,
    render_pass: ManuallyDrop<B::RenderPass>,
}

impl<B: Backend> HalDevice<B> {
    /// Opens a logical device with one graphics queue able to present to `surface`.
    pub fn open(adapter: &Adapter<B>, surface: &B::Surface) -> Result<(Self, QueueGroup<B>)> {
        let family = adapter
            .queue_families
            .iter()
            .find(|family| {
                surface.supports_queue_family(family) && family.queue_type().supports_graphics()
            })
            .ok_or_else(|| {
                Error::Initialization("no queue family can draw to this surface".into())
            })?;
        let mut gpu = unsafe {
            adapter
                .physical_device
                .open(&[(family, &[1.0])], Features::empty())
        }
        .map_err(|err| Error::Initialization(format!("cannot open device: {:?}", err)))?;

        let queue_group = gpu
            .queue_groups
            .pop()
            .ok_or_else(|| Error::Initialization("device returned no queues".into()))?;
        let device = gpu.device;

        let format = swapchain::pick_format(surface, adapter);
        let render_pass = Self::create_render_pass(&device, format)?;
        log::info!("using {} ({:?})", adapter.info.name, format);

        Ok((
            HalDevice {
                device,
                memory_types: adapter.physical_device.memory_properties().memory_types,
                limits: adapter.physical_device.limits(),
                format,
                render_pass: ManuallyDrop::new(render_pass),
            },
            queue_group,
        ))
    }

    fn create_render_pass(device: &B::Device, format: f::Format) -> Result<B::RenderPass> {
        let attachment = pass::Attachment {
            format: Some(format),
            samples: 1,
            ops: pass::AttachmentOps::new(
                pass::AttachmentLoadOp::Clear,
                pass::AttachmentStoreOp::Store,
            ),
            stencil_ops: pass::AttachmentOps::DONT_CARE,
            layouts: i::Layout::Undefined..i::Layout::Present,
        };

        let subpass = pass::SubpassDesc {
            colors: &[(0, i::Layout::ColorAttachmentOptimal)],
            depth_stencil: None,
            inputs: &[],
            resolves: &[],
            preserves: &[],
        };

        unsafe {
            device.create_render_pass(
                iter::once(attachment),
                iter::once(subpass),
                iter::empty::<pass::SubpassDependency>(),
            )
        }
        .map_err(|err| Error::Initialization(format!("cannot create render pass: {:?}", err)))
    }
}

impl<B: Backend> RenderDevice for HalDevice<B> {
    type Buffer = HalBuffer<B>;
    type Program = Pipeline<B>;

    fn create_buffer(&self, usage: BufferUsage, data: &[u8]) -> Result<HalBuffer<B>> {
        HalBuffer::upload(&self.device, usage, data, &self.memory_types, &self.limits)
    }

    fn read_buffer(&self, buffer: &HalBuffer<B>) -> Result<Vec<u8>> {
        buffer.read(&self.device)
    }

    fn destroy_buffer(&self, buffer: HalBuffer<B>) {
        buffer.destroy(&self.device);
    }

    fn create_program(
        &self,
        vertex_source: &str,
        fragment_source: &str,
        layout: &VertexLayout,
    ) -> Result<Pipeline<B>> {
        let vs_spirv = shader::compile(vertex_source, ShaderStage::Vertex)?;
        let fs_spirv = shader::compile(fragment_source, ShaderStage::Fragment)?;
        Pipeline::new(
            &self.device,
            &vs_spirv,
            &fs_spirv,
            &*self.render_pass,
            layout,
        )
    }

    fn destroy_program(&self, program: Pipeline<B>) {
        program.destroy(&self.device);
    }

    fn wait_idle(&self) {
        if let Err(err) = self.device.wait_idle() {
            log::warn!("device did not go idle: {:?}", err);
        }
    }
}

impl<B: Backend> Drop for HalDevice<B> {
    fn drop(&mut self) {
        unsafe {
            self.device
                .destroy_render_pass(ManuallyDrop::into_inner(ptr::read(&self.render_pass)));
        }
    }
}

type SwapchainImage<B> = <<B as Backend>::Surface as PresentationSurface<B>>::SwapchainImage;

pub struct HalFrameTarget<'a, B: Backend> {
    device: &'a B::Device,
    render_pass: &'a B::RenderPass,
    queue: &'a mut B::CommandQueue,
    swapchain: ManuallyDrop<Swapchain<'a, B>>,
    command_pool: ManuallyDrop<B::CommandPool>,
    command_buffers: Vec<B::CommandBuffer>,
    submission_complete_semaphores: Vec<B::Semaphore>,
    submission_complete_fences: Vec<B::Fence>,
    framebuffers: Vec<Option<B::Framebuffer>>,
    acquired: Option<SwapchainImage<B>>,
    frame: usize,
    bindings: Bindings,
}

impl<'a, B: Backend> HalFrameTarget<'a, B> {
    pub fn new(
        hal: &'a HalDevice<B>,
        adapter: &'a Adapter<B>,
        surface: &'a mut B::Surface,
        queue_group: &'a mut QueueGroup<B>,
        dims: Extent2D,
    ) -> Result<Self> {
        let device = &hal.device;
        let family = queue_group.family;
        let queue = queue_group
            .queues
            .first_mut()
            .ok_or_else(|| Error::Initialization("queue group is empty".into()))?;

        let swapchain = Swapchain::new(device, surface, adapter, hal.format, dims)?;
        let command_pool = unsafe {
            device.create_command_pool(family, pool::CommandPoolCreateFlags::RESET_INDIVIDUAL)
        }
        .map_err(|err| Error::Initialization(format!("cannot create command pool: {:?}", err)))?;

        // from here on a failure drops `target`, which destroys what exists so far
        let mut target = HalFrameTarget {
            device,
            render_pass: &*hal.render_pass,
            queue,
            swapchain: ManuallyDrop::new(swapchain),
            command_pool: ManuallyDrop::new(command_pool),
            command_buffers: Vec::with_capacity(FRAMES_IN_FLIGHT),
            submission_complete_semaphores: Vec::with_capacity(FRAMES_IN_FLIGHT),
            submission_complete_fences: Vec::with_capacity(FRAMES_IN_FLIGHT),
            framebuffers: (0..FRAMES_IN_FLIGHT).map(|_| None).collect(),
            acquired: None,
            frame: 0,
            bindings: Bindings::default(),
        };

        for _ in 0..FRAMES_IN_FLIGHT {
            let cmd_buffer = unsafe { target.command_pool.allocate_one(command::Level::Primary) };
            target.command_buffers.push(cmd_buffer);
            target.submission_complete_semaphores.push(
                device
                    .create_semaphore()
                    .map_err(|err| Error::Initialization(format!("cannot create semaphore: {:?}", err)))?,
            );
            target.submission_complete_fences.push(
                device
                    .create_fence(true)
                    .map_err(|err| Error::Initialization(format!("cannot create fence: {:?}", err)))?,
            );
        }

        Ok(target)
    }

    fn frame_index(&self) -> usize {
        self.frame % FRAMES_IN_FLIGHT
    }

    fn recording(&mut self) -> Option<&mut B::CommandBuffer> {
        if self.acquired.is_none() {
            return None;
        }
        let frame_idx = self.frame_index();
        Some(&mut self.command_buffers[frame_idx])
    }
}

impl<'a, B: Backend> FrameTarget<HalDevice<B>> for HalFrameTarget<'a, B> {
    fn begin_frame(&mut self, clear_color: [f32; 4]) -> Result<()> {
        if self.acquired.is_some() {
            return Err(Error::InvalidState {
                operation: "begin a frame",
                state: "a frame is already open",
            });
        }
        let frame_idx = self.frame_index();

        unsafe {
            self.device
                .wait_for_fence(&self.submission_complete_fences[frame_idx], !0)
                .map_err(|err| Error::Frame(format!("cannot wait for fence: {:?}", err)))?;
        }

        let surface_image = match unsafe { self.swapchain.surface.acquire_image(!0) } {
            Ok((image, _)) => image,
            Err(err) => {
                self.swapchain.recreate()?;
                return Err(Error::Frame(format!("cannot acquire image: {:?}", err)));
            }
        };

        if let Some(framebuffer) = self.framebuffers[frame_idx].take() {
            unsafe { self.device.destroy_framebuffer(framebuffer) };
        }

        // the fence stays signalled until the frame is certain to be submitted
        let prepared = unsafe {
            self.device
                .create_framebuffer(
                    self.render_pass,
                    iter::once(surface_image.borrow()),
                    i::Extent {
                        width: self.swapchain.dims.width,
                        height: self.swapchain.dims.height,
                        depth: 1,
                    },
                )
                .map_err(|err| Error::Frame(format!("cannot create framebuffer: {:?}", err)))
                .and_then(|framebuffer| {
                    match self
                        .device
                        .reset_fence(&self.submission_complete_fences[frame_idx])
                    {
                        Ok(()) => Ok(framebuffer),
                        Err(err) => {
                            self.device.destroy_framebuffer(framebuffer);
                            Err(Error::Frame(format!("cannot reset fence: {:?}", err)))
                        }
                    }
                })
        };
        let framebuffer = match prepared {
            Ok(framebuffer) => framebuffer,
            Err(err) => {
                // the unpresented image goes back with the old swapchain
                drop(surface_image);
                self.swapchain.recreate()?;
                return Err(err);
            }
        };

        let viewport = self.swapchain.viewport.clone();
        let cmd_buffer = &mut self.command_buffers[frame_idx];
        unsafe {
            cmd_buffer.begin_primary(command::CommandBufferFlags::ONE_TIME_SUBMIT);
            cmd_buffer.set_viewports(0, &[viewport.clone()]);
            cmd_buffer.set_scissors(0, &[viewport.rect]);
            cmd_buffer.begin_render_pass(
                self.render_pass,
                &framebuffer,
                viewport.rect,
                &[command::ClearValue {
                    color: command::ClearColor {
                        float32: clear_color,
                    },
                }],
                command::SubpassContents::Inline,
            );
        }

        self.framebuffers[frame_idx] = Some(framebuffer);
        self.acquired = Some(surface_image);
        self.bindings.clear();
        Ok(())
    }

    fn bind_program(&mut self, program: &Pipeline<B>) {
        match self.recording() {
            Some(cmd_buffer) => {
                unsafe { cmd_buffer.bind_graphics_pipeline(&program.pipeline) };
                self.bindings.set(BindSlot::Program, true);
            }
            None => log::warn!("program bound outside of a frame"),
        }
    }

    fn bind_vertex_buffer(&mut self, buffer: &HalBuffer<B>) {
        match self.recording() {
            Some(cmd_buffer) => {
                unsafe {
                    cmd_buffer.bind_vertex_buffers(0, iter::once((&buffer.buf, b::SubRange::WHOLE)))
                };
                self.bindings.set(BindSlot::VertexBuffer, true);
            }
            None => log::warn!("vertex buffer bound outside of a frame"),
        }
    }

    fn bind_index_buffer(&mut self, buffer: &HalBuffer<B>) {
        match self.recording() {
            Some(cmd_buffer) => {
                unsafe {
                    cmd_buffer.bind_index_buffer(b::IndexBufferView {
                        buffer: &buffer.buf,
                        range: b::SubRange::WHOLE,
                        index_type: IndexType::U32,
                    })
                };
                self.bindings.set(BindSlot::IndexBuffer, true);
            }
            None => log::warn!("index buffer bound outside of a frame"),
        }
    }

    fn unbind(&mut self, slot: BindSlot) {
        // command buffers have no unbind; the slot just stops counting as bound
        self.bindings.set(slot, false);
    }

    fn draw(&mut self, call: DrawCall) -> Result<()> {
        self.bindings.check(&call)?;
        let cmd_buffer = self.recording().ok_or(Error::InvalidState {
            operation: "draw",
            state: "no frame is open",
        })?;
        unsafe {
            match call {
                DrawCall::Arrays { first, count, .. } => cmd_buffer.draw(first..first + count, 0..1),
                DrawCall::Indexed { count, .. } => cmd_buffer.draw_indexed(0..count, 0, 0..1),
            }
        }
        Ok(())
    }

    fn present(&mut self) -> Result<()> {
        let surface_image = self.acquired.take().ok_or(Error::InvalidState {
            operation: "present",
            state: "no frame is open",
        })?;
        let frame_idx = self.frame_index();
        self.frame += 1;
        self.bindings.clear();

        let result = unsafe {
            let cmd_buffer = &mut self.command_buffers[frame_idx];
            cmd_buffer.end_render_pass();
            cmd_buffer.finish();

            let submission = Submission {
                command_buffers: iter::once(&*cmd_buffer),
                wait_semaphores: None,
                signal_semaphores: iter::once(&self.submission_complete_semaphores[frame_idx]),
            };
            self.queue.submit(
                submission,
                Some(&self.submission_complete_fences[frame_idx]),
            );

            self.queue.present_surface(
                &mut *self.swapchain.surface,
                surface_image,
                Some(&self.submission_complete_semaphores[frame_idx]),
            )
        };

        if let Err(err) = result {
            self.swapchain.recreate()?;
            return Err(Error::Frame(format!("cannot present: {:?}", err)));
        }
        Ok(())
    }
}

impl<'a, B: Backend> Drop for HalFrameTarget<'a, B> {
    fn drop(&mut self) {
        if let Err(err) = self.device.wait_idle() {
            log::warn!("device did not go idle: {:?}", err);
        }
        self.acquired.take();
        unsafe {
            for framebuffer in self.framebuffers.drain(..).flatten() {
                self.device.destroy_framebuffer(framebuffer);
            }
            self.device
                .destroy_command_pool(ManuallyDrop::into_inner(ptr::read(&self.command_pool)));
            for s in self.submission_complete_semaphores.drain(..) {
                self.device.destroy_semaphore(s);
            }
            for f in self.submission_complete_fences.drain(..) {
                self.device.destroy_fence(f);
            }
            ManuallyDrop::drop(&mut self.swapchain);
        }
    }
}
