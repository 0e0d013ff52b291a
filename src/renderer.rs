pub mod device;
pub mod hal;
pub mod resources;
pub mod shader;
pub mod vertex;

#[cfg(test)]
mod mock;

use crate::error::{Error, Result};
use crate::window::WindowEvents;

use device::{BufferUsage, Device, FrameTarget};
use resources::{BufferHandles, IndexBuffer, Program, VertexBuffer};
use vertex::{DrawCall, Geometry, Vertex};

pub const CLEAR_COLOR: [f32; 4] = [0.07, 0.13, 0.17, 1.0];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Uninitialized,
    Initialized,
    Running,
    Closed,
}

impl Default for Lifecycle {
    fn default() -> Self {
        Lifecycle::Uninitialized
    }
}

impl Lifecycle {
    fn describe(self) -> &'static str {
        match self {
            Lifecycle::Uninitialized => "uninitialized",
            Lifecycle::Initialized => "initialized",
            Lifecycle::Running => "running",
            Lifecycle::Closed => "closed",
        }
    }

    /// Moves to `next` if it directly follows the current state.
    /// A renderer that never ran may close straight from `Initialized`.
    pub fn advance(&mut self, operation: &'static str, next: Lifecycle) -> Result<()> {
        use Lifecycle::*;
        match (*self, next) {
            (Uninitialized, Initialized)
            | (Initialized, Running)
            | (Running, Closed)
            | (Initialized, Closed) => {
                log::debug!("renderer {} -> {}", self.describe(), next.describe());
                *self = next;
                Ok(())
            }
            (current, _) => Err(Error::InvalidState {
                operation,
                state: current.describe(),
            }),
        }
    }

    fn require(self, operation: &'static str, expected: Lifecycle) -> Result<()> {
        if self == expected {
            Ok(())
        } else {
            Err(Error::InvalidState {
                operation,
                state: self.describe(),
            })
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FrameStats {
    pub frames: u64,
    /// Iterations whose image could not be acquired.
    pub skipped: u64,
    pub failed_draws: u64,
    pub failed_presents: u64,
}

pub struct FrameRenderer<'a, D: Device, T: FrameTarget<D>> {
    device: &'a D,
    target: T,
    lifecycle: Lifecycle,
}

impl<'a, D, T> FrameRenderer<'a, D, T>
where
    D: Device,
    T: FrameTarget<D>,
{
    pub fn new(device: &'a D, target: T) -> Result<Self> {
        let mut lifecycle = Lifecycle::default();
        lifecycle.advance("initialize", Lifecycle::Initialized)?;
        Ok(FrameRenderer {
            device,
            target,
            lifecycle,
        })
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    pub fn target(&self) -> &T {
        &self.target
    }

    pub fn upload_static_geometry(&self, geometry: &Geometry) -> Result<BufferHandles<'a, D>> {
        self.lifecycle
            .require("upload geometry", Lifecycle::Initialized)?;
        if geometry.vertices.is_empty() {
            return Err(Error::EmptyGeometry);
        }

        let vertex_bytes = geometry.vertex_bytes();
        let raw = self.device.create_buffer(BufferUsage::Vertex, vertex_bytes)?;
        let vertices = VertexBuffer::new(self.device, raw, vertex_bytes.len());
        log::debug!(
            "uploaded {} vertices ({} bytes)",
            geometry.vertices.len(),
            vertex_bytes.len()
        );

        // on failure `vertices` drops here and releases itself
        let indices = match geometry.index_bytes() {
            Some(index_bytes) => {
                let raw = self.device.create_buffer(BufferUsage::Index, index_bytes)?;
                log::debug!("uploaded {} indices", index_bytes.len() / 4);
                Some(IndexBuffer::new(self.device, raw, index_bytes.len()))
            }
            None => None,
        };

        Ok(BufferHandles { vertices, indices })
    }

    pub fn compile_program(
        &self,
        vertex_source: &str,
        fragment_source: &str,
    ) -> Result<Program<'a, D>> {
        self.lifecycle
            .require("compile a program", Lifecycle::Initialized)?;
        let raw = self
            .device
            .create_program(vertex_source, fragment_source, &Vertex::layout())?;
        log::debug!("linked shader program");
        Ok(Program::new(self.device, raw))
    }

    /// Clears, draws once and presents until `window` asks to close.
    pub fn run_frame_loop<W: WindowEvents>(
        &mut self,
        window: &mut W,
        program: &Program<'a, D>,
        buffers: &BufferHandles<'a, D>,
        draw_call: DrawCall,
    ) -> Result<FrameStats> {
        self.lifecycle.advance("run the frame loop", Lifecycle::Running)?;
        log::info!("entering frame loop ({:?})", draw_call);

        let mut stats = FrameStats::default();
        let mut fps_counter = fps_counter::FPSCounter::new();

        while !window.should_close() {
            match self.target.begin_frame(CLEAR_COLOR) {
                Ok(()) => {
                    program.bind(&mut self.target);
                    buffers.bind(&mut self.target);
                    if let Err(err) = self.target.draw(draw_call) {
                        log::warn!("draw failed: {}", err);
                        stats.failed_draws += 1;
                    }
                    match self.target.present() {
                        Ok(()) => stats.frames += 1,
                        Err(err) => {
                            log::warn!("present failed: {}", err);
                            stats.failed_presents += 1;
                        }
                    }
                    log::trace!("frame {}: {} fps", stats.frames, fps_counter.tick());
                }
                Err(err) => {
                    log::debug!("skipping frame: {}", err);
                    stats.skipped += 1;
                }
            }
            window.poll_events();
        }

        self.lifecycle.advance("close", Lifecycle::Closed)?;
        log::info!(
            "frame loop finished after {} frames ({} skipped)",
            stats.frames,
            stats.skipped
        );
        Ok(stats)
    }

    pub fn teardown(mut self, program: Program<'a, D>, buffers: BufferHandles<'a, D>) {
        if self.lifecycle != Lifecycle::Closed {
            if let Err(err) = self.lifecycle.advance("teardown", Lifecycle::Closed) {
                log::warn!("{}", err);
            }
        }
        self.device.wait_idle();
        buffers.release();
        program.release();
        log::debug!("renderer torn down");
    }
}

pub fn verify_upload<D: Device>(geometry: &Geometry, buffers: &BufferHandles<'_, D>) -> Result<()> {
    if buffers.vertices.read_back()? != geometry.vertex_bytes() {
        return Err(Error::UploadMismatch { buffer: "vertex" });
    }
    match (geometry.index_bytes(), &buffers.indices) {
        (Some(expected), Some(indices)) => {
            if indices.read_back()? != expected {
                return Err(Error::UploadMismatch { buffer: "index" });
            }
        }
        (None, None) => {}
        _ => return Err(Error::UploadMismatch { buffer: "index" }),
    }
    Ok(())
}
