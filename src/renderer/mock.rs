use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, BTreeSet};

use crate::error::{Error, Result};
use crate::window::WindowEvents;

use super::device::{BindSlot, Bindings, BufferUsage, Device, FrameTarget};
use super::shader::ShaderStage;
use super::vertex::{DrawCall, VertexLayout};

#[derive(Debug, PartialEq, Eq)]
pub struct MockBuffer(pub u32);

#[derive(Debug, PartialEq, Eq)]
pub struct MockProgram(pub u32);

#[derive(Default)]
pub struct MockDevice {
    next_id: Cell<u32>,
    buffers: RefCell<BTreeMap<u32, (BufferUsage, Vec<u8>)>>,
    programs: RefCell<BTreeSet<u32>>,
    created: RefCell<Vec<u32>>,
    released: RefCell<Vec<u32>>,
    idle_waits: Cell<usize>,
    pub fail_allocation: Cell<bool>,
    pub fail_link: Cell<bool>,
}

impl MockDevice {
    fn next_id(&self) -> u32 {
        let id = self.next_id.get() + 1;
        self.next_id.set(id);
        self.created.borrow_mut().push(id);
        id
    }

    pub fn created(&self) -> Vec<u32> {
        self.created.borrow().clone()
    }

    pub fn released(&self) -> Vec<u32> {
        self.released.borrow().clone()
    }

    pub fn live(&self) -> usize {
        self.buffers.borrow().len() + self.programs.borrow().len()
    }

    pub fn idle_waits(&self) -> usize {
        self.idle_waits.get()
    }

    pub fn usage_of(&self, id: u32) -> Option<BufferUsage> {
        self.buffers.borrow().get(&id).map(|(usage, _)| *usage)
    }

    fn release(&self, id: u32) {
        assert!(
            !self.released.borrow().contains(&id),
            "handle {} released twice",
            id
        );
        self.released.borrow_mut().push(id);
    }
}

impl Device for MockDevice {
    type Buffer = MockBuffer;
    type Program = MockProgram;

    fn create_buffer(&self, usage: BufferUsage, data: &[u8]) -> Result<MockBuffer> {
        if self.fail_allocation.get() {
            return Err(Error::Allocation("out of device memory".into()));
        }
        let id = self.next_id();
        // mimic allocation granularity
        let mut bytes = data.to_vec();
        bytes.resize((data.len() + 255) / 256 * 256, 0);
        self.buffers.borrow_mut().insert(id, (usage, bytes));
        Ok(MockBuffer(id))
    }

    fn read_buffer(&self, buffer: &MockBuffer) -> Result<Vec<u8>> {
        self.buffers
            .borrow()
            .get(&buffer.0)
            .map(|(_, bytes)| bytes.clone())
            .ok_or_else(|| Error::Allocation(format!("unknown buffer {}", buffer.0)))
    }

    fn destroy_buffer(&self, buffer: MockBuffer) {
        self.release(buffer.0);
        self.buffers.borrow_mut().remove(&buffer.0);
    }

    fn create_program(
        &self,
        vertex_source: &str,
        fragment_source: &str,
        layout: &VertexLayout,
    ) -> Result<MockProgram> {
        for (stage, source) in [
            (ShaderStage::Vertex, vertex_source),
            (ShaderStage::Fragment, fragment_source),
        ]
        .iter()
        {
            if !source.contains("void main") {
                return Err(Error::ShaderCompilation {
                    stage: *stage,
                    log: "ERROR: 0:1: 'main' : missing entry point".into(),
                });
            }
        }
        if self.fail_link.get() || layout.attributes.is_empty() {
            return Err(Error::ProgramLink("vertex stage has no inputs".into()));
        }
        let id = self.next_id();
        self.programs.borrow_mut().insert(id);
        Ok(MockProgram(id))
    }

    fn destroy_program(&self, program: MockProgram) {
        self.release(program.0);
        self.programs.borrow_mut().remove(&program.0);
    }

    fn wait_idle(&self) {
        self.idle_waits.set(self.idle_waits.get() + 1);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FrameCall {
    Begin([f32; 4]),
    BindProgram(u32),
    BindVertexBuffer(u32),
    BindIndexBuffer(u32),
    Unbind(BindSlot),
    Draw(DrawCall),
    Present,
}

#[derive(Default)]
pub struct MockTarget {
    pub calls: Vec<FrameCall>,
    /// Zero-based `begin_frame` calls that fail as if the image could not be acquired.
    pub unavailable_frames: BTreeSet<usize>,
    pub fail_draws: bool,
    begun: usize,
    open: bool,
    bindings: Bindings,
}

impl MockTarget {
    pub fn count(&self, matches: impl Fn(&FrameCall) -> bool) -> usize {
        self.calls.iter().filter(|call| matches(call)).count()
    }

    pub fn draws(&self) -> Vec<DrawCall> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                FrameCall::Draw(draw) => Some(*draw),
                _ => None,
            })
            .collect()
    }

    pub fn presents(&self) -> usize {
        self.count(|call| *call == FrameCall::Present)
    }

    pub fn bindings(&self) -> Bindings {
        self.bindings
    }
}

impl FrameTarget<MockDevice> for MockTarget {
    fn begin_frame(&mut self, clear_color: [f32; 4]) -> Result<()> {
        let index = self.begun;
        self.begun += 1;
        if self.unavailable_frames.contains(&index) {
            return Err(Error::Frame("swapchain out of date".into()));
        }
        self.open = true;
        self.bindings.clear();
        self.calls.push(FrameCall::Begin(clear_color));
        Ok(())
    }

    fn bind_program(&mut self, program: &MockProgram) {
        self.bindings.set(BindSlot::Program, true);
        self.calls.push(FrameCall::BindProgram(program.0));
    }

    fn bind_vertex_buffer(&mut self, buffer: &MockBuffer) {
        self.bindings.set(BindSlot::VertexBuffer, true);
        self.calls.push(FrameCall::BindVertexBuffer(buffer.0));
    }

    fn bind_index_buffer(&mut self, buffer: &MockBuffer) {
        self.bindings.set(BindSlot::IndexBuffer, true);
        self.calls.push(FrameCall::BindIndexBuffer(buffer.0));
    }

    fn unbind(&mut self, slot: BindSlot) {
        self.bindings.set(slot, false);
        self.calls.push(FrameCall::Unbind(slot));
    }

    fn draw(&mut self, call: DrawCall) -> Result<()> {
        if !self.open {
            return Err(Error::InvalidState {
                operation: "draw",
                state: "no frame is open",
            });
        }
        self.bindings.check(&call)?;
        if self.fail_draws {
            return Err(Error::Frame("device lost".into()));
        }
        self.calls.push(FrameCall::Draw(call));
        Ok(())
    }

    fn present(&mut self) -> Result<()> {
        if !self.open {
            return Err(Error::InvalidState {
                operation: "present",
                state: "no frame is open",
            });
        }
        self.open = false;
        self.bindings.clear();
        self.calls.push(FrameCall::Present);
        Ok(())
    }
}

pub struct MockWindow {
    pub frames_before_close: usize,
    pub polls: usize,
}

impl MockWindow {
    pub fn closing_after(frames: usize) -> Self {
        MockWindow {
            frames_before_close: frames,
            polls: 0,
        }
    }
}

impl WindowEvents for MockWindow {
    fn should_close(&self) -> bool {
        self.polls >= self.frames_before_close
    }

    fn poll_events(&mut self) {
        self.polls += 1;
    }
}
