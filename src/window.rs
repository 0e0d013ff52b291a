use winit::{
    dpi::{LogicalSize, PhysicalSize, Size},
    event::{Event, KeyboardInput, VirtualKeyCode, WindowEvent},
    event_loop::{ControlFlow, EventLoop},
    platform::desktop::EventLoopExtDesktop,
    window::{Window, WindowBuilder},
};

use crate::error::{Error, Result};

pub trait WindowEvents {
    fn should_close(&self) -> bool;

    /// Handles everything queued since the last call without blocking.
    fn poll_events(&mut self);
}

pub struct AppWindow {
    event_loop: EventLoop<()>,
    window: Window,
    close_requested: bool,
}

pub fn initialize(width: u32, height: u32, title: &str) -> Result<AppWindow> {
    if width == 0 || height == 0 {
        return Err(Error::WindowCreation(format!(
            "window size must be non-zero, got {}x{}",
            width, height
        )));
    }

    let event_loop = EventLoop::new();
    let window = WindowBuilder::new()
        .with_title(title)
        .with_inner_size(Size::Physical(PhysicalSize::new(width, height)))
        .with_min_inner_size(Size::Logical(LogicalSize::new(64.0, 64.0)))
        .build(&event_loop)
        .map_err(|err| Error::WindowCreation(err.to_string()))?;
    log::info!("opened window \"{}\" ({}x{})", title, width, height);

    Ok(AppWindow {
        event_loop,
        window,
        close_requested: false,
    })
}

impl AppWindow {
    pub fn raw(&self) -> &Window {
        &self.window
    }
}

impl WindowEvents for AppWindow {
    fn should_close(&self) -> bool {
        self.close_requested
    }

    fn poll_events(&mut self) {
        let close_requested = &mut self.close_requested;
        self.event_loop.run_return(|event, _, control_flow| {
            *control_flow = ControlFlow::Poll;
            match event {
                Event::WindowEvent { event, .. } => match event {
                    WindowEvent::CloseRequested
                    | WindowEvent::KeyboardInput {
                        input:
                            KeyboardInput {
                                virtual_keycode: Some(VirtualKeyCode::Escape),
                                ..
                            },
                        ..
                    } => {
                        log::info!("close requested");
                        *close_requested = true;
                    }
                    _ => {}
                },
                Event::MainEventsCleared => *control_flow = ControlFlow::Exit,
                _ => {}
            }
        });
    }
}

impl Drop for AppWindow {
    fn drop(&mut self) {
        log::debug!("destroying window");
    }
}
