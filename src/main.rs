#[cfg(feature = "metal")]
use gfx_backend_metal as back;

#[cfg(feature = "vulkan")]
use gfx_backend_vulkan as back;

mod config;
mod error;
mod renderer;
mod window;

use clap::Parser;
use gfx_hal::{adapter::Adapter, prelude::*, window::Extent2D, Backend};
use std::process;

use config::Args;
use error::{Error, Result};
use renderer::hal::{HalDevice, HalFrameTarget};
use renderer::{shader, verify_upload, FrameRenderer};
use window::AppWindow;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut window = match window::initialize(args.width, args.height, &args.title) {
        Ok(window) => window,
        Err(err) => {
            eprintln!("{}", err);
            process::exit(-1);
        }
    };

    if let Err(err) = run(&args, &mut window) {
        log::error!("{}", err);
        drop(window);
        process::exit(1);
    }
}

fn run(args: &Args, window: &mut AppWindow) -> Result<()> {
    let instance = back::Instance::create("gfx-frame-renderer", 1).map_err(|_| {
        Error::Initialization("graphics backend is not supported on this system".into())
    })?;
    let mut surface = unsafe { instance.create_surface(window.raw()) }
        .map_err(|err| Error::Initialization(format!("cannot create surface: {:?}", err)))?;

    let mut adapters = instance.enumerate_adapters();
    let result = if adapters.is_empty() {
        Err(Error::Initialization("no graphics adapter found".into()))
    } else {
        render::<back::Backend>(args, window, adapters.remove(0), &mut surface)
    };

    unsafe {
        instance.destroy_surface(surface);
    }
    result
}

fn render<B: Backend>(
    args: &Args,
    window: &mut AppWindow,
    adapter: Adapter<B>,
    surface: &mut B::Surface,
) -> Result<()> {
    let (device, mut queue_group) = HalDevice::open(&adapter, surface)?;
    let dims = Extent2D {
        width: args.width,
        height: args.height,
    };
    let target = HalFrameTarget::new(&device, &adapter, surface, &mut queue_group, dims)?;
    let mut renderer = FrameRenderer::new(&device, target)?;

    let geometry = args.scene.geometry();
    let buffers = renderer.upload_static_geometry(&geometry)?;
    if args.verify_upload {
        verify_upload(&geometry, &buffers)?;
        log::info!("uploaded buffers match the source arrays");
    }

    let program = renderer.compile_program(shader::VERTEX_SOURCE, shader::FRAGMENT_SOURCE)?;

    let stats = renderer.run_frame_loop(window, &program, &buffers, geometry.draw_call())?;
    renderer.teardown(program, buffers);
    log::info!("presented {} frames", stats.frames);
    Ok(())
}
