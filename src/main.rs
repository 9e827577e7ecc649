use std::path::Path;
use std::sync::Arc;

use vulkano::command_buffer::allocator::StandardCommandBufferAllocator;
use vulkano::instance::{Instance, InstanceCreateFlags, InstanceCreateInfo};
use vulkano::memory::allocator::StandardMemoryAllocator;
use vulkano::swapchain::Surface;
use vulkano::VulkanLibrary;

use winit::dpi::PhysicalSize;
use winit::event::{ElementState, Event, KeyEvent, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::WindowBuilder;

mod camera;
mod config;
mod error;
mod render_system;
mod scheduler;
mod transform;

use camera::{Camera, InteractiveCamera, OrbitCamera};
use config::{RenderSettings, SHADING_ALBEDO, SHADING_PATH_TRACED};
use error::RenderError;
use render_system::interactive_rendering::{self, Renderer};
use render_system::scene::{SceneBundle, SphereData};
use scheduler::{PassExecutor, RenderScheduler};

const CANVAS_WD: u32 = 800;
const CANVAS_HT: u32 = 600;

// glue between the scheduler tick and the renderer: one pass reads the live
// camera transform and the current settings
struct PassDriver<'a> {
    renderer: &'a mut Renderer,
    camera: &'a OrbitCamera,
    settings: &'a RenderSettings,
}

impl PassExecutor for PassDriver<'_> {
    fn execute_pass(&mut self, render_pass: u32) {
        self.renderer
            .render(render_pass, self.camera.eye_to_world(), self.settings);
    }
}

fn build_scene() -> Vec<SphereData> {
    vec![
        // ground
        SphereData::lambert([0.0, 0.0, -1001.0], 1000.0, [0.5, 0.5, 0.5]),
        // matte centerpiece flanked by a polished and a brushed metal sphere
        SphereData::lambert([0.0, 0.0, 0.0], 1.0, [0.7, 0.3, 0.3]),
        SphereData::metal([2.2, 0.0, 0.0], 1.0, [0.8, 0.8, 0.9], 0.05),
        SphereData::metal([-2.2, 0.0, 0.0], 1.0, [0.8, 0.6, 0.2], 0.4),
        // area light
        SphereData::emissive([0.0, 1.5, 3.5], 1.0, [6.0, 6.0, 6.0]),
    ]
}

// 1/2 switch shading mode; any change restarts convergence
fn shading_key(event: &WindowEvent) -> Option<u32> {
    match event {
        WindowEvent::KeyboardInput {
            event:
                KeyEvent {
                    physical_key: PhysicalKey::Code(code),
                    state: ElementState::Pressed,
                    ..
                },
            ..
        } => match code {
            KeyCode::Digit1 => Some(SHADING_ALBEDO),
            KeyCode::Digit2 => Some(SHADING_PATH_TRACED),
            _ => None,
        },
        _ => None,
    }
}

fn run() -> Result<(), RenderError> {
    let mut settings = RenderSettings::load_or_default(Path::new("settings.json"))?;

    let library = VulkanLibrary::new()?;
    let event_loop = EventLoop::new()?;
    let required_extensions = Surface::required_extensions(&event_loop).unwrap();

    let instance = Instance::new(
        library,
        InstanceCreateInfo {
            flags: InstanceCreateFlags::ENUMERATE_PORTABILITY,
            enabled_extensions: required_extensions,
            ..Default::default()
        },
    )?;

    // the presentation surface is fixed to the render resolution so it
    // always matches the accumulation cache extent
    let window = Arc::new(
        WindowBuilder::new()
            .with_title("progressive path tracer")
            .with_inner_size(PhysicalSize::new(CANVAS_WD, CANVAS_HT))
            .with_resizable(false)
            .build(&event_loop)?,
    );

    let surface = Surface::from_window(instance.clone(), window.clone())
        .expect("failed to create window surface");

    let (device, general_queue) =
        interactive_rendering::get_device_for_rendering_on(instance.clone(), surface.clone())?;

    log::info!(
        "using device: {} (type: {:?})",
        device.physical_device().properties().device_name,
        device.physical_device().properties().device_type
    );

    let memory_allocator = Arc::new(StandardMemoryAllocator::new_default(device.clone()));
    let command_buffer_allocator = Arc::new(StandardCommandBufferAllocator::new(
        device.clone(),
        Default::default(),
    ));

    let scene = SceneBundle::upload(
        general_queue.clone(),
        command_buffer_allocator.clone(),
        memory_allocator.clone(),
        build_scene(),
    )?;

    let mut renderer = Renderer::new(
        surface,
        general_queue,
        command_buffer_allocator,
        memory_allocator,
        scene,
    )?;

    let mut camera = OrbitCamera::new();
    let mut scheduler = RenderScheduler::new();

    // scene uploaded and pipelines compiled, start converging
    scheduler.restart();
    window.request_redraw();

    event_loop.run(move |event, elwt| {
        elwt.set_control_flow(ControlFlow::Wait);
        match event {
            Event::WindowEvent {
                event: WindowEvent::CloseRequested,
                ..
            } => {
                elwt.exit();
            }
            Event::WindowEvent {
                event: WindowEvent::RedrawRequested,
                ..
            } => {
                let keep_going = scheduler.advance(
                    settings.num_samples,
                    &mut PassDriver {
                        renderer: &mut renderer,
                        camera: &camera,
                        settings: &settings,
                    },
                );
                if keep_going {
                    window.request_redraw();
                }
            }
            Event::WindowEvent { event, .. } => {
                if let Some(shading) = shading_key(&event) {
                    if shading != settings.shading {
                        settings.shading = shading;
                        if scheduler.restart() {
                            window.request_redraw();
                        }
                    }
                } else if camera.handle_event(&event) {
                    if scheduler.restart() {
                        window.request_redraw();
                    }
                }
            }
            _ => (),
        }
    })?;

    Ok(())
}

fn main() {
    env_logger::init();
    if let Err(e) = run() {
        log::error!("fatal: {e}");
        std::process::exit(1);
    }
}
