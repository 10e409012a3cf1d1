use smoke::{FluidEffect, Settings, Tier};

use glutin::config::{Config, ConfigTemplateBuilder, GlConfig};
use glutin::context::{
    ContextApi, ContextAttributesBuilder, GlProfile, NotCurrentContext, NotCurrentGlContext,
    PossiblyCurrentContext, Version,
};
use glutin::display::{GetGlDisplay, GlDisplay};
use glutin::surface::{GlSurface, Surface, SwapInterval, WindowSurface};
use glutin_winit::{DisplayBuilder, GlWindow};
use raw_window_handle::HasWindowHandle;
use std::error::Error;
use std::num::NonZeroU32;
use std::rc::Rc;
use std::time::Instant;
use winit::application::ApplicationHandler;
use winit::dpi::{LogicalSize, PhysicalPosition};
use winit::event::{ElementState, MouseButton, WindowEvent};
use winit::event_loop::{ActiveEventLoop, EventLoop};
use winit::keyboard::{Key, NamedKey};
use winit::window::{Window, WindowId};

const MOUSE_POINTER_ID: i64 = -1;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug")).init();

    let settings = match std::env::args().nth(1) {
        Some(path) => read_settings(&path).unwrap_or_else(|msg| {
            log::error!("Failed to read settings from {}: {}", path, msg);
            std::process::exit(1);
        }),
        None => Settings::default(),
    };

    let event_loop = match EventLoop::new() {
        Ok(event_loop) => event_loop,
        Err(msg) => {
            log::error!("Failed to create an event loop: {}", msg);
            std::process::exit(1);
        }
    };

    let mut app = App {
        settings: Rc::new(settings),
        start: Instant::now(),
        cursor: PhysicalPosition::new(0.0, 0.0),
        state: None,
    };

    if let Err(msg) = event_loop.run_app(&mut app) {
        log::error!("{}", msg);
    }
}

fn read_settings(path: &str) -> Result<Settings, Box<dyn Error>> {
    let json = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&json)?)
}

struct App {
    settings: Rc<Settings>,
    start: Instant,
    cursor: PhysicalPosition<f64>,
    state: Option<State>,
}

struct State {
    // Dropped in declaration order: GL objects go before the context.
    effect: FluidEffect,
    surface: Surface<WindowSurface>,
    context: PossiblyCurrentContext,
    window: Window,
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.state.is_some() {
            return;
        }

        match create_state(event_loop, &self.settings) {
            Ok(state) => {
                state.window.request_redraw();
                self.state = Some(state);
            }
            Err(msg) => {
                log::error!("Failed to initialise: {}", msg);
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _: WindowId, event: WindowEvent) {
        let Some(state) = self.state.as_mut() else {
            return;
        };

        match event {
            WindowEvent::CloseRequested => event_loop.exit(),

            WindowEvent::Resized(size) => {
                if let (Some(width), Some(height)) =
                    (NonZeroU32::new(size.width), NonZeroU32::new(size.height))
                {
                    state.surface.resize(&state.context, width, height);
                }
                state.effect.resize(size.width, size.height);
            }

            WindowEvent::RedrawRequested => {
                let timestamp = self.start.elapsed().as_secs_f64() * 1000.0;
                state.effect.update(timestamp);
                if let Err(msg) = state.surface.swap_buffers(&state.context) {
                    log::error!("Failed to swap buffers: {}", msg);
                }
            }

            WindowEvent::CursorMoved { position, .. } => {
                self.cursor = position;
                state.effect.update_pointer_move_data(
                    MOUSE_POINTER_ID,
                    position.x as f32,
                    position.y as f32,
                    None,
                );
            }

            WindowEvent::MouseInput {
                state: button_state,
                button: MouseButton::Left,
                ..
            } => match button_state {
                ElementState::Pressed => state.effect.update_pointer_down_data(
                    MOUSE_POINTER_ID,
                    self.cursor.x as f32,
                    self.cursor.y as f32,
                    None,
                ),
                ElementState::Released => state.effect.update_pointer_up_data(MOUSE_POINTER_ID),
            },

            WindowEvent::KeyboardInput { event, .. } if event.state == ElementState::Pressed => {
                match event.logical_key.as_ref() {
                    Key::Character("p") | Key::Character("P") => {
                        Rc::make_mut(&mut self.settings).paused ^= true;
                        state.effect.update_settings(&self.settings);
                    }
                    Key::Named(NamedKey::Space) => state.effect.push_random_burst(),
                    _ => (),
                }
            }

            WindowEvent::DroppedFile(path) => match std::fs::read(&path) {
                Ok(bytes) => state.effect.set_dithering_texture(&bytes),
                Err(msg) => log::error!("Failed to read {}: {}", path.display(), msg),
            },

            _ => (),
        }
    }

    fn about_to_wait(&mut self, _: &ActiveEventLoop) {
        if let Some(state) = &self.state {
            state.window.request_redraw();
        }
    }
}

fn create_state(
    event_loop: &ActiveEventLoop,
    settings: &Rc<Settings>,
) -> Result<State, Box<dyn Error>> {
    let window_attributes = Window::default_attributes()
        .with_title("Smoke")
        .with_inner_size(LogicalSize::new(1280, 800))
        .with_resizable(true);

    let template = ConfigTemplateBuilder::new().with_alpha_size(8);
    let (window, config) = DisplayBuilder::new()
        .with_window_attributes(Some(window_attributes.clone()))
        .build(event_loop, template, pick_config)?;
    let window = match window {
        Some(window) => window,
        None => glutin_winit::finalize_window(event_loop, window_attributes, &config)?,
    };

    let (context, tier) = create_context(&window, &config)?;

    let surface_attributes = window.build_surface_attributes(Default::default())?;
    let surface = unsafe {
        config
            .display()
            .create_window_surface(&config, &surface_attributes)?
    };
    let context = context.make_current(&surface)?;

    if let Err(msg) = surface.set_swap_interval(&context, SwapInterval::Wait(NonZeroU32::MIN)) {
        log::warn!("Failed to enable vsync: {}", msg);
    }

    let display = config.display();
    let gl = unsafe {
        glow::Context::from_loader_function_cstr(|symbol| {
            display.get_proc_address(symbol) as *const _
        })
    };

    let size = window.inner_size();
    let effect = FluidEffect::new(&Rc::new(gl), tier, size.width, size.height, settings)?;

    Ok(State {
        effect,
        surface,
        context,
        window,
    })
}

fn pick_config(configs: Box<dyn Iterator<Item = Config> + '_>) -> Config {
    configs
        .reduce(|best, config| {
            let transparency = config.supports_transparency().unwrap_or(false)
                && !best.supports_transparency().unwrap_or(false);
            if transparency || config.num_samples() < best.num_samples() {
                config
            } else {
                best
            }
        })
        .unwrap_or_else(|| {
            log::error!("No OpenGL configuration is available");
            std::process::exit(1);
        })
}

/// Prefer desktop GL 3.3, then GLES 3, then fall back to GLES 2.
fn create_context(
    window: &Window,
    config: &Config,
) -> Result<(NotCurrentContext, Tier), Box<dyn Error>> {
    let raw_window_handle = window.window_handle().ok().map(|handle| handle.as_raw());
    let display = config.display();

    let attempts = [
        (ContextApi::OpenGl(Some(Version::new(3, 3))), Tier::Modern),
        (ContextApi::Gles(Some(Version::new(3, 0))), Tier::Modern),
        (ContextApi::Gles(Some(Version::new(2, 0))), Tier::Legacy),
    ];

    for (api, tier) in attempts {
        let mut builder = ContextAttributesBuilder::new().with_context_api(api);
        if let ContextApi::OpenGl(_) = api {
            builder = builder.with_profile(GlProfile::Core);
        }
        let attributes = builder.build(raw_window_handle);

        match unsafe { display.create_context(config, &attributes) } {
            Ok(context) => {
                log::debug!("Created a {:?} context", api);
                return Ok((context, tier));
            }
            Err(msg) => log::debug!("Couldn't create a {:?} context: {}", api, msg),
        }
    }

    Err("no usable OpenGL or OpenGL ES context".into())
}
