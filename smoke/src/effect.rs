use crate::color::Rgb;
use crate::compositor::Compositor;
use crate::context::{self, Capabilities, Tier};
use crate::fluid::Fluid;
use crate::pointer::{Pointer, Pointers};
use crate::render::{self, Framebuffer, Quad};
use crate::rng;
use crate::settings::Settings;
use crate::surface::Surface;
use crate::targets::Resampler;

use std::rc::Rc;
use thiserror::Error;

// Longer frames are simulated as this much time so that a stalled tab doesn't
// blow up the simulation.
const MAX_FRAME_TIME: f32 = 0.016666;

pub struct FluidEffect {
    capabilities: Capabilities,

    // What the host asked for, and what the context can actually do.
    requested_settings: Rc<Settings>,
    settings: Rc<Settings>,

    surface: Surface,
    resampler: Resampler,
    fluid: Fluid,
    compositor: Compositor,
    pointers: Pointers,

    // A timestamp in milliseconds.
    last_timestamp: f64,
}

impl FluidEffect {
    pub fn new(
        context: &render::Context,
        tier: Tier,
        width: u32,
        height: u32,
        settings: &Rc<Settings>,
    ) -> Result<FluidEffect, Problem> {
        log::info!("💨 Initialising smoke");

        let capabilities = context::negotiate(context, tier);
        let formats = capabilities
            .formats()
            .ok_or(Problem::UnsupportedTextureFormat)?;
        let dialect = capabilities.dialect();

        rng::init_from_seed(&settings.seed);

        let degraded = Rc::new(settings.degrade(&capabilities));
        let surface = Surface::new(width, height);

        let quad = Quad::new(context, capabilities.tier == Tier::Modern)?;
        let resampler = Resampler::new(context, &dialect, quad)?;
        let fluid = Fluid::new(context, &dialect, &formats, surface, &degraded)?;
        let compositor = Compositor::new(context, &dialect, &formats, surface, &degraded)?;

        let mut effect = FluidEffect {
            capabilities,
            requested_settings: Rc::clone(settings),
            settings: degraded,
            surface,
            resampler,
            fluid,
            compositor,
            pointers: Pointers::new(),
            last_timestamp: 0.0,
        };

        if effect.settings.initial_splash {
            effect.push_random_burst();
        }

        Ok(effect)
    }

    pub fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    /// The settings as last supplied by the host, before any capability
    /// downgrades.
    pub fn settings(&self) -> &Rc<Settings> {
        &self.requested_settings
    }

    pub fn update_settings(&mut self, settings: &Rc<Settings>) {
        self.requested_settings = Rc::clone(settings);
        self.settings = Rc::new(settings.degrade(&self.capabilities));

        self.fluid.update(&self.settings);
        if let Err(msg) = self.fluid.resize(&self.resampler, self.surface) {
            log::error!("Failed to resize the simulation: {}", msg);
        }
        if let Err(msg) = self.compositor.update(&self.settings) {
            log::error!("Failed to update the compositor: {}", msg);
        }
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        let surface = Surface::new(width, height);
        if surface == self.surface {
            return;
        }
        self.surface = surface;

        if let Err(msg) = self.fluid.resize(&self.resampler, surface) {
            log::error!("Failed to resize the simulation: {}", msg);
        }
        if let Err(msg) = self.compositor.resize(surface) {
            log::error!("Failed to resize the compositor: {}", msg);
        }
    }

    /// Advance to `timestamp` and draw a frame.
    pub fn update(&mut self, timestamp: f64) {
        let dt = frame_time(self.last_timestamp, timestamp);
        self.last_timestamp = timestamp;
        self.step(dt);
    }

    /// Advance by `dt` seconds and draw a frame.
    pub fn step(&mut self, dt: f32) {
        self.pointers.update_colors(dt, &self.settings);

        let quad = self.resampler.quad();
        let splats = self
            .pointers
            .take_random_splats()
            .into_iter()
            .chain(self.pointers.take_splats(self.settings.splat_force));
        for splat in splats {
            self.fluid.splat(quad, self.surface, &splat);
        }

        if !self.settings.paused {
            self.fluid.step(quad, dt);
        }

        self.render(None);
    }

    /// Draw the current dye field to the screen, or into `target`.
    pub fn render(&self, target: Option<&Framebuffer>) {
        self.compositor
            .render(self.resampler.quad(), self.fluid.dye(), target);
    }

    pub fn set_dithering_texture(&mut self, encoded_bytes: &[u8]) {
        if let Err(msg) = self.try_set_dithering_texture(encoded_bytes) {
            log::error!("{}", msg);
        }
    }

    fn try_set_dithering_texture(&mut self, encoded_bytes: &[u8]) -> Result<(), Problem> {
        let image = image::load_from_memory(encoded_bytes)?.to_rgba8();
        self.compositor.set_dithering_texture(&image)?;
        Ok(())
    }

    pub fn add_pointer(&mut self, id: i64) -> &mut Pointer {
        self.pointers.add_pointer(id)
    }

    pub fn find_pointer(&self, id: i64) -> Option<&Pointer> {
        self.pointers.find_pointer(id)
    }

    pub fn update_pointer_down_data(&mut self, id: i64, x: f32, y: f32, color: Option<Rgb>) {
        self.pointers
            .update_pointer_down_data(id, x, y, color, self.surface, &self.settings);
    }

    pub fn update_pointer_move_data(&mut self, id: i64, x: f32, y: f32, color: Option<Rgb>) {
        self.pointers
            .update_pointer_move_data(id, x, y, color, self.surface);
    }

    pub fn update_pointer_up_data(&mut self, id: i64) {
        self.pointers.update_pointer_up_data(id);
    }

    pub fn do_effect(&mut self, id: i64, x: f32, y: f32, color: Option<Rgb>) {
        self.pointers
            .do_effect(id, x, y, color, self.surface, &self.settings);
    }

    pub fn push_random_splats(&mut self, count: u32) {
        self.pointers.push_random_splats(count);
    }

    /// Queue a burst of 5 to 24 random splats.
    pub fn push_random_burst(&mut self) {
        self.push_random_splats(rng::gen_between(5, 25));
    }
}

/// The time step in seconds between two timestamps in milliseconds.
fn frame_time(last_timestamp: f64, timestamp: f64) -> f32 {
    let elapsed = 0.001 * (timestamp - last_timestamp) as f32;
    elapsed.clamp(0.0, MAX_FRAME_TIME)
}

#[derive(Error, Debug)]
pub enum Problem {
    #[error(transparent)]
    Render(#[from] render::Problem),

    #[error("No renderable half-float texture format is available")]
    UnsupportedTextureFormat,

    #[error("Failed to decode image: {0}")]
    DecodeImage(#[from] image::ImageError),
}

#[cfg(test)]
mod test {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_frame_time_is_capped() {
        assert_relative_eq!(frame_time(1000.0, 1010.0), 0.01);
        assert_relative_eq!(frame_time(1000.0, 1500.0), MAX_FRAME_TIME);
        assert_relative_eq!(frame_time(0.0, 16_000.0), MAX_FRAME_TIME);
    }

    #[test]
    fn test_frame_time_never_runs_backwards() {
        assert_eq!(frame_time(2000.0, 1000.0), 0.0);
        assert_eq!(frame_time(2000.0, 2000.0), 0.0);
    }

    #[test]
    fn test_problem_messages() {
        assert_eq!(
            Problem::UnsupportedTextureFormat.to_string(),
            "No renderable half-float texture format is available"
        );
        assert_eq!(
            Problem::from(render::Problem::CannotCreateTexture).to_string(),
            render::Problem::CannotCreateTexture.to_string()
        );
    }

    #[test]
    fn test_decoding_garbage_is_an_error() {
        let result = image::load_from_memory(b"not an image").map_err(Problem::from);
        assert!(matches!(result, Err(Problem::DecodeImage(_))));
    }
}
