use crate::color::Rgb;
use crate::context::Capabilities;

use serde::{Deserialize, Serialize};

/// The dye resolution used on low-quality devices and when float textures
/// can't be filtered.
pub const LOW_DYE_RESOLUTION: u32 = 512;

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub seed: Option<String>,

    // Simulation
    pub sim_resolution: u32,
    pub dye_resolution: u32,
    pub density_dissipation: f32,
    pub velocity_dissipation: f32,
    pub pressure: f32,
    pub pressure_iterations: u32,
    pub curl: f32,
    pub splat_radius: f32,
    pub splat_force: f32,
    pub paused: bool,
    pub initial_splash: bool,

    // Color
    pub shading: bool,
    pub colorful: bool,
    pub color: Rgb,
    pub color_update_speed: f32,
    pub back_color: Rgb,
    pub transparent: bool,

    // Post-processing
    pub bloom: bool,
    pub bloom_iterations: u32,
    pub bloom_resolution: u32,
    pub bloom_intensity: f32,
    pub bloom_threshold: f32,
    pub bloom_soft_knee: f32,
    pub sunrays: bool,
    pub sunrays_resolution: u32,
    pub sunrays_weight: f32,

    // Set by hosts running on phones and tablets.
    pub low_quality: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            seed: None,

            sim_resolution: 64,
            dye_resolution: 128,
            density_dissipation: 1.0,
            velocity_dissipation: 0.2,
            pressure: 0.8,
            pressure_iterations: 20,
            curl: 30.0,
            splat_radius: 0.1,
            splat_force: 6000.0,
            paused: false,
            initial_splash: false,

            shading: true,
            colorful: false,
            color: Rgb::new(32.0, 32.0, 32.0),
            color_update_speed: 10.0,
            back_color: Rgb::new(0.0, 0.0, 0.0),
            transparent: false,

            bloom: false,
            bloom_iterations: 8,
            bloom_resolution: 256,
            bloom_intensity: 0.8,
            bloom_threshold: 0.6,
            bloom_soft_knee: 0.7,
            sunrays: false,
            sunrays_resolution: 196,
            sunrays_weight: 1.0,

            low_quality: false,
        }
    }
}

impl Settings {
    /// The settings to run with on this context.
    ///
    /// `low_quality` lowers the dye resolution. Without linear filtering the
    /// dye resolution is lowered too, and shading, bloom and sunrays are off.
    pub fn degrade(&self, capabilities: &Capabilities) -> Settings {
        let mut settings = self.clone();

        if settings.low_quality {
            settings.dye_resolution = LOW_DYE_RESOLUTION;
        }

        if !capabilities.supports_linear_filtering {
            log::info!("Linear filtering is not supported. Reducing quality.");

            settings.dye_resolution = LOW_DYE_RESOLUTION;
            settings.shading = false;
            settings.bloom = false;
            settings.sunrays = false;
        }

        settings
    }
}
