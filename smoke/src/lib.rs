pub mod color;
mod compositor;
pub mod context;
mod data;
mod effect;
mod fluid;
mod material;
pub mod pointer;
pub mod render;
mod rng;
pub mod settings;
mod shaders;
mod surface;
mod targets;

pub use color::Rgb;
pub use context::Tier;
pub use effect::{FluidEffect, Problem};
pub use settings::Settings;
