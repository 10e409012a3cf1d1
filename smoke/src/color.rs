use crate::rng;

use serde::{Deserialize, Serialize};
use std::ops::Mul;

/// An RGB triple. Configured colors use the 0–255 range; colors fed to the
/// shaders are normalized to 0–1.
#[derive(Clone, Copy, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct Rgb {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Rgb {
    pub const fn new(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }

    /// Map 0–255 to 0–1.
    pub fn normalize(self) -> Self {
        self * (1.0 / 255.0)
    }

    pub fn to_array(self) -> [f32; 3] {
        [self.r, self.g, self.b]
    }
}

impl Mul<f32> for Rgb {
    type Output = Rgb;

    fn mul(self, factor: f32) -> Rgb {
        Rgb::new(self.r * factor, self.g * factor, self.b * factor)
    }
}

pub fn hsv_to_rgb(h: f32, s: f32, v: f32) -> Rgb {
    let i = (h * 6.0).floor();
    let f = h * 6.0 - i;
    let p = v * (1.0 - s);
    let q = v * (1.0 - f * s);
    let t = v * (1.0 - (1.0 - f) * s);

    match (i as i32).rem_euclid(6) {
        0 => Rgb::new(v, t, p),
        1 => Rgb::new(q, v, p),
        2 => Rgb::new(p, v, t),
        3 => Rgb::new(p, q, v),
        4 => Rgb::new(t, p, v),
        _ => Rgb::new(v, p, q),
    }
}

/// A dim, fully saturated color with a random hue.
pub fn generate_color() -> Rgb {
    hsv_to_rgb(rng::gen::<f32>(), 1.0, 1.0) * 0.15
}
