// A CPU rendition of the solver passes, texel for texel. Same-size lookups
// clamp to the edge like CLAMP_TO_EDGE textures; advection and resampling
// filter bilinearly.

use super::correct_radius;
use crate::pointer::Splat;
use crate::settings::Settings;

#[derive(Clone, Debug)]
pub struct Field {
    pub width: usize,
    pub height: usize,
    pub channels: usize,
    pub data: Vec<f32>,
}

impl Field {
    pub fn new(width: usize, height: usize, channels: usize) -> Self {
        Self {
            width,
            height,
            channels,
            data: vec![0.0; width * height * channels],
        }
    }

    pub fn from_fn<F>(width: usize, height: usize, channels: usize, f: F) -> Self
    where
        F: Fn([f32; 2]) -> [f32; 4],
    {
        let mut field = Self::new(width, height, channels);
        for j in 0..height {
            for i in 0..width {
                let value = f(field.texcoord(i, j));
                field.set(i, j, &value[..channels]);
            }
        }
        field
    }

    pub fn texel_size(&self) -> [f32; 2] {
        [1.0 / self.width as f32, 1.0 / self.height as f32]
    }

    pub fn texcoord(&self, i: usize, j: usize) -> [f32; 2] {
        [
            (i as f32 + 0.5) / self.width as f32,
            (j as f32 + 0.5) / self.height as f32,
        ]
    }

    pub fn get(&self, i: usize, j: usize, channel: usize) -> f32 {
        self.data[(j * self.width + i) * self.channels + channel]
    }

    pub fn set(&mut self, i: usize, j: usize, value: &[f32]) {
        let start = (j * self.width + i) * self.channels;
        self.data[start..start + self.channels].copy_from_slice(value);
    }

    /// The texel at `(i, j)`, clamped to the edge.
    pub fn texel(&self, i: isize, j: isize) -> [f32; 4] {
        let i = i.clamp(0, self.width as isize - 1) as usize;
        let j = j.clamp(0, self.height as isize - 1) as usize;
        let mut out = [0.0; 4];
        for (channel, value) in out.iter_mut().enumerate().take(self.channels) {
            *value = self.get(i, j, channel);
        }
        out
    }

    pub fn sample(&self, uv: [f32; 2]) -> [f32; 4] {
        let x = uv[0] * self.width as f32 - 0.5;
        let y = uv[1] * self.height as f32 - 0.5;
        let (x0, y0) = (x.floor(), y.floor());
        let (fx, fy) = (x - x0, y - y0);
        let (i, j) = (x0 as isize, y0 as isize);

        let a = self.texel(i, j);
        let b = self.texel(i + 1, j);
        let c = self.texel(i, j + 1);
        let d = self.texel(i + 1, j + 1);

        let mut out = [0.0; 4];
        for k in 0..self.channels {
            out[k] = mix(mix(a[k], b[k], fx), mix(c[k], d[k], fx), fy);
        }
        out
    }

    pub fn resample(&self, width: usize, height: usize) -> Field {
        Field::from_fn(width, height, self.channels, |uv| self.sample(uv))
    }

    pub fn sum(&self) -> f64 {
        self.data.iter().map(|&value| value as f64).sum()
    }

    pub fn max_abs(&self) -> f32 {
        self.data.iter().fold(0.0, |max, value| value.abs().max(max))
    }

    /// Evaluate `f` for every texel with access to its clamped neighbours.
    fn stencil<F>(&self, channels: usize, f: F) -> Field
    where
        F: Fn(Neighbours) -> [f32; 4],
    {
        let mut field = Field::new(self.width, self.height, channels);
        for j in 0..self.height {
            for i in 0..self.width {
                let value = f(Neighbours {
                    i: i as isize,
                    j: j as isize,
                    width: self.width,
                    height: self.height,
                });
                field.set(i, j, &value[..channels]);
            }
        }
        field
    }
}

#[derive(Clone, Copy)]
struct Neighbours {
    i: isize,
    j: isize,
    width: usize,
    height: usize,
}

impl Neighbours {
    fn at_left_wall(&self) -> bool {
        self.i == 0
    }

    fn at_right_wall(&self) -> bool {
        self.i == self.width as isize - 1
    }

    fn at_bottom_wall(&self) -> bool {
        self.j == 0
    }

    fn at_top_wall(&self) -> bool {
        self.j == self.height as isize - 1
    }

    fn center(&self, field: &Field) -> [f32; 4] {
        field.texel(self.i, self.j)
    }

    fn left(&self, field: &Field) -> [f32; 4] {
        field.texel(self.i - 1, self.j)
    }

    fn right(&self, field: &Field) -> [f32; 4] {
        field.texel(self.i + 1, self.j)
    }

    fn top(&self, field: &Field) -> [f32; 4] {
        field.texel(self.i, self.j + 1)
    }

    fn bottom(&self, field: &Field) -> [f32; 4] {
        field.texel(self.i, self.j - 1)
    }
}

fn mix(a: f32, b: f32, t: f32) -> f32 {
    a * (1.0 - t) + b * t
}

pub fn splat(
    target: &Field,
    point: [f32; 2],
    color: [f32; 3],
    radius: f32,
    aspect_ratio: f32,
) -> Field {
    Field::from_fn(target.width, target.height, target.channels, |uv| {
        let x = (uv[0] - point[0]) * aspect_ratio;
        let y = uv[1] - point[1];
        let strength = (-(x * x + y * y) / radius).exp();

        let mut out = [0.0; 4];
        let base = target.sample(uv);
        for k in 0..target.channels.min(3) {
            out[k] = base[k] + strength * color[k];
        }
        out
    })
}

pub fn curl(velocity: &Field) -> Field {
    velocity.stencil(1, |n| {
        let l = n.left(velocity)[1];
        let r = n.right(velocity)[1];
        let t = n.top(velocity)[0];
        let b = n.bottom(velocity)[0];
        [0.5 * (r - l - t + b), 0.0, 0.0, 0.0]
    })
}

pub fn vorticity(velocity: &Field, curl: &Field, strength: f32, dt: f32) -> Field {
    velocity.stencil(2, |n| {
        let l = n.left(curl)[0];
        let r = n.right(curl)[0];
        let t = n.top(curl)[0];
        let b = n.bottom(curl)[0];
        let c = n.center(curl)[0];

        let mut force = [0.5 * (t.abs() - b.abs()), 0.5 * (r.abs() - l.abs())];
        let length = (force[0] * force[0] + force[1] * force[1]).sqrt() + 0.0001;
        force[0] *= strength * c / length;
        force[1] *= -strength * c / length;

        let v = n.center(velocity);
        [
            (v[0] + force[0] * dt).clamp(-1000.0, 1000.0),
            (v[1] + force[1] * dt).clamp(-1000.0, 1000.0),
            0.0,
            0.0,
        ]
    })
}

pub fn divergence(velocity: &Field) -> Field {
    velocity.stencil(1, |n| {
        let c = n.center(velocity);
        let l = if n.at_left_wall() { -c[0] } else { n.left(velocity)[0] };
        let r = if n.at_right_wall() { -c[0] } else { n.right(velocity)[0] };
        let t = if n.at_top_wall() { -c[1] } else { n.top(velocity)[1] };
        let b = if n.at_bottom_wall() { -c[1] } else { n.bottom(velocity)[1] };
        [0.5 * (r - l + t - b), 0.0, 0.0, 0.0]
    })
}

pub fn scale(field: &Field, value: f32) -> Field {
    field.stencil(field.channels, |n| {
        let mut out = n.center(field);
        out.iter_mut().for_each(|component| *component *= value);
        out
    })
}

pub fn jacobi(pressure: &Field, divergence: &Field) -> Field {
    pressure.stencil(1, |n| {
        let sum = n.left(pressure)[0]
            + n.right(pressure)[0]
            + n.top(pressure)[0]
            + n.bottom(pressure)[0];
        [(sum - n.center(divergence)[0]) * 0.25, 0.0, 0.0, 0.0]
    })
}

pub fn gradient_subtract(pressure: &Field, velocity: &Field) -> Field {
    velocity.stencil(2, |n| {
        let v = n.center(velocity);
        let dx = n.right(pressure)[0] - n.left(pressure)[0];
        let dy = n.top(pressure)[0] - n.bottom(pressure)[0];
        [v[0] - dx, v[1] - dy, 0.0, 0.0]
    })
}

/// Carry `source` along `velocity`. Offsets are measured in velocity texels.
pub fn advect(velocity: &Field, source: &Field, dt: f32, dissipation: f32) -> Field {
    let texel_size = velocity.texel_size();
    let decay = 1.0 + dissipation * dt;

    Field::from_fn(source.width, source.height, source.channels, |uv| {
        let v = velocity.sample(uv);
        let coord = [uv[0] - dt * v[0] * texel_size[0], uv[1] - dt * v[1] * texel_size[1]];

        let mut out = source.sample(coord);
        out.iter_mut().for_each(|component| *component /= decay);
        out
    })
}

pub struct Simulation {
    pub settings: Settings,
    pub velocity: Field,
    pub dye: Field,
    pub pressure: Field,
}

impl Simulation {
    pub fn new(sim: (usize, usize), dye: (usize, usize), settings: &Settings) -> Self {
        Self {
            settings: settings.clone(),
            velocity: Field::new(sim.0, sim.1, 2),
            dye: Field::new(dye.0, dye.1, 3),
            pressure: Field::new(sim.0, sim.1, 1),
        }
    }

    fn aspect_ratio(&self) -> f32 {
        self.velocity.width as f32 / self.velocity.height as f32
    }

    pub fn splat(&mut self, splat: &Splat) {
        let aspect_ratio = self.aspect_ratio();
        let radius = correct_radius(self.settings.splat_radius / 100.0, aspect_ratio);
        let point = [splat.x, splat.y];

        let force = [splat.dx, splat.dy, 0.0];
        self.velocity = self::splat(&self.velocity, point, force, radius, aspect_ratio);
        self.dye = self::splat(&self.dye, point, splat.color.to_array(), radius, aspect_ratio);
    }

    pub fn step(&mut self, dt: f32) {
        let settings = &self.settings;

        let curl = curl(&self.velocity);
        self.velocity = vorticity(&self.velocity, &curl, settings.curl, dt);

        let divergence = divergence(&self.velocity);
        self.pressure = scale(&self.pressure, settings.pressure);
        for _ in 0..settings.pressure_iterations {
            self.pressure = jacobi(&self.pressure, &divergence);
        }
        self.velocity = gradient_subtract(&self.pressure, &self.velocity);

        self.velocity = advect(&self.velocity, &self.velocity, dt, settings.velocity_dissipation);
        self.dye = advect(&self.velocity, &self.dye, dt, settings.density_dissipation);
    }
}
