use crate::context::{Dialect, Formats};
use crate::material::{Keyword, Keywords, Material};
use crate::pointer::Splat;
use crate::render::{Context, Problem, Program, Quad, Uniform, UniformValue};
use crate::settings::Settings;
use crate::shaders;
use crate::surface::Surface;
use crate::targets::{DoubleFramebuffer, FieldSet, Resampler};

use glow::HasContext;
use std::rc::Rc;

#[cfg(test)]
mod reference;

pub struct Fluid {
    context: Context,
    settings: Rc<Settings>,
    manual_filtering: bool,

    pub fields: FieldSet,

    splat_pass: Program,
    curl_pass: Program,
    vorticity_pass: Program,
    divergence_pass: Program,
    clear_pass: Program,
    pressure_pass: Program,
    gradient_subtract_pass: Program,
    advection_pass: Material,
}

impl Fluid {
    pub fn new(
        context: &Context,
        dialect: &Dialect,
        formats: &Formats,
        surface: Surface,
        settings: &Rc<Settings>,
    ) -> Result<Self, Problem> {
        let fields = FieldSet::new(context, formats, surface, settings)?;

        let program = |fragment_shader: &'static str| {
            Program::new(context, dialect, (shaders::BASE_VERT, fragment_shader))
        };

        // Float textures that can't be filtered are sampled at texel centers
        // and interpolated in the shader instead.
        let manual_filtering = formats.filter == glow::NEAREST;
        let mut advection_keywords = Keywords::empty();
        if manual_filtering {
            advection_keywords.insert(Keyword::ManualFiltering);
        }

        Ok(Self {
            context: Rc::clone(context),
            settings: Rc::clone(settings),
            manual_filtering,
            fields,

            splat_pass: program(shaders::SPLAT_FRAG)?,
            curl_pass: program(shaders::CURL_FRAG)?,
            vorticity_pass: program(shaders::VORTICITY_FRAG)?,
            divergence_pass: program(shaders::DIVERGENCE_FRAG)?,
            clear_pass: program(shaders::CLEAR_FRAG)?,
            pressure_pass: program(shaders::PRESSURE_FRAG)?,
            gradient_subtract_pass: program(shaders::GRADIENT_SUBTRACT_FRAG)?,
            advection_pass: Material::with_keywords(
                context,
                *dialect,
                (shaders::BASE_VERT, shaders::ADVECTION_FRAG),
                advection_keywords,
            )?,
        })
    }

    pub fn update(&mut self, settings: &Rc<Settings>) {
        self.settings = Rc::clone(settings);
    }

    pub fn resize(&mut self, resampler: &Resampler, surface: Surface) -> Result<(), Problem> {
        self.fields
            .reconcile(&self.context, resampler, surface, &self.settings)
    }

    pub fn dye(&self) -> &DoubleFramebuffer {
        &self.fields.dye
    }

    /// Add a splat of force to the velocity field and of color to the dye.
    pub fn splat(&mut self, quad: &Quad, surface: Surface, splat: &Splat) {
        let aspect_ratio = surface.aspect_ratio();
        let radius = correct_radius(self.settings.splat_radius / 100.0, aspect_ratio);
        let FieldSet { velocity, dye, .. } = &mut self.fields;

        unsafe {
            self.context.disable(glow::BLEND);
        }

        self.splat_pass.bind();
        self.splat_pass.set_uniforms(&[
            &Uniform {
                name: "texelSize",
                value: UniformValue::Vec2(velocity.texel_size()),
            },
            &Uniform {
                name: "uTarget",
                value: UniformValue::Texture2D(velocity.read().attach(0)),
            },
            &Uniform {
                name: "aspectRatio",
                value: UniformValue::Float(aspect_ratio),
            },
            &Uniform {
                name: "point",
                value: UniformValue::Vec2([splat.x, splat.y]),
            },
            &Uniform {
                name: "color",
                value: UniformValue::Vec3([splat.dx, splat.dy, 0.0]),
            },
            &Uniform {
                name: "radius",
                value: UniformValue::Float(radius),
            },
        ]);
        quad.blit(velocity.write());
        velocity.swap();

        self.splat_pass.set_uniforms(&[
            &Uniform {
                name: "uTarget",
                value: UniformValue::Texture2D(dye.read().attach(0)),
            },
            &Uniform {
                name: "color",
                value: UniformValue::Vec3(splat.color.to_array()),
            },
        ]);
        quad.blit(dye.write());
        dye.swap();
    }

    /// Advance the simulation by `dt` seconds.
    pub fn step(&mut self, quad: &Quad, dt: f32) {
        let settings = &self.settings;
        let FieldSet {
            velocity,
            dye,
            pressure,
            divergence,
            curl,
        } = &mut self.fields;
        let texel_size = UniformValue::Vec2(velocity.texel_size());

        unsafe {
            self.context.disable(glow::BLEND);
        }

        self.curl_pass.bind();
        self.curl_pass.set_uniforms(&[
            &Uniform {
                name: "texelSize",
                value: texel_size,
            },
            &Uniform {
                name: "uVelocity",
                value: UniformValue::Texture2D(velocity.read().attach(0)),
            },
        ]);
        quad.blit(curl);

        self.vorticity_pass.bind();
        self.vorticity_pass.set_uniforms(&[
            &Uniform {
                name: "texelSize",
                value: texel_size,
            },
            &Uniform {
                name: "uVelocity",
                value: UniformValue::Texture2D(velocity.read().attach(0)),
            },
            &Uniform {
                name: "uCurl",
                value: UniformValue::Texture2D(curl.attach(1)),
            },
            &Uniform {
                name: "curl",
                value: UniformValue::Float(settings.curl),
            },
            &Uniform {
                name: "dt",
                value: UniformValue::Float(dt),
            },
        ]);
        quad.blit(velocity.write());
        velocity.swap();

        self.divergence_pass.bind();
        self.divergence_pass.set_uniforms(&[
            &Uniform {
                name: "texelSize",
                value: texel_size,
            },
            &Uniform {
                name: "uVelocity",
                value: UniformValue::Texture2D(velocity.read().attach(0)),
            },
        ]);
        quad.blit(divergence);

        // Warm-start the solver from the last frame's pressure, decayed.
        self.clear_pass.bind();
        self.clear_pass.set_uniforms(&[
            &Uniform {
                name: "texelSize",
                value: texel_size,
            },
            &Uniform {
                name: "uTexture",
                value: UniformValue::Texture2D(pressure.read().attach(0)),
            },
            &Uniform {
                name: "value",
                value: UniformValue::Float(settings.pressure),
            },
        ]);
        quad.blit(pressure.write());
        pressure.swap();

        self.pressure_pass.bind();
        self.pressure_pass.set_uniforms(&[
            &Uniform {
                name: "texelSize",
                value: texel_size,
            },
            &Uniform {
                name: "uDivergence",
                value: UniformValue::Texture2D(divergence.attach(0)),
            },
        ]);
        for _ in 0..settings.pressure_iterations {
            self.pressure_pass.set_uniform(&Uniform {
                name: "uPressure",
                value: UniformValue::Texture2D(pressure.read().attach(1)),
            });
            quad.blit(pressure.write());
            pressure.swap();
        }

        self.gradient_subtract_pass.bind();
        self.gradient_subtract_pass.set_uniforms(&[
            &Uniform {
                name: "texelSize",
                value: texel_size,
            },
            &Uniform {
                name: "uPressure",
                value: UniformValue::Texture2D(pressure.read().attach(0)),
            },
            &Uniform {
                name: "uVelocity",
                value: UniformValue::Texture2D(velocity.read().attach(1)),
            },
        ]);
        quad.blit(velocity.write());
        velocity.swap();

        self.advection_pass.bind();
        self.advection_pass.set_uniforms(&[
            &Uniform {
                name: "texelSize",
                value: texel_size,
            },
            &Uniform {
                name: "uVelocity",
                value: UniformValue::Texture2D(velocity.read().attach(0)),
            },
            &Uniform {
                name: "uSource",
                value: UniformValue::Texture2D(0),
            },
            &Uniform {
                name: "dt",
                value: UniformValue::Float(dt),
            },
            &Uniform {
                name: "dissipation",
                value: UniformValue::Float(settings.velocity_dissipation),
            },
        ]);
        if self.manual_filtering {
            self.advection_pass.set_uniforms(&[&Uniform {
                name: "dyeTexelSize",
                value: texel_size,
            }]);
        }
        quad.blit(velocity.write());
        velocity.swap();

        self.advection_pass.set_uniforms(&[
            &Uniform {
                name: "uVelocity",
                value: UniformValue::Texture2D(velocity.read().attach(0)),
            },
            &Uniform {
                name: "uSource",
                value: UniformValue::Texture2D(dye.read().attach(1)),
            },
            &Uniform {
                name: "dissipation",
                value: UniformValue::Float(settings.density_dissipation),
            },
        ]);
        if self.manual_filtering {
            self.advection_pass.set_uniforms(&[&Uniform {
                name: "dyeTexelSize",
                value: UniformValue::Vec2(dye.texel_size()),
            }]);
        }
        quad.blit(dye.write());
        dye.swap();
    }
}

/// Splats are round on screen: on wide surfaces the falloff radius, measured
/// in texture space, grows with the aspect ratio.
pub fn correct_radius(radius: f32, aspect_ratio: f32) -> f32 {
    if aspect_ratio > 1.0 {
        radius * aspect_ratio
    } else {
        radius
    }
}
