use crate::context::{Dialect, Formats};
use crate::material::{Keyword, Keywords, Material};
use crate::render::{
    Context, Framebuffer, Problem, Program, Quad, Texture, TextureOptions, Uniform, UniformValue,
};
use crate::settings::Settings;
use crate::shaders;
use crate::surface::Surface;
use crate::targets::{bloom_mip_sizes, BloomTargets, DoubleFramebuffer, Extent, SunraysTargets};

use glow::HasContext;
use std::rc::Rc;

/// Draws the dye field to the screen or into a framebuffer, with the optional
/// shading, bloom and sunrays effects.
pub struct Compositor {
    context: Context,
    settings: Rc<Settings>,
    formats: Formats,
    surface: Surface,

    bloom_targets: BloomTargets,
    sunrays_targets: SunraysTargets,
    dithering_texture: Texture,

    display_material: Material,
    color_pass: Program,
    checkerboard_pass: Program,
    blur_pass: Program,
    bloom_prefilter_pass: Program,
    bloom_blur_pass: Program,
    bloom_final_pass: Program,
    sunrays_mask_pass: Program,
    sunrays_pass: Program,
}

impl Compositor {
    pub fn new(
        context: &Context,
        dialect: &Dialect,
        formats: &Formats,
        surface: Surface,
        settings: &Rc<Settings>,
    ) -> Result<Self, Problem> {
        let program = |fragment_shader: &'static str| {
            Program::new(context, dialect, (shaders::BASE_VERT, fragment_shader))
        };

        // A flat placeholder until a noise texture is supplied.
        let dithering_texture = Texture::new(
            context,
            1,
            1,
            dithering_options(),
            Some(&[255, 255, 255, 255][..]),
        )?;

        Ok(Self {
            context: Rc::clone(context),
            settings: Rc::clone(settings),
            formats: *formats,
            surface,

            bloom_targets: BloomTargets::new(context, formats, surface, settings)?,
            sunrays_targets: SunraysTargets::new(context, formats, surface, settings)?,
            dithering_texture,

            display_material: Material::with_keywords(
                context,
                *dialect,
                (shaders::BASE_VERT, shaders::DISPLAY_FRAG),
                display_keywords(settings),
            )?,
            color_pass: program(shaders::COLOR_FRAG)?,
            checkerboard_pass: program(shaders::CHECKERBOARD_FRAG)?,
            blur_pass: Program::new(context, dialect, (shaders::BLUR_VERT, shaders::BLUR_FRAG))?,
            bloom_prefilter_pass: program(shaders::BLOOM_PREFILTER_FRAG)?,
            bloom_blur_pass: program(shaders::BLOOM_BLUR_FRAG)?,
            bloom_final_pass: program(shaders::BLOOM_FINAL_FRAG)?,
            sunrays_mask_pass: program(shaders::SUNRAYS_MASK_FRAG)?,
            sunrays_pass: program(shaders::SUNRAYS_FRAG)?,
        })
    }

    pub fn update(&mut self, settings: &Rc<Settings>) -> Result<(), Problem> {
        self.settings = Rc::clone(settings);
        self.display_material
            .set_keywords(display_keywords(settings))?;
        self.reconcile()
    }

    pub fn resize(&mut self, surface: Surface) -> Result<(), Problem> {
        self.surface = surface;
        self.reconcile()
    }

    /// Reallocate the effect targets whose size no longer matches the
    /// surface and settings.
    fn reconcile(&mut self) -> Result<(), Problem> {
        let settings = &self.settings;

        let (width, height) = self.surface.resolution(settings.bloom_resolution);
        let mips = bloom_mip_sizes(width, height, settings.bloom_iterations);
        if self.bloom_targets.bloom.extent() != (width, height)
            || self.bloom_targets.mips.len() != mips.len()
        {
            self.bloom_targets =
                BloomTargets::new(&self.context, &self.formats, self.surface, settings)?;
        }

        let (width, height) = self.surface.resolution(settings.sunrays_resolution);
        if self.sunrays_targets.sunrays.extent() != (width, height) {
            self.sunrays_targets =
                SunraysTargets::new(&self.context, &self.formats, self.surface, settings)?;
        }

        Ok(())
    }

    pub fn set_dithering_texture(&mut self, image: &image::RgbaImage) -> Result<(), Problem> {
        let (width, height) = image.dimensions();
        self.dithering_texture = Texture::new(
            &self.context,
            width,
            height,
            dithering_options(),
            Some(image.as_raw().as_slice()),
        )?;
        log::debug!("Uploaded a {}x{} dithering texture", width, height);
        Ok(())
    }

    /// Composite `dye` into `target`, or onto the screen when `target` is
    /// `None`.
    ///
    /// The write half of `dye` is used as scratch space for the sunrays mask.
    pub fn render(&self, quad: &Quad, dye: &DoubleFramebuffer, target: Option<&Framebuffer>) {
        let settings = &self.settings;

        if settings.bloom {
            self.apply_bloom(quad, dye.read());
        }

        if settings.sunrays {
            self.apply_sunrays(quad, dye.read(), dye.write());
            let SunraysTargets { sunrays, temp } = &self.sunrays_targets;
            self.blur(quad, sunrays, temp, 1);
        }

        let (width, height) = match target {
            Some(framebuffer) => framebuffer.extent(),
            None => (self.surface.width, self.surface.height),
        };

        unsafe {
            if blends_output(target.is_none(), settings.transparent) {
                self.context.blend_func(glow::ONE, glow::ONE_MINUS_SRC_ALPHA);
                self.context.enable(glow::BLEND);
            } else {
                self.context.disable(glow::BLEND);
            }
        }

        if !settings.transparent {
            let color = settings.back_color.normalize().to_array();
            self.color_pass.bind();
            self.color_pass.set_uniform(&Uniform {
                name: "color",
                value: UniformValue::Vec4([color[0], color[1], color[2], 1.0]),
            });
            quad.blit_to(target, width, height);
        }

        if target.is_none() && settings.transparent {
            self.checkerboard_pass.bind();
            self.checkerboard_pass.set_uniform(&Uniform {
                name: "aspectRatio",
                value: UniformValue::Float(width as f32 / height as f32),
            });
            quad.blit_to(target, width, height);
        }

        self.draw_display(quad, dye.read(), target, width, height);
    }

    fn draw_display(
        &self,
        quad: &Quad,
        dye: &Framebuffer,
        target: Option<&Framebuffer>,
        width: u32,
        height: u32,
    ) {
        let dithering = &self.dithering_texture;

        self.display_material.bind();
        self.display_material.set_uniforms(&[
            &Uniform {
                name: "texelSize",
                value: UniformValue::Vec2([1.0 / width as f32, 1.0 / height as f32]),
            },
            &Uniform {
                name: "uTexture",
                value: UniformValue::Texture2D(dye.attach(0)),
            },
        ]);

        if self.settings.bloom {
            self.display_material.set_uniforms(&[
                &Uniform {
                    name: "uBloom",
                    value: UniformValue::Texture2D(self.bloom_targets.bloom.attach(1)),
                },
                &Uniform {
                    name: "uDithering",
                    value: UniformValue::Texture2D(dithering.attach(2)),
                },
                &Uniform {
                    name: "ditherScale",
                    value: UniformValue::Vec2(dither_scale(
                        (width, height),
                        (dithering.width, dithering.height),
                    )),
                },
            ]);
        }

        if self.settings.sunrays {
            self.display_material.set_uniforms(&[&Uniform {
                name: "uSunrays",
                value: UniformValue::Texture2D(self.sunrays_targets.sunrays.attach(3)),
            }]);
        }

        quad.blit_to(target, width, height);
    }

    fn apply_bloom(&self, quad: &Quad, source: &Framebuffer) {
        let BloomTargets { bloom, mips } = &self.bloom_targets;
        if mips.len() < 2 {
            return;
        }

        unsafe {
            self.context.disable(glow::BLEND);
        }

        let settings = &self.settings;
        self.bloom_prefilter_pass.bind();
        self.bloom_prefilter_pass.set_uniforms(&[
            &Uniform {
                name: "curve",
                value: UniformValue::Vec3(bloom_curve(
                    settings.bloom_threshold,
                    settings.bloom_soft_knee,
                )),
            },
            &Uniform {
                name: "threshold",
                value: UniformValue::Float(settings.bloom_threshold),
            },
            &Uniform {
                name: "uTexture",
                value: UniformValue::Texture2D(source.attach(0)),
            },
        ]);
        quad.blit(bloom);

        // Downsample through the mip chain, then add each level back into the
        // one above it.
        self.bloom_blur_pass.bind();
        let mut last = bloom;
        for mip in mips {
            self.blur_step(&self.bloom_blur_pass, quad, last, mip);
            last = mip;
        }

        unsafe {
            self.context.blend_func(glow::ONE, glow::ONE);
            self.context.enable(glow::BLEND);
        }

        for mip in mips.iter().rev().skip(1) {
            self.blur_step(&self.bloom_blur_pass, quad, last, mip);
            last = mip;
        }

        unsafe {
            self.context.disable(glow::BLEND);
        }

        self.bloom_final_pass.bind();
        self.bloom_final_pass.set_uniforms(&[
            &Uniform {
                name: "texelSize",
                value: UniformValue::Vec2(last.texel_size),
            },
            &Uniform {
                name: "uTexture",
                value: UniformValue::Texture2D(last.attach(0)),
            },
            &Uniform {
                name: "intensity",
                value: UniformValue::Float(settings.bloom_intensity),
            },
        ]);
        quad.blit(bloom);
    }

    fn blur_step(
        &self,
        program: &Program,
        quad: &Quad,
        source: &Framebuffer,
        target: &Framebuffer,
    ) {
        program.set_uniforms(&[
            &Uniform {
                name: "texelSize",
                value: UniformValue::Vec2(source.texel_size),
            },
            &Uniform {
                name: "uTexture",
                value: UniformValue::Texture2D(source.attach(0)),
            },
        ]);
        quad.blit(target);
    }

    fn apply_sunrays(&self, quad: &Quad, source: &Framebuffer, mask: &Framebuffer) {
        unsafe {
            self.context.disable(glow::BLEND);
        }

        self.sunrays_mask_pass.bind();
        self.sunrays_mask_pass.set_uniform(&Uniform {
            name: "uTexture",
            value: UniformValue::Texture2D(source.attach(0)),
        });
        quad.blit(mask);

        self.sunrays_pass.bind();
        self.sunrays_pass.set_uniforms(&[
            &Uniform {
                name: "weight",
                value: UniformValue::Float(self.settings.sunrays_weight),
            },
            &Uniform {
                name: "uTexture",
                value: UniformValue::Texture2D(mask.attach(0)),
            },
        ]);
        quad.blit(&self.sunrays_targets.sunrays);
    }

    /// Separable blur of `target`, using `temp` for the horizontal half.
    fn blur(&self, quad: &Quad, target: &Framebuffer, temp: &Framebuffer, iterations: u32) {
        self.blur_pass.bind();
        for _ in 0..iterations {
            self.blur_pass.set_uniforms(&[
                &Uniform {
                    name: "texelSize",
                    value: UniformValue::Vec2([target.texel_size[0], 0.0]),
                },
                &Uniform {
                    name: "uTexture",
                    value: UniformValue::Texture2D(target.attach(0)),
                },
            ]);
            quad.blit(temp);

            self.blur_pass.set_uniforms(&[
                &Uniform {
                    name: "texelSize",
                    value: UniformValue::Vec2([0.0, target.texel_size[1]]),
                },
                &Uniform {
                    name: "uTexture",
                    value: UniformValue::Texture2D(temp.attach(0)),
                },
            ]);
            quad.blit(target);
        }
    }
}

pub fn display_keywords(settings: &Settings) -> Keywords {
    let mut keywords = Keywords::empty();
    if settings.shading {
        keywords.insert(Keyword::Shading);
    }
    if settings.bloom {
        keywords.insert(Keyword::Bloom);
    }
    if settings.sunrays {
        keywords.insert(Keyword::Sunrays);
    }
    keywords
}

/// The soft threshold curve of the bloom prefilter.
pub fn bloom_curve(threshold: f32, soft_knee: f32) -> [f32; 3] {
    let knee = threshold * soft_knee + 0.0001;
    [threshold - knee, knee * 2.0, 0.25 / knee]
}

/// How many times the dithering texture repeats across the output.
pub fn dither_scale(output: (u32, u32), texture: (u32, u32)) -> [f32; 2] {
    [
        output.0 as f32 / texture.0.max(1) as f32,
        output.1 as f32 / texture.1.max(1) as f32,
    ]
}

/// Output is alpha-blended over the background, except when compositing
/// transparent output into an intermediate target, which receives the raw
/// premultiplied color instead.
pub fn blends_output(on_screen: bool, transparent: bool) -> bool {
    on_screen || !transparent
}

fn dithering_options() -> TextureOptions {
    TextureOptions {
        wrap_s: glow::REPEAT,
        wrap_t: glow::REPEAT,
        ..Default::default()
    }
    .with_filter(glow::LINEAR)
}
