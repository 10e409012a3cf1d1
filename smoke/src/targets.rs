use crate::context::{Dialect, Formats};
use crate::render::{Context, Framebuffer, Problem, Program, Quad, Uniform, UniformValue};
use crate::settings::Settings;
use crate::shaders;
use crate::surface::Surface;

type Result<T> = std::result::Result<T, Problem>;

pub trait Extent {
    fn extent(&self) -> (u32, u32);
}

impl Extent for Framebuffer {
    fn extent(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

/// Two render targets: one is read from while the other is written to.
///
/// `swap` toggles which of the two is `read`, so after writing to `write` and
/// swapping, the freshly written target is `read`.
pub struct PingPong<T> {
    targets: [T; 2],
    read: usize,
}

pub type DoubleFramebuffer = PingPong<Framebuffer>;

impl<T> PingPong<T> {
    pub fn new(read: T, write: T) -> Self {
        Self {
            targets: [read, write],
            read: 0,
        }
    }

    pub fn read(&self) -> &T {
        &self.targets[self.read]
    }

    pub fn write(&self) -> &T {
        &self.targets[1 - self.read]
    }

    pub fn swap(&mut self) {
        self.read = 1 - self.read;
    }
}

impl<T: Extent> PingPong<T> {
    pub fn extent(&self) -> (u32, u32) {
        self.read().extent()
    }

    /// Resize both targets, carrying the contents of `read` over.
    ///
    /// Returns `false` without touching anything if the size is unchanged.
    /// Otherwise `read` is replaced by a resampled copy and `write` by a fresh
    /// target. Nothing is replaced unless both allocations succeed.
    pub fn resize_with<R, A, E>(
        &mut self,
        width: u32,
        height: u32,
        mut resample: R,
        mut allocate: A,
    ) -> std::result::Result<bool, E>
    where
        R: FnMut(&T, u32, u32) -> std::result::Result<T, E>,
        A: FnMut(u32, u32) -> std::result::Result<T, E>,
    {
        let (width, height) = (width.max(1), height.max(1));
        if self.extent() == (width, height) {
            return Ok(false);
        }

        let read = resample(self.read(), width, height)?;
        let write = allocate(width, height)?;
        self.targets = [read, write];
        self.read = 0;

        Ok(true)
    }
}

impl DoubleFramebuffer {
    pub fn with_options(
        context: &Context,
        width: u32,
        height: u32,
        options: crate::render::TextureOptions,
    ) -> Result<Self> {
        Ok(Self::new(
            Framebuffer::new(context, width, height, options)?,
            Framebuffer::new(context, width, height, options)?,
        ))
    }

    pub fn texel_size(&self) -> [f32; 2] {
        self.read().texel_size
    }

    pub fn resize(
        &mut self,
        context: &Context,
        resampler: &Resampler,
        width: u32,
        height: u32,
    ) -> Result<bool> {
        let options = self.read().options();
        self.resize_with(
            width,
            height,
            |source, width, height| resampler.resample(context, source, width, height),
            |width, height| Framebuffer::new(context, width, height, options),
        )
    }
}

/// Copies the contents of a target into a new one of a different size,
/// sampling with the source's filter mode.
pub struct Resampler {
    quad: Quad,
    copy_pass: Program,
}

impl Resampler {
    pub fn new(context: &Context, dialect: &Dialect, quad: Quad) -> Result<Self> {
        Ok(Self {
            quad,
            copy_pass: Program::new(context, dialect, (shaders::BASE_VERT, shaders::COPY_FRAG))?,
        })
    }

    pub fn quad(&self) -> &Quad {
        &self.quad
    }

    pub fn resample(
        &self,
        context: &Context,
        source: &Framebuffer,
        width: u32,
        height: u32,
    ) -> Result<Framebuffer> {
        let target = Framebuffer::new(context, width, height, source.options())?;

        unsafe {
            use glow::HasContext;
            context.disable(glow::BLEND);
        }

        self.copy_pass.bind();
        self.copy_pass.set_uniforms(&[
            &Uniform {
                name: "texelSize",
                value: UniformValue::Vec2(source.texel_size),
            },
            &Uniform {
                name: "uTexture",
                value: UniformValue::Texture2D(source.attach(0)),
            },
        ]);
        self.quad.blit(&target);

        Ok(target)
    }
}

/// The fields the solver works on.
///
/// Velocity, pressure, divergence and curl share the simulation resolution.
/// Dye has its own.
pub struct FieldSet {
    pub velocity: DoubleFramebuffer,
    pub dye: DoubleFramebuffer,
    pub pressure: DoubleFramebuffer,
    pub divergence: Framebuffer,
    pub curl: Framebuffer,
}

impl FieldSet {
    pub fn new(
        context: &Context,
        formats: &Formats,
        surface: Surface,
        settings: &Settings,
    ) -> Result<Self> {
        let (sim_width, sim_height) = surface.resolution(settings.sim_resolution);
        let (dye_width, dye_height) = surface.resolution(settings.dye_resolution);
        let scalar = formats.texture_options(formats.r, glow::NEAREST);

        log::debug!(
            "Simulation: {}x{}, dye: {}x{}",
            sim_width,
            sim_height,
            dye_width,
            dye_height
        );

        Ok(Self {
            velocity: DoubleFramebuffer::with_options(
                context,
                sim_width,
                sim_height,
                formats.texture_options(formats.rg, formats.filter),
            )?,
            dye: DoubleFramebuffer::with_options(
                context,
                dye_width,
                dye_height,
                formats.texture_options(formats.rgba, formats.filter),
            )?,
            pressure: DoubleFramebuffer::with_options(context, sim_width, sim_height, scalar)?,
            divergence: Framebuffer::new(context, sim_width, sim_height, scalar)?,
            curl: Framebuffer::new(context, sim_width, sim_height, scalar)?,
        })
    }

    /// Bring every field to the size the surface and settings call for.
    ///
    /// Velocity and dye are resampled. The scratch fields are recreated.
    pub fn reconcile(
        &mut self,
        context: &Context,
        resampler: &Resampler,
        surface: Surface,
        settings: &Settings,
    ) -> Result<()> {
        let (sim_width, sim_height) = surface.resolution(settings.sim_resolution);
        let (dye_width, dye_height) = surface.resolution(settings.dye_resolution);

        let vector = self.velocity.read().options();
        let scalar = self.divergence.options();
        resize_simulation_fields(
            &mut self.velocity,
            (&mut self.pressure, &mut self.divergence, &mut self.curl),
            sim_width,
            sim_height,
            |source, width, height| resampler.resample(context, source, width, height),
            |width, height| Framebuffer::new(context, width, height, vector),
            |width, height| Framebuffer::new(context, width, height, scalar),
        )?;
        self.dye.resize(context, resampler, dye_width, dye_height)?;

        Ok(())
    }
}

/// Resize velocity along with the scalar fields that share its size.
///
/// The scalar fields are recreated rather than resampled. Nothing is replaced
/// unless every allocation succeeds.
fn resize_simulation_fields<T, E, R, V, S>(
    velocity: &mut PingPong<T>,
    (pressure, divergence, curl): (&mut PingPong<T>, &mut T, &mut T),
    width: u32,
    height: u32,
    resample: R,
    allocate_vector: V,
    mut allocate_scalar: S,
) -> std::result::Result<(), E>
where
    T: Extent,
    R: FnMut(&T, u32, u32) -> std::result::Result<T, E>,
    V: FnMut(u32, u32) -> std::result::Result<T, E>,
    S: FnMut(u32, u32) -> std::result::Result<T, E>,
{
    let (width, height) = (width.max(1), height.max(1));

    let scalars = if divergence.extent() != (width, height) {
        Some((
            PingPong::new(allocate_scalar(width, height)?, allocate_scalar(width, height)?),
            allocate_scalar(width, height)?,
            allocate_scalar(width, height)?,
        ))
    } else {
        None
    };

    velocity.resize_with(width, height, resample, allocate_vector)?;

    if let Some((new_pressure, new_divergence, new_curl)) = scalars {
        *pressure = new_pressure;
        *divergence = new_divergence;
        *curl = new_curl;
    }

    Ok(())
}

/// The sizes of the bloom mip chain: each level halves the bloom target,
/// stopping before either side drops below 2.
pub fn bloom_mip_sizes(width: u32, height: u32, iterations: u32) -> Vec<(u32, u32)> {
    (0..iterations.min(31))
        .map(|level| (width >> (level + 1), height >> (level + 1)))
        .take_while(|&(width, height)| width >= 2 && height >= 2)
        .collect()
}

pub struct BloomTargets {
    pub bloom: Framebuffer,
    pub mips: Vec<Framebuffer>,
}

impl BloomTargets {
    pub fn new(
        context: &Context,
        formats: &Formats,
        surface: Surface,
        settings: &Settings,
    ) -> Result<Self> {
        let (width, height) = surface.resolution(settings.bloom_resolution);
        let options = formats.texture_options(formats.rgba, formats.filter);

        let bloom = Framebuffer::new(context, width, height, options)?;
        let mips = bloom_mip_sizes(width, height, settings.bloom_iterations)
            .into_iter()
            .map(|(width, height)| Framebuffer::new(context, width, height, options))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { bloom, mips })
    }
}

pub struct SunraysTargets {
    pub sunrays: Framebuffer,
    pub temp: Framebuffer,
}

impl SunraysTargets {
    pub fn new(
        context: &Context,
        formats: &Formats,
        surface: Surface,
        settings: &Settings,
    ) -> Result<Self> {
        let (width, height) = surface.resolution(settings.sunrays_resolution);
        let options = formats.texture_options(formats.r, formats.filter);

        Ok(Self {
            sunrays: Framebuffer::new(context, width, height, options)?,
            temp: Framebuffer::new(context, width, height, options)?,
        })
    }
}
