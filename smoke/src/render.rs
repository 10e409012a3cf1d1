use crate::context::Dialect;
use crate::data;

use glow::HasContext;
use rustc_hash::FxHashMap;
use std::rc::Rc;
use thiserror::Error;

pub type Context = Rc<glow::Context>;
type GlDataType = u32;
type Result<T> = std::result::Result<T, Problem>;

#[derive(Error, Debug)]
pub enum Problem {
    #[error("Ran out of memory")]
    OutOfMemory,

    #[error("Cannot create buffer")]
    CannotCreateBuffer,

    #[error("Cannot create texture")]
    CannotCreateTexture,

    #[error("Cannot create framebuffer")]
    CannotCreateFramebuffer,

    #[error("Framebuffer is incomplete (status: {0:#x})")]
    IncompleteFramebuffer(u32),

    #[error("Cannot create shader")]
    CannotCreateShader,

    #[error("Cannot compile shader: {0}")]
    CannotCompileShader(String),

    #[error("Cannot create program")]
    CannotCreateProgram,

    #[error("Cannot link program: {0}")]
    CannotLinkProgram(String),

    #[error("Unexpected data size. Expected: {expected:?}. Actual: {actual:?} ")]
    WrongDataSize { expected: usize, actual: usize },
}

#[derive(Debug)]
pub struct Buffer {
    context: Context,
    pub id: glow::Buffer,
}

impl Drop for Buffer {
    fn drop(&mut self) {
        unsafe {
            self.context.delete_buffer(self.id);
        }
    }
}

impl Buffer {
    pub fn from_bytes(
        context: &Context,
        data: &[u8],
        buffer_type: u32,
        usage: u32,
    ) -> Result<Self> {
        let buffer = unsafe {
            let buffer = context
                .create_buffer()
                .map_err(|_| Problem::CannotCreateBuffer)?;

            context.bind_buffer(buffer_type, Some(buffer));
            context.buffer_data_u8_slice(buffer_type, data, usage);
            context.bind_buffer(buffer_type, None);

            buffer
        };

        Ok(Self {
            context: Rc::clone(context),
            id: buffer,
        })
    }

    pub fn from_f32(context: &Context, data: &[f32], buffer_type: u32, usage: u32) -> Result<Self> {
        Self::from_bytes(context, bytemuck::cast_slice(data), buffer_type, usage)
    }

    pub fn from_u16(context: &Context, data: &[u16], buffer_type: u32, usage: u32) -> Result<Self> {
        Self::from_bytes(context, bytemuck::cast_slice(data), buffer_type, usage)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TextureOptions {
    pub mag_filter: GlDataType,
    pub min_filter: GlDataType,
    pub wrap_s: GlDataType,
    pub wrap_t: GlDataType,
    pub internal_format: GlDataType,
    pub format: GlDataType,
    pub type_: GlDataType,
}

impl Default for TextureOptions {
    fn default() -> Self {
        TextureOptions {
            mag_filter: glow::NEAREST,
            min_filter: glow::NEAREST,
            wrap_s: glow::CLAMP_TO_EDGE,
            wrap_t: glow::CLAMP_TO_EDGE,
            internal_format: glow::RGBA,
            format: glow::RGBA,
            type_: glow::UNSIGNED_BYTE,
        }
    }
}

impl TextureOptions {
    pub fn with_filter(self, filter: GlDataType) -> Self {
        Self {
            mag_filter: filter,
            min_filter: filter,
            ..self
        }
    }
}

/// A 2D texture. Deleted when dropped.
pub struct Texture {
    context: Context,
    pub id: glow::Texture,
    pub width: u32,
    pub height: u32,
    pub options: TextureOptions,
}

impl Drop for Texture {
    fn drop(&mut self) {
        unsafe {
            self.context.delete_texture(self.id);
        }
    }
}

impl Texture {
    pub fn new(
        context: &Context,
        width: u32,
        height: u32,
        options: TextureOptions,
        data: Option<&[u8]>,
    ) -> Result<Self> {
        let width = width.max(1);
        let height = height.max(1);

        if let Some(pixels) = data {
            let expected = 4 * (width * height) as usize;
            if options.type_ == glow::UNSIGNED_BYTE
                && options.format == glow::RGBA
                && pixels.len() != expected
            {
                return Err(Problem::WrongDataSize {
                    expected,
                    actual: pixels.len(),
                });
            }
        }

        let id = unsafe {
            let texture = context
                .create_texture()
                .map_err(|_| Problem::CannotCreateTexture)?;

            context.bind_texture(glow::TEXTURE_2D, Some(texture));
            context.tex_parameter_i32(
                glow::TEXTURE_2D,
                glow::TEXTURE_MAG_FILTER,
                options.mag_filter as i32,
            );
            context.tex_parameter_i32(
                glow::TEXTURE_2D,
                glow::TEXTURE_MIN_FILTER,
                options.min_filter as i32,
            );
            context.tex_parameter_i32(
                glow::TEXTURE_2D,
                glow::TEXTURE_WRAP_S,
                options.wrap_s as i32,
            );
            context.tex_parameter_i32(
                glow::TEXTURE_2D,
                glow::TEXTURE_WRAP_T,
                options.wrap_t as i32,
            );
            context.tex_image_2d(
                glow::TEXTURE_2D,
                0,
                options.internal_format as i32,
                width as i32,
                height as i32,
                0,
                options.format,
                options.type_,
                data,
            );
            context.bind_texture(glow::TEXTURE_2D, None);

            texture
        };

        Ok(Self {
            context: Rc::clone(context),
            id,
            width,
            height,
            options,
        })
    }

    /// Bind to a texture unit and return the unit for use as a sampler uniform.
    pub fn attach(&self, unit: u32) -> u32 {
        unsafe {
            self.context.active_texture(glow::TEXTURE0 + unit);
            self.context.bind_texture(glow::TEXTURE_2D, Some(self.id));
        }
        unit
    }
}

/// A texture with a framebuffer attached to it.
///
/// Textures are cleared to zero on creation. The texel size is fixed for the
/// lifetime of the target: resizing produces a new `Framebuffer`.
pub struct Framebuffer {
    context: Context,
    pub id: glow::Framebuffer,
    pub width: u32,
    pub height: u32,
    pub texel_size: [f32; 2],
    pub texture: Texture,
}

impl Drop for Framebuffer {
    fn drop(&mut self) {
        unsafe {
            self.context
                .bind_framebuffer(glow::FRAMEBUFFER, Some(self.id));
            self.context.framebuffer_texture_2d(
                glow::FRAMEBUFFER,
                glow::COLOR_ATTACHMENT0,
                glow::TEXTURE_2D,
                None,
                0,
            );
            self.context.bind_framebuffer(glow::FRAMEBUFFER, None);
            self.context.delete_framebuffer(self.id);
        }
    }
}

impl Framebuffer {
    pub fn new(
        context: &Context,
        width: u32,
        height: u32,
        options: TextureOptions,
    ) -> Result<Self> {
        let texture = Texture::new(context, width, height, options, None)?;
        let (width, height) = (texture.width, texture.height);

        let id = unsafe {
            let framebuffer = context
                .create_framebuffer()
                .map_err(|_| Problem::CannotCreateFramebuffer)?;

            context.bind_framebuffer(glow::FRAMEBUFFER, Some(framebuffer));
            context.framebuffer_texture_2d(
                glow::FRAMEBUFFER,
                glow::COLOR_ATTACHMENT0,
                glow::TEXTURE_2D,
                Some(texture.id),
                0,
            );

            let status = context.check_framebuffer_status(glow::FRAMEBUFFER);
            if status != glow::FRAMEBUFFER_COMPLETE {
                context.bind_framebuffer(glow::FRAMEBUFFER, None);
                context.delete_framebuffer(framebuffer);
                return Err(Problem::IncompleteFramebuffer(status));
            }

            context.viewport(0, 0, width as i32, height as i32);
            context.clear_color(0.0, 0.0, 0.0, 0.0);
            context.clear(glow::COLOR_BUFFER_BIT);
            context.bind_framebuffer(glow::FRAMEBUFFER, None);

            framebuffer
        };

        Ok(Self {
            context: Rc::clone(context),
            id,
            width,
            height,
            texel_size: [1.0 / width as f32, 1.0 / height as f32],
            texture,
        })
    }

    pub fn options(&self) -> TextureOptions {
        self.texture.options
    }

    pub fn attach(&self, unit: u32) -> u32 {
        self.texture.attach(unit)
    }

    pub fn draw_to<T>(&self, draw_call: T)
    where
        T: FnOnce(),
    {
        unsafe {
            self.context
                .bind_framebuffer(glow::FRAMEBUFFER, Some(self.id));
            self.context
                .viewport(0, 0, self.width as i32, self.height as i32);
            draw_call();
            self.context.bind_framebuffer(glow::FRAMEBUFFER, None);
        }
    }
}

/// The full-screen quad every pass is drawn with.
///
/// All programs bind `aPosition` to attribute 0, so the attribute setup is
/// shared. Legacy contexts have no vertex array objects and keep the
/// attribute state bound globally instead.
pub struct Quad {
    context: Context,
    vertex_array: Option<VertexArrayObject>,
    #[allow(unused)]
    vertices: Buffer,
    indices: Buffer,
}

impl Quad {
    pub fn new(context: &Context, use_vertex_array: bool) -> Result<Self> {
        let vertices = Buffer::from_f32(
            context,
            &data::QUAD_VERTICES,
            glow::ARRAY_BUFFER,
            glow::STATIC_DRAW,
        )?;
        let indices = Buffer::from_u16(
            context,
            &data::QUAD_INDICES,
            glow::ELEMENT_ARRAY_BUFFER,
            glow::STATIC_DRAW,
        )?;

        let vertex_array = if use_vertex_array {
            Some(VertexArrayObject::empty(context)?)
        } else {
            None
        };

        unsafe {
            if let Some(vao) = &vertex_array {
                context.bind_vertex_array(Some(vao.id));
            }

            context.bind_buffer(glow::ARRAY_BUFFER, Some(vertices.id));
            context.vertex_attrib_pointer_f32(POSITION_ATTRIBUTE, 2, glow::FLOAT, false, 0, 0);
            context.enable_vertex_attrib_array(POSITION_ATTRIBUTE);
            context.bind_buffer(glow::ELEMENT_ARRAY_BUFFER, Some(indices.id));

            if vertex_array.is_some() {
                context.bind_vertex_array(None);
            }
        }

        Ok(Self {
            context: Rc::clone(context),
            vertex_array,
            vertices,
            indices,
        })
    }

    fn draw(&self) {
        unsafe {
            match &self.vertex_array {
                Some(vao) => self.context.bind_vertex_array(Some(vao.id)),
                None => self
                    .context
                    .bind_buffer(glow::ELEMENT_ARRAY_BUFFER, Some(self.indices.id)),
            }

            self.context.draw_elements(
                glow::TRIANGLES,
                data::QUAD_INDICES.len() as i32,
                glow::UNSIGNED_SHORT,
                0,
            );

            if self.vertex_array.is_some() {
                self.context.bind_vertex_array(None);
            }
        }
    }

    /// Draw the quad into a framebuffer, with the viewport set to its size.
    pub fn blit(&self, target: &Framebuffer) {
        target.draw_to(|| self.draw());
    }

    /// Draw the quad into the default framebuffer.
    pub fn blit_to_screen(&self, width: u32, height: u32) {
        unsafe {
            self.context.bind_framebuffer(glow::FRAMEBUFFER, None);
            self.context.viewport(0, 0, width as i32, height as i32);
        }
        self.draw();
    }

    pub fn blit_to(&self, target: Option<&Framebuffer>, width: u32, height: u32) {
        match target {
            Some(framebuffer) => self.blit(framebuffer),
            None => self.blit_to_screen(width, height),
        }
    }
}

pub const POSITION_ATTRIBUTE: u32 = 0;

/// A linked vertex + fragment program.
///
/// Compilation and link failures are not fatal: they are logged and the
/// program is left without a GL handle. Binding such a program unbinds the
/// current one, so draws issued with it produce nothing.
pub struct Program {
    context: Context,
    pub program: Option<glow::Program>,
    uniforms: FxHashMap<String, glow::UniformLocation>,
}

impl Drop for Program {
    fn drop(&mut self) {
        if let Some(program) = self.program {
            unsafe {
                self.context.delete_program(program);
            }
        }
    }
}

impl Program {
    pub fn new(context: &Context, dialect: &Dialect, shaders: (&str, &str)) -> Result<Self> {
        Self::new_with_defines(context, dialect, shaders, &[])
    }

    pub fn new_with_defines(
        context: &Context,
        dialect: &Dialect,
        shaders: (&str, &str),
        defines: &[&str],
    ) -> Result<Self> {
        match link_program(context, dialect, shaders, defines) {
            Ok(program) => Ok(Self {
                context: Rc::clone(context),
                program: Some(program),
                uniforms: get_uniform_locations(context, program),
            }),

            Err(problem @ Problem::CannotCompileShader(_))
            | Err(problem @ Problem::CannotLinkProgram(_)) => {
                log::warn!("{}", problem);

                Ok(Self {
                    context: Rc::clone(context),
                    program: None,
                    uniforms: FxHashMap::default(),
                })
            }

            Err(problem) => Err(problem),
        }
    }

    pub fn bind(&self) {
        unsafe {
            self.context.use_program(self.program);
        }
    }

    pub fn set_uniforms(&self, uniforms: &[&Uniform]) {
        for uniform in uniforms.iter() {
            self.set_uniform(uniform);
        }
    }

    /// Set a uniform on the currently bound program.
    pub fn set_uniform(&self, uniform: &Uniform) {
        let location = match self.get_uniform_location(uniform.name) {
            Some(location) => location,
            None => return,
        };
        let location = Some(location);
        let context = &self.context;

        unsafe {
            match uniform.value {
                UniformValue::Float(value) => context.uniform_1_f32(location, value),

                UniformValue::Vec2(value) => context.uniform_2_f32(location, value[0], value[1]),

                UniformValue::Vec3(value) => {
                    context.uniform_3_f32(location, value[0], value[1], value[2])
                }

                UniformValue::Vec4(value) => {
                    context.uniform_4_f32(location, value[0], value[1], value[2], value[3])
                }

                UniformValue::Texture2D(unit) => context.uniform_1_i32(location, unit as i32),
            }
        }
    }

    pub fn get_uniform_location(&self, name: &str) -> Option<&glow::UniformLocation> {
        self.uniforms.get(name)
    }
}

fn link_program(
    context: &Context,
    dialect: &Dialect,
    shaders: (&str, &str),
    defines: &[&str],
) -> Result<glow::Program> {
    let vertex_shader = compile_shader(
        context,
        glow::VERTEX_SHADER,
        &dialect.preprocess_shader(glow::VERTEX_SHADER, shaders.0, defines),
    )?;
    let fragment_shader = match compile_shader(
        context,
        glow::FRAGMENT_SHADER,
        &dialect.preprocess_shader(glow::FRAGMENT_SHADER, shaders.1, defines),
    ) {
        Ok(shader) => shader,
        Err(problem) => {
            unsafe { context.delete_shader(vertex_shader) };
            return Err(problem);
        }
    };

    unsafe {
        let program = match context.create_program() {
            Ok(program) => program,
            Err(_) => {
                context.delete_shader(vertex_shader);
                context.delete_shader(fragment_shader);
                return Err(Problem::CannotCreateProgram);
            }
        };

        context.attach_shader(program, vertex_shader);
        context.attach_shader(program, fragment_shader);
        context.bind_attrib_location(program, POSITION_ATTRIBUTE, "aPosition");
        context.link_program(program);

        context.detach_shader(program, vertex_shader);
        context.detach_shader(program, fragment_shader);
        context.delete_shader(vertex_shader);
        context.delete_shader(fragment_shader);

        if !context.get_program_link_status(program) {
            let log = context.get_program_info_log(program);
            context.delete_program(program);
            return Err(Problem::CannotLinkProgram(log));
        }

        Ok(program)
    }
}

fn get_uniform_locations(
    context: &Context,
    program: glow::Program,
) -> FxHashMap<String, glow::UniformLocation> {
    let mut uniforms = FxHashMap::default();
    unsafe {
        let uniform_count = context.get_active_uniforms(program);
        for num in 0..uniform_count {
            if let Some(info) = context.get_active_uniform(program, num) {
                if let Some(location) = context.get_uniform_location(program, &info.name) {
                    uniforms.insert(info.name, location);
                }
            }
        }
    }
    uniforms
}

pub fn compile_shader(context: &Context, shader_type: u32, source: &str) -> Result<glow::Shader> {
    unsafe {
        let shader = context
            .create_shader(shader_type)
            .map_err(|_| Problem::CannotCreateShader)?;
        context.shader_source(shader, source);
        context.compile_shader(shader);

        if context.get_shader_compile_status(shader) {
            Ok(shader)
        } else {
            let log = context.get_shader_info_log(shader);
            context.delete_shader(shader);
            Err(Problem::CannotCompileShader(log))
        }
    }
}

pub struct Uniform {
    pub name: &'static str,
    pub value: UniformValue,
}

#[derive(Clone, Copy, Debug)]
pub enum UniformValue {
    Float(f32),
    Vec2([f32; 2]),
    Vec3([f32; 3]),
    Vec4([f32; 4]),
    Texture2D(u32),
}

pub struct VertexArrayObject {
    context: Context,
    pub id: glow::VertexArray,
}

impl Drop for VertexArrayObject {
    fn drop(&mut self) {
        unsafe {
            self.context.delete_vertex_array(self.id);
        }
    }
}

impl VertexArrayObject {
    pub fn empty(context: &Context) -> Result<Self> {
        let id = unsafe {
            context
                .create_vertex_array()
                .map_err(|_| Problem::OutOfMemory)?
        };

        Ok(Self {
            id,
            context: Rc::clone(context),
        })
    }
}
