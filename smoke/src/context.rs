use crate::render::{Context, TextureOptions};

use glow::HasContext;
use std::fmt::Write;

// Not exported by glow. Same value in WebGL 1 and GLES 2.
const HALF_FLOAT_OES: u32 = 0x8D61;

/// The programmable pipeline available on the context.
///
/// `Modern` is WebGL 2, GLES 3 or desktop GL 3.3 core. `Legacy` is WebGL 1 or
/// GLES 2, where half-float textures and their filtering come from
/// extensions.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Tier {
    Modern,
    Legacy,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TextureFormat {
    pub internal_format: u32,
    pub format: u32,
}

impl TextureFormat {
    pub const RGBA16F: Self = Self::new(glow::RGBA16F, glow::RGBA);
    pub const RG16F: Self = Self::new(glow::RG16F, glow::RG);
    pub const R16F: Self = Self::new(glow::R16F, glow::RED);
    pub const RGBA: Self = Self::new(glow::RGBA, glow::RGBA);

    pub const fn new(internal_format: u32, format: u32) -> Self {
        Self {
            internal_format,
            format,
        }
    }
}

/// What the context can do, negotiated once at startup.
#[derive(Clone, Debug, PartialEq)]
pub struct Capabilities {
    pub tier: Tier,
    pub embedded: bool,
    pub supports_linear_filtering: bool,
    pub half_float_type: u32,
    pub rgba: Option<TextureFormat>,
    pub rg: Option<TextureFormat>,
    pub r: Option<TextureFormat>,
}

/// The render-target formats the solver needs, all of them resolved.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Formats {
    pub rgba: TextureFormat,
    pub rg: TextureFormat,
    pub r: TextureFormat,
    pub type_: u32,
    pub filter: u32,
}

impl Formats {
    pub fn texture_options(&self, format: TextureFormat, filter: u32) -> TextureOptions {
        TextureOptions {
            internal_format: format.internal_format,
            format: format.format,
            type_: self.type_,
            ..Default::default()
        }
        .with_filter(filter)
    }
}

impl Capabilities {
    pub fn formats(&self) -> Option<Formats> {
        Some(Formats {
            rgba: self.rgba?,
            rg: self.rg?,
            r: self.r?,
            type_: self.half_float_type,
            filter: self.filter(),
        })
    }

    pub fn filter(&self) -> u32 {
        if self.supports_linear_filtering {
            glow::LINEAR
        } else {
            glow::NEAREST
        }
    }

    pub fn dialect(&self) -> Dialect {
        Dialect::new(self.tier, self.embedded)
    }
}

/// Query the context for its capabilities.
///
/// Each format is probed by attaching a small texture to a framebuffer and
/// checking for completeness. A format that fails falls back to one with more
/// channels.
pub fn negotiate(context: &Context, tier: Tier) -> Capabilities {
    let version = context.version();
    let embedded = version.is_embedded;

    log::debug!(
        "GL version {}.{} ({}), {:?} tier",
        version.major,
        version.minor,
        if embedded { "embedded" } else { "desktop" },
        tier
    );

    let (half_float_type, supports_linear_filtering, candidates) = match tier {
        Tier::Modern => {
            let linear = !embedded || has_extension(context, "OES_texture_float_linear");
            (glow::HALF_FLOAT, linear, modern_candidates())
        }

        Tier::Legacy => {
            let linear = has_extension(context, "OES_texture_half_float_linear");
            let candidates = if has_extension(context, "OES_texture_half_float") {
                legacy_candidates()
            } else {
                log::warn!("Half-float textures are not supported");
                [vec![], vec![], vec![]]
            };
            (HALF_FLOAT_OES, linear, candidates)
        }
    };

    let mut probe = |format: TextureFormat| unsafe {
        probe_render_texture(context, format, half_float_type)
    };
    let [rgba, rg, r] = candidates;

    let capabilities = Capabilities {
        tier,
        embedded,
        supports_linear_filtering,
        half_float_type,
        rgba: supported_format(&rgba, &mut probe),
        rg: supported_format(&rg, &mut probe),
        r: supported_format(&r, &mut probe),
    };

    log::debug!("{:?}", capabilities);

    capabilities
}

fn modern_candidates() -> [Vec<TextureFormat>; 3] {
    use TextureFormat as F;
    [
        vec![F::RGBA16F],
        vec![F::RG16F, F::RGBA16F],
        vec![F::R16F, F::RG16F, F::RGBA16F],
    ]
}

fn legacy_candidates() -> [Vec<TextureFormat>; 3] {
    [
        vec![TextureFormat::RGBA],
        vec![TextureFormat::RGBA],
        vec![TextureFormat::RGBA],
    ]
}

/// The first candidate the probe accepts.
fn supported_format<P>(candidates: &[TextureFormat], probe: &mut P) -> Option<TextureFormat>
where
    P: FnMut(TextureFormat) -> bool,
{
    candidates.iter().copied().find(|format| probe(*format))
}

fn has_extension(context: &Context, name: &str) -> bool {
    let extensions = context.supported_extensions();
    extensions.contains(name) || extensions.contains(&format!("GL_{}", name))
}

unsafe fn probe_render_texture(context: &Context, format: TextureFormat, type_: u32) -> bool {
    let texture = match context.create_texture() {
        Ok(texture) => texture,
        Err(_) => return false,
    };

    context.bind_texture(glow::TEXTURE_2D, Some(texture));
    context.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_MIN_FILTER, glow::NEAREST as i32);
    context.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_MAG_FILTER, glow::NEAREST as i32);
    context.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_WRAP_S, glow::CLAMP_TO_EDGE as i32);
    context.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_WRAP_T, glow::CLAMP_TO_EDGE as i32);
    context.tex_image_2d(
        glow::TEXTURE_2D,
        0,
        format.internal_format as i32,
        4,
        4,
        0,
        format.format,
        type_,
        None,
    );
    context.bind_texture(glow::TEXTURE_2D, None);

    let framebuffer = match context.create_framebuffer() {
        Ok(framebuffer) => framebuffer,
        Err(_) => {
            context.delete_texture(texture);
            return false;
        }
    };

    context.bind_framebuffer(glow::FRAMEBUFFER, Some(framebuffer));
    context.framebuffer_texture_2d(
        glow::FRAMEBUFFER,
        glow::COLOR_ATTACHMENT0,
        glow::TEXTURE_2D,
        Some(texture),
        0,
    );
    let status = context.check_framebuffer_status(glow::FRAMEBUFFER);
    context.bind_framebuffer(glow::FRAMEBUFFER, None);

    context.delete_framebuffer(framebuffer);
    context.delete_texture(texture);

    status == glow::FRAMEBUFFER_COMPLETE
}

/// The GLSL flavour shaders are compiled as.
///
/// Shader sources are written against GLSL ES 1.00. On modern contexts a small
/// header maps the old built-ins onto their replacements.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Dialect {
    pub tier: Tier,
    pub embedded: bool,
}

impl Dialect {
    pub fn new(tier: Tier, embedded: bool) -> Self {
        Self { tier, embedded }
    }

    pub fn version(&self) -> &'static str {
        match (self.tier, self.embedded) {
            (Tier::Legacy, _) => "100",
            (Tier::Modern, true) => "300 es",
            (Tier::Modern, false) => "330 core",
        }
    }

    /// Prefix the shader with the version, keyword defines and the
    /// compatibility header for its stage.
    pub fn preprocess_shader(&self, stage: u32, source: &str, defines: &[&str]) -> String {
        let mut header = String::with_capacity(256);
        let _ = writeln!(header, "#version {}", self.version());

        for define in defines {
            let _ = writeln!(header, "#define {}", define);
        }

        if self.embedded || self.tier == Tier::Legacy {
            header.push_str("precision highp float;\nprecision highp sampler2D;\n");
        }

        if self.tier == Tier::Modern {
            if stage == glow::VERTEX_SHADER {
                header.push_str("#define attribute in\n#define varying out\n");
            } else {
                header.push_str("#define varying in\n#define texture2D texture\n");
                header.push_str("out highp vec4 outColor;\n#define gl_FragColor outColor\n");
            }
        }

        header + source
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_falls_back_to_wider_formats() {
        let [_, rg, r] = modern_candidates();
        let mut only_rgba = |format: TextureFormat| format == TextureFormat::RGBA16F;

        assert_eq!(
            supported_format(&r, &mut only_rgba),
            Some(TextureFormat::RGBA16F)
        );
        assert_eq!(
            supported_format(&rg, &mut only_rgba),
            Some(TextureFormat::RGBA16F)
        );
    }

    #[test]
    fn test_prefers_the_narrowest_format() {
        let [rgba, rg, r] = modern_candidates();
        let mut all = |_: TextureFormat| true;

        assert_eq!(supported_format(&rgba, &mut all), Some(TextureFormat::RGBA16F));
        assert_eq!(supported_format(&rg, &mut all), Some(TextureFormat::RG16F));
        assert_eq!(supported_format(&r, &mut all), Some(TextureFormat::R16F));
    }

    #[test]
    fn test_reports_unavailable_formats() {
        let [_, _, r] = modern_candidates();
        let mut tried = Vec::new();
        let mut none = |format: TextureFormat| {
            tried.push(format);
            false
        };

        assert_eq!(supported_format(&r, &mut none), None);
        assert_eq!(
            tried,
            vec![
                TextureFormat::R16F,
                TextureFormat::RG16F,
                TextureFormat::RGBA16F
            ]
        );
    }

    fn capabilities(r: Option<TextureFormat>) -> Capabilities {
        Capabilities {
            tier: Tier::Modern,
            embedded: true,
            supports_linear_filtering: false,
            half_float_type: glow::HALF_FLOAT,
            rgba: Some(TextureFormat::RGBA16F),
            rg: Some(TextureFormat::RG16F),
            r,
        }
    }

    #[test]
    fn test_formats_require_every_channel_count() {
        assert!(capabilities(None).formats().is_none());

        let formats = capabilities(Some(TextureFormat::R16F)).formats().unwrap();
        assert_eq!(formats.filter, glow::NEAREST);
        assert_eq!(formats.type_, glow::HALF_FLOAT);
    }

    #[test]
    fn test_modern_fragment_header() {
        let dialect = Dialect::new(Tier::Modern, true);
        let source = dialect.preprocess_shader(
            glow::FRAGMENT_SHADER,
            "void main () {}\n",
            &["SHADING", "BLOOM"],
        );

        assert!(source.starts_with("#version 300 es\n#define SHADING\n#define BLOOM\n"));
        assert!(source.contains("#define texture2D texture"));
        assert!(source.contains("#define gl_FragColor outColor"));
        assert!(source.ends_with("void main () {}\n"));
    }

    #[test]
    fn test_desktop_header_has_no_precision_qualifiers() {
        let dialect = Dialect::new(Tier::Modern, false);
        let source = dialect.preprocess_shader(glow::VERTEX_SHADER, "", &[]);

        assert!(source.starts_with("#version 330 core\n"));
        assert!(!source.contains("precision"));
        assert!(source.contains("#define attribute in"));
    }

    #[test]
    fn test_legacy_header_is_untouched_glsl_100() {
        let dialect = Dialect::new(Tier::Legacy, true);
        let source = dialect.preprocess_shader(glow::FRAGMENT_SHADER, "", &[]);

        assert_eq!(
            source,
            "#version 100\nprecision highp float;\nprecision highp sampler2D;\n"
        );
    }
}
