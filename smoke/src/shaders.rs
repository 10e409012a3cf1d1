// GLSL ES 1.00 sources. The version line and dialect header are prepended
// when the program is compiled.

pub static BASE_VERT: &str = include_str!("../shaders/base.vert");
pub static BLUR_VERT: &str = include_str!("../shaders/blur.vert");

pub static COPY_FRAG: &str = include_str!("../shaders/copy.frag");
pub static CLEAR_FRAG: &str = include_str!("../shaders/clear.frag");
pub static COLOR_FRAG: &str = include_str!("../shaders/color.frag");
pub static CHECKERBOARD_FRAG: &str = include_str!("../shaders/checkerboard.frag");
pub static BLUR_FRAG: &str = include_str!("../shaders/blur.frag");
pub static DISPLAY_FRAG: &str = include_str!("../shaders/display.frag");

pub static BLOOM_PREFILTER_FRAG: &str = include_str!("../shaders/bloom_prefilter.frag");
pub static BLOOM_BLUR_FRAG: &str = include_str!("../shaders/bloom_blur.frag");
pub static BLOOM_FINAL_FRAG: &str = include_str!("../shaders/bloom_final.frag");
pub static SUNRAYS_MASK_FRAG: &str = include_str!("../shaders/sunrays_mask.frag");
pub static SUNRAYS_FRAG: &str = include_str!("../shaders/sunrays.frag");

pub static SPLAT_FRAG: &str = include_str!("../shaders/splat.frag");
pub static ADVECTION_FRAG: &str = include_str!("../shaders/advection.frag");
pub static DIVERGENCE_FRAG: &str = include_str!("../shaders/divergence.frag");
pub static CURL_FRAG: &str = include_str!("../shaders/curl.frag");
pub static VORTICITY_FRAG: &str = include_str!("../shaders/vorticity.frag");
pub static PRESSURE_FRAG: &str = include_str!("../shaders/pressure.frag");
pub static GRADIENT_SUBTRACT_FRAG: &str = include_str!("../shaders/gradient_subtract.frag");
