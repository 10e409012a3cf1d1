use smoke::{FluidEffect, Rgb, Settings, Tier};

use gloo_utils::format::JsValueSerdeExt;
use serde::Serialize;
use std::rc::Rc;
use wasm_bindgen::prelude::*;
use wasm_bindgen::{JsCast, JsValue};
use web_sys::{HtmlCanvasElement, WebGl2RenderingContext, WebGlRenderingContext};

#[wasm_bindgen]
pub struct Smoke {
    canvas: HtmlCanvasElement,
    logical_width: u32,
    logical_height: u32,
    pixel_ratio: f64,
    instance: FluidEffect,
}

#[wasm_bindgen]
impl Smoke {
    #[wasm_bindgen(constructor)]
    pub fn new(canvas_id: &str, settings_object: &JsValue) -> Result<Smoke, JsValue> {
        set_panic_hook();
        // Fails if a logger is already installed, which is fine.
        console_log::init_with_level(log::Level::Debug).ok();

        let settings = read_settings(settings_object)?;

        let window = web_sys::window().ok_or("The global `window` doesn’t exist")?;
        let canvas = window
            .document()
            .ok_or("Expected to find a document")?
            .get_element_by_id(canvas_id)
            .ok_or_else(|| format!("Expected to find a canvas element with id `{}`", canvas_id))?
            .dyn_into::<HtmlCanvasElement>()?;

        let pixel_ratio = window.device_pixel_ratio();
        let logical_width = canvas.client_width().max(0) as u32;
        let logical_height = canvas.client_height().max(0) as u32;
        let (physical_width, physical_height) =
            physical_from_logical_size(logical_width, logical_height, pixel_ratio);
        canvas.set_width(physical_width);
        canvas.set_height(physical_height);

        let (context, tier) = get_rendering_context(&canvas)?;

        let instance = FluidEffect::new(
            &Rc::new(context),
            tier,
            physical_width,
            physical_height,
            &Rc::new(settings),
        )
        .map_err(|err| JsValue::from_str(&err.to_string()))?;

        Ok(Self {
            canvas,
            logical_width,
            logical_height,
            pixel_ratio,
            instance,
        })
    }

    #[wasm_bindgen(setter)]
    pub fn set_settings(&mut self, settings_object: &JsValue) -> Result<(), JsValue> {
        let settings = read_settings(settings_object)?;
        self.instance.update_settings(&Rc::new(settings));
        Ok(())
    }

    pub fn animate(&mut self, timestamp: f64) {
        self.instance.update(timestamp);
    }

    pub fn resize(&mut self, logical_width: u32, logical_height: u32) {
        if (self.logical_width, self.logical_height) == (logical_width, logical_height) {
            return;
        }

        let (physical_width, physical_height) =
            physical_from_logical_size(logical_width, logical_height, self.pixel_ratio);
        self.canvas.set_width(physical_width);
        self.canvas.set_height(physical_height);
        self.instance.resize(physical_width, physical_height);

        self.logical_width = logical_width;
        self.logical_height = logical_height;
    }

    /// Positions are in CSS pixels relative to the canvas. `color` is an
    /// optional `{ r, g, b }` object with components in 0–255.
    pub fn do_effect(&mut self, id: i32, x: f32, y: f32, color: JsValue) {
        let (x, y) = self.to_physical(x, y);
        self.instance
            .do_effect(id.into(), x, y, read_color(&color));
    }

    pub fn pointer_down(&mut self, id: i32, x: f32, y: f32, color: JsValue) {
        let (x, y) = self.to_physical(x, y);
        self.instance
            .update_pointer_down_data(id.into(), x, y, read_color(&color));
    }

    pub fn pointer_move(&mut self, id: i32, x: f32, y: f32, color: JsValue) {
        let (x, y) = self.to_physical(x, y);
        self.instance
            .update_pointer_move_data(id.into(), x, y, read_color(&color));
    }

    pub fn pointer_up(&mut self, id: i32) {
        self.instance.update_pointer_up_data(id.into());
    }

    pub fn push_random_splats(&mut self, count: u32) {
        self.instance.push_random_splats(count);
    }

    pub fn set_dithering_texture(&mut self, encoded_bytes: &[u8]) {
        self.instance.set_dithering_texture(encoded_bytes);
    }

    fn to_physical(&self, x: f32, y: f32) -> (f32, f32) {
        let ratio = self.pixel_ratio as f32;
        (x * ratio, y * ratio)
    }
}

/// Parse a settings object, lowering the quality on mobile browsers.
fn read_settings(settings_object: &JsValue) -> Result<Settings, JsValue> {
    let mut settings: Settings = settings_object
        .into_serde()
        .map_err(|msg| JsValue::from_str(&msg.to_string()))?;

    let user_agent = web_sys::window()
        .and_then(|window| window.navigator().user_agent().ok())
        .unwrap_or_default();
    if is_mobile(&user_agent) {
        settings.low_quality = true;
    }

    Ok(settings)
}

fn is_mobile(user_agent: &str) -> bool {
    let user_agent = user_agent.to_ascii_lowercase();
    user_agent.contains("mobi") || user_agent.contains("android")
}

fn read_color(color: &JsValue) -> Option<Rgb> {
    if color.is_undefined() || color.is_null() {
        return None;
    }

    match color.into_serde() {
        Ok(color) => Some(color),
        Err(msg) => {
            log::warn!("Ignoring invalid color: {}", msg);
            None
        }
    }
}

/// Prefer WebGL2 and fall back to WebGL1.
fn get_rendering_context(canvas: &HtmlCanvasElement) -> Result<(glow::Context, Tier), JsValue> {
    let options = ContextOptions {
        alpha: true,
        depth: false,
        stencil: false,
        antialias: false,
        premultiplied_alpha: true,
        preserve_drawing_buffer: false,
    }
    .serialize()?;

    if let Ok(Some(gl)) = canvas.get_context_with_context_options("webgl2", &options) {
        let gl = gl.dyn_into::<WebGl2RenderingContext>()?;
        gl.get_extension("EXT_color_buffer_float")?;
        gl.get_extension("OES_texture_float_linear")?;
        gl.disable(WebGl2RenderingContext::BLEND);

        log::debug!("Using WebGL2");
        return Ok((glow::Context::from_webgl2_context(gl), Tier::Modern));
    }

    if let Ok(Some(gl)) = canvas.get_context_with_context_options("webgl", &options) {
        let gl = gl.dyn_into::<WebGlRenderingContext>()?;
        gl.get_extension("OES_texture_half_float")?;
        gl.get_extension("OES_texture_half_float_linear")?;
        gl.disable(WebGlRenderingContext::BLEND);

        log::debug!("Using WebGL1");
        return Ok((glow::Context::from_webgl1_context(gl), Tier::Legacy));
    }

    Err(JsValue::from_str("Can’t create a WebGL rendering context"))
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
struct ContextOptions {
    alpha: bool,
    depth: bool,
    stencil: bool,
    antialias: bool,
    premultiplied_alpha: bool,
    preserve_drawing_buffer: bool,
}

impl ContextOptions {
    fn serialize(&self) -> Result<JsValue, JsValue> {
        JsValue::from_serde(self).map_err(|msg| JsValue::from_str(&msg.to_string()))
    }
}

// https://github.com/rustwasm/console_error_panic_hook#readme
fn set_panic_hook() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}

fn physical_from_logical_size(
    logical_width: u32,
    logical_height: u32,
    pixel_ratio: f64,
) -> (u32, u32) {
    (
        (pixel_ratio * f64::from(logical_width)) as u32,
        (pixel_ratio * f64::from(logical_height)) as u32,
    )
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_is_mobile() {
        assert!(is_mobile(
            "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X) Mobile/15E148 Safari/604.1"
        ));
        assert!(is_mobile("Mozilla/5.0 (Linux; Android 14; Pixel 8)"));
        assert!(!is_mobile(
            "Mozilla/5.0 (X11; Linux x86_64; rv:128.0) Gecko/20100101 Firefox/128.0"
        ));
        assert!(!is_mobile(""));
    }
}
