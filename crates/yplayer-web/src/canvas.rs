use egui::{vec2, Color32, Vec2};
use wasm_bindgen::JsCast;
use web_sys::{CanvasRenderingContext2d, HtmlCanvasElement};
use yplayer_core::{Bar, Gradient, Surface, VisualizerError, VisualizerResult};

use crate::js_message;

/// 2D canvas whose backing store follows the element's laid-out size
pub struct CanvasSurface {
    canvas: HtmlCanvasElement,
    ctx: CanvasRenderingContext2d,
}

impl CanvasSurface {
    /// # Errors
    ///
    /// [`VisualizerError::SurfaceUnavailable`] when the canvas has no 2D
    /// context, [`VisualizerError::Unsupported`] when asking for one throws.
    pub fn new(canvas: HtmlCanvasElement) -> VisualizerResult<Self> {
        let ctx = canvas
            .get_context("2d")
            .map_err(|e| VisualizerError::Unsupported(js_message(&e)))?
            .ok_or(VisualizerError::SurfaceUnavailable)?
            .dyn_into::<CanvasRenderingContext2d>()
            .map_err(|_| VisualizerError::SurfaceUnavailable)?;
        Ok(Self { canvas, ctx })
    }

    fn sync_size(&self) {
        let width = self.canvas.client_width().max(0) as u32;
        let height = self.canvas.client_height().max(0) as u32;
        if width > 0 && width != self.canvas.width() {
            self.canvas.set_width(width);
        }
        if height > 0 && height != self.canvas.height() {
            self.canvas.set_height(height);
        }
    }
}

fn css_color(c: Color32) -> String {
    format!("#{:02x}{:02x}{:02x}", c.r(), c.g(), c.b())
}

impl Surface for CanvasSurface {
    fn size(&self) -> Vec2 {
        vec2(self.canvas.width() as f32, self.canvas.height() as f32)
    }

    fn clear(&mut self) {
        self.sync_size();
        let size = self.size();
        self.ctx
            .clear_rect(0.0, 0.0, f64::from(size.x), f64::from(size.y));
    }

    fn fill_bars(&mut self, bars: &[Bar], gradient: &Gradient) {
        let height = f64::from(self.size().y);
        let fill = self.ctx.create_linear_gradient(0.0, height, 0.0, 0.0);
        for &(offset, color) in gradient.stops {
            let _ = fill.add_color_stop(offset, &css_color(color));
        }
        self.ctx.set_fill_style_canvas_gradient(&fill);
        for bar in bars {
            let r = bar.rect;
            self.ctx.fill_rect(
                f64::from(r.min.x),
                f64::from(r.min.y),
                f64::from(r.width()),
                f64::from(r.height()),
            );
        }
    }
}
