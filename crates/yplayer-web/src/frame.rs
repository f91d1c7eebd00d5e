use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use yplayer_core::{FrameScheduler, VisualizerError, VisualizerResult};

use crate::js_message;

/// `requestAnimationFrame` driven scheduler
pub struct RafScheduler {
    window: web_sys::Window,
}

/// A requested frame. Owns the JS closure, which is freed when the handle is
/// dropped after firing or after cancellation.
pub struct FrameHandle {
    id: i32,
    _callback: Closure<dyn FnMut()>,
}

impl RafScheduler {
    /// # Errors
    ///
    /// [`VisualizerError::FrameCallback`] outside a browser window.
    pub fn new() -> VisualizerResult<Self> {
        web_sys::window()
            .map(|window| Self { window })
            .ok_or_else(|| VisualizerError::FrameCallback("no window".into()))
    }
}

impl FrameScheduler for RafScheduler {
    type Handle = FrameHandle;

    fn request_frame(&self, callback: Box<dyn FnOnce()>) -> VisualizerResult<FrameHandle> {
        let mut callback = Some(callback);
        let closure = Closure::wrap(Box::new(move || {
            if let Some(cb) = callback.take() {
                cb();
            }
        }) as Box<dyn FnMut()>);
        let id = self
            .window
            .request_animation_frame(closure.as_ref().unchecked_ref())
            .map_err(|e| VisualizerError::FrameCallback(js_message(&e)))?;
        Ok(FrameHandle { id, _callback: closure })
    }

    fn cancel_frame(&self, handle: FrameHandle) {
        if let Err(e) = self.window.cancel_animation_frame(handle.id) {
            log::warn!("cancelAnimationFrame failed: {}", js_message(&e));
        }
    }
}
