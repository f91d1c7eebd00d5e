//! Browser front end: web-sys implementations of the core traits and the egui shell.
#![cfg(target_arch = "wasm32")]

use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use yplayer_core::PlayerConfig;

mod app;
mod audio;
mod canvas;
mod frame;
mod media;

pub use app::PlayerApp;
pub use audio::{WebAnalysisGraph, WebAudioBackend};
pub use canvas::CanvasSurface;
pub use frame::{FrameHandle, RafScheduler};
pub use media::{ObjectUrlStore, WebMedia};

const APP_CANVAS_ID: &str = "yplayer_canvas";

pub(crate) fn js_message(err: &JsValue) -> String {
    err.as_string().unwrap_or_else(|| format!("{err:?}"))
}

/// Read an optional JSON config from the app canvas' `data-config` attribute
fn read_config(canvas: &web_sys::HtmlCanvasElement) -> Result<PlayerConfig, JsValue> {
    match canvas.get_attribute("data-config") {
        Some(json) => PlayerConfig::from_json(&json).map_err(|e| JsValue::from_str(&e.to_string())),
        None => Ok(PlayerConfig::default()),
    }
}

/// WASM entry point
///
/// # Errors
///
/// Fails without a window or document, without the `yplayer_canvas` canvas,
/// on a malformed `data-config` attribute, or when the player cannot attach
/// to the DOM.
#[wasm_bindgen(start)]
pub fn start() -> Result<(), JsValue> {
    console_error_panic_hook::set_once();

    let document = web_sys::window()
        .ok_or("no global window exists")?
        .document()
        .ok_or("should have a document on window")?;

    let canvas = document
        .get_element_by_id(APP_CANVAS_ID)
        .ok_or("no canvas element with id 'yplayer_canvas'")?
        .dyn_into::<web_sys::HtmlCanvasElement>()?;

    let config = read_config(&canvas)?;
    // A second init (hot reload) keeps the first logger
    let _ = console_log::init_with_level(config.level());
    log::info!("Starting Y-Player");

    let app = PlayerApp::new(&document, &config)?;

    wasm_bindgen_futures::spawn_local(async move {
        let web_options = eframe::WebOptions::default();
        let started = eframe::WebRunner::new()
            .start(canvas, web_options, Box::new(|_cc| Ok(Box::new(app))))
            .await;
        if let Err(e) = started {
            log::error!("Failed to start eframe: {}", js_message(&e));
        }
    });

    Ok(())
}
