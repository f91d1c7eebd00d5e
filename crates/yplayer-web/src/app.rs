use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use eframe::egui::{self, Color32};
use log::warn;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{Document, Event, File, HtmlCanvasElement, HtmlInputElement};
use web_time::Instant;
use yplayer_core::{PlaybackController, PlayerConfig, PlaylistState, SpectrumVisualizer};

use crate::audio::WebAudioBackend;
use crate::canvas::CanvasSurface;
use crate::frame::RafScheduler;
use crate::media::{ObjectUrlStore, WebMedia};

const FILE_INPUT_ID: &str = "yplayer_file_input";
const SPECTRUM_CANVAS_ID: &str = "yplayer_spectrum";

type WebVisualizer = SpectrumVisualizer<WebAudioBackend, CanvasSurface, RafScheduler>;

/// Upload, transport and playlist glue around the controller
pub struct PlayerApp {
    controller: PlaybackController<WebMedia, ObjectUrlStore>,
    visualizer: Option<WebVisualizer>,
    // Files picked in the hidden input, drained on the next frame
    pending_files: Rc<RefCell<Vec<File>>>,
    file_input: HtmlInputElement,
    _on_files: Closure<dyn FnMut(Event)>,
    // Play flag last handed to the visualizer
    fed: Option<bool>,
}

impl PlayerApp {
    /// Attach to the page's audio element and file input.
    ///
    /// # Errors
    ///
    /// Any DOM failure while finding or creating those elements. A missing
    /// spectrum canvas only disables the visualizer.
    pub fn new(document: &Document, config: &PlayerConfig) -> Result<Self, JsValue> {
        let media = WebMedia::attach(document)?;
        let controller = PlaybackController::new(media, ObjectUrlStore, config);
        let pending_files = Rc::new(RefCell::new(Vec::new()));
        let (file_input, on_files) = create_file_input(document, &config.accept, &pending_files)?;

        Ok(Self {
            controller,
            visualizer: build_visualizer(document),
            pending_files,
            file_input,
            _on_files: on_files,
            fed: None,
        })
    }

    fn sync(&mut self) {
        for event in self.controller.media().drain_events() {
            self.controller.handle_event(event);
        }

        let files: Vec<File> = self.pending_files.borrow_mut().drain(..).collect();
        if !files.is_empty() {
            self.controller.upload(files);
        }

        self.controller.tick(Instant::now());

        // Tap the element once a track is loaded, then keep the tap through an
        // emptied playlist: a released element is never tapped again
        let playing = self.controller.is_playing();
        let armed = self.fed.is_some() || self.controller.active_media().is_some();
        if armed && self.fed != Some(playing) {
            if let Some(visualizer) = &self.visualizer {
                visualizer.update(Some(self.controller.media().element()), playing);
            }
            self.fed = Some(playing);
        }
    }

    fn draw_header(&self, ui: &mut egui::Ui) {
        ui.vertical_centered(|ui| {
            ui.heading("Y-Player");
            ui.label("A music player for your own audio files");
        });
        ui.separator();
        ui.horizontal(|ui| {
            if ui.button("➕ Add music files").clicked() {
                self.file_input.click();
            }
        });
        ui.label("Formats: MP3, WAV, FLAC, APE, OGG, M4A, AAC, OPUS");
        ui.add_space(8.0);
    }

    fn draw_now_playing(&self, ui: &mut egui::Ui) {
        let Some(track) = self.controller.current_track() else { return };
        ui.group(|ui| {
            ui.label(egui::RichText::new(format!("🎵 {}", track.name)).strong());
            if let Some(label) = self.controller.track_label() {
                ui.colored_label(Color32::GRAY, label);
            }
        });
    }

    fn draw_transport(&mut self, ui: &mut egui::Ui) {
        let state = self.controller.state();
        let (current_time, duration, volume, playing) =
            (state.current_time, state.duration, state.volume, state.is_playing);
        let mut progress = state.progress().clamp(0.0, 1.0);

        ui.horizontal(|ui| {
            ui.label(PlaylistState::format_time(current_time));
            let response = ui.add_enabled(
                duration > 0.0,
                egui::Slider::new(&mut progress, 0.0..=1.0)
                    .show_value(false)
                    .trailing_fill(true),
            );
            if response.changed() {
                self.controller.seek(f64::from(progress) * duration);
            }
            ui.label(PlaylistState::format_time(duration));
        });

        ui.horizontal(|ui| {
            if ui.button("⏮").clicked() {
                self.controller.previous();
            }
            if ui.button(if playing { "⏸" } else { "▶" }).clicked() {
                self.controller.toggle_play_pause();
            }
            if ui.button("⏭").clicked() {
                self.controller.next();
            }
        });

        ui.horizontal(|ui| {
            ui.label("🔊");
            let mut v = volume;
            if ui
                .add(egui::Slider::new(&mut v, 0.0..=1.0).step_by(0.01).show_value(false))
                .changed()
            {
                self.controller.set_volume(v);
            }
            ui.label(format!("{}%", (v * 100.0).round() as i32));
        });
    }

    fn draw_playlist(&mut self, ui: &mut egui::Ui) {
        ui.add_space(8.0);
        let mut clear = false;
        ui.horizontal(|ui| {
            ui.label(format!("Playlist ({})", self.controller.state().len()));
            clear = ui.small_button("Clear").clicked();
        });
        if clear {
            self.controller.clear();
            return;
        }

        let current = self.controller.state().current_index;
        let playing = self.controller.is_playing();
        let mut track_to_play: Option<usize> = None;
        let mut track_to_remove: Option<usize> = None;

        egui::ScrollArea::vertical()
            .max_height(240.0)
            .id_salt("playlist_scroll")
            .show(ui, |ui| {
                for (idx, track) in self.controller.state().tracks.iter().enumerate() {
                    let is_current = current == Some(idx);
                    ui.horizontal(|ui| {
                        ui.label(format!("{}", idx + 1));
                        if ui.selectable_label(is_current, track.name.as_str()).clicked() {
                            track_to_play = Some(idx);
                        }
                        if is_current && playing {
                            ui.colored_label(Color32::from_rgb(0xec, 0x48, 0x99), "♪");
                        }
                        if ui.small_button("✕").on_hover_text("Remove").clicked() {
                            track_to_remove = Some(idx);
                        }
                    });
                }
            });

        if let Some(idx) = track_to_play {
            if let Err(e) = self.controller.select_track(idx) {
                warn!("{e}");
            }
        }
        if let Some(idx) = track_to_remove {
            if let Err(e) = self.controller.remove_track(idx) {
                warn!("{e}");
            }
        }
    }
}

impl eframe::App for PlayerApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.sync();

        egui::CentralPanel::default().show(ctx, |ui| {
            self.draw_header(ui);
            if self.controller.state().is_empty() {
                return;
            }
            self.draw_now_playing(ui);
            self.draw_transport(ui);
            self.draw_playlist(ui);
        });

        // DOM events and file picks arrive outside egui's input loop
        if self.controller.is_playing() || self.controller.is_resume_pending() {
            ctx.request_repaint();
        } else {
            ctx.request_repaint_after(Duration::from_millis(200));
        }
    }
}

fn build_visualizer(document: &Document) -> Option<WebVisualizer> {
    let surface = document
        .get_element_by_id(SPECTRUM_CANVAS_ID)
        .and_then(|el| el.dyn_into::<HtmlCanvasElement>().ok())
        .and_then(|canvas| match CanvasSurface::new(canvas) {
            Ok(surface) => Some(surface),
            Err(e) => {
                warn!("No spectrum surface: {e}");
                None
            }
        });
    match RafScheduler::new() {
        Ok(scheduler) => Some(SpectrumVisualizer::new(WebAudioBackend, surface, scheduler)),
        Err(e) => {
            warn!("Spectrum visualizer unavailable: {e}");
            None
        }
    }
}

fn create_file_input(
    document: &Document,
    accept: &str,
    pending: &Rc<RefCell<Vec<File>>>,
) -> Result<(HtmlInputElement, Closure<dyn FnMut(Event)>), JsValue> {
    let input = match document.get_element_by_id(FILE_INPUT_ID) {
        Some(el) => el.dyn_into::<HtmlInputElement>()?,
        None => {
            let input = document.create_element("input")?.dyn_into::<HtmlInputElement>()?;
            input.set_type("file");
            input.set_id(FILE_INPUT_ID);
            input.style().set_property("display", "none")?;
            document
                .body()
                .ok_or("document has no body")?
                .append_child(&input)?;
            input
        }
    };
    input.set_accept(accept);
    input.set_multiple(true);

    let pending = pending.clone();
    let on_change = Closure::wrap(Box::new(move |event: Event| {
        let Some(input) = event
            .target()
            .and_then(|t| t.dyn_into::<HtmlInputElement>().ok())
        else {
            return;
        };
        if let Some(files) = input.files() {
            let mut pending = pending.borrow_mut();
            for i in 0..files.length() {
                if let Some(file) = files.get(i) {
                    pending.push(file);
                }
            }
        }
        input.set_value(""); // Reset for next use
    }) as Box<dyn FnMut(Event)>);
    input.set_onchange(Some(on_change.as_ref().unchecked_ref()));

    Ok((input, on_change))
}
