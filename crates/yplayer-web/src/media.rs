use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::JsFuture;
use web_sys::{Document, DomException, File, HtmlAudioElement, HtmlMediaElement, Url};
use yplayer_core::{MediaElement, MediaEvent, SourceStore};

use crate::js_message;

const AUDIO_ELEMENT_ID: &str = "yplayer_audio";

type EventQueue = Rc<RefCell<VecDeque<MediaEvent>>>;

struct Listeners {
    target: HtmlAudioElement,
    entries: Vec<(&'static str, Closure<dyn FnMut()>)>,
}

impl Drop for Listeners {
    fn drop(&mut self) {
        for (name, closure) in &self.entries {
            let _ = self
                .target
                .remove_event_listener_with_callback(name, closure.as_ref().unchecked_ref());
        }
    }
}

/// The page's `<audio>` element plus a queue of its notifications.
///
/// Events are queued by DOM listeners and drained by the UI loop, so the
/// controller only ever sees them between frames.
#[derive(Clone)]
pub struct WebMedia {
    element: HtmlAudioElement,
    events: EventQueue,
    _listeners: Rc<Listeners>,
}

impl WebMedia {
    /// Find or create the audio element and subscribe to its events.
    ///
    /// # Errors
    ///
    /// Fails when the element with the audio id is not an `<audio>`, when the
    /// document has no body to attach a new one to, or when a listener cannot
    /// be registered.
    pub fn attach(document: &Document) -> Result<Self, JsValue> {
        let element = match document.get_element_by_id(AUDIO_ELEMENT_ID) {
            Some(el) => el.dyn_into::<HtmlAudioElement>()?,
            None => {
                let audio = document.create_element("audio")?.dyn_into::<HtmlAudioElement>()?;
                audio.set_id(AUDIO_ELEMENT_ID);
                document
                    .body()
                    .ok_or("document has no body")?
                    .append_child(&audio)?;
                audio
            }
        };

        let events: EventQueue = Rc::default();
        let mapping: [(&'static str, fn(&HtmlMediaElement) -> MediaEvent); 8] = [
            ("play", |_| MediaEvent::Play),
            ("playing", |_| MediaEvent::Playing),
            ("pause", |_| MediaEvent::Pause),
            ("canplay", |_| MediaEvent::CanPlay),
            ("timeupdate", |el| MediaEvent::TimeUpdate(el.current_time())),
            ("durationchange", |el| MediaEvent::DurationChange(el.duration())),
            ("ended", |_| MediaEvent::Ended),
            ("error", |_| MediaEvent::Error),
        ];

        let mut entries = Vec::with_capacity(mapping.len());
        for (name, to_event) in mapping {
            let el = element.clone();
            let queue = events.clone();
            let closure = Closure::wrap(Box::new(move || {
                queue.borrow_mut().push_back(to_event(&el));
            }) as Box<dyn FnMut()>);
            element.add_event_listener_with_callback(name, closure.as_ref().unchecked_ref())?;
            entries.push((name, closure));
        }

        Ok(Self {
            element: element.clone(),
            events,
            _listeners: Rc::new(Listeners { target: element, entries }),
        })
    }

    pub fn element(&self) -> &HtmlMediaElement {
        &self.element
    }

    pub fn drain_events(&self) -> Vec<MediaEvent> {
        self.events.borrow_mut().drain(..).collect()
    }
}

impl MediaElement for WebMedia {
    fn set_source(&self, url: &str) {
        self.element.set_src(url);
    }

    fn clear_source(&self) {
        let _ = self.element.remove_attribute("src");
        self.element.load();
    }

    fn play(&self) {
        // Autoplay policy rejections arrive on the promise, not as an event
        match self.element.play() {
            Ok(promise) => {
                let events = self.events.clone();
                wasm_bindgen_futures::spawn_local(async move {
                    if let Err(e) = JsFuture::from(promise).await {
                        if is_abort(&e) {
                            log::debug!("play() superseded by a newer load");
                            return;
                        }
                        log::warn!("play() rejected: {}", js_message(&e));
                        events.borrow_mut().push_back(MediaEvent::PlayRejected);
                    }
                });
            }
            Err(e) => {
                log::warn!("play() threw: {}", js_message(&e));
                self.events.borrow_mut().push_back(MediaEvent::PlayRejected);
            }
        }
    }

    fn pause(&self) {
        let _ = self.element.pause();
    }

    fn set_current_time(&self, seconds: f64) {
        self.element.set_current_time(seconds);
    }

    fn set_volume(&self, volume: f64) {
        self.element.set_volume(volume);
    }
}

/// A pause or source swap rejects pending `play()` promises with `AbortError`
fn is_abort(err: &JsValue) -> bool {
    err.dyn_ref::<DomException>()
        .is_some_and(|e| e.name() == "AbortError")
}

/// Object URLs over user-selected files
#[derive(Clone, Copy, Debug, Default)]
pub struct ObjectUrlStore;

impl SourceStore for ObjectUrlStore {
    type File = File;

    fn file_name(&self, file: &File) -> String {
        file.name()
    }

    fn create_url(&self, file: &File) -> Result<String, String> {
        Url::create_object_url_with_blob(file).map_err(|e| js_message(&e))
    }

    fn revoke_url(&self, url: &str) {
        if let Err(e) = Url::revoke_object_url(url) {
            log::warn!("Failed to revoke {url}: {}", js_message(&e));
        }
    }
}
