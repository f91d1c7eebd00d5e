//! In-memory stand-ins for the browser, shared by the unit tests

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use egui::{vec2, Vec2};

use crate::error::{VisualizerError, VisualizerResult};
use crate::media::{MediaElement, SourceStore};
use crate::spectrum::{Bar, Gradient};
use crate::visualizer::{AnalysisGraph, AudioBackend, FrameScheduler, Surface};

#[derive(Clone, Debug, PartialEq)]
pub enum MediaCall {
    SetSource(String),
    ClearSource,
    Play,
    Pause,
    SetCurrentTime(f64),
    SetVolume(f64),
}

#[derive(Clone, Default)]
pub struct FakeMedia {
    calls: Rc<RefCell<Vec<MediaCall>>>,
}

impl FakeMedia {
    pub fn take_calls(&self) -> Vec<MediaCall> {
        std::mem::take(&mut *self.calls.borrow_mut())
    }

    fn record(&self, call: MediaCall) {
        self.calls.borrow_mut().push(call);
    }
}

impl MediaElement for FakeMedia {
    fn set_source(&self, url: &str) {
        self.record(MediaCall::SetSource(url.to_string()));
    }
    fn clear_source(&self) {
        self.record(MediaCall::ClearSource);
    }
    fn play(&self) {
        self.record(MediaCall::Play);
    }
    fn pause(&self) {
        self.record(MediaCall::Pause);
    }
    fn set_current_time(&self, seconds: f64) {
        self.record(MediaCall::SetCurrentTime(seconds));
    }
    fn set_volume(&self, volume: f64) {
        self.record(MediaCall::SetVolume(volume));
    }
}

pub struct FakeFile {
    name: String,
    fail: bool,
}

impl FakeFile {
    pub fn new(name: &str) -> Self {
        Self { name: name.to_string(), fail: false }
    }

    pub fn failing(name: &str) -> Self {
        Self { name: name.to_string(), fail: true }
    }
}

#[derive(Clone, Default)]
pub struct FakeSources {
    next: Rc<Cell<usize>>,
    revoked: Rc<RefCell<Vec<String>>>,
}

impl FakeSources {
    pub fn revoked(&self) -> Vec<String> {
        self.revoked.borrow().clone()
    }
}

impl SourceStore for FakeSources {
    type File = FakeFile;

    fn file_name(&self, file: &FakeFile) -> String {
        file.name.clone()
    }

    fn create_url(&self, file: &FakeFile) -> Result<String, String> {
        if file.fail {
            return Err("unreadable".to_string());
        }
        let n = self.next.get();
        self.next.set(n + 1);
        Ok(format!("blob:fake/{n}"))
    }

    fn revoke_url(&self, url: &str) {
        self.revoked.borrow_mut().push(url.to_string());
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FakeElement(pub u32);

#[derive(Default)]
struct AudioLog {
    attempts: usize,
    created: usize,
    resumed: usize,
    tapped: Vec<u32>,
    closed: Vec<u32>,
    spectrum: Vec<u8>,
}

/// Audio backend that enforces the one-tap-per-element rule across every
/// visualizer sharing it
#[derive(Clone, Default)]
pub struct FakeBackend {
    log: Rc<RefCell<AudioLog>>,
    unsupported: bool,
}

impl FakeBackend {
    pub fn unsupported() -> Self {
        Self { unsupported: true, ..Self::default() }
    }

    pub fn set_spectrum(&self, data: &[u8]) {
        self.log.borrow_mut().spectrum = data.to_vec();
    }

    pub fn attempts(&self) -> usize {
        self.log.borrow().attempts
    }

    pub fn created(&self) -> usize {
        self.log.borrow().created
    }

    pub fn resumed(&self) -> usize {
        self.log.borrow().resumed
    }

    pub fn closed(&self) -> Vec<u32> {
        self.log.borrow().closed.clone()
    }
}

pub struct FakeGraph {
    element: u32,
    buckets: usize,
    log: Rc<RefCell<AudioLog>>,
}

impl AnalysisGraph for FakeGraph {
    fn bucket_count(&self) -> usize {
        self.buckets
    }

    fn frequency_data(&self, buffer: &mut [u8]) {
        let log = self.log.borrow();
        buffer.fill(0);
        for (dst, src) in buffer.iter_mut().zip(&log.spectrum) {
            *dst = *src;
        }
    }

    fn resume(&self) {
        self.log.borrow_mut().resumed += 1;
    }

    fn close(&mut self) {
        self.log.borrow_mut().closed.push(self.element);
    }
}

impl AudioBackend for FakeBackend {
    type Media = FakeElement;
    type Graph = FakeGraph;

    fn create_graph(&self, media: &FakeElement, fft_size: u32) -> VisualizerResult<FakeGraph> {
        let mut log = self.log.borrow_mut();
        log.attempts += 1;
        if self.unsupported {
            return Err(VisualizerError::Unsupported("no AudioContext".into()));
        }
        if log.tapped.contains(&media.0) {
            return Err(VisualizerError::AlreadyTapped(format!("element {}", media.0)));
        }
        log.tapped.push(media.0);
        log.created += 1;
        Ok(FakeGraph {
            element: media.0,
            buckets: (fft_size / 2) as usize,
            log: self.log.clone(),
        })
    }
}

#[derive(Default)]
struct SurfaceLog {
    clears: usize,
    frames: Vec<Vec<Bar>>,
}

#[derive(Clone)]
pub struct RecordingSurface {
    size: Vec2,
    log: Rc<RefCell<SurfaceLog>>,
}

impl RecordingSurface {
    pub fn new(width: f32, height: f32) -> Self {
        Self { size: vec2(width, height), log: Rc::default() }
    }

    pub fn clears(&self) -> usize {
        self.log.borrow().clears
    }

    pub fn frames(&self) -> usize {
        self.log.borrow().frames.len()
    }

    pub fn last_bars(&self) -> Vec<Bar> {
        self.log.borrow().frames.last().cloned().unwrap_or_default()
    }
}

impl Surface for RecordingSurface {
    fn size(&self) -> Vec2 {
        self.size
    }

    fn clear(&mut self) {
        self.log.borrow_mut().clears += 1;
    }

    fn fill_bars(&mut self, bars: &[Bar], _gradient: &Gradient) {
        self.log.borrow_mut().frames.push(bars.to_vec());
    }
}

#[derive(Default)]
struct FrameQueue {
    next_id: u64,
    queue: Vec<(u64, Box<dyn FnOnce()>)>,
    cancelled: usize,
    ignore_cancel: bool,
    fail: bool,
}

/// Frame scheduler the test advances by hand
#[derive(Clone, Default)]
pub struct ManualScheduler {
    state: Rc<RefCell<FrameQueue>>,
}

impl ManualScheduler {
    /// Fire every callback queued so far; returns how many ran
    pub fn run_frame(&self) -> usize {
        let batch = std::mem::take(&mut self.state.borrow_mut().queue);
        let count = batch.len();
        for (_, callback) in batch {
            callback();
        }
        count
    }

    pub fn pending(&self) -> usize {
        self.state.borrow().queue.len()
    }

    pub fn cancelled(&self) -> usize {
        self.state.borrow().cancelled
    }

    /// Simulate a callback already in flight when cancellation happens
    pub fn ignore_cancel(&self) {
        self.state.borrow_mut().ignore_cancel = true;
    }

    pub fn fail_requests(&self) {
        self.state.borrow_mut().fail = true;
    }
}

impl FrameScheduler for ManualScheduler {
    type Handle = u64;

    fn request_frame(&self, callback: Box<dyn FnOnce()>) -> VisualizerResult<u64> {
        let mut state = self.state.borrow_mut();
        if state.fail {
            return Err(VisualizerError::FrameCallback("no requestAnimationFrame".into()));
        }
        let id = state.next_id;
        state.next_id += 1;
        state.queue.push((id, callback));
        Ok(id)
    }

    fn cancel_frame(&self, handle: u64) {
        let mut state = self.state.borrow_mut();
        state.cancelled += 1;
        if !state.ignore_cancel {
            state.queue.retain(|(id, _)| *id != handle);
        }
    }
}
