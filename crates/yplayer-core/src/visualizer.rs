//! Real-time spectrum bars for the playing media element.
//!
//! Each media handle gets at most one analysis graph for the lifetime of a
//! visualizer. The platform refuses to tap an element twice, so a handle's
//! graph is built once, and after teardown or a failed build the handle is
//! never tapped again.
//!
//! The draw loop is a chain of one-shot frame callbacks. Every chain carries a
//! [`CancelToken`] that is checked before pulling data and before
//! rescheduling, and callbacks only hold a `Weak` to the visualizer state, so
//! a callback that outlives its chain or the visualizer draws nothing.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use egui::Vec2;
use log::{debug, warn};

use crate::config::FFT_SIZE;
use crate::error::{VisualizerError, VisualizerResult};
use crate::spectrum::{layout_bars_into, Bar, Gradient};

/// Signal context + analyser + source tap for one media element
pub trait AnalysisGraph {
    fn bucket_count(&self) -> usize;

    /// Copy the latest magnitudes (0-255 per bucket) into `buffer`
    fn frequency_data(&self, buffer: &mut [u8]);

    /// Wake a context the host suspended before the first user gesture
    fn resume(&self) {}

    /// Release the tap, the analyser and the context
    fn close(&mut self);
}

pub trait AudioBackend {
    type Media: Clone + PartialEq;
    type Graph: AnalysisGraph;

    /// Build the graph and connect it onward to the output so audio stays audible.
    ///
    /// # Errors
    ///
    /// Any [`VisualizerError`]; the visualizer disables itself for `media`.
    fn create_graph(&self, media: &Self::Media, fft_size: u32) -> VisualizerResult<Self::Graph>;
}

pub trait Surface {
    fn size(&self) -> Vec2;
    fn clear(&mut self);
    fn fill_bars(&mut self, bars: &[Bar], gradient: &Gradient);
}

/// One-shot callbacks synchronised to display refresh
pub trait FrameScheduler {
    type Handle;

    /// # Errors
    ///
    /// [`VisualizerError::FrameCallback`] when the host cannot schedule frames.
    fn request_frame(&self, callback: Box<dyn FnOnce()>) -> VisualizerResult<Self::Handle>;

    fn cancel_frame(&self, handle: Self::Handle);
}

#[derive(Clone, Debug, Default)]
pub struct CancelToken(Rc<Cell<bool>>);

impl CancelToken {
    pub fn cancel(&self) {
        self.0.set(true);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.get()
    }
}

/// Per-handle lifecycle as seen from outside
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GraphState {
    Uninitialized,
    Ready,
    Disabled,
    Released,
}

enum Slot<G> {
    Ready(G),
    Disabled,
    Released,
}

impl<G> Slot<G> {
    fn state(&self) -> GraphState {
        match self {
            Slot::Ready(_) => GraphState::Ready,
            Slot::Disabled => GraphState::Disabled,
            Slot::Released => GraphState::Released,
        }
    }
}

struct Binding<M, G> {
    media: M,
    slot: Slot<G>,
}

struct FrameLoop<H> {
    token: CancelToken,
    pending: Option<H>,
}

struct Inner<B: AudioBackend, S: Surface, F: FrameScheduler> {
    backend: B,
    surface: Option<S>,
    scheduler: F,
    bindings: Vec<Binding<B::Media, B::Graph>>,
    active: Option<B::Media>,
    frame: Option<FrameLoop<F::Handle>>,
    buffer: Vec<u8>,
    bars: Vec<Bar>,
}

pub struct SpectrumVisualizer<B, S, F>
where
    B: AudioBackend + 'static,
    S: Surface + 'static,
    F: FrameScheduler + 'static,
{
    inner: Rc<RefCell<Inner<B, S, F>>>,
}

impl<B, S, F> SpectrumVisualizer<B, S, F>
where
    B: AudioBackend + 'static,
    S: Surface + 'static,
    F: FrameScheduler + 'static,
{
    /// `surface` is `None` when the host has nothing to draw on; every media
    /// handle then ends up disabled.
    pub fn new(backend: B, surface: Option<S>, scheduler: F) -> Self {
        Self {
            inner: Rc::new(RefCell::new(Inner {
                backend,
                surface,
                scheduler,
                bindings: Vec::new(),
                active: None,
                frame: None,
                buffer: Vec::new(),
                bars: Vec::new(),
            })),
        }
    }

    /// Reactive update with the current media handle and play flag.
    ///
    /// Moving away from a handle, including to `None`, releases its graph, and
    /// a released handle is never tapped again. Feeding `None` and then the
    /// same handle leaves that handle dark; hosts with a single long-lived
    /// element should keep feeding it with `playing == false` instead.
    pub fn update(&self, media: Option<&B::Media>, playing: bool) {
        let weak = Rc::downgrade(&self.inner);
        self.inner.borrow_mut().update(&weak, media, playing);
    }

    pub fn graph_state(&self, media: &B::Media) -> GraphState {
        self.inner
            .borrow()
            .binding(media)
            .map_or(GraphState::Uninitialized, |b| b.slot.state())
    }

    /// Whether a frame chain is live
    pub fn is_animating(&self) -> bool {
        self.inner.borrow().frame.is_some()
    }

    /// Cancel the frame chain and close every graph
    pub fn unmount(self) {
        drop(self);
    }
}

impl<B, S, F> Inner<B, S, F>
where
    B: AudioBackend + 'static,
    S: Surface + 'static,
    F: FrameScheduler + 'static,
{
    fn update(&mut self, this: &Weak<RefCell<Self>>, media: Option<&B::Media>, playing: bool) {
        if self.active.as_ref() != media {
            self.stop_loop();
            if let Some(old) = self.active.take() {
                self.release(&old);
            }
            self.active = media.cloned();
        }

        let Some(media) = media else {
            self.clear_surface();
            return;
        };
        if !self.ensure_graph(media) {
            return;
        }

        if playing {
            self.start_loop(this);
        } else {
            self.stop_loop();
            self.clear_surface();
        }
    }

    fn binding(&self, media: &B::Media) -> Option<&Binding<B::Media, B::Graph>> {
        self.bindings.iter().find(|b| &b.media == media)
    }

    fn binding_mut(&mut self, media: &B::Media) -> Option<&mut Binding<B::Media, B::Graph>> {
        self.bindings.iter_mut().find(|b| &b.media == media)
    }

    /// Returns whether `media` has a usable graph, building it on first sight
    fn ensure_graph(&mut self, media: &B::Media) -> bool {
        if let Some(binding) = self.binding(media) {
            return matches!(binding.slot, Slot::Ready(_));
        }

        let built = if self.surface.is_some() {
            self.backend.create_graph(media, FFT_SIZE)
        } else {
            Err(VisualizerError::SurfaceUnavailable)
        };
        let slot = match built {
            Ok(graph) => {
                debug!("Analysis graph ready with {} buckets", graph.bucket_count());
                self.buffer.clear();
                self.buffer.resize(graph.bucket_count(), 0);
                Slot::Ready(graph)
            }
            Err(e) => {
                warn!("Spectrum disabled for this media element: {e}");
                Slot::Disabled
            }
        };
        let ready = matches!(slot, Slot::Ready(_));
        self.bindings.push(Binding { media: media.clone(), slot });
        ready
    }

    fn release(&mut self, media: &B::Media) {
        if let Some(binding) = self.binding_mut(media) {
            if let Slot::Ready(graph) = &mut binding.slot {
                graph.close();
                binding.slot = Slot::Released;
                debug!("Analysis graph released");
            }
        }
    }

    /// Close the active graph after a scheduling failure; it is not retried
    fn disable_active(&mut self, err: &VisualizerError) {
        warn!("Spectrum disabled: {err}");
        self.stop_loop();
        let Some(active) = self.active.clone() else { return };
        if let Some(binding) = self.binding_mut(&active) {
            if let Slot::Ready(graph) = &mut binding.slot {
                graph.close();
            }
            binding.slot = Slot::Disabled;
        }
    }

    fn start_loop(&mut self, this: &Weak<RefCell<Self>>) {
        if self.frame.is_some() {
            return;
        }
        if let Some(active) = self.active.clone() {
            if let Some(Binding { slot: Slot::Ready(graph), .. }) = self.binding(&active) {
                graph.resume();
            }
        }
        let token = CancelToken::default();
        match self.request(this, &token) {
            Ok(handle) => {
                self.frame = Some(FrameLoop { token, pending: Some(handle) });
            }
            Err(e) => self.disable_active(&e),
        }
    }

    fn stop_loop(&mut self) {
        if let Some(frame) = self.frame.take() {
            frame.token.cancel();
            if let Some(handle) = frame.pending {
                self.scheduler.cancel_frame(handle);
            }
        }
    }

    fn request(&self, this: &Weak<RefCell<Self>>, token: &CancelToken) -> VisualizerResult<F::Handle> {
        let this = this.clone();
        let token = token.clone();
        self.scheduler
            .request_frame(Box::new(move || run_frame(&this, &token)))
    }

    fn clear_surface(&mut self) {
        if let Some(surface) = self.surface.as_mut() {
            surface.clear();
        }
    }

    fn draw_frame(&mut self) {
        let Inner { bindings, active, surface, buffer, bars, .. } = self;
        let Some(active) = active.as_ref() else { return };
        let Some(Binding { slot: Slot::Ready(graph), .. }) = bindings.iter().find(|b| &b.media == active) else {
            return;
        };
        let Some(surface) = surface.as_mut() else { return };

        graph.frequency_data(buffer);
        surface.clear();
        layout_bars_into(buffer, surface.size(), bars);
        surface.fill_bars(bars, &Gradient::BARS);
    }
}

fn run_frame<B, S, F>(this: &Weak<RefCell<Inner<B, S, F>>>, token: &CancelToken)
where
    B: AudioBackend + 'static,
    S: Surface + 'static,
    F: FrameScheduler + 'static,
{
    if token.is_cancelled() {
        return;
    }
    let Some(inner) = this.upgrade() else { return };
    let mut inner = inner.borrow_mut();
    if let Some(frame) = inner.frame.as_mut() {
        // This callback is the pending one; its handle is spent
        frame.pending = None;
    }

    inner.draw_frame();

    if token.is_cancelled() {
        return;
    }
    match inner.request(this, token) {
        Ok(handle) => {
            if let Some(frame) = inner.frame.as_mut() {
                frame.pending = Some(handle);
            }
        }
        Err(e) => inner.disable_active(&e),
    }
}

impl<B, S, F> Drop for Inner<B, S, F>
where
    B: AudioBackend,
    S: Surface,
    F: FrameScheduler,
{
    fn drop(&mut self) {
        if let Some(frame) = self.frame.take() {
            frame.token.cancel();
            if let Some(handle) = frame.pending {
                self.scheduler.cancel_frame(handle);
            }
        }
        for binding in &mut self.bindings {
            if let Slot::Ready(graph) = &mut binding.slot {
                graph.close();
                binding.slot = Slot::Released;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::{FakeBackend, FakeElement, ManualScheduler, RecordingSurface};

    type Viz = SpectrumVisualizer<FakeBackend, RecordingSurface, ManualScheduler>;

    fn visualizer() -> (Viz, FakeBackend, RecordingSurface, ManualScheduler) {
        let backend = FakeBackend::default();
        let surface = RecordingSurface::new(256.0, 100.0);
        let scheduler = ManualScheduler::default();
        let viz = SpectrumVisualizer::new(backend.clone(), Some(surface.clone()), scheduler.clone());
        (viz, backend, surface, scheduler)
    }

    const A: FakeElement = FakeElement(1);
    const B: FakeElement = FakeElement(2);

    #[test]
    fn paused_clears_and_schedules_nothing() {
        let (viz, backend, surface, scheduler) = visualizer();
        viz.update(Some(&A), false);
        assert_eq!(viz.graph_state(&A), GraphState::Ready);
        assert_eq!(backend.created(), 1);
        assert_eq!(surface.clears(), 1);
        assert_eq!(scheduler.pending(), 0);
        assert!(!viz.is_animating());
    }

    #[test]
    fn playing_runs_exactly_one_chain() {
        let (viz, _, surface, scheduler) = visualizer();
        viz.update(Some(&A), true);
        assert_eq!(scheduler.pending(), 1);

        // Repeated updates with the same inputs don't fork the chain
        viz.update(Some(&A), true);
        assert_eq!(scheduler.pending(), 1);

        for _ in 0..3 {
            assert_eq!(scheduler.run_frame(), 1);
            assert_eq!(scheduler.pending(), 1);
        }
        assert_eq!(surface.frames(), 3);
    }

    #[test]
    fn pausing_cancels_the_chain() {
        let (viz, _, surface, scheduler) = visualizer();
        viz.update(Some(&A), true);
        scheduler.run_frame();
        viz.update(Some(&A), false);
        assert_eq!(scheduler.pending(), 0);
        assert_eq!(scheduler.cancelled(), 1);

        let drawn = surface.frames();
        for _ in 0..3 {
            scheduler.run_frame();
        }
        assert_eq!(surface.frames(), drawn);
        assert!(!viz.is_animating());
    }

    #[test]
    fn stale_callback_after_pause_draws_nothing() {
        let (viz, _, surface, scheduler) = visualizer();
        scheduler.ignore_cancel();
        viz.update(Some(&A), true);
        viz.update(Some(&A), false);
        // The host failed to cancel: the callback still fires
        assert_eq!(scheduler.run_frame(), 1);
        assert_eq!(surface.frames(), 0);
        assert_eq!(scheduler.pending(), 0);
    }

    #[test]
    fn resuming_starts_a_fresh_chain() {
        let (viz, backend, surface, scheduler) = visualizer();
        viz.update(Some(&A), true);
        viz.update(Some(&A), false);
        viz.update(Some(&A), true);
        assert_eq!(scheduler.pending(), 1);
        scheduler.run_frame();
        assert_eq!(surface.frames(), 1);
        assert_eq!(backend.created(), 1);
        assert_eq!(backend.resumed(), 2);
    }

    #[test]
    fn frame_bars_follow_frequency_data() {
        let (viz, backend, surface, scheduler) = visualizer();
        let mut spectrum = vec![0u8; 128];
        spectrum[0] = 255;
        spectrum[1] = 51;
        backend.set_spectrum(&spectrum);

        viz.update(Some(&A), true);
        scheduler.run_frame();

        let bars = surface.last_bars();
        assert_eq!(bars.len(), 128);
        assert_eq!(bars[0].height, 100.0);
        assert_eq!(bars[1].height, (51.0 / 255.0) * 100.0);
        assert_eq!(bars[2].height, 0.0);
        assert_eq!(bars[0].slot_width, 256.0 / 128.0);
        // Cleared before painting
        assert_eq!(surface.clears(), 1);
    }

    #[test]
    fn second_tap_of_same_element_disables() {
        let (first, backend, _, _) = visualizer();
        first.update(Some(&A), true);

        let scheduler = ManualScheduler::default();
        let second = SpectrumVisualizer::new(
            backend.clone(),
            Some(RecordingSurface::new(10.0, 10.0)),
            scheduler.clone(),
        );
        second.update(Some(&A), true);
        assert_eq!(second.graph_state(&A), GraphState::Disabled);
        assert_eq!(scheduler.pending(), 0);
        assert!(!second.is_animating());
    }

    #[test]
    fn disabled_handle_is_never_retried() {
        let backend = FakeBackend::unsupported();
        let scheduler = ManualScheduler::default();
        let surface = RecordingSurface::new(10.0, 10.0);
        let viz = SpectrumVisualizer::new(backend.clone(), Some(surface.clone()), scheduler.clone());

        viz.update(Some(&A), true);
        viz.update(Some(&A), false);
        viz.update(Some(&A), true);
        assert_eq!(viz.graph_state(&A), GraphState::Disabled);
        assert_eq!(backend.attempts(), 1);
        assert_eq!(scheduler.pending(), 0);
        assert_eq!(surface.frames(), 0);
    }

    #[test]
    fn missing_surface_disables_without_tapping() {
        let backend = FakeBackend::default();
        let scheduler = ManualScheduler::default();
        let viz: Viz = SpectrumVisualizer::new(backend.clone(), None, scheduler.clone());
        viz.update(Some(&A), true);
        assert_eq!(viz.graph_state(&A), GraphState::Disabled);
        assert_eq!(backend.attempts(), 0);
        assert_eq!(scheduler.pending(), 0);
    }

    #[test]
    fn no_media_is_a_cleared_no_op() {
        let (viz, backend, surface, scheduler) = visualizer();
        viz.update(None, true);
        assert_eq!(backend.attempts(), 0);
        assert_eq!(scheduler.pending(), 0);
        assert_eq!(surface.clears(), 1);
    }

    #[test]
    fn switching_media_releases_the_old_graph() {
        let (viz, backend, _, scheduler) = visualizer();
        viz.update(Some(&A), true);
        viz.update(Some(&B), true);
        assert_eq!(viz.graph_state(&A), GraphState::Released);
        assert_eq!(viz.graph_state(&B), GraphState::Ready);
        assert_eq!(backend.closed(), vec![A.0]);
        assert_eq!(scheduler.pending(), 1);

        // A released element is not tapped again
        viz.update(Some(&A), true);
        assert_eq!(viz.graph_state(&A), GraphState::Released);
        assert_eq!(backend.attempts(), 2);
        assert_eq!(scheduler.pending(), 0);
    }

    #[test]
    fn media_returning_after_none_stays_released() {
        let (viz, backend, surface, scheduler) = visualizer();
        viz.update(Some(&A), true);
        viz.update(None, false);
        assert_eq!(viz.graph_state(&A), GraphState::Released);

        viz.update(Some(&A), true);
        assert_eq!(viz.graph_state(&A), GraphState::Released);
        assert_eq!(backend.attempts(), 1);
        assert_eq!(scheduler.pending(), 0);
        assert_eq!(surface.frames(), 0);
    }

    #[test]
    fn paused_handle_keeps_its_graph() {
        let (viz, backend, _, scheduler) = visualizer();
        viz.update(Some(&A), true);
        viz.update(Some(&A), false);
        viz.update(Some(&A), true);
        assert_eq!(viz.graph_state(&A), GraphState::Ready);
        assert!(backend.closed().is_empty());
        assert_eq!(scheduler.pending(), 1);
    }

    #[test]
    fn unmount_cancels_and_closes() {
        let (viz, backend, surface, scheduler) = visualizer();
        viz.update(Some(&A), true);
        scheduler.run_frame();
        viz.unmount();
        assert_eq!(scheduler.pending(), 0);
        assert_eq!(backend.closed(), vec![A.0]);

        let drawn = surface.frames();
        scheduler.run_frame();
        assert_eq!(surface.frames(), drawn);
    }

    #[test]
    fn stale_callback_after_unmount_draws_nothing() {
        let (viz, backend, surface, scheduler) = visualizer();
        scheduler.ignore_cancel();
        viz.update(Some(&A), true);
        drop(viz);
        assert_eq!(backend.closed(), vec![A.0]);
        assert_eq!(scheduler.run_frame(), 1);
        assert_eq!(surface.frames(), 0);
        assert_eq!(scheduler.pending(), 0);
    }

    #[test]
    fn frame_scheduling_failure_disables() {
        let (viz, backend, _, scheduler) = visualizer();
        scheduler.fail_requests();
        viz.update(Some(&A), true);
        assert_eq!(viz.graph_state(&A), GraphState::Disabled);
        assert_eq!(backend.closed(), vec![A.0]);
        assert!(!viz.is_animating());
    }

    #[test]
    fn cancel_token_is_shared() {
        let token = CancelToken::default();
        let clone = token.clone();
        assert!(!clone.is_cancelled());
        token.cancel();
        assert!(clone.is_cancelled());
    }
}
