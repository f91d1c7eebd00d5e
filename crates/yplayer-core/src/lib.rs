//! Host-agnostic core of Y-Player.
//!
//! [`PlaybackController`] owns the playlist and transport state and drives a
//! [`MediaElement`]. [`SpectrumVisualizer`] taps that element through an
//! [`AudioBackend`] and paints frequency bars onto a [`Surface`] once per
//! display frame. Browser implementations of these traits live in
//! `yplayer-web`.

mod config;
mod controller;
mod error;
mod media;
mod playlist;
mod spectrum;
mod visualizer;

#[cfg(test)]
mod fakes;

pub use config::{PlayerConfig, BAR_FILL_RATIO, BUCKET_COUNT, FFT_SIZE, GRADIENT_STOPS};
pub use controller::PlaybackController;
pub use error::{PlayerError, PlayerResult, VisualizerError, VisualizerResult};
pub use media::{MediaElement, MediaEvent, SourceStore};
pub use playlist::{PlaylistState, Track, TrackId};
pub use spectrum::{layout_bars_into, Bar, Gradient};
pub use visualizer::{
    AnalysisGraph, AudioBackend, CancelToken, FrameScheduler, GraphState, SpectrumVisualizer,
    Surface,
};
