//! Error types for the player and the visualizer

use thiserror::Error;

/// Errors raised by playlist and transport operations
#[derive(Error, Debug)]
pub enum PlayerError {
    /// A track index outside the current playlist
    #[error("Track index {index} out of range (playlist has {len} tracks)")]
    TrackOutOfRange { index: usize, len: usize },

    /// The host could not produce a playable URL for a file
    #[error("Failed to create playable source: {0}")]
    Source(String),

    /// Configuration blob could not be parsed
    #[error("Invalid player config: {0}")]
    Config(#[from] serde_json::Error),
}

/// Errors raised while building or driving an analysis graph.
///
/// None of these reach the user. The visualizer logs them and disables
/// itself for the media handle involved.
#[derive(Error, Debug)]
pub enum VisualizerError {
    /// No drawing surface to render onto
    #[error("Drawing surface unavailable")]
    SurfaceUnavailable,

    /// The host has no real-time audio graph
    #[error("Audio analysis unsupported: {0}")]
    Unsupported(String),

    /// The media element already feeds another graph
    #[error("Media element already tapped: {0}")]
    AlreadyTapped(String),

    /// Any other failure while wiring the graph
    #[error("Failed to build analysis graph: {0}")]
    Graph(String),

    /// The host refused to schedule a frame callback
    #[error("Frame callback unavailable: {0}")]
    FrameCallback(String),
}

pub type PlayerResult<T> = Result<T, PlayerError>;
pub type VisualizerResult<T> = Result<T, VisualizerError>;
