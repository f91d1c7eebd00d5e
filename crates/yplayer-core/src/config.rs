use egui::Color32;
use serde::{Deserialize, Serialize};

use crate::error::PlayerResult;

/// Analysis window handed to the analyser node. Yields `FFT_SIZE / 2` buckets.
pub const FFT_SIZE: u32 = 256;

/// Number of frequency buckets the analyser reports each frame
pub const BUCKET_COUNT: usize = (FFT_SIZE / 2) as usize;

/// Share of each bar slot that is painted; the rest is the gap
pub const BAR_FILL_RATIO: f32 = 0.8;

/// Vertical bar gradient, bottom to top: blue, purple, pink
pub const GRADIENT_STOPS: [(f32, Color32); 3] = [
    (0.0, Color32::from_rgb(0x3b, 0x82, 0xf6)),
    (0.5, Color32::from_rgb(0x8b, 0x5c, 0xf6)),
    (1.0, Color32::from_rgb(0xec, 0x48, 0x99)),
];

/// Player settings a host may override at startup.
///
/// Missing fields fall back to their defaults, so `{}` is a valid config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// Volume applied to the media element before the first track loads
    pub initial_volume: f32,
    /// Upper bound on how long a track change waits for the new source to
    /// report it can play before resuming anyway
    pub resume_timeout_ms: u64,
    /// `accept` attribute for the upload input. Audio types plus extensions
    /// browsers don't map to an audio content type.
    pub accept: String,
    /// Console log level (`error`, `warn`, `info`, `debug`, `trace`)
    pub log_level: String,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            initial_volume: 0.7,
            resume_timeout_ms: 100,
            accept: "audio/*,.flac,.ape".to_string(),
            log_level: "info".to_string(),
        }
    }
}

impl PlayerConfig {
    /// Parse a JSON config blob.
    ///
    /// # Errors
    ///
    /// Returns [`crate::PlayerError::Config`] when the blob is not valid JSON
    /// or a field has the wrong type.
    pub fn from_json(json: &str) -> PlayerResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Log level parsed from `log_level`, `Info` when unrecognised
    pub fn level(&self) -> log::Level {
        self.log_level.parse().unwrap_or(log::Level::Info)
    }
}
