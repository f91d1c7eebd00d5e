use std::fmt;

use web_time::SystemTime;

/// Session-unique track identifier: file name, wall-clock millis and a random salt
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TrackId(String);

impl TrackId {
    pub fn generate(name: &str) -> Self {
        let millis = SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or_default();
        let salt: u64 = rand::random();
        Self(format!("{name}-{millis}-{salt:016x}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// Playlist track information
#[derive(Clone, Debug, PartialEq)]
pub struct Track {
    pub id: TrackId,
    pub name: String,
    pub source: String, // Playable URL, released through the SourceStore
    pub duration: Option<f64>,
}

impl Track {
    pub fn new(name: impl Into<String>, source: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            id: TrackId::generate(&name),
            name,
            source: source.into(),
            duration: None,
        }
    }
}

// Playlist and transport state
#[derive(Clone, Debug)]
pub struct PlaylistState {
    pub tracks: Vec<Track>,
    pub current_index: Option<usize>,
    pub is_playing: bool,
    pub current_time: f64,
    pub duration: f64,
    pub volume: f32,
}

impl Default for PlaylistState {
    fn default() -> Self {
        Self::with_volume(0.7)
    }
}

impl PlaylistState {
    pub fn with_volume(volume: f32) -> Self {
        Self {
            tracks: Vec::new(),
            current_index: None,
            is_playing: false,
            current_time: 0.0,
            duration: 0.0,
            volume,
        }
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn current_track(&self) -> Option<&Track> {
        self.current_index.and_then(|idx| self.tracks.get(idx))
    }

    /// Played share of the current track, 0.0 while the duration is unknown
    pub fn progress(&self) -> f32 {
        if self.duration > 0.0 {
            (self.current_time / self.duration) as f32
        } else {
            0.0
        }
    }

    /// Index after the current one, wrapping from the last track to the first
    pub fn next_index(&self) -> Option<usize> {
        let len = self.tracks.len();
        if len == 0 {
            return None;
        }
        match self.current_index {
            Some(idx) if idx + 1 < len => Some(idx + 1),
            _ => Some(0),
        }
    }

    /// Index before the current one, wrapping from the first track to the last
    pub fn prev_index(&self) -> Option<usize> {
        let len = self.tracks.len();
        if len == 0 {
            return None;
        }
        match self.current_index {
            Some(idx) if idx > 0 => Some(idx - 1),
            _ => Some(len - 1),
        }
    }

    /// "Track N of M" for the current track
    pub fn track_label(&self) -> Option<String> {
        self.current_index
            .filter(|&idx| idx < self.tracks.len())
            .map(|idx| format!("Track {} of {}", idx + 1, self.tracks.len()))
    }

    /// `m:ss`, or `0:00` while the duration is still unknown
    pub fn format_time(seconds: f64) -> String {
        if !seconds.is_finite() || seconds < 0.0 {
            return "0:00".to_string();
        }
        let mins = (seconds / 60.0) as u64;
        let secs = (seconds % 60.0) as u64;
        format!("{mins}:{secs:02}")
    }
}
