use std::time::Duration;

use log::{debug, info, warn};
use web_time::Instant;

use crate::config::PlayerConfig;
use crate::error::{PlayerError, PlayerResult};
use crate::media::{MediaElement, MediaEvent, SourceStore};
use crate::playlist::{PlaylistState, Track};

/// Owns the playlist and transport state and drives one media element.
///
/// The play flag starts out optimistic when the user toggles playback and is
/// then reconciled from the element's own [`MediaEvent`]s.
pub struct PlaybackController<M: MediaElement, S: SourceStore> {
    media: M,
    sources: S,
    state: PlaylistState,
    resume_timeout: Duration,
    // Deadline for a track change that is waiting for CanPlay
    pending_resume: Option<Instant>,
}

impl<M: MediaElement, S: SourceStore> PlaybackController<M, S> {
    pub fn new(media: M, sources: S, config: &PlayerConfig) -> Self {
        media.set_volume(f64::from(config.initial_volume));
        Self {
            media,
            sources,
            state: PlaylistState::with_volume(config.initial_volume),
            resume_timeout: Duration::from_millis(config.resume_timeout_ms),
            pending_resume: None,
        }
    }

    pub fn state(&self) -> &PlaylistState {
        &self.state
    }

    pub fn current_track(&self) -> Option<&Track> {
        self.state.current_track()
    }

    pub fn is_playing(&self) -> bool {
        self.state.is_playing
    }

    pub fn is_resume_pending(&self) -> bool {
        self.pending_resume.is_some()
    }

    pub fn media(&self) -> &M {
        &self.media
    }

    /// The media element while it has a track loaded
    pub fn active_media(&self) -> Option<&M> {
        self.state.current_track().map(|_| &self.media)
    }

    pub fn track_label(&self) -> Option<String> {
        self.state.track_label()
    }

    /// Append one track per file, in input order. Returns how many were added.
    ///
    /// Uploading into an empty playlist selects the first new track without
    /// starting playback. Files the host cannot expose are skipped.
    pub fn upload<I>(&mut self, files: I) -> usize
    where
        I: IntoIterator<Item = S::File>,
    {
        let was_empty = self.state.is_empty();
        let mut added = 0;
        for file in files {
            let name = self.sources.file_name(&file);
            match self.sources.create_url(&file) {
                Ok(url) => {
                    let track = Track::new(name, url);
                    debug!("Added track {} ({})", track.name, track.id);
                    self.state.tracks.push(track);
                    added += 1;
                }
                Err(e) => warn!("Skipping {name}: {}", PlayerError::Source(e)),
            }
        }
        if added > 0 {
            info!("Uploaded {added} track(s), playlist now has {}", self.state.len());
        }
        if was_empty && added > 0 {
            self.state.current_index = Some(0);
            self.load_current();
        }
        added
    }

    pub fn toggle_play_pause(&mut self) {
        if self.state.current_track().is_none() {
            return;
        }
        self.pending_resume = None;
        if self.state.is_playing {
            self.media.pause();
            self.state.is_playing = false;
        } else {
            self.media.play();
            self.state.is_playing = true;
        }
    }

    pub fn next(&mut self) {
        if let Some(idx) = self.state.next_index() {
            self.change_track(idx);
        }
    }

    pub fn previous(&mut self) {
        if let Some(idx) = self.state.prev_index() {
            self.change_track(idx);
        }
    }

    /// Jump to `index` and resume once the new source is ready.
    ///
    /// # Errors
    ///
    /// [`PlayerError::TrackOutOfRange`] when `index` is past the end.
    pub fn select_track(&mut self, index: usize) -> PlayerResult<()> {
        let len = self.state.len();
        if index >= len {
            return Err(PlayerError::TrackOutOfRange { index, len });
        }
        self.change_track(index);
        Ok(())
    }

    pub fn seek(&mut self, seconds: f64) {
        self.state.current_time = seconds;
        self.media.set_current_time(seconds);
    }

    pub fn set_volume(&mut self, volume: f32) {
        self.state.volume = volume;
        self.media.set_volume(f64::from(volume));
    }

    /// Remove a track and release its URL.
    ///
    /// Removing the current track stops playback and selects its successor
    /// (or the new last track) without resuming.
    ///
    /// # Errors
    ///
    /// [`PlayerError::TrackOutOfRange`] when `index` is past the end.
    pub fn remove_track(&mut self, index: usize) -> PlayerResult<Track> {
        let len = self.state.len();
        if index >= len {
            return Err(PlayerError::TrackOutOfRange { index, len });
        }
        let track = self.state.tracks.remove(index);
        self.sources.revoke_url(&track.source);
        debug!("Removed track {} ({})", track.name, track.id);

        let remaining = self.state.len();
        match self.state.current_index {
            _ if remaining == 0 => self.reset_transport(),
            Some(current) if current == index => {
                self.pending_resume = None;
                self.media.pause();
                self.state.is_playing = false;
                self.state.current_index = Some(index.min(remaining - 1));
                self.load_current();
            }
            Some(current) if index < current => {
                self.state.current_index = Some(current - 1);
            }
            _ => {}
        }
        Ok(track)
    }

    /// Drop every track and release every URL
    pub fn clear(&mut self) {
        for track in self.state.tracks.drain(..) {
            self.sources.revoke_url(&track.source);
        }
        self.reset_transport();
    }

    /// Reconcile state with a notification from the media element
    pub fn handle_event(&mut self, event: MediaEvent) {
        match event {
            MediaEvent::Play | MediaEvent::Playing => self.state.is_playing = true,
            MediaEvent::Pause => self.state.is_playing = false,
            MediaEvent::CanPlay => {
                if self.pending_resume.take().is_some() {
                    debug!("Source ready, resuming");
                    self.resume();
                }
            }
            MediaEvent::TimeUpdate(t) => self.state.current_time = t,
            MediaEvent::DurationChange(d) => {
                if d.is_finite() {
                    self.state.duration = d;
                    if let Some(idx) = self.state.current_index {
                        if let Some(track) = self.state.tracks.get_mut(idx) {
                            track.duration = Some(d);
                        }
                    }
                }
            }
            MediaEvent::Ended => self.next(),
            // A rejection that lands after a track change belongs to the play
            // request the change superseded
            MediaEvent::PlayRejected if self.pending_resume.is_some() => {
                debug!("Ignoring rejection of a superseded play request");
            }
            MediaEvent::Error | MediaEvent::PlayRejected => {
                warn!("Playback failed ({event:?}), marking paused");
                self.pending_resume = None;
                self.state.is_playing = false;
            }
        }
    }

    /// Resume a pending track change whose ready notification never came
    pub fn tick(&mut self, now: Instant) {
        if let Some(deadline) = self.pending_resume {
            if now >= deadline {
                debug!("No ready signal within {:?}, resuming anyway", self.resume_timeout);
                self.pending_resume = None;
                self.resume();
            }
        }
    }

    fn change_track(&mut self, index: usize) {
        self.state.current_index = Some(index);
        self.media.pause();
        self.state.is_playing = false;
        self.load_current();
        self.pending_resume = Some(Instant::now() + self.resume_timeout);
    }

    fn load_current(&mut self) {
        self.state.current_time = 0.0;
        self.state.duration = 0.0;
        let current = self.state.current_index.and_then(|idx| self.state.tracks.get(idx));
        if let Some(track) = current {
            self.state.duration = track.duration.unwrap_or(0.0);
            self.media.set_source(&track.source);
        }
    }

    fn resume(&mut self) {
        if self.state.current_track().is_some() {
            self.media.play();
            self.state.is_playing = true;
        }
    }

    fn reset_transport(&mut self) {
        self.pending_resume = None;
        self.media.pause();
        self.media.clear_source();
        self.state.current_index = None;
        self.state.is_playing = false;
        self.state.current_time = 0.0;
        self.state.duration = 0.0;
    }
}

impl<M: MediaElement, S: SourceStore> Drop for PlaybackController<M, S> {
    fn drop(&mut self) {
        for track in &self.state.tracks {
            self.sources.revoke_url(&track.source);
        }
    }
}
