//! Host media facilities the controller drives.
//!
//! The browser implementations live in `yplayer-web`; tests use the fakes in
//! `crate::fakes`.

/// The audio-producing element. Calls are fire-and-forget: outcomes come back
/// as [`MediaEvent`]s.
pub trait MediaElement {
    fn set_source(&self, url: &str);
    fn clear_source(&self);
    fn play(&self);
    fn pause(&self);
    fn set_current_time(&self, seconds: f64);
    fn set_volume(&self, volume: f64);
}

/// Turns host file handles into playable URLs and releases them again
pub trait SourceStore {
    type File;

    fn file_name(&self, file: &Self::File) -> String;

    /// # Errors
    ///
    /// Fails when the host cannot expose the file as a URL.
    fn create_url(&self, file: &Self::File) -> Result<String, String>;

    fn revoke_url(&self, url: &str);
}

/// Notifications from the media element, the source of truth for transport state
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum MediaEvent {
    Play,
    Playing,
    Pause,
    /// Enough data buffered to start playback
    CanPlay,
    TimeUpdate(f64),
    DurationChange(f64),
    Ended,
    /// Decode or network failure
    Error,
    /// The play request was refused (autoplay policy, no source)
    PlayRejected,
}
