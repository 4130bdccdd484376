use std::fmt;
use std::sync::Arc;

pub mod completion;
pub mod fetch;
pub mod observer;
pub mod thumbnail;

#[cfg(test)]
pub(crate) mod mock;

use crate::error::Result;
use completion::Pending;

/// Semantic playback state, decoupled from the platform's own enum
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum PlaybackState {
    #[default]
    Closed,
    Opened,
    Paused,
    Playing,
    Stopped,
    Changing,
}

impl PlaybackState {
    /// Total mapping from the platform status. Anything unrecognised is Closed.
    pub fn from_native(status: NativePlaybackStatus) -> Self {
        match status {
            NativePlaybackStatus::CLOSED => PlaybackState::Closed,
            NativePlaybackStatus::OPENED => PlaybackState::Opened,
            NativePlaybackStatus::STOPPED => PlaybackState::Stopped,
            NativePlaybackStatus::PAUSED => PlaybackState::Paused,
            NativePlaybackStatus::PLAYING => PlaybackState::Playing,
            NativePlaybackStatus::CHANGING => PlaybackState::Changing,
            _ => PlaybackState::Closed,
        }
    }
}

impl fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            PlaybackState::Closed => "Closed",
            PlaybackState::Opened => "Opened",
            PlaybackState::Paused => "Paused",
            PlaybackState::Playing => "Playing",
            PlaybackState::Stopped => "Stopped",
            PlaybackState::Changing => "Changing",
        };
        f.write_str(label)
    }
}

/// Raw playback status as the platform reports it (GSMTC numbering)
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NativePlaybackStatus(pub i32);

impl NativePlaybackStatus {
    pub const CLOSED: Self = Self(0);
    pub const OPENED: Self = Self(1);
    pub const CHANGING: Self = Self(2);
    pub const STOPPED: Self = Self(3);
    pub const PLAYING: Self = Self(4);
    pub const PAUSED: Self = Self(5);
}

/// Something that can produce the raw bytes of a thumbnail on demand
pub trait ThumbnailSource: Send + Sync {
    /// Streams reporting more than `max_bytes` are refused before anything is read
    fn read_bytes(&self, max_bytes: usize) -> Pending<Vec<u8>>;
}

/// Opaque, platform-owned thumbnail handle. Not resolved until asked for.
#[derive(Clone)]
pub struct ThumbnailRef(Arc<dyn ThumbnailSource>);

impl ThumbnailRef {
    pub fn new(source: impl ThumbnailSource + 'static) -> Self {
        Self(Arc::new(source))
    }

    pub fn read_bytes(&self, max_bytes: usize) -> Pending<Vec<u8>> {
        self.0.read_bytes(max_bytes)
    }
}

impl fmt::Debug for ThumbnailRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ThumbnailRef(..)")
    }
}

/// Media properties of a session, as fetched in one platform call
#[derive(Clone, Debug, Default)]
pub struct MediaProperties {
    pub title: String,
    pub artist: String,
    pub album: String,
    pub thumbnail: Option<ThumbnailRef>,
}

/// Immutable "now playing" snapshot. Replaced wholesale on every refresh.
#[derive(Clone, Debug, Default)]
pub struct MediaSnapshot {
    pub title: String,
    pub artist: String,
    pub album: String,
    pub playback_status: PlaybackState,
    pub thumbnail: Option<ThumbnailRef>,
}

impl MediaSnapshot {
    pub fn has_thumbnail(&self) -> bool {
        self.thumbnail.is_some()
    }
}

impl fmt::Display for MediaSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {} ({}) [{}]", self.artist, self.title, self.album, self.playback_status)
    }
}

/// Notifications raised by the observer
#[derive(Clone, Debug)]
pub enum MediaEvent {
    /// Raised on every successful refresh, whether or not anything changed
    SongChanged(Arc<MediaSnapshot>),
    /// Raised only when the semantic state differs from the last one seen
    PlaybackStateChanged(PlaybackState),
}

/// Listener registration. Detaching runs the platform unregister call once.
pub struct Subscription {
    detach: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub fn new(detach: impl FnOnce() + Send + 'static) -> Self {
        Self { detach: Some(Box::new(detach)) }
    }

    pub fn detach(mut self) {
        if let Some(detach) = self.detach.take() {
            detach();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(detach) = self.detach.take() {
            detach();
        }
    }
}

/// Callback invoked by the platform when something changed
pub type ChangeHandler = Arc<dyn Fn() + Send + Sync>;

/// One media-playing application, as seen through the platform session manager
pub trait MediaSession: Clone + Send + Sync + 'static {
    fn media_properties(&self) -> Pending<MediaProperties>;

    fn playback_status(&self) -> Result<NativePlaybackStatus>;

    /// Attach `handler` to both the media-properties and playback-info notifications
    fn subscribe(&self, handler: ChangeHandler) -> Result<Subscription>;
}

/// The platform's session manager
pub trait SessionManager: Send + Sync + Sized + 'static {
    type Session: MediaSession;

    fn request() -> Pending<Self>;

    /// `None` when no application is playing media
    fn current_session(&self) -> Result<Option<Self::Session>>;

    fn on_current_session_changed(&self, handler: ChangeHandler) -> Result<Subscription>;
}

// ==============================================================
// OS SELECTION FACTORY
// ==============================================================

#[cfg(target_os = "windows")]
mod windows;
#[cfg(target_os = "windows")]
pub type PlatformMedia = windows::WindowsSessionManager;

// Fallback for unsupported OS
#[cfg(not(target_os = "windows"))]
mod dummy;
#[cfg(not(target_os = "windows"))]
pub type PlatformMedia = dummy::DummySessionManager;
