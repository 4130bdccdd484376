use super::completion::Pending;
use super::{ChangeHandler, MediaProperties, MediaSession, NativePlaybackStatus, SessionManager, Subscription};
use crate::error::{MediaError, Result};

/// Session manager for OSes without a supported media session API.
/// Requesting it always fails with `MediaError::Unsupported`.
pub struct DummySessionManager;

#[derive(Clone)]
pub struct DummySession;

impl MediaSession for DummySession {
    fn media_properties(&self) -> Pending<MediaProperties> {
        Pending::ready(Err(MediaError::Unsupported))
    }

    fn playback_status(&self) -> Result<NativePlaybackStatus> {
        Err(MediaError::Unsupported)
    }

    fn subscribe(&self, _handler: ChangeHandler) -> Result<Subscription> {
        Err(MediaError::Unsupported)
    }
}

impl SessionManager for DummySessionManager {
    type Session = DummySession;

    fn request() -> Pending<Self> {
        tracing::warn!("[Media/Dummy] Media sessions are not supported on this OS");
        Pending::ready(Err(MediaError::Unsupported))
    }

    fn current_session(&self) -> Result<Option<DummySession>> {
        Ok(None)
    }

    fn on_current_session_changed(&self, _handler: ChangeHandler) -> Result<Subscription> {
        Err(MediaError::Unsupported)
    }
}
