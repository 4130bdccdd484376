//! One-shot "what is playing right now" fetch
//!
//! `query_session` is the single place that talks to a session; the observer
//! uses it for every refresh and `get` uses it once.

use std::sync::OnceLock;

use tokio::runtime::{Handle, Runtime};

use super::{MediaSession, MediaSnapshot, PlatformMedia, PlaybackState, SessionManager};
use crate::error::{MediaError, Result};

/// Fetch properties and playback status of `session` and build a snapshot.
///
/// Nothing is returned unless both calls succeed, so callers never see a
/// half-filled snapshot.
pub(crate) async fn query_session<S: MediaSession>(session: &S) -> Result<MediaSnapshot> {
    let properties = session.media_properties().await?;
    let native = session.playback_status()?;

    Ok(MediaSnapshot {
        title: properties.title,
        artist: properties.artist,
        album: properties.album,
        playback_status: PlaybackState::from_native(native),
        thumbnail: properties.thumbnail,
    })
}

/// Query the current session once through an existing manager
pub async fn get_from<M: SessionManager>(manager: &M) -> Result<Option<MediaSnapshot>> {
    let Some(session) = manager.current_session()? else {
        tracing::debug!("[Media/Fetch] No current session");
        return Ok(None);
    };
    query_session(&session).await.map(Some)
}

/// Request a fresh session manager of type `M` and query it once.
///
/// Shares nothing with any running observer. Errors from the platform are
/// returned, not swallowed.
pub async fn get_with<M: SessionManager>() -> Result<Option<MediaSnapshot>> {
    let manager = M::request().await?;
    get_from(&manager).await
}

/// One-shot fetch against the OS media session manager
pub async fn get() -> Result<Option<MediaSnapshot>> {
    get_with::<PlatformMedia>().await
}

static BLOCKING_RUNTIME: OnceLock<Runtime> = OnceLock::new();

/// Synchronous wait helper over [`get_with`].
///
/// # Deadlock hazard
///
/// This parks the calling thread until the platform calls back. If the
/// calling thread is one the async machinery needs in order to resume, it
/// never will. Calls made from inside a tokio runtime are refused with
/// `MediaError::BlockingInAsyncContext`; other event loops (a UI thread
/// pumping the platform's messages, for instance) cannot be detected. Prefer
/// awaiting [`get`].
pub fn get_blocking_with<M: SessionManager>() -> Result<Option<MediaSnapshot>> {
    if Handle::try_current().is_ok() {
        return Err(MediaError::BlockingInAsyncContext);
    }

    let rt = match BLOCKING_RUNTIME.get() {
        Some(rt) => rt,
        None => {
            let built = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()?;
            // Another thread may have won the race; either runtime is fine
            let _ = BLOCKING_RUNTIME.set(built);
            BLOCKING_RUNTIME.get().ok_or(MediaError::Abandoned)?
        }
    };

    rt.block_on(get_with::<M>())
}

/// See [`get_blocking_with`] for the deadlock caveats.
pub fn get_blocking() -> Result<Option<MediaSnapshot>> {
    get_blocking_with::<PlatformMedia>()
}
