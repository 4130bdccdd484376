//! Now-playing observer
//!
//! Follows the platform's "current session", keeps the latest snapshot and
//! tells subscribers about song and playback-state changes.
//!
//! Platform callbacks arrive on platform threads. They only spawn work onto
//! the tokio runtime that was current when `initialize()` ran; the observer
//! creates no threads of its own.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError, RwLock, Weak};

use crossbeam_channel::{unbounded, Receiver, Sender};
use image::DynamicImage;
use tokio::runtime::Handle;

use super::fetch::query_session;
use super::{
    thumbnail, ChangeHandler, MediaEvent, MediaSession, MediaSnapshot, PlatformMedia,
    PlaybackState, SessionManager, Subscription,
};
use crate::config::Config;
use crate::error::{MediaError, Result};

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct NowPlayingObserver<M: SessionManager = PlatformMedia> {
    inner: Arc<Inner<M>>,
}

/// Filled in once by `initialize()`
struct Bound<M> {
    manager: M,
    runtime: Handle,
}

/// The one session currently listened to, plus its listener registration
struct Tracked<S> {
    session: Option<S>,
    listeners: Option<Subscription>,
}

struct Inner<M: SessionManager> {
    bound: OnceLock<Bound<M>>,
    manager_listener: Mutex<Option<Subscription>>,

    /// Set only once `initialize()` has gone all the way through
    initialized: AtomicBool,

    /// Session switches are serialized through this lock
    tracked: tokio::sync::Mutex<Tracked<M::Session>>,

    /// Bumped on every session switch; refreshes started under an older value are dropped
    generation: AtomicU64,

    /// Held from fetch to apply so refreshes land in the order they started
    refreshing: tokio::sync::Mutex<()>,

    snapshot: RwLock<Arc<MediaSnapshot>>,

    /// Last semantic state seen. Also serializes applying refresh results.
    last_status: Mutex<Option<PlaybackState>>,

    subscribers: Mutex<Vec<Sender<MediaEvent>>>,
    max_thumbnail_bytes: usize,
}

impl<M: SessionManager> NowPlayingObserver<M> {
    /// Create an idle observer. Nothing talks to the platform until `initialize()`.
    pub fn new(config: &Config) -> Self {
        Self {
            inner: Arc::new(Inner {
                bound: OnceLock::new(),
                manager_listener: Mutex::new(None),
                initialized: AtomicBool::new(false),
                tracked: tokio::sync::Mutex::new(Tracked { session: None, listeners: None }),
                generation: AtomicU64::new(0),
                refreshing: tokio::sync::Mutex::new(()),
                snapshot: RwLock::new(Arc::new(MediaSnapshot::default())),
                last_status: Mutex::new(None),
                subscribers: Mutex::new(Vec::new()),
                max_thumbnail_bytes: config.max_thumbnail_bytes,
            }),
        }
    }

    /// Receive every future `MediaEvent`. Subscribe before `initialize()` to
    /// see the events from the initial refresh.
    pub fn subscribe(&self) -> Receiver<MediaEvent> {
        let (tx, rx) = unbounded();
        lock(&self.inner.subscribers).push(tx);
        rx
    }

    /// Acquire the session manager, listen for session changes and pick up
    /// whatever is playing right now.
    ///
    /// Must be awaited from inside a tokio runtime; later callback work is
    /// spawned onto that runtime. A call that failed can be retried; steps
    /// that already succeeded (manager, session-changed listener) are reused.
    pub async fn initialize(&self) -> Result<()> {
        if self.inner.initialized.load(Ordering::SeqCst) {
            tracing::warn!("[Media/Observer] Already initialized");
            return Ok(());
        }

        let runtime = Handle::try_current().map_err(|_| MediaError::NoRuntime)?;
        if self.inner.bound.get().is_none() {
            let manager = M::request().await?;
            if self.inner.bound.set(Bound { manager, runtime }).is_err() {
                tracing::warn!("[Media/Observer] Lost initialization race, keeping the first manager");
            }
            tracing::info!("[Media/Observer] Session manager acquired");
        }
        let bound = self.inner.bound()?;

        {
            let mut listener = lock(&self.inner.manager_listener);
            if listener.is_none() {
                let handler = session_changed_handler(Arc::downgrade(&self.inner), bound.runtime.clone());
                *listener = Some(bound.manager.on_current_session_changed(handler)?);
            }
        }

        self.inner.follow_current_session().await?;
        self.inner.initialized.store(true, Ordering::SeqCst);
        Ok(())
    }

    /// Re-read the current session and rebind to it
    pub async fn on_current_session_changed(&self) {
        self.inner.on_current_session_changed().await;
    }

    /// Fetch a fresh snapshot for the current session. Failures keep the old one.
    pub async fn refresh(&self) {
        self.inner.refresh().await;
    }

    pub fn snapshot(&self) -> Arc<MediaSnapshot> {
        self.inner.snapshot()
    }

    pub fn title(&self) -> String {
        self.snapshot().title.clone()
    }

    pub fn artist(&self) -> String {
        self.snapshot().artist.clone()
    }

    pub fn album(&self) -> String {
        self.snapshot().album.clone()
    }

    pub fn playback_status(&self) -> PlaybackState {
        self.snapshot().playback_status
    }

    /// Decode the current thumbnail. `Ok(None)` when the session has none.
    pub async fn thumbnail(&self) -> Result<Option<DynamicImage>> {
        let Some(reference) = self.snapshot().thumbnail.clone() else {
            return Ok(None);
        };
        thumbnail::load(&reference, self.inner.max_thumbnail_bytes).await
    }
}

fn session_changed_handler<M: SessionManager>(weak: Weak<Inner<M>>, runtime: Handle) -> ChangeHandler {
    Arc::new(move || {
        if let Some(inner) = weak.upgrade() {
            runtime.spawn(async move { inner.on_current_session_changed().await });
        }
    })
}

fn properties_changed_handler<M: SessionManager>(weak: Weak<Inner<M>>, runtime: Handle) -> ChangeHandler {
    Arc::new(move || {
        if let Some(inner) = weak.upgrade() {
            runtime.spawn(async move { inner.refresh().await });
        }
    })
}

impl<M: SessionManager> Inner<M> {
    fn bound(&self) -> Result<&Bound<M>> {
        self.bound.get().ok_or(MediaError::NotInitialized)
    }

    fn snapshot(&self) -> Arc<MediaSnapshot> {
        self.snapshot.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    async fn on_current_session_changed(self: &Arc<Self>) {
        if let Err(e) = self.follow_current_session().await {
            tracing::warn!("[Media/Observer] Failed to follow session change: {}", e);
        }
    }

    async fn follow_current_session(self: &Arc<Self>) -> Result<()> {
        let next = self.bound()?.manager.current_session()?;
        self.switch_session(next).await
    }

    /// Detach from the old session, attach to `next`, then refresh.
    async fn switch_session(self: &Arc<Self>, next: Option<M::Session>) -> Result<()> {
        let runtime = self.bound()?.runtime.clone();

        let (session, generation) = {
            let mut tracked = self.tracked.lock().await;

            if let Some(listeners) = tracked.listeners.take() {
                listeners.detach();
            }
            let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
            tracked.session = next.clone();

            let Some(session) = next else {
                tracing::info!("[Media/Observer] No media session active");
                return Ok(());
            };

            let handler = properties_changed_handler(Arc::downgrade(self), runtime);
            tracked.listeners = Some(session.subscribe(handler)?);
            tracing::debug!("[Media/Observer] Listening to new session");
            (session, generation)
        };

        self.refresh_session(&session, generation).await;
        Ok(())
    }

    async fn refresh(&self) {
        let (session, generation) = {
            let tracked = self.tracked.lock().await;
            match &tracked.session {
                Some(session) => (session.clone(), self.generation.load(Ordering::SeqCst)),
                None => return,
            }
        };
        self.refresh_session(&session, generation).await;
    }

    async fn refresh_session(&self, session: &M::Session, generation: u64) {
        let _serial = self.refreshing.lock().await;

        let snapshot = match query_session(session).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::debug!("[Media/Observer] Refresh failed, keeping last snapshot: {}", e);
                return;
            }
        };

        let mut last_status = lock(&self.last_status);
        if self.generation.load(Ordering::SeqCst) != generation {
            tracing::debug!("[Media/Observer] Session changed mid-refresh, dropping result");
            return;
        }

        let status = snapshot.playback_status;
        if *last_status != Some(status) {
            *last_status = Some(status);
            tracing::debug!("[Media/Observer] Playback state: {}", status);
            self.emit(MediaEvent::PlaybackStateChanged(status));
        }

        let snapshot = Arc::new(snapshot);
        *self.snapshot.write().unwrap_or_else(PoisonError::into_inner) = snapshot.clone();
        tracing::info!("[Media/Observer] Update: {}", snapshot);
        self.emit(MediaEvent::SongChanged(snapshot));
    }

    fn emit(&self, event: MediaEvent) {
        // Receivers that hung up are forgotten
        lock(&self.subscribers).retain(|tx| tx.send(event.clone()).is_ok());
    }
}
