//! Scripted in-memory platform used by the unit tests.
//!
//! Every attach/detach/fetch is written to a shared `EventLog` so tests can
//! assert on ordering. Completions are delivered from a spawned thread, the
//! same way the real platform calls back from its own threads.

use std::cell::RefCell;
use std::sync::{mpsc, Arc, Mutex};
use std::thread;

use super::completion::{from_callback, Pending};
use super::thumbnail::checked_stream_len;
use super::{
    ChangeHandler, MediaProperties, MediaSession, NativePlaybackStatus, SessionManager,
    Subscription, ThumbnailRef, ThumbnailSource,
};
use crate::error::{MediaError, Result};

#[derive(Clone, Default)]
pub struct EventLog(Arc<Mutex<Vec<String>>>);

impl EventLog {
    pub fn push(&self, entry: impl Into<String>) {
        self.0.lock().unwrap().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    pub fn count(&self, entry: &str) -> usize {
        self.0.lock().unwrap().iter().filter(|e| *e == entry).count()
    }

    pub fn clear(&self) {
        self.0.lock().unwrap().clear();
    }
}

fn deliver<T: Send + 'static>(result: Result<T>) -> Pending<T> {
    from_callback(move |done| {
        thread::spawn(move || {
            done.complete(result);
        });
    })
}

/// Holds back one `media_properties` completion until released
pub struct FetchGate(mpsc::Sender<()>);

impl FetchGate {
    pub fn release(self) {
        let _ = self.0.send(());
    }
}

struct SessionState {
    properties: MediaProperties,
    status: NativePlaybackStatus,
    failing: bool,
    handler: Option<ChangeHandler>,
    gate: Option<mpsc::Receiver<()>>,
}

#[derive(Clone)]
pub struct MockSession {
    pub name: &'static str,
    state: Arc<Mutex<SessionState>>,
    log: EventLog,
}

impl MockSession {
    pub fn new(name: &'static str, log: &EventLog) -> Self {
        Self {
            name,
            state: Arc::new(Mutex::new(SessionState {
                properties: MediaProperties::default(),
                status: NativePlaybackStatus::PLAYING,
                failing: false,
                handler: None,
                gate: None,
            })),
            log: log.clone(),
        }
    }

    pub fn set_track(&self, title: &str, artist: &str, album: &str) {
        let mut state = self.state.lock().unwrap();
        state.properties.title = title.to_string();
        state.properties.artist = artist.to_string();
        state.properties.album = album.to_string();
    }

    pub fn set_status(&self, status: NativePlaybackStatus) {
        self.state.lock().unwrap().status = status;
    }

    pub fn set_thumbnail(&self, thumbnail: Option<ThumbnailRef>) {
        self.state.lock().unwrap().properties.thumbnail = thumbnail;
    }

    pub fn set_failing(&self, failing: bool) {
        self.state.lock().unwrap().failing = failing;
    }

    /// The next properties fetch captures its result immediately but only completes once released
    pub fn hold_next_fetch(&self) -> FetchGate {
        let (tx, rx) = mpsc::channel();
        self.state.lock().unwrap().gate = Some(rx);
        FetchGate(tx)
    }

    pub fn is_attached(&self) -> bool {
        self.state.lock().unwrap().handler.is_some()
    }

    /// Simulate the platform raising MediaPropertiesChanged / PlaybackInfoChanged
    pub fn fire(&self) {
        let handler = self.state.lock().unwrap().handler.clone();
        if let Some(handler) = handler {
            handler();
        }
    }
}

impl MediaSession for MockSession {
    fn media_properties(&self) -> Pending<MediaProperties> {
        self.log.push(format!("fetch:{}", self.name));
        let mut state = self.state.lock().unwrap();
        let result = if state.failing {
            Err(MediaError::Platform(format!("{} closed", self.name)))
        } else {
            Ok(state.properties.clone())
        };
        match state.gate.take() {
            Some(gate) => from_callback(move |done| {
                thread::spawn(move || {
                    let _ = gate.recv();
                    done.complete(result);
                });
            }),
            None => deliver(result),
        }
    }

    fn playback_status(&self) -> Result<NativePlaybackStatus> {
        let state = self.state.lock().unwrap();
        if state.failing {
            Err(MediaError::Platform(format!("{} closed", self.name)))
        } else {
            Ok(state.status)
        }
    }

    fn subscribe(&self, handler: ChangeHandler) -> Result<Subscription> {
        self.log.push(format!("attach:{}", self.name));
        self.state.lock().unwrap().handler = Some(handler);

        let state = self.state.clone();
        let log = self.log.clone();
        let name = self.name;
        Ok(Subscription::new(move || {
            log.push(format!("detach:{}", name));
            state.lock().unwrap().handler = None;
        }))
    }
}

#[derive(Default)]
struct ManagerState {
    current: Option<MockSession>,
    fail_current: bool,
    handler: Option<ChangeHandler>,
}

#[derive(Clone, Default)]
pub struct MockManager {
    state: Arc<Mutex<ManagerState>>,
    pub log: EventLog,
}

thread_local! {
    static NEXT_MANAGER: RefCell<Option<Result<MockManager>>> = const { RefCell::new(None) };
}

impl MockManager {
    pub fn new(log: &EventLog) -> Self {
        Self { state: Arc::default(), log: log.clone() }
    }

    /// Queue the value the next `MockManager::request()` on this thread resolves to
    pub fn install(next: Result<MockManager>) {
        NEXT_MANAGER.with(|slot| *slot.borrow_mut() = Some(next));
    }

    pub fn set_current(&self, session: Option<MockSession>) {
        self.state.lock().unwrap().current = session;
    }

    pub fn set_fail_current(&self, fail: bool) {
        self.state.lock().unwrap().fail_current = fail;
    }

    pub fn has_session_listener(&self) -> bool {
        self.state.lock().unwrap().handler.is_some()
    }

    /// Simulate the platform raising CurrentSessionChanged
    pub fn fire_session_changed(&self) {
        let handler = self.state.lock().unwrap().handler.clone();
        if let Some(handler) = handler {
            handler();
        }
    }
}

impl SessionManager for MockManager {
    type Session = MockSession;

    fn request() -> Pending<Self> {
        let next = NEXT_MANAGER.with(|slot| slot.borrow_mut().take());
        deliver(next.unwrap_or(Err(MediaError::Unsupported)))
    }

    fn current_session(&self) -> Result<Option<MockSession>> {
        let state = self.state.lock().unwrap();
        if state.fail_current {
            return Err(MediaError::Platform("GetCurrentSession failed".into()));
        }
        Ok(state.current.clone())
    }

    fn on_current_session_changed(&self, handler: ChangeHandler) -> Result<Subscription> {
        self.log.push("attach:manager");
        self.state.lock().unwrap().handler = Some(handler);

        let state = self.state.clone();
        let log = self.log.clone();
        Ok(Subscription::new(move || {
            log.push("detach:manager");
            state.lock().unwrap().handler = None;
        }))
    }
}

pub struct MockThumbnail {
    bytes: Option<Vec<u8>>,
}

impl MockThumbnail {
    pub fn with_bytes(bytes: Vec<u8>) -> ThumbnailRef {
        ThumbnailRef::new(Self { bytes: Some(bytes) })
    }

    /// A thumbnail whose stream fails to open
    pub fn broken() -> ThumbnailRef {
        ThumbnailRef::new(Self { bytes: None })
    }
}

impl ThumbnailSource for MockThumbnail {
    fn read_bytes(&self, max_bytes: usize) -> Pending<Vec<u8>> {
        match &self.bytes {
            Some(bytes) => deliver(
                checked_stream_len(bytes.len() as u64, max_bytes).map(|_| bytes.clone()),
            ),
            None => deliver(Err(MediaError::Platform("OpenReadAsync failed".into()))),
        }
    }
}

/// Encode a tiny solid-colour PNG for thumbnail tests
pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    use image::{DynamicImage, ImageOutputFormat, Rgba, RgbaImage};
    use std::io::Cursor;

    let img = RgbaImage::from_pixel(width, height, Rgba([255, 0, 127, 255]));
    let mut out = Cursor::new(Vec::new());
    DynamicImage::ImageRgba8(img)
        .write_to(&mut out, ImageOutputFormat::Png)
        .unwrap();
    out.into_inner()
}
