use std::sync::{Arc, Mutex, PoisonError};

use windows::core::{AgileReference, Result as WinResult, RuntimeType};
use windows::Foundation::{AsyncOperationCompletedHandler, IAsyncOperation, TypedEventHandler};
use windows::Media::Control::{
    GlobalSystemMediaTransportControlsSession, GlobalSystemMediaTransportControlsSessionManager,
};
use windows::Storage::Streams::{DataReader, DataReaderLoadOperation, IRandomAccessStreamReference};

use super::completion::{from_callback, Completer, Pending};
use super::thumbnail::checked_stream_len;
use super::{
    ChangeHandler, MediaProperties, MediaSession, NativePlaybackStatus, SessionManager,
    Subscription, ThumbnailRef, ThumbnailSource,
};
use crate::error::{MediaError, Result};

/// A WinRT operation that reports completion through `SetCompleted`
trait Completable: Clone + Send + 'static {
    type Output: RuntimeType + 'static;

    fn set_completed(&self, handler: &AsyncOperationCompletedHandler<Self::Output>) -> WinResult<()>;
    fn get_results(&self) -> WinResult<Self::Output>;
}

impl<T: RuntimeType + 'static> Completable for IAsyncOperation<T> {
    type Output = T;

    fn set_completed(&self, handler: &AsyncOperationCompletedHandler<T>) -> WinResult<()> {
        self.SetCompleted(handler)
    }

    fn get_results(&self) -> WinResult<T> {
        self.GetResults()
    }
}

impl Completable for DataReaderLoadOperation {
    type Output = u32;

    fn set_completed(&self, handler: &AsyncOperationCompletedHandler<u32>) -> WinResult<()> {
        self.SetCompleted(handler)
    }

    fn get_results(&self) -> WinResult<u32> {
        self.GetResults()
    }
}

/// Run `then` with the operation's outcome, once, on whichever thread WinRT completes it.
fn when_done<Op, F>(op: WinResult<Op>, then: F)
where
    Op: Completable,
    F: FnOnce(WinResult<Op::Output>) + Send + 'static,
{
    let op = match op {
        Ok(op) => op,
        Err(e) => return then(Err(e)),
    };

    // The handler drops its copy of `op` after firing so the two don't keep each other alive
    let slot = Arc::new(Mutex::new(Some((then, op.clone()))));
    let handler_slot = slot.clone();
    let handler = AsyncOperationCompletedHandler::new(move |_, _| {
        let taken = handler_slot.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some((then, op)) = taken {
            then(op.get_results());
        }
        Ok(())
    });

    if let Err(e) = op.set_completed(&handler) {
        let taken = slot.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some((then, _)) = taken {
            then(Err(e));
        }
    }
}

/// Await a WinRT operation, converting its result to plain data inside the completion callback
fn adapt<T, U, F>(op: WinResult<IAsyncOperation<T>>, convert: F) -> Pending<U>
where
    T: RuntimeType + 'static,
    U: Send + 'static,
    F: FnOnce(T) -> Result<U> + Send + 'static,
{
    from_callback(move |done: Completer<U>| {
        when_done(op, move |result| {
            done.complete(result.map_err(MediaError::from).and_then(convert));
        });
    })
}

pub struct WindowsSessionManager {
    manager: GlobalSystemMediaTransportControlsSessionManager,
}

impl SessionManager for WindowsSessionManager {
    type Session = WindowsSession;

    fn request() -> Pending<Self> {
        tracing::debug!("[Media/Windows] Requesting session manager");
        adapt(GlobalSystemMediaTransportControlsSessionManager::RequestAsync(), |manager| {
            Ok(WindowsSessionManager { manager })
        })
    }

    fn current_session(&self) -> Result<Option<WindowsSession>> {
        // GetCurrentSession hands back null (surfaced as Err) when nothing is playing
        match self.manager.GetCurrentSession() {
            Ok(session) => Ok(Some(WindowsSession { session })),
            Err(e) => {
                tracing::debug!("[Media/Windows] No current session: {}", e);
                Ok(None)
            }
        }
    }

    fn on_current_session_changed(&self, handler: ChangeHandler) -> Result<Subscription> {
        let token = self.manager.CurrentSessionChanged(&TypedEventHandler::new(move |_, _| {
            handler();
            Ok(())
        }))?;

        let manager = self.manager.clone();
        Ok(Subscription::new(move || {
            if let Err(e) = manager.RemoveCurrentSessionChanged(token) {
                tracing::warn!("[Media/Windows] Failed to remove CurrentSessionChanged: {}", e);
            }
        }))
    }
}

#[derive(Clone)]
pub struct WindowsSession {
    session: GlobalSystemMediaTransportControlsSession,
}

impl MediaSession for WindowsSession {
    fn media_properties(&self) -> Pending<MediaProperties> {
        adapt(self.session.TryGetMediaPropertiesAsync(), |props| {
            let thumbnail = match props.Thumbnail() {
                Ok(reference) => Some(ThumbnailRef::new(WindowsThumbnail::new(&reference)?)),
                Err(_) => None,
            };
            Ok(MediaProperties {
                title: props.Title()?.to_string(),
                artist: props.Artist()?.to_string(),
                album: props.AlbumTitle()?.to_string(),
                thumbnail,
            })
        })
    }

    fn playback_status(&self) -> Result<NativePlaybackStatus> {
        let status = self.session.GetPlaybackInfo()?.PlaybackStatus()?;
        Ok(NativePlaybackStatus(status.0))
    }

    fn subscribe(&self, handler: ChangeHandler) -> Result<Subscription> {
        let on_props = handler.clone();
        let props_token = self.session.MediaPropertiesChanged(&TypedEventHandler::new(move |_, _| {
            on_props();
            Ok(())
        }))?;

        let playback_token = match self.session.PlaybackInfoChanged(&TypedEventHandler::new(move |_, _| {
            handler();
            Ok(())
        })) {
            Ok(token) => token,
            Err(e) => {
                let _ = self.session.RemoveMediaPropertiesChanged(props_token);
                return Err(e.into());
            }
        };

        let session = self.session.clone();
        Ok(Subscription::new(move || {
            if let Err(e) = session.RemoveMediaPropertiesChanged(props_token) {
                tracing::warn!("[Media/Windows] Failed to remove MediaPropertiesChanged: {}", e);
            }
            if let Err(e) = session.RemovePlaybackInfoChanged(playback_token) {
                tracing::warn!("[Media/Windows] Failed to remove PlaybackInfoChanged: {}", e);
            }
        }))
    }
}

/// Thumbnail stream reference, held agile so it can cross threads until someone asks for it
pub struct WindowsThumbnail {
    reference: AgileReference<IRandomAccessStreamReference>,
}

impl WindowsThumbnail {
    fn new(reference: &IRandomAccessStreamReference) -> Result<Self> {
        Ok(Self { reference: AgileReference::new(reference)? })
    }
}

impl ThumbnailSource for WindowsThumbnail {
    fn read_bytes(&self, max_bytes: usize) -> Pending<Vec<u8>> {
        let reference = match self.reference.resolve() {
            Ok(reference) => reference,
            Err(e) => return Pending::ready(Err(e.into())),
        };

        from_callback(move |done: Completer<Vec<u8>>| {
            when_done(reference.OpenReadAsync(), move |stream| {
                let loaded = stream.map_err(MediaError::from).and_then(|stream| {
                    let size = checked_stream_len(stream.Size()?, max_bytes)?;
                    let reader = DataReader::CreateDataReader(&stream)?;
                    let load = reader.LoadAsync(size);
                    Ok((reader, load))
                });

                let (reader, load) = match loaded {
                    Ok(pair) => pair,
                    Err(e) => {
                        done.fail(e);
                        return;
                    }
                };

                when_done(load, move |count| {
                    let bytes = count.and_then(|count| {
                        let mut buffer = vec![0u8; count as usize];
                        reader.ReadBytes(&mut buffer)?;
                        Ok(buffer)
                    });
                    done.complete(bytes.map_err(MediaError::from));
                });
            });
        })
    }
}
