//! Callback-to-awaitable adapter
//!
//! The platform API is "start an operation, get a completion callback later".
//! `completion()` hands out a `Completer` for the callback side and a `Pending`
//! future for the caller. The completer is consumed on use, so an operation
//! resolves at most once; dropping it unresolved fails the future with
//! `MediaError::Abandoned` instead of hanging forever.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::sync::oneshot;

use crate::error::{MediaError, Result};

/// Callback half of a pending operation
pub struct Completer<T> {
    tx: oneshot::Sender<Result<T>>,
}

impl<T> Completer<T> {
    /// Resolve the operation. Returns false if the waiting side already went away.
    pub fn complete(self, result: Result<T>) -> bool {
        self.tx.send(result).is_ok()
    }

    pub fn succeed(self, value: T) -> bool {
        self.complete(Ok(value))
    }

    pub fn fail(self, error: MediaError) -> bool {
        self.complete(Err(error))
    }
}

/// Awaitable half of a pending operation
pub struct Pending<T> {
    rx: oneshot::Receiver<Result<T>>,
}

impl<T> Pending<T> {
    /// Already-resolved operation (used when starting the call failed synchronously)
    pub fn ready(result: Result<T>) -> Self {
        let (completer, pending) = completion();
        completer.complete(result);
        pending
    }
}

impl<T> Future for Pending<T> {
    type Output = Result<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.rx).poll(cx) {
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            Poll::Ready(Err(_)) => Poll::Ready(Err(MediaError::Abandoned)),
            Poll::Pending => Poll::Pending,
        }
    }
}

pub fn completion<T>() -> (Completer<T>, Pending<T>) {
    let (tx, rx) = oneshot::channel();
    (Completer { tx }, Pending { rx })
}

/// Start an operation whose result arrives through a callback.
///
/// `start` receives the completer and is expected to hand it to the platform.
pub fn from_callback<T, F>(start: F) -> Pending<T>
where
    F: FnOnce(Completer<T>),
{
    let (completer, pending) = completion();
    start(completer);
    pending
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[tokio::test]
    async fn test_resolves_with_callback_value() {
        let pending = from_callback(|done| {
            thread::spawn(move || {
                done.succeed(42u32);
            });
        });
        assert_eq!(pending.await.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_propagates_callback_failure() {
        let pending: Pending<u32> = from_callback(|done| {
            done.fail(MediaError::Platform("boom".into()));
        });
        assert!(matches!(pending.await, Err(MediaError::Platform(msg)) if msg == "boom"));
    }

    #[tokio::test]
    async fn test_dropped_completer_is_abandoned() {
        let pending: Pending<u32> = from_callback(|done| drop(done));
        assert!(matches!(pending.await, Err(MediaError::Abandoned)));
    }

    #[tokio::test]
    async fn test_ready() {
        assert_eq!(Pending::ready(Ok("x")).await.unwrap(), "x");
    }

    #[test]
    fn test_complete_after_receiver_gone() {
        let (done, pending) = completion::<u8>();
        drop(pending);
        assert!(!done.succeed(1));
    }
}
