//! Now-playing media session observer.
//!
//! `NowPlayingObserver` follows the OS media session and raises
//! `MediaEvent`s; `get()` answers "what is playing right now" once.

pub mod config;
pub mod error;
pub mod logging;
pub mod media;

pub use config::Config;
pub use error::{MediaError, Result};
pub use media::fetch::{get, get_blocking};
pub use media::observer::NowPlayingObserver;
pub use media::{MediaEvent, MediaSnapshot, PlaybackState};
