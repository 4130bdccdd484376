use std::thread;

use anyhow::Context;
use nowplaying::{logging, Config, MediaEvent, NowPlayingObserver};

fn main() -> anyhow::Result<()> {
    let config = Config::load().unwrap_or_else(|e| {
        eprintln!("[Main] Config unreadable, using defaults: {}", e);
        Config::default()
    });
    let _log_guard = logging::init(&config);

    tracing::info!("=== nowplaying {} ===", env!("CARGO_PKG_VERSION"));

    let rt = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .enable_all()
        .build()
        .context("failed to build runtime")?;

    let observer: NowPlayingObserver = NowPlayingObserver::new(&config);
    let events = observer.subscribe();

    rt.block_on(observer.initialize())
        .context("failed to attach to the media session manager")?;

    // Events are printed from a plain thread; the runtime stays free for platform callbacks
    let printer = thread::spawn(move || {
        for event in events.iter() {
            match event {
                MediaEvent::SongChanged(snap) => {
                    println!("\n🎵 NOW PLAYING 🎵");
                    println!("   Track:  {}", snap.title);
                    println!("   Artist: {}", snap.artist);
                    println!("   Album:  {}", snap.album);
                    println!("   Art:    {}", if snap.has_thumbnail() { "[available]" } else { "[none]" });
                }
                MediaEvent::PlaybackStateChanged(state) => {
                    println!("   State:  {}", state);
                }
            }
        }
    });

    // Runs until the process is killed; the printer only ends if the observer goes away
    printer.join().map_err(|_| anyhow::anyhow!("event printer panicked"))?;
    drop(observer);
    Ok(())
}
