use time::macros::format_description;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::{self, time::UtcTime};
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

use crate::config::{log_dir, Config};

/// RUST_LOG first, then the configured level, then plain "info"
fn filter_for(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Install the global subscriber.
///
/// Keep the returned guard alive for as long as the file log should be flushed.
pub fn init(config: &Config) -> Option<WorkerGuard> {
    let timer = UtcTime::new(format_description!("[hour]:[minute]:[second].[subsecond digits:3]"));

    let stdout_layer = fmt::layer().with_target(false).with_timer(timer.clone());

    let (file_layer, guard) = match (config.log_to_file, log_dir()) {
        (true, Some(dir)) => {
            let appender = tracing_appender::rolling::daily(dir, "nowplaying.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_ansi(false).with_writer(writer).with_timer(timer);
            (Some(layer), Some(guard))
        }
        _ => (None, None),
    };

    let result = tracing_subscriber::registry()
        .with(filter_for(&config.log_level))
        .with(stdout_layer)
        .with(file_layer)
        .try_init();

    if let Err(e) = result {
        eprintln!("[Logging] Subscriber already installed: {}", e);
    }
    guard
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bad_level_does_not_panic() {
        let _ = filter_for("this is [not a filter");
        let _ = filter_for("debug");
    }
}
