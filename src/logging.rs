//! Tracing setup for the server and the live checks.
//!
//! Every event goes to stdout. A second, ANSI-free copy goes to disk: appended to
//! `DOCSEARCH_LOG_FILE` when set, otherwise rotated daily as `docsearch.log.YYYY-MM-DD` under
//! `DOCSEARCH_LOG_DIR` (default `logs`). `DOCSEARCH_LOG_DIR=off` disables the file copy.
use std::path::PathBuf;

use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

const DEFAULT_FILTER: &str = "info,hyper=warn,reqwest=warn";
const DEFAULT_LOG_DIR: &str = "logs";
const LOG_FILE_PREFIX: &str = "docsearch.log";

/// Where the on-disk copy of the log goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogDestination {
    /// Append to a single file.
    File(PathBuf),
    /// Rotate daily inside a directory.
    Daily(PathBuf),
    /// Stdout only.
    Disabled,
}

impl LogDestination {
    /// Resolve the destination from `DOCSEARCH_LOG_FILE` and `DOCSEARCH_LOG_DIR`.
    pub fn from_env() -> Self {
        Self::resolve(
            std::env::var("DOCSEARCH_LOG_FILE").ok(),
            std::env::var("DOCSEARCH_LOG_DIR").ok(),
        )
    }

    fn resolve(file: Option<String>, dir: Option<String>) -> Self {
        let file = file.filter(|value| !value.trim().is_empty());
        let dir = dir.filter(|value| !value.trim().is_empty());
        match (file, dir) {
            (Some(path), _) => Self::File(PathBuf::from(path)),
            (None, Some(dir)) if dir.eq_ignore_ascii_case("off") => Self::Disabled,
            (None, Some(dir)) => Self::Daily(PathBuf::from(dir)),
            (None, None) => Self::Daily(PathBuf::from(DEFAULT_LOG_DIR)),
        }
    }

    fn writer(&self) -> std::io::Result<Option<(NonBlocking, WorkerGuard)>> {
        match self {
            Self::File(path) => {
                if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
                    std::fs::create_dir_all(parent)?;
                }
                let file = std::fs::OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)?;
                Ok(Some(tracing_appender::non_blocking(file)))
            }
            Self::Daily(dir) => {
                std::fs::create_dir_all(dir)?;
                let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
                Ok(Some(tracing_appender::non_blocking(appender)))
            }
            Self::Disabled => Ok(None),
        }
    }
}

/// Install the global subscriber.
///
/// `RUST_LOG` overrides the default filter. Hold the returned guard until shutdown so buffered
/// file output is flushed; it is `None` when logging to stdout only.
pub fn init_tracing() -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let stdout_layer = fmt::layer().with_target(false).compact();
    let destination = LogDestination::from_env();

    let file = match destination.writer() {
        Ok(file) => file,
        Err(error) => {
            eprintln!("File logging disabled ({destination:?}): {error}");
            None
        }
    };
    let (file_layer, guard) = match file {
        Some((writer, guard)) => (
            Some(
                fmt::layer()
                    .with_writer(writer)
                    .with_target(true)
                    .with_ansi(false)
                    .compact(),
            ),
            Some(guard),
        ),
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stdout_layer)
        .with(file_layer)
        .init();
    tracing::debug!(destination = ?destination, "Tracing initialized");
    guard
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_file_wins_over_directory() {
        assert_eq!(
            LogDestination::resolve(Some("/tmp/docsearch.log".into()), Some("var".into())),
            LogDestination::File(PathBuf::from("/tmp/docsearch.log"))
        );
    }

    #[test]
    fn directory_defaults_and_can_be_disabled() {
        assert_eq!(
            LogDestination::resolve(None, None),
            LogDestination::Daily(PathBuf::from("logs"))
        );
        assert_eq!(
            LogDestination::resolve(Some("  ".into()), Some("/var/log/docsearch".into())),
            LogDestination::Daily(PathBuf::from("/var/log/docsearch"))
        );
        assert_eq!(
            LogDestination::resolve(None, Some("OFF".into())),
            LogDestination::Disabled
        );
    }

    #[test]
    fn disabled_destination_has_no_writer() {
        assert!(LogDestination::Disabled.writer().expect("writer").is_none());
    }
}
