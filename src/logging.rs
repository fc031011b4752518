use std::fs;
use std::io::{self, Write};
use std::sync::{Mutex, OnceLock};

use camino::Utf8PathBuf;
use chrono::Local;
use file_rotate::compression::Compression;
use file_rotate::suffix::AppendCount;
use file_rotate::{ContentLimit, FileRotate};
use indicatif::MultiProgress;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::time::FormatTime;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::error::FetchError;

pub const DEFAULT_LOG_FILE: &str = "logs/main.log";
pub const DEFAULT_MAX_BYTES: usize = 1024 * 1024;
pub const DEFAULT_BACKUPS: usize = 5;

static INSTALLED: OnceLock<()> = OnceLock::new();

#[derive(Debug, Clone)]
pub struct LogOptions {
    pub file: Utf8PathBuf,
    pub level: String,
    pub max_bytes: usize,
    pub backups: usize,
    /// Bars to clear while a console line is written.
    pub progress: Option<MultiProgress>,
}

impl Default for LogOptions {
    fn default() -> Self {
        Self {
            file: Utf8PathBuf::from(DEFAULT_LOG_FILE),
            level: "info".to_string(),
            max_bytes: DEFAULT_MAX_BYTES,
            backups: DEFAULT_BACKUPS,
            progress: None,
        }
    }
}

/// `2024-05-01 13:37:00,123`
struct LocalTime;

impl FormatTime for LocalTime {
    fn format_time(&self, w: &mut Writer<'_>) -> std::fmt::Result {
        write!(w, "{}", Local::now().format("%Y-%m-%d %H:%M:%S,%3f"))
    }
}

/// Stderr sink for the console layer. Each record is written with the
/// progress bars suspended so lines never land inside a bar.
struct Console {
    progress: Option<MultiProgress>,
}

struct ConsoleWriter<'a> {
    progress: Option<&'a MultiProgress>,
}

impl<'a> MakeWriter<'a> for Console {
    type Writer = ConsoleWriter<'a>;

    fn make_writer(&'a self) -> Self::Writer {
        ConsoleWriter {
            progress: self.progress.as_ref(),
        }
    }
}

impl Write for ConsoleWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self.progress {
            Some(multi) => multi.suspend(|| io::stderr().write(buf)),
            None => io::stderr().write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stderr().flush()
    }
}

/// Installs the process-wide subscriber: stderr plus a size-rotated log
/// file, both with the same line format. Returns `Ok(false)` when a
/// subscriber is already installed, in which case nothing is added.
pub fn init(options: &LogOptions) -> Result<bool, FetchError> {
    if INSTALLED.get().is_some() {
        return Ok(false);
    }

    if let Some(parent) = options.file.parent().filter(|p| !p.as_str().is_empty()) {
        fs::create_dir_all(parent.as_std_path())
            .map_err(|err| FetchError::Logging(format!("create {parent}: {err}")))?;
    }

    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&options.level)
            .map_err(|err| FetchError::Logging(err.to_string()))?,
    };

    // Rotation is checked after each write, and the file layer writes one
    // whole record at a time, so records are never split across files.
    let file = FileRotate::new(
        options.file.as_std_path(),
        AppendCount::new(options.backups),
        ContentLimit::BytesSurpassed(options.max_bytes),
        Compression::None,
        #[cfg(unix)]
        None,
    );

    let console = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_timer(LocalTime)
        .with_writer(Console {
            progress: options.progress.clone(),
        });
    let logfile = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_ansi(false)
        .with_timer(LocalTime)
        .with_writer(Mutex::new(file));

    let installed = tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(logfile)
        .try_init()
        .is_ok();
    if installed {
        let _ = INSTALLED.set(());
    }
    Ok(installed)
}
