//! Console and append-only file logging
//!
//! The file sink never fails: write errors are reported on stderr and
//! swallowed so a full or read-only disk cannot take the kiosk down.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Once;

use anyhow::Result;
use chrono::{SecondsFormat, Utc};
use tracing::Subscriber;
use tracing::error;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::time::FormatTime;
use tracing_subscriber::fmt::{self, MakeWriter};
use tracing_subscriber::prelude::*;
use tracing_subscriber::registry::LookupSpan;

use crate::constants::paths;

/// Default log file: `<data_dir>/camera-kiosk/kiosk.log`
pub fn default_log_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(paths::APP_DIR)
        .join(paths::LOG_FILENAME)
}

/// Parse a `LOG_LEVEL` value; unknown or missing means info
pub fn parse_level(value: Option<&str>) -> LevelFilter {
    match value.map(str::to_lowercase).as_deref() {
        Some("trace") => LevelFilter::TRACE,
        Some("debug") => LevelFilter::DEBUG,
        Some("warn") => LevelFilter::WARN,
        Some("error") => LevelFilter::ERROR,
        _ => LevelFilter::INFO,
    }
}

/// Install the console and file layers
///
/// The returned guard flushes the file writer on drop and must live until exit.
pub fn init(log_path: &Path) -> Result<WorkerGuard> {
    let level = parse_level(std::env::var("LOG_LEVEL").ok().as_deref());
    let (writer, guard) = tracing_appender::non_blocking(AppendLog::new(log_path));

    tracing_subscriber::registry()
        .with(fmt::layer().with_filter(level))
        .with(file_layer(writer, level))
        .try_init()?;

    Ok(guard)
}

/// Plain `[timestamp] message fields` lines for the log file
pub fn file_layer<S, W>(writer: W, level: LevelFilter) -> impl tracing_subscriber::Layer<S>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    W: for<'w> MakeWriter<'w> + 'static,
{
    fmt::layer()
        .with_writer(writer)
        .with_ansi(false)
        .with_timer(BracketedUtc)
        .with_level(false)
        .with_target(false)
        .with_filter(level)
}

/// Log panics with a backtrace before the default hook runs
pub fn install_panic_hook() {
    static HOOK: Once = Once::new();
    HOOK.call_once(|| {
        let default_panic = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            let backtrace = std::backtrace::Backtrace::force_capture();
            error!(panic = %info, backtrace = %backtrace, "Unhandled runtime fault");
            default_panic(info);
        }));
    });
}

/// RFC 3339 UTC timestamp with millisecond precision
fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

struct BracketedUtc;

impl FormatTime for BracketedUtc {
    fn format_time(&self, w: &mut Writer<'_>) -> std::fmt::Result {
        write!(w, "[{}]", timestamp())
    }
}

/// Append-only log file, opened on first write and reopened after a failure
pub struct AppendLog {
    path: PathBuf,
    file: Option<File>,
}

impl AppendLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            file: None,
        }
    }

    fn open(&self) -> io::Result<File> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        OpenOptions::new().create(true).append(true).open(&self.path)
    }

    fn try_write(&mut self, buf: &[u8]) -> io::Result<()> {
        if self.file.is_none() {
            self.file = Some(self.open()?);
        }
        match self.file.as_mut() {
            Some(file) => file.write_all(buf),
            None => Ok(()),
        }
    }
}

impl Write for AppendLog {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if let Err(e) = self.try_write(buf) {
            eprintln!("Failed to write log file {}: {e}", self.path.display());
            self.file = None;
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        if let Some(file) = self.file.as_mut()
            && let Err(e) = file.flush()
        {
            eprintln!("Failed to flush log file {}: {e}", self.path.display());
            self.file = None;
        }
        Ok(())
    }
}
