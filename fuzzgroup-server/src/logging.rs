//! Logging setup with segment prefixes.
//!
//! Console output goes through a compact fmt layer. Two plain-text files are
//! written alongside: `{log_dir}/YYYY_MM_DD.log` with everything the filter
//! lets through, and `{log_dir}/errors.log` with ERROR events only.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::Level;
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Segment prefixes for log lines.
pub mod prefix {
    /// Graceful startup prefix
    pub const PULSE_OPEN: &str = "✿";
    /// Graceful shutdown prefix
    pub const PULSE_CLOSE: &str = "❀";
    /// Database operations prefix
    pub const DB: &str = "⊔";
}

fn open_append(path: &Path) -> io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}

/// Append-only file that switches to a new `YYYY_MM_DD.log` when the local
/// date changes.
pub struct DailyFile {
    dir: PathBuf,
    current: Mutex<Option<(String, File)>>,
}

impl DailyFile {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            current: Mutex::new(None),
        }
    }

    /// File name for today's log
    pub fn file_name() -> String {
        format!("{}.log", chrono::Local::now().format("%Y_%m_%d"))
    }
}

impl Write for &DailyFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let name = DailyFile::file_name();
        let mut current = self.current.lock();
        let stale = !matches!(current.as_ref(), Some((open, _)) if *open == name);
        if stale {
            let file = open_append(&self.dir.join(&name))?;
            *current = Some((name, file));
        }
        match current.as_mut() {
            Some((_, file)) => file.write(buf),
            None => Ok(0),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.current.lock().as_mut() {
            Some((_, file)) => file.flush(),
            None => Ok(()),
        }
    }
}

/// Initialize tracing with console output plus the daily and error files.
///
/// `RUST_LOG` takes precedence over `level` when set.
pub fn init(level: &str, log_dir: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(level))?;

    fs::create_dir_all(log_dir)?;
    let daily = Arc::new(DailyFile::new(log_dir));
    let errors = Arc::new(open_append(&log_dir.join("errors.log"))?);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact().with_target(false))
        .with(fmt::layer().with_ansi(false).with_writer(daily))
        .with(
            fmt::layer()
                .with_ansi(false)
                .with_writer(errors.with_max_level(Level::ERROR)),
        )
        .try_init()?;

    Ok(())
}
