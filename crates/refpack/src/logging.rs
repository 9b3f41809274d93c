use simplelog::{
    ColorChoice, CombinedLogger, ConfigBuilder, LevelFilter, SharedLogger, TermLogger,
    TerminalMode, WriteLogger,
};
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use refpack_platform::AppPaths;

/// Appending log writer that reopens its file if something deletes it
/// between runs of a long build.
struct ResilientFileWriter {
    path: PathBuf,
    file: Mutex<Option<File>>,
}

impl ResilientFileWriter {
    fn new(path: PathBuf) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            path,
            file: Mutex::new(Some(file)),
        })
    }

    fn reopen_if_missing(&self) -> io::Result<()> {
        let mut guard = self
            .file
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        if !self.path.exists() {
            if let Some(parent) = self.path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            *guard = Some(
                OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(&self.path)?,
            );
        }

        Ok(())
    }
}

impl Write for ResilientFileWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.reopen_if_missing()?;
        let mut guard = self
            .file
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        match guard.as_mut() {
            Some(file) => file.write(buf),
            None => Err(io::Error::other("log file not available")),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        let mut guard = self
            .file
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        guard.as_mut().map_or(Ok(()), Write::flush)
    }
}

/// Drop the older half of the log, cutting at a line boundary.
fn trim_log_file_if_oversized(log_path: &Path, max_log_size: u64) {
    if let Ok(metadata) = std::fs::metadata(log_path)
        && metadata.len() > max_log_size
        && let Ok(contents) = std::fs::read(log_path)
    {
        let half = contents.len() / 2;
        let keep_from = contents[half..]
            .iter()
            .position(|&b| b == b'\n')
            .map_or(half, |pos| half + pos + 1);
        let _ = std::fs::write(log_path, &contents[keep_from..]);
    }
}

fn level_for(debug_enabled: bool) -> LevelFilter {
    if debug_enabled {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    }
}

/// Install the process logger.
///
/// The log file under the data directory always receives records at the
/// current level. Debug builds and `--debug` also mirror them to stderr.
pub fn init_logging(debug_enabled: bool, max_log_size: u64) {
    let config = ConfigBuilder::new()
        .set_time_format_rfc3339()
        .add_filter_allow_str("refpack")
        .build();

    let mut loggers: Vec<Box<dyn SharedLogger>> = Vec::new();

    let log_path = AppPaths::new().ok().and_then(|paths| {
        paths.ensure_dirs().ok()?;
        Some(paths.log_file())
    });
    if let Some(path) = &log_path {
        trim_log_file_if_oversized(path, max_log_size);
        if let Ok(writer) = ResilientFileWriter::new(path.clone()) {
            loggers.push(WriteLogger::new(LevelFilter::Debug, config.clone(), writer));
        }
    }

    if cfg!(debug_assertions) || debug_enabled {
        loggers.push(TermLogger::new(
            LevelFilter::Debug,
            config,
            TerminalMode::Stderr,
            ColorChoice::Auto,
        ));
    }

    if !loggers.is_empty() {
        let _ = CombinedLogger::init(loggers);
    }
    set_debug_logging(debug_enabled);

    if let Some(path) = &log_path {
        log::debug!("Logging to {}", path.display());
    }
}

pub fn set_debug_logging(enabled: bool) {
    log::set_max_level(level_for(enabled));
}
