use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use zip::result::ZipError;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

/// Substrings stripped from every upstream archive by default.
pub const DEFAULT_FILTER_RULES: [&str; 8] =
    ["RE", "vr", "xr", "VR", "XR", "DELETE", "OpenVR", "OpenXR"];

#[derive(Debug, Error)]
pub enum TranscodeError {
    #[error("failed to open source archive {path}: {source}")]
    SourceOpen {
        path: String,
        #[source]
        source: ZipError,
    },
    #[error("failed to create destination archive {path}: {source}")]
    DestCreate {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to read archive entry {name}: {source}")]
    EntryRead {
        name: String,
        #[source]
        source: ZipError,
    },
    #[error("failed to write archive entry {name}: {source}")]
    EntryWrite {
        name: String,
        #[source]
        source: ZipError,
    },
    #[error("failed to copy archive entry {name}: {source}")]
    Copy {
        name: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to finalize destination archive: {0}")]
    Finalize(#[source] ZipError),
}

/// Case-sensitive substring rules; an entry matching any of them is dropped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FilterRules(Vec<String>);

impl FilterRules {
    pub fn new<I, S>(rules: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(rules.into_iter().map(Into::into).collect())
    }

    #[must_use]
    pub fn matches(&self, name: &str) -> bool {
        self.0.iter().any(|rule| name.contains(rule.as_str()))
    }

    #[must_use]
    pub fn as_slice(&self) -> &[String] {
        &self.0
    }
}

impl Default for FilterRules {
    fn default() -> Self {
        Self::new(DEFAULT_FILTER_RULES)
    }
}

#[derive(Debug, Clone)]
pub struct TranscodeJob {
    pub source: PathBuf,
    pub destination: PathBuf,
    pub rules: FilterRules,
    pub root_prefix: String,
}

impl TranscodeJob {
    /// A root prefix without a trailing slash gets one, so that it names a
    /// directory.
    pub fn new(
        source: impl Into<PathBuf>,
        destination: impl Into<PathBuf>,
        rules: FilterRules,
        root_prefix: &str,
    ) -> Self {
        let root_prefix = if root_prefix.is_empty() || root_prefix.ends_with('/') {
            root_prefix.to_string()
        } else {
            format!("{root_prefix}/")
        };
        Self {
            source: source.into(),
            destination: destination.into(),
            rules,
            root_prefix,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TranscodeStats {
    pub total: usize,
    pub copied: usize,
    pub skipped: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArchiveSummary {
    pub entries: Vec<String>,
    pub file_count: usize,
}

/// Rewrite `job.source` into `job.destination` without touching the
/// filesystem for individual entries.
///
/// `on_progress` receives `considered / total` after every source entry and
/// ends on exactly `1.0`. The destination is removed if the job fails.
///
/// # Errors
/// Returns an error if either archive cannot be opened, any surviving entry
/// fails to read, write or copy, or the central directory cannot be written.
pub fn transcode(
    job: &TranscodeJob,
    mut on_progress: impl FnMut(f64),
) -> Result<TranscodeStats, TranscodeError> {
    let mut archive = open_archive(&job.source)?;

    let file = File::create(&job.destination).map_err(|source| TranscodeError::DestCreate {
        path: job.destination.display().to_string(),
        source,
    })?;
    let writer = ZipWriter::new(BufWriter::new(file));

    info!(
        "Transcoding {} -> {} under {}",
        job.source.display(),
        job.destination.display(),
        job.root_prefix
    );

    match write_entries(&mut archive, writer, job, &mut on_progress) {
        Ok(stats) => {
            info!(
                "Transcode complete: {} copied, {} skipped of {}",
                stats.copied, stats.skipped, stats.total
            );
            Ok(stats)
        }
        Err(error) => {
            if let Err(cleanup) = std::fs::remove_file(&job.destination) {
                warn!(
                    "Failed to remove partial archive {}: {cleanup}",
                    job.destination.display()
                );
            }
            Err(error)
        }
    }
}

fn open_archive(path: &Path) -> Result<ZipArchive<BufReader<File>>, TranscodeError> {
    let source_open = |source: ZipError| TranscodeError::SourceOpen {
        path: path.display().to_string(),
        source,
    };
    let file = File::open(path).map_err(|error| source_open(ZipError::Io(error)))?;
    ZipArchive::new(BufReader::new(file)).map_err(source_open)
}

fn write_entries(
    archive: &mut ZipArchive<BufReader<File>>,
    mut writer: ZipWriter<BufWriter<File>>,
    job: &TranscodeJob,
    on_progress: &mut impl FnMut(f64),
) -> Result<TranscodeStats, TranscodeError> {
    let base = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    if !job.root_prefix.is_empty() {
        writer
            .add_directory(job.root_prefix.as_str(), base)
            .map_err(|source| TranscodeError::EntryWrite {
                name: job.root_prefix.clone(),
                source,
            })?;
    }

    let total = archive.len();
    let mut stats = TranscodeStats {
        total,
        ..TranscodeStats::default()
    };

    for index in 0..total {
        let name = archive
            .name_for_index(index)
            .map_or_else(|| format!("#{index}"), str::to_string);

        if job.rules.matches(&name) {
            debug!("Skipping filtered entry {name}");
            stats.skipped += 1;
        } else {
            copy_entry(archive, &mut writer, index, &name, &job.root_prefix, base)?;
            stats.copied += 1;
        }

        on_progress(ratio(index + 1, total));
    }

    if total == 0 {
        on_progress(1.0);
    }

    let buffered = writer.finish().map_err(TranscodeError::Finalize)?;
    buffered
        .into_inner()
        .map_err(|error| TranscodeError::Finalize(ZipError::Io(error.into_error())))?;

    Ok(stats)
}

fn copy_entry(
    archive: &mut ZipArchive<BufReader<File>>,
    writer: &mut ZipWriter<BufWriter<File>>,
    index: usize,
    name: &str,
    root_prefix: &str,
    base: SimpleFileOptions,
) -> Result<(), TranscodeError> {
    let mut entry = archive
        .by_index(index)
        .map_err(|source| TranscodeError::EntryRead {
            name: name.to_string(),
            source,
        })?;

    let mut options = base.large_file(entry.size() >= u64::from(u32::MAX));
    if let Some(modified) = entry.last_modified() {
        options = options.last_modified_time(modified);
    }
    if let Some(mode) = entry.unix_mode() {
        options = options.unix_permissions(mode);
    }

    let target = format!("{root_prefix}{name}");
    let write_error = |source: ZipError| TranscodeError::EntryWrite {
        name: name.to_string(),
        source,
    };

    if entry.is_dir() {
        return writer.add_directory(target, options).map_err(write_error);
    }

    writer.start_file(target, options).map_err(write_error)?;
    std::io::copy(&mut entry, writer).map_err(|source| TranscodeError::Copy {
        name: name.to_string(),
        source,
    })?;
    Ok(())
}

#[allow(clippy::cast_precision_loss)]
fn ratio(done: usize, total: usize) -> f64 {
    done as f64 / total as f64
}

/// List an archive's entry names in stored order.
///
/// # Errors
/// Returns an error if the file cannot be opened as a zip archive.
pub fn summarize(path: &Path) -> Result<ArchiveSummary, TranscodeError> {
    let archive = open_archive(path)?;
    let entries: Vec<String> = (0..archive.len())
        .filter_map(|index| archive.name_for_index(index).map(str::to_string))
        .collect();
    let file_count = entries.iter().filter(|name| !name.ends_with('/')).count();
    Ok(ArchiveSummary {
        entries,
        file_count,
    })
}
