use std::path::{Path, PathBuf};

use log::{debug, info};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("failed to copy {source_path} to {dest_path}: {source}")]
    Copy {
        source_path: String,
        dest_path: String,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    SamePath,
    Copied { bytes: u64 },
}

/// Copy `source` over `dest`, unless both name the same file.
///
/// The copy overwrites in place; readers of `dest` may observe a partial
/// file while it runs.
///
/// # Errors
/// Returns an error if the copy fails.
pub fn place(source: &Path, dest: &Path) -> Result<Placement, DeliveryError> {
    if same_path(source, dest) {
        debug!("{} is already in place, skipping copy", dest.display());
        return Ok(Placement::SamePath);
    }

    let bytes = std::fs::copy(source, dest).map_err(|error| DeliveryError::Copy {
        source_path: source.display().to_string(),
        dest_path: dest.display().to_string(),
        source: error,
    })?;
    info!("Placed {} ({bytes} bytes)", dest.display());
    Ok(Placement::Copied { bytes })
}

fn same_path(a: &Path, b: &Path) -> bool {
    if let (Some(a), Some(b)) = (absolute(a), absolute(b))
        && a == b
    {
        return true;
    }
    matches!(
        (a.canonicalize(), b.canonicalize()),
        (Ok(a), Ok(b)) if a == b
    )
}

fn absolute(path: &Path) -> Option<PathBuf> {
    std::path::absolute(path).ok()
}
