//! The single fetch → resolve → transcode → deliver sequence every front-end
//! drives.
//!
//! Front-ends supply decisions through [`Interaction`] and observe work
//! through a [`BuildProgress`] channel; the pipeline itself never prompts,
//! prints or reads the environment.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use log::{info, warn};
use thiserror::Error;
use tokio::sync::mpsc;

use crate::cache::CacheStore;
use crate::catalog::{CatalogClient, FetchError, releases_url};
use crate::delivery::{DeliveryError, place};
use crate::download::{DownloadError, asset_url, download_file, verify_sha256};
use crate::resolver::{ArtifactName, ResolveError, Selection, VersionGroup, pick, resolve, visible};
use crate::transcode::{
    ArchiveSummary, FilterRules, TranscodeError, TranscodeJob, TranscodeStats, summarize, transcode,
};

#[derive(Debug, Clone)]
pub struct BuildConfig {
    pub api_base: String,
    pub download_base: String,
    pub repository: String,
    pub asset_name: String,
    pub product: String,
    pub root_prefix: String,
    pub rules: FilterRules,
    pub max_list: usize,
    pub dev_prefix: Option<String>,
    pub skip_download: bool,
    pub output_dir: PathBuf,
    pub delivery_dir: Option<PathBuf>,
    pub fetch_timeout: Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub enum BuildProgress {
    Fetching,
    Resolved { versions: usize, from_cache: bool },
    Downloading { downloaded: u64, total: u64 },
    Transcoding(f64),
    Delivering,
}

/// Decisions the pipeline delegates to whoever is driving it.
pub trait Interaction {
    /// Pick one of `versions` (newest first, already truncated to the
    /// display limit).
    fn choose_release(&mut self, versions: &[VersionGroup]) -> Selection;

    /// `artifact` already exists; return true to build it again.
    fn confirm_rebuild(&mut self, artifact: &Path) -> bool;

    /// Return true to copy the finished archive to `destination`.
    fn confirm_delivery(&mut self, destination: &Path) -> bool;
}

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("fetch stage failed: {0}")]
    Fetch(#[from] FetchError),
    #[error("resolve stage failed: {0}")]
    Resolve(#[from] ResolveError),
    #[error("download stage failed: {0}")]
    Download(#[from] DownloadError),
    #[error("transcode stage failed: {0}")]
    Transcode(#[from] TranscodeError),
    #[error("delivery stage failed: {0}")]
    Delivery(#[from] DeliveryError),
    #[error("failed to write archive to the output directory: {0}")]
    Output(#[source] DeliveryError),
    #[error("failed to prepare build workspace: {0}")]
    Workspace(#[source] std::io::Error),
    #[error("transcode worker stopped unexpectedly: {0}")]
    Worker(#[source] tokio::task::JoinError),
    #[error("final archive {path} not found")]
    ArtifactMissing { path: String },
}

impl BuildError {
    /// Short name of the stage that failed, for front-end headlines.
    #[must_use]
    pub fn stage(&self) -> &'static str {
        match self {
            Self::Fetch(_) => "fetch",
            Self::Resolve(_) => "resolve",
            Self::Download(_) => "download",
            Self::Transcode(_) | Self::Worker(_) => "transcode",
            Self::Delivery(_) => "delivery",
            Self::Output(_) | Self::Workspace(_) | Self::ArtifactMissing { .. } => "finalize",
        }
    }
}

#[derive(Debug, Clone)]
pub struct BuildReport {
    pub release: VersionGroup,
    pub artifact: PathBuf,
    pub stats: Option<TranscodeStats>,
    pub summary: ArchiveSummary,
    pub delivered: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub enum BuildOutcome {
    Cancelled,
    DryRun {
        tag: String,
        published_at: DateTime<Utc>,
        artifact: PathBuf,
    },
    Built(BuildReport),
    Reused(BuildReport),
}

/// How the artifact came to be on disk before finalization.
enum Staged {
    Fresh(TranscodeStats),
    Existing,
}

pub struct Pipeline<'a, S> {
    client: &'a reqwest::Client,
    config: &'a BuildConfig,
    store: &'a S,
}

impl<'a, S: CacheStore> Pipeline<'a, S> {
    pub fn new(client: &'a reqwest::Client, config: &'a BuildConfig, store: &'a S) -> Self {
        Self {
            client,
            config,
            store,
        }
    }

    /// Run one build job to completion.
    ///
    /// # Errors
    /// Returns the first stage failure; no later stage runs after it.
    pub async fn run<I: Interaction>(
        &self,
        interaction: &mut I,
        progress: &mpsc::Sender<BuildProgress>,
    ) -> Result<BuildOutcome, BuildError> {
        let _ = progress.send(BuildProgress::Fetching).await;
        let catalog = CatalogClient::new(
            self.client,
            releases_url(&self.config.api_base, &self.config.repository),
            self.store,
            self.config.fetch_timeout,
        )
        .fetch()
        .await?;
        let releases = catalog.releases()?;

        let groups = resolve(&releases, self.config.dev_prefix.as_deref())?;
        let _ = progress
            .send(BuildProgress::Resolved {
                versions: groups.len(),
                from_cache: catalog.from_cache,
            })
            .await;

        let shown = visible(&groups, self.config.max_list);
        let index = match interaction.choose_release(shown) {
            Selection::Index(index) => index,
            Selection::Exit => {
                info!("Release selection cancelled");
                return Ok(BuildOutcome::Cancelled);
            }
        };
        let chosen = pick(shown, index)
            .cloned()
            .ok_or(ResolveError::NoQualifyingReleases)?;

        let file_name = ArtifactName::derive(&chosen).file_name(&self.config.product);
        let artifact = self.config.output_dir.join(&file_name);
        info!("Selected {} -> {file_name}", chosen.tag());

        let staged = if artifact.exists() && !interaction.confirm_rebuild(&artifact) {
            info!("Keeping existing {}", artifact.display());
            Staged::Existing
        } else if self.config.skip_download {
            info!("Download skipped, would create {}", artifact.display());
            return Ok(BuildOutcome::DryRun {
                tag: chosen.tag().to_string(),
                published_at: chosen.published_at(),
                artifact,
            });
        } else {
            Staged::Fresh(self.build(&chosen, &artifact, &file_name, progress).await?)
        };

        self.finalize(chosen, artifact, &file_name, staged, interaction, progress)
            .await
    }

    async fn build(
        &self,
        chosen: &VersionGroup,
        artifact: &Path,
        file_name: &str,
        progress: &mpsc::Sender<BuildProgress>,
    ) -> Result<TranscodeStats, BuildError> {
        let workspace = tempfile::Builder::new()
            .prefix("refpack-build-")
            .tempdir()
            .map_err(BuildError::Workspace)?;
        let staging_zip = workspace.path().join(&self.config.asset_name);
        let staging_final = workspace.path().join(file_name);

        let url = asset_url(
            &self.config.download_base,
            &self.config.repository,
            chosen.tag(),
            &self.config.asset_name,
        );
        info!("Downloading {url}");
        let downloaded = download_file(self.client, &url, &staging_zip, |downloaded, total| {
            let _ = progress.try_send(BuildProgress::Downloading { downloaded, total });
        })
        .await?;
        // Chunk events may be dropped under backpressure; the last one may not.
        let _ = progress
            .send(BuildProgress::Downloading {
                downloaded,
                total: downloaded,
            })
            .await;

        match chosen
            .release
            .asset(&self.config.asset_name)
            .and_then(crate::release::ReleaseAsset::sha256)
        {
            Some(expected) => verify_sha256(&staging_zip, &self.config.asset_name, &expected)?,
            None => warn!(
                "No published digest for {}, skipping checksum verification",
                self.config.asset_name
            ),
        }

        let job = TranscodeJob::new(
            &staging_zip,
            &staging_final,
            self.config.rules.clone(),
            &self.config.root_prefix,
        );
        let sender = progress.clone();
        let stats = tokio::task::spawn_blocking(move || {
            transcode(&job, |ratio| {
                let _ = sender.blocking_send(BuildProgress::Transcoding(ratio));
            })
        })
        .await
        .map_err(BuildError::Worker)??;

        place(&staging_final, artifact).map_err(BuildError::Output)?;
        Ok(stats)
    }

    async fn finalize<I: Interaction>(
        &self,
        release: VersionGroup,
        artifact: PathBuf,
        file_name: &str,
        staged: Staged,
        interaction: &mut I,
        progress: &mpsc::Sender<BuildProgress>,
    ) -> Result<BuildOutcome, BuildError> {
        if !artifact.is_file() {
            return Err(BuildError::ArtifactMissing {
                path: artifact.display().to_string(),
            });
        }
        let summary = summarize(&artifact)?;

        let mut delivered = None;
        if let Some(dir) = &self.config.delivery_dir {
            let destination = dir.join(file_name);
            if interaction.confirm_delivery(&destination) {
                let _ = progress.send(BuildProgress::Delivering).await;
                place(&artifact, &destination)?;
                delivered = Some(destination);
            }
        }

        Ok(match staged {
            Staged::Fresh(stats) => BuildOutcome::Built(BuildReport {
                release,
                artifact,
                stats: Some(stats),
                summary,
                delivered,
            }),
            Staged::Existing => BuildOutcome::Reused(BuildReport {
                release,
                artifact,
                stats: None,
                summary,
                delivered,
            }),
        })
    }
}
