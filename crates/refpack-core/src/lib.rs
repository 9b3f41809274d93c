//! Core logic for refpack.
//!
//! This crate holds everything that is independent of how a run is
//! presented:
//! - Release catalog fetching with entity-tag revalidation and a disk cache.
//! - Nightly version resolution and output naming.
//! - Streaming zip-to-zip transcoding with substring filters.
//! - Asset download, placement, and the pipeline that ties them together.

pub mod cache;
pub mod catalog;
pub mod delivery;
pub mod download;
pub mod pipeline;
mod release;
pub mod resolver;
pub mod transcode;

pub use cache::{CacheEntry, CacheStore, FileCacheStore, MemoryCacheStore};
pub use catalog::{CatalogClient, CatalogResponse, FetchError};
pub use delivery::{DeliveryError, Placement, place};
pub use pipeline::{
    BuildConfig, BuildError, BuildOutcome, BuildProgress, BuildReport, Interaction, Pipeline,
};
pub use release::{Release, ReleaseAsset, parse_catalog};
pub use resolver::{ArtifactName, ResolveError, Selection, VersionGroup, resolve};
pub use transcode::{
    ArchiveSummary, DEFAULT_FILTER_RULES, FilterRules, TranscodeError, TranscodeJob,
    TranscodeStats, summarize, transcode,
};
