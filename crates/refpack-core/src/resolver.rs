use std::collections::HashMap;
use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use thiserror::Error;

use crate::release::Release;

const SHORT_BUILD_LEN: usize = 6;

static NIGHTLY_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^nightly-([0-9]{4,})-([A-Za-z0-9]+)$").expect("nightly tag pattern is valid")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("no nightly releases match the expected tag pattern")]
    NoQualifyingReleases,
}

/// One logical nightly version and the release chosen to represent it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionGroup {
    pub number: String,
    pub build: String,
    pub release: Release,
}

impl VersionGroup {
    #[must_use]
    pub fn published_at(&self) -> DateTime<Utc> {
        self.release.published_at
    }

    #[must_use]
    pub fn tag(&self) -> &str {
        &self.release.tag
    }
}

/// What a front-end decided after being shown the version list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    Index(usize),
    Exit,
}

/// Split a nightly tag into its numeric version and build identifier.
#[must_use]
pub fn parse_tag(tag: &str) -> Option<(&str, &str)> {
    let captures = NIGHTLY_TAG.captures(tag)?;
    Some((captures.get(1)?.as_str(), captures.get(2)?.as_str()))
}

/// Group releases by numeric version, newest first.
///
/// Within a version the latest publish date wins; equal dates keep the
/// lexicographically smallest tag.
///
/// # Errors
/// Returns [`ResolveError::NoQualifyingReleases`] when nothing survives the tag
/// pattern and prefix filter.
pub fn resolve(
    releases: &[Release],
    numeric_prefix: Option<&str>,
) -> Result<Vec<VersionGroup>, ResolveError> {
    let prefix = numeric_prefix.unwrap_or_default();
    let mut by_number: HashMap<&str, VersionGroup> = HashMap::new();

    for release in releases {
        let Some((number, build)) = parse_tag(&release.tag) else {
            continue;
        };
        if !number.starts_with(prefix) {
            continue;
        }

        let replace = by_number.get(number).is_none_or(|current| {
            (release.published_at, std::cmp::Reverse(release.tag.as_str()))
                > (current.published_at(), std::cmp::Reverse(current.tag()))
        });
        if replace {
            by_number.insert(
                number,
                VersionGroup {
                    number: number.to_string(),
                    build: build.to_string(),
                    release: release.clone(),
                },
            );
        }
    }

    let mut groups: Vec<VersionGroup> = by_number.into_values().collect();
    if groups.is_empty() {
        return Err(ResolveError::NoQualifyingReleases);
    }
    groups.sort_by(|a, b| {
        b.published_at()
            .cmp(&a.published_at())
            .then_with(|| a.tag().cmp(b.tag()))
    });
    Ok(groups)
}

/// The newest `max_list` groups, the slice a front-end should present.
#[must_use]
pub fn visible(groups: &[VersionGroup], max_list: usize) -> &[VersionGroup] {
    &groups[..groups.len().min(max_list.max(1))]
}

/// Look up a presented entry, falling back to the newest one when the index
/// is out of range.
#[must_use]
pub fn pick(groups: &[VersionGroup], index: usize) -> Option<&VersionGroup> {
    groups.get(index).or_else(|| groups.first())
}

/// Canonical short identifier and date stamp used for the output file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactName {
    pub short_version: String,
    pub date_stamp: String,
}

impl ArtifactName {
    #[must_use]
    pub fn derive(group: &VersionGroup) -> Self {
        let short_build: String = group.build.chars().take(SHORT_BUILD_LEN).collect();
        Self {
            short_version: format!("nightly-{}-{short_build}", group.number),
            date_stamp: group.published_at().format("%d%b%y").to_string(),
        }
    }

    #[must_use]
    pub fn file_name(&self, product: &str) -> String {
        format!("{product}_{}_{}.zip", self.short_version, self.date_stamp)
    }
}
