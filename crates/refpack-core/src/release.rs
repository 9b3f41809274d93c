use chrono::{DateTime, Utc};
use serde::Deserialize;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ReleaseAsset {
    pub name: String,
    pub browser_download_url: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub digest: Option<String>,
}

impl ReleaseAsset {
    /// Lowercase hex SHA-256 of the asset, when GitHub published one.
    #[must_use]
    pub fn sha256(&self) -> Option<String> {
        parse_sha256_digest(self.digest.as_deref()?)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Release {
    pub tag: String,
    pub published_at: DateTime<Utc>,
    pub assets: Vec<ReleaseAsset>,
}

impl Release {
    #[must_use]
    pub fn asset(&self, name: &str) -> Option<&ReleaseAsset> {
        self.assets.iter().find(|asset| asset.name == name)
    }
}

#[derive(Deserialize)]
struct RawRelease {
    tag_name: String,
    #[serde(default)]
    published_at: Option<DateTime<Utc>>,
    #[serde(default)]
    assets: Vec<ReleaseAsset>,
}

/// Parse a GitHub releases API body.
///
/// Drafts have no publish date and are dropped here, since nothing downstream
/// can order them.
///
/// # Errors
/// Returns an error when the body is not a JSON array of release objects.
pub fn parse_catalog(body: &[u8]) -> Result<Vec<Release>, serde_json::Error> {
    let raw: Vec<RawRelease> = serde_json::from_slice(body)?;

    Ok(raw
        .into_iter()
        .filter_map(|r| {
            Some(Release {
                tag: r.tag_name,
                published_at: r.published_at?,
                assets: r.assets,
            })
        })
        .collect())
}

fn parse_sha256_digest(digest: &str) -> Option<String> {
    let (algorithm, hash) = digest.split_once(':')?;
    if !algorithm.eq_ignore_ascii_case("sha256") {
        return None;
    }
    if hash.len() != 64 || !hash.chars().all(|ch| ch.is_ascii_hexdigit()) {
        return None;
    }
    Some(hash.to_ascii_lowercase())
}
