use std::io::Read;
use std::path::Path;

use futures_util::StreamExt;
use log::{debug, info};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio::io::AsyncWriteExt;

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("{context}: {source}")]
    Http {
        context: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("asset download failed with HTTP {status} for {url}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },
    #[error("{context}: {source}")]
    Io {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },
    #[error("checksum mismatch for {asset}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        asset: String,
        expected: String,
        actual: String,
    },
}

impl DownloadError {
    fn http(context: &'static str, source: reqwest::Error) -> Self {
        Self::Http { context, source }
    }

    fn io_with_path(context: &'static str, path: &Path, source: &std::io::Error) -> Self {
        Self::Io {
            context,
            source: std::io::Error::new(source.kind(), format!("{}: {source}", path.display())),
        }
    }
}

/// Default host serving release assets.
pub const GITHUB_DOWNLOADS: &str = "https://github.com";

#[must_use]
pub fn asset_url(download_base: &str, repository: &str, tag: &str, asset: &str) -> String {
    let download_base = download_base.trim_end_matches('/');
    format!("{download_base}/{repository}/releases/download/{tag}/{asset}")
}

/// Stream `url` into `dest`, calling `on_progress(downloaded, total)` per
/// chunk. `total` is 0 when the server sends no length.
///
/// # Errors
/// Returns an error on transport failure, a non-success status, or a failed
/// write to `dest`.
pub async fn download_file(
    client: &reqwest::Client,
    url: &str,
    dest: &Path,
    mut on_progress: impl FnMut(u64, u64),
) -> Result<u64, DownloadError> {
    let response = client
        .get(url)
        .header("User-Agent", concat!("refpack/", env!("CARGO_PKG_VERSION")))
        .send()
        .await
        .map_err(|error| DownloadError::http("download request failed", error))?;

    if !response.status().is_success() {
        return Err(DownloadError::Status {
            url: url.to_string(),
            status: response.status(),
        });
    }

    let total = response.content_length().unwrap_or(0);
    let mut downloaded: u64 = 0;

    let mut file = tokio::fs::File::create(dest).await.map_err(|error| {
        DownloadError::io_with_path("failed to create download file", dest, &error)
    })?;

    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|error| DownloadError::http("download stream error", error))?;
        file.write_all(&chunk).await.map_err(|error| {
            DownloadError::io_with_path("failed to write download data", dest, &error)
        })?;
        downloaded += chunk.len() as u64;
        on_progress(downloaded, total);
    }

    file.flush().await.map_err(|error| {
        DownloadError::io_with_path("failed to flush download file", dest, &error)
    })?;

    info!("Download complete: {downloaded} bytes");
    Ok(downloaded)
}

/// Compare the SHA-256 of `path` against `expected`.
///
/// # Errors
/// Returns an error if the file cannot be read or the digests differ.
pub fn verify_sha256(path: &Path, asset: &str, expected: &str) -> Result<(), DownloadError> {
    let actual = sha256_file(path)?;
    if actual.eq_ignore_ascii_case(expected) {
        debug!("Checksum verified for {asset}");
        return Ok(());
    }
    Err(DownloadError::ChecksumMismatch {
        asset: asset.to_string(),
        expected: expected.to_ascii_lowercase(),
        actual,
    })
}

fn sha256_file(path: &Path) -> Result<String, DownloadError> {
    let mut file = std::fs::File::open(path).map_err(|error| {
        DownloadError::io_with_path("failed to open file for checksum", path, &error)
    })?;
    let mut hasher = Sha256::new();
    let mut buffer = [0_u8; 8192];

    loop {
        let read = file.read(&mut buffer).map_err(|error| {
            DownloadError::io_with_path("failed to read file for checksum", path, &error)
        })?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::{DownloadError, GITHUB_DOWNLOADS, asset_url, verify_sha256};

    #[test]
    fn asset_url_is_templated_by_tag() {
        assert_eq!(
            asset_url(
                GITHUB_DOWNLOADS,
                "praydog/REFramework-nightly",
                "nightly-1050-def456",
                "MHWILDS.zip"
            ),
            "https://github.com/praydog/REFramework-nightly/releases/download/nightly-1050-def456/MHWILDS.zip"
        );
    }

    #[test]
    fn verify_sha256_accepts_known_digest_in_any_case() {
        let temp = tempfile::tempdir().expect("tempdir should be created");
        let path = temp.path().join("payload.bin");
        std::fs::write(&path, b"abc").expect("payload should be written");

        verify_sha256(
            &path,
            "payload.bin",
            "BA7816BF8F01CFEA414140DE5DAE2223B00361A396177A9CB410FF61F20015AD",
        )
        .expect("digest should match");
    }

    #[test]
    fn verify_sha256_rejects_mismatch() {
        let temp = tempfile::tempdir().expect("tempdir should be created");
        let path = temp.path().join("payload.bin");
        std::fs::write(&path, b"abc").expect("payload should be written");

        let result = verify_sha256(
            &path,
            "payload.bin",
            "0000000000000000000000000000000000000000000000000000000000000000",
        );

        assert!(matches!(
            result,
            Err(DownloadError::ChecksumMismatch { ref actual, .. })
                if actual == "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        ));
    }
}
