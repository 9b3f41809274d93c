use std::path::PathBuf;
use std::time::Duration;

use refpack_core::catalog::GITHUB_API;
use refpack_core::download::GITHUB_DOWNLOADS;
use refpack_core::{BuildConfig, FilterRules};
use refpack_platform::AppPaths;
use serde::{Deserialize, Serialize};

use crate::cli::Cli;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppSettings {
    #[serde(default = "default_api_base")]
    pub api_base: String,

    #[serde(default = "default_download_base")]
    pub download_base: String,

    #[serde(default = "default_repository")]
    pub repository: String,

    #[serde(default = "default_asset_name")]
    pub asset_name: String,

    #[serde(default = "default_product")]
    pub product: String,

    #[serde(default = "default_root_prefix")]
    pub root_prefix: String,

    #[serde(default)]
    pub filter_rules: FilterRules,

    #[serde(default = "default_max_list")]
    pub max_list: usize,

    #[serde(default)]
    pub dev_prefix: Option<String>,

    #[serde(default)]
    pub output_dir: Option<PathBuf>,

    #[serde(default = "default_true")]
    pub offer_downloads_copy: bool,

    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout_secs: u64,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    #[serde(default)]
    pub debug_logging: bool,

    #[serde(default = "default_max_log_size_bytes")]
    pub max_log_size_bytes: u64,
}

fn default_api_base() -> String {
    GITHUB_API.to_string()
}

fn default_download_base() -> String {
    GITHUB_DOWNLOADS.to_string()
}

fn default_repository() -> String {
    "praydog/REFramework-nightly".to_string()
}

fn default_asset_name() -> String {
    "MHWILDS.zip".to_string()
}

fn default_product() -> String {
    "REFramework".to_string()
}

fn default_root_prefix() -> String {
    "MHWILDS/".to_string()
}

fn default_max_list() -> usize {
    20
}

fn default_true() -> bool {
    true
}

fn default_fetch_timeout() -> u64 {
    30
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_max_log_size_bytes() -> u64 {
    5 * 1024 * 1024
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            download_base: default_download_base(),
            repository: default_repository(),
            asset_name: default_asset_name(),
            product: default_product(),
            root_prefix: default_root_prefix(),
            filter_rules: FilterRules::default(),
            max_list: default_max_list(),
            dev_prefix: None,
            output_dir: None,
            offer_downloads_copy: true,
            fetch_timeout_secs: default_fetch_timeout(),
            connect_timeout_secs: default_connect_timeout(),
            debug_logging: false,
            max_log_size_bytes: default_max_log_size_bytes(),
        }
    }
}

impl AppSettings {
    pub fn load() -> Self {
        let Ok(paths) = AppPaths::new() else {
            return Self::default();
        };
        let settings_path = paths.settings_file();

        if settings_path.exists() {
            match std::fs::read_to_string(&settings_path) {
                Ok(content) => serde_json::from_str(&content).unwrap_or_default(),
                Err(_) => Self::default(),
            }
        } else {
            Self::default()
        }
    }

    pub fn save(&self) -> Result<(), std::io::Error> {
        let paths = AppPaths::new().map_err(std::io::Error::other)?;
        paths.ensure_dirs()?;

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(paths.settings_file(), content)?;
        Ok(())
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Merge command-line overrides into a run configuration.
    ///
    /// `max_list` is the already-confirmed display limit; `delivery_dir` is the
    /// Downloads folder when one was found.
    pub fn build_config(
        &self,
        cli: &Cli,
        max_list: usize,
        delivery_dir: Option<PathBuf>,
    ) -> Result<BuildConfig, std::io::Error> {
        let output_dir = match cli.output_dir.clone().or_else(|| self.output_dir.clone()) {
            Some(dir) => dir,
            None => std::env::current_dir()?,
        };
        let delivery_dir = if cli.no_delivery || !self.offer_downloads_copy {
            None
        } else {
            delivery_dir
        };

        Ok(BuildConfig {
            api_base: self.api_base.clone(),
            download_base: self.download_base.clone(),
            repository: self.repository.clone(),
            asset_name: self.asset_name.clone(),
            product: self.product.clone(),
            root_prefix: self.root_prefix.clone(),
            rules: self.filter_rules.clone(),
            max_list,
            dev_prefix: cli
                .dev_prefix
                .clone()
                .or_else(|| self.dev_prefix.clone())
                .filter(|prefix| !prefix.is_empty()),
            skip_download: cli.skip_download,
            output_dir,
            delivery_dir,
            fetch_timeout: Duration::from_secs(self.fetch_timeout_secs),
        })
    }

    /// The display limit before any interactive override.
    pub fn initial_max_list(&self, cli: &Cli) -> usize {
        cli.max_list
            .filter(|n| *n > 0)
            .unwrap_or(self.max_list)
            .max(1)
    }
}
