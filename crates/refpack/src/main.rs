mod cli;
mod logging;
mod progress;
mod prompt;
mod report;
mod settings;
mod silent;

use std::io::IsTerminal;
use std::process::ExitCode;

use clap::Parser;
use log::{info, warn};
use refpack_core::{BuildOutcome, FileCacheStore, Pipeline};
use refpack_platform::{AppPaths, downloads_dir};
use tokio::sync::mpsc;

use crate::cli::Cli;
use crate::progress::ProgressView;
use crate::prompt::ConsoleInteraction;
use crate::settings::AppSettings;
use crate::silent::SilentInteraction;

/// Exit status when the user backs out of the release menu.
const EXIT_BY_REQUEST: u8 = 2;

const FALLBACK_CACHE_DIR: &str = ".cache_github";

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let settings = AppSettings::load();
    logging::init_logging(
        cli.debug || settings.debug_logging,
        settings.max_log_size_bytes,
    );
    info!("refpack {} starting", env!("CARGO_PKG_VERSION"));

    if cli.write_settings {
        return write_settings(&settings);
    }

    // Without a terminal there is nobody to answer prompts.
    let silent = cli.silent || !console::user_attended() || !std::io::stdin().is_terminal();
    let code = run(&cli, &settings, silent).await;

    if !silent {
        prompt::pause();
    }
    code
}

async fn run(cli: &Cli, settings: &AppSettings, silent: bool) -> ExitCode {
    let mut max_list = settings.initial_max_list(cli);
    if !silent {
        max_list = prompt::prompt_max_list(max_list);
    }

    let config = match settings.build_config(cli, max_list, downloads_dir()) {
        Ok(config) => config,
        Err(error) => {
            report::notice(format!("Cannot determine the output directory: {error}"));
            return ExitCode::FAILURE;
        }
    };

    let client = reqwest::Client::builder()
        .connect_timeout(settings.connect_timeout())
        .build()
        .unwrap_or_default();
    let store = cache_store();

    let view = ProgressView::new();
    let (sender, receiver) = mpsc::channel(64);
    let renderer = view.spawn(receiver);

    let pipeline = Pipeline::new(&client, &config, &store);
    let result = if silent {
        pipeline.run(&mut SilentInteraction, &sender).await
    } else {
        let mut interaction = ConsoleInteraction::new(max_list, view.clone());
        pipeline.run(&mut interaction, &sender).await
    };

    drop(sender);
    if let Err(error) = renderer.await {
        warn!("Progress renderer stopped: {error}");
    }

    match result {
        Ok(outcome) => {
            report::print_outcome(&outcome);
            if matches!(outcome, BuildOutcome::Cancelled) {
                ExitCode::from(EXIT_BY_REQUEST)
            } else {
                ExitCode::SUCCESS
            }
        }
        Err(error) => {
            report::print_error(&error);
            ExitCode::FAILURE
        }
    }
}

fn write_settings(settings: &AppSettings) -> ExitCode {
    match settings.save() {
        Ok(()) => {
            if let Ok(paths) = AppPaths::new() {
                report::step(format!("Wrote {}", paths.settings_file().display()));
            }
            ExitCode::SUCCESS
        }
        Err(error) => {
            report::notice(format!("Failed to write settings: {error}"));
            ExitCode::FAILURE
        }
    }
}

/// Catalog cache under the user cache directory, or next to the working
/// directory when no home is available.
fn cache_store() -> FileCacheStore {
    match AppPaths::new() {
        Ok(paths) => {
            if let Err(error) = paths.ensure_dirs() {
                warn!("Failed to create app directories: {error}");
            }
            FileCacheStore::from_paths(&paths)
        }
        Err(error) => {
            warn!("No user cache directory ({error}), using {FALLBACK_CACHE_DIR}");
            let dir = std::path::Path::new(FALLBACK_CACHE_DIR);
            FileCacheStore::new(dir.join("releases.json"), dir.join("etag"))
        }
    }
}
