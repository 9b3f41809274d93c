use std::io::Write as _;
use std::path::Path;
use std::time::Duration;

use console::Term;
use dialoguer::theme::ColorfulTheme;
use dialoguer::{Confirm, Input, Select};
use log::warn;
use refpack_core::{Interaction, Selection, VersionGroup};

use crate::progress::ProgressView;
use crate::report::{print_versions, step};

/// How long a menu waits for the resolve summary to be printed above it.
const RESOLVE_SETTLE: Duration = Duration::from_secs(1);

/// Run a blocking terminal prompt without stalling other runtime tasks.
fn blocking<T>(prompt: impl FnOnce() -> T) -> T {
    tokio::task::block_in_place(prompt)
}

/// Interactive front-end backed by dialoguer prompts.
pub struct ConsoleInteraction {
    max_list: usize,
    view: ProgressView,
}

impl ConsoleInteraction {
    pub fn new(max_list: usize, view: ProgressView) -> Self {
        Self { max_list, view }
    }
}

fn release_label(group: &VersionGroup) -> String {
    format!(
        "{}  ({})  {}",
        group.number,
        group.tag(),
        group.published_at().format("%Y-%m-%d %H:%M:%S")
    )
}

/// Map a menu position to a selection. The entry after the last version
/// means exit.
fn selection_for(choice: Option<usize>, versions: usize) -> Selection {
    match choice {
        Some(index) if index < versions => Selection::Index(index),
        _ => Selection::Exit,
    }
}

/// Parse an answer to the display-limit prompt; blank or invalid keeps
/// `current`.
fn parse_max_list(answer: &str, current: usize) -> usize {
    match answer.trim().parse::<usize>() {
        Ok(n) if n > 0 => n,
        _ => current,
    }
}

impl Interaction for ConsoleInteraction {
    fn choose_release(&mut self, versions: &[VersionGroup]) -> Selection {
        blocking(|| self.view.wait_for_resolved(RESOLVE_SETTLE));
        self.view.clear();

        if self.max_list == 1 {
            print_versions(versions);
            if let Some(latest) = versions.first() {
                println!(
                    "Display limit is 1: Automatically selecting latest version ({})",
                    latest.number
                );
            }
            return Selection::Index(0);
        }

        let mut items: Vec<String> = versions.iter().map(release_label).collect();
        items.push("Exit".to_string());

        let choice = blocking(|| {
            Select::with_theme(&ColorfulTheme::default())
                .with_prompt(format!("Choose a version (1-{})", versions.len()))
                .items(&items)
                .default(0)
                .report(false)
                .interact_opt()
        });

        match choice {
            Ok(choice) => selection_for(choice, versions.len()),
            Err(error) => {
                warn!("Release prompt failed, using the newest release: {error}");
                Selection::Index(0)
            }
        }
    }

    fn confirm_rebuild(&mut self, artifact: &Path) -> bool {
        self.view.clear();
        step(format!("Archive {} already exists.", artifact.display()));

        let rebuild = blocking(|| {
            Confirm::with_theme(&ColorfulTheme::default())
                .with_prompt("Do you want to rebuild it anyway?")
                .default(false)
                .interact()
                .unwrap_or(false)
        });
        if !rebuild {
            step("Skipping rebuild.");
        }
        rebuild
    }

    fn confirm_delivery(&mut self, destination: &Path) -> bool {
        self.view.clear();
        let folder = destination.parent().unwrap_or(destination);

        blocking(|| {
            Confirm::with_theme(&ColorfulTheme::default())
                .with_prompt(format!(
                    "Do you want to copy the archive to {}?",
                    folder.display()
                ))
                .default(false)
                .interact()
                .unwrap_or(false)
        })
    }
}

/// Ask how many releases to offer, keeping `current` on a blank answer.
pub fn prompt_max_list(current: usize) -> usize {
    let answer: Result<String, _> = blocking(|| {
        Input::with_theme(&ColorfulTheme::default())
            .with_prompt("How many releases to display?")
            .default(current.to_string())
            .allow_empty(true)
            .interact_text()
    });

    match answer {
        Ok(answer) => parse_max_list(&answer, current),
        Err(error) => {
            warn!("Display limit prompt failed: {error}");
            current
        }
    }
}

pub fn pause() {
    print!("\nPress Enter to exit...");
    let _ = std::io::stdout().flush();
    let _ = blocking(|| Term::stdout().read_line());
}
