use std::path::Path;

use refpack_core::{Interaction, Selection, VersionGroup};

use crate::report::{print_versions, step};

/// Unattended front-end: newest release, always rebuild, always deliver.
#[derive(Debug, Default)]
pub struct SilentInteraction;

impl Interaction for SilentInteraction {
    fn choose_release(&mut self, versions: &[VersionGroup]) -> Selection {
        print_versions(versions);
        if let Some(latest) = versions.first() {
            println!(
                "Silent Mode: Automatically chose version 1 ({})",
                latest.number
            );
        }
        Selection::Index(0)
    }

    fn confirm_rebuild(&mut self, artifact: &Path) -> bool {
        step(format!("Archive {} already exists.", artifact.display()));
        println!("Silent Mode: Rebuilding existing archive.");
        true
    }

    fn confirm_delivery(&mut self, _destination: &Path) -> bool {
        true
    }
}
