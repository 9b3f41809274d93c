use std::fmt::Write as _;
use std::path::Path;

use console::style;
use refpack_core::{ArchiveSummary, BuildError, BuildOutcome, BuildReport, VersionGroup};

pub fn step(message: impl std::fmt::Display) {
    println!("{} {message}", style("==>").cyan().bold());
}

pub fn notice(message: impl std::fmt::Display) {
    println!("{} {message}", style("(!)").yellow().bold());
}

/// One numbered line per offered version, newest first.
pub fn version_list(versions: &[VersionGroup]) -> String {
    let mut out = String::new();
    for (position, group) in versions.iter().enumerate() {
        let _ = writeln!(
            out,
            " {}. {}  ({})  {}",
            position + 1,
            group.number,
            group.tag(),
            group.published_at().format("%Y-%m-%d %H:%M:%S")
        );
    }
    out
}

pub fn print_versions(versions: &[VersionGroup]) {
    print!("{}", version_list(versions));
}

pub fn summary_text(summary: &ArchiveSummary) -> String {
    let mut out = String::new();
    for entry in &summary.entries {
        let _ = writeln!(out, "  {entry}");
    }
    let _ = writeln!(out, "Total files: {}", summary.file_count);
    out
}

fn print_report(report: &BuildReport) {
    print!("{}", summary_text(&report.summary));
    if let Some(stats) = &report.stats {
        step(format!(
            "Kept {} of {} entries ({} filtered out)",
            stats.copied, stats.total, stats.skipped
        ));
    }
    if let Some(delivered) = &report.delivered {
        step(format!("Copied to {}", display_dir(delivered)));
    }
}

fn display_dir(path: &Path) -> String {
    path.parent().unwrap_or(path).display().to_string()
}

pub fn print_outcome(outcome: &BuildOutcome) {
    match outcome {
        BuildOutcome::Cancelled => println!("Exiting as requested."),
        BuildOutcome::DryRun {
            tag,
            published_at,
            artifact,
        } => {
            step(format!("Found tag: {tag}"));
            step(format!(
                "Published {}; download skipped, would create {}",
                published_at.format("%Y-%m-%d %H:%M:%S"),
                artifact.display()
            ));
        }
        BuildOutcome::Built(report) => {
            step(format!(
                "Created {}",
                style(report.artifact.display()).green().bold()
            ));
            print_report(report);
        }
        BuildOutcome::Reused(report) => {
            step(format!(
                "Using existing {}",
                style(report.artifact.display()).green()
            ));
            print_report(report);
        }
    }
}

pub fn print_error(error: &BuildError) {
    eprintln!("{} {error}", style("error:").red().bold());
    log::error!("{} stage failed: {error:?}", error.stage());
}
