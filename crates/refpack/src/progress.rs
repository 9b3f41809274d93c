use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use refpack_core::BuildProgress;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::report;

/// Resolution of the transcode bar.
const TRANSCODE_STEPS: u64 = 1000;

fn spinner_style() -> ProgressStyle {
    ProgressStyle::with_template("{spinner:.green} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
}

fn bytes_style() -> ProgressStyle {
    ProgressStyle::with_template(
        "==> {msg} [{bar:30.yellow/dim}] {bytes:>9}/{total_bytes:9} {percent:>3}%",
    )
    .unwrap_or_else(|_| ProgressStyle::default_bar())
    .progress_chars("━━╾─")
}

fn ratio_style() -> ProgressStyle {
    ProgressStyle::with_template("==> {msg} [{bar:30.cyan/dim}] {percent:>3}%")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("━━╾─")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Fetching,
    Downloading,
    Transcoding,
    Delivering,
}

/// Line printed once the catalog has been resolved.
pub fn resolved_message(versions: usize, from_cache: bool) -> String {
    let mut message = format!("Found {versions} numeric nightly version(s)");
    if from_cache {
        message.push_str(" (using cached release list)");
    }
    message
}

/// Terminal rendering of pipeline progress.
///
/// Clones share the bar currently on screen so a prompt can clear it first,
/// and can wait for the resolve summary to be printed before drawing a menu.
#[derive(Clone, Default)]
pub struct ProgressView {
    current: Arc<Mutex<Option<(Phase, ProgressBar)>>>,
    resolved: Arc<(Mutex<bool>, Condvar)>,
}

impl ProgressView {
    pub fn new() -> Self {
        Self::default()
    }

    /// Render events until every sender is dropped.
    pub fn spawn(&self, mut events: mpsc::Receiver<BuildProgress>) -> JoinHandle<()> {
        let view = self.clone();
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                view.apply(&event);
            }
            view.clear();
        })
    }

    /// Remove whatever bar is on screen.
    pub fn clear(&self) {
        if let Some((_, bar)) = self.lock().take() {
            bar.finish_and_clear();
        }
    }

    /// Block until the resolve summary is on screen, or `timeout` passes.
    pub fn wait_for_resolved(&self, timeout: Duration) {
        let (seen, signal) = &*self.resolved;
        let guard = seen.lock().unwrap_or_else(PoisonError::into_inner);
        let _ = signal.wait_timeout_while(guard, timeout, |seen| !*seen);
    }

    fn mark_resolved(&self) {
        let (seen, signal) = &*self.resolved;
        *seen.lock().unwrap_or_else(PoisonError::into_inner) = true;
        signal.notify_all();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<(Phase, ProgressBar)>> {
        self.current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn apply(&self, event: &BuildProgress) {
        match *event {
            BuildProgress::Fetching => {
                self.show_spinner(Phase::Fetching, "Fetching recent nightly releases...");
            }
            BuildProgress::Resolved {
                versions,
                from_cache,
            } => {
                self.clear();
                report::step(resolved_message(versions, from_cache));
                self.mark_resolved();
            }
            BuildProgress::Downloading { downloaded, total } => {
                let bar = self.bar_for(Phase::Downloading, || {
                    let bar = ProgressBar::new(total);
                    bar.set_style(bytes_style());
                    bar.set_message("Downloading");
                    bar
                });
                if total > 0 && bar.length() != Some(total) {
                    bar.set_length(total);
                }
                bar.set_position(downloaded);
            }
            BuildProgress::Transcoding(ratio) => {
                let bar = self.bar_for(Phase::Transcoding, || {
                    let bar = ProgressBar::new(TRANSCODE_STEPS);
                    bar.set_style(ratio_style());
                    bar.set_message("Repackaging");
                    bar
                });
                bar.set_position(ratio_to_steps(ratio));
            }
            BuildProgress::Delivering => {
                self.show_spinner(Phase::Delivering, "Copying archive...");
            }
        }
    }

    fn show_spinner(&self, phase: Phase, message: &'static str) {
        let bar = self.bar_for(phase, || {
            let bar = ProgressBar::new_spinner();
            bar.set_style(spinner_style());
            bar.enable_steady_tick(Duration::from_millis(100));
            bar
        });
        bar.set_message(message);
    }

    /// The bar for `phase`, replacing any bar left over from an earlier phase.
    fn bar_for(&self, phase: Phase, create: impl FnOnce() -> ProgressBar) -> ProgressBar {
        let mut current = self.lock();
        if let Some((existing, bar)) = current.as_ref()
            && *existing == phase
        {
            return bar.clone();
        }
        if let Some((_, previous)) = current.take() {
            previous.finish_and_clear();
        }
        let bar = create();
        *current = Some((phase, bar.clone()));
        bar
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn ratio_to_steps(ratio: f64) -> u64 {
    (ratio.clamp(0.0, 1.0) * TRANSCODE_STEPS as f64).round() as u64
}
