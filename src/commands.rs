//! The operations a front end can invoke. Every command reports a
//! user-facing outcome instead of failing.

use crate::clipboard::ClipboardSink;
use crate::error::{ContextError, Result};
use crate::report::{Report, build_report};
use crate::store::SelectionStore;
use crate::utils::path_key;
use std::fs;
use std::path::Path;

/// Default file name for `download`.
pub const DEFAULT_DOWNLOAD_NAME: &str = "selected_files.txt";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutcome {
    pub success: bool,
    pub message: String,
}

impl CommandOutcome {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

pub fn toggle_selection(store: &mut SelectionStore, path: &Path) -> CommandOutcome {
    match store.toggle(path) {
        Ok(checked) => selection_message(store, path, checked),
        Err(err) => CommandOutcome::failed(format!("Could not toggle selection: {}", err)),
    }
}

pub fn set_selection(store: &mut SelectionStore, path: &Path, checked: bool) -> CommandOutcome {
    match store.set_checked(path, checked) {
        Ok(()) => selection_message(store, path, checked),
        Err(err) => CommandOutcome::failed(format!("Could not update selection: {}", err)),
    }
}

pub fn copy_selected_to_clipboard<C, F>(
    store: &SelectionStore,
    clipboard: &mut C,
    progress: F,
) -> CommandOutcome
where
    C: ClipboardSink + ?Sized,
    F: FnMut(&str),
{
    let report = build_report(store, progress);
    if report.is_empty() {
        return CommandOutcome::failed(no_files_message(&report));
    }
    let summary = summarize(&report);
    match clipboard.set_text(report.text) {
        Ok(()) => CommandOutcome::ok(format!("✅ Copied {} to the clipboard.", summary)),
        Err(err) => CommandOutcome::failed(format!("Error copying to clipboard: {:#}", err)),
    }
}

pub fn download_selected_to_file<F>(
    store: &SelectionStore,
    destination: &Path,
    progress: F,
) -> CommandOutcome
where
    F: FnMut(&str),
{
    let report = build_report(store, progress);
    if report.is_empty() {
        return CommandOutcome::failed(no_files_message(&report));
    }
    match write_report(&report, destination) {
        Ok(()) => CommandOutcome::ok(format!(
            "✅ Wrote {} to {}.",
            summarize(&report),
            destination.display()
        )),
        Err(err) => CommandOutcome::failed(err.to_string()),
    }
}

fn write_report(report: &Report, destination: &Path) -> Result<()> {
    fs::write(destination, &report.text).map_err(|err| {
        ContextError::Export(format!("could not write {}: {}", destination.display(), err))
    })
}

pub fn reset_to_default(store: &mut SelectionStore) -> CommandOutcome {
    store.reset_to_default();
    CommandOutcome::ok(format!(
        "Selection reset to defaults ({} files selected).",
        store.count_selected(Path::new(""))
    ))
}

pub fn clear_all(store: &mut SelectionStore) -> CommandOutcome {
    store.clear_all();
    CommandOutcome::ok("Selection cleared.")
}

/// Names the path by its root-relative key, `./` for the root.
fn selection_message(store: &SelectionStore, path: &Path, checked: bool) -> CommandOutcome {
    let shown = store
        .walker()
        .relativize(path)
        .map(|rel| path_key(&rel))
        .unwrap_or_else(|_| path.display().to_string());
    let shown = if shown.is_empty() { "./".to_string() } else { shown };
    CommandOutcome::ok(format!(
        "{} {}",
        if checked { "Selected" } else { "Deselected" },
        shown
    ))
}

fn summarize(report: &Report) -> String {
    let mut summary = format!(
        "{} file{} (≈ {} tokens)",
        report.files.len(),
        if report.files.len() == 1 { "" } else { "s" },
        report.approx_tokens()
    );
    if !report.skipped.is_empty() {
        summary.push_str(&format!(", {} unreadable skipped", report.skipped.len()));
    }
    summary
}

fn no_files_message(report: &Report) -> String {
    if report.skipped.is_empty() {
        "No files selected.".to_string()
    } else {
        format!(
            "No readable files selected ({} could not be read).",
            report.skipped.len()
        )
    }
}
