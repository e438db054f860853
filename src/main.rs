use anyhow::Result;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use llm_context::cli::{Cli, Command};
use llm_context::clipboard::{self, SystemClipboard};
use llm_context::commands::{self, CommandOutcome};
use llm_context::config::{Config, StateLocation};
use llm_context::persistence::{JsonFileStateStore, MemoryStateStore, StateStore};
use llm_context::store::SelectionStore;
use llm_context::tree_builder::build_tree_labels;
use llm_context::{build_report, tui};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::process;
use std::time::Duration;

fn main() {
    // The clipboard daemon is re-executed from this binary; leave early.
    match clipboard::check_and_run_daemon_if_requested() {
        Ok(true) => return,
        Ok(false) => {}
        Err(e) => {
            eprintln!("Clipboard daemon failed: {:#}", e);
            process::exit(1);
        }
    }

    let cli_args = Cli::parse();
    setup_logging(cli_args.quiet, cli_args.verbose);
    log::debug!("CLI args parsed: {:?}", cli_args);

    let exit_code = match run(cli_args) {
        Ok(true) => 0,
        Ok(false) => 1,
        Err(e) => {
            log::error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            2
        }
    };
    process::exit(exit_code);
}

fn setup_logging(quiet: bool, verbose: u8) {
    let log_level = if quiet {
        log::LevelFilter::Off
    } else {
        match verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            2 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        }
    };
    env_logger::Builder::new()
        .filter_level(log_level)
        .format_timestamp(None)
        .init();
    log::trace!("Logger initialized with level: {:?}", log_level);
}

/// Returns whether the command succeeded.
fn run(cli_args: Cli) -> Result<bool> {
    let config = Config::from_cli(&cli_args)?;
    let state: Box<dyn StateStore> = match &config.state {
        StateLocation::File(path) => Box::new(JsonFileStateStore::new(path)),
        StateLocation::Memory => Box::new(MemoryStateStore::new()),
    };
    let mut store = SelectionStore::open(&config.root, &config.policy, state);

    let outcome = match cli_args.command.unwrap_or(Command::Tui) {
        Command::Tui => {
            tui::run_tui(&mut store, &mut SystemClipboard)?;
            return Ok(true);
        }
        Command::Toggle { paths } => {
            for_each_path(&paths, |p| commands::toggle_selection(&mut store, p))
        }
        Command::Check { paths } => {
            for_each_path(&paths, |p| commands::set_selection(&mut store, p, true))
        }
        Command::Uncheck { paths } => {
            for_each_path(&paths, |p| commands::set_selection(&mut store, p, false))
        }
        Command::Copy => {
            let spinner = spinner("Copying selected files...");
            let outcome = commands::copy_selected_to_clipboard(
                &store,
                &mut SystemClipboard,
                |msg| spinner.set_message(msg.to_string()),
            );
            spinner.finish_and_clear();
            outcome
        }
        Command::Download { destination } => {
            let spinner = spinner("Preparing selected files for download...");
            let outcome = commands::download_selected_to_file(&store, &destination, |msg| {
                spinner.set_message(msg.to_string())
            });
            spinner.finish_and_clear();
            outcome
        }
        Command::Print => {
            let report = build_report(&store, |msg| log::debug!("{}", msg));
            print!("{}", report.text);
            return Ok(!report.is_empty());
        }
        Command::Reset => commands::reset_to_default(&mut store),
        Command::Clear => commands::clear_all(&mut store),
        Command::List => {
            print_selected_tree(&store);
            return Ok(true);
        }
        Command::Status => CommandOutcome::ok(format!(
            "{} files selected in {} ({} checked entries).",
            store.count_selected(Path::new("")),
            store.root().display(),
            store.explicit().len()
        )),
        Command::Refresh { path } => match store.invalidate(&path) {
            Ok(()) => CommandOutcome::ok(format!(
                "Refreshed {}; {} files selected.",
                path.display(),
                store.count_selected(Path::new(""))
            )),
            Err(e) => CommandOutcome::failed(format!("Refresh failed: {}", e)),
        },
    };

    if outcome.success {
        println!("{}", outcome.message);
    } else {
        eprintln!("{}", outcome.message);
    }
    Ok(outcome.success)
}

/// Applies `op` to every path; the combined outcome fails if any did.
fn for_each_path<F>(paths: &[PathBuf], mut op: F) -> CommandOutcome
where
    F: FnMut(&Path) -> CommandOutcome,
{
    let outcomes: Vec<CommandOutcome> = paths.iter().map(|p| op(p.as_path())).collect();
    let message = outcomes
        .iter()
        .map(|o| o.message.as_str())
        .collect::<Vec<_>>()
        .join("\n");
    CommandOutcome {
        success: outcomes.iter().all(|o| o.success),
        message,
    }
}

fn spinner(prefix: &str) -> ProgressBar {
    let progress = ProgressBar::new_spinner();
    progress.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {prefix:.bold.cyan} {wide_msg:.dim}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    progress.set_prefix(prefix.to_string());
    progress.enable_steady_tick(Duration::from_millis(100));
    progress
}

/// Prints the selected files and their ancestors as a tree.
fn print_selected_tree(store: &SelectionStore) {
    let files = store.selected_files();
    if files.is_empty() {
        println!("(No files selected)");
        return;
    }
    let mut nodes: BTreeSet<(PathBuf, bool)> = BTreeSet::new();
    for file in &files {
        for ancestor in file.ancestors().skip(1) {
            if !ancestor.as_os_str().is_empty() {
                nodes.insert((ancestor.to_path_buf(), true));
            }
        }
        nodes.insert((file.clone(), false));
    }
    let nodes: Vec<(PathBuf, bool)> = nodes.into_iter().collect();
    println!("./");
    for label in build_tree_labels(&nodes) {
        println!("{}", label);
    }
    println!("\n{} files selected.", files.len());
}
