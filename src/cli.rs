use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// llm-context – pick files in a workspace and yank them as one LLM context
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Workspace root (defaults to CWD). Paths given to commands are
    /// relative to it.
    #[arg(short = 'C', long = "root", value_name = "DIR", default_value = ".", global = true)]
    pub root: PathBuf,

    /// Extra names or glob patterns to exclude at any depth (e.g. "*.snap,fixtures").
    #[arg(long, value_delimiter = ',', value_name = "PATTERNS", global = true)]
    pub exclude: Vec<String>,

    /// Extra file extensions to treat as non-text (e.g. "psd,raw").
    #[arg(long, value_delimiter = ',', value_name = "EXTENSIONS", global = true)]
    pub non_text: Vec<String>,

    /// Start from an empty exclusion list instead of the built-in defaults.
    #[arg(long, global = true)]
    pub no_default_excludes: bool,

    /// Also exclude paths matched by the workspace's root .gitignore
    #[arg(long, global = true)]
    pub respect_gitignore: bool,

    /// File where selections are remembered between runs.
    #[arg(long, value_name = "FILE", global = true)]
    pub state_file: Option<PathBuf>,

    /// Keep the selection in memory only.
    #[arg(long, global = true, conflicts_with = "state_file")]
    pub no_persist: bool,

    /// More log output (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// No log output at all
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Interactive tree view (default)
    Tui,
    /// Flip the selection of one or more paths
    Toggle {
        #[arg(required = true, value_name = "PATH")]
        paths: Vec<PathBuf>,
    },
    /// Select paths
    Check {
        #[arg(required = true, value_name = "PATH")]
        paths: Vec<PathBuf>,
    },
    /// Deselect paths
    Uncheck {
        #[arg(required = true, value_name = "PATH")]
        paths: Vec<PathBuf>,
    },
    /// Copy the selected files to the clipboard
    Copy,
    /// Write the selected files to a text file
    Download {
        #[arg(value_name = "DEST", default_value = crate::commands::DEFAULT_DOWNLOAD_NAME)]
        destination: PathBuf,
    },
    /// Print the report to stdout instead of copying it
    Print,
    /// Restore the default selection
    Reset,
    /// Deselect everything
    Clear,
    /// List the selected files
    List,
    /// Show how many files are selected
    Status,
    /// Re-sync the selection after files changed on disk
    Refresh {
        #[arg(value_name = "PATH", default_value = ".")]
        path: PathBuf,
    },
}
