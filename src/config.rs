use crate::cli::{Cli, Command};
use crate::error::{ContextError, Result};
use std::path::{Path, PathBuf};

/// Names and glob patterns that are structurally excluded at any depth.
const DEFAULT_EXCLUDED_NAMES: &[&str] = &[
    // Version control
    ".git",
    ".svn",
    ".hg",
    // Dependencies
    "node_modules",
    "bower_components",
    "vendor",
    ".venv",
    "venv",
    "__pycache__",
    // Build output
    "dist",
    "build",
    "out",
    "target",
    ".next",
    "coverage",
    // OS and editor artifacts
    ".DS_Store",
    "Thumbs.db",
    ".vscode",
    ".idea",
    "*.swp",
    // Secrets
    ".env",
    // Lockfiles
    "package-lock.json",
    "yarn.lock",
    "pnpm-lock.yaml",
    "Cargo.lock",
    "composer.lock",
    "*.lock",
    // Logs and caches
    "logs",
    "*.log",
    ".cache",
    ".pytest_cache",
    "tmp",
    // Our own export
    crate::commands::DEFAULT_DOWNLOAD_NAME,
];

/// Extensions (with leading dot, lowercase) of files that are never text.
const DEFAULT_NON_TEXT_EXTENSIONS: &[&str] = &[
    // Images
    ".jpg", ".jpeg", ".png", ".gif", ".bmp", ".svg", ".ico", ".webp", ".tiff",
    // Video
    ".mp4", ".avi", ".mov", ".wmv", ".mkv", ".webm",
    // Audio
    ".mp3", ".wav", ".flac", ".ogg", ".aac",
    // Archives
    ".zip", ".rar", ".7z", ".tar", ".gz", ".bz2", ".xz",
    // Binaries
    ".exe", ".dll", ".so", ".dylib", ".o", ".a", ".class", ".jar", ".wasm", ".bin",
    // Fonts
    ".ttf", ".otf", ".woff", ".woff2", ".eot",
    // Documents
    ".pdf", ".doc", ".docx", ".xls", ".xlsx", ".ppt", ".pptx",
    // Databases
    ".db", ".sqlite", ".sqlite3",
];

/// Immutable exclusion rules handed to the classifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExclusionPolicy {
    pub excluded_names: Vec<String>,
    /// Root-relative paths excluded together with everything below them.
    pub excluded_paths: Vec<PathBuf>,
    pub non_text_extensions: Vec<String>,
    pub respect_gitignore: bool,
}

impl Default for ExclusionPolicy {
    fn default() -> Self {
        Self {
            excluded_names: DEFAULT_EXCLUDED_NAMES.iter().map(|s| s.to_string()).collect(),
            excluded_paths: Vec::new(),
            non_text_extensions: DEFAULT_NON_TEXT_EXTENSIONS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            respect_gitignore: false,
        }
    }
}

impl ExclusionPolicy {
    /// A policy that excludes nothing.
    pub fn empty() -> Self {
        Self {
            excluded_names: Vec::new(),
            excluded_paths: Vec::new(),
            non_text_extensions: Vec::new(),
            respect_gitignore: false,
        }
    }

    pub fn with_excluded_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.excluded_names.extend(names.into_iter().map(Into::into));
        self
    }

    pub fn with_excluded_paths<I, P>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.excluded_paths.extend(paths.into_iter().map(Into::into));
        self
    }

    /// Extensions are accepted with or without the leading dot.
    pub fn with_non_text_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.non_text_extensions
            .extend(extensions.into_iter().map(|ext| normalize_extension(&ext.into())));
        self
    }
}

fn normalize_extension(ext: &str) -> String {
    let ext = ext.trim().to_lowercase();
    if ext.starts_with('.') {
        ext
    } else {
        format!(".{}", ext)
    }
}

/// Where the explicit set is persisted between runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateLocation {
    File(PathBuf),
    Memory,
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Canonical workspace root
    pub root: PathBuf,
    pub policy: ExclusionPolicy,
    pub state: StateLocation,
}

impl Config {
    pub fn from_cli(cli: &Cli) -> Result<Self> {
        if !cli.root.is_dir() {
            return Err(ContextError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("Workspace root not found: {}", cli.root.display()),
            )));
        }
        let root = cli.root.canonicalize()?;

        let base = if cli.no_default_excludes {
            ExclusionPolicy::empty()
        } else {
            ExclusionPolicy::default()
        };
        let mut policy = base
            .with_excluded_names(cli.exclude.iter().cloned())
            .with_excluded_paths(export_paths(cli, &root)?)
            .with_non_text_extensions(cli.non_text.iter().cloned());
        policy.respect_gitignore = cli.respect_gitignore;

        let state = if cli.no_persist {
            StateLocation::Memory
        } else {
            match &cli.state_file {
                Some(path) => StateLocation::File(path.clone()),
                None => StateLocation::File(default_state_file()?),
            }
        };

        log::debug!(
            "Config: root={}, {} name rules, {} non-text extensions, state={:?}",
            root.display(),
            policy.excluded_names.len(),
            policy.non_text_extensions.len(),
            state
        );
        Ok(Self { root, policy, state })
    }
}

/// Exports written inside the workspace must never be read back into a
/// report: the TUI's `<root>/selected_files.txt` always, plus the `download`
/// destination when it lands under the root.
fn export_paths(cli: &Cli, root: &Path) -> Result<Vec<PathBuf>> {
    let mut paths = vec![PathBuf::from(crate::commands::DEFAULT_DOWNLOAD_NAME)];
    if let Some(Command::Download { destination }) = &cli.command {
        let absolute = std::env::current_dir()?.join(destination);
        // The file may not exist yet, so resolve its parent.
        let resolved = match (absolute.parent(), absolute.file_name()) {
            (Some(parent), Some(name)) => parent
                .canonicalize()
                .map(|parent| parent.join(name))
                .unwrap_or_else(|_| absolute.clone()),
            _ => absolute.clone(),
        };
        if let Ok(rel) = resolved.strip_prefix(root) {
            if !rel.as_os_str().is_empty() && !paths.iter().any(|p| p == rel) {
                paths.push(rel.to_path_buf());
            }
        }
    }
    Ok(paths)
}

fn default_state_file() -> Result<PathBuf> {
    dirs::data_local_dir()
        .map(|dir| dir.join("llm-context").join("state.json"))
        .ok_or_else(|| {
            ContextError::Persistence("Could not determine a local data directory".to_string())
        })
}
