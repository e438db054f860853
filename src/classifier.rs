use crate::config::ExclusionPolicy;
use glob_match::glob_match;
use ignore::gitignore::{Gitignore, GitignoreBuilder};
use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};

/// Decides whether a root-relative path is excluded from selection.
#[derive(Debug, Clone)]
pub struct PathClassifier {
    literal_names: HashSet<String>,
    patterns: Vec<String>,
    excluded_paths: Vec<PathBuf>,
    non_text_extensions: HashSet<String>,
    gitignore: Option<Gitignore>,
}

impl PathClassifier {
    pub fn new(policy: &ExclusionPolicy) -> Self {
        let mut literal_names = HashSet::new();
        let mut patterns = Vec::new();
        for rule in &policy.excluded_names {
            let rule = rule.trim_end_matches('/');
            if rule.is_empty() {
                continue;
            }
            if rule.contains(['*', '?', '[', '{']) {
                patterns.push(rule.to_string());
            } else {
                literal_names.insert(rule.to_string());
            }
        }

        Self {
            literal_names,
            patterns,
            excluded_paths: policy
                .excluded_paths
                .iter()
                .filter(|p| !p.as_os_str().is_empty())
                .cloned()
                .collect(),
            non_text_extensions: policy
                .non_text_extensions
                .iter()
                .map(|ext| ext.to_lowercase())
                .collect(),
            gitignore: None,
        }
    }

    /// Same as [`PathClassifier::new`], additionally loading `<root>/.gitignore`
    /// when the policy asks for it. A broken ignore file is logged and skipped.
    pub fn for_root(policy: &ExclusionPolicy, root: &Path) -> Self {
        let mut classifier = Self::new(policy);
        if policy.respect_gitignore {
            let mut builder = GitignoreBuilder::new(root);
            if let Some(err) = builder.add(root.join(".gitignore")) {
                log::warn!("Could not read {}: {}", root.join(".gitignore").display(), err);
            }
            match builder.build() {
                Ok(gitignore) if !gitignore.is_empty() => classifier.gitignore = Some(gitignore),
                Ok(_) => {}
                Err(err) => log::warn!("Ignoring invalid .gitignore: {}", err),
            }
        }
        classifier
    }

    /// True if any segment of `path` matches a name rule, the path lies at
    /// or under an excluded path, or it is covered by the root `.gitignore`.
    pub fn is_structurally_excluded(&self, path: &Path) -> bool {
        self.structural(path, false)
    }

    /// True if the lowercase final extension is a known non-text extension.
    pub fn is_non_text_file(&self, path: &Path) -> bool {
        match path.extension() {
            Some(ext) => {
                let ext = format!(".{}", ext.to_string_lossy().to_lowercase());
                self.non_text_extensions.contains(&ext)
            }
            None => false,
        }
    }

    /// Exclusion check for a traversed entry: structural rules for everything,
    /// content rules for files only.
    pub fn is_excluded(&self, path: &Path, is_dir: bool) -> bool {
        self.structural(path, is_dir) || (!is_dir && self.is_non_text_file(path))
    }

    fn structural(&self, path: &Path, is_dir: bool) -> bool {
        let segment_match = path.components().any(|component| match component {
            Component::Normal(segment) => self.matches_name(&segment.to_string_lossy()),
            _ => false,
        });
        if segment_match
            || self
                .excluded_paths
                .iter()
                .any(|excluded| path.starts_with(excluded))
        {
            return true;
        }
        match &self.gitignore {
            Some(gitignore) if path.is_relative() && !path.as_os_str().is_empty() => gitignore
                .matched_path_or_any_parents(path, is_dir)
                .is_ignore(),
            _ => false,
        }
    }

    fn matches_name(&self, name: &str) -> bool {
        self.literal_names.contains(name)
            || self.patterns.iter().any(|pattern| glob_match(pattern, name))
    }
}
