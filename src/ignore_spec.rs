//! `.gitignore` handling for the workspace root.

use ignore::gitignore::{Gitignore, GitignoreBuilder};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Compiled exclusion patterns from the root `.gitignore`.
///
/// Loaded once when a scanner is built and never reloaded; an absent file
/// yields a spec that matches nothing.
#[derive(Debug, Clone)]
pub struct IgnoreSpec {
    root: PathBuf,
    matcher: Gitignore,
}

impl IgnoreSpec {
    /// Load `<root>/.gitignore`. Unparseable lines are skipped with a warning.
    pub fn load(root: &Path) -> Self {
        let path = root.join(".gitignore");
        if !path.is_file() {
            debug!(root = %root.display(), "No .gitignore found, nothing is ignored");
            return Self::empty(root);
        }

        let mut builder = GitignoreBuilder::new(root);
        if let Some(err) = builder.add(&path) {
            warn!(error = %err, "Error parsing .gitignore, continuing with partial rules");
        }
        Self::finish(root, builder)
    }

    /// Build from in-memory pattern lines, as they would appear in `.gitignore`.
    pub fn from_lines<I, S>(root: &Path, lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut builder = GitignoreBuilder::new(root);
        for line in lines {
            if let Err(err) = builder.add_line(None, line.as_ref()) {
                warn!(error = %err, line = line.as_ref(), "Skipping invalid ignore pattern");
            }
        }
        Self::finish(root, builder)
    }

    pub fn empty(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            matcher: Gitignore::empty(),
        }
    }

    fn finish(root: &Path, builder: GitignoreBuilder) -> Self {
        let matcher = builder.build().unwrap_or_else(|err| {
            warn!(error = %err, "Failed to compile ignore patterns, ignoring nothing");
            Gitignore::empty()
        });
        Self {
            root: root.to_path_buf(),
            matcher,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.matcher.is_empty()
    }

    /// Whether `path` (absolute under the root, or root-relative) is excluded,
    /// either directly or because one of its parent directories is.
    ///
    /// Absolute paths outside the root never match.
    pub fn is_ignored(&self, path: &Path, is_dir: bool) -> bool {
        if self.matcher.is_empty() {
            return false;
        }
        let relative = if path.is_absolute() {
            match path.strip_prefix(&self.root) {
                Ok(rel) => rel,
                Err(_) => return false,
            }
        } else {
            path
        };
        if relative.as_os_str().is_empty() {
            return false;
        }
        self.matcher
            .matched_path_or_any_parents(relative, is_dir)
            .is_ignore()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_gitignore_matches_nothing() {
        let tmp = TempDir::new().unwrap();
        let spec = IgnoreSpec::load(tmp.path());
        assert!(spec.is_empty());
        assert!(!spec.is_ignored(&tmp.path().join("anything.py"), false));
    }

    #[test]
    fn test_loads_root_gitignore() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join(".gitignore"), "ignored.py\nbuild/\n*.gen.rs\n").unwrap();
        let spec = IgnoreSpec::load(tmp.path());

        assert!(spec.is_ignored(&tmp.path().join("ignored.py"), false));
        assert!(spec.is_ignored(&tmp.path().join("sub/ignored.py"), false));
        assert!(spec.is_ignored(&tmp.path().join("build/out.py"), false));
        assert!(spec.is_ignored(&tmp.path().join("build"), true));
        assert!(spec.is_ignored(Path::new("src/x.gen.rs"), false));
        assert!(!spec.is_ignored(&tmp.path().join("good.py"), false));
    }

    #[test]
    fn test_negation() {
        let root = Path::new("/ws");
        let spec = IgnoreSpec::from_lines(root, ["*.py", "!keep.py"]);
        assert!(spec.is_ignored(Path::new("/ws/drop.py"), false));
        assert!(!spec.is_ignored(Path::new("/ws/keep.py"), false));
    }

    #[test]
    fn test_paths_outside_root_never_match() {
        let spec = IgnoreSpec::from_lines(Path::new("/ws"), ["*.py"]);
        assert!(!spec.is_ignored(Path::new("/elsewhere/a.py"), false));
    }
}
