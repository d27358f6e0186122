//! Path filtering shared by the scanner and the watcher.
//!
//! A path is indexable when it is a regular file under the root, neither it
//! nor any directory between it and the root is a symlink, its extension is
//! on the allowlist, and neither `.gitignore` nor the configured exclude
//! globs match its root-relative path.

use anyhow::Result;
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

use crate::config::IndexConfig;
use crate::ignore_spec::IgnoreSpec;

#[derive(Debug, Clone)]
pub struct PathFilter {
    root: PathBuf,
    extensions: HashSet<String>,
    excludes: GlobSet,
    ignore: IgnoreSpec,
}

impl PathFilter {
    pub fn new(root: &Path, config: &IndexConfig, ignore: IgnoreSpec) -> Result<Self> {
        let extensions = config
            .extensions
            .iter()
            .map(|ext| ext.trim_start_matches('.').to_string())
            .collect();
        Ok(Self {
            root: root.to_path_buf(),
            extensions,
            excludes: build_globset(&config.exclude_globs)?,
            ignore,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn has_supported_extension(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| self.extensions.contains(ext))
    }

    /// Name-based checks only (extension, excludes, `.gitignore`); the
    /// filesystem is not consulted.
    pub fn accepts_file_path(&self, path: &Path) -> bool {
        let Ok(relative) = path.strip_prefix(&self.root) else {
            return false;
        };
        self.has_supported_extension(path)
            && !self.excludes.is_match(relative)
            && !self.ignore.is_ignored(relative, false)
    }

    /// False for directories whose whole subtree is excluded, so walks can
    /// prune them.
    pub fn accepts_dir_path(&self, path: &Path) -> bool {
        let Ok(relative) = path.strip_prefix(&self.root) else {
            return false;
        };
        if relative.as_os_str().is_empty() {
            return true;
        }
        // `**/target/**` matches "target/" but not "target".
        let as_dir = format!("{}/", relative.display());
        !self.excludes.is_match(relative)
            && !self.excludes.is_match(&as_dir)
            && !self.ignore.is_ignored(relative, true)
    }

    /// True if `path` or any directory between it and the root is a symlink.
    ///
    /// Components that no longer exist are not symlinks.
    pub fn crosses_symlink(&self, path: &Path) -> bool {
        let Ok(relative) = path.strip_prefix(&self.root) else {
            return false;
        };
        let mut current = self.root.clone();
        for component in relative.components() {
            current.push(component);
            match std::fs::symlink_metadata(&current) {
                Ok(meta) if meta.file_type().is_symlink() => return true,
                Ok(_) => {}
                Err(_) => return false,
            }
        }
        false
    }

    /// Every indexable file under `dir`, in walk order.
    ///
    /// Symlinks are never followed and ignored directories are pruned.
    /// Entries that cannot be read are skipped.
    pub fn walk(&self, dir: &Path) -> Vec<PathBuf> {
        let walker = WalkDir::new(dir)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| {
                if entry.path_is_symlink() {
                    return false;
                }
                !entry.file_type().is_dir() || self.accepts_dir_path(entry.path())
            });

        let mut files = Vec::new();
        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    debug!(error = %err, "Skipping unreadable directory entry");
                    continue;
                }
            };
            if entry.file_type().is_file() && self.accepts_file_path(entry.path()) {
                files.push(entry.into_path());
            }
        }
        files
    }
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}
