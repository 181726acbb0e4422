use ignore::{DirEntry, WalkBuilder};
use sigscope_gdscript::is_source_file;
use std::path::{Path, PathBuf};

/// Engine and build caches, skipped only directly under the project root
pub const ROOT_CACHE_DIRS: &[&str] = &[".godot", ".import", "build", ".cache", "target"];

/// Directory names never descended into, wherever they appear below the root
pub const EXCLUDED_DIRS: &[&str] = &[
    // third-party code
    "addons",
    "node_modules",
    // VCS
    ".git",
    ".svn",
    ".hg",
];

/// Finds script files in a project
pub struct FileDiscovery {
    root: PathBuf,
}

impl FileDiscovery {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Every `.gd` file below the root, sorted by path.
    ///
    /// Hidden directories, [`EXCLUDED_DIRS`] and top-level [`ROOT_CACHE_DIRS`] are skipped.
    /// Hidden files are kept; ignore files are not consulted.
    pub fn discover(&self) -> Vec<PathBuf> {
        let mut files = Vec::new();

        let mut builder = WalkBuilder::new(&self.root);
        builder
            .hidden(false)
            .ignore(false)
            .parents(false)
            .git_ignore(false)
            .git_global(false)
            .git_exclude(false);
        builder.filter_entry(|entry| !is_excluded(entry));

        for result in builder.build() {
            match result {
                Ok(entry) => {
                    let Some(file_type) = entry.file_type() else {
                        continue;
                    };
                    if file_type.is_file() && is_source_file(entry.path()) {
                        files.push(entry.into_path());
                    }
                }
                Err(e) => log::warn!("Failed to read entry: {e}"),
            }
        }

        files.sort();
        log::debug!("Found {} script files under {}", files.len(), self.root.display());
        files
    }
}

/// Pruning happens per directory, so files never need checking
fn is_excluded(entry: &DirEntry) -> bool {
    let is_dir = entry.file_type().is_some_and(|t| t.is_dir());
    if entry.depth() == 0 || !is_dir {
        return false;
    }
    let name = entry.file_name().to_string_lossy();
    name.starts_with('.')
        || EXCLUDED_DIRS.contains(&name.as_ref())
        || (entry.depth() == 1 && ROOT_CACHE_DIRS.contains(&name.as_ref()))
}

/// Project-relative path with forward slashes
pub fn relative_path(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    let mut normalized = relative.to_string_lossy().to_string();
    if normalized.contains('\\') {
        normalized = normalized.replace('\\', "/");
    }
    normalized
}
