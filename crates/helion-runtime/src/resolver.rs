//! Path resolution for included scene fragments.

use std::path::{Path, PathBuf};

/// Resolves relative paths referenced by a scene description.
///
/// The loader never touches the filesystem layout directly; `<include>`
/// elements go through this trait so embedders can redirect lookups.
pub trait FileResolver: Send + Sync {
    /// Resolve `path` to a concrete filesystem path.
    ///
    /// Returns the input unchanged when no search path matches; the caller
    /// checks for existence.
    fn resolve(&self, path: &Path) -> PathBuf;
}

/// Default resolver: tries a list of search directories in order.
#[derive(Debug, Clone, Default)]
pub struct FileSystemResolver {
    search_paths: Vec<PathBuf>,
}

impl FileSystemResolver {
    /// Create a resolver with no search paths.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a search directory with lowest priority.
    pub fn append(&mut self, path: impl Into<PathBuf>) {
        self.search_paths.push(path.into());
    }

    /// Prepend a search directory with highest priority.
    pub fn prepend(&mut self, path: impl Into<PathBuf>) {
        self.search_paths.insert(0, path.into());
    }
}

impl FileResolver for FileSystemResolver {
    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() || path.exists() {
            return path.to_path_buf();
        }
        for base in &self.search_paths {
            let candidate = base.join(path);
            if candidate.exists() {
                return candidate;
            }
        }
        path.to_path_buf()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absolute_path_passes_through() {
        let resolver = FileSystemResolver::new();
        let path = if cfg!(windows) {
            PathBuf::from("C:\\scenes\\a.xml")
        } else {
            PathBuf::from("/scenes/a.xml")
        };
        assert_eq!(resolver.resolve(&path), path);
    }

    #[test]
    fn test_unresolved_path_returned_unchanged() {
        let mut resolver = FileSystemResolver::new();
        resolver.append("/nonexistent-base");
        let path = Path::new("missing.xml");
        assert_eq!(resolver.resolve(path), PathBuf::from("missing.xml"));
    }
}
