//! Search-path based file resolution.
//!
//! Plugins that load auxiliary data (textures, meshes) resolve relative
//! filenames through the current [`FileResolver`]. Each thread may install
//! its own resolver; otherwise the process default is used.

use std::cell::RefCell;
use std::fmt;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

/// Ordered list of directories searched for relative paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileResolver {
    paths: Vec<PathBuf>,
}

impl Default for FileResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl FileResolver {
    /// Resolver seeded with the current working directory.
    pub fn new() -> Self {
        let paths = match std::env::current_dir() {
            Ok(cwd) => vec![cwd],
            Err(err) => {
                log::warn!("could not determine the working directory: {err}");
                Vec::new()
            }
        };
        Self { paths }
    }

    /// Resolver with an explicit search list.
    pub fn with_paths<I, P>(paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            paths: paths.into_iter().map(Into::into).collect(),
        }
    }

    /// Return the first `base/path` that exists. Absolute paths and paths
    /// found nowhere are returned unchanged.
    pub fn resolve(&self, path: impl AsRef<Path>) -> PathBuf {
        let path = path.as_ref();
        if path.is_absolute() {
            return path.to_path_buf();
        }
        for base in &self.paths {
            let candidate = base.join(path);
            if candidate.exists() {
                return candidate;
            }
        }
        path.to_path_buf()
    }

    pub fn prepend(&mut self, path: impl Into<PathBuf>) {
        self.paths.insert(0, path.into());
    }

    pub fn append(&mut self, path: impl Into<PathBuf>) {
        self.paths.push(path.into());
    }

    /// Remove every occurrence of `path`.
    pub fn erase(&mut self, path: impl AsRef<Path>) {
        let path = path.as_ref();
        self.paths.retain(|p| p != path);
    }

    pub fn clear(&mut self) {
        self.paths.clear();
    }

    pub fn contains(&self, path: impl AsRef<Path>) -> bool {
        let path = path.as_ref();
        self.paths.iter().any(|p| p == path)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PathBuf> {
        self.paths.iter()
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

impl<'a> IntoIterator for &'a FileResolver {
    type Item = &'a PathBuf;
    type IntoIter = std::slice::Iter<'a, PathBuf>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl fmt::Display for FileResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "FileResolver[")?;
        for path in &self.paths {
            writeln!(f, "  {:?},", path.display().to_string())?;
        }
        write!(f, "]")
    }
}

static DEFAULT: RwLock<Option<Arc<FileResolver>>> = RwLock::new(None);

thread_local! {
    static THREAD: RefCell<Option<Arc<FileResolver>>> = const { RefCell::new(None) };
}

/// The resolver in effect on this thread.
pub fn file_resolver() -> Arc<FileResolver> {
    if let Some(resolver) = THREAD.with(|current| current.borrow().clone()) {
        return resolver;
    }
    default_file_resolver()
}

/// The process default, created on first use.
pub fn default_file_resolver() -> Arc<FileResolver> {
    if let Some(resolver) = DEFAULT
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .as_ref()
    {
        return Arc::clone(resolver);
    }
    let mut default = DEFAULT.write().unwrap_or_else(PoisonError::into_inner);
    Arc::clone(default.get_or_insert_with(|| Arc::new(FileResolver::new())))
}

/// Replace the process default.
pub fn set_default_file_resolver(resolver: FileResolver) {
    *DEFAULT.write().unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(resolver));
}

/// Install `resolver` for the current thread until the guard is dropped.
pub fn set_thread_file_resolver(resolver: Arc<FileResolver>) -> ResolverGuard {
    let previous = THREAD.with(|current| current.borrow_mut().replace(resolver));
    ResolverGuard {
        previous,
        _not_send: PhantomData,
    }
}

/// Restores the previous thread resolver on drop.
#[must_use = "the resolver is uninstalled when the guard is dropped"]
pub struct ResolverGuard {
    previous: Option<Arc<FileResolver>>,
    _not_send: PhantomData<*const ()>,
}

impl Drop for ResolverGuard {
    fn drop(&mut self) {
        let previous = self.previous.take();
        THREAD.with(|current| *current.borrow_mut() = previous);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_new_starts_with_working_directory() {
        let resolver = FileResolver::new();
        assert_eq!(resolver.len(), 1);
        assert_eq!(resolver.iter().next(), Some(&std::env::current_dir().unwrap()));
    }

    #[test]
    fn test_resolve_finds_first_existing_candidate() {
        let first = tempfile::tempdir().unwrap();
        let second = tempfile::tempdir().unwrap();
        let (first, second) = (first.path(), second.path());
        fs::write(second.join("mesh.obj"), "v 0 0 0\n").unwrap();

        let resolver = FileResolver::with_paths([first, second]);
        assert_eq!(resolver.resolve("mesh.obj"), second.join("mesh.obj"));

        fs::write(first.join("mesh.obj"), "v 0 0 0\n").unwrap();
        assert_eq!(resolver.resolve("mesh.obj"), first.join("mesh.obj"));
        assert_eq!(resolver.resolve("mesh.obj"), resolver.resolve("mesh.obj"));
    }

    #[test]
    fn test_resolve_passes_through_unknown_and_absolute() {
        let dir = tempfile::tempdir().unwrap();
        let resolver = FileResolver::with_paths([dir.path()]);
        assert_eq!(
            resolver.resolve("textures/missing.png"),
            PathBuf::from("textures/missing.png")
        );

        let absolute = dir.path().join("does_not_exist.exr");
        assert_eq!(resolver.resolve(&absolute), absolute);
    }

    #[test]
    fn test_mutation_keeps_order_and_erases_all() {
        let mut resolver = FileResolver::with_paths(["b"]);
        resolver.prepend("a");
        resolver.append("c");
        resolver.append("a");
        let paths: Vec<String> = resolver.iter().map(|p| p.display().to_string()).collect();
        assert_eq!(paths, ["a", "b", "c", "a"]);

        resolver.erase("a");
        assert_eq!(resolver.len(), 2);
        assert!(!resolver.contains("a"));
        assert!(resolver.contains("c"));

        resolver.clear();
        assert!(resolver.is_empty());
    }

    #[test]
    fn test_thread_override_is_scoped() {
        let custom = Arc::new(FileResolver::with_paths(["/scene/assets"]));
        {
            let _guard = set_thread_file_resolver(Arc::clone(&custom));
            assert!(Arc::ptr_eq(&file_resolver(), &custom));

            // Other threads still see the process default.
            let other = std::thread::spawn(|| file_resolver().contains("/scene/assets"))
                .join()
                .unwrap();
            assert!(!other);
        }
        assert!(!Arc::ptr_eq(&file_resolver(), &custom));
    }
}
