use std::collections::{BTreeMap, BTreeSet};
use std::io;
use std::sync::{Mutex, MutexGuard, PoisonError};

use codefence_utils::{clean_store_path, join_store_path};

use super::{already_exists, checked_path, not_found, DirectoryNode, FileNode, Node, Store};

/// In-memory store. Directories exist implicitly for every file path prefix,
/// and explicitly once created with [`MemoryStore::create_dir`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    files: BTreeMap<String, String>,
    directories: BTreeSet<String>,
}

impl Inner {
    fn is_directory(&self, path: &str) -> bool {
        if path.is_empty() || self.directories.contains(path) {
            return true;
        }
        let prefix = format!("{path}/");
        self.files.keys().any(|file| file.starts_with(&prefix))
            || self.directories.iter().any(|dir| dir.starts_with(&prefix))
    }

    fn snapshot(&self, path: &str) -> DirectoryNode {
        let prefix = if path.is_empty() {
            String::new()
        } else {
            format!("{path}/")
        };

        let mut entries: BTreeMap<&str, bool> = BTreeMap::new();
        let files = self.files.keys().map(|file| (file, false));
        let dirs = self.directories.iter().map(|dir| (dir, true));
        for (candidate, explicit_dir) in files.chain(dirs) {
            let Some(rest) = candidate.strip_prefix(&prefix) else {
                continue;
            };
            match rest.split_once('/') {
                Some((name, _)) => {
                    entries.insert(name, true);
                }
                None if !rest.is_empty() => {
                    entries.entry(rest).or_insert(explicit_dir);
                }
                None => {}
            }
        }

        let children = entries
            .into_iter()
            .map(|(name, is_dir)| {
                let child = join_store_path(path, name);
                if is_dir {
                    Node::Directory(self.snapshot(&child))
                } else {
                    Node::File(FileNode::new(child))
                }
            })
            .collect();

        DirectoryNode::new(path, children)
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_files<I, P, C>(files: I) -> Self
    where
        I: IntoIterator<Item = (P, C)>,
        P: AsRef<str>,
        C: Into<String>,
    {
        let store = Self::new();
        for (path, contents) in files {
            store.insert(path, contents);
        }
        store
    }

    pub fn insert(&self, path: impl AsRef<str>, contents: impl Into<String>) {
        self.lock()
            .files
            .insert(clean_store_path(path.as_ref()), contents.into());
    }

    pub fn create_dir(&self, path: impl AsRef<str>) {
        self.lock()
            .directories
            .insert(clean_store_path(path.as_ref()));
    }

    pub fn contents(&self, path: impl AsRef<str>) -> Option<String> {
        self.lock()
            .files
            .get(&clean_store_path(path.as_ref()))
            .cloned()
    }

    /// Every file path, sorted.
    pub fn paths(&self) -> Vec<String> {
        self.lock().files.keys().cloned().collect()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Store for MemoryStore {
    fn read(&self, path: &str) -> io::Result<String> {
        let path = checked_path(path)?;
        self.lock()
            .files
            .get(&path)
            .cloned()
            .ok_or_else(|| not_found(&path))
    }

    fn write(&self, path: &str, contents: &str) -> io::Result<()> {
        let path = checked_path(path)?;
        let mut inner = self.lock();
        if inner.is_directory(&path) {
            return Err(io::Error::new(
                io::ErrorKind::Other,
                format!("cannot write to directory: {path}"),
            ));
        }
        inner.files.insert(path, contents.to_string());
        Ok(())
    }

    fn rename(&self, from: &str, to: &str) -> io::Result<()> {
        let from = checked_path(from)?;
        let to = checked_path(to)?;
        let mut inner = self.lock();
        if inner.files.contains_key(&to) || inner.is_directory(&to) {
            return Err(already_exists(&to));
        }
        let contents = inner.files.remove(&from).ok_or_else(|| not_found(&from))?;
        inner.files.insert(to, contents);
        Ok(())
    }

    fn resolve(&self, path: &str) -> io::Result<Option<Node>> {
        let path = checked_path(path)?;
        let inner = self.lock();
        if inner.files.contains_key(&path) {
            Ok(Some(Node::File(FileNode::new(path))))
        } else if inner.is_directory(&path) {
            Ok(Some(Node::Directory(inner.snapshot(&path))))
        } else {
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directories_are_implied_by_file_paths() {
        let store = MemoryStore::with_files([
            ("Code/a.js", "a"),
            ("Code/lib/b.py", "b"),
            ("Notes/readme.md", "r"),
        ]);
        store.create_dir("Code/empty");

        let Some(Node::Directory(code)) = store.resolve("Code").unwrap() else {
            panic!("expected directory");
        };
        let names: Vec<_> = code.children().iter().map(Node::name).collect();
        assert_eq!(names, vec!["a.js", "empty", "lib"]);
        assert!(matches!(code.children()[1], Node::Directory(_)));

        let Some(Node::Directory(root)) = store.resolve("").unwrap() else {
            panic!("expected root directory");
        };
        assert_eq!(root.files().len(), 3);
    }

    #[test]
    fn rename_moves_content_and_refuses_to_overwrite() {
        let store = MemoryStore::with_files([("a.js", "one"), ("b.js", "two")]);

        store.rename("a.js", "a.js.md").unwrap();
        assert_eq!(store.contents("a.js.md").as_deref(), Some("one"));
        assert_eq!(store.contents("a.js"), None);

        let err = store.rename("b.js", "a.js.md").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::AlreadyExists);

        let err = store.rename("missing.js", "missing.js.md").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn names_and_parent_segments() {
        let store = MemoryStore::with_files([("Code/my\u{00A0}file.js", "x")]);
        assert_eq!(store.read("Code/my\u{00A0}file.js").unwrap(), "x");
        assert_eq!(store.read("Code/my file.js").unwrap_err().kind(), io::ErrorKind::NotFound);
        assert_eq!(
            store.resolve("Code/../Code").unwrap_err().kind(),
            io::ErrorKind::InvalidInput
        );
    }

    #[test]
    fn missing_paths_resolve_to_none() {
        let store = MemoryStore::with_files([("Code/a.js", "")]);
        assert_eq!(store.resolve("Cod").unwrap(), None);
        assert_eq!(store.read("Code/b.js").unwrap_err().kind(), io::ErrorKind::NotFound);
    }
}
