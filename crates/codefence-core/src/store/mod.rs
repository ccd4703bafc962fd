//! Storage abstraction the engine reads, rewrites and renames files through.
//!
//! Paths are store-relative strings separated by `/`; the empty path names the
//! store root. Nodes returned by [`Store::resolve`] are snapshots valid for one
//! operation only.

mod fs;
mod memory;

use std::io;

use codefence_utils::clean_store_path;

pub use fs::FsStore;
pub use memory::MemoryStore;

/// Read/write/rename/resolve primitives over a hierarchical file store.
///
/// Implementations must be shareable across the walker's worker threads.
pub trait Store: Sync {
    fn read(&self, path: &str) -> io::Result<String>;

    fn write(&self, path: &str, contents: &str) -> io::Result<()>;

    /// Move `from` to `to`. Fails with `AlreadyExists` rather than overwrite.
    fn rename(&self, from: &str, to: &str) -> io::Result<()>;

    /// Snapshot the entry at `path`, or `None` when nothing lives there.
    fn resolve(&self, path: &str) -> io::Result<Option<Node>>;
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Node {
    File(FileNode),
    Directory(DirectoryNode),
}

impl Node {
    pub fn path(&self) -> &str {
        match self {
            Node::File(file) => file.path(),
            Node::Directory(dir) => dir.path(),
        }
    }

    pub fn name(&self) -> &str {
        last_segment(self.path())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileNode {
    path: String,
}

impl FileNode {
    /// Names are kept byte for byte; only empty and `.` segments are dropped.
    pub fn new(path: impl AsRef<str>) -> Self {
        FileNode {
            path: clean_store_path(path.as_ref()),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn name(&self) -> &str {
        last_segment(&self.path)
    }

    /// Text after the last `.` of the name, without the dot. Names with no dot,
    /// or whose only dot is the leading one (`.gitignore`), have no extension.
    pub fn extension(&self) -> &str {
        match self.extension_dot() {
            Some(idx) => &self.name()[idx + 1..],
            None => "",
        }
    }

    /// Name without its extension.
    pub fn basename(&self) -> &str {
        let name = self.name();
        match self.extension_dot() {
            Some(idx) => &name[..idx],
            None => name,
        }
    }

    fn extension_dot(&self) -> Option<usize> {
        match self.name().rfind('.') {
            Some(0) | None => None,
            Some(idx) => Some(idx),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DirectoryNode {
    path: String,
    children: Vec<Node>,
}

impl DirectoryNode {
    /// Children are ordered by name so enumeration is deterministic.
    pub fn new(path: impl AsRef<str>, mut children: Vec<Node>) -> Self {
        children.sort_by(|a, b| a.name().cmp(b.name()));
        DirectoryNode {
            path: clean_store_path(path.as_ref()),
            children,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn name(&self) -> &str {
        last_segment(&self.path)
    }

    pub fn children(&self) -> &[Node] {
        &self.children
    }

    /// Every file in the subtree, depth first.
    pub fn files(&self) -> Vec<&FileNode> {
        let mut files = Vec::new();
        collect_files(self, &mut files);
        files
    }
}

fn collect_files<'a>(dir: &'a DirectoryNode, out: &mut Vec<&'a FileNode>) {
    for child in &dir.children {
        match child {
            Node::File(file) => out.push(file),
            Node::Directory(sub) => collect_files(sub, out),
        }
    }
}

fn last_segment(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Clean a path handed to a store. `..` segments would escape the store root
/// and are refused with `InvalidInput`.
pub(crate) fn checked_path(path: &str) -> io::Result<String> {
    let cleaned = clean_store_path(path);
    if cleaned.split('/').any(|segment| segment == "..") {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("path escapes the store: {path}"),
        ));
    }
    Ok(cleaned)
}

pub(crate) fn not_found(path: &str) -> io::Error {
    io::Error::new(io::ErrorKind::NotFound, format!("no such file: {path}"))
}

pub(crate) fn already_exists(path: &str) -> io::Error {
    io::Error::new(
        io::ErrorKind::AlreadyExists,
        format!("destination already exists: {path}"),
    )
}
