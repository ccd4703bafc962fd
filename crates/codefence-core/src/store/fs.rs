use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use codefence_utils::{atomic_write, join_store_path};
use walkdir::{DirEntry, WalkDir};

use super::{already_exists, checked_path, DirectoryNode, FileNode, Node, Store};

/// Store backed by a directory on disk (the "vault").
///
/// Hidden entries (names starting with `.`) are not part of the store, which
/// keeps `.git`, the config file and in-flight temp files out of every walk.
#[derive(Clone, Debug)]
pub struct FsStore {
    root: PathBuf,
}

impl FsStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// On-disk location of a store path. Segments are pushed as they are, so
    /// names with `\` or non-breaking spaces reach the file they came from.
    fn absolute(&self, path: &str) -> io::Result<PathBuf> {
        let mut absolute = self.root.clone();
        for segment in checked_path(path)?.split('/') {
            if !segment.is_empty() {
                absolute.push(segment);
            }
        }
        Ok(absolute)
    }

    fn snapshot(&self, path: &str, absolute: &Path) -> io::Result<DirectoryNode> {
        let mut open: Vec<(String, Vec<Node>)> = vec![(path.to_string(), Vec::new())];

        let walker = WalkDir::new(absolute)
            .min_depth(1)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| !is_hidden(entry));

        for entry in walker {
            let entry = entry.map_err(io::Error::from)?;
            while open.len() > entry.depth() {
                close_directory(&mut open);
            }

            let Some(name) = entry.file_name().to_str() else {
                tracing::warn!(path = %entry.path().display(), "skipping non UTF-8 file name");
                continue;
            };
            let Some(child_path) = open.last().map(|(parent, _)| join_store_path(parent, name))
            else {
                break;
            };

            let file_type = entry.file_type();
            if file_type.is_dir() {
                open.push((child_path, Vec::new()));
            } else if file_type.is_file() {
                if let Some((_, children)) = open.last_mut() {
                    children.push(Node::File(FileNode::new(child_path)));
                }
            }
        }

        while open.len() > 1 {
            close_directory(&mut open);
        }
        let (path, children) = open.pop().unwrap_or_default();
        Ok(DirectoryNode::new(path, children))
    }
}

fn close_directory(open: &mut Vec<(String, Vec<Node>)>) {
    if let Some((path, children)) = open.pop() {
        if let Some((_, parent_children)) = open.last_mut() {
            parent_children.push(Node::Directory(DirectoryNode::new(path, children)));
        }
    }
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .map(|name| name.starts_with('.'))
        .unwrap_or(false)
}

impl Store for FsStore {
    fn read(&self, path: &str) -> io::Result<String> {
        fs::read_to_string(self.absolute(path)?)
    }

    fn write(&self, path: &str, contents: &str) -> io::Result<()> {
        atomic_write(&self.absolute(path)?, contents)
    }

    fn rename(&self, from: &str, to: &str) -> io::Result<()> {
        let source = self.absolute(from)?;
        let destination = self.absolute(to)?;
        if fs::symlink_metadata(&destination).is_ok() {
            return Err(already_exists(to));
        }
        fs::rename(source, destination)
    }

    fn resolve(&self, path: &str) -> io::Result<Option<Node>> {
        let cleaned = checked_path(path)?;
        let absolute = self.absolute(&cleaned)?;
        let metadata = match fs::metadata(&absolute) {
            Ok(metadata) => metadata,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err),
        };

        if metadata.is_file() {
            Ok(Some(Node::File(FileNode::new(cleaned))))
        } else if metadata.is_dir() {
            Ok(Some(Node::Directory(self.snapshot(&cleaned, &absolute)?)))
        } else {
            Ok(None)
        }
    }
}
