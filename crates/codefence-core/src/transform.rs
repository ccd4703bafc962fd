//! Wrap-as-markdown and unwrap-from-markdown, the two inverse per-file
//! transforms, plus the pure content and path rules they are built from.
//!
//! Wrapped layout, byte for byte:
//!
//! ```text
//! ```<tag>\n<original>\n```\n
//! ```

use std::collections::HashSet;
use std::sync::OnceLock;

use codefence_config::{Config, LanguageTagMap, RenameStrategy};
use regex::Regex;

use crate::error::{FenceError, FenceResult};
use crate::store::{FileNode, Store};

const FENCE: &str = "```";
const WRAPPED_SUFFIX: &str = ".md";

fn opening_fence() -> &'static Regex {
    static OPENING: OnceLock<Regex> = OnceLock::new();
    OPENING.get_or_init(|| Regex::new(r"\A```[a-z]+\n").expect("opening fence pattern is valid"))
}

fn closing_fence() -> &'static Regex {
    static CLOSING: OnceLock<Regex> = OnceLock::new();
    CLOSING.get_or_init(|| Regex::new(r"\n```\s*\z").expect("closing fence pattern is valid"))
}

/// Surround `contents` with a fence tagged `tag`. An empty tag produces no
/// opening fence line at all.
pub fn wrap_content(contents: &str, tag: &str) -> String {
    let mut wrapped = String::with_capacity(contents.len() + tag.len() + 2 * FENCE.len() + 3);
    if !tag.is_empty() {
        wrapped.push_str(FENCE);
        wrapped.push_str(tag);
        wrapped.push('\n');
    }
    wrapped.push_str(contents);
    wrapped.push('\n');
    wrapped.push_str(FENCE);
    wrapped.push('\n');
    wrapped
}

/// Strip a leading "```tag\n" and a trailing "\n```" (plus trailing
/// whitespace). Either may be absent; nothing else is touched.
pub fn unwrap_content(contents: &str) -> String {
    let body = match opening_fence().find(contents) {
        Some(found) => &contents[found.end()..],
        None => contents,
    };
    let body = match closing_fence().find(body) {
        Some(found) => &body[..found.start()],
        None => body,
    };
    body.to_string()
}

pub fn wrapped_path(path: &str) -> String {
    format!("{path}{WRAPPED_SUFFIX}")
}

pub fn unwrapped_path(path: &str, strategy: RenameStrategy) -> String {
    match strategy {
        RenameStrategy::FirstOccurrence => path.replacen(WRAPPED_SUFFIX, "", 1),
        RenameStrategy::Suffix => path.strip_suffix(WRAPPED_SUFFIX).unwrap_or(path).to_string(),
    }
}

/// Conversion predicate: the extension is in the convertible set.
pub fn is_convertible(file: &FileNode, convertible: &HashSet<String>) -> bool {
    let extension = file.extension();
    !extension.is_empty() && convertible.contains(extension)
}

/// Undo predicate: the path ends with `.md`.
pub fn is_wrapped(file: &FileNode) -> bool {
    file.path().ends_with(WRAPPED_SUFFIX)
}

/// Applies the transforms to files in a store, using one configuration snapshot.
#[derive(Clone, Copy, Debug)]
pub struct TransformEngine<'a> {
    languages: &'a LanguageTagMap,
    rename: RenameStrategy,
}

impl<'a> TransformEngine<'a> {
    pub fn new(languages: &'a LanguageTagMap, rename: RenameStrategy) -> Self {
        Self { languages, rename }
    }

    pub fn from_config(config: &'a Config) -> Self {
        Self::new(&config.languages, config.undo.rename)
    }

    pub fn language_tag<'e>(&self, extension: &'e str) -> &'e str
    where
        'a: 'e,
    {
        self.languages.resolve(extension)
    }

    /// Fence the file's content and append `.md` to its path. Returns the new path.
    pub fn wrap<S: Store + ?Sized>(&self, store: &S, file: &FileNode) -> FenceResult<String> {
        let path = file.path();
        let contents = read(store, path)?;
        let tag = self.language_tag(file.extension());
        write(store, path, &wrap_content(&contents, tag))?;

        let target = wrapped_path(path);
        rename(store, path, &target)?;
        tracing::debug!(from = path, to = %target, tag, "wrapped file");
        Ok(target)
    }

    /// Remove the fence and the `.md` marker from the path. Returns the new path.
    pub fn unwrap<S: Store + ?Sized>(&self, store: &S, file: &FileNode) -> FenceResult<String> {
        let path = file.path();
        let contents = read(store, path)?;
        write(store, path, &unwrap_content(&contents))?;

        let target = unwrapped_path(path, self.rename);
        if target != path {
            rename(store, path, &target)?;
        }
        tracing::debug!(from = path, to = %target, "unwrapped file");
        Ok(target)
    }
}

fn read<S: Store + ?Sized>(store: &S, path: &str) -> FenceResult<String> {
    store.read(path).map_err(|source| FenceError::Read {
        path: path.to_string(),
        source,
    })
}

fn write<S: Store + ?Sized>(store: &S, path: &str, contents: &str) -> FenceResult<()> {
    store.write(path, contents).map_err(|source| FenceError::Write {
        path: path.to_string(),
        source,
    })
}

fn rename<S: Store + ?Sized>(store: &S, from: &str, to: &str) -> FenceResult<()> {
    store.rename(from, to).map_err(|source| FenceError::Rename {
        from: from.to_string(),
        to: to.to_string(),
        source,
    })
}
