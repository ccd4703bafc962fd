//! Shared utilities for codefence crates.

use std::fs;
use std::io::{self, Write};
use std::path::Path;

use rayon::iter::{IntoParallelRefIterator, ParallelIterator};
use tempfile::Builder;

/// Run `func` over every item in parallel and add up the counts it returns.
///
/// The first error observed becomes the result; items not yet started at that
/// point are skipped and no partial sum is reported.
pub fn parallel_try_sum<T, E, F>(items: &[T], func: F) -> Result<usize, E>
where
    T: Sync,
    E: Send,
    F: Fn(&T) -> Result<usize, E> + Send + Sync,
{
    items
        .par_iter()
        .map(func)
        .try_reduce(|| 0, |left, right| Ok(left + right))
}

/// Atomically write the provided string to `path`, ensuring readers never observe
/// partial content. The write is performed via a temporary file in the same
/// directory followed by an atomic rename.
pub fn atomic_write(path: &Path, contents: &str) -> io::Result<()> {
    let parent = path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| Path::new(".").to_path_buf());

    let mut tmp = Builder::new().prefix(".codefence").tempfile_in(&parent)?;

    tmp.as_file_mut().write_all(contents.as_bytes())?;
    tmp.as_file_mut().sync_all()?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if let Ok(metadata) = fs::metadata(path) {
            let perm = metadata.permissions().mode();
            let _ = fs::set_permissions(tmp.path(), fs::Permissions::from_mode(perm));
        }
    }

    tmp.persist(path).map(|_| ()).map_err(|err| err.error)
}

/// Normalise a user-supplied store path: `\` becomes `/`, non-breaking spaces
/// become plain spaces, then the path is cleaned as by [`clean_store_path`].
pub fn normalize_store_path(path: &str) -> String {
    clean_store_path(
        &path
            .replace('\\', "/")
            .replace(['\u{00A0}', '\u{202F}'], " "),
    )
}

/// Drop empty and `.` segments, leaving every name byte for byte. Paths the
/// store enumerated itself only ever go through this. The store root is `""`.
pub fn clean_store_path(path: &str) -> String {
    path.split('/')
        .filter(|segment| !segment.is_empty() && *segment != ".")
        .collect::<Vec<_>>()
        .join("/")
}

/// Join a store-relative directory and a child name.
pub fn join_store_path(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{parent}/{name}")
    }
}
