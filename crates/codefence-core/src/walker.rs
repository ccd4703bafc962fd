//! Recursive, concurrent traversal of a directory snapshot.

use codefence_utils::parallel_try_sum;

use crate::error::{FenceError, FenceResult};
use crate::store::{DirectoryNode, FileNode, Node, Store};

/// Resolve `path` to a directory snapshot, or fail with `DirectoryNotFound`.
pub fn resolve_directory<S: Store + ?Sized>(store: &S, path: &str) -> FenceResult<DirectoryNode> {
    let node = store.resolve(path).map_err(|source| FenceError::Resolve {
        path: path.to_string(),
        source,
    })?;
    match node {
        Some(Node::Directory(dir)) => Ok(dir),
        _ => Err(FenceError::DirectoryNotFound {
            path: path.to_string(),
        }),
    }
}

/// Apply `transform` to every file under `root` accepted by `matches` and
/// return how many were transformed.
///
/// Siblings, files and subdirectories alike, are processed in parallel with no
/// ordering between them. The first transform error aborts the walk and is
/// returned in place of a count.
pub fn walk<M, T>(root: &DirectoryNode, matches: &M, transform: &T) -> FenceResult<usize>
where
    M: Fn(&FileNode) -> bool + Sync,
    T: Fn(&FileNode) -> FenceResult<()> + Sync,
{
    tracing::trace!(directory = root.path(), children = root.children().len(), "walking");
    parallel_try_sum(root.children(), |child| match child {
        Node::File(file) if matches(file) => {
            transform(file)?;
            Ok(1)
        }
        Node::File(_) => Ok(0),
        Node::Directory(dir) => walk(dir, matches, transform),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use std::collections::BTreeSet;
    use std::io;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::thread;
    use std::time::{Duration, Instant};

    fn deep_store(depth: usize) -> MemoryStore {
        let store = MemoryStore::new();
        let mut dir = String::from("Code");
        for level in 0..depth {
            store.insert(format!("{dir}/f{level}.js"), "");
            store.insert(format!("{dir}/f{level}.txt"), "");
            dir.push_str(&format!("/d{level}"));
        }
        store
    }

    #[test]
    fn visits_each_matching_file_once() {
        let store = deep_store(40);
        let root = resolve_directory(&store, "Code").unwrap();
        let visited = Mutex::new(Vec::new());

        let count = walk(
            &root,
            &|file: &FileNode| file.extension() == "js",
            &|file: &FileNode| {
                visited.lock().unwrap().push(file.path().to_string());
                Ok(())
            },
        )
        .unwrap();

        let visited = visited.into_inner().unwrap();
        let unique: BTreeSet<_> = visited.iter().cloned().collect();
        assert_eq!(count, 40);
        assert_eq!(visited.len(), 40);
        assert_eq!(unique.len(), 40);
    }

    #[test]
    fn siblings_are_transformed_concurrently() {
        let store = MemoryStore::with_files([("Code/a.js", ""), ("Code/b.js", "")]);
        let root = resolve_directory(&store, "Code").unwrap();
        let in_flight = AtomicUsize::new(0);
        let peak = AtomicUsize::new(0);

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(2)
            .build()
            .unwrap();
        let count = pool
            .install(|| {
                walk(&root, &|_: &FileNode| true, &|_: &FileNode| {
                    let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    // Hold this transform open until the sibling has started too.
                    let deadline = Instant::now() + Duration::from_secs(5);
                    while peak.load(Ordering::SeqCst) < 2 && Instant::now() < deadline {
                        thread::sleep(Duration::from_millis(1));
                    }
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                    Ok(())
                })
            })
            .unwrap();

        assert_eq!(count, 2);
        assert_eq!(peak.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn empty_directory_counts_zero() {
        let store = MemoryStore::new();
        store.create_dir("Code");
        let root = resolve_directory(&store, "Code").unwrap();
        let count = walk(&root, &|_: &FileNode| true, &|_: &FileNode| Ok(())).unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn first_failure_aborts_the_walk() {
        let store = deep_store(10);
        let root = resolve_directory(&store, "Code").unwrap();

        let err = walk(&root, &|_: &FileNode| true, &|file: &FileNode| {
            if file.path().ends_with("f5.js") {
                Err(FenceError::Write {
                    path: file.path().to_string(),
                    source: io::Error::new(io::ErrorKind::Other, "disk full"),
                })
            } else {
                Ok(())
            }
        })
        .unwrap_err();

        assert!(err.path().ends_with("f5.js"));
    }

    #[test]
    fn missing_or_file_roots_are_not_directories() {
        let store = MemoryStore::with_files([("Code/a.js", "")]);
        assert!(matches!(
            resolve_directory(&store, "Other"),
            Err(FenceError::DirectoryNotFound { .. })
        ));
        assert!(matches!(
            resolve_directory(&store, "Code/a.js"),
            Err(FenceError::DirectoryNotFound { .. })
        ));
    }
}
