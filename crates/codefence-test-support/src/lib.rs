//! Shared test harness utilities for codefence crates.

use std::collections::BTreeSet;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use codefence_config::{Config, FileTypeCatalog};
use codefence_core::{ConfirmationGate, MemoryStore, Node, Store};

/// Returns a baseline configuration for tests.
pub fn test_config() -> Config {
    Config::builtin()
}

/// Baseline configuration rooted at `root` with exactly the given categories.
pub fn config_with(root: &str, file_types: &[(&str, &str)]) -> Config {
    let mut config = test_config();
    config.project.root = root.to_string();
    config.catalog = FileTypeCatalog::from_lists(file_types.iter().copied())
        .unwrap_or_else(|err| panic!("invalid test catalog: {err}"));
    config
}

/// Gate with a fixed answer that records every prompt it is shown.
#[derive(Debug)]
pub struct ScriptedGate {
    answer: bool,
    prompts: Mutex<Vec<(String, String)>>,
}

impl ScriptedGate {
    pub fn accepting() -> Self {
        Self::answering(true)
    }

    pub fn declining() -> Self {
        Self::answering(false)
    }

    fn answering(answer: bool) -> Self {
        Self {
            answer,
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// `(title, message)` pairs in the order they were asked.
    pub fn prompts(&self) -> Vec<(String, String)> {
        self.prompts.lock().unwrap().clone()
    }
}

impl ConfirmationGate for ScriptedGate {
    fn confirm(&self, title: &str, message: &str) -> bool {
        self.prompts
            .lock()
            .unwrap()
            .push((title.to_string(), message.to_string()));
        self.answer
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Fault {
    Read,
    Write,
    Rename,
}

/// Wraps a [`MemoryStore`], counting mutations and failing chosen operations.
#[derive(Debug, Default)]
pub struct FaultyStore {
    inner: MemoryStore,
    faults: BTreeSet<(Fault, String)>,
    mutations: AtomicUsize,
}

impl FaultyStore {
    pub fn new(inner: MemoryStore) -> Self {
        Self {
            inner,
            ..Self::default()
        }
    }

    /// Fail `fault` whenever it targets `path` (the source path for renames).
    pub fn failing(mut self, fault: Fault, path: &str) -> Self {
        self.faults.insert((fault, path.to_string()));
        self
    }

    pub fn inner(&self) -> &MemoryStore {
        &self.inner
    }

    /// Number of successful writes and renames.
    pub fn mutations(&self) -> usize {
        self.mutations.load(Ordering::SeqCst)
    }

    fn check(&self, fault: Fault, path: &str) -> io::Result<()> {
        if self.faults.contains(&(fault, path.to_string())) {
            Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                format!("injected {fault:?} failure"),
            ))
        } else {
            Ok(())
        }
    }
}

impl Store for FaultyStore {
    fn read(&self, path: &str) -> io::Result<String> {
        self.check(Fault::Read, path)?;
        self.inner.read(path)
    }

    fn write(&self, path: &str, contents: &str) -> io::Result<()> {
        self.check(Fault::Write, path)?;
        self.inner.write(path, contents)?;
        self.mutations.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn rename(&self, from: &str, to: &str) -> io::Result<()> {
        self.check(Fault::Rename, from)?;
        self.inner.rename(from, to)?;
        self.mutations.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn resolve(&self, path: &str) -> io::Result<Option<Node>> {
        self.inner.resolve(path)
    }
}
