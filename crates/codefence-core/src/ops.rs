//! Top-level operations: ask the gate, then walk and transform.

use codefence_config::Config;
use tracing::{info, info_span, warn};

use crate::error::{FenceError, FenceResult};
use crate::gate::{ConfirmationGate, Prompt};
use crate::store::{FileNode, Node, Store};
use crate::transform::{is_convertible, is_wrapped, TransformEngine};
use crate::walker::{resolve_directory, walk};

/// What a top-level operation did.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Report {
    /// The gate declined; the store was not touched.
    Declined,
    Converted { count: usize },
    /// Path the single file was restored to.
    FileRestored { path: String },
    TreeRestored { count: usize },
}

impl Report {
    pub fn count(&self) -> usize {
        match self {
            Report::Declined => 0,
            Report::Converted { count } | Report::TreeRestored { count } => *count,
            Report::FileRestored { .. } => 1,
        }
    }

    pub fn is_declined(&self) -> bool {
        matches!(self, Report::Declined)
    }

    /// One-line summary suitable for showing to the user.
    pub fn notice(&self) -> String {
        match self {
            Report::Declined => "Cancelled".to_string(),
            Report::Converted { count: 0 } => "Nothing's been converted".to_string(),
            Report::Converted { count } => format!("{count} file(s) converted"),
            Report::FileRestored { path } => {
                let name = path.rsplit('/').next().unwrap_or(path);
                format!("Changes undone for {name}")
            }
            Report::TreeRestored { count } => format!("Changes undone for {count} file(s)"),
        }
    }
}

/// Operation bundle over one store and one confirmation gate. Configuration
/// is passed to every call and treated as a snapshot for its duration.
pub struct Operations<'a, S: ?Sized, G: ?Sized> {
    store: &'a S,
    gate: &'a G,
}

impl<'a, S, G> Operations<'a, S, G>
where
    S: Store + ?Sized,
    G: ConfirmationGate + ?Sized,
{
    pub fn new(store: &'a S, gate: &'a G) -> Self {
        Self { store, gate }
    }

    /// Wrap every convertible file under the configured root.
    pub fn convert_tree(&self, config: &Config) -> FenceResult<Report> {
        let root_path = config.project.root.as_str();
        let _span = info_span!("convert_tree", root = root_path).entered();

        if !Prompt::convert_tree().ask(self.gate) {
            info!("conversion declined");
            return Ok(Report::Declined);
        }

        let root = resolve_directory(self.store, root_path)?;
        let convertible = config.catalog.convertible();
        let engine = TransformEngine::from_config(config);
        let store = self.store;

        let count = walk(
            &root,
            &|file: &FileNode| is_convertible(file, &convertible),
            &|file: &FileNode| engine.wrap(store, file).map(drop),
        )
        .map_err(|err| {
            warn!(error = %err, "conversion aborted");
            err
        })?;

        info!(count, "conversion finished");
        Ok(Report::Converted { count })
    }

    /// Unwrap exactly one file, without walking.
    pub fn undo_single_file(&self, config: &Config, path: &str) -> FenceResult<Report> {
        let _span = info_span!("undo_single_file", path).entered();

        let file = match self.store.resolve(path) {
            Ok(Some(Node::File(file))) => file,
            Ok(_) => {
                return Err(FenceError::FileNotFound {
                    path: path.to_string(),
                })
            }
            Err(source) => {
                return Err(FenceError::Resolve {
                    path: path.to_string(),
                    source,
                })
            }
        };

        if !Prompt::undo_file(file.basename()).ask(self.gate) {
            info!("undo declined");
            return Ok(Report::Declined);
        }

        let restored = TransformEngine::from_config(config).unwrap(self.store, &file)?;
        info!(restored = %restored, "file restored");
        Ok(Report::FileRestored { path: restored })
    }

    /// Unwrap every `.md` file under the configured root.
    ///
    /// The root is resolved before prompting, so a missing directory is
    /// reported without asking first.
    pub fn undo_tree(&self, config: &Config) -> FenceResult<Report> {
        let root_path = config.project.root.as_str();
        let _span = info_span!("undo_tree", root = root_path).entered();

        let root = resolve_directory(self.store, root_path)?;

        if !Prompt::undo_tree().ask(self.gate) {
            info!("undo declined");
            return Ok(Report::Declined);
        }

        let engine = TransformEngine::from_config(config);
        let store = self.store;

        let count = walk(&root, &is_wrapped, &|file: &FileNode| {
            engine.unwrap(store, file).map(drop)
        })
        .map_err(|err| {
            warn!(error = %err, "undo aborted");
            err
        })?;

        info!(count, "undo finished");
        Ok(Report::TreeRestored { count })
    }
}
