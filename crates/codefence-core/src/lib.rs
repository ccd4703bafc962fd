pub mod error;
pub mod gate;
pub mod ops;
pub mod store;
pub mod transform;
pub mod walker;

pub use codefence_config::{Config, FileTypeCatalog, LanguageTagMap, RenameStrategy};
pub use error::{ExitCode, FenceError, FenceResult};
pub use gate::{AssumeYes, ConfirmationGate, Prompt};
pub use ops::{Operations, Report};
pub use store::{DirectoryNode, FileNode, FsStore, MemoryStore, Node, Store};
pub use transform::{unwrap_content, wrap_content, TransformEngine};
pub use walker::{resolve_directory, walk};
