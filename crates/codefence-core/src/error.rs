use std::io;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ExitCode {
    Success = 0,
    NotFound = 1,
    /// Anything without a typed error behind it.
    Failure = 2,
    Config = 3,
    Io = 4,
}

#[derive(Debug, Error)]
pub enum FenceError {
    #[error("Directory not found: {path}")]
    DirectoryNotFound { path: String },

    #[error("File not found: {path}")]
    FileNotFound { path: String },

    #[error("failed to resolve '{path}': {source}")]
    Resolve {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to read '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to write '{path}': {source}")]
    Write {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to rename '{from}' to '{to}': {source}")]
    Rename {
        from: String,
        to: String,
        #[source]
        source: io::Error,
    },
}

impl FenceError {
    pub fn exit_code(&self) -> ExitCode {
        match self {
            Self::DirectoryNotFound { .. } | Self::FileNotFound { .. } => ExitCode::NotFound,
            Self::Resolve { .. } | Self::Read { .. } | Self::Write { .. } | Self::Rename { .. } => {
                ExitCode::Io
            }
        }
    }

    /// Path of the entry the failure concerns.
    pub fn path(&self) -> &str {
        match self {
            Self::DirectoryNotFound { path }
            | Self::FileNotFound { path }
            | Self::Resolve { path, .. }
            | Self::Read { path, .. }
            | Self::Write { path, .. } => path,
            Self::Rename { from, .. } => from,
        }
    }
}

pub type FenceResult<T> = Result<T, FenceError>;
