use std::path::PathBuf;
use thiserror::Error;

/// Errors produced by the XML engine and file plumbing.
///
/// Per-file failures are converted to per-file outcomes by the orchestrator;
/// nothing here aborts a surrounding scan or batch.
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed XML: unterminated tags, invalid entities, stray markup.
    #[error("malformed XML near byte {position}: {message}")]
    Parse { position: u64, message: String },

    /// Read or write failure on a single file.
    #[error("failed to {action} {path}: {source}")]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failure while rebuilding XML text from the node tree.
    #[error("XML serialization failed: {0}")]
    Serialize(String),
}

impl Error {
    pub(crate) fn parse(position: u64, message: impl std::fmt::Display) -> Self {
        Error::Parse {
            position,
            message: message.to_string(),
        }
    }

    pub(crate) fn io(action: &'static str, path: &std::path::Path, source: std::io::Error) -> Self {
        Error::Io {
            action,
            path: path.to_path_buf(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
