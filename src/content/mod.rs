//! Content model and loader.
//!
//! Entries live under `<content_dir>/articles`, one file per entry, in any
//! directory layout. Hidden files and directories are ignored.

mod collection;
mod entry;
mod loader;
mod timestamp;

pub use collection::{Content, Entries, GroupIndex};
pub use entry::{Entry, Permalink, Status};
pub use loader::{StatusFilter, load, read_entry};
pub use timestamp::{HEADER_FORMAT, Timestamp};

use crate::render::RenderError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading entries. Each names the offending file.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Failed to read `{0}`")]
    Io(PathBuf, #[source] std::io::Error),

    #[error("Failed to walk `{0}`")]
    Walk(PathBuf, #[source] walkdir::Error),

    #[error("Malformed header in `{path}`: {line:?} (expected `:key: value`)")]
    Header { path: PathBuf, line: String },

    #[error("Invalid status in `{path}`: {value:?} (expected draft or published)")]
    Status { path: PathBuf, value: String },

    #[error("Invalid {key} in `{path}`: {value:?} (expected YYYY-MM-DD HH:MM:SS)")]
    Timestamp {
        path: PathBuf,
        key: String,
        value: String,
    },

    #[error("Failed to compute the permalink of `{0}`")]
    Permalink(PathBuf, #[source] RenderError),
}
