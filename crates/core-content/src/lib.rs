//! Read-only content and asset access for screens.
//!
//! Screens depend only on the request/response contracts here
//! ([`ContentProvider`], [`AssetProvider`]); the storage format behind them
//! is not their concern.

mod assets;
mod records;

pub use assets::{AssetProvider, MemoryAssets, RawAssetDir};
pub use records::{ContentProvider, MemoryContent, ROOT_ID, Record, RecordId, TomlContent};

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ContentError {
    #[error("record {0} not found")]
    NotFound(RecordId),
    #[error("record {0} defined more than once")]
    DuplicateId(RecordId),
    #[error("record {parent} lists unknown child {child}")]
    DanglingChild { parent: RecordId, child: RecordId },
    #[error("dataset has no root record (id 0)")]
    MissingRoot,
    #[error("failed to read {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("asset file {} is malformed: {reason}", path.display())]
    Asset { path: PathBuf, reason: String },
}
