// Error kinds
//
// Two tiers: index errors are fatal and surface the offending file path;
// per-read errors never abort a worker, they downgrade the read to an
// UNMAPPED record. MPHF false positives are neither: filtering them is
// routine and silent.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

pub const INDEX_MAGIC: [u8; 8] = *b"GYEETIDX";
pub const INDEX_VERSION: u32 = 1;

/// Fatal errors while building or loading an index.
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("{path}: bad index magic")]
    BadMagic { path: PathBuf },

    #[error("{path}: index version {found} not supported (expected {INDEX_VERSION})")]
    VersionMismatch { path: PathBuf, found: u32 },

    #[error("{path}: truncated index file (need {needed} bytes, have {got})")]
    Truncated {
        path: PathBuf,
        needed: usize,
        got: usize,
    },

    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{path}: failed to decode MPHF: {reason}")]
    BadMphf { path: PathBuf, reason: String },

    #[error("k-mer length {k} not supported (must be 1..={max})")]
    UnsupportedK { k: usize, max: usize },
}

impl IndexError {
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        IndexError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Per-read errors; each one produces an UNMAPPED record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MapError {
    #[error("query contains invalid base {0:#04x}")]
    InvalidBase(u8),

    #[error("empty query")]
    EmptyQuery,

    #[error("position arithmetic overflow")]
    Overflow,
}
