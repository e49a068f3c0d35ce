use std::path::PathBuf;

use thiserror::Error;

use crate::format::Format;
use crate::kind::EntityKind;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, CollectError>;

/// Canonical error surface for relicvault.
///
/// Data errors (everything up to and including `UnrecognizedDocument`) are
/// recovered at the registry boundary and surface as "no record produced";
/// `UnsupportedFormatForKind` signals caller misuse and always propagates.
#[derive(Debug, Error)]
pub enum CollectError {
    #[error("I/O error: {source}")]
    Io {
        source: std::io::Error,
        path: Option<PathBuf>,
    },

    #[error("Not an entity container: bad magic {found:?}")]
    UnsupportedContainer { found: [u8; 4] },

    #[error("Unsupported container version: {version}")]
    UnsupportedVersion { version: u16 },

    #[error("Input truncated while reading {context}")]
    TruncatedInput { context: &'static str },

    #[error("Decryption failed - wrong key or corrupted container")]
    DecryptionFailed,

    #[error("Malformed payload: {reason}")]
    MalformedPayload { reason: String },

    #[error("Unrecognized document: neither a known file version nor a container magic matched")]
    UnrecognizedDocument,

    #[error("{kind:?} does not support the {format:?} encoding")]
    UnsupportedFormatForKind { kind: EntityKind, format: Format },
}

impl From<std::io::Error> for CollectError {
    fn from(source: std::io::Error) -> Self {
        CollectError::Io { source, path: None }
    }
}

impl From<serde_json::Error> for CollectError {
    fn from(source: serde_json::Error) -> Self {
        CollectError::MalformedPayload {
            reason: source.to_string(),
        }
    }
}

impl CollectError {
    /// Whether this error describes bad input data rather than caller misuse.
    #[must_use]
    pub fn is_data_error(&self) -> bool {
        !matches!(self, CollectError::UnsupportedFormatForKind { .. })
    }
}
