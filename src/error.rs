/*!
 * Error types for blocksync
 */

use std::path::PathBuf;

/// Result type used throughout the crate
pub type Result<T> = std::result::Result<T, BlockSyncError>;

/// Errors produced by the delta engine, the transaction protocol, and the
/// server/client edges.
#[derive(Debug, thiserror::Error)]
pub enum BlockSyncError {
    /// Bad path, zero block size, or other caller-supplied argument that can
    /// never succeed.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Filesystem I/O failure: open, read, write, rename.
    #[error("I/O error{}: {source}", path.as_ref().map(|p| format!(" on {}", p.display())).unwrap_or_default())]
    Io {
        path: Option<PathBuf>,
        #[source]
        source: std::io::Error,
    },

    /// Short read, truncated frame, or a malformed wire record.
    #[error("framing error: {0}")]
    Framing(String),

    /// Unexpected command, or the peer denied a step with `status{ok=false}`.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Internal hash computation fault (should not occur in practice).
    #[error("hash error: {0}")]
    Hash(String),
}

impl BlockSyncError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: Some(path.into()),
            source,
        }
    }

    /// Whether this error kind always terminates the transaction. Every kind
    /// does in this protocol — there is no retryable condition at the core
    /// level — kept for symmetry with `is_protocol_error`.
    pub fn is_fatal(&self) -> bool {
        true
    }

    pub fn is_protocol_error(&self) -> bool {
        matches!(self, Self::Protocol(_) | Self::Framing(_))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidArgument(_) => "InvalidArgument",
            Self::Io { .. } => "Io",
            Self::Framing(_) => "Framing",
            Self::Protocol(_) => "Protocol",
            Self::Hash(_) => "Hash",
        }
    }
}

impl From<std::io::Error> for BlockSyncError {
    fn from(source: std::io::Error) -> Self {
        Self::Io { path: None, source }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_invalid_argument() {
        let err = BlockSyncError::InvalidArgument("block size must be positive".into());
        assert_eq!(err.to_string(), "invalid argument: block size must be positive");
    }

    #[test]
    fn test_io_from_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: BlockSyncError = io_err.into();
        assert_eq!(err.kind(), "Io");
    }

    #[test]
    fn test_protocol_error_classification() {
        assert!(BlockSyncError::Protocol("bad command".into()).is_protocol_error());
        assert!(BlockSyncError::Framing("short read".into()).is_protocol_error());
        assert!(!BlockSyncError::Hash("boom".into()).is_protocol_error());
    }
}
