/*!
 * SourceManager: given a source file and the receiver's block list, produces
 * the delta instruction stream that reconstructs the source when applied to
 * the destination.
 */

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::SyncConfig;
use crate::core::delta::{build_index, generate_delta, BlockInfo, DeltaInstruction};
use crate::error::{BlockSyncError, Result};

/// Owns the source path for one transaction and produces the delta stream
/// against a peer-supplied block list.
pub struct SourceManager {
    source_path: PathBuf,
}

impl SourceManager {
    pub fn new(source_path: impl Into<PathBuf>) -> Self {
        Self {
            source_path: source_path.into(),
        }
    }

    pub fn source_path(&self) -> &Path {
        &self.source_path
    }

    /// Build the `BlockIndex` from the destination's block list, scan the
    /// source file, and emit the delta instruction stream.
    pub fn get_delta(&self, dest_blocks: Vec<BlockInfo>, config: &SyncConfig) -> Result<Vec<DeltaInstruction>> {
        config.validate()?;

        let source_bytes = fs::read(&self.source_path)
            .map_err(|e| BlockSyncError::io(&self.source_path, e))?;

        let index = build_index(dest_blocks, config.block_size)?;
        generate_delta(&source_bytes, &index, config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HashAlgorithm;
    use crate::core::delta::DeltaInstruction;
    use crate::core::destination::scan_bytes;
    use tempfile::tempdir;

    #[test]
    fn test_get_delta_against_empty_blocks_inserts_whole_file() {
        let dir = tempdir().unwrap();
        let src_path = dir.path().join("src.bin");
        fs::write(&src_path, b"hello").unwrap();

        let manager = SourceManager::new(&src_path);
        let config = SyncConfig::default().with_block_size(4);
        let delta = manager.get_delta(Vec::new(), &config).unwrap();

        assert_eq!(
            delta,
            vec![DeltaInstruction::Insert {
                bytes: b"hello".to_vec()
            }]
        );
    }

    #[test]
    fn test_get_delta_reuses_matching_blocks() {
        let dir = tempdir().unwrap();
        let src_path = dir.path().join("src.bin");
        fs::write(&src_path, b"abcdefgh").unwrap();

        let dest_blocks = scan_bytes(b"abcdefgh", 4, HashAlgorithm::Blake3).unwrap();

        let manager = SourceManager::new(&src_path);
        let config = SyncConfig::default().with_block_size(4);
        let delta = manager.get_delta(dest_blocks, &config).unwrap();

        assert_eq!(
            delta,
            vec![
                DeltaInstruction::Copy { offset: 0, length: 4 },
                DeltaInstruction::Copy { offset: 4, length: 4 },
            ]
        );
    }

    #[test]
    fn test_empty_source_yields_empty_delta() {
        let dir = tempdir().unwrap();
        let src_path = dir.path().join("empty.bin");
        fs::write(&src_path, b"").unwrap();

        let manager = SourceManager::new(&src_path);
        let config = SyncConfig::default().with_block_size(4);
        let delta = manager.get_delta(Vec::new(), &config).unwrap();

        assert!(delta.is_empty());
    }

    #[test]
    fn test_missing_source_is_io_error() {
        let dir = tempdir().unwrap();
        let src_path = dir.path().join("nonexistent.bin");
        let manager = SourceManager::new(&src_path);
        let config = SyncConfig::default();
        let result = manager.get_delta(Vec::new(), &config);
        assert!(result.is_err());
    }
}
