/*!
 * DestinationManager: scans the existing destination file into blocks, and
 * applies a received delta stream to rebuild it atomically.
 */

use std::fs::{self, File};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::config::{HashAlgorithm, SyncConfig};
use crate::core::delta::{BlockInfo, DeltaInstruction};
use crate::core::hash::{strong_hash, weak_hash};
use crate::error::{BlockSyncError, Result};

/// Owns the destination path for one transaction: scans it into blocks, and
/// applies a delta stream to atomically rebuild it.
pub struct DestinationManager {
    dest_path: PathBuf,
    block_size: usize,
}

impl DestinationManager {
    /// Construct a manager for `dest_path`, advisory `source_file_name`, per
    /// the path-resolution rule in §4.2: if `dest_path` is an existing
    /// directory, the real destination is `<dest_path>/<source_file_name>`.
    pub fn new(dest_path: impl AsRef<Path>, source_file_name: &str, block_size: usize) -> Self {
        let dest_path = dest_path.as_ref();
        let resolved = if dest_path.is_dir() {
            dest_path.join(source_file_name)
        } else {
            dest_path.to_path_buf()
        };
        Self {
            dest_path: resolved,
            block_size,
        }
    }

    pub fn dest_path(&self) -> &Path {
        &self.dest_path
    }

    /// Scan the destination into `BlockInfo`s. A missing file is a success
    /// with an empty list ("new file"), not an error.
    pub fn scan(&self, hash_algorithm: HashAlgorithm) -> Result<Vec<BlockInfo>> {
        if !self.dest_path.exists() {
            tracing::info!(path = %self.dest_path.display(), "destination does not exist, treating as new file");
            return Ok(Vec::new());
        }

        let mut file = File::open(&self.dest_path).map_err(|e| BlockSyncError::io(&self.dest_path, e))?;
        let mut buffer = vec![0u8; self.block_size];
        let mut blocks = Vec::new();
        let mut offset: u64 = 0;

        loop {
            let n = file.read(&mut buffer).map_err(|e| BlockSyncError::io(&self.dest_path, e))?;
            if n == 0 {
                break;
            }
            let chunk = &buffer[..n];
            let weak = weak_hash(chunk);
            let strong = strong_hash(chunk, hash_algorithm)?;
            blocks.push(BlockInfo::new(offset, n as u32, weak, strong));
            offset += n as u64;
        }

        Ok(blocks)
    }

    /// Same as `scan`, but hashes blocks concurrently across a rayon pool.
    /// Reads the whole file up front rather than streaming it, trading
    /// memory for parallelism; worthwhile once a file is large enough that
    /// strong-hash computation dominates scan time.
    pub fn scan_parallel(&self, hash_algorithm: HashAlgorithm) -> Result<Vec<BlockInfo>> {
        use rayon::prelude::*;

        if !self.dest_path.exists() {
            tracing::info!(path = %self.dest_path.display(), "destination does not exist, treating as new file");
            return Ok(Vec::new());
        }

        let data = fs::read(&self.dest_path).map_err(|e| BlockSyncError::io(&self.dest_path, e))?;
        let block_size = self.block_size.max(1);

        data.chunks(block_size)
            .collect::<Vec<_>>()
            .into_par_iter()
            .enumerate()
            .map(|(i, chunk)| {
                let weak = weak_hash(chunk);
                let strong = strong_hash(chunk, hash_algorithm)?;
                Ok(BlockInfo::new((i * block_size) as u64, chunk.len() as u32, weak, strong))
            })
            .collect()
    }

    /// Apply a delta instruction stream, rebuilding the destination at a
    /// temp path and then atomically renaming it into place (§4.2, §5).
    pub fn apply(&self, instructions: &[DeltaInstruction]) -> Result<()> {
        if let Some(parent) = self.dest_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| BlockSyncError::io(parent, e))?;
            }
        }

        let tmp_path = temp_path(&self.dest_path);

        let old_file = File::open(&self.dest_path).ok();

        {
            let mut tmp_file =
                File::create(&tmp_path).map_err(|e| BlockSyncError::io(&tmp_path, e))?;
            self.write_instructions(instructions, old_file, &mut tmp_file, &tmp_path)?;
            tmp_file.sync_all().map_err(|e| BlockSyncError::io(&tmp_path, e))?;
        }

        if self.dest_path.exists() {
            fs::remove_file(&self.dest_path).map_err(|e| BlockSyncError::io(&self.dest_path, e))?;
        }
        fs::rename(&tmp_path, &self.dest_path).map_err(|e| BlockSyncError::io(&self.dest_path, e))?;

        tracing::info!(path = %self.dest_path.display(), "destination successfully created/updated");
        Ok(())
    }

    fn write_instructions(
        &self,
        instructions: &[DeltaInstruction],
        mut old_file: Option<File>,
        tmp_file: &mut File,
        tmp_path: &Path,
    ) -> Result<()> {
        for instruction in instructions {
            match instruction {
                DeltaInstruction::Copy { offset, length } => {
                    let Some(ref mut old) = old_file else {
                        // COPY against a non-existent destination is skipped
                        // (treated as empty), per §3 invariants.
                        continue;
                    };
                    old.seek(SeekFrom::Start(*offset))
                        .map_err(|e| BlockSyncError::io(&self.dest_path, e))?;
                    let mut remaining = *length;
                    let mut buf = [0u8; 8192];
                    while remaining > 0 {
                        let to_read = remaining.min(buf.len() as u64) as usize;
                        let n = old
                            .read(&mut buf[..to_read])
                            .map_err(|e| BlockSyncError::io(&self.dest_path, e))?;
                        if n == 0 {
                            // File shortened since scan; copy fewer bytes
                            // than declared. Acceptable per §4.2.
                            break;
                        }
                        tmp_file
                            .write_all(&buf[..n])
                            .map_err(|e| BlockSyncError::io(tmp_path, e))?;
                        remaining -= n as u64;
                    }
                }
                DeltaInstruction::Insert { bytes } => {
                    tmp_file
                        .write_all(bytes)
                        .map_err(|e| BlockSyncError::io(tmp_path, e))?;
                }
            }
        }
        Ok(())
    }
}

/// Scan an in-memory byte slice into `BlockInfo`s, for algorithm tests that
/// don't want to round-trip through the filesystem.
pub fn scan_bytes(data: &[u8], block_size: usize, hash_algorithm: HashAlgorithm) -> Result<Vec<BlockInfo>> {
    let mut blocks = Vec::new();
    let mut offset: u64 = 0;
    for chunk in data.chunks(block_size.max(1)) {
        let weak = weak_hash(chunk);
        let strong = strong_hash(chunk, hash_algorithm)?;
        blocks.push(BlockInfo::new(offset, chunk.len() as u32, weak, strong));
        offset += chunk.len() as u64;
    }
    Ok(blocks)
}

fn temp_path(dest_path: &Path) -> PathBuf {
    let mut os_string = dest_path.as_os_str().to_os_string();
    os_string.push(".sync.tmp");
    PathBuf::from(os_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SyncConfig;
    use crate::core::delta::{build_index, generate_delta};
    use tempfile::tempdir;

    #[test]
    fn test_scan_missing_file_is_empty_not_error() {
        let dir = tempdir().unwrap();
        let dest = dir.path().join("missing.bin");
        let manager = DestinationManager::new(&dest, "missing.bin", 4);
        let blocks = manager.scan(HashAlgorithm::Blake3).unwrap();
        assert!(blocks.is_empty());
    }

    #[test]
    fn test_scan_yields_contiguous_blocks() {
        let dir = tempdir().unwrap();
        let dest = dir.path().join("dest.bin");
        fs::write(&dest, b"abcdefg").unwrap(); // 7 bytes, block 4 -> [4,3]

        let manager = DestinationManager::new(&dest, "dest.bin", 4);
        let blocks = manager.scan(HashAlgorithm::Blake3).unwrap();

        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].offset, 0);
        assert_eq!(blocks[0].length, 4);
        assert_eq!(blocks[1].offset, 4);
        assert_eq!(blocks[1].length, 3);
    }

    #[test]
    fn test_apply_creates_new_file() {
        let dir = tempdir().unwrap();
        let dest = dir.path().join("new.bin");
        let manager = DestinationManager::new(&dest, "new.bin", 4);

        let instructions = vec![DeltaInstruction::Insert {
            bytes: b"hello".to_vec(),
        }];
        manager.apply(&instructions).unwrap();

        assert_eq!(fs::read(&dest).unwrap(), b"hello");
        assert!(!temp_path(&dest).exists());
    }

    #[test]
    fn test_apply_round_trip_matches_reconstruction_law() {
        let dir = tempdir().unwrap();
        let dest = dir.path().join("file.bin");
        fs::write(&dest, b"abcdWXYZefgh").unwrap();

        let manager = DestinationManager::new(&dest, "file.bin", 4);
        let blocks = manager.scan(HashAlgorithm::Blake3).unwrap();
        let index = build_index(blocks, 4).unwrap();

        let src = b"abcd1234efgh";
        let cfg = SyncConfig::default().with_block_size(4);
        let delta = generate_delta(src, &index, &cfg).unwrap();

        manager.apply(&delta).unwrap();
        assert_eq!(fs::read(&dest).unwrap(), src);
    }

    #[test]
    fn test_apply_is_atomic_no_partial_writes_visible() {
        let dir = tempdir().unwrap();
        let dest = dir.path().join("file.bin");
        fs::write(&dest, b"original content").unwrap();

        let manager = DestinationManager::new(&dest, "file.bin", 4);
        // A COPY referencing an offset past EOF degrades to a short copy,
        // not a failure; the destination is still replaced atomically.
        let instructions = vec![DeltaInstruction::Insert {
            bytes: b"replacement".to_vec(),
        }];
        manager.apply(&instructions).unwrap();

        let content = fs::read(&dest).unwrap();
        assert_eq!(content, b"replacement");
    }

    #[test]
    fn test_scan_parallel_matches_scan() {
        let dir = tempdir().unwrap();
        let dest = dir.path().join("dest.bin");
        fs::write(&dest, b"abcdefghijklmnopqrstuvwxyz").unwrap();

        let manager = DestinationManager::new(&dest, "dest.bin", 4);
        let sequential = manager.scan(HashAlgorithm::Blake3).unwrap();
        let parallel = manager.scan_parallel(HashAlgorithm::Blake3).unwrap();

        assert_eq!(sequential, parallel);
    }

    #[test]
    fn test_directory_destination_resolves_to_source_file_name() {
        let dir = tempdir().unwrap();
        let manager = DestinationManager::new(dir.path(), "report.txt", 4);
        assert_eq!(manager.dest_path(), dir.path().join("report.txt"));
    }
}
