/*!
 * Delta data model: `BlockInfo`, `BlockIndex`, `DeltaInstruction`, and the
 * rolling-hash scan that turns a source file plus a destination block list
 * into a delta instruction stream.
 */

use std::collections::HashMap;

use crate::config::{HashAlgorithm, SyncConfig};
use crate::core::hash::{strong_hash, weak_hash, RollingChecksum};
use crate::error::{BlockSyncError, Result};

/// One block scanned from the destination file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockInfo {
    pub offset: u64,
    pub length: u32,
    pub weak_hash: u32,
    pub strong_hash: Vec<u8>,
}

impl BlockInfo {
    pub fn new(offset: u64, length: u32, weak_hash: u32, strong_hash: Vec<u8>) -> Self {
        Self {
            offset,
            length,
            weak_hash,
            strong_hash,
        }
    }
}

/// An instruction in the reconstruction program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeltaInstruction {
    /// Copy `length` bytes starting at `offset` in the destination file.
    Copy { offset: u64, length: u64 },
    /// Insert these literal bytes verbatim.
    Insert { bytes: Vec<u8> },
}

/// A lookup from weak hash to the candidate destination blocks sharing it.
/// Collisions are expected and disambiguated by strong hash at match time.
pub struct BlockIndex {
    buckets: HashMap<u32, Vec<BlockInfo>>,
    block_size: usize,
}

impl BlockIndex {
    /// Build an index from a destination block list. Blocks are kept sorted
    /// by offset within each bucket so that duplicate-content ties resolve
    /// deterministically to the smallest offset (§4.3 "match ordering").
    pub fn build(blocks: Vec<BlockInfo>, block_size: usize) -> Self {
        let mut buckets: HashMap<u32, Vec<BlockInfo>> = HashMap::new();
        for block in blocks {
            buckets.entry(block.weak_hash).or_default().push(block);
        }
        for bucket in buckets.values_mut() {
            bucket.sort_by_key(|b| b.offset);
        }
        Self { buckets, block_size }
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Find the matching block for a candidate window, given its weak hash
    /// and the window's bytes (strong hash computed lazily, only on a weak
    /// hit).
    fn find_match(&self, weak: u32, window: &[u8], algorithm: HashAlgorithm) -> Result<Option<&BlockInfo>> {
        let Some(candidates) = self.buckets.get(&weak) else {
            return Ok(None);
        };

        let strong = strong_hash(window, algorithm)?;
        for candidate in candidates {
            if candidate.strong_hash == strong {
                return Ok(Some(candidate));
            }
        }
        Ok(None)
    }
}

/// Maximum chunk size used when splitting a literal buffer flush, sourced
/// from `SyncConfig::max_insert_chunk`.
fn flush_literal(buffer: &mut Vec<u8>, max_chunk: usize, out: &mut Vec<DeltaInstruction>) {
    if buffer.is_empty() {
        return;
    }
    let taken = std::mem::take(buffer);
    for chunk in taken.chunks(max_chunk.max(1)) {
        out.push(DeltaInstruction::Insert {
            bytes: chunk.to_vec(),
        });
    }
}

/// Produce the delta instruction stream that reconstructs `source` when
/// applied to a destination described by `index` (§4.3).
pub fn generate_delta(source: &[u8], index: &BlockIndex, config: &SyncConfig) -> Result<Vec<DeltaInstruction>> {
    config.validate()?;
    let block_size = index.block_size();

    let mut instructions = Vec::new();

    if source.is_empty() {
        return Ok(instructions);
    }

    if index.is_empty() {
        let mut literal = source.to_vec();
        flush_literal(&mut literal, config.max_insert_chunk, &mut instructions);
        return Ok(instructions);
    }

    let mut literal_buffer: Vec<u8> = Vec::new();
    let mut p: usize = 0;
    let len = source.len();

    // Initialize rolling state over the first window, if one fits.
    let mut rolling = if len >= block_size {
        RollingChecksum::new(&source[0..block_size])
    } else {
        RollingChecksum::new(&source[0..len])
    };

    while p < len {
        if len - p < block_size {
            // Short tail: never matched, flushed as literal (§4.3 tail rule).
            literal_buffer.extend_from_slice(&source[p..]);
            p = len;
            break;
        }

        let window = &source[p..p + block_size];
        let weak = rolling.value();
        debug_assert_eq!(weak, weak_hash(window));

        match index.find_match(weak, window, config.hash_algorithm)? {
            Some(matched) => {
                flush_literal(&mut literal_buffer, config.max_insert_chunk, &mut instructions);
                instructions.push(DeltaInstruction::Copy {
                    offset: matched.offset,
                    length: block_size as u64,
                });
                p += block_size;
                if len - p >= block_size {
                    rolling = RollingChecksum::new(&source[p..p + block_size]);
                } else if p < len {
                    rolling = RollingChecksum::new(&source[p..len]);
                }
            }
            None => {
                literal_buffer.push(source[p]);
                let next = p + 1;
                if len - next >= block_size {
                    rolling.roll(source[p], source[next + block_size - 1]);
                }
                p = next;
            }
        }
    }

    flush_literal(&mut literal_buffer, config.max_insert_chunk, &mut instructions);

    Ok(instructions)
}

/// Build a `BlockIndex` straight from a `Vec<BlockInfo>`, rejecting a zero
/// block size at construction (§4.3 edge case).
pub fn build_index(blocks: Vec<BlockInfo>, block_size: usize) -> Result<BlockIndex> {
    if block_size == 0 {
        return Err(BlockSyncError::InvalidArgument(
            "block_size must be positive".to_string(),
        ));
    }
    Ok(BlockIndex::build(blocks, block_size))
}
