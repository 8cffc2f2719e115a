/*!
 * blocksync - block-delta file synchronization over TCP
 *
 * An rsync-style synchronizer: a destination is described by a list of
 * rolling-checksummed blocks, a source is diffed against that list into a
 * stream of COPY/INSERT instructions, and the instruction stream is applied
 * to atomically rebuild the destination. PUSH sends a local file to a
 * remote peer; PULL fetches a remote file down to a local destination.
 */

pub mod client;
pub mod config;
pub mod core;
pub mod error;
pub mod logging;
pub mod protocol;
pub mod server;

pub use config::{HashAlgorithm, LogLevel, SyncConfig};
pub use core::{BlockIndex, BlockInfo, DeltaInstruction, DestinationManager, SourceManager};
pub use error::{BlockSyncError, Result};
