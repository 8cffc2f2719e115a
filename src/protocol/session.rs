/*!
 * The PUSH/PULL transaction state machine: ties the wire codec in
 * `protocol::mod` to the `SourceManager`/`DestinationManager` pair in
 * `core`, on both the client and server side of a connection.
 *
 * State progresses `Idle -> AwaitingPath -> AwaitingHashes -> AwaitingDelta
 * -> AwaitingStatus -> Done` (or `Failed` on any `status{ok=false}` or
 * wire error). The state itself isn't reified as a type here — each
 * transaction function is a straight-line sequence through these phases,
 * matching the step tables of the transaction protocol: every phase
 * transition is confirmed by its own status frame before the next phase
 * begins.
 */

use std::io::{Read, Write};
use std::path::Path;

use crate::config::SyncConfig;
use crate::core::{DestinationManager, SourceManager};
use crate::error::{BlockSyncError, Result};
use crate::protocol::{
    recv_blocks, recv_command, recv_deltas, recv_path, recv_status, send_blocks, send_command,
    send_deltas, send_path, send_status, Command, StatusMessage,
};

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn expect_ok(status: StatusMessage, context: &str) -> Result<()> {
    if status.ok {
        Ok(())
    } else {
        Err(BlockSyncError::Protocol(format!("{}: {}", context, status.msg)))
    }
}

// --- client side ---------------------------------------------------------------

/// Push `local_source` to `remote_dest` on the peer at the other end of
/// `stream`. Steps below are numbered per the PUSH table.
pub fn client_push<S: Read + Write>(
    stream: &mut S,
    local_source: &Path,
    remote_dest: &str,
    config: &SyncConfig,
) -> Result<()> {
    config.validate()?;

    send_command(stream, Command::Push)?; // 1
    send_path(stream, remote_dest)?; // 2
    send_path(stream, &file_name_of(local_source))?; // 3

    expect_ok(recv_status(stream)?, "path rejected")?; // 4
    expect_ok(recv_status(stream)?, "destination scan failed")?; // 5
    expect_ok(recv_status(stream)?, "peer aborted before sending hashes")?; // 6
    let dest_blocks = recv_blocks(stream, config.hash_algorithm)?; // 7

    let source = SourceManager::new(local_source); // 8
    let delta = source.get_delta(dest_blocks, config)?;

    send_deltas(stream, &delta)?; // 9

    expect_ok(recv_status(stream)?, "peer did not acknowledge deltas")?; // 10
    expect_ok(recv_status(stream)?, "peer failed to apply delta")?; // 11

    tracing::info!(source = %local_source.display(), dest = remote_dest, "push transaction completed");
    Ok(())
}

/// Pull `remote_source` from the peer down into `local_dest`. Steps below
/// are numbered per the PULL table.
pub fn client_pull<S: Read + Write>(
    stream: &mut S,
    remote_source: &str,
    local_dest: &Path,
    config: &SyncConfig,
) -> Result<()> {
    config.validate()?;

    send_command(stream, Command::Pull)?; // 1
    expect_ok(recv_status(stream)?, "peer rejected command")?; // 2
    send_path(stream, remote_source)?; // 3
    expect_ok(recv_status(stream)?, "remote source path rejected")?; // 4

    let dest = DestinationManager::new(local_dest, &file_name_of(local_dest), config.block_size);
    let dest_blocks = dest.scan(config.hash_algorithm)?; // 5
    send_blocks(stream, &dest_blocks)?; // 6

    expect_ok(recv_status(stream)?, "peer did not acknowledge hashes")?; // 7
    expect_ok(recv_status(stream)?, "peer failed to prepare delta")?; // 8
    let delta = recv_deltas(stream)?; // 9

    dest.apply(&delta)?; // 10, applied locally; no further wire traffic

    tracing::info!(source = remote_source, dest = %local_dest.display(), "pull transaction completed");
    Ok(())
}

// --- server side ---------------------------------------------------------------

/// Dispatch one accepted connection: read the command and run the
/// matching transaction to completion. Any protocol-level failure is
/// answered with `status{ok=false}` where the phase allows it, and
/// otherwise simply ends the connection.
pub fn handle_connection<S: Read + Write>(stream: &mut S, config: &SyncConfig) -> Result<()> {
    let command = recv_command(stream)?;
    match command {
        Command::Push => server_handle_push(stream, config),
        Command::Pull => server_handle_pull(stream, config),
    }
}

fn server_handle_push<S: Read + Write>(stream: &mut S, config: &SyncConfig) -> Result<()> {
    let dest_path = recv_path(stream)?; // 2
    let source_file_name = recv_path(stream)?; // 3

    if dest_path.is_empty() {
        let err = BlockSyncError::InvalidArgument("empty destination path".to_string());
        send_status(stream, &StatusMessage::fail(err.to_string()))?; // 4
        return Err(err);
    }
    send_status(stream, &StatusMessage::ok("path accepted"))?; // 4

    let dest = DestinationManager::new(&dest_path, &source_file_name, config.block_size);
    let blocks = match dest.scan(config.hash_algorithm) {
        Ok(blocks) => blocks,
        Err(e) => {
            send_status(stream, &StatusMessage::fail(e.to_string()))?; // 5
            return Err(e);
        }
    };
    send_status(stream, &StatusMessage::ok("scan ok"))?; // 5
    send_status(stream, &StatusMessage::ok("sending hashes"))?; // 6
    send_blocks(stream, &blocks)?; // 7

    let delta = recv_deltas(stream)?; // 9
    send_status(stream, &StatusMessage::ok("deltas received"))?; // 10

    match dest.apply(&delta) {
        Ok(()) => {
            send_status(stream, &StatusMessage::ok("apply ok"))?; // 11
            tracing::info!(dest = %dest.dest_path().display(), "push handled");
            Ok(())
        }
        Err(e) => {
            send_status(stream, &StatusMessage::fail(e.to_string()))?; // 11
            Err(e)
        }
    }
}

fn server_handle_pull<S: Read + Write>(stream: &mut S, config: &SyncConfig) -> Result<()> {
    send_status(stream, &StatusMessage::ok("command ok"))?; // 2
    let source_path = recv_path(stream)?; // 3

    if !Path::new(&source_path).is_file() {
        let err = BlockSyncError::InvalidArgument(format!("source not found: {}", source_path));
        send_status(stream, &StatusMessage::fail(err.to_string()))?; // 4
        return Err(err);
    }
    send_status(stream, &StatusMessage::ok("path ok"))?; // 4

    let dest_blocks = recv_blocks(stream, config.hash_algorithm)?; // 6
    send_status(stream, &StatusMessage::ok("hashes received"))?; // 7

    let source = SourceManager::new(&source_path);
    let delta = match source.get_delta(dest_blocks, config) {
        Ok(delta) => delta,
        Err(e) => {
            send_status(stream, &StatusMessage::fail(e.to_string()))?; // 8
            return Err(e);
        }
    };
    send_status(stream, &StatusMessage::ok("delta ready"))?; // 8
    send_deltas(stream, &delta)?; // 9

    tracing::info!(source = %source_path, "pull handled");
    Ok(())
}
