/*!
 * One-shot client entry points: connect to a server and run a single
 * PUSH or PULL transaction to completion.
 */

use std::net::TcpStream;
use std::path::Path;

use crate::config::SyncConfig;
use crate::error::{BlockSyncError, Result};
use crate::protocol::session::{client_pull, client_push};

/// Connect to `host:port` and push `local_source` to `remote_dest`.
pub fn push(
    host: &str,
    port: u16,
    local_source: &Path,
    remote_dest: &str,
    config: &SyncConfig,
) -> Result<()> {
    let mut stream = connect(host, port, config)?;
    client_push(&mut stream, local_source, remote_dest, config)
}

/// Connect to `host:port` and pull `remote_source` down into `local_dest`.
pub fn pull(
    host: &str,
    port: u16,
    remote_source: &str,
    local_dest: &Path,
    config: &SyncConfig,
) -> Result<()> {
    let mut stream = connect(host, port, config)?;
    client_pull(&mut stream, remote_source, local_dest, config)
}

fn connect(host: &str, port: u16, config: &SyncConfig) -> Result<TcpStream> {
    let addr = format!("{}:{}", host, port);
    let stream = TcpStream::connect(&addr).map_err(|e| BlockSyncError::io(addr.clone(), e))?;
    if let Some(timeout) = config.read_timeout {
        stream
            .set_read_timeout(Some(timeout))
            .map_err(|e| BlockSyncError::io(addr, e))?;
    }
    Ok(stream)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::net::TcpListener;
    use std::thread;
    use tempfile::tempdir;

    #[test]
    fn test_push_round_trips_through_real_socket() {
        let dir = tempdir().unwrap();
        let source_path = dir.path().join("source.bin");
        fs::write(&source_path, b"client push content").unwrap();
        let dest_path = dir.path().join("dest.bin");

        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let config = SyncConfig::default().with_block_size(4);
        let server_config = config.clone();

        let handle = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            crate::protocol::session::handle_connection(&mut stream, &server_config).unwrap();
        });

        push(
            &addr.ip().to_string(),
            addr.port(),
            &source_path,
            dest_path.to_str().unwrap(),
            &config,
        )
        .unwrap();

        handle.join().unwrap();
        assert_eq!(fs::read(&dest_path).unwrap(), b"client push content");
    }

    #[test]
    fn test_connect_to_closed_port_is_io_error() {
        let config = SyncConfig::default();
        let result = connect("127.0.0.1", 1, &config);
        assert!(result.is_err());
    }
}
